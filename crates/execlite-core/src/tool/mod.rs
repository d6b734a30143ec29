//! Tool model, in-memory index, relevance ranking and schema loading.

pub mod index;
pub mod loader;
pub mod schema;
pub mod scorer;

pub use index::ToolIndex;
pub use loader::{load_tools_from_dir, ToolIndexError};
pub use schema::{Tool, ToolParameter};
pub use scorer::{
    calculate_similarity, filter_by_threshold, RelevanceScore, RelevanceScorer, ScoringWeights,
};
