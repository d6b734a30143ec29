//! Templated synthesis of tool bindings.
//!
//! Given ranked tool schemas, [`CodeApiGenerator`] emits a wrapper module in
//! TypeScript or Python that exposes each tool as a plain async/sync function,
//! plus an optional entry point derived from the caller's intent. Nothing here
//! is generative: output is a deterministic function of the schemas.

pub mod deps;
pub mod entrypoint;
pub mod error;
pub mod generator;
pub mod naming;
mod python;
mod typescript;

pub use deps::extract_dependencies;
pub use entrypoint::{plan_calls, EntrypointPlan, Literals, PlannedCall};
pub use error::CodegenError;
pub use generator::{CodeApiGenerator, GeneratedWrapper};
