//! Unified configuration layer.
//!
//! Every environment read goes through this module; the rest of the workspace
//! consumes the typed structs in `schema`.
//!
//! - `loader`: `env_or`, `env_optional`, `env_bool`, `env_parse`, `.env` loading
//! - `schema`: `ObservabilityConfig`, `PathsConfig`, `SandboxSettings`, ...
//! - `env_keys`: key constants and alias chains

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_list, env_optional, env_or, env_parse, load_dotenv};
pub use schema::{
    CleanupSettings, CodegenSettings, ObservabilityConfig, PathsConfig, SandboxSettings,
    ValidatorSettings,
};
