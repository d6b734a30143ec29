pub mod audit;
pub mod config;
pub mod language;
pub mod observability;
pub mod path_validation;
pub mod pii;
pub mod tool;

pub use language::Language;

/// Resolve the execlite data root (`EXECLITE_DATA_DIR`, else `~/.execlite`).
pub fn data_root() -> std::path::PathBuf {
    config::PathsConfig::from_env().data_dir
}
