use crate::limits::ResourceKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    /// Configuration that would weaken isolation, e.g. a secret-shaped env var.
    #[error("security violation: {0}")]
    Security(String),

    #[error("invalid sandbox configuration: {0}")]
    Config(String),

    #[error("{kind} limit exceeded: {message}")]
    ResourceLimit { kind: ResourceKind, message: String },

    #[error("execution timed out after {0} ms")]
    Timeout(u64),

    #[error("{backend} backend unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("tool bridge protocol error: {0}")]
    Protocol(String),

    #[error("container runtime error: {0}")]
    Container(String),

    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    pub fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            backend,
            reason: reason.into(),
        }
    }
}
