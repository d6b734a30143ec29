use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CodegenError {
    #[error("tool name {0:?} does not yield a valid identifier")]
    InvalidIdentifier(String),

    #[error("tools {first:?} and {second:?} both map to `{identifier}`")]
    NameCollision {
        first: String,
        second: String,
        identifier: String,
    },

    #[error("tool {tool:?}: parameters {first:?} and {second:?} both map to `{identifier}`")]
    ParameterCollision {
        tool: String,
        first: String,
        second: String,
        identifier: String,
    },

    #[error("chars_per_token must be a positive number, got {0}")]
    InvalidCharsPerToken(f64),
}
