//! The one result shape every execution path produces.

use serde::{Deserialize, Serialize};

use crate::error::SandboxError;
use crate::policy::SandboxType;

/// Failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ResourceLimit,
    Execution,
    Timeout,
    Infrastructure,
    Cleanup,
}

impl From<&SandboxError> for ErrorKind {
    fn from(err: &SandboxError) -> Self {
        match err {
            SandboxError::Security(_) => ErrorKind::Validation,
            SandboxError::ResourceLimit { .. } => ErrorKind::ResourceLimit,
            SandboxError::Timeout(_) => ErrorKind::Timeout,
            SandboxError::Config(_)
            | SandboxError::Unavailable { .. }
            | SandboxError::Protocol(_)
            | SandboxError::Container(_)
            | SandboxError::Io(_) => ErrorKind::Infrastructure,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetrics {
    pub execution_time_ms: u64,
    /// Peak RSS of the sandboxed process; 0 when not sampled (container tier).
    pub memory_used_bytes: u64,
    pub tokens_in_summary: usize,
    /// Estimated tokens of tool output that stayed inside the sandbox.
    pub raw_output_tokens: usize,
    pub tool_calls: usize,
    pub raw_tool_output_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub metrics: ExecutionMetrics,
    pub pii_tokenized: bool,
    /// Backend that ran the program; absent when execution never started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxType>,
}

impl ExecutionResult {
    pub fn success(output: String, metrics: ExecutionMetrics, sandbox: SandboxType) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            error_kind: None,
            metrics,
            pii_tokenized: false,
            sandbox: Some(sandbox),
        }
    }

    pub fn failure(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            error_kind: Some(kind),
            metrics: ExecutionMetrics::default(),
            pii_tokenized: false,
            sandbox: None,
        }
    }

    pub fn from_error(err: &SandboxError) -> Self {
        Self::failure(ErrorKind::from(err), err.to_string())
    }

    pub fn with_metrics(mut self, metrics: ExecutionMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxType) -> Self {
        self.sandbox = Some(sandbox);
        self
    }
}
