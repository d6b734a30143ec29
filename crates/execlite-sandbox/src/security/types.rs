//! Security issue types and severity definitions
//!
//! This module contains the core type definitions for static validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Severity levels for security issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecuritySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for SecuritySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SecuritySeverity::Low => "low",
            SecuritySeverity::Medium => "medium",
            SecuritySeverity::High => "high",
            SecuritySeverity::Critical => "critical",
        })
    }
}

/// Types of security issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityIssueType {
    FileOperation,
    NetworkRequest,
    CodeInjection,
    MemoryBomb,
    ProcessExecution,
    SystemAccess,
    DangerousModule,
}

impl SecurityIssueType {
    /// What running code with this issue would be able to do.
    pub fn capability(&self) -> Option<Capability> {
        match self {
            SecurityIssueType::FileOperation => Some(Capability::FileSystem),
            SecurityIssueType::NetworkRequest => Some(Capability::Network),
            SecurityIssueType::CodeInjection => Some(Capability::DynamicCode),
            // os/subprocess/ctypes all reach process creation.
            SecurityIssueType::ProcessExecution | SecurityIssueType::DangerousModule => {
                Some(Capability::ProcessSpawn)
            }
            SecurityIssueType::SystemAccess => Some(Capability::SystemAccess),
            SecurityIssueType::MemoryBomb => None,
        }
    }
}

impl std::fmt::Display for SecurityIssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityIssueType::FileOperation => write!(f, "File Operation"),
            SecurityIssueType::NetworkRequest => write!(f, "Network Request"),
            SecurityIssueType::CodeInjection => write!(f, "Code Injection"),
            SecurityIssueType::MemoryBomb => write!(f, "Memory Bomb"),
            SecurityIssueType::ProcessExecution => write!(f, "Process Execution"),
            SecurityIssueType::SystemAccess => write!(f, "System Access"),
            SecurityIssueType::DangerousModule => write!(f, "Dangerous Module"),
        }
    }
}

/// Operations detected in code, used for sandbox selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Network,
    ProcessSpawn,
    FileSystem,
    DynamicCode,
    SystemAccess,
}

/// 1-based position of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IssueLocation {
    pub line: usize,
    pub column: usize,
}

/// Security issue found in code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// Rule ID that triggered this issue
    pub rule_id: String,
    #[serde(rename = "type")]
    pub issue_type: SecurityIssueType,
    pub severity: SecuritySeverity,
    pub location: IssueLocation,
    pub message: String,
    /// The trimmed source line that triggered the issue
    pub snippet: String,
}

/// Outcome of validating one program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_secure: bool,
    /// Sum of per-issue increments, clamped to `0..=100`.
    pub risk_score: u8,
    pub requires_approval: bool,
    /// In detection order: by line, then by rule order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn has_critical(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == SecuritySeverity::Critical)
    }

    pub fn operations(&self) -> BTreeSet<Capability> {
        self.issues
            .iter()
            .filter_map(|i| i.issue_type.capability())
            .collect()
    }

    pub fn count_by_severity(&self, severity: SecuritySeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}
