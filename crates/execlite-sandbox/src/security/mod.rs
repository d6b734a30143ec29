//! Static security validation: rule definitions, default rule set and the
//! validator that scores a program before it reaches a sandbox.

pub mod default_rules;
pub mod rules;
pub mod types;
pub mod validator;

pub use rules::{RulesConfig, SecurityRule};
pub use types::{
    Capability, IssueLocation, SecurityIssueType, SecuritySeverity, ValidationIssue,
    ValidationResult,
};
pub use validator::{format_validation_report, CodeValidator, SeverityWeights};
