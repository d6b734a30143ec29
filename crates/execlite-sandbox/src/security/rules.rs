//! Security rule definitions and configuration
//!
//! This module provides the `SecurityRule` struct for defining validation rules
//! and `RulesConfig` for loading custom rules from a YAML file.

use super::types::{SecurityIssueType, SecuritySeverity};
use anyhow::{Context, Result};
use execlite_core::Language;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A single validation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRule {
    /// Unique identifier for the rule
    pub id: String,
    /// Regular expression pattern to match
    pub pattern: String,
    /// Type of security issue this rule detects
    pub issue_type: SecurityIssueType,
    /// Severity level of the issue
    pub severity: SecuritySeverity,
    /// Human-readable description of the issue
    pub description: String,
    /// Languages this rule applies to; empty means all
    #[serde(default)]
    pub languages: Vec<Language>,
    /// Whether this rule is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SecurityRule {
    /// Create a new security rule
    pub fn new(
        id: &str,
        pattern: &str,
        issue_type: SecurityIssueType,
        severity: SecuritySeverity,
        description: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            pattern: pattern.to_string(),
            issue_type,
            severity,
            description: description.to_string(),
            languages: Vec::new(),
            enabled: true,
        }
    }

    /// Set the languages this rule applies to
    pub fn for_languages(mut self, languages: &[Language]) -> Self {
        self.languages = languages.to_vec();
        self
    }

    pub fn applies_to(&self, language: Language) -> bool {
        self.languages.is_empty() || self.languages.contains(&language)
    }

    /// Compile the regex pattern
    pub fn compile(&self) -> Result<Regex> {
        Regex::new(&self.pattern).with_context(|| {
            format!(
                "Failed to compile regex for rule '{}': {}",
                self.id, self.pattern
            )
        })
    }
}

/// Rule set customization, loaded from YAML.
///
/// # Example YAML Configuration
///
/// ```yaml
/// use_default_rules: true
/// disabled_rules:
///   - py-infinite-loop
/// rules:
///   - id: custom-dangerous-func
///     pattern: "dangerous_function\\s*\\("
///     issue_type: code_injection
///     severity: high
///     description: "Custom dangerous function detected"
///     languages: ["python"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Custom rules to add
    #[serde(default)]
    pub rules: Vec<SecurityRule>,
    /// Rule IDs to disable from the default set
    #[serde(default)]
    pub disabled_rules: Vec<String>,
    /// Whether to use default rules (default: true)
    #[serde(default = "default_use_defaults")]
    pub use_default_rules: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            disabled_rules: Vec::new(),
            use_default_rules: true,
        }
    }
}

fn default_use_defaults() -> bool {
    true
}

impl RulesConfig {
    /// Load rules configuration from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules config: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse rules config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yaml");
        fs::write(
            &path,
            r#"
disabled_rules: [js-infinite-loop]
rules:
  - id: no-sleep
    pattern: "sleep\\s*\\("
    issue_type: memory_bomb
    severity: low
    description: "sleep call"
    languages: ["python"]
"#,
        )
        .unwrap();
        let config = RulesConfig::load_from_file(&path).unwrap();
        assert!(config.use_default_rules);
        assert_eq!(config.disabled_rules, vec!["js-infinite-loop"]);
        assert_eq!(config.rules[0].languages, vec![Language::Python]);
        assert!(config.rules[0].enabled);
        assert!(config.rules[0].compile().is_ok());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(RulesConfig::load_from_file(Path::new("/nonexistent/rules.yaml")).is_err());
    }
}
