//! Static validator for generated and user-supplied programs
//!
//! Rules are compiled once at construction; [`CodeValidator::validate`] only
//! reads them, so one validator can be shared across threads.

use super::default_rules::get_default_rules;
use super::rules::{RulesConfig, SecurityRule};
use super::types::{IssueLocation, SecuritySeverity, ValidationIssue, ValidationResult};
use crate::error::SandboxError;
use execlite_core::config::ValidatorSettings;
use execlite_core::Language;
use regex::Regex;
use std::fmt::Write as _;

pub const DEFAULT_RISK_THRESHOLD: u8 = 70;

/// Risk added per issue, by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityWeights {
    pub critical: u8,
    pub high: u8,
    pub medium: u8,
    pub low: u8,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 80,
            high: 35,
            medium: 15,
            low: 5,
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: SecuritySeverity) -> u8 {
        match severity {
            SecuritySeverity::Critical => self.critical,
            SecuritySeverity::High => self.high,
            SecuritySeverity::Medium => self.medium,
            SecuritySeverity::Low => self.low,
        }
    }
}

pub struct CodeValidator {
    /// Compiled rules for scanning
    rules: Vec<(SecurityRule, Regex)>,
    /// Disabled rule IDs
    disabled_rules: Vec<String>,
    threshold: u8,
    weights: SeverityWeights,
}

impl Default for CodeValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeValidator {
    /// Create a validator with the default rules
    pub fn new() -> Self {
        Self::with_config(&RulesConfig::default())
    }

    /// Create a validator with custom rules configuration
    pub fn with_config(config: &RulesConfig) -> Self {
        let mut rules = if config.use_default_rules {
            get_default_rules()
        } else {
            Vec::new()
        };
        rules.extend(config.rules.clone());

        Self {
            rules: Self::compile_rules(&rules),
            disabled_rules: config.disabled_rules.clone(),
            threshold: DEFAULT_RISK_THRESHOLD,
            weights: SeverityWeights::default(),
        }
    }

    /// Build from settings, loading the YAML rules file when one is configured.
    pub fn from_settings(settings: &ValidatorSettings) -> Result<Self, SandboxError> {
        let config = match &settings.rules_file {
            Some(path) => RulesConfig::load_from_file(path)
                .map_err(|e| SandboxError::Config(format!("{e:#}")))?,
            None => RulesConfig::default(),
        };
        Ok(Self::with_config(&config).with_threshold(settings.risk_threshold))
    }

    fn compile_rules(rules: &[SecurityRule]) -> Vec<(SecurityRule, Regex)> {
        rules
            .iter()
            .filter(|r| r.enabled)
            .filter_map(|rule| match rule.compile() {
                Ok(regex) => Some((rule.clone(), regex)),
                Err(e) => {
                    tracing::warn!("Failed to compile rule '{}': {}", rule.id, e);
                    None
                }
            })
            .collect()
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold.min(100);
        self
    }

    pub fn with_weights(mut self, weights: SeverityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Disable specific rules by ID
    pub fn disable_rules(mut self, rule_ids: &[&str]) -> Self {
        self.disabled_rules
            .extend(rule_ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Scan `code`. Issues come back ordered by line, then by rule order.
    pub fn validate(&self, code: &str, language: Language) -> ValidationResult {
        let mut issues = Vec::new();
        let mut in_block_comment = false;

        for (line_idx, line) in code.lines().enumerate() {
            let trimmed = line.trim();
            if is_comment_line(trimmed, language, &mut in_block_comment) {
                continue;
            }

            for (rule, regex) in &self.rules {
                if !rule.applies_to(language) || self.disabled_rules.contains(&rule.id) {
                    continue;
                }
                if let Some(m) = regex.find(line) {
                    issues.push(ValidationIssue {
                        rule_id: rule.id.clone(),
                        issue_type: rule.issue_type,
                        severity: rule.severity,
                        location: IssueLocation {
                            line: line_idx + 1,
                            column: line[..m.start()].chars().count() + 1,
                        },
                        message: rule.description.clone(),
                        snippet: trimmed.to_string(),
                    });
                }
            }
        }

        let total: u32 = issues
            .iter()
            .map(|i| u32::from(self.weights.weight(i.severity)))
            .sum();
        let risk_score = total.min(100) as u8;
        let has_critical = issues
            .iter()
            .any(|i| i.severity == SecuritySeverity::Critical);

        ValidationResult {
            is_secure: !has_critical && risk_score < self.threshold,
            risk_score,
            requires_approval: has_critical || risk_score >= self.threshold,
            issues,
        }
    }
}

/// Line-level comment detection. Block comments in TypeScript are tracked
/// across lines; trailing comments after code are still scanned.
fn is_comment_line(line: &str, language: Language, in_block: &mut bool) -> bool {
    match language {
        Language::Python => line.starts_with('#'),
        Language::TypeScript => {
            if *in_block {
                if line.contains("*/") {
                    *in_block = false;
                    // Code after the closing marker is still scanned.
                    return line.trim_end().ends_with("*/");
                }
                return true;
            }
            if line.starts_with("//") {
                return true;
            }
            if line.starts_with("/*") {
                if !line.contains("*/") {
                    *in_block = true;
                    return true;
                }
                return line.trim_end().ends_with("*/");
            }
            false
        }
    }
}

/// Compact human-readable report.
pub fn format_validation_report(result: &ValidationResult) -> String {
    let mut out = String::new();
    let verdict = if result.is_secure { "SECURE" } else { "INSECURE" };
    let _ = writeln!(
        out,
        "{} (risk {}/100{})",
        verdict,
        result.risk_score,
        if result.requires_approval {
            ", approval required"
        } else {
            ""
        }
    );
    if result.issues.is_empty() {
        let _ = writeln!(out, "No issues found.");
        return out;
    }
    for issue in &result.issues {
        let _ = writeln!(
            out,
            "  [{}] {}:{} {} ({}): {}",
            issue.severity,
            issue.location.line,
            issue.location.column,
            issue.rule_id,
            issue.issue_type,
            issue.message
        );
        let _ = writeln!(out, "      {}", issue.snippet);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::types::{Capability, SecurityIssueType};
    use std::sync::Arc;

    #[test]
    fn test_safe_code_is_secure() {
        let v = CodeValidator::new();
        let ts = "const xs = [1, 2, 3];\nconsole.log(xs.map((x) => x * 2).join(\",\"));\n";
        let r = v.validate(ts, Language::TypeScript);
        assert!(r.is_secure);
        assert!(r.risk_score < 30);
        assert!(r.issues.is_empty());

        let py = "total = sum(range(10))\nprint(total)\n";
        let r = v.validate(py, Language::Python);
        assert!(r.is_secure);
        assert_eq!(r.risk_score, 0);
    }

    #[test]
    fn test_eval_requires_approval() {
        let v = CodeValidator::new();
        let r = v.validate("const x = eval(\"1 + 1\");", Language::TypeScript);
        assert!(!r.is_secure);
        assert!(r.requires_approval);
        assert!(r.risk_score > 70);
        assert_eq!(r.issues[0].rule_id, "js-eval");
        assert_eq!(r.issues[0].issue_type, SecurityIssueType::CodeInjection);
        assert_eq!(r.issues[0].location, IssueLocation { line: 1, column: 10 });

        let r = v.validate("import os\nos.system(\"ls\")\n", Language::Python);
        assert!(r.requires_approval);
        assert_eq!(r.risk_score, 100);
        assert!(r.operations().contains(&Capability::ProcessSpawn));
    }

    #[test]
    fn test_indirect_shell_exec_requires_approval() {
        use crate::policy::{select_sandbox_level, SandboxType, SelectionInput};

        let v = CodeValidator::new();
        let cases = [
            ("import posix\nposix.system('echo hi')\n", Language::Python),
            ("import pty\npty.spawn(['sh'])\n", Language::Python),
            ("import os\nos.posix_spawn('/bin/sh', ['sh'], {})\n", Language::Python),
            ("from posix import system\nsystem('id')\n", Language::Python),
            ("import os as o\no.system('id')\n", Language::Python),
            ("import sys\nsys.modules['os'].system('id')\n", Language::Python),
            ("import _posixsubprocess\n_posixsubprocess.fork_exec()\n", Language::Python),
            (
                "const cp = require(['child', 'process'].join('_'));\ncp['exec' + 'Sync']('id');\n",
                Language::TypeScript,
            ),
            ("const m = await import(name);\n", Language::TypeScript),
            ("process.mainModule.require('child_process');\n", Language::TypeScript),
            ("const r = module.require;\n", Language::TypeScript),
            ("process['binding']('spawn_sync');\n", Language::TypeScript),
            ("cp[\"execSync\"](\"id\");\n", Language::TypeScript),
        ];
        for (code, language) in cases {
            let r = v.validate(code, language);
            assert!(r.requires_approval, "not flagged: {code}");
            assert!(r.risk_score > 70, "risk {} for: {code}", r.risk_score);
            let level = select_sandbox_level(
                &SelectionInput {
                    risk_score: r.risk_score,
                    language,
                    operations: r.operations(),
                },
                None,
            );
            assert_eq!(level, SandboxType::Container, "tier for: {code}");
        }
    }

    #[test]
    fn test_literal_require_is_not_dynamic() {
        let v = CodeValidator::new();
        let r = v.validate("const _ = require('lodash');\n", Language::TypeScript);
        assert!(r.issues.is_empty());
        let r = v.validate("const m = await import(\"./local\");\n", Language::TypeScript);
        assert!(r.issues.is_empty());
    }

    #[test]
    fn test_method_named_eval_is_not_flagged() {
        let v = CodeValidator::new();
        let r = v.validate("model.eval()\nparser.compile(x)", Language::Python);
        assert!(r.issues.is_empty());
    }

    #[test]
    fn test_comments_are_skipped() {
        let v = CodeValidator::new();
        let ts = "// eval(x)\n/*\n * eval(y)\n */\nconst a = 1;";
        assert!(v.validate(ts, Language::TypeScript).issues.is_empty());
        let py = "# os.system('rm')\nx = 1";
        assert!(v.validate(py, Language::Python).issues.is_empty());
    }

    #[test]
    fn test_issues_in_detection_order() {
        let v = CodeValidator::new();
        let code = "const r = await fetch(\"https://x\");\nconst k = process.env.HOME;";
        let r = v.validate(code, Language::TypeScript);
        let ids: Vec<_> = r.issues.iter().map(|i| i.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["js-fetch", "js-env-access"]);
        assert_eq!(r.risk_score, 30);
        assert!(r.is_secure);
        assert!(r.operations().contains(&Capability::Network));
    }

    #[test]
    fn test_threshold_controls_verdict() {
        let v = CodeValidator::new().with_threshold(20);
        let r = v.validate("const r = fetch(u);", Language::TypeScript);
        assert_eq!(r.risk_score, 15);
        assert!(r.is_secure);
        let r = v.validate("const r = fetch(u);\nconst e = process.env;", Language::TypeScript);
        assert!(!r.is_secure);
        assert!(r.requires_approval);
    }

    #[test]
    fn test_disabled_rules() {
        let v = CodeValidator::new().disable_rules(&["js-infinite-loop"]);
        let r = v.validate("while (true) { break; }", Language::TypeScript);
        assert!(r.issues.is_empty());

        let config = RulesConfig {
            disabled_rules: vec!["py-eval".to_string()],
            ..Default::default()
        };
        let r = CodeValidator::with_config(&config).validate("eval('1')", Language::Python);
        assert!(r.issues.is_empty());
    }

    #[test]
    fn test_rules_are_language_scoped() {
        let v = CodeValidator::new();
        let r = v.validate("while True:\n    break", Language::TypeScript);
        assert!(r.issues.is_empty());
        let r = v.validate("while True:\n    break", Language::Python);
        assert_eq!(r.issues.len(), 1);
    }

    #[test]
    fn test_concurrent_validation_matches_sequential() {
        let v = Arc::new(CodeValidator::new());
        let inputs: Vec<(String, Language)> = (0..120)
            .map(|i| match i % 4 {
                0 => (format!("const a{i} = {i};"), Language::TypeScript),
                1 => (format!("eval(\"{i}\")"), Language::TypeScript),
                2 => (format!("x = {i}\nprint(x)"), Language::Python),
                _ => (format!("import subprocess\nsubprocess.run(['echo', '{i}'])"), Language::Python),
            })
            .collect();
        let sequential: Vec<_> = inputs.iter().map(|(c, l)| v.validate(c, *l)).collect();

        let handles: Vec<_> = inputs
            .iter()
            .cloned()
            .map(|(code, lang)| {
                let v = Arc::clone(&v);
                std::thread::spawn(move || v.validate(&code, lang))
            })
            .collect();
        let concurrent: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(sequential, concurrent);
    }

    #[test]
    fn test_from_settings_bad_rules_file() {
        let settings = ValidatorSettings {
            risk_threshold: 50,
            rules_file: Some("/nonexistent/rules.yaml".into()),
            auto_approve: false,
        };
        assert!(matches!(
            CodeValidator::from_settings(&settings),
            Err(SandboxError::Config(_))
        ));
    }

    #[test]
    fn test_report_lists_issues() {
        let v = CodeValidator::new();
        let report = format_validation_report(&v.validate("eval(x)", Language::Python));
        assert!(report.starts_with("INSECURE (risk 80/100, approval required)"));
        assert!(report.contains("py-eval"));
        let report = format_validation_report(&v.validate("x = 1", Language::Python));
        assert!(report.contains("No issues found."));
    }
}
