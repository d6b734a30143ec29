//! Build the environment for a sandboxed interpreter.

use crate::error::SandboxError;
use std::path::Path;

/// Minimal PATH handed to local interpreters.
pub const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Name fragments that mark a variable as a credential.
const SECRET_MARKERS: &[&str] = &[
    "KEY",
    "SECRET",
    "TOKEN",
    "PASSWORD",
    "PASSWD",
    "CREDENTIAL",
    "AUTH",
];

/// Variables the builder always sets itself; host values for these are ignored.
const MANAGED_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "TMPDIR",
    "TMP",
    "TEMP",
    "LANG",
    "PYTHONDONTWRITEBYTECODE",
    "PYTHONIOENCODING",
    "NODE_OPTIONS",
];

pub fn is_secret_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    SECRET_MARKERS.iter().any(|m| upper.contains(m))
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Allow-listed host variables, captured once at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxEnv {
    passthrough: Vec<(String, String)>,
}

impl SandboxEnv {
    /// Validate the allow-list and capture the current values of its variables.
    /// Unset variables are skipped.
    pub fn from_allow_list(names: &[String]) -> Result<Self, SandboxError> {
        Self::from_lookup(names, |name| std::env::var(name).ok())
    }

    /// Like [`from_allow_list`](Self::from_allow_list) with an explicit value source.
    pub fn from_lookup<F>(names: &[String], lookup: F) -> Result<Self, SandboxError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut passthrough = Vec::new();
        for name in names {
            Self::check_name(name)?;
            if MANAGED_VARS.contains(&name.as_str()) {
                tracing::debug!(var = %name, "ignoring allow-listed variable managed by the sandbox");
                continue;
            }
            if passthrough.iter().any(|(n, _)| n == name) {
                continue;
            }
            if let Some(value) = lookup(name) {
                passthrough.push((name.clone(), value));
            }
        }
        Ok(Self { passthrough })
    }

    /// Reject names that could carry credentials or are not valid identifiers.
    pub fn check_name(name: &str) -> Result<(), SandboxError> {
        if is_secret_name(name) {
            return Err(SandboxError::Security(format!(
                "environment variable '{name}' looks like a credential and cannot be passed to a sandbox"
            )));
        }
        if !is_valid_name(name) {
            return Err(SandboxError::Config(format!(
                "invalid environment variable name '{name}'"
            )));
        }
        Ok(())
    }

    pub fn passthrough(&self) -> &[(String, String)] {
        &self.passthrough
    }

    /// Full environment for a local interpreter whose HOME and temp dirs live
    /// inside the ephemeral sandbox directory.
    pub fn render(&self, home: &Path, tmp: &Path) -> Vec<(String, String)> {
        let home = home.to_string_lossy().to_string();
        let tmp = tmp.to_string_lossy().to_string();
        let mut vars = vec![
            ("PATH".to_string(), SANDBOX_PATH.to_string()),
            ("HOME".to_string(), home),
            ("TMPDIR".to_string(), tmp.clone()),
            ("TMP".to_string(), tmp.clone()),
            ("TEMP".to_string(), tmp),
        ];
        vars.extend(Self::common_vars());
        vars.extend(self.passthrough.iter().cloned());
        vars
    }

    /// Environment for a container; paths refer to the container filesystem.
    pub fn render_container(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("HOME".to_string(), "/tmp".to_string()),
            ("TMPDIR".to_string(), "/tmp".to_string()),
        ];
        vars.extend(Self::common_vars());
        vars.extend(self.passthrough.iter().cloned());
        vars
    }

    fn common_vars() -> Vec<(String, String)> {
        vec![
            ("LANG".to_string(), "C.UTF-8".to_string()),
            ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
            ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
        ]
    }
}
