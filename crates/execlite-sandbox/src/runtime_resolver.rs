//! RuntimeResolver trait: extension point for interpreters.
//!
//! Backends ask the resolver for the interpreter of a language before
//! spawning anything; a missing or too-old interpreter surfaces as
//! [`SandboxError::Unavailable`].

use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use execlite_core::Language;

use crate::error::SandboxError;

/// Oldest Node.js that ships `--experimental-strip-types` and
/// `module.stripTypeScriptTypes`.
pub const MIN_NODE_VERSION: (u32, u32) = (22, 13);

/// Resolved runtime for a given language: interpreter path, flags and env vars.
#[derive(Debug, Clone)]
pub struct ResolvedRuntime {
    /// Path to the interpreter executable (e.g. python3, node)
    pub interpreter: PathBuf,
    /// Flags placed before the script path when running a program directly
    pub args: Vec<String>,
    /// Extra environment variables
    pub extra_env: Vec<(String, String)>,
}

/// Extension point for resolving runtime interpreters by language.
pub trait RuntimeResolver: Send + Sync {
    fn resolve(&self, language: Language) -> Result<ResolvedRuntime, SandboxError>;
}

/// Interpreters from the host PATH.
#[derive(Debug, Default)]
pub struct SystemRuntimeResolver {
    node_version: OnceLock<Option<(u32, u32)>>,
}

impl SystemRuntimeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_node(&self, node: &PathBuf) -> Result<(), SandboxError> {
        let version = *self.node_version.get_or_init(|| {
            let output = Command::new(node).arg("--version").output().ok()?;
            parse_node_version(&String::from_utf8_lossy(&output.stdout))
        });
        match version {
            Some(v) if v >= MIN_NODE_VERSION => Ok(()),
            Some((major, minor)) => Err(SandboxError::unavailable(
                "node",
                format!(
                    "node {major}.{minor} found, TypeScript execution needs {}.{} or newer",
                    MIN_NODE_VERSION.0, MIN_NODE_VERSION.1
                ),
            )),
            None => Err(SandboxError::unavailable(
                "node",
                "could not determine node version",
            )),
        }
    }
}

impl RuntimeResolver for SystemRuntimeResolver {
    fn resolve(&self, language: Language) -> Result<ResolvedRuntime, SandboxError> {
        match language {
            Language::Python => {
                let interpreter = which::which("python3")
                    .map_err(|e| SandboxError::unavailable("python", e.to_string()))?;
                Ok(ResolvedRuntime {
                    interpreter,
                    args: vec!["-s".to_string(), "-B".to_string()],
                    extra_env: Vec::new(),
                })
            }
            Language::TypeScript => {
                let interpreter = which::which("node")
                    .map_err(|e| SandboxError::unavailable("node", e.to_string()))?;
                self.check_node(&interpreter)?;
                Ok(ResolvedRuntime {
                    interpreter,
                    args: vec![
                        "--experimental-strip-types".to_string(),
                        "--no-warnings".to_string(),
                    ],
                    extra_env: Vec::new(),
                })
            }
        }
    }
}

/// Parse `v22.13.1` into `(22, 13)`.
pub fn parse_node_version(text: &str) -> Option<(u32, u32)> {
    let mut parts = text.trim().trim_start_matches('v').split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_version() {
        assert_eq!(parse_node_version("v22.13.1\n"), Some((22, 13)));
        assert_eq!(parse_node_version("v18.0.0"), Some((18, 0)));
        assert_eq!(parse_node_version("garbage"), None);
        assert!(parse_node_version("v23.1.0").unwrap() >= MIN_NODE_VERSION);
        assert!(parse_node_version("v22.9.0").unwrap() < MIN_NODE_VERSION);
    }

    #[test]
    fn test_resolve_python_when_present() {
        if which::which("python3").is_err() {
            return;
        }
        let rt = SystemRuntimeResolver::new().resolve(Language::Python).unwrap();
        assert!(rt.interpreter.ends_with("python3"));
    }
}
