//! Subcommand implementations. Each takes parsed arguments and prints to stdout.

pub mod audit;
pub mod cleanup;
pub mod execute;
pub mod tools;
pub mod validate;

use crate::cli::PathArgs;
use anyhow::{Context, Result};
use execlite_executor::OrchestratorConfig;
use std::io::Read;

/// Environment configuration with CLI path overrides applied.
pub fn load_config(paths: &PathArgs) -> Result<OrchestratorConfig> {
    let mut config = OrchestratorConfig::from_env()?;
    if let Some(dir) = &paths.tools_dir {
        config.paths.tools_dir = dir.clone();
    }
    if let Some(dir) = &paths.workspace {
        config.paths.workspace = dir.clone();
    }
    Ok(config)
}

/// Contents of `source`, or stdin when it is "-".
pub fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .context("Failed to read stdin")?;
        return Ok(s);
    }
    std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_source_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.py");
        std::fs::write(&path, "print(1)\n").unwrap();
        assert_eq!(read_source(path.to_str().unwrap()).unwrap(), "print(1)\n");
        assert!(read_source(dir.path().join("missing").to_str().unwrap()).is_err());
    }
}
