//! Path validation utilities.
//!
//! Ensures paths stay within an allowed root to prevent path traversal.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Allowed root for tool file access: `EXECLITE_WORKSPACE`, else the current directory.
pub fn get_allowed_root() -> Result<PathBuf> {
    let root = crate::config::PathsConfig::from_env().workspace;
    root.canonicalize()
        .map_err(|e| anyhow::anyhow!("Invalid EXECLITE_WORKSPACE {}: {}", root.display(), e))
}

/// Validate that an existing `path` resolves under `root`. Relative paths are
/// joined to `root`.
pub fn validate_path_under_root(root: &Path, path: &str, path_type: &str) -> Result<PathBuf> {
    let allowed_root = root
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("Invalid root {}: {}", root.display(), e))?;
    let input = Path::new(path);
    let full = if input.is_absolute() {
        input.to_path_buf()
    } else {
        allowed_root.join(input)
    };
    let canonical = full
        .canonicalize()
        .map_err(|_| anyhow::anyhow!("{} does not exist: {}", path_type, path))?;
    if !canonical.starts_with(&allowed_root) {
        anyhow::bail!("{} escapes allowed root: {}", path_type, path);
    }
    Ok(canonical)
}

/// Validate a single path component used as a directory name (session ids etc.).
pub fn validate_component(name: &str, kind: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 128
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok {
        anyhow::bail!("Invalid {}: {:?}", kind, name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let ok = validate_path_under_root(dir.path(), "a.txt", "File").unwrap();
        assert!(ok.ends_with("a.txt"));
        assert!(validate_path_under_root(dir.path(), "../", "File").is_err());
        assert!(validate_path_under_root(dir.path(), "missing.txt", "File").is_err());
    }

    #[test]
    fn test_component_rules() {
        assert!(validate_component("session-1_a", "session id").is_ok());
        assert!(validate_component("..", "session id").is_err());
        assert!(validate_component("a/b", "session id").is_err());
        assert!(validate_component("", "session id").is_err());
    }
}
