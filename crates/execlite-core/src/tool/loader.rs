//! Load tool schemas from a directory of JSON documents.
//!
//! Each `*.json` file holds either one tool object or an array of tools.
//! Malformed files are skipped with a warning; later files win on duplicate names.

use super::schema::Tool;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolIndexError {
    #[error("tool schema directory not found: {0}")]
    MissingDir(PathBuf),
    #[error("failed to read tool schema directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn load_tools_from_dir(dir: &Path) -> Result<Vec<Tool>, ToolIndexError> {
    if !dir.is_dir() {
        return Err(ToolIndexError::MissingDir(dir.to_path_buf()));
    }
    let read_dir = std::fs::read_dir(dir).map_err(|source| ToolIndexError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    // Sorted for a deterministic index order across platforms.
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();

    let mut tools: Vec<Tool> = Vec::new();
    for file in files {
        match parse_file(&file) {
            Ok(parsed) => {
                for tool in parsed {
                    if tool.name.trim().is_empty() {
                        tracing::warn!(file = %file.display(), "Skipping tool without a name");
                        continue;
                    }
                    if let Some(existing) = tools.iter_mut().find(|t| t.name == tool.name) {
                        tracing::warn!(tool = %tool.name, file = %file.display(), "Duplicate tool name, keeping the later definition");
                        *existing = tool;
                    } else {
                        tools.push(tool);
                    }
                }
            }
            Err(e) => tracing::warn!(file = %file.display(), "Skipping tool schema: {}", e),
        }
    }
    tracing::debug!(count = tools.len(), dir = %dir.display(), "Loaded tool schemas");
    Ok(tools)
}

fn parse_file(path: &Path) -> anyhow::Result<Vec<Tool>> {
    use anyhow::Context;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    let tools = if value.is_array() {
        serde_json::from_value::<Vec<Tool>>(value)
    } else {
        serde_json::from_value::<Tool>(value).map(|t| vec![t])
    }
    .with_context(|| format!("Invalid tool schema in {}", path.display()))?;
    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_objects_and_arrays_skipping_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"name": "read_file", "description": "Read", "parameters": [{"name": "path", "required": true}]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"[{"name": "list_directory", "description": "List"}, {"name": "read_file", "description": "Read v2"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("c.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let tools = load_tools_from_dir(dir.path()).unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["read_file", "list_directory"]);
        assert_eq!(tools[0].description, "Read v2");
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tools_from_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ToolIndexError::MissingDir(_)));
    }
}
