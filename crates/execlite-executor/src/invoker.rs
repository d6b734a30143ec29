//! Built-in filesystem tools served to sandboxed programs.
//!
//! Every path argument is resolved against the workspace root and must stay
//! under it. Results are returned to the program only; the orchestrator sees
//! their byte size, never their content.

use anyhow::{Context, Result};
use async_trait::async_trait;
use execlite_core::path_validation::validate_path_under_root;
use execlite_sandbox::ToolInvoker;
use regex::RegexBuilder;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const MAX_FILE_BYTES: u64 = 4 * 1024 * 1024;
const MAX_LIST_ENTRIES: usize = 1000;
const MAX_SEARCH_FILES: usize = 2000;
const MAX_SEARCH_MATCHES: usize = 200;
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__", ".venv"];

/// Names of the tools [`LocalToolInvoker`] serves.
pub const LOCAL_TOOLS: &[&str] = &["read_file", "list_directory", "search_files"];

#[derive(Debug, Clone)]
pub struct LocalToolInvoker {
    root: PathBuf,
}

impl LocalToolInvoker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dispatch(&self, tool: &str, args: &Value) -> Result<Value> {
        match tool {
            "read_file" => {
                let path = str_arg(args, &["path", "file"])
                    .context("read_file requires a 'path' argument")?;
                self.read_file(path)
            }
            "list_directory" => {
                let dir = str_arg(args, &["dir", "path", "directory"]).unwrap_or(".");
                self.list_directory(dir)
            }
            "search_files" => {
                let pattern = str_arg(args, &["pattern", "query"])
                    .context("search_files requires a 'pattern' argument")?;
                let path = str_arg(args, &["path", "dir"]).unwrap_or(".");
                self.search_files(pattern, path)
            }
            other => anyhow::bail!("unknown tool '{}'", other),
        }
    }

    fn relative(&self, canonical: &Path) -> String {
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        canonical
            .strip_prefix(&root)
            .map(|p| if p.as_os_str().is_empty() { ".".into() } else { p.display().to_string() })
            .unwrap_or_else(|_| canonical.display().to_string())
    }

    fn read_file(&self, path: &str) -> Result<Value> {
        let full = validate_path_under_root(&self.root, path, "File")?;
        let meta = std::fs::metadata(&full)?;
        if !meta.is_file() {
            anyhow::bail!("not a file: {}", path);
        }
        if meta.len() > MAX_FILE_BYTES {
            anyhow::bail!("file too large: {} ({} bytes)", path, meta.len());
        }
        let bytes = std::fs::read(&full).with_context(|| format!("Failed to read {}", path))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        Ok(json!({
            "path": self.relative(&full),
            "size": meta.len(),
            "content": content,
        }))
    }

    fn list_directory(&self, dir: &str) -> Result<Value> {
        let full = validate_path_under_root(&self.root, dir, "Directory")?;
        if !full.is_dir() {
            anyhow::bail!("not a directory: {}", dir);
        }
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&full)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "type": if meta.is_dir() { "directory" } else { "file" },
                "size": meta.len(),
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        let total = entries.len();
        entries.truncate(MAX_LIST_ENTRIES);
        Ok(json!({
            "path": self.relative(&full),
            "total": total,
            "entries": entries,
        }))
    }

    fn search_files(&self, pattern: &str, path: &str) -> Result<Value> {
        let start = validate_path_under_root(&self.root, path, "Search path")?;
        // Invalid regexes fall back to a literal match.
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(true)
                    .build()
            })?;

        let mut files = Vec::new();
        collect_files(&start, &mut files);
        let mut matches = Vec::new();
        let mut truncated = files.len() >= MAX_SEARCH_FILES;
        'files: for file in &files {
            let Ok(text) = std::fs::read_to_string(file) else {
                continue;
            };
            for (idx, line) in text.lines().enumerate() {
                if re.is_match(line) {
                    if matches.len() >= MAX_SEARCH_MATCHES {
                        truncated = true;
                        break 'files;
                    }
                    matches.push(json!({
                        "path": self.relative(file),
                        "line": idx + 1,
                        "text": line.trim(),
                    }));
                }
            }
        }
        Ok(json!({
            "pattern": pattern,
            "filesSearched": files.len(),
            "matches": matches,
            "truncated": truncated,
        }))
    }
}

fn str_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| args.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn collect_files(start: &Path, out: &mut Vec<PathBuf>) {
    if start.is_file() {
        out.push(start.to_path_buf());
        return;
    }
    let mut stack = vec![start.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(read) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut children: Vec<_> = read.filter_map(|e| e.ok()).collect();
        children.sort_by_key(|e| e.file_name());
        for entry in children {
            if out.len() >= MAX_SEARCH_FILES {
                return;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let name = entry.file_name();
            if file_type.is_dir() {
                if !SKIP_DIRS.iter().any(|s| name == *s) {
                    stack.push(entry.path());
                }
            } else if file_type.is_file()
                && entry.metadata().map(|m| m.len() <= MAX_FILE_BYTES).unwrap_or(false)
            {
                out.push(entry.path());
            }
        }
    }
}

#[async_trait]
impl ToolInvoker for LocalToolInvoker {
    async fn invoke(&self, tool: &str, args: Value) -> Result<Value> {
        let this = self.clone();
        let tool_name = tool.to_string();
        tracing::debug!(tool = %tool_name, "Local tool call");
        tokio::task::spawn_blocking(move || this.dispatch(&tool_name, &args))
            .await
            .context("tool task failed")?
    }
}
