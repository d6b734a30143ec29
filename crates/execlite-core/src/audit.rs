//! Compliance audit trail.
//!
//! One JSON object per line, append-only. Every `log_*` call returns only after
//! the line has been appended and flushed to stable storage, so a caller that
//! proceeds after an `await` can rely on the entry being on disk.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEventType {
    Discovery,
    Execution,
    Security,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// A single audit record. `timestamp`, `type`, `severity` and `message` are
/// always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AuditLogEntry {
    pub fn new(
        event_type: AuditEventType,
        severity: AuditSeverity,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event_type,
            severity,
            message: message.into(),
            metadata,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("audit entry serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("audit writer task failed: {0}")]
    Task(String),
}

/// Append-only JSONL audit logger.
///
/// Clones share the same write lock, so appends from concurrent requests never
/// interleave within a line.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl AuditLogger {
    /// Open (or create) the audit log at `path`. Parent directories are created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| AuditError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Logger at the configured location (`EXECLITE_AUDIT_LOG` or `~/.execlite/audit.jsonl`).
    pub fn from_config() -> Result<Self, AuditError> {
        Self::new(crate::config::PathsConfig::from_env().audit_log_path())
    }

    pub fn get_log_file_path(&self) -> &Path {
        &self.path
    }

    pub async fn log_discovery(
        &self,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<(), AuditError> {
        self.log(AuditLogEntry::new(
            AuditEventType::Discovery,
            AuditSeverity::Info,
            message,
            metadata,
        ))
        .await
    }

    /// Execution outcome; failures are recorded at `error` severity.
    pub async fn log_execution(
        &self,
        success: bool,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<(), AuditError> {
        let severity = if success {
            AuditSeverity::Info
        } else {
            AuditSeverity::Error
        };
        self.log(AuditLogEntry::new(
            AuditEventType::Execution,
            severity,
            message,
            metadata,
        ))
        .await
    }

    pub async fn log_security(
        &self,
        severity: AuditSeverity,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<(), AuditError> {
        self.log(AuditLogEntry::new(
            AuditEventType::Security,
            severity,
            message,
            metadata,
        ))
        .await
    }

    pub async fn log_error(
        &self,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<(), AuditError> {
        self.log(AuditLogEntry::new(
            AuditEventType::Error,
            AuditSeverity::Error,
            message,
            metadata,
        ))
        .await
    }

    /// Append one entry and `fsync` it before returning.
    pub async fn log(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let path = self.path.clone();
        let lock = Arc::clone(&self.write_lock);
        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            append_durable(&path, line.as_bytes())
        })
        .await
        .map_err(|e| AuditError::Task(e.to_string()))?
    }

    /// Last `n` entries in file order. Lines that fail to parse are skipped.
    pub async fn get_recent_logs(&self, n: usize) -> Result<Vec<AuditLogEntry>, AuditError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut entries = read_entries(&path)?;
            let skip = entries.len().saturating_sub(n);
            Ok(entries.split_off(skip))
        })
        .await
        .map_err(|e| AuditError::Task(e.to_string()))?
    }

    /// Total number of well-formed entries on disk.
    pub async fn count_entries(&self) -> Result<usize, AuditError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_entries(&path).map(|e| e.len()))
            .await
            .map_err(|e| AuditError::Task(e.to_string()))?
    }
}

fn append_durable(path: &Path, bytes: &[u8]) -> Result<(), AuditError> {
    let io_err = |source: std::io::Error| AuditError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_data().map_err(io_err)?;
    Ok(())
}

fn read_entries(path: &Path) -> Result<Vec<AuditLogEntry>, AuditError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path).map_err(|source| AuditError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| AuditError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::debug!("Skipping malformed audit line: {}", e),
        }
    }
    Ok(entries)
}

/// SHA-256 of executed code, recorded in audit metadata instead of the code itself.
pub fn code_hash(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_entries_carry_required_fields() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path().join("nested/audit.jsonl")).unwrap();

        logger.log_discovery("found 2 tools", Some(json!({"count": 2}))).await.unwrap();
        logger.log_execution(false, "boom", None).await.unwrap();
        logger
            .log_security(AuditSeverity::Critical, "eval detected", None)
            .await
            .unwrap();
        logger.log_error("sandbox failed", None).await.unwrap();

        // Durable before return: the raw file already holds four lines.
        let raw = std::fs::read_to_string(logger.get_log_file_path()).unwrap();
        assert_eq!(raw.lines().count(), 4);
        for line in raw.lines() {
            let v: Value = serde_json::from_str(line).unwrap();
            for field in ["timestamp", "type", "severity", "message"] {
                assert!(v.get(field).is_some(), "missing {} in {}", field, line);
            }
        }

        let recent = logger.get_recent_logs(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event_type, AuditEventType::Security);
        assert_eq!(recent[0].severity, AuditSeverity::Critical);
        assert_eq!(recent[1].event_type, AuditEventType::Error);
    }

    #[tokio::test]
    async fn test_survives_reopen_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let logger = AuditLogger::new(&path).unwrap();
            logger.log_discovery("first", None).await.unwrap();
        }
        let logger = AuditLogger::new(&path).unwrap();
        logger.log_discovery("second", None).await.unwrap();
        let all = logger.get_recent_logs(10).await.unwrap();
        assert_eq!(
            all.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
            vec!["first", "second"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.jsonl")).unwrap();
        let mut handles = Vec::new();
        for i in 0..40 {
            let logger = logger.clone();
            handles.push(tokio::spawn(async move {
                logger
                    .log_execution(true, format!("run {}", i), Some(json!({"i": i})))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(logger.count_entries().await.unwrap(), 40);
    }

    #[test]
    fn test_code_hash_is_stable() {
        assert_eq!(code_hash("x"), code_hash("x"));
        assert_ne!(code_hash("x"), code_hash("y"));
        assert_eq!(code_hash("").len(), 64);
    }
}
