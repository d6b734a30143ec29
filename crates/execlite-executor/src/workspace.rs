//! Per-session scratch directories under one root.
//!
//! Layout: `<root>/<session_id>/`. Session ids are single path components;
//! anything that could climb out of the root is rejected.

use execlite_core::config::PathsConfig;
use execlite_core::path_validation::validate_component;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("session already exists: {0}")]
    AlreadyExists(String),

    #[error("workspace I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> WorkspaceError + '_ {
    move |source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Manager rooted at `root`; the directory is created if missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(io_err(&root))?;
        Ok(Self { root })
    }

    /// Sessions under `<data_dir>/sessions`.
    pub fn from_config() -> Result<Self, WorkspaceError> {
        Self::new(PathsConfig::from_env().sessions_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf, WorkspaceError> {
        validate_component(session_id, "session id")
            .map_err(|_| WorkspaceError::InvalidSessionId(session_id.to_string()))?;
        Ok(self.root.join(session_id))
    }

    /// Create an empty directory for `session_id`. Fails if it already exists.
    pub fn create_session(&self, session_id: &str) -> Result<Session, WorkspaceError> {
        let path = self.session_path(session_id)?;
        match std::fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(WorkspaceError::AlreadyExists(session_id.to_string()));
            }
            Err(e) => return Err(io_err(&path)(e)),
        }
        tracing::debug!(session_id, path = %path.display(), "Created session workspace");
        Ok(Session {
            session_id: session_id.to_string(),
            path,
        })
    }

    /// Create a session with a fresh random id.
    pub fn create_ephemeral_session(&self) -> Result<Session, WorkspaceError> {
        let id = format!("session-{}", uuid::Uuid::new_v4().simple());
        self.create_session(&id)
    }

    pub fn session_exists(&self, session_id: &str) -> bool {
        self.session_path(session_id)
            .map(|p| p.is_dir())
            .unwrap_or(false)
    }

    /// Session ids currently on disk, sorted.
    pub fn list_sessions(&self) -> Result<Vec<String>, WorkspaceError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(io_err(&self.root))? {
            let entry = entry.map_err(io_err(&self.root))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove a session directory. Returns whether anything was removed;
    /// cleaning a missing session is not an error.
    pub fn cleanup_session(&self, session_id: &str) -> Result<bool, WorkspaceError> {
        let path = self.session_path(session_id)?;
        match std::fs::remove_dir_all(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    /// Remove sessions whose directory mtime is older than `max_age`.
    /// Entries that cannot be inspected or removed are skipped with a warning.
    pub fn cleanup_old_sessions(&self, max_age: Duration) -> Result<usize, WorkspaceError> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root).map_err(io_err(&self.root))? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| now.duration_since(mtime).ok());
            let Some(age) = age else { continue };
            if age <= max_age {
                continue;
            }
            match std::fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove stale session {}: {}", path.display(), e),
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Removed stale session workspaces");
        }
        Ok(removed)
    }
}
