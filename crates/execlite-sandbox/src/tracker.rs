//! Registry of sandboxes that are currently alive.
//!
//! A sandbox is registered before its backend starts and released only after
//! teardown finished. [`SandboxGuard`] releases on drop, so early returns,
//! errors and cancelled futures cannot leave stale entries behind.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::policy::SandboxType;

/// Label every execlite container carries; the cleanup job only touches these.
pub const MARKER_LABEL: &str = "execlite.managed";
/// Unix seconds at container creation.
pub const CREATED_LABEL: &str = "execlite.created";
/// Tracker id of the owning sandbox.
pub const ID_LABEL: &str = "execlite.sandbox";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedSandbox {
    pub id: String,
    pub sandbox_type: SandboxType,
    pub labels: BTreeMap<String, String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    active: Mutex<HashMap<String, TrackedSandbox>>,
    total_created: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct SandboxTracker {
    inner: Arc<Inner>,
}

impl SandboxTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new sandbox and return the guard that owns its entry.
    pub fn register(&self, sandbox_type: SandboxType) -> SandboxGuard {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let created_at = chrono::Utc::now();
        let mut labels = BTreeMap::new();
        labels.insert(MARKER_LABEL.to_string(), "true".to_string());
        labels.insert(CREATED_LABEL.to_string(), created_at.timestamp().to_string());
        labels.insert(ID_LABEL.to_string(), id.clone());

        let entry = TrackedSandbox {
            id: id.clone(),
            sandbox_type,
            labels,
            created_at,
        };
        self.lock().insert(id.clone(), entry);
        self.inner.total_created.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(sandbox_id = %id, %sandbox_type, "sandbox registered");
        SandboxGuard {
            tracker: self.clone(),
            id,
            released: false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn snapshot(&self) -> Vec<TrackedSandbox> {
        let mut all: Vec<_> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    pub fn total_created(&self) -> u64 {
        self.inner.total_created.load(Ordering::SeqCst)
    }

    fn release(&self, id: &str) {
        if self.lock().remove(id).is_some() {
            tracing::debug!(sandbox_id = %id, "sandbox released");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TrackedSandbox>> {
        self.inner.active.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Owns one tracker entry.
#[derive(Debug)]
pub struct SandboxGuard {
    tracker: SandboxTracker,
    id: String,
    released: bool,
}

impl SandboxGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Release after teardown completed.
    pub fn release(mut self) {
        self.tracker.release(&self.id);
        self.released = true;
    }
}

impl Drop for SandboxGuard {
    fn drop(&mut self) {
        if !self.released {
            self.tracker.release(&self.id);
        }
    }
}
