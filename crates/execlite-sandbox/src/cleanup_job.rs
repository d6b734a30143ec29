//! Background reclamation of orphaned sandbox containers.
//!
//! Only containers carrying [`MARKER_LABEL`] are ever considered, and the
//! marker is re-checked on every listed entry before removal. Containers still
//! owned by a live sandbox in the tracker are left alone.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::container_runtime::{ContainerRuntime, DockerCli};
use crate::error::SandboxError;
use crate::tracker::{SandboxTracker, MARKER_LABEL};
use execlite_core::config::CleanupSettings;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_PER_CYCLE: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Entries returned by the runtime.
    pub examined: usize,
    /// Marked, old enough and not owned by a live sandbox.
    pub eligible: usize,
    pub removed: usize,
    pub failed: usize,
    /// Eligible entries left for a later cycle because of the per-cycle cap.
    pub skipped: usize,
    /// The whole cycle was skipped because another one was still running.
    pub cycle_skipped: bool,
}

/// Clears the in-progress flag however the cycle ends, including a panic or
/// the cycle future being dropped.
struct CycleFlag<'a>(&'a AtomicBool);

impl Drop for CycleFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct JobInner {
    runtime: Arc<dyn ContainerRuntime>,
    tracker: SandboxTracker,
    max_age: Duration,
    max_per_cycle: usize,
    running: AtomicBool,
    cycles: AtomicU64,
    total_removed: AtomicU64,
}

impl JobInner {
    async fn run_cycle(&self) -> Result<CleanupReport, SandboxError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("cleanup cycle still running; skipping");
            return Ok(CleanupReport {
                cycle_skipped: true,
                ..Default::default()
            });
        }
        let _flag = CycleFlag(&self.running);
        let result = self.sweep().await;
        self.cycles.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn sweep(&self) -> Result<CleanupReport, SandboxError> {
        let listed = self.runtime.list_labeled(MARKER_LABEL, "true").await?;
        let now = chrono::Utc::now();
        let max_age = self.max_age.as_secs() as i64;

        let mut report = CleanupReport {
            examined: listed.len(),
            ..Default::default()
        };
        let eligible: Vec<_> = listed
            .into_iter()
            .filter(|c| c.has_marker())
            .filter(|c| c.age_secs(now).is_some_and(|age| age >= max_age))
            .filter(|c| !c.sandbox_id().is_some_and(|id| self.tracker.is_active(id)))
            .collect();
        report.eligible = eligible.len();
        report.skipped = eligible.len().saturating_sub(self.max_per_cycle);

        for container in eligible.into_iter().take(self.max_per_cycle) {
            match self.runtime.remove(&container.id).await {
                Ok(()) => {
                    report.removed += 1;
                    tracing::info!(container = %container.id, name = %container.name, "removed orphaned sandbox container");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(container = %container.id, "failed to remove orphaned container: {}", e);
                }
            }
        }
        self.total_removed
            .fetch_add(report.removed as u64, Ordering::SeqCst);
        Ok(report)
    }
}

pub struct ContainerCleanupJob {
    inner: Arc<JobInner>,
    task: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl ContainerCleanupJob {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        tracker: SandboxTracker,
        max_age: Duration,
        max_per_cycle: usize,
    ) -> Self {
        Self {
            inner: Arc::new(JobInner {
                runtime,
                tracker,
                max_age,
                max_per_cycle,
                running: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
                total_removed: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// Docker-backed job configured from settings.
    pub fn from_settings(settings: &CleanupSettings, tracker: SandboxTracker) -> Self {
        Self::new(
            Arc::new(DockerCli),
            tracker,
            Duration::from_secs(settings.orphan_max_age_secs),
            settings.max_per_cycle,
        )
    }

    /// Start periodic cycles. Returns `false` (and does nothing) if already started.
    pub fn start(&self, interval: Duration) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if task.is_some() {
            tracing::warn!("container cleanup job already running; start() ignored");
            return false;
        }
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let inner = Arc::clone(&inner);
                        // Cycles run detached so a slow one makes the next tick skip.
                        tokio::spawn(async move {
                            match inner.run_cycle().await {
                                Ok(report) if report.removed > 0 || report.failed > 0 => {
                                    tracing::info!(removed = report.removed, failed = report.failed, "container cleanup cycle finished");
                                }
                                Ok(_) => {}
                                Err(e) => tracing::warn!("container cleanup cycle failed: {}", e),
                            }
                        });
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        *task = Some((stop_tx, handle));
        tracing::debug!(interval_secs = interval.as_secs(), "container cleanup job started");
        true
    }

    pub async fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some((stop_tx, handle)) = task {
            let _ = stop_tx.send(true);
            if let Err(e) = handle.await {
                tracing::warn!("cleanup job task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    /// One cycle now.
    pub async fn run_once(&self) -> Result<CleanupReport, SandboxError> {
        self.inner.run_cycle().await
    }

    pub fn cycles_completed(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    pub fn total_removed(&self) -> u64 {
        self.inner.total_removed.load(Ordering::SeqCst)
    }
}

impl Drop for ContainerCleanupJob {
    fn drop(&mut self) {
        if let Some((stop_tx, handle)) = self
            .task
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            let _ = stop_tx.send(true);
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container_runtime::ContainerInfo;
    use crate::policy::SandboxType;
    use crate::tracker::{CREATED_LABEL, ID_LABEL};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct FakeRuntime {
        containers: Mutex<Vec<ContainerInfo>>,
        removed: Mutex<Vec<String>>,
        fail_ids: Vec<String>,
        fail_list: AtomicBool,
        panic_list: AtomicBool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn list_labeled(
            &self,
            _label: &str,
            _value: &str,
        ) -> Result<Vec<ContainerInfo>, SandboxError> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.panic_list.swap(false, Ordering::SeqCst) {
                panic!("runtime client bug");
            }
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(SandboxError::Container("daemon down".into()));
            }
            // Deliberately ignores the filter so the job's own checks are exercised.
            Ok(self.containers.lock().unwrap().clone())
        }

        async fn remove(&self, id: &str) -> Result<(), SandboxError> {
            if self.fail_ids.iter().any(|f| f == id) {
                return Err(SandboxError::Container("busy".into()));
            }
            self.containers.lock().unwrap().retain(|c| c.id != id);
            self.removed.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn container(id: &str, marked: bool, age_secs: i64, sandbox: Option<&str>) -> ContainerInfo {
        let created = Utc::now() - chrono::Duration::seconds(age_secs);
        let mut labels = BTreeMap::new();
        if marked {
            labels.insert(MARKER_LABEL.to_string(), "true".to_string());
        }
        labels.insert(CREATED_LABEL.to_string(), created.timestamp().to_string());
        if let Some(s) = sandbox {
            labels.insert(ID_LABEL.to_string(), s.to_string());
        }
        ContainerInfo {
            id: id.to_string(),
            name: id.to_string(),
            labels,
            created_at: Some(created),
        }
    }

    fn job(runtime: Arc<FakeRuntime>, tracker: SandboxTracker, cap: usize) -> ContainerCleanupJob {
        ContainerCleanupJob::new(runtime, tracker, DEFAULT_MAX_AGE, cap)
    }

    #[tokio::test]
    async fn test_only_marked_old_containers_removed() {
        let runtime = Arc::new(FakeRuntime {
            containers: Mutex::new(vec![
                container("old-marked", true, 7200, None),
                container("old-unmarked", false, 7200, None),
                container("young-marked", true, 60, None),
            ]),
            ..Default::default()
        });
        let job = job(runtime.clone(), SandboxTracker::new(), 10);
        let report = job.run_once().await.unwrap();
        assert_eq!(report.examined, 3);
        assert_eq!(report.eligible, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(*runtime.removed.lock().unwrap(), vec!["old-marked".to_string()]);
        assert_eq!(job.total_removed(), 1);
    }

    #[tokio::test]
    async fn test_active_sandbox_is_kept() {
        let tracker = SandboxTracker::new();
        let guard = tracker.register(SandboxType::Container);
        let runtime = Arc::new(FakeRuntime {
            containers: Mutex::new(vec![container("live", true, 7200, Some(guard.id()))]),
            ..Default::default()
        });
        let job = job(runtime.clone(), tracker, 10);
        assert_eq!(job.run_once().await.unwrap().removed, 0);
        guard.release();
        assert_eq!(job.run_once().await.unwrap().removed, 1);
    }

    #[tokio::test]
    async fn test_cap_and_failures() {
        let runtime = Arc::new(FakeRuntime {
            containers: Mutex::new(
                (0..5)
                    .map(|i| container(&format!("c{i}"), true, 7200, None))
                    .collect(),
            ),
            fail_ids: vec!["c0".to_string()],
            ..Default::default()
        });
        let job = job(runtime.clone(), SandboxTracker::new(), 3);
        let report = job.run_once().await.unwrap();
        assert_eq!(report.eligible, 5);
        assert_eq!(report.removed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 2);
        // c0 keeps failing, the rest drain over later cycles.
        let report = job.run_once().await.unwrap();
        assert_eq!(report.removed, 2);
        assert_eq!(runtime.containers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_cycle_does_not_block_later_cycles() {
        let runtime = Arc::new(FakeRuntime {
            containers: Mutex::new(vec![container("old", true, 7200, None)]),
            ..Default::default()
        });
        runtime.fail_list.store(true, Ordering::SeqCst);
        let job = job(runtime.clone(), SandboxTracker::new(), 10);
        assert!(job.run_once().await.is_err());
        runtime.fail_list.store(false, Ordering::SeqCst);
        assert_eq!(job.run_once().await.unwrap().removed, 1);
        assert_eq!(job.cycles_completed(), 2);
    }

    #[tokio::test]
    async fn test_panicking_cycle_does_not_block_later_cycles() {
        let runtime = Arc::new(FakeRuntime {
            containers: Mutex::new(vec![container("old", true, 7200, None)]),
            ..Default::default()
        });
        runtime.panic_list.store(true, Ordering::SeqCst);
        let job = Arc::new(job(runtime.clone(), SandboxTracker::new(), 10));
        let handle = tokio::spawn({
            let job = Arc::clone(&job);
            async move { job.run_once().await }
        });
        assert!(handle.await.unwrap_err().is_panic());

        let report = job.run_once().await.unwrap();
        assert!(!report.cycle_skipped);
        assert_eq!(report.removed, 1);
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let runtime = Arc::new(FakeRuntime {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let job = job(runtime, SandboxTracker::new(), 10);
        let (a, b) = tokio::join!(job.run_once(), job.run_once());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(!a.cycle_skipped);
        assert!(b.cycle_skipped);
    }

    #[tokio::test]
    async fn test_start_twice_and_stop() {
        let runtime = Arc::new(FakeRuntime {
            containers: Mutex::new(vec![container("old", true, 7200, None)]),
            ..Default::default()
        });
        let job = job(runtime.clone(), SandboxTracker::new(), 10);
        assert!(job.start(Duration::from_millis(20)));
        assert!(!job.start(Duration::from_millis(20)));
        tokio::time::sleep(Duration::from_millis(150)).await;
        job.stop().await;
        assert!(!job.is_running());
        assert_eq!(*runtime.removed.lock().unwrap(), vec!["old".to_string()]);
        assert!(job.cycles_completed() >= 1);
    }
}
