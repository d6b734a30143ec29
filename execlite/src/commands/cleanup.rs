//! `execlite cleanup`

use anyhow::{Context, Result};
use execlite_core::config::{CleanupSettings, PathsConfig};
use execlite_executor::WorkspaceManager;
use execlite_sandbox::container::ContainerBackend;
use execlite_sandbox::{ContainerCleanupJob, SandboxTracker};
use std::time::Duration;

pub async fn run(paths: &PathsConfig, containers: bool, max_age_secs: Option<u64>) -> Result<()> {
    let settings = CleanupSettings::from_env();
    let max_age = Duration::from_secs(max_age_secs.unwrap_or(settings.orphan_max_age_secs));

    let workspaces = WorkspaceManager::new(paths.sessions_dir())
        .context("Failed to open session workspace root")?;
    let removed = workspaces.cleanup_old_sessions(max_age)?;
    println!("Removed {} stale session workspace(s)", removed);

    if !containers {
        return Ok(());
    }
    if !ContainerBackend::is_available().await {
        anyhow::bail!("docker is not available; cannot sweep containers");
    }
    let settings = CleanupSettings {
        orphan_max_age_secs: max_age.as_secs(),
        ..settings
    };
    // A fresh tracker: nothing is active in this process.
    let job = ContainerCleanupJob::from_settings(&settings, SandboxTracker::new());
    let report = job.run_once().await?;
    println!(
        "Containers: examined {}, eligible {}, removed {}, failed {}, skipped {}",
        report.examined, report.eligible, report.removed, report.failed, report.skipped
    );
    Ok(())
}
