//! `execlite audit`

use anyhow::{Context, Result};
use execlite_core::audit::AuditLogger;
use execlite_core::config::PathsConfig;

pub async fn run(paths: &PathsConfig, n: usize) -> Result<()> {
    let logger = AuditLogger::new(paths.audit_log_path()).context("Failed to open audit log")?;
    for entry in logger.get_recent_logs(n).await? {
        println!("{}", serde_json::to_string(&entry)?);
    }
    Ok(())
}
