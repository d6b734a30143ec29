//! Minimal container runtime client used by the cleanup job.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::container::docker;
use crate::error::SandboxError;
use crate::tracker::{CREATED_LABEL, ID_LABEL, MARKER_LABEL};

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ContainerInfo {
    pub fn has_marker(&self) -> bool {
        self.labels.get(MARKER_LABEL).map(String::as_str) == Some("true")
    }

    pub fn sandbox_id(&self) -> Option<&str> {
        self.labels.get(ID_LABEL).map(String::as_str)
    }

    /// Age in seconds; `None` when the creation time is unknown.
    pub fn age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_at.map(|t| (now - t).num_seconds())
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Containers (running or not) carrying `label=value`.
    async fn list_labeled(&self, label: &str, value: &str)
        -> Result<Vec<ContainerInfo>, SandboxError>;

    /// Force-remove one container.
    async fn remove(&self, id: &str) -> Result<(), SandboxError>;
}

/// Talks to the local daemon through the docker CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerCli;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    names: String,
    #[serde(default)]
    labels: String,
    #[serde(default)]
    created_at: String,
}

fn parse_labels(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// `2024-05-01 10:00:00 +0000 UTC` as printed by `docker ps`.
fn parse_docker_time(raw: &str) -> Option<DateTime<Utc>> {
    let head: Vec<&str> = raw.split_whitespace().take(3).collect();
    if head.len() < 3 {
        return None;
    }
    DateTime::parse_from_str(&head.join(" "), "%Y-%m-%d %H:%M:%S %z")
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Parse `docker ps --format '{{json .}}'` output. Malformed lines are skipped.
pub fn parse_ps_output(output: &str) -> Vec<ContainerInfo> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<PsLine>(line) {
            Ok(ps) => Some(ps),
            Err(e) => {
                tracing::warn!("skipping unparsable docker ps line: {}", e);
                None
            }
        })
        .map(|ps| {
            let labels = parse_labels(&ps.labels);
            let created_at = labels
                .get(CREATED_LABEL)
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .or_else(|| parse_docker_time(&ps.created_at));
            ContainerInfo {
                id: ps.id,
                name: ps.names,
                labels,
                created_at,
            }
        })
        .collect()
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list_labeled(
        &self,
        label: &str,
        value: &str,
    ) -> Result<Vec<ContainerInfo>, SandboxError> {
        let filter = format!("label={label}={value}");
        let out = docker(&["ps", "-a", "--no-trunc", "--filter", &filter, "--format", "{{json .}}"])
            .await?;
        Ok(parse_ps_output(&out))
    }

    async fn remove(&self, id: &str) -> Result<(), SandboxError> {
        docker(&["rm", "-f", id]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ps_output() {
        let out = r#"{"ID":"abc123","Names":"execlite-1","Labels":"execlite.managed=true,execlite.created=1700000000,execlite.sandbox=s1","CreatedAt":"2023-11-14 22:13:20 +0000 UTC"}
not json
{"ID":"def456","Names":"other","Labels":"app=web","CreatedAt":"2024-05-01 10:00:00 +0000 UTC"}"#;
        let infos = parse_ps_output(out);
        assert_eq!(infos.len(), 2);
        assert!(infos[0].has_marker());
        assert_eq!(infos[0].sandbox_id(), Some("s1"));
        assert_eq!(infos[0].created_at.map(|t| t.timestamp()), Some(1_700_000_000));
        assert!(!infos[1].has_marker());
        let fallback = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single();
        assert_eq!(infos[1].created_at, fallback);
    }

    #[test]
    fn test_age() {
        let info = ContainerInfo {
            id: "x".into(),
            name: "x".into(),
            labels: BTreeMap::new(),
            created_at: Utc.timestamp_opt(1000, 0).single(),
        };
        let now = Utc.timestamp_opt(4600, 0).single().unwrap();
        assert_eq!(info.age_secs(now), Some(3600));
    }
}
