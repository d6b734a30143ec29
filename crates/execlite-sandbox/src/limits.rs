//! Resource ceilings and live usage sampling.
//!
//! [`ResourceLimiter`] is the single place where an observed violation turns
//! into a hard failure ([`ResourceLimiter::enforce_limit`]). Sampling targets a
//! specific pid (the sandboxed child) or, by default, the current process.

use crate::common::{
    get_process_cpu_seconds, get_process_memory, DEFAULT_MAX_CPU_PERCENT, DEFAULT_MAX_MEMORY_MB,
    DEFAULT_TIMEOUT_MS,
};
use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Memory,
    Cpu,
    Time,
    Output,
    ToolCalls,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Memory => "memory",
            ResourceKind::Cpu => "cpu",
            ResourceKind::Time => "time",
            ResourceKind::Output => "output",
            ResourceKind::ToolCalls => "tool call",
        })
    }
}

/// Resource ceilings for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_mb: u64,
    pub cpu_percent: f64,
    pub timeout_ms: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: DEFAULT_MAX_MEMORY_MB,
            cpu_percent: DEFAULT_MAX_CPU_PERCENT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ResourceLimits {
    pub fn memory_bytes(&self) -> u64 {
        self.memory_mb.saturating_mul(1024 * 1024)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// CPU-seconds budget for the whole run: wall timeout scaled by the CPU share.
    pub fn cpu_seconds_budget(&self) -> u64 {
        let secs = (self.timeout_ms as f64 / 1000.0) * (self.cpu_percent / 100.0);
        secs.ceil().max(1.0) as u64
    }

    pub fn validate(&self) -> Result<(), SandboxError> {
        if self.memory_mb == 0 {
            return Err(SandboxError::Config("memory limit must be positive".into()));
        }
        if !(self.cpu_percent.is_finite() && self.cpu_percent > 0.0) {
            return Err(SandboxError::Config(format!(
                "cpu limit must be a positive percentage, got {}",
                self.cpu_percent
            )));
        }
        if self.timeout_ms == 0 {
            return Err(SandboxError::Config("timeout must be positive".into()));
        }
        Ok(())
    }

    /// Apply the fields set in `partial`.
    pub fn merged(mut self, partial: &PartialLimits) -> Self {
        if let Some(m) = partial.memory_mb {
            self.memory_mb = m;
        }
        if let Some(c) = partial.cpu_percent {
            self.cpu_percent = c;
        }
        if let Some(t) = partial.timeout_ms {
            self.timeout_ms = t;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialLimits {
    pub memory_mb: Option<u64>,
    pub cpu_percent: Option<f64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceStats {
    pub memory_mb: f64,
    pub peak_memory_mb: f64,
    /// Average CPU share since the limiter started, in percent of one core.
    pub cpu_percent: f64,
    pub execution_time_ms: u64,
}

#[derive(Debug)]
pub struct ResourceLimiter {
    limits: Mutex<ResourceLimits>,
    pid: u32,
    started: Instant,
    cpu_baseline: Option<f64>,
    peak_memory_bytes: AtomicU64,
    last_elapsed_ms: AtomicU64,
}

impl ResourceLimiter {
    /// Limiter sampling the current process.
    pub fn new(limits: ResourceLimits) -> Self {
        Self::for_pid(limits, std::process::id())
    }

    /// Limiter sampling `pid`. CPU share is measured from this call onwards.
    pub fn for_pid(limits: ResourceLimits, pid: u32) -> Self {
        Self {
            limits: Mutex::new(limits),
            pid,
            started: Instant::now(),
            cpu_baseline: get_process_cpu_seconds(pid),
            peak_memory_bytes: AtomicU64::new(0),
            last_elapsed_ms: AtomicU64::new(0),
        }
    }

    pub fn limits(&self) -> ResourceLimits {
        *self.limits.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Replace the fields present in `partial`; the rest keep their values.
    pub fn reset_limits(&self, partial: PartialLimits) {
        let mut limits = self.limits.lock().unwrap_or_else(|p| p.into_inner());
        *limits = limits.merged(&partial);
    }

    /// Sample memory now. Unknown usage counts as within the limit.
    pub fn check_memory_usage(&self) -> bool {
        match self.sample_memory() {
            Some(bytes) => self.is_memory_within(bytes),
            None => true,
        }
    }

    pub fn check_cpu_usage(&self) -> bool {
        match self.sample_cpu_percent() {
            Some(pct) => self.is_cpu_within(pct),
            None => true,
        }
    }

    pub fn check_execution_time(&self, start: Instant) -> bool {
        start.elapsed() <= self.limits().timeout()
    }

    pub fn is_memory_within(&self, bytes: u64) -> bool {
        bytes <= self.limits().memory_bytes()
    }

    pub fn is_cpu_within(&self, percent: f64) -> bool {
        percent <= self.limits().cpu_percent
    }

    /// The one place a violation becomes an error.
    pub fn enforce_limit(
        &self,
        kind: ResourceKind,
        within_limit: bool,
        message: Option<&str>,
    ) -> Result<(), SandboxError> {
        if within_limit {
            return Ok(());
        }
        let limits = self.limits();
        let message = message.map(str::to_string).unwrap_or_else(|| match kind {
            ResourceKind::Memory => format!("exceeded {} MB", limits.memory_mb),
            ResourceKind::Cpu => format!("exceeded {}% CPU", limits.cpu_percent),
            ResourceKind::Time => format!("exceeded {} ms", limits.timeout_ms),
            ResourceKind::Output => "output too large".to_string(),
            ResourceKind::ToolCalls => "too many tool calls".to_string(),
        });
        Err(SandboxError::ResourceLimit { kind, message })
    }

    /// Live usage of the target process.
    pub fn get_resource_stats(&self) -> ResourceStats {
        let memory = self.sample_memory().unwrap_or(0);
        let elapsed = self.started.elapsed().as_millis() as u64;
        // Never report a smaller value than a previous call did.
        let prev = self.last_elapsed_ms.fetch_max(elapsed, Ordering::SeqCst);
        ResourceStats {
            memory_mb: to_mb(memory),
            peak_memory_mb: to_mb(self.peak_memory_bytes()),
            cpu_percent: self.sample_cpu_percent().unwrap_or(0.0),
            execution_time_ms: elapsed.max(prev),
        }
    }

    pub fn peak_memory_bytes(&self) -> u64 {
        self.peak_memory_bytes.load(Ordering::SeqCst)
    }

    /// Current RSS in bytes; updates the recorded peak.
    pub fn sample_memory(&self) -> Option<u64> {
        let bytes = get_process_memory(self.pid)?;
        self.peak_memory_bytes.fetch_max(bytes, Ordering::SeqCst);
        Some(bytes)
    }

    fn sample_cpu_percent(&self) -> Option<f64> {
        let now = get_process_cpu_seconds(self.pid)?;
        let used = now - self.cpu_baseline.unwrap_or(0.0);
        let wall = self.started.elapsed().as_secs_f64();
        if wall <= 0.0 {
            return Some(0.0);
        }
        Some((used / wall * 100.0).max(0.0))
    }
}

fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enforce_limit_is_the_conversion_point() {
        let limiter = ResourceLimiter::new(ResourceLimits::default());
        assert!(limiter.enforce_limit(ResourceKind::Memory, true, None).is_ok());
        let err = limiter
            .enforce_limit(ResourceKind::Time, false, Some("slow"))
            .unwrap_err();
        match err {
            SandboxError::ResourceLimit { kind, message } => {
                assert_eq!(kind, ResourceKind::Time);
                assert_eq!(message, "slow");
            }
            other => panic!("unexpected error: {other}"),
        }
        let err = limiter.enforce_limit(ResourceKind::Memory, false, None).unwrap_err();
        assert!(err.to_string().contains("256 MB"));
    }

    #[test]
    fn test_reset_limits_is_partial() {
        let limiter = ResourceLimiter::new(ResourceLimits::default());
        limiter.reset_limits(PartialLimits {
            memory_mb: Some(64),
            ..Default::default()
        });
        let limits = limiter.limits();
        assert_eq!(limits.memory_mb, 64);
        assert_eq!(limits.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(limiter.is_memory_within(64 * 1024 * 1024));
        assert!(!limiter.is_memory_within(64 * 1024 * 1024 + 1));
    }

    #[test]
    fn test_execution_time_check() {
        let limiter = ResourceLimiter::new(ResourceLimits {
            timeout_ms: 50,
            ..Default::default()
        });
        assert!(limiter.check_execution_time(Instant::now()));
        let past = Instant::now() - Duration::from_millis(200);
        assert!(!limiter.check_execution_time(past));
    }

    #[test]
    fn test_execution_time_is_monotonic() {
        let limiter = ResourceLimiter::new(ResourceLimits::default());
        let mut last = 0;
        for _ in 0..50 {
            let stats = limiter.get_resource_stats();
            assert!(stats.execution_time_ms >= last);
            last = stats.execution_time_ms;
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_memory_sampling_against_ceiling() {
        let generous = ResourceLimiter::new(ResourceLimits {
            memory_mb: 1024 * 1024,
            ..Default::default()
        });
        assert!(generous.check_memory_usage());
        assert!(generous.get_resource_stats().peak_memory_mb > 0.0);

        let tiny = ResourceLimiter::new(ResourceLimits {
            memory_mb: 1,
            ..Default::default()
        });
        assert!(!tiny.check_memory_usage());
    }

    #[test]
    fn test_validate_and_budget() {
        assert!(ResourceLimits::default().validate().is_ok());
        let bad = ResourceLimits {
            cpu_percent: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let limits = ResourceLimits {
            timeout_ms: 10_000,
            cpu_percent: 50.0,
            memory_mb: 1,
        };
        assert_eq!(limits.cpu_seconds_budget(), 5);
    }
}
