//! Common utilities for sandbox backends
//!
//! Shared resource defaults and live process sampling used by the resource
//! limiter and the process/VM backends.

// ============================================================
// Resource Limits Constants (Single Source of Truth)
// ============================================================

/// Default maximum memory limit in MB
pub const DEFAULT_MAX_MEMORY_MB: u64 = 256;

/// Default CPU ceiling in percent of one core
pub const DEFAULT_MAX_CPU_PERCENT: f64 = 100.0;

/// Default wall-clock timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Maximum number of processes inside a container (fork bomb protection)
pub const DEFAULT_MAX_PROCESSES: u64 = 64;

/// Memory check interval in milliseconds
pub const MEMORY_CHECK_INTERVAL_MS: u64 = 100;

/// Wall time before the average CPU share is checked; interpreter startup
/// runs several threads at once.
pub const CPU_CHECK_WARMUP_MS: u64 = 1_000;

/// Grace period on top of the execution timeout for backend setup and teardown
pub const TEARDOWN_GRACE_MS: u64 = 30_000;

/// Kernel clock ticks per second used by `/proc/<pid>/stat` (USER_HZ)
#[cfg(target_os = "linux")]
const USER_HZ: f64 = 100.0;

/// Get memory usage of a process in bytes (macOS version)
/// Returns None if memory information cannot be retrieved
#[cfg(target_os = "macos")]
pub fn get_process_memory(pid: u32) -> Option<u64> {
    let output = std::process::Command::new("ps")
        .args(["-o", "rss=", "-p", &pid.to_string()])
        .output()
        .ok()?;

    if output.status.success() {
        let rss_str = String::from_utf8_lossy(&output.stdout);
        // ps returns RSS in KB, convert to bytes
        if let Ok(rss_kb) = rss_str.trim().parse::<u64>() {
            return Some(rss_kb * 1024);
        }
    }

    None
}

/// Get memory usage of a process in bytes (Linux version)
/// Uses /proc/<pid>/status to read VmRSS
#[cfg(target_os = "linux")]
pub fn get_process_memory(pid: u32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;

    for line in status.lines() {
        if line.starts_with("VmRSS:") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                if let Ok(rss_kb) = parts[1].parse::<u64>() {
                    return Some(rss_kb * 1024);
                }
            }
            break;
        }
    }

    None
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn get_process_memory(_pid: u32) -> Option<u64> {
    None
}

/// Cumulative CPU time (user + system) consumed by a process, in seconds.
#[cfg(target_os = "linux")]
pub fn get_process_cpu_seconds(pid: u32) -> Option<f64> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // comm (field 2) may contain spaces; fields after the closing paren are stable
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // utime and stime are fields 14 and 15 overall, 12 and 13 after the paren
    let utime: f64 = fields.get(11)?.parse().ok()?;
    let stime: f64 = fields.get(12)?.parse().ok()?;
    Some((utime + stime) / USER_HZ)
}

/// Cumulative CPU time (user + system) consumed by a process, in seconds.
#[cfg(target_os = "macos")]
pub fn get_process_cpu_seconds(pid: u32) -> Option<f64> {
    let output = std::process::Command::new("ps")
        .args(["-o", "time=", "-p", &pid.to_string()])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_ps_time(String::from_utf8_lossy(&output.stdout).trim())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn get_process_cpu_seconds(_pid: u32) -> Option<f64> {
    None
}

/// `[[dd-]hh:]mm:ss[.ff]` as printed by `ps -o time=`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_ps_time(s: &str) -> Option<f64> {
    let (days, clock) = match s.split_once('-') {
        Some((d, rest)) => (d.parse::<f64>().ok()?, rest),
        None => (0.0, s),
    };
    let mut total = 0.0;
    for part in clock.split(':') {
        total = total * 60.0 + part.parse::<f64>().ok()?;
    }
    Some(days * 86_400.0 + total)
}

/// Keep the last `max` bytes of `text`, cut on a char boundary.
pub fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
