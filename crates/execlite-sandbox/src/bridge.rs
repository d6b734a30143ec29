//! Host side of the tool bridge, plus the child-process supervision loop.
//!
//! Sandboxed programs call tools by writing one line to stdout:
//!
//! ```text
//! __EXECLITE_TOOL_CALL__{"id":1,"tool":"read_file","args":{"path":"a.txt"}}
//! ```
//!
//! and block until the host answers on stdin with
//! `{"id":1,"ok":true,"result":...}` or `{"id":1,"ok":false,"error":"..."}`.
//! Tool results are returned only to the program; they never appear in the
//! captured output unless the program prints them.

use crate::common::{tail, CPU_CHECK_WARMUP_MS, MEMORY_CHECK_INTERVAL_MS};
use crate::error::SandboxError;
use crate::limits::{ResourceKind, ResourceLimiter};
use crate::sandbox_backend::CancelSignal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;

pub const TOOL_CALL_MARKER: &str = "__EXECLITE_TOOL_CALL__";

/// Appended to captured output that hit the cap.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Longest stdout line kept whole; longer runs are flushed as plain output.
const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// How long to keep draining pipes after the child exited.
const PIPE_DRAIN_MS: u64 = 500;

/// Executes tool calls made from inside a sandbox.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, tool: &str, args: Value) -> anyhow::Result<Value>;
}

/// Invoker for executions that have no tools bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvoker;

#[async_trait]
impl ToolInvoker for NoopInvoker {
    async fn invoke(&self, tool: &str, _args: Value) -> anyhow::Result<Value> {
        anyhow::bail!("no tool invoker configured (called '{tool}')")
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallRequest {
    id: u64,
    tool: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
struct ToolCallResponse {
    id: u64,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Why the host stopped the child before it exited on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    Timeout { after_ms: u64 },
    ResourceLimit { kind: ResourceKind, message: String },
}

/// What a backend observed while a program ran.
#[derive(Debug, Clone, Default)]
pub struct RawExecution {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub termination: Option<Termination>,
    pub tool_calls: usize,
    /// Bytes of tool results delivered to the program.
    pub tool_output_bytes: u64,
    pub peak_memory_bytes: u64,
    pub duration: Duration,
    pub truncated: bool,
}

impl RawExecution {
    pub fn succeeded(&self) -> bool {
        self.termination.is_none() && self.exit_code == Some(0)
    }

    /// Short failure description for a non-successful run.
    pub fn failure_message(&self) -> String {
        match &self.termination {
            Some(Termination::Timeout { after_ms }) => {
                format!("execution timed out after {after_ms} ms")
            }
            Some(Termination::ResourceLimit { kind, message }) => {
                format!("{kind} limit exceeded: {message}")
            }
            None => {
                let stderr = self.stderr.trim();
                let detail = if stderr.is_empty() {
                    self.stdout.trim()
                } else {
                    stderr
                };
                let code = self
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                if detail.is_empty() {
                    format!("process exited with status {code}")
                } else {
                    format!("process exited with status {code}: {}", tail(detail, 2000))
                }
            }
        }
    }
}

pub struct DriveOptions<'a> {
    pub invoker: &'a dyn ToolInvoker,
    /// Ceilings for the run; every stop the host imposes goes through it.
    pub limiter: &'a ResourceLimiter,
    /// Sample the child's memory and CPU every tick. Off when the child only
    /// fronts the real workload, as `docker start` does.
    pub sample_usage: bool,
    pub cancel: &'a CancelSignal,
    pub max_output_bytes: usize,
    pub max_tool_calls: usize,
    /// Kill the child's whole process group on termination.
    pub kill_process_group: bool,
}

/// Route one check through the limiter. A time violation stops the child as
/// a timeout; any other violation as a resource limit.
pub(crate) fn enforce(
    limiter: &ResourceLimiter,
    kind: ResourceKind,
    within_limit: bool,
    message: Option<&str>,
    elapsed: Duration,
) -> Option<Termination> {
    match limiter.enforce_limit(kind, within_limit, message) {
        Ok(()) => None,
        Err(SandboxError::ResourceLimit {
            kind: ResourceKind::Time,
            ..
        }) => Some(Termination::Timeout {
            after_ms: elapsed.as_millis() as u64,
        }),
        Err(SandboxError::ResourceLimit { kind, message }) => {
            Some(Termination::ResourceLimit { kind, message })
        }
        Err(other) => Some(Termination::ResourceLimit {
            kind,
            message: other.to_string(),
        }),
    }
}

/// Bytes at the end of `bytes` that start a UTF-8 sequence but do not finish it.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        let b = bytes[i];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let needed = match b {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        let have = bytes.len() - i;
        return if have < needed { have } else { 0 };
    }
    0
}

/// Capped text accumulator.
struct Capture {
    text: String,
    /// Incomplete UTF-8 sequence carried into the next push.
    pending: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl Capture {
    fn new(cap: usize) -> Self {
        Self {
            text: String::new(),
            pending: Vec::new(),
            cap,
            truncated: false,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        if self.truncated {
            return;
        }
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);
        let keep = incomplete_utf8_tail(&buf);
        self.pending = buf.split_off(buf.len() - keep);
        self.append(&String::from_utf8_lossy(&buf));
    }

    fn append(&mut self, chunk: &str) {
        let room = self.cap.saturating_sub(self.text.len());
        if chunk.len() <= room {
            self.text.push_str(&chunk);
            return;
        }
        let mut end = room;
        while !chunk.is_char_boundary(end) {
            end -= 1;
        }
        self.text.push_str(&chunk[..end]);
        self.truncated = true;
    }

    fn finish(mut self) -> (String, bool) {
        if !self.truncated && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.append(&String::from_utf8_lossy(&rest));
        }
        if self.truncated {
            self.text.push_str(TRUNCATION_MARKER);
        }
        (self.text, self.truncated)
    }
}

struct BridgeState<'a> {
    opts: &'a DriveOptions<'a>,
    stdout: Capture,
    stderr: Capture,
    tool_calls: usize,
    tool_output_bytes: u64,
}

impl BridgeState<'_> {
    /// Handle one stdout line; a returned termination stops the child.
    async fn on_stdout_line(
        &mut self,
        line: Vec<u8>,
        stdin: &mut Option<ChildStdin>,
        deadline: TokioInstant,
        started: Instant,
    ) -> Option<Termination> {
        let marker = TOOL_CALL_MARKER.as_bytes();
        let Some(pos) = find_subslice(&line, marker) else {
            self.stdout.push(&line);
            return None;
        };
        // Anything printed before the marker on the same line is ordinary output.
        self.stdout.push(&line[..pos]);
        let payload = &line[pos + marker.len()..];

        let over_cap = enforce(
            self.opts.limiter,
            ResourceKind::ToolCalls,
            self.tool_calls < self.opts.max_tool_calls,
            Some(&format!("more than {} tool calls", self.opts.max_tool_calls)),
            started.elapsed(),
        );
        if over_cap.is_some() {
            return over_cap;
        }
        self.tool_calls += 1;

        let response = match serde_json::from_slice::<ToolCallRequest>(payload) {
            Ok(req) => {
                tracing::debug!(tool = %req.tool, id = req.id, "sandbox tool call");
                let call = self.opts.invoker.invoke(&req.tool, req.args);
                match tokio::time::timeout_at(deadline, call).await {
                    Ok(Ok(result)) => {
                        let size = serde_json::to_vec(&result).map(|v| v.len()).unwrap_or(0);
                        self.tool_output_bytes += size as u64;
                        ToolCallResponse {
                            id: req.id,
                            ok: true,
                            result: Some(result),
                            error: None,
                        }
                    }
                    Ok(Err(e)) => ToolCallResponse {
                        id: req.id,
                        ok: false,
                        result: None,
                        error: Some(format!("{e:#}")),
                    },
                    Err(_) => {
                        return enforce(
                            self.opts.limiter,
                            ResourceKind::Time,
                            false,
                            None,
                            started.elapsed(),
                        )
                    }
                }
            }
            Err(e) => ToolCallResponse {
                id: 0,
                ok: false,
                result: None,
                error: Some(format!("malformed tool call: {e}")),
            },
        };

        if let Some(pipe) = stdin.as_mut() {
            let mut bytes = match serde_json::to_vec(&response) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("failed to encode tool response: {}", e);
                    return None;
                }
            };
            bytes.push(b'\n');
            let write = async {
                pipe.write_all(&bytes).await?;
                pipe.flush().await
            };
            if let Err(e) = write.await {
                tracing::debug!("child stdin closed before tool response: {}", e);
                *stdin = None;
            }
        }
        None
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn pump_lines<R>(stream: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        let buf = match reader.fill_buf().await {
            Ok(b) => b,
            Err(_) => break,
        };
        if buf.is_empty() {
            break;
        }
        let (consumed, complete) = match buf.iter().position(|b| *b == b'\n') {
            Some(i) => {
                line.extend_from_slice(&buf[..=i]);
                (i + 1, true)
            }
            None => {
                line.extend_from_slice(buf);
                (buf.len(), false)
            }
        };
        reader.consume(consumed);
        if (complete || line.len() >= MAX_LINE_BYTES)
            && tx.send(std::mem::take(&mut line)).await.is_err()
        {
            return;
        }
    }
    if !line.is_empty() {
        let _ = tx.send(line).await;
    }
}

async fn pump_chunks<R>(mut stream: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8192];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// A child killed by SIGXCPU ran out of its RLIMIT_CPU budget.
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn killed_by_cpu_limit(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(nix::sys::signal::Signal::SIGXCPU as i32)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn killed_by_cpu_limit(_status: &std::process::ExitStatus) -> bool {
    false
}

/// One limiter tick: wall time always, memory and CPU share when sampling.
fn check_usage(opts: &DriveOptions<'_>, started: Instant) -> Option<Termination> {
    let limiter = opts.limiter;
    let elapsed = started.elapsed();
    let timed_out = enforce(
        limiter,
        ResourceKind::Time,
        limiter.check_execution_time(started),
        None,
        elapsed,
    );
    if timed_out.is_some() || !opts.sample_usage {
        return timed_out;
    }
    let memory = enforce(
        limiter,
        ResourceKind::Memory,
        limiter.check_memory_usage(),
        None,
        elapsed,
    );
    if memory.is_some() || elapsed < Duration::from_millis(CPU_CHECK_WARMUP_MS) {
        return memory;
    }
    enforce(
        limiter,
        ResourceKind::Cpu,
        limiter.check_cpu_usage(),
        None,
        elapsed,
    )
}

/// Kill the child (and its process group when requested).
pub fn kill_child(child: &mut Child, process_group: bool) {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    if process_group {
        if let Some(pid) = child.id() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    let _ = process_group;
    let _ = child.start_kill();
}

/// Run a spawned child to completion under the bridge protocol and the
/// limiter's ceilings. The child must have piped stdin/stdout/stderr.
pub async fn drive_child(
    mut child: Child,
    opts: DriveOptions<'_>,
) -> Result<RawExecution, SandboxError> {
    let started = Instant::now();
    let deadline = TokioInstant::now() + opts.limiter.limits().timeout();

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SandboxError::Protocol("child stdout is not piped".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SandboxError::Protocol("child stderr is not piped".into()))?;
    let mut stdin = child.stdin.take();

    let (out_tx, mut out_rx) = mpsc::channel(64);
    let (err_tx, mut err_rx) = mpsc::channel(64);
    let out_task = tokio::spawn(pump_lines(stdout, out_tx));
    let err_task = tokio::spawn(pump_chunks(stderr, err_tx));

    let mut state = BridgeState {
        opts: &opts,
        stdout: Capture::new(opts.max_output_bytes),
        stderr: Capture::new(opts.max_output_bytes),
        tool_calls: 0,
        tool_output_bytes: 0,
    };

    let mut ticker = tokio::time::interval(Duration::from_millis(MEMORY_CHECK_INTERVAL_MS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut status = None;
    let mut termination = None;
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut drain_deadline = deadline;

    loop {
        if status.is_some() && !stdout_open && !stderr_open {
            break;
        }
        tokio::select! {
            line = out_rx.recv(), if stdout_open => match line {
                Some(line) => {
                    if let Some(t) = state.on_stdout_line(line, &mut stdin, deadline, started).await {
                        termination = Some(t);
                        break;
                    }
                }
                None => stdout_open = false,
            },
            chunk = err_rx.recv(), if stderr_open => match chunk {
                Some(chunk) => state.stderr.push(&chunk),
                None => stderr_open = false,
            },
            res = child.wait(), if status.is_none() => {
                status = Some(res?);
                // Orphaned grandchildren may hold the pipes open.
                drain_deadline = deadline.min(TokioInstant::now() + Duration::from_millis(PIPE_DRAIN_MS));
            }
            _ = tokio::time::sleep_until(drain_deadline), if status.is_some() => break,
            _ = tokio::time::sleep_until(deadline), if status.is_none() => {
                termination = enforce(opts.limiter, ResourceKind::Time, false, None, started.elapsed());
                break;
            }
            _ = opts.cancel.cancelled(), if status.is_none() => {
                termination = enforce(
                    opts.limiter,
                    ResourceKind::Time,
                    false,
                    Some("stopped at the hard deadline"),
                    started.elapsed(),
                );
                break;
            }
            _ = ticker.tick(), if status.is_none() => {
                if let Some(t) = check_usage(&opts, started) {
                    termination = Some(t);
                    break;
                }
            }
        }
    }

    if termination.is_some() && status.is_none() {
        kill_child(&mut child, opts.kill_process_group);
        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(s)) => status = Some(s),
            Ok(Err(e)) => tracing::warn!("failed to reap sandbox child: {}", e),
            Err(_) => tracing::warn!("sandbox child did not exit after SIGKILL"),
        }
    } else if opts.kill_process_group {
        // Reap anything the program left running in its group.
        kill_child(&mut child, true);
    }
    drop(stdin);
    out_task.abort();
    err_task.abort();

    // Pick up whatever the readers had already queued.
    while let Ok(line) = out_rx.try_recv() {
        if termination.is_none() {
            state.stdout.push(&line);
        }
    }
    while let Ok(chunk) = err_rx.try_recv() {
        state.stderr.push(&chunk);
    }

    if termination.is_none() {
        if let Some(status) = &status {
            termination = enforce(
                opts.limiter,
                ResourceKind::Cpu,
                !killed_by_cpu_limit(status),
                Some("CPU time budget exhausted"),
                started.elapsed(),
            );
        }
    }

    let peak_memory_bytes = if opts.sample_usage {
        let stats = opts.limiter.get_resource_stats();
        tracing::debug!(
            peak_memory_mb = stats.peak_memory_mb,
            elapsed_ms = stats.execution_time_ms,
            "sandbox child usage"
        );
        opts.limiter.peak_memory_bytes()
    } else {
        0
    };
    let (stdout, truncated) = state.stdout.finish();
    let (stderr, _) = state.stderr.finish();

    Ok(RawExecution {
        stdout,
        stderr,
        exit_code: status.and_then(|s| s.code()),
        termination,
        tool_calls: state.tool_calls,
        tool_output_bytes: state.tool_output_bytes,
        peak_memory_bytes,
        duration: started.elapsed(),
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ResourceLimits;
    use serde_json::json;
    use std::process::Stdio;
    use tokio::process::Command;

    struct EchoInvoker;

    #[async_trait]
    impl ToolInvoker for EchoInvoker {
        async fn invoke(&self, tool: &str, args: Value) -> anyhow::Result<Value> {
            if tool == "fail" {
                anyhow::bail!("tool failed");
            }
            Ok(json!({ "tool": tool, "args": args }))
        }
    }

    fn sh(script: &str) -> Option<Child> {
        which::which("sh").ok()?;
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .ok()
    }

    fn limiter(timeout_ms: u64) -> ResourceLimiter {
        ResourceLimiter::new(ResourceLimits {
            timeout_ms,
            ..Default::default()
        })
    }

    fn options<'a>(invoker: &'a dyn ToolInvoker, limiter: &'a ResourceLimiter) -> DriveOptions<'a> {
        DriveOptions {
            invoker,
            limiter,
            sample_usage: false,
            cancel: Box::leak(Box::new(CancelSignal::default())),
            max_output_bytes: 1024,
            max_tool_calls: 2,
            kill_process_group: false,
        }
    }

    #[test]
    fn test_capture_truncates_on_char_boundary() {
        let mut c = Capture::new(5);
        c.push("abcdé".as_bytes());
        c.push(b"more");
        let (text, truncated) = c.finish();
        assert!(truncated);
        assert_eq!(text, format!("abcd{TRUNCATION_MARKER}"));
    }

    #[tokio::test]
    async fn test_plain_output_and_exit_code() {
        let Some(child) = sh("echo hello; echo oops >&2; exit 3") else {
            return;
        };
        let limiter = limiter(5000);
        let raw = drive_child(child, options(&NoopInvoker, &limiter)).await.unwrap();
        assert_eq!(raw.stdout, "hello\n");
        assert_eq!(raw.stderr, "oops\n");
        assert_eq!(raw.exit_code, Some(3));
        assert!(!raw.succeeded());
        assert!(raw.failure_message().contains("oops"));
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let script = format!(
            "printf 'pre{m}{{\"id\":1,\"tool\":\"read\",\"args\":{{\"p\":1}}}}\\n'; read reply; echo \"got $reply\"",
            m = TOOL_CALL_MARKER
        );
        let Some(child) = sh(&script) else {
            return;
        };
        let limiter = limiter(5000);
        let raw = drive_child(child, options(&EchoInvoker, &limiter)).await.unwrap();
        assert!(raw.succeeded());
        assert_eq!(raw.tool_calls, 1);
        assert!(raw.tool_output_bytes > 0);
        assert!(raw.stdout.starts_with("pregot {\"id\":1,\"ok\":true"));
        assert!(!raw.stdout.contains(TOOL_CALL_MARKER));
    }

    #[tokio::test]
    async fn test_tool_call_cap() {
        let line = format!("{TOOL_CALL_MARKER}{{\"id\":1,\"tool\":\"t\"}}");
        let script = format!(
            "for i in 1 2 3; do echo '{line}'; read reply; done; sleep 5"
        );
        let Some(child) = sh(&script) else {
            return;
        };
        let limiter = limiter(5000);
        let raw = drive_child(child, options(&EchoInvoker, &limiter)).await.unwrap();
        assert_eq!(
            raw.termination,
            Some(Termination::ResourceLimit {
                kind: ResourceKind::ToolCalls,
                message: "more than 2 tool calls".to_string(),
            })
        );
        assert_eq!(raw.tool_calls, 2);
    }

    #[tokio::test]
    async fn test_timeout_terminates_child() {
        let Some(child) = sh("sleep 10") else {
            return;
        };
        let limiter = limiter(200);
        let raw = drive_child(child, options(&NoopInvoker, &limiter)).await.unwrap();
        assert!(matches!(raw.termination, Some(Termination::Timeout { .. })));
        assert!(raw.duration < Duration::from_secs(5));
        assert!(raw.failure_message().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancel_stops_child() {
        let Some(child) = sh("sleep 10") else {
            return;
        };
        let limiter = limiter(30_000);
        let (tx, cancel) = CancelSignal::channel();
        let opts = DriveOptions {
            cancel: &cancel,
            ..options(&NoopInvoker, &limiter)
        };
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = tx.send(true);
        });
        let raw = drive_child(child, opts).await.unwrap();
        assert!(matches!(raw.termination, Some(Termination::Timeout { .. })));
        assert!(raw.duration < Duration::from_secs(5));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_memory_ceiling_goes_through_limiter() {
        if which::which("python3").is_err() {
            return;
        }
        let child = Command::new("python3")
            .args(["-c", "import time\nx = b'x' * (96 * 1024 * 1024)\ntime.sleep(10)\n"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        let limiter = ResourceLimiter::for_pid(
            ResourceLimits {
                memory_mb: 32,
                timeout_ms: 8_000,
                ..Default::default()
            },
            pid,
        );
        let opts = DriveOptions {
            sample_usage: true,
            ..options(&NoopInvoker, &limiter)
        };
        let raw = drive_child(child, opts).await.unwrap();
        assert_eq!(
            raw.termination,
            Some(Termination::ResourceLimit {
                kind: ResourceKind::Memory,
                message: "exceeded 32 MB".to_string(),
            })
        );
        assert!(raw.peak_memory_bytes > 32 * 1024 * 1024);
    }

    #[test]
    fn test_capture_keeps_split_multibyte_chars() {
        let mut c = Capture::new(64);
        let bytes = "añ€😀".as_bytes();
        for b in bytes {
            c.push(std::slice::from_ref(b));
        }
        let (text, truncated) = c.finish();
        assert!(!truncated);
        assert_eq!(text, "añ€😀");

        let mut c = Capture::new(64);
        c.push(&[b'x', 0xE2, 0x82]);
        let (text, _) = c.finish();
        assert_eq!(text, "x\u{FFFD}");
    }

    #[test]
    fn test_enforce_maps_time_to_timeout() {
        let limiter = limiter(100);
        let elapsed = Duration::from_millis(150);
        assert_eq!(
            enforce(&limiter, ResourceKind::Time, false, None, elapsed),
            Some(Termination::Timeout { after_ms: 150 })
        );
        assert_eq!(enforce(&limiter, ResourceKind::Cpu, true, None, elapsed), None);
        assert!(matches!(
            enforce(&limiter, ResourceKind::Cpu, false, None, elapsed),
            Some(Termination::ResourceLimit {
                kind: ResourceKind::Cpu,
                ..
            })
        ));
    }
}
