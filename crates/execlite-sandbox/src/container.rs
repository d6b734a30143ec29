//! Container tier, driven through the docker CLI.
//!
//! Each execution gets a fresh container labelled with
//! [`MARKER_LABEL`](crate::tracker::MARKER_LABEL) and its creation time, so the
//! cleanup job can reclaim anything a crashed host left behind. Setup steps
//! are bounded by the execution timeout and the manager's stop signal, and
//! the container is force-removed (awaited) before `execute` returns. The
//! drop guard only matters if the whole future is abandoned.

use async_trait::async_trait;
use execlite_core::Language;
use std::future::Future;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::Instant as TokioInstant;

use crate::bridge::{drive_child, enforce, DriveOptions, RawExecution};
use crate::common::DEFAULT_MAX_PROCESSES;
use crate::error::SandboxError;
use crate::limits::{ResourceKind, ResourceLimiter};
use crate::policy::{NetworkMode, NetworkPolicy, SandboxConfig, SandboxType};
use crate::process::ScratchDir;
use crate::runtime;
use crate::sandbox_backend::{CancelSignal, ExecutionContext, SandboxBackend};
use crate::tracker::{CREATED_LABEL, ID_LABEL, MARKER_LABEL};

const WORKDIR: &str = "/sandbox";
/// nobody:nogroup
const SANDBOX_USER: &str = "65534:65534";
const PULL_ATTEMPTS: u32 = 3;

/// Run `docker args...` and return trimmed stdout.
pub(crate) async fn docker(args: &[&str]) -> Result<String, SandboxError> {
    let output = Command::new("docker")
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| SandboxError::unavailable("container", format!("docker: {e}")))?;
    if !output.status.success() {
        return Err(SandboxError::Container(format!(
            "docker {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Name every sandbox container gets; removal works by name even when
/// `docker create` never reported an id.
pub(crate) fn container_name(sandbox_id: &str) -> String {
    format!("execlite-{sandbox_id}")
}

/// Run one setup step until `deadline` or a stop request. Cutting a step
/// short is safe: the docker CLI is killed on drop and the guard still runs.
async fn bounded<F: Future>(
    step: F,
    deadline: TokioInstant,
    cancel: &CancelSignal,
    timeout_ms: u64,
) -> Result<F::Output, SandboxError> {
    tokio::select! {
        out = step => Ok(out),
        _ = tokio::time::sleep_until(deadline) => Err(SandboxError::Timeout(timeout_ms)),
        _ = cancel.cancelled() => Err(SandboxError::Timeout(timeout_ms)),
    }
}

/// Removes the container on drop unless it was already removed.
struct ContainerGuard {
    name: Option<String>,
}

impl ContainerGuard {
    fn new(name: String) -> Self {
        Self { name: Some(name) }
    }

    async fn remove(mut self) {
        let Some(name) = self.name.take() else {
            return;
        };
        match docker(&["rm", "-f", &name]).await {
            Ok(_) => tracing::debug!(container = %name, "container removed"),
            // Creation failed before the container existed.
            Err(e) if e.to_string().contains("No such container") => {}
            Err(e) => tracing::warn!(container = %name, "failed to remove sandbox container: {}", e),
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let Some(id) = self.name.take() else {
            return;
        };
        tracing::warn!(container = %id, "sandbox future abandoned; removing container in background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = docker(&["rm", "-f", &id]).await;
                });
            }
            Err(_) => {
                let _ = std::process::Command::new("docker")
                    .args(["rm", "-f", &id])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status();
            }
        }
    }
}

pub struct ContainerBackend {
    python_image: String,
    node_image: String,
}

impl Default for ContainerBackend {
    fn default() -> Self {
        Self::from_config(&SandboxConfig::default())
    }
}

impl ContainerBackend {
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            python_image: config.python_image.clone(),
            node_image: config.node_image.clone(),
        }
    }

    fn image(&self, language: Language) -> &str {
        match language {
            Language::Python => &self.python_image,
            Language::TypeScript => &self.node_image,
        }
    }

    /// Whether a docker daemon answers.
    pub async fn is_available() -> bool {
        which::which("docker").is_ok()
            && docker(&["version", "--format", "{{.Server.Version}}"])
                .await
                .is_ok()
    }

    async fn ensure_image(
        &self,
        image: &str,
        deadline: TokioInstant,
        ctx: &ExecutionContext,
    ) -> Result<(), SandboxError> {
        let timeout_ms = ctx.limits.timeout_ms;
        let inspect_args = ["image", "inspect", image];
        let inspect = docker(&inspect_args);
        if bounded(inspect, deadline, &ctx.cancel, timeout_ms).await?.is_ok() {
            return Ok(());
        }
        let mut last_err = None;
        for attempt in 1..=PULL_ATTEMPTS {
            crate::info_log!("pulling image {} (attempt {}/{})", image, attempt, PULL_ATTEMPTS);
            let pull_args = ["pull", "--quiet", image];
            let pull = docker(&pull_args);
            match bounded(pull, deadline, &ctx.cancel, timeout_ms).await? {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::warn!("image pull failed: {}", e);
                    last_err = Some(e);
                    let backoff = tokio::time::sleep(Duration::from_secs(u64::from(attempt)));
                    bounded(backoff, deadline, &ctx.cancel, timeout_ms).await?;
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| SandboxError::Container(format!("could not pull {image}"))))
    }

    async fn network_args(policy: &NetworkPolicy) -> Vec<String> {
        match policy.mode {
            NetworkMode::None => vec!["--network".into(), "none".into()],
            NetworkMode::Full => Vec::new(),
            NetworkMode::Restricted => {
                if policy.allowed_domains.is_empty() {
                    return vec!["--network".into(), "none".into()];
                }
                // Only allow-listed names resolve inside the container.
                let mut args = vec!["--dns".to_string(), "127.0.0.1".to_string()];
                for domain in &policy.allowed_domains {
                    match tokio::net::lookup_host((domain.as_str(), 443)).await {
                        Ok(addrs) => {
                            for addr in addrs {
                                args.push("--add-host".into());
                                args.push(format!("{}:{}", domain, addr.ip()));
                            }
                        }
                        Err(e) => tracing::warn!("cannot resolve allowed domain {}: {}", domain, e),
                    }
                }
                args
            }
        }
    }

    fn command_for(language: Language) -> Vec<String> {
        let main = format!("{}/{}", WORKDIR, runtime::main_file(language));
        match language {
            Language::Python => vec!["python3".into(), "-s".into(), "-B".into(), main],
            Language::TypeScript => vec![
                "node".into(),
                "--experimental-strip-types".into(),
                "--no-warnings".into(),
                main,
            ],
        }
    }

    fn create_args(
        &self,
        language: Language,
        ctx: &ExecutionContext,
        network: Vec<String>,
    ) -> Vec<String> {
        let created = chrono::Utc::now().timestamp();
        let memory = format!("{}m", ctx.limits.memory_mb);
        let mut args: Vec<String> = vec![
            "create".into(),
            "-i".into(),
            "--name".into(),
            container_name(&ctx.sandbox_id),
            "--label".into(),
            format!("{MARKER_LABEL}=true"),
            "--label".into(),
            format!("{CREATED_LABEL}={created}"),
            "--label".into(),
            format!("{ID_LABEL}={}", ctx.sandbox_id),
            "--memory".into(),
            memory.clone(),
            "--memory-swap".into(),
            memory,
            "--cpus".into(),
            format!("{:.2}", ctx.limits.cpu_percent / 100.0),
            "--pids-limit".into(),
            DEFAULT_MAX_PROCESSES.to_string(),
            "--cap-drop".into(),
            "ALL".into(),
            "--security-opt".into(),
            "no-new-privileges".into(),
            "--user".into(),
            SANDBOX_USER.into(),
            "--workdir".into(),
            WORKDIR.into(),
        ];
        args.extend(network);
        for (key, value) in ctx.env.render_container() {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        args.push(self.image(language).to_string());
        args.extend(Self::command_for(language));
        args
    }

    async fn run_in_container(
        &self,
        id: &str,
        scratch: &ScratchDir,
        ctx: &ExecutionContext,
        deadline: TokioInstant,
    ) -> Result<RawExecution, SandboxError> {
        let source = format!("{}/.", scratch.path().display());
        let dest = format!("{id}:{WORKDIR}");
        let copy_args = ["cp", source.as_str(), dest.as_str()];
        let copy = docker(&copy_args);
        bounded(copy, deadline, &ctx.cancel, ctx.limits.timeout_ms).await??;

        let child = Command::new("docker")
            .args(["start", "-a", "-i", id])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let started = Instant::now();
        // The docker CLI is not the workload: only wall time and caps apply here.
        let limiter = ResourceLimiter::for_pid(ctx.limits, child.id().unwrap_or_default());

        let mut raw = drive_child(
            child,
            DriveOptions {
                invoker: ctx.invoker.as_ref(),
                limiter: &limiter,
                sample_usage: false,
                cancel: &ctx.cancel,
                max_output_bytes: ctx.max_output_bytes,
                max_tool_calls: ctx.max_tool_calls,
                kill_process_group: false,
            },
        )
        .await?;

        if raw.termination.is_none() && raw.exit_code != Some(0) {
            let oom = docker(&["inspect", "--format", "{{.State.OOMKilled}}", id]).await;
            raw.termination = enforce(
                &limiter,
                ResourceKind::Memory,
                !matches!(oom.as_deref(), Ok("true")),
                None,
                started.elapsed(),
            );
        }
        Ok(raw)
    }
}

#[async_trait]
impl SandboxBackend for ContainerBackend {
    fn name(&self) -> &str {
        "container"
    }

    fn sandbox_type(&self) -> SandboxType {
        SandboxType::Container
    }

    async fn execute(
        &self,
        code: &str,
        language: Language,
        ctx: &ExecutionContext,
    ) -> Result<RawExecution, SandboxError> {
        if which::which("docker").is_err() {
            return Err(SandboxError::unavailable("container", "docker CLI not found"));
        }
        let setup_deadline = TokioInstant::now() + ctx.limits.timeout();
        let image = self.image(language).to_string();
        self.ensure_image(&image, setup_deadline, ctx).await?;

        let scratch = ScratchDir::create()?;
        // Guarded by name before creation so a late `docker create` is still removed.
        let guard = ContainerGuard::new(container_name(&ctx.sandbox_id));
        let result = async {
            tokio::fs::write(
                scratch.path().join(runtime::main_file(language)),
                runtime::process_program(code, language),
            )
            .await?;
            let network = Self::network_args(&ctx.network).await;
            let args = self.create_args(language, ctx, network);
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            // Not interrupted: the daemon may finish creating after the CLI dies.
            let id = docker(&arg_refs).await?;
            tracing::debug!(container = %id, sandbox_id = %ctx.sandbox_id, "container created");
            self.run_in_container(&id, &scratch, ctx, setup_deadline).await
        }
        .await;
        guard.remove().await;
        scratch.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::NoopInvoker;
    use crate::env::SandboxEnv;
    use crate::limits::ResourceLimits;
    use crate::sandbox_backend::CancelSignal;
    use std::sync::Arc;

    fn context() -> ExecutionContext {
        ExecutionContext {
            sandbox_id: "abc".to_string(),
            limits: ResourceLimits {
                memory_mb: 128,
                cpu_percent: 50.0,
                timeout_ms: 20_000,
            },
            network: NetworkPolicy::default(),
            env: Arc::new(SandboxEnv::default()),
            invoker: Arc::new(NoopInvoker),
            max_output_bytes: 4096,
            max_tool_calls: 4,
            cancel: CancelSignal::default(),
        }
    }

    #[test]
    fn test_create_args_carry_labels_and_limits() {
        let backend = ContainerBackend::default();
        let args = backend.create_args(
            Language::Python,
            &context(),
            vec!["--network".into(), "none".into()],
        );
        let joined = args.join(" ");
        assert!(joined.contains("--label execlite.managed=true"));
        assert!(joined.contains("--label execlite.sandbox=abc"));
        assert!(joined.contains(&format!("--label {CREATED_LABEL}=")));
        assert!(joined.contains("--memory 128m --memory-swap 128m"));
        assert!(joined.contains("--cpus 0.50"));
        assert!(joined.contains("--network none"));
        assert!(joined.contains("--cap-drop ALL"));
        assert!(joined.ends_with("python:3.12-slim python3 -s -B /sandbox/main.py"));
    }

    #[tokio::test]
    async fn test_network_args_default_to_none() {
        let args = ContainerBackend::network_args(&NetworkPolicy::default()).await;
        assert_eq!(args, vec!["--network", "none"]);
        let full = NetworkPolicy {
            mode: NetworkMode::Full,
            allowed_domains: Vec::new(),
        };
        assert!(ContainerBackend::network_args(&full).await.is_empty());
    }

    #[tokio::test]
    async fn test_python_in_container() {
        if !ContainerBackend::is_available().await {
            return;
        }
        let raw = ContainerBackend::default()
            .execute("print(6 * 7)\n", Language::Python, &context())
            .await;
        // Image pulls can fail offline; only check a run that started.
        if let Ok(raw) = raw {
            assert!(raw.succeeded(), "{}", raw.stderr);
            assert_eq!(raw.stdout.trim(), "42");
            let leftover = docker(&["ps", "-a", "-q", "--filter", "label=execlite.sandbox=abc"])
                .await
                .unwrap_or_default();
            assert!(leftover.is_empty());
        }
    }

    #[tokio::test]
    async fn test_bounded_step_stops_on_cancel() {
        let (tx, cancel) = CancelSignal::channel();
        let deadline = TokioInstant::now() + Duration::from_secs(30);
        let step = tokio::time::sleep(Duration::from_secs(30));
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        };
        let (out, ()) = tokio::join!(bounded(step, deadline, &cancel, 500), stopper);
        assert!(matches!(out, Err(SandboxError::Timeout(500))));
    }

    #[tokio::test]
    async fn test_bounded_step_stops_at_deadline() {
        let cancel = CancelSignal::default();
        let deadline = TokioInstant::now() + Duration::from_millis(20);
        let step = tokio::time::sleep(Duration::from_secs(30));
        let started = Instant::now();
        let out = bounded(step, deadline, &cancel, 20).await;
        assert!(matches!(out, Err(SandboxError::Timeout(20))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_stop_signal_removes_container() {
        if !ContainerBackend::is_available().await {
            return;
        }
        let (tx, cancel) = CancelSignal::channel();
        let mut ctx = context();
        ctx.sandbox_id = "stopsig".to_string();
        ctx.cancel = cancel;
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            let _ = tx.send(true);
        };
        let backend = ContainerBackend::default();
        let (raw, ()) = tokio::join!(
            backend.execute("import time\ntime.sleep(60)\n", Language::Python, &ctx),
            stopper
        );
        match raw {
            Ok(raw) => assert!(matches!(
                raw.termination,
                Some(crate::bridge::Termination::Timeout { .. })
            )),
            Err(e) => assert!(matches!(e, SandboxError::Timeout(_)), "{e}"),
        }
        let leftover = docker(&["ps", "-a", "-q", "--filter", "name=execlite-stopsig"])
            .await
            .unwrap_or_default();
        assert!(leftover.is_empty(), "container left behind: {leftover}");
    }
}
