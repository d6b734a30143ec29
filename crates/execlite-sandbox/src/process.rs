//! Process tier: the program runs as a child interpreter with a scrubbed
//! environment, its own process group and a throwaway working directory.

use async_trait::async_trait;
use execlite_core::Language;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::Command;

use crate::bridge::{drive_child, DriveOptions, RawExecution};
use crate::error::SandboxError;
use crate::limits::{ResourceLimiter, ResourceLimits};
use crate::policy::SandboxType;
use crate::runtime;
use crate::runtime_resolver::{ResolvedRuntime, RuntimeResolver, SystemRuntimeResolver};
use crate::sandbox_backend::{ExecutionContext, SandboxBackend};

/// Largest file a sandboxed program may write.
const MAX_FILE_SIZE_BYTES: u64 = 64 * 1024 * 1024;

/// Ephemeral working directory with private HOME and TMPDIR.
pub(crate) struct ScratchDir {
    dir: TempDir,
    home: PathBuf,
    tmp: PathBuf,
}

impl ScratchDir {
    pub(crate) fn create() -> Result<Self, SandboxError> {
        let dir = tempfile::Builder::new().prefix("execlite-").tempdir()?;
        let home = dir.path().join("home");
        let tmp = dir.path().join("tmp");
        std::fs::create_dir(&home)?;
        std::fs::create_dir(&tmp)?;
        Ok(Self { dir, home, tmp })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!("failed to remove sandbox dir {}: {}", path.display(), e);
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn apply_rlimits(limits: &ResourceLimits) -> std::io::Result<()> {
    use nix::sys::resource::{setrlimit, Resource};
    let cpu = limits.cpu_seconds_budget();
    // Hard limit one second above soft so SIGXCPU arrives before SIGKILL.
    setrlimit(Resource::RLIMIT_CPU, cpu, cpu + 1)?;
    setrlimit(Resource::RLIMIT_CORE, 0, 0)?;
    setrlimit(Resource::RLIMIT_FSIZE, MAX_FILE_SIZE_BYTES, MAX_FILE_SIZE_BYTES)?;
    Ok(())
}

/// Spawn `runtime.interpreter args...` inside `scratch` and drive it to completion.
pub(crate) async fn run_local(
    runtime: &ResolvedRuntime,
    args: Vec<OsString>,
    scratch: &ScratchDir,
    ctx: &ExecutionContext,
) -> Result<RawExecution, SandboxError> {
    let mut command = Command::new(&runtime.interpreter);
    command
        .args(&runtime.args)
        .args(args)
        .current_dir(scratch.path())
        .env_clear()
        .envs(ctx.env.render(&scratch.home, &scratch.tmp))
        .envs(runtime.extra_env.iter().cloned())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        let limits = ctx.limits;
        // SAFETY: setrlimit is async-signal-safe and the closure allocates nothing.
        unsafe {
            command.pre_exec(move || apply_rlimits(&limits));
        }
    }

    let child = command.spawn()?;
    // A child without a pid has already been reaped; sampling it finds nothing.
    let limiter = ResourceLimiter::for_pid(ctx.limits, child.id().unwrap_or_default());

    drive_child(
        child,
        DriveOptions {
            invoker: ctx.invoker.as_ref(),
            limiter: &limiter,
            sample_usage: true,
            cancel: &ctx.cancel,
            max_output_bytes: ctx.max_output_bytes,
            max_tool_calls: ctx.max_tool_calls,
            kill_process_group: cfg!(unix),
        },
    )
    .await
}

pub struct ProcessBackend {
    resolver: Arc<dyn RuntimeResolver>,
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new(Arc::new(SystemRuntimeResolver::new()))
    }
}

impl ProcessBackend {
    pub fn new(resolver: Arc<dyn RuntimeResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl SandboxBackend for ProcessBackend {
    fn name(&self) -> &str {
        "process"
    }

    fn sandbox_type(&self) -> SandboxType {
        SandboxType::Process
    }

    async fn execute(
        &self,
        code: &str,
        language: Language,
        ctx: &ExecutionContext,
    ) -> Result<RawExecution, SandboxError> {
        let resolved = self.resolver.resolve(language)?;
        let scratch = ScratchDir::create()?;
        let main = scratch.path().join(runtime::main_file(language));
        let result = async {
            tokio::fs::write(&main, runtime::process_program(code, language)).await?;
            run_local(&resolved, vec![main.into_os_string()], &scratch, ctx).await
        }
        .await;
        scratch.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{NoopInvoker, Termination, ToolInvoker};
    use crate::limits::ResourceKind;
    use crate::env::SandboxEnv;
    use crate::policy::NetworkPolicy;
    use crate::sandbox_backend::CancelSignal;
    use serde_json::{json, Value};
    use std::time::Duration;

    struct ListInvoker;

    #[async_trait]
    impl ToolInvoker for ListInvoker {
        async fn invoke(&self, _tool: &str, _args: Value) -> anyhow::Result<Value> {
            Ok(json!({ "files": (0..200).map(|i| format!("file_{i}.txt")).collect::<Vec<_>>() }))
        }
    }

    fn context(timeout_ms: u64, invoker: Arc<dyn ToolInvoker>) -> ExecutionContext {
        ExecutionContext {
            sandbox_id: "test".to_string(),
            limits: ResourceLimits {
                timeout_ms,
                ..Default::default()
            },
            network: NetworkPolicy::default(),
            env: Arc::new(SandboxEnv::default()),
            invoker,
            max_output_bytes: 64 * 1024,
            max_tool_calls: 8,
            cancel: CancelSignal::default(),
        }
    }

    fn has(bin: &str) -> bool {
        which::which(bin).is_ok()
    }

    #[tokio::test]
    async fn test_python_program_with_tool_call() {
        if !has("python3") {
            return;
        }
        let code = "r = __call_tool(\"list\", {\"dir\": \".\", \"skip\": None})\n__emit(__summarize(r))\n";
        let raw = ProcessBackend::default()
            .execute(code, Language::Python, &context(10_000, Arc::new(ListInvoker)))
            .await
            .unwrap();
        assert!(raw.succeeded(), "{}", raw.stderr);
        assert_eq!(raw.tool_calls, 1);
        let summary: Value = serde_json::from_str(raw.stdout.trim()).unwrap();
        assert_eq!(summary["files"]["length"], 200);
        assert!((raw.stdout.len() as u64) < raw.tool_output_bytes);
    }

    #[tokio::test]
    async fn test_environment_is_scrubbed() {
        if !has("python3") {
            return;
        }
        let code = "import os\nprint(sorted(k for k in os.environ if k.endswith('KEY')))\nprint(os.environ['HOME'])\n";
        let raw = ProcessBackend::default()
            .execute(code, Language::Python, &context(10_000, Arc::new(NoopInvoker)))
            .await
            .unwrap();
        assert!(raw.succeeded(), "{}", raw.stderr);
        let mut lines = raw.stdout.lines();
        assert_eq!(lines.next(), Some("[]"));
        assert!(lines.next().unwrap_or_default().contains("execlite-"));
    }

    #[tokio::test]
    async fn test_python_timeout() {
        if !has("python3") {
            return;
        }
        let raw = ProcessBackend::default()
            .execute("while True:\n    pass\n", Language::Python, &context(300, Arc::new(NoopInvoker)))
            .await
            .unwrap();
        assert!(matches!(raw.termination, Some(Termination::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_typescript_program() {
        let resolver = SystemRuntimeResolver::new();
        if resolver.resolve(Language::TypeScript).is_err() {
            return;
        }
        let code = "interface Row { n: number }\n__main(async () => {\n  const rows: Row[] = [{ n: 1 }, { n: 2 }];\n  __emit({ total: rows.reduce((a, r) => a + r.n, 0) });\n});\n";
        let raw = ProcessBackend::default()
            .execute(code, Language::TypeScript, &context(10_000, Arc::new(NoopInvoker)))
            .await
            .unwrap();
        assert!(raw.succeeded(), "{}", raw.stderr);
        assert_eq!(raw.stdout.trim(), "{\"total\":3}");
    }

    #[tokio::test]
    async fn test_typescript_thrown_error_fails() {
        let resolver = SystemRuntimeResolver::new();
        if resolver.resolve(Language::TypeScript).is_err() {
            return;
        }
        let code = "__main(async () => {\n  throw new Error(\"boom\");\n});\n";
        let raw = ProcessBackend::default()
            .execute(code, Language::TypeScript, &context(10_000, Arc::new(NoopInvoker)))
            .await
            .unwrap();
        assert_eq!(raw.exit_code, Some(1));
        assert!(raw.stderr.contains("boom"));
    }

    #[tokio::test]
    async fn test_cpu_ceiling_stops_busy_loop() {
        if !has("python3") {
            return;
        }
        let mut ctx = context(10_000, Arc::new(NoopInvoker));
        ctx.limits.cpu_percent = 10.0;
        let raw = ProcessBackend::default()
            .execute("while True:\n    pass\n", Language::Python, &ctx)
            .await
            .unwrap();
        match raw.termination {
            Some(Termination::ResourceLimit { kind, .. }) => assert_eq!(kind, ResourceKind::Cpu),
            other => panic!("expected CPU limit, got {other:?}"),
        }
        assert!(raw.duration < Duration::from_secs(5));
    }
}
