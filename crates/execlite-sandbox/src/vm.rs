//! VM tier: the program is evaluated by a host script inside an isolated
//! interpreter context (Node `vm` context, Python `exec` with curated
//! builtins). Only the bridge helpers and a console are visible to it.

use async_trait::async_trait;
use execlite_core::Language;
use std::ffi::OsString;
use std::sync::Arc;

use crate::bridge::RawExecution;
use crate::error::SandboxError;
use crate::policy::SandboxType;
use crate::process::{run_local, ScratchDir};
use crate::runtime;
use crate::runtime_resolver::{RuntimeResolver, SystemRuntimeResolver};
use crate::sandbox_backend::{ExecutionContext, SandboxBackend};

pub struct VmBackend {
    resolver: Arc<dyn RuntimeResolver>,
}

impl Default for VmBackend {
    fn default() -> Self {
        Self::new(Arc::new(SystemRuntimeResolver::new()))
    }
}

impl VmBackend {
    pub fn new(resolver: Arc<dyn RuntimeResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl SandboxBackend for VmBackend {
    fn name(&self) -> &str {
        "vm"
    }

    fn sandbox_type(&self) -> SandboxType {
        SandboxType::Vm
    }

    async fn execute(
        &self,
        code: &str,
        language: Language,
        ctx: &ExecutionContext,
    ) -> Result<RawExecution, SandboxError> {
        let resolved = self.resolver.resolve(language)?;
        let scratch = ScratchDir::create()?;
        let result = async {
            let program = runtime::write_vm_files(scratch.path(), code, language)?;
            let mut args: Vec<OsString> = vec![
                scratch
                    .path()
                    .join(runtime::vm_host_file(language))
                    .into_os_string(),
                program.into_os_string(),
            ];
            if language == Language::TypeScript {
                args.push(ctx.limits.timeout_ms.to_string().into());
            }
            run_local(&resolved, args, &scratch, ctx).await
        }
        .await;
        scratch.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{NoopInvoker, ToolInvoker};
    use crate::env::SandboxEnv;
    use crate::limits::ResourceLimits;
    use crate::policy::NetworkPolicy;
    use crate::sandbox_backend::CancelSignal;
    use serde_json::{json, Value};

    struct CountInvoker;

    #[async_trait]
    impl ToolInvoker for CountInvoker {
        async fn invoke(&self, _tool: &str, args: Value) -> anyhow::Result<Value> {
            Ok(json!({ "echo": args }))
        }
    }

    fn context(invoker: Arc<dyn ToolInvoker>) -> ExecutionContext {
        ExecutionContext {
            sandbox_id: "vm-test".to_string(),
            limits: ResourceLimits {
                timeout_ms: 10_000,
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

    fn python_available() -> bool {
        which::which("python3").is_ok()
    }

    fn node_available() -> bool {
        SystemRuntimeResolver::new()
            .resolve(Language::TypeScript)
            .is_ok()
    }

    #[tokio::test]
    async fn test_python_allowed_imports_and_bridge() {
        if !python_available() {
            return;
        }
        let code = "import json\nfrom typing import Any\nr = __call_tool(\"t\", {\"x\": 1})\nprint(json.dumps(r))\n";
        let raw = VmBackend::default()
            .execute(code, Language::Python, &context(Arc::new(CountInvoker)))
            .await
            .unwrap();
        assert!(raw.succeeded(), "{}", raw.stderr);
        assert_eq!(raw.stdout.trim(), "{\"echo\": {\"x\": 1}}");
    }

    #[tokio::test]
    async fn test_python_host_access_is_absent() {
        if !python_available() {
            return;
        }
        for code in ["import os\n", "open('/etc/passwd')\n", "__import__('subprocess')\n"] {
            let raw = VmBackend::default()
                .execute(code, Language::Python, &context(Arc::new(NoopInvoker)))
                .await
                .unwrap();
            assert_eq!(raw.exit_code, Some(1), "{code}");
            assert!(raw.stderr.contains("Error"), "{code}: {}", raw.stderr);
        }
    }

    #[tokio::test]
    async fn test_typescript_globals_are_absent() {
        if !node_available() {
            return;
        }
        let code = "const seen: string[] = [typeof process, typeof require];\nconsole.log(seen.join(\",\"));\n";
        let raw = VmBackend::default()
            .execute(code, Language::TypeScript, &context(Arc::new(NoopInvoker)))
            .await
            .unwrap();
        assert!(raw.succeeded(), "{}", raw.stderr);
        assert_eq!(raw.stdout.trim(), "undefined,undefined");
    }

    #[tokio::test]
    async fn test_typescript_eval_strings_disabled() {
        if !node_available() {
            return;
        }
        let code = "__main(async () => {\n  const f = new Function(\"return 1\");\n  console.log(f());\n});\n";
        let raw = VmBackend::default()
            .execute(code, Language::TypeScript, &context(Arc::new(NoopInvoker)))
            .await
            .unwrap();
        assert_eq!(raw.exit_code, Some(1));
        assert!(raw.stderr.contains("EvalError") || raw.stderr.contains("Code generation"));
    }
}
