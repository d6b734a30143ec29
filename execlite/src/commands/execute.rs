//! `execlite execute`

use crate::cli::{LanguageArg, SandboxArg};
use anyhow::{Context, Result};
use execlite_executor::{ExecutionRequest, Orchestrator, OrchestratorConfig};
use execlite_sandbox::{ExecutionResult, SandboxType};

pub struct ExecuteArgs {
    pub intent: Option<String>,
    pub language: LanguageArg,
    pub code: Option<String>,
    pub request: Option<String>,
    pub max_tools: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub sandbox: Option<SandboxArg>,
    pub approve: bool,
}

fn build_request(args: &ExecuteArgs) -> Result<ExecutionRequest> {
    let mut request = match &args.request {
        Some(source) => {
            let text = super::read_source(source)?;
            serde_json::from_str::<ExecutionRequest>(&text).context("Invalid request JSON")?
        }
        None => {
            let intent = args.intent.clone().unwrap_or_default();
            let mut request = ExecutionRequest::new(intent, args.language.into());
            if let Some(source) = &args.code {
                request = request.with_code(super::read_source(source)?);
            }
            request
        }
    };
    if let Some(n) = args.max_tools {
        request.options.max_tools = Some(n);
    }
    if let Some(ms) = args.timeout_ms {
        request.options.timeout_ms = Some(ms);
    }
    request.approved |= args.approve;
    Ok(request)
}

/// Run one request and print the result as JSON. Returns the result so the
/// caller can pick the exit code.
pub async fn run(mut config: OrchestratorConfig, args: ExecuteArgs) -> Result<ExecutionResult> {
    let request = build_request(&args)?;
    if let Some(floor) = args.sandbox {
        config.sandbox.sandbox_type = Some(match floor {
            SandboxArg::Process => SandboxType::Process,
            SandboxArg::Vm => SandboxType::Vm,
            SandboxArg::Container => SandboxType::Container,
        });
    }

    let orchestrator = Orchestrator::new(config)?;
    orchestrator.initialize().await?;

    let result = tokio::select! {
        result = orchestrator.execute(request) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; tearing down");
            orchestrator.shutdown().await;
            anyhow::bail!("interrupted");
        }
    };
    let outcome = orchestrator.shutdown().await;
    for (name, error) in &outcome.failed {
        tracing::warn!("cleanup handler {} failed: {}", name, error);
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ExecuteArgs {
        ExecuteArgs {
            intent: Some("list files".into()),
            language: LanguageArg::Python,
            code: None,
            request: None,
            max_tools: Some(2),
            timeout_ms: None,
            sandbox: None,
            approve: true,
        }
    }

    #[test]
    fn test_request_from_flags() {
        let request = build_request(&args()).unwrap();
        assert_eq!(request.intent, "list files");
        assert_eq!(request.options.max_tools, Some(2));
        assert!(request.approved);
        assert!(request.code.is_none());
    }

    #[test]
    fn test_request_from_json_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.json");
        std::fs::write(
            &path,
            r#"{"intent":"read a.txt","language":"typescript","code":"console.log(1)"}"#,
        )
        .unwrap();
        let mut a = args();
        a.request = Some(path.to_string_lossy().into_owned());
        a.timeout_ms = Some(900);
        let request = build_request(&a).unwrap();
        assert_eq!(request.intent, "read a.txt");
        assert_eq!(request.code.as_deref(), Some("console.log(1)"));
        assert_eq!(request.options.timeout_ms, Some(900));
        assert_eq!(request.options.max_tools, Some(2));
    }
}
