//! Sandbox Manager: picks a backend, tracks the sandbox for its whole
//! lifetime and turns every outcome into an [`ExecutionResult`].

use execlite_core::pii::PiiTokenizer;
use execlite_core::Language;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::bridge::{RawExecution, Termination, ToolInvoker};
use crate::common::TEARDOWN_GRACE_MS;
use crate::container::ContainerBackend;
use crate::env::SandboxEnv;
use crate::error::SandboxError;
use crate::limits::ResourceLimits;
use crate::policy::{select_sandbox_level, SandboxConfig, SandboxType, SelectionInput};
use crate::process::ProcessBackend;
use crate::result::{ErrorKind, ExecutionMetrics, ExecutionResult};
use crate::runtime_resolver::{RuntimeResolver, SystemRuntimeResolver};
use crate::sandbox_backend::{CancelSignal, ExecutionContext, SandboxBackend};
use crate::security::CodeValidator;
use crate::tracker::SandboxTracker;
use crate::vm::VmBackend;

pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

pub struct SandboxManager {
    config: SandboxConfig,
    env: Arc<SandboxEnv>,
    invoker: Arc<dyn ToolInvoker>,
    backends: HashMap<SandboxType, Arc<dyn SandboxBackend>>,
    tracker: SandboxTracker,
    validator: Arc<CodeValidator>,
    pii: Mutex<PiiTokenizer>,
    chars_per_token: f64,
    teardown_grace: Duration,
}

impl SandboxManager {
    /// Fails when the configuration is invalid or the env allow-list names a
    /// credential-shaped variable.
    pub fn new(config: SandboxConfig, invoker: Arc<dyn ToolInvoker>) -> Result<Self, SandboxError> {
        config.validate()?;
        let env = Arc::new(SandboxEnv::from_allow_list(&config.allowed_env_vars)?);
        let resolver: Arc<dyn RuntimeResolver> = Arc::new(SystemRuntimeResolver::new());

        let mut backends: HashMap<SandboxType, Arc<dyn SandboxBackend>> = HashMap::new();
        backends.insert(
            SandboxType::Process,
            Arc::new(ProcessBackend::new(Arc::clone(&resolver))),
        );
        backends.insert(SandboxType::Vm, Arc::new(VmBackend::new(resolver)));
        backends.insert(
            SandboxType::Container,
            Arc::new(ContainerBackend::from_config(&config)),
        );

        Ok(Self {
            config,
            env,
            invoker,
            backends,
            tracker: SandboxTracker::new(),
            validator: Arc::new(CodeValidator::new()),
            pii: Mutex::new(PiiTokenizer::new()),
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            teardown_grace: Duration::from_millis(TEARDOWN_GRACE_MS),
        })
    }

    /// Replace the backend serving `backend.sandbox_type()`.
    pub fn with_backend(mut self, backend: Arc<dyn SandboxBackend>) -> Self {
        self.backends.insert(backend.sandbox_type(), backend);
        self
    }

    /// Share a tracker, e.g. with the container cleanup job.
    pub fn with_tracker(mut self, tracker: SandboxTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_validator(mut self, validator: Arc<CodeValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_chars_per_token(mut self, chars_per_token: f64) -> Self {
        if chars_per_token.is_finite() && chars_per_token > 0.0 {
            self.chars_per_token = chars_per_token;
        }
        self
    }

    pub fn with_teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace = grace;
        self
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn tracker(&self) -> &SandboxTracker {
        &self.tracker
    }

    pub fn active_sandbox_count(&self) -> usize {
        self.tracker.active_count()
    }

    /// Policy decision with the configured type as the floor.
    pub fn select_sandbox_level(&self, input: &SelectionInput) -> SandboxType {
        select_sandbox_level(input, self.config.sandbox_type)
    }

    /// Restore PII placeholders produced by this manager.
    pub fn detokenize(&self, text: &str) -> String {
        self.pii
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .detokenize(text)
    }

    /// Validate for tier selection, then run with the configured limits.
    pub async fn execute(&self, code: &str, language: Language) -> ExecutionResult {
        let validation = self.validator.validate(code, language);
        let level = self.select_sandbox_level(&SelectionInput {
            risk_score: validation.risk_score,
            language,
            operations: validation.operations(),
        });
        self.execute_with(code, language, level, None).await
    }

    /// Run on an explicit tier. `limits` overrides the configured ceilings.
    pub async fn execute_with(
        &self,
        code: &str,
        language: Language,
        sandbox_type: SandboxType,
        limits: Option<ResourceLimits>,
    ) -> ExecutionResult {
        let limits = limits.unwrap_or(self.config.resource_limits);
        if let Err(e) = limits.validate() {
            return ExecutionResult::from_error(&e);
        }
        let Some(backend) = self.backends.get(&sandbox_type).cloned() else {
            return ExecutionResult::from_error(&SandboxError::unavailable(
                "sandbox",
                format!("no backend registered for {sandbox_type}"),
            ));
        };

        let guard = self.tracker.register(sandbox_type);
        let (cancel_tx, cancel) = CancelSignal::channel();
        let ctx = ExecutionContext {
            sandbox_id: guard.id().to_string(),
            limits,
            network: self.config.network_policy.clone(),
            env: Arc::clone(&self.env),
            invoker: Arc::clone(&self.invoker),
            max_output_bytes: self.config.max_output_bytes,
            max_tool_calls: self.config.max_tool_calls,
            cancel,
        };
        crate::info_log!(
            sandbox_id = %ctx.sandbox_id,
            backend = backend.name(),
            language = language.as_str(),
            "executing in sandbox"
        );

        let started = Instant::now();
        let hard_deadline = limits.timeout() + self.teardown_grace;
        let outcome = {
            let mut run = backend.execute(code, language, &ctx);
            tokio::select! {
                out = &mut run => Some(out),
                _ = tokio::time::sleep(hard_deadline) => {
                    tracing::warn!(sandbox_id = %ctx.sandbox_id, "backend exceeded hard deadline");
                    // Ask the backend to stop, then let it finish its own teardown.
                    let _ = cancel_tx.send(true);
                    if tokio::time::timeout(self.teardown_grace, &mut run).await.is_err() {
                        tracing::error!(
                            sandbox_id = %ctx.sandbox_id,
                            "backend ignored the stop signal; abandoning it"
                        );
                    }
                    None
                }
            }
        };
        // Released only once the backend has returned or been dropped.
        guard.release();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            None => {
                ExecutionResult::failure(
                    ErrorKind::Timeout,
                    format!("execution timed out after {} ms", limits.timeout_ms),
                )
            }
            Some(Err(e)) => {
                tracing::warn!(sandbox_id = %ctx.sandbox_id, "sandbox execution failed: {}", e);
                ExecutionResult::from_error(&e)
            }
            Some(Ok(raw)) => self.finish(raw, sandbox_type),
        };
        let mut result = result.with_sandbox(sandbox_type);
        if result.metrics.execution_time_ms == 0 {
            result.metrics.execution_time_ms = elapsed_ms;
        }
        result
    }

    fn estimate_tokens(&self, chars: usize) -> usize {
        (chars as f64 / self.chars_per_token).ceil() as usize
    }

    fn finish(&self, raw: RawExecution, sandbox_type: SandboxType) -> ExecutionResult {
        let metrics = ExecutionMetrics {
            execution_time_ms: raw.duration.as_millis() as u64,
            memory_used_bytes: raw.peak_memory_bytes,
            tokens_in_summary: 0,
            raw_output_tokens: self.estimate_tokens(raw.tool_output_bytes as usize),
            tool_calls: raw.tool_calls,
            raw_tool_output_bytes: raw.tool_output_bytes,
        };
        let mut pii = self.pii.lock().unwrap_or_else(|p| p.into_inner());

        if raw.succeeded() {
            let output = raw.stdout.trim_end().to_string();
            let scrubbed = pii.tokenize(&output);
            let pii_tokenized = scrubbed != output;
            let metrics = ExecutionMetrics {
                tokens_in_summary: self.estimate_tokens(scrubbed.chars().count()),
                ..metrics
            };
            let mut result = ExecutionResult::success(scrubbed, metrics, sandbox_type);
            result.pii_tokenized = pii_tokenized;
            return result;
        }

        let kind = match &raw.termination {
            Some(Termination::Timeout { .. }) => ErrorKind::Timeout,
            Some(Termination::ResourceLimit { .. }) => ErrorKind::ResourceLimit,
            None => ErrorKind::Execution,
        };
        let message = raw.failure_message();
        let scrubbed = pii.tokenize(&message);
        let mut result = ExecutionResult::failure(kind, scrubbed.clone()).with_metrics(metrics);
        result.pii_tokenized = scrubbed != message;
        result
    }
}
