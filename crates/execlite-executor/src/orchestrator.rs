//! The single public entry point.
//!
//! Each request runs five phases in order:
//!
//! 1. discovery: rank indexed tools against the intent
//! 2. code generation: bindings for the chosen tools plus the task body
//! 3. security validation: static scan; blocks when approval is required
//!    and was not granted
//! 4. sandboxed execution on the tier the policy picks
//! 5. result processing: summary, metrics and the audit record
//!
//! Every phase writes an audit entry. Failures surface as an
//! [`ExecutionResult`] with `success: false`; only construction and
//! initialization return `Err`.

use anyhow::{Context, Result};
use execlite_codegen::CodeApiGenerator;
use execlite_core::audit::{code_hash, AuditError, AuditLogger, AuditSeverity};
use execlite_core::config::{
    CleanupSettings, CodegenSettings, PathsConfig, SandboxSettings, ValidatorSettings,
};
use execlite_core::tool::{load_tools_from_dir, RelevanceScore, RelevanceScorer, Tool, ToolIndex};
use execlite_core::Language;
use execlite_sandbox::container::ContainerBackend;
use execlite_sandbox::security::{format_validation_report, SecuritySeverity};
use execlite_sandbox::{
    CodeValidator, ContainerCleanupJob, ErrorKind, ExecutionResult, ResourceLimits,
    SandboxConfig, SandboxManager, SandboxTracker, SelectionInput, ToolInvoker,
    ValidationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::cleanup::{CleanupManager, CleanupOutcome};
use crate::invoker::LocalToolInvoker;
use crate::summary::{compact_output, execution_metadata, DEFAULT_MAX_SUMMARY_CHARS};
use crate::workspace::WorkspaceManager;

// ============================================================================
// Request / config types
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionOptions {
    /// Upper bound on tools bound into the wrapper; configured default when absent.
    pub max_tools: Option<usize>,
    /// Wall-clock budget for the sandboxed run; configured default when absent.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub intent: String,
    pub language: Language,
    /// Task body. When absent a default body is synthesized from the intent.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub options: ExecutionOptions,
    /// Caller-granted approval for code the validator flags.
    #[serde(default)]
    pub approved: bool,
}

impl ExecutionRequest {
    pub fn new(intent: impl Into<String>, language: Language) -> Self {
        Self {
            intent: intent.into(),
            language,
            code: None,
            options: ExecutionOptions::default(),
            approved: false,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_max_tools(mut self, max_tools: usize) -> Self {
        self.options.max_tools = Some(max_tools);
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = approved;
        self
    }
}

/// Program to run plus the text the validator screens. They differ only for
/// synthesized entry points, where intent text is data rather than code.
struct Synthesized {
    program: String,
    screened: String,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub paths: PathsConfig,
    pub sandbox: SandboxConfig,
    pub validator: ValidatorSettings,
    pub codegen: CodegenSettings,
    pub cleanup: CleanupSettings,
    pub max_summary_chars: usize,
}

impl OrchestratorConfig {
    /// Everything from `EXECLITE_*` variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        let sandbox = SandboxConfig::from_settings(&SandboxSettings::from_env())
            .context("Invalid sandbox configuration")?;
        Ok(Self {
            paths: PathsConfig::from_env(),
            sandbox,
            validator: ValidatorSettings::from_env(),
            codegen: CodegenSettings::from_env(),
            cleanup: CleanupSettings::from_env(),
            max_summary_chars: DEFAULT_MAX_SUMMARY_CHARS,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStats {
    pub requests: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub blocked: u64,
    pub tools_indexed: usize,
    pub active_sandboxes: usize,
    pub sandboxes_created: u64,
    pub cleanup_cycles: u64,
    pub containers_reclaimed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    blocked: AtomicU64,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    config: OrchestratorConfig,
    index: RwLock<ToolIndex>,
    scorer: RelevanceScorer,
    generator: CodeApiGenerator,
    validator: Arc<CodeValidator>,
    sandbox: SandboxManager,
    audit: AuditLogger,
    cleanup_job: Arc<ContainerCleanupJob>,
    cleanup: CleanupManager,
    workspaces: WorkspaceManager,
    counters: Counters,
    initialized: AtomicBool,
}

impl Orchestrator {
    /// Build with the local filesystem tools rooted at the configured workspace.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        let invoker = Arc::new(LocalToolInvoker::new(config.paths.workspace.clone()));
        Self::with_invoker(config, invoker)
    }

    pub fn with_invoker(config: OrchestratorConfig, invoker: Arc<dyn ToolInvoker>) -> Result<Self> {
        let audit = AuditLogger::new(config.paths.audit_log_path())
            .context("Failed to open audit log")?;
        let validator = Arc::new(
            CodeValidator::from_settings(&config.validator)
                .context("Failed to build code validator")?,
        );
        let generator = CodeApiGenerator::from_settings(&config.codegen)
            .context("Invalid code generator settings")?;
        let tracker = SandboxTracker::new();
        let sandbox = SandboxManager::new(config.sandbox.clone(), invoker)
            .context("Invalid sandbox configuration")?
            .with_tracker(tracker.clone())
            .with_validator(Arc::clone(&validator))
            .with_chars_per_token(config.codegen.chars_per_token);
        let cleanup_job = Arc::new(ContainerCleanupJob::from_settings(&config.cleanup, tracker));
        let workspaces = WorkspaceManager::new(config.paths.sessions_dir())
            .context("Failed to prepare session workspace root")?;

        Ok(Self {
            config,
            index: RwLock::new(ToolIndex::new()),
            scorer: RelevanceScorer::new(),
            generator,
            validator,
            sandbox,
            audit,
            cleanup_job,
            cleanup: CleanupManager::new(),
            workspaces,
            counters: Counters::default(),
            initialized: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn audit_logger(&self) -> &AuditLogger {
        &self.audit
    }

    pub fn sandbox_manager(&self) -> &SandboxManager {
        &self.sandbox
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Registry for teardown work; handlers run on [`Orchestrator::shutdown`].
    pub fn cleanup_manager(&self) -> &CleanupManager {
        &self.cleanup
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Rebuild the tool index from the schema directory and start background
    /// reclamation. Returns the number of indexed tools. Calling it again only
    /// reloads the index.
    pub async fn initialize(&self) -> Result<usize> {
        let tools_dir = &self.config.paths.tools_dir;
        let count = if tools_dir.is_dir() {
            let tools = load_tools_from_dir(tools_dir)
                .with_context(|| format!("Failed to load tools from {}", tools_dir.display()))?;
            let mut index = self.write_index();
            index.clear();
            index.index_tools(tools);
            index.len()
        } else {
            tracing::warn!("Tool schema directory {} not found; index left as is", tools_dir.display());
            self.read_index().len()
        };

        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(count);
        }

        if self.config.cleanup.enabled && ContainerBackend::is_available().await {
            let interval = Duration::from_secs(self.config.cleanup.interval_secs.max(1));
            if self.cleanup_job.start(interval) {
                let job = Arc::clone(&self.cleanup_job);
                self.cleanup.register("container-cleanup-job", move || async move {
                    job.stop().await;
                    job.run_once()
                        .await
                        .map(|_| ())
                        .context("final container sweep failed")
                });
            }
        }

        let workspaces = self.workspaces.clone();
        let max_age = Duration::from_secs(self.config.cleanup.orphan_max_age_secs);
        self.cleanup.register("stale-sessions", move || async move {
            workspaces
                .cleanup_old_sessions(max_age)
                .map(|_| ())
                .context("session cleanup failed")
        });

        self.record(
            self.audit.log_discovery(
                format!("orchestrator initialized with {} tools", count),
                Some(json!({ "toolsDir": tools_dir.display().to_string(), "tools": count })),
            ),
        )
        .await;
        tracing::info!(tools = count, "Orchestrator initialized");
        Ok(count)
    }

    /// Run teardown handlers newest first.
    pub async fn shutdown(&self) -> CleanupOutcome {
        let outcome = self.cleanup.cleanup().await;
        self.initialized.store(false, Ordering::SeqCst);
        if !outcome.is_clean() {
            let failed: Vec<&str> = outcome.failed.iter().map(|(n, _)| n.as_str()).collect();
            self.record(self.audit.log_error(
                "shutdown completed with failed cleanup handlers",
                Some(json!({ "failed": failed })),
            ))
            .await;
        }
        tracing::info!(
            completed = outcome.completed.len(),
            failed = outcome.failed.len(),
            "Orchestrator shut down"
        );
        outcome
    }

    // ------------------------------------------------------------------------
    // Tool index
    // ------------------------------------------------------------------------

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, ToolIndex> {
        self.index.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, ToolIndex> {
        self.index.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Merge tools into the index (same name replaces).
    pub fn index_tools(&self, tools: Vec<Tool>) {
        self.write_index().index_tools(tools);
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.read_index().tools().to_vec()
    }

    /// Ranked tools with a positive score, best first.
    pub fn search_tools(&self, query: &str, limit: usize) -> Vec<RelevanceScore> {
        let index = self.read_index();
        self.scorer
            .score_tools(index.tools(), query)
            .into_iter()
            .filter(|s| s.score > 0.0)
            .take(limit)
            .collect()
    }

    /// Static validation with the orchestrator's rules and threshold.
    pub fn validate_code(&self, code: &str, language: Language) -> ValidationResult {
        self.validator.validate(code, language)
    }

    pub fn get_stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            requests: self.counters.requests.load(Ordering::SeqCst),
            succeeded: self.counters.succeeded.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            blocked: self.counters.blocked.load(Ordering::SeqCst),
            tools_indexed: self.read_index().len(),
            active_sandboxes: self.sandbox.active_sandbox_count(),
            sandboxes_created: self.sandbox.tracker().total_created(),
            cleanup_cycles: self.cleanup_job.cycles_completed(),
            containers_reclaimed: self.cleanup_job.total_removed(),
        }
    }

    // ------------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------------

    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        self.counters.requests.fetch_add(1, Ordering::SeqCst);
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let language = request.language;
        tracing::debug!(request_id = %request_id, language = %language, "Execution request");

        // Phase 1: discovery
        let max_tools = request
            .options
            .max_tools
            .unwrap_or(self.config.codegen.max_tools);
        let tools: Vec<Tool> = self
            .search_tools(&request.intent, max_tools)
            .into_iter()
            .map(|s| s.tool)
            .collect();
        let tool_names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        self.record(self.audit.log_discovery(
            format!("selected {} tool(s)", tools.len()),
            Some(json!({
                "requestId": request_id,
                "intentHash": code_hash(&request.intent),
                "tools": tool_names,
            })),
        ))
        .await;

        // Phase 2: code generation
        let Synthesized { program, screened } = match self.synthesize(&tools, &request) {
            Ok(synthesized) => synthesized,
            Err(e) => {
                let message = format!("code generation failed: {:#}", e);
                return self
                    .fail(&request_id, ErrorKind::Infrastructure, message)
                    .await;
            }
        };
        let program_hash = code_hash(&program);

        // Phase 3: validation
        let validation = self.validator.validate(&screened, language);
        let approved = request.approved || self.config.validator.auto_approve;
        if validation.requires_approval && !approved {
            return self.block(&request_id, &program_hash, &validation).await;
        }
        let severity = if validation.issues.is_empty() {
            AuditSeverity::Info
        } else {
            AuditSeverity::Warning
        };
        self.record(self.audit.log_security(
            severity,
            if validation.requires_approval {
                "validation flagged code; execution approved"
            } else {
                "validation passed"
            },
            Some(json!({
                "requestId": request_id,
                "codeHash": program_hash,
                "riskScore": validation.risk_score,
                "issues": validation.issues.len(),
                "approved": approved,
            })),
        ))
        .await;

        // Phase 4: execution
        let level = self.sandbox.select_sandbox_level(&SelectionInput {
            risk_score: validation.risk_score,
            language,
            operations: validation.operations(),
        });
        let limits = request.options.timeout_ms.map(|timeout_ms| ResourceLimits {
            timeout_ms,
            ..self.config.sandbox.resource_limits
        });
        let result = self
            .sandbox
            .execute_with(&program, language, level, limits)
            .await;

        // Phase 5: result processing
        let result = self.process_result(result);
        let message = match &result.error {
            None => format!("execution succeeded in {} sandbox", level),
            Some(error) => format!("execution failed in {} sandbox: {}", level, error),
        };
        self.record(self.audit.log_execution(
            result.success,
            message,
            Some(execution_metadata(&request_id, &program_hash, &result)),
        ))
        .await;
        if result.success {
            self.counters.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.failed.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    fn synthesize(&self, tools: &[Tool], request: &ExecutionRequest) -> Result<Synthesized> {
        let wrapper = self.generator.generate(tools, request.language)?;
        let Some(code) = &request.code else {
            let (intent, language) = (&request.intent, request.language);
            let body = self.generator.generate_entrypoint(tools, intent, language)?;
            let masked = self
                .generator
                .generate_entrypoint_masked(tools, intent, language)?;
            return Ok(Synthesized {
                program: self.generator.assemble_program(&wrapper, &body),
                screened: self.generator.assemble_program(&wrapper, &masked),
            });
        };
        let program = self.generator.assemble_program(&wrapper, code);
        Ok(Synthesized {
            screened: program.clone(),
            program,
        })
    }

    fn process_result(&self, mut result: ExecutionResult) -> ExecutionResult {
        if let Some(output) = result.output.take() {
            let summary = compact_output(&output, self.config.max_summary_chars);
            result.metrics.tokens_in_summary = self.generator.estimate_tokens(&summary);
            result.output = Some(summary);
        }
        result
    }

    async fn block(
        &self,
        request_id: &str,
        program_hash: &str,
        validation: &ValidationResult,
    ) -> ExecutionResult {
        self.counters.blocked.fetch_add(1, Ordering::SeqCst);
        self.counters.failed.fetch_add(1, Ordering::SeqCst);
        let severity = if validation.has_critical() {
            AuditSeverity::Critical
        } else {
            AuditSeverity::Warning
        };
        let issues: Vec<_> = validation
            .issues
            .iter()
            .map(|i| {
                json!({
                    "ruleId": i.rule_id,
                    "severity": i.severity,
                    "line": i.location.line,
                    "column": i.location.column,
                })
            })
            .collect();
        self.record(self.audit.log_security(
            severity,
            "execution blocked: approval required",
            Some(json!({
                "requestId": request_id,
                "codeHash": program_hash,
                "riskScore": validation.risk_score,
                "issues": issues,
            })),
        ))
        .await;
        tracing::warn!(
            request_id,
            risk_score = validation.risk_score,
            critical = validation.count_by_severity(SecuritySeverity::Critical),
            "Execution blocked pending approval"
        );
        ExecutionResult::failure(
            ErrorKind::Validation,
            format!(
                "approval required before execution\n{}",
                format_validation_report(validation)
            ),
        )
    }

    async fn fail(&self, request_id: &str, kind: ErrorKind, message: String) -> ExecutionResult {
        self.counters.failed.fetch_add(1, Ordering::SeqCst);
        self.record(self.audit.log_error(
            message.clone(),
            Some(json!({ "requestId": request_id, "errorKind": kind })),
        ))
        .await;
        tracing::warn!(request_id, "{}", message);
        ExecutionResult::failure(kind, message)
    }

    /// Audit writes never fail a request; a failed write is reported in the log.
    async fn record(&self, write: impl std::future::Future<Output = Result<(), AuditError>>) {
        if let Err(e) = write.await {
            tracing::error!("Audit write failed: {}", e);
        }
    }
}
