//! Configuration structs grouped by concern, loaded from the environment.

use super::env_keys::{
    cleanup as cleanup_keys, codegen as codegen_keys, observability as obv_keys, paths,
    sandbox as sandbox_keys, security as security_keys,
};
use super::loader::{env_bool, env_list, env_optional, env_or, env_parse, load_dotenv};
use std::path::PathBuf;

/// Observability: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            Self {
                quiet: env_bool(obv_keys::EXECLITE_QUIET, &[], false),
                log_level: env_or(obv_keys::EXECLITE_LOG_LEVEL, obv_keys::LOG_LEVEL_ALIASES, || {
                    "execlite=info".to_string()
                }),
                log_json: env_bool(obv_keys::EXECLITE_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::EXECLITE_AUDIT_LOG, obv_keys::AUDIT_LOG_ALIASES),
            }
        })
    }
}

/// Tool schema directory, workspace root and data directory
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub tools_dir: PathBuf,
    pub workspace: PathBuf,
    pub data_dir: PathBuf,
}

impl PathsConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let workspace = env_optional(paths::EXECLITE_WORKSPACE, &[])
            .map(PathBuf::from)
            .unwrap_or_else(|| cwd.clone());
        let tools_dir = env_optional(paths::EXECLITE_TOOLS_DIR, paths::TOOLS_DIR_ALIASES)
            .map(PathBuf::from)
            .unwrap_or_else(|| cwd.join("tools"));
        let data_dir = env_optional(paths::EXECLITE_DATA_DIR, &[])
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".execlite")
            });
        Self {
            tools_dir,
            workspace,
            data_dir,
        }
    }

    /// Audit log file: `EXECLITE_AUDIT_LOG`, else `<data_dir>/audit.jsonl`.
    pub fn audit_log_path(&self) -> PathBuf {
        ObservabilityConfig::from_env()
            .audit_log
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir.join("audit.jsonl"))
    }

    /// Root for per-session scratch directories.
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }
}

/// Sandbox defaults. Limits are ceilings, not reservations.
#[derive(Debug, Clone)]
pub struct SandboxSettings {
    pub sandbox_type: Option<String>,
    pub max_memory_mb: u64,
    pub max_cpu_percent: f64,
    pub timeout_ms: u64,
    pub allowed_env_vars: Vec<String>,
    pub network_mode: String,
    pub allowed_domains: Vec<String>,
    pub python_image: String,
    pub node_image: String,
    pub max_output_bytes: usize,
    pub max_tool_calls: usize,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            sandbox_type: None,
            max_memory_mb: 256,
            max_cpu_percent: 100.0,
            timeout_ms: 30_000,
            allowed_env_vars: Vec::new(),
            network_mode: "none".to_string(),
            allowed_domains: Vec::new(),
            python_image: "python:3.12-slim".to_string(),
            node_image: "node:22-slim".to_string(),
            max_output_bytes: 1024 * 1024,
            max_tool_calls: 64,
        }
    }
}

impl SandboxSettings {
    pub fn from_env() -> Self {
        load_dotenv();
        let d = Self::default();
        Self {
            sandbox_type: env_optional(sandbox_keys::EXECLITE_SANDBOX_TYPE, &[]),
            max_memory_mb: env_parse(sandbox_keys::EXECLITE_MAX_MEMORY_MB, &[], d.max_memory_mb),
            max_cpu_percent: env_parse(
                sandbox_keys::EXECLITE_MAX_CPU_PERCENT,
                &[],
                d.max_cpu_percent,
            ),
            timeout_ms: env_parse(sandbox_keys::EXECLITE_TIMEOUT_MS, &[], d.timeout_ms),
            allowed_env_vars: env_list(sandbox_keys::EXECLITE_ALLOWED_ENV, &[]),
            network_mode: env_or(sandbox_keys::EXECLITE_NETWORK, &[], || d.network_mode.clone()),
            allowed_domains: env_list(sandbox_keys::EXECLITE_ALLOWED_DOMAINS, &[]),
            python_image: env_or(sandbox_keys::EXECLITE_PYTHON_IMAGE, &[], || {
                d.python_image.clone()
            }),
            node_image: env_or(sandbox_keys::EXECLITE_NODE_IMAGE, &[], || d.node_image.clone()),
            max_output_bytes: env_parse(
                sandbox_keys::EXECLITE_MAX_OUTPUT_BYTES,
                &[],
                d.max_output_bytes,
            ),
            max_tool_calls: env_parse(sandbox_keys::EXECLITE_MAX_TOOL_CALLS, &[], d.max_tool_calls),
        }
    }
}

/// Background reclamation of orphaned containers
#[derive(Debug, Clone)]
pub struct CleanupSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    pub orphan_max_age_secs: u64,
    pub max_per_cycle: usize,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            orphan_max_age_secs: 3600,
            max_per_cycle: 20,
        }
    }
}

impl CleanupSettings {
    pub fn from_env() -> Self {
        load_dotenv();
        let d = Self::default();
        Self {
            enabled: env_bool(cleanup_keys::EXECLITE_CLEANUP_ENABLED, &[], d.enabled),
            interval_secs: env_parse(
                cleanup_keys::EXECLITE_CLEANUP_INTERVAL_SECS,
                &[],
                d.interval_secs,
            ),
            orphan_max_age_secs: env_parse(
                cleanup_keys::EXECLITE_ORPHAN_MAX_AGE_SECS,
                &[],
                d.orphan_max_age_secs,
            ),
            max_per_cycle: env_parse(
                cleanup_keys::EXECLITE_CLEANUP_MAX_PER_CYCLE,
                &[],
                d.max_per_cycle,
            ),
        }
    }
}

/// Static validation thresholds and approval
#[derive(Debug, Clone)]
pub struct ValidatorSettings {
    pub risk_threshold: u8,
    pub rules_file: Option<PathBuf>,
    pub auto_approve: bool,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            risk_threshold: 70,
            rules_file: None,
            auto_approve: false,
        }
    }
}

impl ValidatorSettings {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            risk_threshold: env_parse(security_keys::EXECLITE_RISK_THRESHOLD, &[], 70u8),
            rules_file: env_optional(security_keys::EXECLITE_RULES_FILE, &[]).map(PathBuf::from),
            auto_approve: env_bool(
                security_keys::EXECLITE_AUTO_APPROVE,
                security_keys::AUTO_APPROVE_ALIASES,
                false,
            ),
        }
    }
}

/// Wrapper synthesis and discovery
#[derive(Debug, Clone)]
pub struct CodegenSettings {
    /// Characters per token for the wrapper size estimate.
    pub chars_per_token: f64,
    pub max_tools: usize,
}

impl Default for CodegenSettings {
    fn default() -> Self {
        Self {
            chars_per_token: 4.0,
            max_tools: 5,
        }
    }
}

impl CodegenSettings {
    pub fn from_env() -> Self {
        load_dotenv();
        let d = Self::default();
        let chars_per_token = env_parse(
            codegen_keys::EXECLITE_CHARS_PER_TOKEN,
            &[],
            d.chars_per_token,
        );
        Self {
            chars_per_token: if chars_per_token > 0.0 {
                chars_per_token
            } else {
                d.chars_per_token
            },
            max_tools: env_parse(codegen_keys::EXECLITE_MAX_TOOLS, &[], d.max_tools),
        }
    }
}
