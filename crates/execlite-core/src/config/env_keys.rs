//! Environment variable keys and alias definitions.
//!
//! Primary names use the `EXECLITE_*` prefix; aliases are consulted in order.

/// Tool schemas, workspace, data directory
pub mod paths {
    pub const EXECLITE_TOOLS_DIR: &str = "EXECLITE_TOOLS_DIR";
    pub const TOOLS_DIR_ALIASES: &[&str] = &["TOOLS_DIR"];

    pub const EXECLITE_WORKSPACE: &str = "EXECLITE_WORKSPACE";

    pub const EXECLITE_DATA_DIR: &str = "EXECLITE_DATA_DIR";
}

/// Logging and audit trail
pub mod observability {
    pub const EXECLITE_QUIET: &str = "EXECLITE_QUIET";

    pub const EXECLITE_LOG_LEVEL: &str = "EXECLITE_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["RUST_LOG_LEVEL"];

    pub const EXECLITE_LOG_JSON: &str = "EXECLITE_LOG_JSON";

    pub const EXECLITE_AUDIT_LOG: &str = "EXECLITE_AUDIT_LOG";
    pub const AUDIT_LOG_ALIASES: &[&str] = &["AUDIT_LOG_PATH"];
}

/// Sandbox backends and resource ceilings
pub mod sandbox {
    /// Minimum backend: "process", "vm" or "container". Unset means risk-based.
    pub const EXECLITE_SANDBOX_TYPE: &str = "EXECLITE_SANDBOX_TYPE";
    pub const EXECLITE_MAX_MEMORY_MB: &str = "EXECLITE_MAX_MEMORY_MB";
    pub const EXECLITE_MAX_CPU_PERCENT: &str = "EXECLITE_MAX_CPU_PERCENT";
    pub const EXECLITE_TIMEOUT_MS: &str = "EXECLITE_TIMEOUT_MS";
    /// Comma separated host variables passed through to sandboxes.
    pub const EXECLITE_ALLOWED_ENV: &str = "EXECLITE_ALLOWED_ENV";
    /// "none" (default), "restricted" or "full".
    pub const EXECLITE_NETWORK: &str = "EXECLITE_NETWORK";
    pub const EXECLITE_ALLOWED_DOMAINS: &str = "EXECLITE_ALLOWED_DOMAINS";
    pub const EXECLITE_PYTHON_IMAGE: &str = "EXECLITE_PYTHON_IMAGE";
    pub const EXECLITE_NODE_IMAGE: &str = "EXECLITE_NODE_IMAGE";
    pub const EXECLITE_MAX_OUTPUT_BYTES: &str = "EXECLITE_MAX_OUTPUT_BYTES";
    pub const EXECLITE_MAX_TOOL_CALLS: &str = "EXECLITE_MAX_TOOL_CALLS";
}

/// Orphaned container reclamation
pub mod cleanup {
    pub const EXECLITE_CLEANUP_ENABLED: &str = "EXECLITE_CLEANUP_ENABLED";
    pub const EXECLITE_CLEANUP_INTERVAL_SECS: &str = "EXECLITE_CLEANUP_INTERVAL_SECS";
    pub const EXECLITE_ORPHAN_MAX_AGE_SECS: &str = "EXECLITE_ORPHAN_MAX_AGE_SECS";
    pub const EXECLITE_CLEANUP_MAX_PER_CYCLE: &str = "EXECLITE_CLEANUP_MAX_PER_CYCLE";
}

/// Static validation and approval
pub mod security {
    pub const EXECLITE_RISK_THRESHOLD: &str = "EXECLITE_RISK_THRESHOLD";
    /// YAML file with custom rules (`use_default_rules`, `disabled_rules`, `rules`).
    pub const EXECLITE_RULES_FILE: &str = "EXECLITE_RULES_FILE";
    pub const EXECLITE_AUTO_APPROVE: &str = "EXECLITE_AUTO_APPROVE";
    pub const AUTO_APPROVE_ALIASES: &[&str] = &["AUTO_APPROVE"];
}

/// Wrapper generation and discovery
pub mod codegen {
    pub const EXECLITE_CHARS_PER_TOKEN: &str = "EXECLITE_CHARS_PER_TOKEN";
    pub const EXECLITE_MAX_TOOLS: &str = "EXECLITE_MAX_TOOLS";
}
