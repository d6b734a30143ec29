//! Sandbox configuration and the isolation-level policy.

use crate::env::builder::SandboxEnv;
use crate::error::SandboxError;
use crate::limits::ResourceLimits;
use crate::security::Capability;
use execlite_core::config::SandboxSettings;
use execlite_core::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Risk score at or above which code always runs in a container.
pub const HIGH_RISK_THRESHOLD: u8 = 60;
/// Risk score at or above which code runs at least in the VM tier.
pub const MEDIUM_RISK_THRESHOLD: u8 = 30;

pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_TOOL_CALLS: usize = 64;

/// Isolation tiers, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxType {
    Process,
    Vm,
    Container,
}

impl SandboxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxType::Process => "process",
            SandboxType::Vm => "vm",
            SandboxType::Container => "container",
        }
    }
}

impl fmt::Display for SandboxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SandboxType {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(SandboxType::Process),
            "vm" => Ok(SandboxType::Vm),
            "container" | "docker" => Ok(SandboxType::Container),
            other => Err(SandboxError::Config(format!("unknown sandbox type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// No egress at all.
    #[default]
    None,
    /// Egress only to `allowed_domains`.
    Restricted,
    Full,
}

impl FromStr for NetworkMode {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(NetworkMode::None),
            "restricted" => Ok(NetworkMode::Restricted),
            "full" => Ok(NetworkMode::Full),
            other => Err(SandboxError::Config(format!("unknown network mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPolicy {
    pub mode: NetworkMode,
    pub allowed_domains: Vec<String>,
}

impl NetworkPolicy {
    pub fn allows_egress(&self) -> bool {
        match self.mode {
            NetworkMode::None => false,
            NetworkMode::Restricted => !self.allowed_domains.is_empty(),
            NetworkMode::Full => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Minimum isolation tier. `None` lets the policy decide alone.
    pub sandbox_type: Option<SandboxType>,
    pub resource_limits: ResourceLimits,
    pub network_policy: NetworkPolicy,
    pub allowed_env_vars: Vec<String>,
    pub max_output_bytes: usize,
    pub max_tool_calls: usize,
    pub python_image: String,
    pub node_image: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            sandbox_type: None,
            resource_limits: ResourceLimits::default(),
            network_policy: NetworkPolicy::default(),
            allowed_env_vars: Vec::new(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            python_image: "python:3.12-slim".to_string(),
            node_image: "node:22-slim".to_string(),
        }
    }
}

impl SandboxConfig {
    pub fn from_settings(settings: &SandboxSettings) -> Result<Self, SandboxError> {
        let sandbox_type = settings
            .sandbox_type
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(SandboxType::from_str)
            .transpose()?;
        let config = Self {
            sandbox_type,
            resource_limits: ResourceLimits {
                memory_mb: settings.max_memory_mb,
                cpu_percent: settings.max_cpu_percent,
                timeout_ms: settings.timeout_ms,
            },
            network_policy: NetworkPolicy {
                mode: settings.network_mode.parse()?,
                allowed_domains: settings.allowed_domains.clone(),
            },
            allowed_env_vars: settings.allowed_env_vars.clone(),
            max_output_bytes: settings.max_output_bytes,
            max_tool_calls: settings.max_tool_calls,
            python_image: settings.python_image.clone(),
            node_image: settings.node_image.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SandboxError> {
        self.resource_limits.validate()?;
        for name in &self.allowed_env_vars {
            SandboxEnv::check_name(name)?;
        }
        if self.max_output_bytes == 0 {
            return Err(SandboxError::Config("output cap must be positive".into()));
        }
        for domain in &self.network_policy.allowed_domains {
            if domain.is_empty()
                || !domain
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
            {
                return Err(SandboxError::Config(format!(
                    "invalid allowed domain '{domain}'"
                )));
            }
        }
        Ok(())
    }

    pub fn image_for(&self, language: Language) -> &str {
        match language {
            Language::Python => &self.python_image,
            Language::TypeScript => &self.node_image,
        }
    }
}

/// What the policy looks at when picking a tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionInput {
    pub risk_score: u8,
    pub language: Language,
    pub operations: BTreeSet<Capability>,
}

/// Pick the isolation tier for one program; `floor` is the configured minimum.
pub fn select_sandbox_level(input: &SelectionInput, floor: Option<SandboxType>) -> SandboxType {
    let needs_container = input.operations.contains(&Capability::Network)
        || input.operations.contains(&Capability::ProcessSpawn)
        || input.risk_score >= HIGH_RISK_THRESHOLD;
    let needs_vm = input.risk_score >= MEDIUM_RISK_THRESHOLD
        || input.operations.contains(&Capability::FileSystem)
        || input.operations.contains(&Capability::SystemAccess);

    let level = if needs_container {
        SandboxType::Container
    } else if needs_vm {
        SandboxType::Vm
    } else {
        SandboxType::Process
    };
    match floor {
        Some(floor) => level.max(floor),
        None => level,
    }
}
