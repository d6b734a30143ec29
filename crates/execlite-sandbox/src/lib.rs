//! execlite sandboxing: static validation, resource limits and the process,
//! VM and container execution tiers behind one manager.

pub mod bridge;
pub mod cleanup_job;
pub mod common;
pub mod container;
pub mod container_runtime;
pub mod env;
pub mod error;
pub mod limits;
pub mod log;
pub mod manager;
pub mod policy;
pub mod process;
pub mod result;
pub mod runtime;
pub mod runtime_resolver;
pub mod sandbox_backend;
pub mod security;
pub mod tracker;
pub mod vm;

pub use bridge::{NoopInvoker, ToolInvoker, TOOL_CALL_MARKER};
pub use cleanup_job::{CleanupReport, ContainerCleanupJob};
pub use error::SandboxError;
pub use limits::{PartialLimits, ResourceKind, ResourceLimiter, ResourceLimits, ResourceStats};
pub use manager::SandboxManager;
pub use policy::{NetworkMode, NetworkPolicy, SandboxConfig, SandboxType, SelectionInput};
pub use result::{ErrorKind, ExecutionMetrics, ExecutionResult};
pub use security::{CodeValidator, ValidationResult};
pub use tracker::SandboxTracker;
