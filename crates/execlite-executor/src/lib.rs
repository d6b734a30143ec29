//! execlite execution runtime.
//!
//! [`Orchestrator`] drives discovery, code generation, validation, sandboxed
//! execution and result processing for each request. Session workspaces,
//! ordered teardown and the built-in filesystem tools live alongside it.

pub mod cleanup;
pub mod invoker;
pub mod orchestrator;
pub mod summary;
pub mod workspace;

pub use cleanup::{CleanupManager, CleanupOutcome};
pub use invoker::{LocalToolInvoker, LOCAL_TOOLS};
pub use orchestrator::{
    ExecutionOptions, ExecutionRequest, Orchestrator, OrchestratorConfig, OrchestratorStats,
};
pub use workspace::{Session, WorkspaceError, WorkspaceManager};
