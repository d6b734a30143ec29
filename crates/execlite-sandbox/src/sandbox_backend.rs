//! SandboxBackend trait: extension point for isolation tiers.
//!
//! The manager picks a backend per execution through the policy in
//! [`crate::policy`]; every backend honours the same [`ExecutionContext`].

use async_trait::async_trait;
use execlite_core::Language;
use std::sync::Arc;
use tokio::sync::watch;

use crate::bridge::{RawExecution, ToolInvoker};
use crate::env::SandboxEnv;
use crate::error::SandboxError;
use crate::limits::ResourceLimits;
use crate::policy::{NetworkPolicy, SandboxType};

/// Stop request from the manager once the hard deadline passed. Backends
/// stop their work and still finish teardown before returning.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl Default for CancelSignal {
    /// A signal that never fires.
    fn default() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }
}

impl CancelSignal {
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once a stop was requested; pending forever if the sender is gone.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Everything a backend needs besides the program itself.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Tracker id; containers carry it as a label.
    pub sandbox_id: String,
    pub limits: ResourceLimits,
    pub network: NetworkPolicy,
    pub env: Arc<SandboxEnv>,
    pub invoker: Arc<dyn ToolInvoker>,
    pub max_output_bytes: usize,
    pub max_tool_calls: usize,
    pub cancel: CancelSignal,
}

/// Extension point for sandbox execution backends.
///
/// `execute` must leave nothing behind: temporary directories, child
/// processes and containers are gone when it returns, on every path. When
/// `ctx.cancel` fires it stops early, tears down and returns.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Backend name for logging and diagnostics.
    fn name(&self) -> &str;

    fn sandbox_type(&self) -> SandboxType;

    /// Run `code` (wrapper plus task body, without the runtime prelude).
    async fn execute(
        &self,
        code: &str,
        language: Language,
        ctx: &ExecutionContext,
    ) -> Result<RawExecution, SandboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_signal_fires_once_sent() {
        let (tx, signal) = CancelSignal::channel();
        assert!(!signal.is_cancelled());
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_default_signal_never_fires() {
        let signal = CancelSignal::default();
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.cancelled()).await;
        assert!(waited.is_err());
    }
}
