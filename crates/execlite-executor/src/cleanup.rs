//! Ordered teardown.
//!
//! Components register an async handler as they come up; `cleanup()` runs the
//! handlers once, newest first. A handler that fails, panics or hangs past the
//! per-handler timeout is recorded and the rest still run.

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(10);

type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type Handler = Box<dyn FnOnce() -> HandlerFuture + Send>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub completed: Vec<String>,
    /// `(handler name, error message)`
    pub failed: Vec<(String, String)>,
}

impl CleanupOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct CleanupManager {
    handlers: Mutex<Vec<(String, Handler)>>,
    handler_timeout: Duration,
}

impl Default for CleanupManager {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }
}

impl CleanupManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler: Handler = Box::new(move || Box::pin(handler()) as HandlerFuture);
        self.lock().push((name.into(), handler));
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Handler)>> {
        self.handlers.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Run every registered handler in reverse registration order. Handlers
    /// are consumed, so a second call only runs ones registered since.
    pub async fn cleanup(&self) -> CleanupOutcome {
        let handlers: Vec<(String, Handler)> = std::mem::take(&mut *self.lock());
        let mut outcome = CleanupOutcome::default();
        for (name, handler) in handlers.into_iter().rev() {
            let mut task = tokio::spawn(handler());
            let message = match tokio::time::timeout(self.handler_timeout, &mut task).await {
                Ok(Ok(Ok(()))) => None,
                Ok(Ok(Err(e))) => Some(format!("{:#}", e)),
                Ok(Err(join)) => Some(format!("handler panicked: {}", join)),
                Err(_) => {
                    task.abort();
                    Some(format!(
                        "handler timed out after {} ms",
                        self.handler_timeout.as_millis()
                    ))
                }
            };
            match message {
                None => {
                    tracing::debug!(handler = %name, "Cleanup handler finished");
                    outcome.completed.push(name);
                }
                Some(message) => {
                    tracing::warn!(handler = %name, "Cleanup handler failed: {}", message);
                    outcome.failed.push((name, message));
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reverse_order() {
        let m = CleanupManager::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            m.register(name, move || async move {
                order.lock().unwrap().push(name);
                anyhow::Ok(())
            });
        }
        let outcome = m.cleanup().await;
        assert!(outcome.is_clean());
        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
        assert_eq!(m.pending(), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_block_the_rest() {
        let m = CleanupManager::new().with_handler_timeout(Duration::from_millis(100));
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        m.register("last-to-run", move || async move {
            *flag.lock().unwrap() = true;
            anyhow::Ok(())
        });
        m.register("errors", || async { Err::<(), _>(anyhow::anyhow!("disk gone")) });
        m.register("panics", || async {
            let fail = true;
            if fail {
                panic!("boom");
            }
            anyhow::Ok(())
        });
        m.register("hangs", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            anyhow::Ok(())
        });

        let outcome = m.cleanup().await;
        assert!(*ran.lock().unwrap());
        assert_eq!(outcome.completed, vec!["last-to-run"]);
        let failed: Vec<&str> = outcome.failed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(failed, vec!["hangs", "panics", "errors"]);
        assert!(outcome.failed[2].1.contains("disk gone"));
    }
}
