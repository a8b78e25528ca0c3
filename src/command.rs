//! The terminal operation a pipeline ultimately executes.

use crate::error::ServiceError;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

type CommandFn = dyn Fn() -> BoxFuture<'static, Result<(), ServiceError>> + Send + Sync;

/// A caller-supplied nullary operation producing success or a domain error.
///
/// Cloning is cheap; the engine and the caller share one closure. The
/// closure is invoked once per attempt, so a retry layer may call it several
/// times within a single top-level invocation.
#[derive(Clone)]
pub struct Command {
    run: Arc<CommandFn>,
}

impl Command {
    /// Wrap an async operation.
    ///
    /// ```rust
    /// use palisade::Command;
    ///
    /// let command = Command::new(|| async { Ok(()) });
    /// # let _ = command;
    /// ```
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        Self {
            run: Arc::new(move || -> BoxFuture<'static, Result<(), ServiceError>> {
                Box::pin(operation())
            }),
        }
    }

    pub(crate) async fn invoke(&self) -> Result<(), ServiceError> {
        (self.run)().await
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Command(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn invokes_the_wrapped_operation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let command = Command::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        assert!(command.invoke().await.is_ok());
        assert!(command.invoke().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clones_share_the_operation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let command = Command::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let clone = command.clone();
        assert!(clone.invoke().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
