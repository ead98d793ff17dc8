/*!
 * Cooperative cancellation for long-running commands.
 *
 * Work is wrapped in a [`CancellableTask`] that owns a [`Cancellation`]
 * token. The task body checks the token at its own checkpoints and the
 * caller awaits a tagged [`TaskOutcome`].
 */

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    inner: CancellationToken,
}

impl Cancellation {
    pub fn new() -> Self {
        Self {
            inner: CancellationToken::new(),
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.inner.cancel()
    }

    /// Token cancelled together with this one, but cancellable on its own
    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}

impl From<CancellationToken> for Cancellation {
    fn from(token: CancellationToken) -> Self {
        Self { inner: token }
    }
}

/// Result of a cancellable unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T, E> {
    Ok(T),
    Err(E),
    Cancelled,
}

impl<T, E> TaskOutcome<T, E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            _ => None,
        }
    }
}

impl<T, E> From<Result<T, E>> for TaskOutcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(error) => Self::Err(error),
        }
    }
}

/// Spawned unit of work paired with the token that cancels it
pub struct CancellableTask<T, E> {
    handle: JoinHandle<TaskOutcome<T, E>>,
    cancellation: Cancellation,
}

impl<T, E> CancellableTask<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Spawn `work` on the runtime, handing it a fresh token
    pub fn spawn<F, Fut>(work: F) -> Self
    where
        F: FnOnce(Cancellation) -> Fut,
        Fut: Future<Output = TaskOutcome<T, E>> + Send + 'static,
    {
        Self::spawn_with(Cancellation::new(), work)
    }

    /// Spawn `work` with an existing token
    pub fn spawn_with<F, Fut>(cancellation: Cancellation, work: F) -> Self
    where
        F: FnOnce(Cancellation) -> Fut,
        Fut: Future<Output = TaskOutcome<T, E>> + Send + 'static,
    {
        let handle = tokio::spawn(work(cancellation.clone()));
        Self { handle, cancellation }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// Wait for the task to settle
    pub async fn join(self) -> TaskOutcome<T, E> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(join_error) if join_error.is_cancelled() => TaskOutcome::Cancelled,
            Err(join_error) => std::panic::resume_unwind(join_error.into_panic()),
        }
    }
}
