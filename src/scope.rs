use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{sync::oneshot, task::JoinSet};

use crate::api::ApiError;

/// ViewScope
///
/// Owns every request a mounted view starts. Closing or dropping the scope aborts
/// whatever is still in flight, and results that arrive afterwards are never handed
/// to the view: a `Scoped` handle resolves to `ApiError::Cancelled` instead.
pub struct ViewScope {
    name: &'static str,
    tasks: JoinSet<()>,
    alive: Arc<AtomicBool>,
}

impl ViewScope {
    pub fn new(name: &'static str) -> Self {
        tracing::trace!(view = name, "view scope opened");
        Self {
            name,
            tasks: JoinSet::new(),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// spawn
    ///
    /// Starts `request` on the runtime, tied to this scope. Must be called from within
    /// a Tokio runtime.
    pub fn spawn<T, F>(&mut self, request: F) -> Scoped<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let alive = Arc::clone(&self.alive);

        self.tasks.spawn(async move {
            let result = request.await;
            if alive.load(Ordering::Acquire) {
                // The receiver may already be gone; nothing to deliver then.
                let _ = tx.send(result);
            }
        });

        Scoped {
            rx,
            alive: Arc::clone(&self.alive),
        }
    }

    /// Number of spawned requests not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// close
    ///
    /// Marks the scope dead and aborts every outstanding request. Idempotent.
    pub fn close(&mut self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            let in_flight = self.tasks.len();
            self.tasks.abort_all();
            tracing::debug!(view = self.name, in_flight, "view scope closed");
        }
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.close();
    }
}

/// Scoped
///
/// Handle to a request started through `ViewScope::spawn`.
pub struct Scoped<T> {
    rx: oneshot::Receiver<Result<T, ApiError>>,
    alive: Arc<AtomicBool>,
}

impl<T> Scoped<T> {
    /// Waits for the result. Resolves to `ApiError::Cancelled` if the scope was closed
    /// before the result could be delivered.
    pub async fn join(self) -> Result<T, ApiError> {
        let result = self.rx.await.map_err(|_| ApiError::Cancelled)?;
        if !self.alive.load(Ordering::Acquire) {
            return Err(ApiError::Cancelled);
        }
        result
    }
}
