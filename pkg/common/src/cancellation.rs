//! A cancellation token is anything that can be awaited and resolves once
//! the operation holding it should stop. Grounded on the teacher's
//! `common::cancellation` trait; this crate adds the concrete
//! `Arc`-backed flag implementation the teacher leaves to callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

#[async_trait]
pub trait CancellationToken: Send + Sync + 'static {
    /// Resolves once cancellation has been requested. Implementations
    /// that are already cancelled resolve immediately.
    async fn wait(&self);

    fn is_cancelled(&self) -> bool;
}

/// A sticky, settable cancellation flag. `FileObject::cancel_all` and
/// `ModProgressInfo`'s weak-reference expiry are both modeled on top of
/// this.
#[derive(Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CancellationToken for CancellationFlag {
    async fn wait(&self) {
        // Polled by suspension points rather than woken, matching the
        // teacher's "observed at the next suspension" contract (spec
        // §4.2, §5) instead of a true async notification.
        while !self.inner.load(Ordering::SeqCst) {
            crate::io::yield_now().await;
        }
    }

    fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}
