//! Cooperative cancellation for in-flight activation work.
//!
//! A [`CancelHandle`] owns a `watch` channel; every [`CancelToken`] observes
//! it. Dropping the last handle counts as cancellation, so no poll loop or
//! pending request outlives the workflow that started it.

use std::sync::Arc;

use tokio::sync::watch;

/// The cancelling side. Cheap to clone; all clones share one signal.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// The observing side, handed to long-running operations.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelHandle {
    /// A fresh, uncancelled handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation to every token. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A token observing this handle.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: Some(self.tx.subscribe()),
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation has been signalled or every handle was dropped.
    pub fn is_cancelled(&self) -> bool {
        match &self.rx {
            None => false,
            Some(rx) => *rx.borrow() || rx.has_changed().is_err(),
        }
    }

    /// Resolve once cancellation is signalled or every handle is dropped.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
