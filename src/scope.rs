//! Ties in-flight requests to the lifetime of the view that issued them.
//!
//! A view owns a [`ViewScope`] and hands [`ScopeToken`]s to the store. When the
//! scope is cancelled or dropped, pending requests resolve to
//! [`ClientError::Cancelled`] and the store discards their results.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ClientError;

pub struct ViewScope {
    tx: watch::Sender<bool>,
}

impl ViewScope {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> ScopeToken {
        ScopeToken {
            rx: self.tx.subscribe(),
            _owner: None,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

#[derive(Clone)]
pub struct ScopeToken {
    rx: watch::Receiver<bool>,
    // keeps the channel open for tokens that belong to no view
    _owner: Option<Arc<watch::Sender<bool>>>,
}

impl ScopeToken {
    /// A token that is never cancelled. Used by one-shot callers such as the CLI.
    pub fn detached() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _owner: Some(Arc::new(tx)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Drive `fut` unless the owning view goes away first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        if self.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ClientError::Cancelled),
            out = fut => out,
        }
    }
}
