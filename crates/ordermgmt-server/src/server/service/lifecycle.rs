//! Call admission and graceful shutdown.
//!
//! Every call holds an [`InflightGuard`] for as long as it runs. Shutdown
//! happens in phases:
//!
//! 1. Refuse new calls with `UNAVAILABLE`.
//! 2. Wait (up to `shutdown_timeout`) for in-flight calls to finish.
//! 3. Cancel the root [`CancellationToken`]; streams still running observe
//!    their child token and end without flushing.

use core::time::Duration;
use ordermgmt_core::{Error, Result};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct Lifecycle {
    refusing: AtomicBool,
    inflight: AtomicUsize,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl Lifecycle {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            refusing: AtomicBool::new(false),
            inflight: AtomicUsize::new(0),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Registers a new call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn admit(self: &Arc<Self>) -> Result<InflightGuard> {
        // Count first so a concurrent shutdown either sees this call or
        // this call sees the refusal.
        self.inflight.fetch_add(1, Ordering::SeqCst);
        let guard = InflightGuard {
            lifecycle: Arc::clone(self),
        };
        if self.refusing.load(Ordering::SeqCst) {
            return Err(Error::ServiceShutdown);
        }
        Ok(guard)
    }

    /// A token cancelled when shutdown reaches its final phase.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown_token.child_token()
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.refusing.load(Ordering::SeqCst)
    }

    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new calls ===
        tracing::info!("Refusing new requests");
        self.refusing.store(true, Ordering::SeqCst);

        // === Phase 1: Wait for in-flight calls to drain ===
        tracing::info!(active = self.inflight(), "Draining in-flight calls");
        let drained = timeout(self.shutdown_timeout, async {
            while self.inflight() > 0 {
                sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("All in-flight calls drained"),
            Err(_) => tracing::warn!(
                active = self.inflight(),
                "Graceful drain timed out, cancelling remaining calls"
            ),
        }

        // === Phase 2: Cancel whatever is left ===
        self.shutdown_token.cancel();
    }
}

/// Keeps a call counted as in flight until dropped.
#[derive(Debug)]
pub struct InflightGuard {
    lifecycle: Arc<Lifecycle>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.lifecycle.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_inflight_calls() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::from_secs(3)));
        let guard = lifecycle.admit().unwrap();
        let token = lifecycle.child_token();

        let shutdown = tokio::spawn({
            let lifecycle = Arc::clone(&lifecycle);
            async move { lifecycle.shutdown().await }
        });
        tokio::task::yield_now().await;

        assert!(lifecycle.is_shutting_down());
        assert!(matches!(lifecycle.admit(), Err(Error::ServiceShutdown)));
        assert_eq!(lifecycle.inflight(), 1);
        assert!(!token.is_cancelled());

        drop(guard);
        shutdown.await.unwrap();
        assert_eq!(lifecycle.inflight(), 0);
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_calls_that_outlive_the_timeout() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::from_secs(1)));
        let _guard = lifecycle.admit().unwrap();
        let token = lifecycle.child_token();
        let started = tokio::time::Instant::now();

        lifecycle.shutdown().await;

        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(token.is_cancelled());
        assert_eq!(lifecycle.inflight(), 1);
    }

    #[test]
    fn refused_call_is_not_left_counted() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::ZERO));
        lifecycle.refusing.store(true, Ordering::SeqCst);
        assert!(lifecycle.admit().is_err());
        assert_eq!(lifecycle.inflight(), 0);
    }
}
