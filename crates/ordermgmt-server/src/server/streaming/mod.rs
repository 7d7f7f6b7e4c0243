//! Per-call drivers for the three streaming operations.
//!
//! - [`session`] - `ProcessOrders`: bidirectional, destination-batched.
//! - [`search`] - `SearchOrders`: server streaming over a repository snapshot.
//! - [`update`] - `UpdateOrders`: client streaming with a single summary.
//!
//! The server-streaming drivers share [`StreamControl`], which decides when a
//! stream has to stop early: server shutdown, client disconnect, or an
//! elapsed deadline. Stopping early never flushes pending work.

pub mod search;
pub mod session;
pub mod update;

use crate::server::interceptor::Outbound;
use core::fmt;
use ordermgmt_core::{Error, Result};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Early-termination conditions for one outbound stream.
#[derive(Clone, Debug, Default)]
pub struct StreamControl {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl StreamControl {
    pub fn new(cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    /// Resolves with the reason the stream has to stop, if it ever does.
    ///
    /// Shutdown wins over a client disconnect, which wins over the deadline.
    pub async fn interrupted<T>(&self, outbound: &Outbound<T>) -> Error {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Error::ServiceShutdown,
            () = outbound.closed() => Error::RequestCancelled,
            () = deadline_elapsed(self.deadline) => Error::DeadlineExceeded,
        }
    }

    /// Sends `message`, giving up if the stream is interrupted while waiting
    /// for buffer space.
    ///
    /// # Errors
    ///
    /// [`Error::ServiceShutdown`], [`Error::DeadlineExceeded`], or
    /// [`Error::RequestCancelled`] if the client dropped the stream.
    pub async fn send<T: fmt::Debug>(&self, outbound: &mut Outbound<T>, message: T) -> Result<()> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::ServiceShutdown),
            () = deadline_elapsed(self.deadline) => Err(Error::DeadlineExceeded),
            sent = outbound.send(message) => sent.map_err(|e| {
                tracing::debug!(error = %e, "Client dropped the response stream");
                Error::RequestCancelled
            }),
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => core::future::pending().await,
    }
}

/// Ends `outbound` with the status for `err`, unless the error is one the
/// client no longer needs to hear about.
pub(crate) async fn report_failure<T>(outbound: Outbound<T>, err: &Error) {
    if err.is_silent() {
        tracing::debug!(method = outbound.info().method, "Stream cancelled by client");
    } else {
        outbound.fail(err.into()).await;
    }
}
