//! Message-level decorators for streaming calls.
//!
//! [`Intercepted`] wraps an inbound `Stream` and reports each item to the
//! chain as it is pulled. [`Outbound`] owns the sending half of a response
//! channel; it is neither `Clone` nor shareable by `&`, and
//! [`send`](Outbound::send) takes `&mut self`, so a stream has exactly one
//! send path and its messages go out in FIFO order.

use super::{CallInfo, InterceptorChain};
use core::{
    fmt,
    pin::Pin,
    task::{Context, Poll, ready},
};
use futures::Stream;
use ordermgmt_core::Error;
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tonic::Status;

pin_project! {
    /// Inbound stream adapter returned by
    /// [`InterceptorChain::intercept_inbound`].
    pub struct Intercepted<S> {
        #[pin]
        inner: S,
        chain: InterceptorChain,
        info: CallInfo,
    }
}

impl<S> Intercepted<S> {
    pub(super) fn new(inner: S, chain: InterceptorChain, info: CallInfo) -> Self {
        Self { inner, chain, info }
    }
}

impl<S, T> Stream for Intercepted<S>
where
    S: Stream<Item = Result<T, Status>>,
    T: fmt::Debug,
{
    type Item = Result<T, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let item = ready!(this.inner.poll_next(cx));
        if let Some(item) = &item {
            this.chain
                .received(this.info, item.as_ref().map(|m| m as &dyn fmt::Debug));
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// The single send path of a streaming response.
pub struct Outbound<T> {
    tx: mpsc::Sender<Result<T, Status>>,
    chain: InterceptorChain,
    info: CallInfo,
}

impl<T> Outbound<T> {
    pub(super) fn new(
        tx: mpsc::Sender<Result<T, Status>>,
        chain: InterceptorChain,
        info: CallInfo,
    ) -> Self {
        Self { tx, chain, info }
    }

    pub fn info(&self) -> &CallInfo {
        &self.info
    }

    /// Resolves once the client side of the response stream has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// Ends the response stream with `status`. Best effort: if the client is
    /// already gone there is no one to tell, so the failure is only logged.
    pub async fn fail(self, status: Status) {
        if let Err(_e) = self.tx.send(Err(status)).await {
            tracing::debug!(method = self.info.method, "Response stream closed before error");
        }
    }
}

impl<T: fmt::Debug> Outbound<T> {
    /// Hands `message` to the transport, waiting for buffer space.
    ///
    /// Send hooks fire only after a slot is reserved. A message abandoned
    /// while waiting, or refused by a closed stream, is not reported.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if the response stream was dropped.
    pub async fn send(&mut self, message: T) -> Result<(), Error> {
        let permit = self.tx.reserve().await.map_err(|_| Error::ChannelError {
            context: format!("{} response stream closed", self.info.method),
        })?;
        self.chain.sent(&self.info, &message);
        permit.send(Ok(message));
        Ok(())
    }
}
