//! The `ProcessOrders` session.
//!
//! A [`ProcessSession`] pulls order ids from the client one at a time,
//! resolves each against the [`OrderRepository`], and feeds the resolved
//! orders into a [`ShipmentAggregator`] it owns outright. Whenever the
//! aggregator reaches its batch size, every in-progress shipment is sent
//! back; when the client finishes sending, whatever is left is sent as a
//! final flush.
//!
//! ## States
//!
//! ```text
//!   Active --(end of input)--> Draining --(final flush sent)--> Closed
//!     |                           |
//!     +-----(error / cancel)------+------------------------------> Closed
//! ```
//!
//! Ids that do not resolve are logged and skipped. Any other receive error
//! ends the session immediately with that error; pending shipments are
//! dropped, as they are on shutdown, client disconnect, or deadline.

use super::{StreamControl, report_failure};
use crate::server::{
    aggregator::ShipmentAggregator, interceptor::Outbound, repository::OrderRepository, telemetry,
};
use futures::{Stream, StreamExt};
use ordermgmt_core::{
    Error, Result,
    proto::{CombinedShipment, OrderId},
};
use std::sync::Arc;
use tonic::Status;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Active,
    Draining,
    Closed,
}

/// What a session did before it closed cleanly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Ids resolved and absorbed into a shipment.
    pub absorbed: usize,
    /// Ids skipped because no order has that id.
    pub skipped: usize,
    /// Shipments sent, including the final flush.
    pub shipments: usize,
    /// Non-empty flushes, including the final one.
    pub flushes: usize,
    /// The state the session ended in.
    pub state: SessionState,
}

pub struct ProcessSession<S> {
    inbound: S,
    outbound: Outbound<CombinedShipment>,
    repository: Arc<OrderRepository>,
    aggregator: ShipmentAggregator,
    control: StreamControl,
    state: SessionState,
    report: SessionReport,
}

impl<S> ProcessSession<S>
where
    S: Stream<Item = core::result::Result<OrderId, Status>> + Unpin,
{
    pub fn new(
        inbound: S,
        outbound: Outbound<CombinedShipment>,
        repository: Arc<OrderRepository>,
        batch_size: usize,
    ) -> Self {
        Self {
            inbound,
            outbound,
            repository,
            aggregator: ShipmentAggregator::new(batch_size),
            control: StreamControl::default(),
            state: SessionState::Active,
            report: SessionReport::default(),
        }
    }

    pub fn with_control(mut self, control: StreamControl) -> Self {
        self.control = control;
        self
    }

    /// Drives the session to completion.
    ///
    /// On failure the client is told why (unless it has already gone) and
    /// the error is returned for the caller to record.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if receiving from the client failed.
    /// - [`Error::RequestCancelled`] if the client went away.
    /// - [`Error::DeadlineExceeded`] if the stream deadline elapsed.
    /// - [`Error::ServiceShutdown`] if the server is shutting down.
    pub async fn run(mut self) -> Result<SessionReport> {
        match self.drive().await {
            Ok(()) => Ok(SessionReport {
                state: self.state,
                ..self.report
            }),
            Err(e) => {
                self.transition(SessionState::Closed);
                tracing::debug!(
                    pending = self.aggregator.pending_destinations(),
                    "Dropping unflushed shipments"
                );
                report_failure(self.outbound, &e).await;
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            let next = tokio::select! {
                biased;
                err = self.control.interrupted(&self.outbound) => return Err(err),
                next = self.inbound.next() => next,
            };

            match next {
                Some(Ok(id)) => self.handle(id).await?,
                Some(Err(status)) => return Err(Error::Transport(status)),
                None => break,
            }
        }

        self.transition(SessionState::Draining);
        let shipments = self.aggregator.drain();
        self.emit(shipments).await?;
        self.transition(SessionState::Closed);
        Ok(())
    }

    async fn handle(&mut self, id: OrderId) -> Result<()> {
        tracing::debug!(order_id = %id.value, "Reading order");

        match self.repository.get(&id.value) {
            Ok(order) => {
                self.aggregator.absorb(order);
                self.report.absorbed += 1;
                telemetry::increment_orders_absorbed();
            }
            Err(Error::OrderNotFound { id }) => {
                tracing::warn!(order_id = %id, "Order not found, skipping");
                self.report.skipped += 1;
                telemetry::increment_orders_skipped();
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if self.aggregator.should_flush() {
            let shipments = self.aggregator.drain();
            self.emit(shipments).await?;
        }
        Ok(())
    }

    async fn emit(&mut self, shipments: Vec<CombinedShipment>) -> Result<()> {
        if shipments.is_empty() {
            return Ok(());
        }

        let count = shipments.len();
        for shipment in shipments {
            tracing::debug!(
                shipment_id = %shipment.id,
                orders = shipment.orders_list.len(),
                "Sending shipment"
            );
            self.control.send(&mut self.outbound, shipment).await?;
        }

        self.report.shipments += count;
        self.report.flushes += 1;
        telemetry::increment_shipments_emitted(count as u64);
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }
}
