//! Destination-keyed shipment batching for `ProcessOrders`.
//!
//! A [`ShipmentAggregator`] turns a flat sequence of resolved orders into
//! [`CombinedShipment`]s, one per destination. It counts every absorbed order
//! against a single global threshold: once `batch_size` orders have been
//! absorbed since the last flush, *all* in-progress shipments are ready to be
//! drained together, including destinations holding a single order.
//!
//! The aggregator is owned by exactly one session and never shared, so it
//! carries no locking. It only ever sees resolved [`Order`]s; ids that do not
//! resolve are handled by the session before they get here.
//!
//! ## Invariants
//!
//! - A destination is present iff it holds at least one unflushed order.
//! - Orders within a shipment keep their absorption order.
//! - [`drain`](ShipmentAggregator::drain) clears everything and resets the
//!   counter to zero.

use ordermgmt_core::proto::{CombinedShipment, Order};
use std::collections::HashMap;

#[derive(Debug)]
pub struct ShipmentAggregator {
    batch_size: usize,
    pending: HashMap<String, CombinedShipment>,
    absorbed: usize,
}

impl ShipmentAggregator {
    /// Creates an empty aggregator that becomes flush-ready after
    /// `batch_size` absorptions. A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pending: HashMap::new(),
            absorbed: 0,
        }
    }

    /// Appends `order` to the shipment for its destination, opening one if
    /// needed.
    pub fn absorb(&mut self, order: Order) {
        self.pending
            .entry(order.destination.clone())
            .or_insert_with_key(|destination| CombinedShipment::open(destination))
            .orders_list
            .push(order);
        self.absorbed += 1;
    }

    /// Returns `true` once `batch_size` orders were absorbed since the last
    /// drain.
    pub fn should_flush(&self) -> bool {
        self.absorbed >= self.batch_size
    }

    /// Takes every in-progress shipment, regardless of size, and resets the
    /// counter. The order of the returned shipments is unspecified.
    pub fn drain(&mut self) -> Vec<CombinedShipment> {
        self.absorbed = 0;
        self.pending.drain().map(|(_, shipment)| shipment).collect()
    }

    /// Orders absorbed since the last drain.
    pub fn absorbed(&self) -> usize {
        self.absorbed
    }

    /// Number of destinations with unflushed orders.
    pub fn pending_destinations(&self) -> usize {
        self.pending.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
