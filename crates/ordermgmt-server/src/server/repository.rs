//! In-memory order store shared by every call.
//!
//! [`OrderRepository`] is the only mutable state shared across concurrent
//! calls. Writes take an exclusive lock; reads share it. Lookups of a missing
//! id return [`Error::OrderNotFound`] rather than a default record, so an
//! unknown id can never leak an empty destination into shipment grouping.

use ordermgmt_core::{Error, Result, proto::Order, types::sample_orders};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct OrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl OrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository pre-populated with the demo orders 102-106.
    pub fn with_sample_data() -> Self {
        let repository = Self::new();
        for order in sample_orders() {
            repository.put(order);
        }
        repository
    }

    /// Inserts `order` under its id, replacing any previous record. Returns
    /// `true` if an existing order was replaced.
    pub fn put(&self, order: Order) -> bool {
        let id = order.id.clone();
        let replaced = self.orders.write().insert(id, order).is_some();
        tracing::debug!(replaced, "Order stored");
        replaced
    }

    /// Looks up the order stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrderNotFound`] if no order has that id.
    pub fn get(&self, id: &str) -> Result<Order> {
        self.orders
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::OrderNotFound { id: id.to_string() })
    }

    /// A point-in-time copy of every stored order, sorted by id.
    pub fn snapshot(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.read().values().cloned().collect();
        orders.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        orders
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn order(id: &str, destination: &str) -> Order {
        Order {
            id: id.into(),
            destination: destination.into(),
            items: vec!["Amazon Echo".into()],
            price: 30.0,
            ..Default::default()
        }
    }

    #[test]
    fn missing_id_is_not_found_not_default() {
        let repository = OrderRepository::new();
        let err = repository.get("999").unwrap_err();
        assert!(matches!(err, Error::OrderNotFound { ref id } if id == "999"));
    }

    #[test]
    fn put_overwrites_existing_record() {
        let repository = OrderRepository::new();
        assert!(!repository.put(order("201", "San Jose, CA")));
        assert!(repository.put(order("201", "Mountain View, CA")));

        assert_eq!(repository.len(), 1);
        assert_eq!(repository.get("201").unwrap().destination, "Mountain View, CA");
    }

    #[test]
    fn snapshot_is_sorted_and_detached() {
        let repository = OrderRepository::with_sample_data();
        let snapshot = repository.snapshot();
        let ids: Vec<_> = snapshot.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["102", "103", "104", "105", "106"]);

        repository.put(order("101", "San Jose, CA"));
        assert_eq!(snapshot.len(), 5);
        assert_eq!(repository.len(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_and_readers() {
        let repository = Arc::new(OrderRepository::new());
        let mut handles = Vec::new();

        for writer in 0..8 {
            let repository = Arc::clone(&repository);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let id = format!("{writer}-{i}");
                    repository.put(order(&id, "San Jose, CA"));
                    assert_eq!(repository.get(&id).unwrap().id, id);
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repository.len(), 8 * 50);
    }
}
