//! # Shared Order Types and Constants
//!
//! Helpers layered over the generated protobuf messages so that client and
//! server agree on how shipments are named, which orders are acceptable, and
//! how search matching works.
//!
//! ## Constants
//!
//! - [`DEFAULT_BATCH_SIZE`] - Orders absorbed per flush in `ProcessOrders`
//! - [`SHIPMENT_ID_PREFIX`] - Prefix of every combined shipment id
//!
//! ## Message helpers
//!
//! - [`CombinedShipment::open`] - A fresh, empty shipment for a destination
//! - [`Order::validate`] - Admission rules applied by `AddOrder`
//! - [`Order::matches_item`] - Substring match used by `SearchOrders`

use crate::{
    Error, Result,
    proto::{CombinedShipment, Order, ShipmentStatus},
};

/// Number of orders absorbed by a `ProcessOrders` session before every
/// in-progress shipment is flushed.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Prefix of combined shipment ids. The full id is the prefix followed by
/// the destination.
pub const SHIPMENT_ID_PREFIX: &str = "cmb-";

/// Derives the combined shipment id for `destination`.
pub fn shipment_id(destination: &str) -> String {
    format!("{SHIPMENT_ID_PREFIX}{destination}")
}

impl CombinedShipment {
    /// Creates an empty, processed shipment for `destination`.
    pub fn open(destination: &str) -> Self {
        Self {
            id: shipment_id(destination),
            status: ShipmentStatus::Processed as i32,
            orders_list: Vec::new(),
        }
    }
}

impl Order {
    /// Returns `true` if any item contains `query` as a substring.
    ///
    /// An empty query matches every order that has at least one item.
    pub fn matches_item(&self, query: &str) -> bool {
        self.items.iter().any(|item| item.contains(query))
    }

    /// Checks the order against the admission rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOrder`] naming the first field that fails:
    /// an empty or negative (`-` prefixed) id, an empty destination, or a
    /// negative or NaN price.
    pub fn validate(&self) -> Result<()> {
        let (field, reason) = if self.id.is_empty() {
            ("id", "Order ID must not be empty".to_string())
        } else if self.id.starts_with('-') {
            ("id", format!("Order ID is invalid: {}", self.id))
        } else if self.destination.is_empty() {
            ("destination", format!("Order {} has no destination", self.id))
        } else if self.price.is_nan() || self.price < 0.0 {
            (
                "price",
                format!("Order {} has an invalid price: {}", self.id, self.price),
            )
        } else {
            return Ok(());
        };

        Err(Error::InvalidOrder { field, reason })
    }
}

/// The demo data set the server seeds its repository with.
pub fn sample_orders() -> Vec<Order> {
    fn order(id: &str, items: &[&str], destination: &str, price: f32) -> Order {
        Order {
            id: id.to_string(),
            items: items.iter().map(|item| (*item).to_string()).collect(),
            description: String::new(),
            price,
            destination: destination.to_string(),
        }
    }

    vec![
        order(
            "102",
            &["Google Pixel 3A", "Mac Book Pro"],
            "Mountain View, CA",
            1800.0,
        ),
        order("103", &["Apple Watch S4"], "San Jose, CA", 400.0),
        order(
            "104",
            &["Google Home Mini", "Google Nest Hub"],
            "Mountain View, CA",
            400.0,
        ),
        order("105", &["Amazon Echo"], "San Jose, CA", 30.0),
        order(
            "106",
            &["Amazon Echo", "Apple iPhone XS"],
            "Mountain View, CA",
            30.0,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, destination: &str, price: f32) -> Order {
        Order {
            id: id.into(),
            items: vec!["Amazon Echo".into()],
            destination: destination.into(),
            price,
            ..Default::default()
        }
    }

    #[test]
    fn shipment_id_is_prefixed_destination() {
        assert_eq!(shipment_id("San Jose, CA"), "cmb-San Jose, CA");
        let shipment = CombinedShipment::open("San Jose, CA");
        assert_eq!(shipment.id, "cmb-San Jose, CA");
        assert_eq!(shipment.status(), ShipmentStatus::Processed);
        assert!(shipment.orders_list.is_empty());
    }

    #[test]
    fn validate_rejects_negative_ids() {
        let err = order("-1", "San Jose, CA", 2300.0).validate().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOrder { field: "id", ref reason } if reason.contains("-1")
        ));
    }

    #[test]
    fn validate_rejects_missing_fields_and_bad_prices() {
        fn rejected_field(order: &Order) -> &'static str {
            match order.validate() {
                Err(Error::InvalidOrder { field, .. }) => field,
                other => panic!("expected an invalid order, got {other:?}"),
            }
        }

        assert_eq!(rejected_field(&order("", "San Jose, CA", 1.0)), "id");
        assert_eq!(rejected_field(&order("201", "", 1.0)), "destination");
        assert_eq!(rejected_field(&order("201", "San Jose, CA", -1.0)), "price");
        assert_eq!(rejected_field(&order("201", "San Jose, CA", f32::NAN)), "price");
        assert!(order("201", "San Jose, CA", 0.0).validate().is_ok());
    }

    #[test]
    fn item_matching_is_substring_based() {
        let order = sample_orders().remove(0);
        assert!(order.matches_item("Google"));
        assert!(order.matches_item("Book"));
        assert!(!order.matches_item("Echo"));
        assert!(order.matches_item(""));
    }

    #[test]
    fn sample_orders_have_unique_ids_and_pass_validation() {
        let orders = sample_orders();
        let mut ids: Vec<_> = orders.iter().map(|o| o.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), orders.len());
        assert!(orders.iter().all(|o| o.validate().is_ok()));
    }
}
