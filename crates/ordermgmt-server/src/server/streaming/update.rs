use crate::server::repository::OrderRepository;
use futures::{Stream, StreamExt};
use ordermgmt_core::{
    Error, Result,
    proto::{Order, UpdateSummary},
};
use tonic::Status;

const SUMMARY_PREFIX: &str = "Updated Order IDs : ";

/// Stores every order the client sends and summarizes them once the client
/// is done.
///
/// Orders are written as they arrive, so a receive error part way through
/// leaves the earlier updates in place; it does, however, end the call with
/// that error and no summary.
pub async fn apply_updates<S>(mut inbound: S, repository: &OrderRepository) -> Result<UpdateSummary>
where
    S: Stream<Item = core::result::Result<Order, Status>> + Unpin,
{
    let mut order_ids = Vec::new();

    while let Some(order) = inbound.next().await {
        let order = order.map_err(Error::Transport)?;
        tracing::debug!(order_id = %order.id, "Order updated");
        order_ids.push(order.id.clone());
        repository.put(order);
    }

    Ok(UpdateSummary {
        value: format!("{SUMMARY_PREFIX}{}", order_ids.join(", ")),
        order_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    fn order(id: &str, destination: &str) -> Order {
        Order {
            id: id.into(),
            items: vec!["Google Pixel Book".into()],
            destination: destination.into(),
            price: 1100.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stores_each_order_and_lists_ids_in_arrival_order() {
        let repository = OrderRepository::with_sample_data();
        let updates = vec![
            Ok(order("102", "San Jose, CA")),
            Ok(order("103", "Mountain View, CA")),
            Ok(order("107", "Palo Alto, CA")),
        ];

        let summary = apply_updates(futures::stream::iter(updates), &repository)
            .await
            .unwrap();

        assert_eq!(summary.order_ids, ["102", "103", "107"]);
        assert_eq!(summary.value, "Updated Order IDs : 102, 103, 107");
        assert_eq!(repository.get("102").unwrap().destination, "San Jose, CA");
        assert_eq!(repository.len(), 6);
    }

    #[tokio::test]
    async fn empty_stream_still_produces_a_summary() {
        let repository = OrderRepository::new();
        let summary = apply_updates(futures::stream::empty(), &repository)
            .await
            .unwrap();
        assert!(summary.order_ids.is_empty());
        assert_eq!(summary.value, SUMMARY_PREFIX);
    }

    #[tokio::test]
    async fn receive_error_yields_no_summary() {
        let repository = OrderRepository::new();
        let updates = vec![
            Ok(order("201", "San Jose, CA")),
            Err(Status::unknown("client went away")),
        ];

        let err = apply_updates(futures::stream::iter(updates), &repository)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(ref s) if s.code() == Code::Unknown));
        assert!(repository.get("201").is_ok());
    }
}
