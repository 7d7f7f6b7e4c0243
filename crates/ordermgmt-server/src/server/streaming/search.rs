use super::{StreamControl, report_failure};
use crate::server::interceptor::Outbound;
use ordermgmt_core::{Result, proto::Order};

/// Streams every order in `orders` with an item containing `query`.
///
/// Matches are produced lazily while the client keeps up, each order at most
/// once. Returns the number of orders sent; on failure the client is told
/// why and the error is returned.
pub async fn feed_matches(
    orders: Vec<Order>,
    query: &str,
    mut outbound: Outbound<Order>,
    control: StreamControl,
) -> Result<usize> {
    let mut sent = 0;
    for order in orders.into_iter().filter(|o| o.matches_item(query)) {
        tracing::debug!(order_id = %order.id, "Matching order found");
        if let Err(e) = control.send(&mut outbound, order).await {
            report_failure(outbound, &e).await;
            return Err(e);
        }
        sent += 1;
    }
    Ok(sent)
}
