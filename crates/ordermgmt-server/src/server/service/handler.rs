//! gRPC service implementation for order management.
//!
//! [`OrderService`] implements the generated [`OrderManagement`] trait. Every
//! call passes through the service's [`InterceptorChain`] and is admitted by
//! its [`Lifecycle`]. Server-streaming and bidirectional calls run in their own
//! task and hand results back through a bounded channel, so each response
//! stream has a single producer and keeps FIFO order.

use super::lifecycle::{InflightGuard, Lifecycle};
use crate::server::{
    config::ServerConfig,
    interceptor::{CallInfo, CallKind, InterceptorChain, StreamGuard, methods},
    repository::OrderRepository,
    streaming::{
        StreamControl, search::feed_matches, session::ProcessSession, update::apply_updates,
    },
    telemetry,
};
use core::pin::Pin;
use futures::Stream;
use ordermgmt_core::{
    Error,
    proto::{
        CombinedShipment, Order, OrderId, SearchQuery, UpdateSummary,
        order_management_server::OrderManagement,
    },
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::Instrument;

const ADD_ORDER: CallInfo = CallInfo::new(methods::ADD_ORDER, CallKind::Unary);
const GET_ORDER: CallInfo = CallInfo::new(methods::GET_ORDER, CallKind::Unary);
const SEARCH_ORDERS: CallInfo = CallInfo::new(methods::SEARCH_ORDERS, CallKind::ServerStreaming);
const UPDATE_ORDERS: CallInfo = CallInfo::new(methods::UPDATE_ORDERS, CallKind::ClientStreaming);
const PROCESS_ORDERS: CallInfo = CallInfo::new(methods::PROCESS_ORDERS, CallKind::Bidirectional);

#[derive(Clone, Debug)]
pub struct OrderService {
    config: ServerConfig,
    repository: Arc<OrderRepository>,
    interceptors: InterceptorChain,
    lifecycle: Arc<Lifecycle>,
}

impl OrderService {
    /// Creates a service with the standard interceptor chain, seeding the
    /// repository with the sample orders unless the config disables it.
    pub fn new(config: ServerConfig) -> Self {
        let repository = if config.seed_sample_data {
            OrderRepository::with_sample_data()
        } else {
            OrderRepository::new()
        };
        tracing::debug!(orders = repository.len(), "Order repository ready");

        Self {
            lifecycle: Arc::new(Lifecycle::new(config.shutdown_timeout)),
            config,
            repository: Arc::new(repository),
            interceptors: InterceptorChain::standard(),
        }
    }

    /// Replaces the interceptor chain applied to every call.
    pub fn with_interceptors(mut self, interceptors: InterceptorChain) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn repository(&self) -> &Arc<OrderRepository> {
        &self.repository
    }

    /// Refuses new calls, gives in-flight calls up to `shutdown_timeout` to
    /// finish, then cancels the rest.
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }

    fn stream_control(&self) -> StreamControl {
        let deadline = self
            .config
            .stream_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);
        StreamControl::new(self.lifecycle.child_token(), deadline)
    }

    /// Fires the open hook and admits a streaming call. A refused call is
    /// closed again straight away.
    fn open_stream(&self, info: CallInfo) -> Result<OpenStream, Status> {
        let mut hooks = self.interceptors.open_stream(info);
        match self.lifecycle.admit() {
            Ok(inflight) => Ok(OpenStream {
                hooks,
                started: std::time::Instant::now(),
                _inflight: inflight,
            }),
            Err(e) => {
                let status = Status::from(e);
                hooks.close(Err(&status));
                Err(status)
            }
        }
    }
}

/// An admitted streaming call.
///
/// Dropping it without [`finish`](Self::finish) closes the stream as
/// cancelled. Either way the stream duration is recorded and the call stops
/// counting as in flight.
struct OpenStream {
    hooks: StreamGuard,
    started: std::time::Instant,
    _inflight: InflightGuard,
}

impl OpenStream {
    fn finish<T>(mut self, result: &ordermgmt_core::Result<T>) {
        match result {
            Ok(_) => self.hooks.close(Ok(())),
            Err(e) => self.hooks.close(Err(&Status::from(e))),
        }
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        telemetry::record_stream_duration(self.started.elapsed().as_secs_f64() * 1000.0);
    }
}

#[tonic::async_trait]
impl OrderManagement for OrderService {
    type SearchOrdersStream = Pin<Box<dyn Stream<Item = Result<Order, Status>> + Send>>;
    type ProcessOrdersStream = Pin<Box<dyn Stream<Item = Result<CombinedShipment, Status>> + Send>>;

    #[tracing::instrument(skip_all, fields(order_id = %request.get_ref().id))]
    async fn add_order(&self, request: Request<Order>) -> Result<Response<OrderId>, Status> {
        self.interceptors
            .unary(ADD_ORDER, request, |request| async move {
                let _guard = self.lifecycle.admit()?;
                let order = request.into_inner();
                order.validate()?;

                let value = order.id.clone();
                self.repository.put(order);
                Ok::<_, Status>(Response::new(OrderId { value }))
            })
            .await
    }

    #[tracing::instrument(skip_all, fields(order_id = %request.get_ref().value))]
    async fn get_order(&self, request: Request<OrderId>) -> Result<Response<Order>, Status> {
        self.interceptors
            .unary(GET_ORDER, request, |request| async move {
                let _guard = self.lifecycle.admit()?;
                let order = self.repository.get(&request.get_ref().value)?;
                Ok::<_, Status>(Response::new(order))
            })
            .await
    }

    #[tracing::instrument(skip_all, fields(query = %request.get_ref().value))]
    async fn search_orders(
        &self,
        request: Request<SearchQuery>,
    ) -> Result<Response<Self::SearchOrdersStream>, Status> {
        let stream = self.open_stream(SEARCH_ORDERS)?;

        let query = request.into_inner();
        self.interceptors.received(&SEARCH_ORDERS, Ok(&query));

        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);
        let outbound = self.interceptors.outbound(SEARCH_ORDERS, resp_tx);
        let orders = self.repository.snapshot();
        let control = self.stream_control();

        let fut = async move {
            let result = feed_matches(orders, &query.value, outbound, control).await;
            match &result {
                Ok(sent) => tracing::info!(sent, "Search finished"),
                Err(e) => tracing::warn!(error = %e, "Search ended early"),
            }
            stream.finish(&result);
        };
        tokio::spawn(fut.instrument(tracing::info_span!("search_stream")));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }

    #[tracing::instrument(skip_all)]
    async fn update_orders(
        &self,
        request: Request<Streaming<Order>>,
    ) -> Result<Response<UpdateSummary>, Status> {
        let stream = self.open_stream(UPDATE_ORDERS)?;
        let cancel = self.lifecycle.child_token();
        let inbound = self
            .interceptors
            .intercept_inbound(UPDATE_ORDERS, request.into_inner());

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::ServiceShutdown),
            result = apply_updates(inbound, &self.repository) => result,
        };
        if let Ok(summary) = &result {
            self.interceptors.sent(&UPDATE_ORDERS, summary);
            tracing::info!(updated = summary.order_ids.len(), "Orders updated");
        }
        stream.finish(&result);

        result.map(Response::new).map_err(Status::from)
    }

    #[tracing::instrument(skip_all)]
    async fn process_orders(
        &self,
        request: Request<Streaming<OrderId>>,
    ) -> Result<Response<Self::ProcessOrdersStream>, Status> {
        let stream = self.open_stream(PROCESS_ORDERS)?;

        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);
        let inbound = self
            .interceptors
            .intercept_inbound(PROCESS_ORDERS, request.into_inner());
        let session = ProcessSession::new(
            inbound,
            self.interceptors.outbound(PROCESS_ORDERS, resp_tx),
            Arc::clone(&self.repository),
            self.config.batch_size,
        )
        .with_control(self.stream_control());

        let fut = async move {
            let result = session.run().await;
            match &result {
                Ok(report) => tracing::info!(?report, "Order processing finished"),
                Err(e) if e.is_silent() => tracing::info!("Order processing cancelled by client"),
                Err(e) => tracing::warn!(error = %e, "Order processing failed"),
            }
            stream.finish(&result);
        };
        tokio::spawn(fut.instrument(tracing::info_span!("process_stream")));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}
