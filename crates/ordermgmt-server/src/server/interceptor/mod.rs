//! Call and message interception.
//!
//! An [`Interceptor`] observes calls without being able to change them. Every
//! hook receives shared references and returns `()`, so the request, the
//! response and any error reach the client exactly as the handler produced
//! them.
//!
//! ## Hook order
//!
//! - Unary: [`on_call_start`](Interceptor::on_call_start), the handler, then
//!   [`on_call_end`](Interceptor::on_call_end).
//! - Streaming: [`on_stream_start`](Interceptor::on_stream_start), one
//!   [`on_recv`](Interceptor::on_recv) per inbound item and one
//!   [`on_send`](Interceptor::on_send) per outbound message, then
//!   [`on_stream_end`](Interceptor::on_stream_end).
//!
//! Interceptors in an [`InterceptorChain`] nest in registration order: the
//! first registered is the outermost, so its start hooks run first and its
//! end hooks run last.
//!
//! End hooks fire exactly once per call. A call whose future is dropped
//! before it finishes (the client cancelled, or its deadline passed) ends
//! with a `CANCELLED` status.

mod logging;
mod stream;

pub use logging::{LoggingInterceptor, MetricsInterceptor};
pub use stream::{Intercepted, Outbound};

use core::{fmt, future::Future};
use std::sync::Arc;
use tokio::sync::mpsc;
use tonic::{Request, Response, Status};

/// Fully qualified gRPC method names served by this crate.
pub mod methods {
    pub const ADD_ORDER: &str = "/ordermgmt.OrderManagement/AddOrder";
    pub const GET_ORDER: &str = "/ordermgmt.OrderManagement/GetOrder";
    pub const SEARCH_ORDERS: &str = "/ordermgmt.OrderManagement/SearchOrders";
    pub const UPDATE_ORDERS: &str = "/ordermgmt.OrderManagement/UpdateOrders";
    pub const PROCESS_ORDERS: &str = "/ordermgmt.OrderManagement/ProcessOrders";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Unary,
    ServerStreaming,
    ClientStreaming,
    Bidirectional,
}

/// Identifies the call an interceptor hook fires for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallInfo {
    pub method: &'static str,
    pub kind: CallKind,
}

impl CallInfo {
    pub const fn new(method: &'static str, kind: CallKind) -> Self {
        Self { method, kind }
    }
}

/// Observer of calls and stream messages. All hooks default to no-ops.
pub trait Interceptor: Send + Sync + 'static {
    fn on_call_start(&self, _info: &CallInfo, _request: &dyn fmt::Debug) {}

    fn on_call_end(&self, _info: &CallInfo, _outcome: Result<&dyn fmt::Debug, &Status>) {}

    fn on_stream_start(&self, _info: &CallInfo) {}

    fn on_stream_end(&self, _info: &CallInfo, _outcome: Result<(), &Status>) {}

    /// Called for every item pulled from an inbound stream, including receive
    /// errors. Clean end of input is not an item.
    fn on_recv(&self, _info: &CallInfo, _message: Result<&dyn fmt::Debug, &Status>) {}

    /// Called for every message handed to an outbound stream.
    fn on_send(&self, _info: &CallInfo, _message: &dyn fmt::Debug) {}
}

/// An ordered, cheaply clonable list of interceptors.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

impl InterceptorChain {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors: Arc::new(interceptors),
        }
    }

    /// The chain installed by the server binary: logging outermost, metrics
    /// inside it.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(LoggingInterceptor),
            Arc::new(MetricsInterceptor),
        ])
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs a unary `handler` between the start and end hooks and returns its
    /// result untouched.
    pub async fn unary<Req, Resp, F, Fut>(
        &self,
        info: CallInfo,
        request: Request<Req>,
        handler: F,
    ) -> Result<Response<Resp>, Status>
    where
        Req: fmt::Debug,
        Resp: fmt::Debug,
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        for interceptor in self.interceptors.iter() {
            interceptor.on_call_start(&info, request.get_ref());
        }

        let mut pending = PendingCall {
            chain: self,
            info,
            finished: false,
        };
        let result = handler(request).await;
        pending.finished = true;

        let outcome = result
            .as_ref()
            .map(|response| response.get_ref() as &dyn fmt::Debug);
        self.call_ended(&info, outcome);

        result
    }

    /// Fires the stream start hooks. The returned guard fires the end hooks
    /// when closed, or as cancelled if it is dropped first.
    pub fn open_stream(&self, info: CallInfo) -> StreamGuard {
        for interceptor in self.interceptors.iter() {
            interceptor.on_stream_start(&info);
        }
        StreamGuard {
            chain: self.clone(),
            info,
            open: true,
        }
    }

    fn call_ended(&self, info: &CallInfo, outcome: Result<&dyn fmt::Debug, &Status>) {
        for interceptor in self.interceptors.iter().rev() {
            interceptor.on_call_end(info, outcome);
        }
    }

    fn stream_closed(&self, info: &CallInfo, outcome: Result<(), &Status>) {
        for interceptor in self.interceptors.iter().rev() {
            interceptor.on_stream_end(info, outcome);
        }
    }

    pub fn received(&self, info: &CallInfo, message: Result<&dyn fmt::Debug, &Status>) {
        for interceptor in self.interceptors.iter() {
            interceptor.on_recv(info, message);
        }
    }

    pub fn sent(&self, info: &CallInfo, message: &dyn fmt::Debug) {
        for interceptor in self.interceptors.iter() {
            interceptor.on_send(info, message);
        }
    }

    /// Wraps an inbound stream so that every item passes through
    /// [`received`](Self::received).
    pub fn intercept_inbound<S>(&self, info: CallInfo, inbound: S) -> Intercepted<S> {
        Intercepted::new(inbound, self.clone(), info)
    }

    /// Wraps the sending half of a response channel so that every message
    /// passes through [`sent`](Self::sent).
    pub fn outbound<T>(&self, info: CallInfo, tx: mpsc::Sender<Result<T, Status>>) -> Outbound<T> {
        Outbound::new(tx, self.clone(), info)
    }
}

fn dropped_status(info: &CallInfo) -> Status {
    tracing::info!(method = info.method, "Call cancelled before it finished");
    Status::cancelled("Call cancelled before it finished")
}

/// Ends a unary call as cancelled if its handler future is dropped.
struct PendingCall<'a> {
    chain: &'a InterceptorChain,
    info: CallInfo,
    finished: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let status = dropped_status(&self.info);
            self.chain.call_ended(&self.info, Err(&status));
        }
    }
}

/// An open stream, as returned by [`InterceptorChain::open_stream`].
#[must_use = "dropping the guard closes the stream as cancelled"]
pub struct StreamGuard {
    chain: InterceptorChain,
    info: CallInfo,
    open: bool,
}

impl StreamGuard {
    /// Fires the end hooks with `outcome`. Later closes are ignored.
    pub fn close(&mut self, outcome: Result<(), &Status>) {
        if core::mem::take(&mut self.open) {
            self.chain.stream_closed(&self.info, outcome);
        }
    }
}

impl fmt::Debug for StreamGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamGuard")
            .field("info", &self.info)
            .field("open", &self.open)
            .finish()
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.open {
            let status = dropped_status(&self.info);
            self.close(Err(&status));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::time::Duration;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use tonic::Code;

    /// Records every hook as a short string tagged with the interceptor name.
    pub(crate) struct Recorder {
        name: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        pub(crate) fn new(
            name: &'static str,
            events: &Arc<Mutex<Vec<String>>>,
        ) -> Arc<dyn Interceptor> {
            Arc::new(Self {
                name,
                events: Arc::clone(events),
            })
        }

        fn push(&self, event: String) {
            self.events.lock().push(format!("{}:{event}", self.name));
        }
    }

    impl Interceptor for Recorder {
        fn on_call_start(&self, _info: &CallInfo, request: &dyn fmt::Debug) {
            self.push(format!("start {request:?}"));
        }

        fn on_call_end(&self, _info: &CallInfo, outcome: Result<&dyn fmt::Debug, &Status>) {
            match outcome {
                Ok(response) => self.push(format!("end {response:?}")),
                Err(status) => self.push(format!("end err {:?}", status.code())),
            }
        }

        fn on_stream_start(&self, _info: &CallInfo) {
            self.push("open".into());
        }

        fn on_stream_end(&self, _info: &CallInfo, outcome: Result<(), &Status>) {
            match outcome {
                Ok(()) => self.push("close ok".into()),
                Err(status) => self.push(format!("close err {:?}", status.code())),
            }
        }

        fn on_recv(&self, _info: &CallInfo, message: Result<&dyn fmt::Debug, &Status>) {
            match message {
                Ok(message) => self.push(format!("recv {message:?}")),
                Err(status) => self.push(format!("recv err {:?}", status.code())),
            }
        }

        fn on_send(&self, _info: &CallInfo, message: &dyn fmt::Debug) {
            self.push(format!("send {message:?}"));
        }
    }

    const INFO: CallInfo = CallInfo::new("/test/Call", CallKind::Unary);

    fn chain_of_two() -> (InterceptorChain, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new(vec![
            Recorder::new("a", &events),
            Recorder::new("b", &events),
        ]);
        (chain, events)
    }

    #[tokio::test]
    async fn unary_hooks_nest_in_registration_order() {
        let (chain, events) = chain_of_two();

        let response = chain
            .unary(INFO, Request::new(7_u32), |req| async move {
                Ok(Response::new(req.into_inner() * 2))
            })
            .await
            .unwrap();

        assert_eq!(response.into_inner(), 14);
        assert_eq!(
            *events.lock(),
            ["a:start 7", "b:start 7", "b:end 14", "a:end 14"]
        );
    }

    #[tokio::test]
    async fn unary_error_is_returned_unchanged() {
        let (chain, events) = chain_of_two();

        let err = chain
            .unary(INFO, Request::new("999"), |_req| async move {
                Err::<Response<()>, _>(Status::not_found("Order does not exist: 999"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(err.message(), "Order does not exist: 999");
        assert_eq!(events.lock().last().unwrap(), "a:end err NotFound");
    }

    #[tokio::test]
    async fn inbound_hooks_fire_once_per_item() {
        let (chain, events) = chain_of_two();
        let items: Vec<Result<u32, Status>> =
            vec![Ok(1), Ok(2), Err(Status::aborted("reset")), Ok(3)];

        let collected: Vec<_> = chain
            .intercept_inbound(INFO, futures::stream::iter(items))
            .collect()
            .await;

        assert_eq!(collected.len(), 4);
        assert_eq!(collected[2].as_ref().unwrap_err().code(), Code::Aborted);
        let recv_events = events.lock().iter().filter(|e| e.contains("recv")).count();
        assert_eq!(recv_events, 2 * 4);
    }

    #[tokio::test]
    async fn outbound_hooks_fire_once_per_message() {
        let (chain, events) = chain_of_two();
        let (tx, mut rx) = mpsc::channel(4);
        let mut outbound = chain.outbound(INFO, tx);

        outbound.send("x").await.unwrap();
        outbound.send("y").await.unwrap();
        drop(outbound);

        assert_eq!(rx.recv().await.unwrap().unwrap(), "x");
        assert_eq!(rx.recv().await.unwrap().unwrap(), "y");
        assert!(rx.recv().await.is_none());
        assert_eq!(
            *events.lock(),
            [
                "a:send \"x\"",
                "b:send \"x\"",
                "a:send \"y\"",
                "b:send \"y\""
            ]
        );
    }

    #[tokio::test]
    async fn send_to_a_closed_stream_fires_no_hooks() {
        let (chain, events) = chain_of_two();
        let (tx, rx) = mpsc::channel(4);
        let mut outbound = chain.outbound(INFO, tx);
        drop(rx);

        assert!(matches!(
            outbound.send("lost").await,
            Err(ordermgmt_core::Error::ChannelError { .. })
        ));
        assert!(events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_abandoned_while_waiting_for_space_fires_no_hooks() {
        let (chain, events) = chain_of_two();
        let (tx, _rx) = mpsc::channel(1);
        let mut outbound = chain.outbound(INFO, tx);
        outbound.send("first").await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_secs(1), outbound.send("second")).await;

        assert!(blocked.is_err());
        assert_eq!(*events.lock(), ["a:send \"first\"", "b:send \"first\""]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_unary_call_ends_as_cancelled() {
        let (chain, events) = chain_of_two();

        let call = chain.unary(INFO, Request::new(7_u32), |_req| {
            futures::future::pending::<Result<Response<u32>, Status>>()
        });
        assert!(tokio::time::timeout(Duration::from_secs(1), call).await.is_err());

        assert_eq!(
            *events.lock(),
            [
                "a:start 7",
                "b:start 7",
                "b:end err Cancelled",
                "a:end err Cancelled"
            ]
        );
    }

    #[test]
    fn stream_guard_closes_once() {
        let (chain, events) = chain_of_two();

        let mut guard = chain.open_stream(INFO);
        guard.close(Ok(()));
        guard.close(Err(&Status::internal("late")));
        drop(guard);

        assert_eq!(
            *events.lock(),
            ["a:open", "b:open", "b:close ok", "a:close ok"]
        );
    }

    #[test]
    fn dropped_stream_guard_closes_as_cancelled() {
        let (chain, events) = chain_of_two();

        drop(chain.open_stream(INFO));

        assert_eq!(
            *events.lock(),
            ["a:open", "b:open", "b:close err Cancelled", "a:close err Cancelled"]
        );
    }

    #[tokio::test]
    async fn empty_chain_is_transparent() {
        let chain = InterceptorChain::default();
        assert!(chain.is_empty());
        let response = chain
            .unary(INFO, Request::new(()), |_| async { Ok(Response::new("ok")) })
            .await
            .unwrap();
        assert_eq!(response.into_inner(), "ok");
    }
}
