use super::{CallInfo, Interceptor};
use crate::server::telemetry;
use core::fmt;
use tonic::Status;

/// Emits a `tracing` event for every hook.
///
/// Call boundaries log at `info`; per-message events log at `debug` so that
/// a busy stream stays quiet under the default filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingInterceptor;

impl Interceptor for LoggingInterceptor {
    fn on_call_start(&self, info: &CallInfo, request: &dyn fmt::Debug) {
        tracing::info!(method = info.method, ?request, "Call started");
    }

    fn on_call_end(&self, info: &CallInfo, outcome: Result<&dyn fmt::Debug, &Status>) {
        match outcome {
            Ok(response) => tracing::info!(method = info.method, ?response, "Call finished"),
            Err(status) => tracing::warn!(
                method = info.method,
                code = ?status.code(),
                message = status.message(),
                "Call failed"
            ),
        }
    }

    fn on_stream_start(&self, info: &CallInfo) {
        tracing::info!(method = info.method, kind = ?info.kind, "Stream opened");
    }

    fn on_stream_end(&self, info: &CallInfo, outcome: Result<(), &Status>) {
        match outcome {
            Ok(()) => tracing::info!(method = info.method, "Stream closed"),
            Err(status) => tracing::warn!(
                method = info.method,
                code = ?status.code(),
                message = status.message(),
                "Stream closed with error"
            ),
        }
    }

    fn on_recv(&self, info: &CallInfo, message: Result<&dyn fmt::Debug, &Status>) {
        match message {
            Ok(message) => tracing::debug!(method = info.method, ?message, "Message received"),
            Err(status) => tracing::debug!(
                method = info.method,
                code = ?status.code(),
                "Receive failed"
            ),
        }
    }

    fn on_send(&self, info: &CallInfo, message: &dyn fmt::Debug) {
        tracing::debug!(method = info.method, ?message, "Message sent");
    }
}

/// Feeds call and message counts into [`telemetry`]. A no-op unless the
/// `metrics` feature is enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsInterceptor;

impl Interceptor for MetricsInterceptor {
    fn on_call_start(&self, info: &CallInfo, _request: &dyn fmt::Debug) {
        telemetry::increment_calls(info.method);
    }

    fn on_call_end(&self, info: &CallInfo, outcome: Result<&dyn fmt::Debug, &Status>) {
        if outcome.is_err() {
            telemetry::increment_call_errors(info.method);
        }
    }

    fn on_stream_start(&self, info: &CallInfo) {
        telemetry::increment_calls(info.method);
        telemetry::increment_streams_inflight();
    }

    fn on_stream_end(&self, info: &CallInfo, outcome: Result<(), &Status>) {
        telemetry::decrement_streams_inflight();
        if outcome.is_err() {
            telemetry::increment_call_errors(info.method);
        }
    }

    fn on_recv(&self, _info: &CallInfo, _message: Result<&dyn fmt::Debug, &Status>) {
        telemetry::increment_messages("received");
    }

    fn on_send(&self, _info: &CallInfo, _message: &dyn fmt::Debug) {
        telemetry::increment_messages("sent");
    }
}
