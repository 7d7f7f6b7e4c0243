//! Error types for the order management service.
//!
//! This module defines the central `Error` enum, which captures every
//! recoverable and reportable failure in the service. It implements
//! `From<Error>` for `tonic::Status` so handlers can return `?`-propagated
//! errors directly to clients with the matching status code.
//!
//! ## Error Cases
//! - `OrderNotFound`: An order id has no record in the repository.
//! - `InvalidOrder`: An order failed validation on the way in. The status
//!   carries a `BadRequest` detail naming the offending field.
//! - `InvalidRequest`: A request was malformed outside of order validation.
//! - `ChannelError`: The outbound side of a stream closed underneath us.
//! - `Transport`: Receiving from the client failed for a reason other than a
//!   clean end of input. The original status is kept verbatim.
//! - `RequestCancelled`: The client went away mid-stream.
//! - `DeadlineExceeded`: A stream outlived its configured deadline.
//! - `ServiceShutdown`: The call arrived or was still running during shutdown.

use tonic::{Code, Status};
use tonic_types::{ErrorDetails, StatusExt};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the order management service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// No order is stored under `id`.
    #[error("Order not found: {id}")]
    OrderNotFound { id: String },

    /// The order failed validation on `field`.
    #[error("Invalid order: {reason}")]
    InvalidOrder { field: &'static str, reason: String },

    /// The client request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Internal channel send/receive failure (e.g. the response stream was
    /// dropped).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// Inbound transport failure, surfaced verbatim.
    #[error("Transport error: {0}")]
    Transport(Status),

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The stream deadline elapsed before the client finished.
    #[error("Stream deadline exceeded")]
    DeadlineExceeded,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Returns `true` when the error should end a stream without reporting a
    /// status back to the client.
    ///
    /// A cancelled request has no one left to report to.
    pub const fn is_silent(&self) -> bool {
        matches!(self, Self::RequestCancelled)
    }
}

impl From<&Error> for Status {
    fn from(err: &Error) -> Self {
        match err {
            Error::OrderNotFound { id } => Status::not_found(format!("Order does not exist: {id}")),
            Error::InvalidOrder { field, reason } => Status::with_error_details(
                Code::InvalidArgument,
                reason.clone(),
                ErrorDetails::with_bad_request_violation(*field, reason.clone()),
            ),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason.clone()),
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::Transport(status) => status.clone(),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::DeadlineExceeded => Status::deadline_exceeded("Stream deadline exceeded"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Transport(status) => status,
            other => Self::from(&other),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Self::Transport(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn not_found_maps_to_not_found_status() {
        let status = Status::from(Error::OrderNotFound { id: "999".into() });
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("999"));
    }

    #[test]
    fn transport_status_passes_through_verbatim() {
        let original = Status::data_loss("stream reset by peer");
        let status = Status::from(Error::from(original.clone()));
        assert_eq!(status.code(), original.code());
        assert_eq!(status.message(), original.message());
    }

    #[test]
    fn invalid_order_carries_a_field_violation() {
        let status = Status::from(&Error::InvalidOrder {
            field: "price",
            reason: "price must not be negative".into(),
        });
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "price must not be negative");

        let details = status.get_error_details();
        let violations = &details.bad_request().unwrap().field_violations;
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "price");
        assert_eq!(violations[0].description, "price must not be negative");
    }

    #[test]
    fn only_cancellation_is_silent() {
        assert!(Error::RequestCancelled.is_silent());
        assert!(!Error::DeadlineExceeded.is_silent());
        assert!(!Error::ServiceShutdown.is_silent());
    }
}
