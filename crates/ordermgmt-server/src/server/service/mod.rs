//! gRPC service implementation and call lifecycle.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`OrderService`).
//! - [`lifecycle`] - Admission of calls and phased graceful shutdown.

pub mod handler;
pub mod lifecycle;
