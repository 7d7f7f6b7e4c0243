//! Server internals for the order management service.
//!
//! ## Structure
//!
//! - [`config`] - CLI/environment configuration.
//! - [`repository`] - Shared in-memory order store.
//! - [`aggregator`] - Destination-keyed shipment batching.
//! - [`interceptor`] - Call and message observers.
//! - [`streaming`] - Drivers for the streaming operations.
//! - [`service`] - gRPC service implementation and shutdown.
//! - [`runtime`] - Transport assembly (health, reflection, gRPC-Web).
//! - [`telemetry`] - Logging and optional metrics.

pub mod aggregator;
pub mod config;
pub mod interceptor;
pub mod repository;
pub mod runtime;
pub mod service;
pub mod streaming;
pub mod telemetry;
