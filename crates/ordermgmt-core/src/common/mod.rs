//! Shared types and error definitions used by the order management server
//! and its clients.
//!
//! ## Submodules
//!
//! - [`error`] - Service-wide error type and its `tonic::Status` mapping.
//! - [`types`] - Constants and helpers layered over the generated messages.

pub mod error;
pub mod types;

pub use error::{Error, Result};
