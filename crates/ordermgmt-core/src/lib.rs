#![doc = include_str!("../README.md")]

mod common;
pub use common::*;

/// gRPC service and message definitions generated from
/// `proto/ordermgmt.proto`.
///
/// ## Service
///
/// - `AddOrder` / `GetOrder` - unary store and lookup.
/// - `SearchOrders` - server streaming scan over the order store.
/// - `UpdateOrders` - client streaming bulk replace, one summary reply.
/// - `ProcessOrders` - bidirectional stream grouping order ids into
///   destination-keyed [`CombinedShipment`](proto::CombinedShipment)s.
pub mod proto {
    tonic::include_proto!("ordermgmt");

    /// Encoded `FileDescriptorSet` for the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("ordermgmt_descriptor");
}
