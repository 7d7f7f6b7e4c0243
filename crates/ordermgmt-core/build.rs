/// Builds the gRPC client and server code for `ordermgmt.proto` using
/// `tonic-prost-build`.
///
/// Besides the Rust bindings, a serialized `FileDescriptorSet` is written to
/// `OUT_DIR/ordermgmt_descriptor.bin` so the server can expose the schema
/// through gRPC reflection.
///
/// # Files and Paths
///
/// - Proto file: `proto/ordermgmt.proto`
/// - Includes: `proto/`
///
/// # Panics
///
/// Panics if `OUT_DIR` is missing or code generation fails; a build script
/// has no better way to report either.
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let descriptor_path = out_dir.join("ordermgmt_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/ordermgmt.proto");

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/ordermgmt.proto"], &["proto"])
        .expect("failed to compile proto/ordermgmt.proto");
}
