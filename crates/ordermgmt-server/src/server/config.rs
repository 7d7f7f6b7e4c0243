use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use ordermgmt_core::types::DEFAULT_BATCH_SIZE;

/// Runtime configuration for the `ordermgmt-server` binary.
///
/// These settings control how the order management service listens, how
/// aggressively `ProcessOrders` flushes shipments, and how long streams and
/// shutdown are allowed to take. All values are parsed from CLI arguments or
/// environment variables (a `.env` file is honoured), with defaults that
/// reproduce the reference behavior.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ordermgmt-server",
    version,
    about = "A gRPC service that batches streamed orders into per-destination shipments"
)]
pub struct CliArgs {
    /// Number of orders a `ProcessOrders` stream absorbs before every
    /// in-progress shipment is flushed back to the client.
    ///
    /// The threshold counts orders across all destinations, not per
    /// destination.
    ///
    /// Environment variable: `ORDER_BATCH_SIZE`
    #[arg(long, env = "ORDER_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Capacity of the response buffer between a streaming handler and the
    /// gRPC transport.
    ///
    /// Lower values tighten backpressure; higher values let a handler run
    /// further ahead of a slow client.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Upper bound, in seconds, on the lifetime of a `ProcessOrders` or
    /// `SearchOrders` stream. `0` disables the deadline.
    ///
    /// Environment variable: `STREAM_TIMEOUT_SECS`
    #[arg(long, env = "STREAM_TIMEOUT_SECS", default_value_t = 0)]
    pub stream_timeout_secs: u64,

    /// Seconds to wait for in-flight streams to finish on shutdown before
    /// they are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Start with an empty order store instead of the demo orders 102-106.
    ///
    /// Environment variable: `NO_SAMPLE_DATA`
    #[arg(long, env = "NO_SAMPLE_DATA", default_value_t = false)]
    pub no_sample_data: bool,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/ordermgmt.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be
    /// a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub batch_size: usize,
    pub stream_buffer_size: usize,
    pub stream_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub seed_sample_data: bool,
    pub server_addr: String,
    pub uds: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.batch_size == 0 {
            bail!("ORDER_BATCH_SIZE must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        let stream_timeout =
            (args.stream_timeout_secs > 0).then(|| Duration::from_secs(args.stream_timeout_secs));

        Ok(Self {
            batch_size: args.batch_size,
            stream_buffer_size: args.stream_buffer_size,
            stream_timeout,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            seed_sample_data: !args.no_sample_data,
            server_addr: args.server_addr,
            uds: args.uds,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            stream_buffer_size: 8,
            stream_timeout: None,
            shutdown_timeout: Duration::from_secs(3),
            seed_sample_data: true,
            server_addr: String::from("0.0.0.0:50051"),
            uds: false,
        }
    }
}
