//! Command-line options for the worker binary.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "ridepool-worker", about = "Backend worker for pooled-ride dispatch")]
pub struct Cli {
    /// Env file loaded before reading configuration.
    #[arg(long)]
    pub env_file: Option<String>,

    /// Check database and NATS connectivity, then exit.
    #[arg(long)]
    pub healthcheck: bool,
}
