//! Command line interface for the `testbed` demo binary.
//!
//! Runs a group of echo round trips against the embedded TCP backend.

use clap::Parser;

/// Command line arguments for the `testbed` binary.
#[derive(Debug, Parser)]
#[command(
    name = "testbed",
    version,
    about = "Run a group of echo cases against an embedded TCP server"
)]
pub struct Cli {
    /// Port to listen on; 0 picks a free port.
    #[arg(short, long, default_value_t = 0)]
    pub port: u16,
    /// Number of accept loops.
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,
    /// Number of cases sharing the server.
    #[arg(short, long, default_value_t = 3)]
    pub cases: usize,
    /// Payload sent by every case.
    #[arg(long, default_value = "ping")]
    pub payload: String,
}
