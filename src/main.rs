use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use swerve_module_runtime::config::{CMD_TIMEOUT, LOOP_HZ};
use swerve_module_runtime::runtime::RuntimeConfig;

/// Swerve module runtime
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Control loop frequency (Hz)
    #[arg(long, default_value_t = LOOP_HZ)]
    loop_hz: u64,

    /// Stop a module when its commands are older than this (ms)
    #[arg(long, default_value_t = CMD_TIMEOUT.as_millis() as u64)]
    cmd_timeout_ms: u64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    let config = RuntimeConfig {
        loop_hz: args.loop_hz,
        cmd_timeout: Duration::from_millis(args.cmd_timeout_ms),
    };

    if let Err(e) = swerve_module_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
