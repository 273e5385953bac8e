use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bridge::cli::{Args, Command, DEFAULT_BIND};
use bridge::config::BridgeListenConfig;
use bridge::runtime;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,bridge=info,audio_stream=info")
        }))
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }

    let bind = match &args.cmd {
        Some(Command::Listen { bind }) => *bind,
        None => DEFAULT_BIND.parse()?,
    };
    runtime::run_listen(BridgeListenConfig::from_args(&args, bind), true)
}
