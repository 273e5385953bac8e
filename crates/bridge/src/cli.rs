use std::net::SocketAddr;

use clap::{Parser, Subcommand};

pub const DEFAULT_BIND: &str = "0.0.0.0:5555";

#[derive(Parser, Debug)]
#[command(name = "bridge", version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Network ring buffer target in seconds of decoded audio
    #[arg(long, default_value_t = 2.0)]
    pub buffer_seconds: f32,

    /// Bounded wait (ms) between re-checks while the audio thread waits for data
    #[arg(long, default_value_t = 20)]
    pub read_wait_ms: u64,

    /// Playback callback refill cap (frames). Larger reduces lock churn but can add latency.
    #[arg(long, default_value_t = 4096)]
    pub refill_max_frames: usize,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept one sender at a time and play what it streams (default)
    Listen {
        /// Bind address, e.g. 0.0.0.0:5555
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: SocketAddr,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let args = Args::try_parse_from(["bridge"]).unwrap();
        assert!(args.cmd.is_none());
        assert_eq!(args.buffer_seconds, 2.0);
        assert_eq!(args.read_wait_ms, 20);
        assert_eq!(args.refill_max_frames, 4096);
    }

    #[test]
    fn listen_accepts_bind_address() {
        let args =
            Args::try_parse_from(["bridge", "--device", "usb", "listen", "--bind", "127.0.0.1:7000"])
                .unwrap();
        assert_eq!(args.device.as_deref(), Some("usb"));
        match args.cmd {
            Some(Command::Listen { bind }) => assert_eq!(bind.port(), 7000),
            None => panic!("expected listen"),
        }
    }
}
