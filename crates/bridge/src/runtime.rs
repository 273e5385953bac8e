//! Bridge runtime: device listing and the listen loop.

use std::net::TcpListener;
use std::sync::Arc;

use anyhow::{Context, Result};
use audio_stream::StreamSession;

use crate::config::BridgeListenConfig;
use crate::net;
use crate::output::{CpalEngine, device};

/// List output devices and print them to stdout.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    device::list_devices(&host)
}

/// Accept senders one at a time and play their streams until the process is killed.
pub fn run_listen(config: BridgeListenConfig, install_ctrlc: bool) -> Result<()> {
    let engine = Arc::new(CpalEngine::new(config.output.clone()));
    let session = Arc::new(StreamSession::with_default_decoders(
        engine,
        config.buffers.clone(),
    ));

    if install_ctrlc {
        let session_for_signal = session.clone();
        let _ = ctrlc::set_handler(move || {
            session_for_signal.stop();
            std::process::exit(130);
        });
    }

    let listener =
        TcpListener::bind(config.bind).with_context(|| format!("bind {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        device = config.output.device.as_deref().unwrap_or("default"),
        "listening (one client at a time; many streams per connection)"
    );

    loop {
        let stream = match net::accept_one(&listener) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("accept error: {e:#}");
                continue;
            }
        };
        if let Err(e) = net::serve_client(stream, &session) {
            tracing::warn!("client session error: {e:#}");
        }
        let stats = session.stats();
        tracing::info!(
            overrun_events = stats.ring.overrun_events,
            dropped_bytes = stats.ring.dropped_bytes,
            bytes_received = stats.ring.bytes_written,
            "client disconnected; ready for next connection"
        );
    }
}
