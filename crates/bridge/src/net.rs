//! Receiver side of the wire protocol: one connection at a time feeding a [`StreamSession`].

use std::io::{self, Read};
use std::net::{TcpListener, TcpStream};

use anyhow::{Context, Result, anyhow};
use audio_bridge_proto::{FrameKind, StreamBegin};
use audio_stream::{Codec, StreamConfig, StreamError, StreamSession};

/// Largest payload accepted in a single frame.
const MAX_FRAME_PAYLOAD: u32 = 16 * 1024 * 1024;

/// Accept a single TCP connection from `listener`.
pub fn accept_one(listener: &TcpListener) -> Result<TcpStream> {
    let (stream, addr) = listener.accept().context("accept connection")?;
    tracing::info!(peer = %addr, "client connected");
    stream.set_nodelay(true).ok();
    Ok(stream)
}

/// Serve frames from one client until it disconnects, sends `ERROR`, or breaks the protocol.
///
/// The session is stopped whenever the connection ends.
pub fn serve_client(mut stream: TcpStream, session: &StreamSession) -> Result<()> {
    audio_bridge_proto::write_prelude(&mut stream).context("write prelude")?;
    audio_bridge_proto::read_prelude(&mut stream).context("read prelude")?;
    let mut peer_tx = stream
        .try_clone()
        .context("try_clone TcpStream for peer_tx")?;

    let result = frame_loop(&mut stream, &mut peer_tx, session);
    session.stop();
    result
}

fn frame_loop(stream: &mut TcpStream, peer_tx: &mut TcpStream, session: &StreamSession) -> Result<()> {
    let mut payload = Vec::new();
    loop {
        let (kind, len) = match audio_bridge_proto::read_frame_header(&mut *stream) {
            Ok(x) => x,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e).context("read frame header"),
        };
        if len > MAX_FRAME_PAYLOAD {
            return Err(anyhow!("{kind:?} payload of {len} bytes exceeds limit"));
        }
        payload.resize(len as usize, 0);
        stream
            .read_exact(&mut payload)
            .with_context(|| format!("read {kind:?} payload"))?;

        match kind {
            FrameKind::StreamBegin => {
                let begin = audio_bridge_proto::decode_stream_begin(&payload)
                    .context("decode STREAM_BEGIN")?;
                if let Err(e) = stream_config(begin).and_then(|cfg| session.prepare(cfg)) {
                    tracing::warn!(error = %e, "stream rejected");
                    report_error(peer_tx, &e);
                }
            }
            FrameKind::AudioChunk => match session.push_compressed(&payload) {
                Ok(_) => {}
                Err(StreamError::NotPrepared) => {
                    tracing::debug!(bytes = payload.len(), "chunk without stream dropped");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "chunk rejected");
                    report_error(peer_tx, &e);
                }
            },
            FrameKind::StreamEnd => session.finish(),
            FrameKind::Stop => session.stop(),
            FrameKind::Error => {
                let msg = audio_bridge_proto::decode_error_message(&payload);
                return Err(anyhow!("sender sent ERROR: {msg}"));
            }
        }
    }
}

fn stream_config(begin: StreamBegin) -> Result<StreamConfig, StreamError> {
    let codec = Codec::from_wire_id(begin.codec)?;
    let config = StreamConfig::new(codec, begin.sample_rate, begin.channels, begin.bit_depth);
    Ok(if begin.codec_header.is_empty() {
        config
    } else {
        config.with_codec_header(begin.codec_header)
    })
}

fn report_error(peer_tx: &mut TcpStream, err: &StreamError) {
    let msg = err.to_string();
    if let Err(e) = audio_bridge_proto::write_frame(&mut *peer_tx, FrameKind::Error, msg.as_bytes()) {
        tracing::debug!(error = %e, "could not report error to sender");
    }
}
