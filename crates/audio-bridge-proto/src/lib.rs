//! Wire protocol between an audio sender and the `bridge` receiver.
//!
//! Framed stream over a single TCP connection. One connection carries any number of
//! streams back to back; each stream is `STREAM_BEGIN`, zero or more `AUDIO_CHUNK`s,
//! then `STREAM_END` (or `STOP` to cut it short).
//!
//! Frame format:
//! - magic: 4 bytes "ASBR" (once, at connection start)
//! - version: u16 LE (once, at connection start)
//! - then repeated frames:
//!   - kind: u8
//!   - len: u32 LE
//!   - payload: [u8; len]

use std::io::{self, Read, Write};

pub const MAGIC: [u8; 4] = *b"ASBR";
pub const VERSION: u16 = 1;

const STREAM_BEGIN_FIXED_LEN: usize = 1 + 4 + 2 + 2 + 4;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Sender → receiver: stream parameters; starts a new stream.
    StreamBegin = 0x10,
    /// Sender → receiver: compressed (or raw PCM) bytes in wire order.
    AudioChunk = 0x11,
    /// Sender → receiver: no more chunks for this stream; play out what is buffered.
    StreamEnd = 0x12,

    /// Sender → receiver: stop now and drop buffered audio.
    Stop = 0x20,

    /// Either direction: UTF-8 message.
    Error = 0x7F,
}

impl FrameKind {
    pub fn from_u8(b: u8) -> io::Result<Self> {
        let k = match b {
            0x10 => FrameKind::StreamBegin,
            0x11 => FrameKind::AudioChunk,
            0x12 => FrameKind::StreamEnd,
            0x20 => FrameKind::Stop,
            0x7F => FrameKind::Error,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown frame kind {b:#x}"),
                ));
            }
        };
        Ok(k)
    }
}

/// Connection prelude: magic + version.
pub fn write_prelude(mut w: impl Write) -> io::Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    Ok(())
}

/// Read and validate the connection prelude.
pub fn read_prelude(mut r: impl Read) -> io::Result<()> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
    }

    let mut ver = [0u8; 2];
    r.read_exact(&mut ver)?;
    let version = u16::from_le_bytes(ver);
    if version != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported version {version}"),
        ));
    }

    Ok(())
}

/// Write a frame header + payload.
pub fn write_frame(mut w: impl Write, kind: FrameKind, payload: &[u8]) -> io::Result<()> {
    let frame = encode_frame(kind, payload)?;
    w.write_all(&frame)?;
    Ok(())
}

/// Encode a frame into a single buffer (header + payload).
pub fn encode_frame(kind: FrameKind, payload: &[u8]) -> io::Result<Vec<u8>> {
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;

    let mut out = Vec::with_capacity(1 + 4 + payload.len());
    out.push(kind as u8);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Read a frame header and return `(kind, len)`.
///
/// The caller should then read exactly `len` bytes of payload.
pub fn read_frame_header(mut r: impl Read) -> io::Result<(FrameKind, u32)> {
    let mut kindb = [0u8; 1];
    r.read_exact(&mut kindb)?;
    let kind = FrameKind::from_u8(kindb[0])?;

    let mut lenb = [0u8; 4];
    r.read_exact(&mut lenb)?;
    let len = u32::from_le_bytes(lenb);
    Ok((kind, len))
}

/// Parameters announced by `STREAM_BEGIN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBegin {
    /// Codec id: 0 PCM, 1 FLAC, 2 Opus. Interpreted by the receiver.
    pub codec: u8,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    /// Codec initialization data; empty when the stream has none.
    pub codec_header: Vec<u8>,
}

/// Encode a `STREAM_BEGIN` payload:
/// - codec:       u8
/// - sample_rate: u32 LE
/// - channels:    u16 LE
/// - bit_depth:   u16 LE
/// - header_len:  u32 LE, then `header_len` bytes
pub fn encode_stream_begin(begin: &StreamBegin) -> io::Result<Vec<u8>> {
    let header_len: u32 = begin
        .codec_header
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "codec header too large"))?;

    let mut out = Vec::with_capacity(STREAM_BEGIN_FIXED_LEN + begin.codec_header.len());
    out.push(begin.codec);
    out.extend_from_slice(&begin.sample_rate.to_le_bytes());
    out.extend_from_slice(&begin.channels.to_le_bytes());
    out.extend_from_slice(&begin.bit_depth.to_le_bytes());
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(&begin.codec_header);
    Ok(out)
}

/// Decode a `STREAM_BEGIN` payload.
pub fn decode_stream_begin(payload: &[u8]) -> io::Result<StreamBegin> {
    if payload.len() < STREAM_BEGIN_FIXED_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "short STREAM_BEGIN"));
    }
    let sample_rate = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
    let channels = u16::from_le_bytes([payload[5], payload[6]]);
    let bit_depth = u16::from_le_bytes([payload[7], payload[8]]);
    let header_len =
        u32::from_le_bytes([payload[9], payload[10], payload[11], payload[12]]) as usize;
    let header = &payload[STREAM_BEGIN_FIXED_LEN..];
    if header.len() != header_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "STREAM_BEGIN header length mismatch",
        ));
    }
    Ok(StreamBegin {
        codec: payload[0],
        sample_rate,
        channels,
        bit_depth,
        codec_header: header.to_vec(),
    })
}

/// Decode an `ERROR` payload (lossy UTF-8).
pub fn decode_error_message(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

/// Prefix one codec packet with its `u16` LE length, as Opus chunks are carried.
pub fn encode_packet(packet: &[u8]) -> io::Result<Vec<u8>> {
    let len: u16 = packet
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "packet too large"))?;
    let mut out = Vec::with_capacity(2 + packet.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(packet);
    Ok(out)
}
