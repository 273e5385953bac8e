//! FLAC converter.
//!
//! The byte stream is split into frames locally (sync code + CRC-8 header check, CRC-16
//! frame check) and each frame is decoded with Symphonia's FLAC decoder. A frame is only
//! known to be complete once the next frame header has arrived, so the last frame of a
//! stream is emitted by `flush`.
//!
//! A frame whose CRC-16 never checks out is reported as a decode error once the frame after
//! it verifies (or once it outgrows the largest frame the stream can carry). Its bytes are
//! dropped and the next call resumes at the following frame.

use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{CODEC_TYPE_FLAC, CodecParameters, DecoderOptions};
use symphonia::core::formats::Packet;

use crate::config::{Codec, PcmFormat, StreamConfig};
use crate::error::StreamError;
use crate::pcm::{extend_i16_le, extend_i32_le};

use super::feed::{Converter, InputFeed};

const FLAC_MARKER: &[u8; 4] = b"fLaC";
const STREAMINFO_LEN: usize = 34;
const METADATA_HEADER_LEN: usize = 4;
/// Sync, codes, 7-byte coded number, 2-byte block size, 2-byte rate, CRC-8.
const MAX_FRAME_HEADER_LEN: usize = 16;
/// Subframe header byte plus a worst-case wasted-bits run.
const SUBFRAME_OVERHEAD: usize = 5;
const FRAME_FOOTER_LEN: usize = 2;

/// Source parameters carried by a STREAMINFO block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StreamInfo {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
}

/// FLAC frames in, s16le (≤16-bit sources) or left-justified s32le out.
pub struct FlacConverter {
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    format: PcmFormat,
    max_frame_len: usize,
    expect_metadata: bool,
    next_ts: u64,
}

impl FlacConverter {
    pub fn new(config: &StreamConfig) -> Result<Self, StreamError> {
        let info_block = match config.codec_header.as_deref() {
            Some(header) => {
                let block = stream_info_from_header(header)?;
                let info = parse_stream_info(&block);
                if info.sample_rate != config.sample_rate
                    || info.channels != config.channels
                    || info.bits_per_sample != config.bit_depth
                {
                    tracing::warn!(
                        header_rate = info.sample_rate,
                        header_channels = info.channels,
                        header_bits = info.bits_per_sample,
                        config_rate = config.sample_rate,
                        config_channels = config.channels,
                        config_bits = config.bit_depth,
                        "FLAC STREAMINFO disagrees with stream config; using STREAMINFO"
                    );
                }
                block
            }
            None => synthesize_stream_info(config)?,
        };
        let info = parse_stream_info(&info_block);

        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_FLAC)
            .with_sample_rate(info.sample_rate)
            .with_bits_per_sample(u32::from(info.bits_per_sample))
            .with_channels(channel_mask(info.channels))
            .with_extra_data(info_block.to_vec().into_boxed_slice());

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| StreamError::ConverterInit {
                codec: Codec::Flac,
                reason: e.to_string(),
            })?;

        Ok(Self {
            decoder,
            format: PcmFormat {
                sample_rate: info.sample_rate,
                channels: info.channels,
                bits: if info.bits_per_sample <= 16 { 16 } else { 32 },
            },
            max_frame_len: max_frame_len(&info_block),
            expect_metadata: true,
            next_ts: 0,
        })
    }

    fn decode_frame(&mut self, frame: &[u8], out: &mut Vec<u8>) -> Result<usize, StreamError> {
        let packet = Packet::new_from_slice(0, self.next_ts, 0, frame);
        let decoded = self
            .decoder
            .decode(&packet)
            .map_err(|e| StreamError::Decode {
                codec: Codec::Flac,
                reason: e.to_string(),
            })?;

        let frames = decoded.frames();
        let spec = *decoded.spec();
        let before = out.len();
        if self.format.bits == 16 {
            let mut samples = SampleBuffer::<i16>::new(frames as u64, spec);
            samples.copy_interleaved_ref(decoded);
            extend_i16_le(out, samples.samples());
        } else {
            let mut samples = SampleBuffer::<i32>::new(frames as u64, spec);
            samples.copy_interleaved_ref(decoded);
            extend_i32_le(out, samples.samples());
        }
        self.next_ts += frames as u64;
        Ok(out.len() - before)
    }
}

impl Converter for FlacConverter {
    fn codec(&self) -> Codec {
        Codec::Flac
    }

    fn output_format(&self) -> PcmFormat {
        self.format
    }

    fn convert(
        &mut self,
        feed: &mut InputFeed<'_>,
        out: &mut Vec<u8>,
    ) -> Result<usize, StreamError> {
        let Some(input) = feed.pull() else {
            return Ok(0);
        };
        let eos = feed.is_end_of_stream();
        let mut pos = 0usize;
        let mut produced = 0usize;

        if self.expect_metadata {
            match skip_metadata(input) {
                Metadata::Absent => self.expect_metadata = false,
                Metadata::Skipped(len) => {
                    tracing::debug!(bytes = len, "skipped in-band FLAC metadata");
                    pos = len;
                    self.expect_metadata = false;
                }
                Metadata::Incomplete => {
                    if eos {
                        feed.consume(input.len());
                    }
                    return Ok(0);
                }
            }
        }

        loop {
            let header_len = match find_frame_start(&input[pos..], eos) {
                FrameStart::Found { skip, header_len } => {
                    if skip > 0 {
                        tracing::debug!(bytes = skip, "skipped bytes before FLAC frame sync");
                    }
                    pos += skip;
                    header_len
                }
                FrameStart::NeedMore(skip) => {
                    pos += skip;
                    break;
                }
            };

            let len = match frame_end(&input[pos..], header_len, eos, self.max_frame_len) {
                FrameEnd::Complete(len) => len,
                FrameEnd::Pending => break,
                FrameEnd::Damaged(len) => {
                    feed.consume(pos + len);
                    return Err(StreamError::Decode {
                        codec: Codec::Flac,
                        reason: format!("dropped {len} byte frame that fails its CRC-16"),
                    });
                }
            };
            let frame = &input[pos..pos + len];
            pos += len;
            match self.decode_frame(frame, out) {
                Ok(n) => produced += n,
                Err(e) => {
                    feed.consume(pos);
                    return Err(e);
                }
            }
        }

        feed.consume(pos);
        Ok(produced)
    }
}

/// Map a channel count to Symphonia's channel mask (first `count` positions).
fn channel_mask(count: u16) -> Channels {
    let count = u32::from(count.clamp(1, 8));
    Channels::from_bits_truncate((1u32 << count) - 1)
}

/// Extract the 34-byte STREAMINFO body from a codec header.
///
/// Accepts `fLaC` + metadata blocks, a STREAMINFO block with its 4-byte header, or the bare
/// 34-byte body.
fn stream_info_from_header(header: &[u8]) -> Result<[u8; STREAMINFO_LEN], StreamError> {
    let body = header.strip_prefix(FLAC_MARKER.as_slice()).unwrap_or(header);
    let block = if body.len() == STREAMINFO_LEN {
        body
    } else if body.len() >= METADATA_HEADER_LEN + STREAMINFO_LEN
        && body[0] & 0x7F == 0
        && read_u24(&body[1..4]) == STREAMINFO_LEN
    {
        &body[METADATA_HEADER_LEN..METADATA_HEADER_LEN + STREAMINFO_LEN]
    } else {
        return Err(StreamError::InvalidConfig(
            "FLAC codec header carries no STREAMINFO block".to_string(),
        ));
    };

    let mut info = [0u8; STREAMINFO_LEN];
    info.copy_from_slice(block);
    Ok(info)
}

/// Build a STREAMINFO body from the declared stream parameters.
fn synthesize_stream_info(config: &StreamConfig) -> Result<[u8; STREAMINFO_LEN], StreamError> {
    let reject = |reason: String| StreamError::ConverterInit {
        codec: Codec::Flac,
        reason,
    };
    if !(1..=655_350).contains(&config.sample_rate) {
        return Err(reject(format!("sample rate {} out of range", config.sample_rate)));
    }
    if !(1..=8).contains(&config.channels) {
        return Err(reject(format!("{} channels out of range", config.channels)));
    }
    if !(4..=32).contains(&config.bit_depth) {
        return Err(reject(format!("bit depth {} out of range", config.bit_depth)));
    }

    let mut info = [0u8; STREAMINFO_LEN];
    info[0..2].copy_from_slice(&16u16.to_be_bytes());
    info[2..4].copy_from_slice(&u16::MAX.to_be_bytes());
    let packed = (u64::from(config.sample_rate) << 44)
        | (u64::from(config.channels - 1) << 41)
        | (u64::from(config.bit_depth - 1) << 36);
    info[10..18].copy_from_slice(&packed.to_be_bytes());
    Ok(info)
}

fn parse_stream_info(info: &[u8; STREAMINFO_LEN]) -> StreamInfo {
    let sample_rate =
        (u32::from(info[10]) << 12) | (u32::from(info[11]) << 4) | (u32::from(info[12]) >> 4);
    let channels = u16::from((info[12] >> 1) & 0x07) + 1;
    let bits_per_sample = u16::from(((info[12] & 0x01) << 4) | (info[13] >> 4)) + 1;
    StreamInfo {
        sample_rate,
        channels,
        bits_per_sample,
    }
}

/// Upper bound on one encoded frame: the declared maximum frame size, or the size of a
/// verbatim frame at the maximum block size when the encoder left it unset.
fn max_frame_len(info: &[u8; STREAMINFO_LEN]) -> usize {
    let declared = read_u24(&info[7..10]);
    if declared > 0 {
        return declared;
    }
    let max_block = usize::from(u16::from_be_bytes([info[2], info[3]])).max(1);
    let parsed = parse_stream_info(info);
    // Side channels carry one extra bit per sample.
    let sample_bits = usize::from(parsed.bits_per_sample) + 1;
    let subframe = SUBFRAME_OVERHEAD + (max_block * sample_bits).div_ceil(8);
    MAX_FRAME_HEADER_LEN + usize::from(parsed.channels) * subframe + FRAME_FOOTER_LEN
}

fn read_u24(b: &[u8]) -> usize {
    (usize::from(b[0]) << 16) | (usize::from(b[1]) << 8) | usize::from(b[2])
}

enum Metadata {
    /// Input does not start with the `fLaC` marker.
    Absent,
    /// Marker and every metadata block up to the last one span this many bytes.
    Skipped(usize),
    Incomplete,
}

fn skip_metadata(buf: &[u8]) -> Metadata {
    if buf.len() < FLAC_MARKER.len() {
        return if FLAC_MARKER.starts_with(buf) {
            Metadata::Incomplete
        } else {
            Metadata::Absent
        };
    }
    if &buf[..FLAC_MARKER.len()] != FLAC_MARKER {
        return Metadata::Absent;
    }

    let mut pos = FLAC_MARKER.len();
    loop {
        if buf.len() < pos + METADATA_HEADER_LEN {
            return Metadata::Incomplete;
        }
        let last = buf[pos] & 0x80 != 0;
        let len = read_u24(&buf[pos + 1..pos + 4]);
        pos += METADATA_HEADER_LEN + len;
        if buf.len() < pos {
            return Metadata::Incomplete;
        }
        if last {
            return Metadata::Skipped(pos);
        }
    }
}

enum HeaderCheck {
    /// A complete header with a matching CRC-8; value is the header length.
    Valid(usize),
    Invalid,
    Incomplete,
}

fn check_frame_header(buf: &[u8]) -> HeaderCheck {
    use HeaderCheck::*;

    if buf.is_empty() {
        return Incomplete;
    }
    if buf[0] != 0xFF {
        return Invalid;
    }
    if buf.len() < 2 {
        return Incomplete;
    }
    if buf[1] & 0xFE != 0xF8 {
        return Invalid;
    }
    if buf.len() < 4 {
        return Incomplete;
    }

    let block_code = buf[2] >> 4;
    let rate_code = buf[2] & 0x0F;
    let channel_code = buf[3] >> 4;
    let size_code = (buf[3] >> 1) & 0x07;
    if block_code == 0 || rate_code == 0x0F || channel_code > 0x0A || size_code == 3 || buf[3] & 1 != 0
    {
        return Invalid;
    }

    if buf.len() < 5 {
        return Incomplete;
    }
    let extra = match buf[4] {
        0x00..=0x7F => 0,
        0xC0..=0xDF => 1,
        0xE0..=0xEF => 2,
        0xF0..=0xF7 => 3,
        0xF8..=0xFB => 4,
        0xFC..=0xFD => 5,
        0xFE => 6,
        _ => return Invalid,
    };
    let mut len = 5 + extra;
    if buf.len() < len {
        return Incomplete;
    }
    if buf[5..len].iter().any(|b| b & 0xC0 != 0x80) {
        return Invalid;
    }

    len += match block_code {
        6 => 1,
        7 => 2,
        _ => 0,
    };
    len += match rate_code {
        12 => 1,
        13 | 14 => 2,
        _ => 0,
    };
    if buf.len() < len + 1 {
        return Incomplete;
    }
    if crc8(&buf[..len]) != buf[len] {
        return Invalid;
    }
    Valid(len + 1)
}

enum FrameStart {
    /// A valid header of `header_len` bytes starts `skip` bytes in.
    Found { skip: usize, header_len: usize },
    /// No header yet; bytes before this offset can never start one.
    NeedMore(usize),
}

fn find_frame_start(buf: &[u8], eos: bool) -> FrameStart {
    for i in 0..buf.len() {
        match check_frame_header(&buf[i..]) {
            HeaderCheck::Valid(header_len) => return FrameStart::Found { skip: i, header_len },
            HeaderCheck::Incomplete if !eos => return FrameStart::NeedMore(i),
            HeaderCheck::Incomplete | HeaderCheck::Invalid => {}
        }
    }
    FrameStart::NeedMore(buf.len())
}

enum FrameEnd {
    /// The frame spans this many bytes and its CRC-16 checks out.
    Complete(usize),
    /// Its end cannot be established yet.
    Pending,
    /// The frame is damaged; the next frame (or the unusable rest) starts this many bytes in.
    Damaged(usize),
}

/// Find the end of the frame whose `header_len`-byte header starts at `buf[0]`.
///
/// The end is the next valid header whose preceding two bytes are the CRC-16 of everything
/// before them. A later header that fails that check while a CRC-verified frame starts there
/// marks the current frame as damaged, as does outgrowing `max_len` or reaching
/// end-of-stream without a match.
fn frame_end(buf: &[u8], header_len: usize, eos: bool, max_len: usize) -> FrameEnd {
    let limit = buf.len().min(max_len + 1);
    let mut resync = None;

    for q in header_len + FRAME_FOOTER_LEN..limit {
        if buf[q] != 0xFF {
            continue;
        }
        match check_frame_header(&buf[q..]) {
            HeaderCheck::Valid(next_header_len) => {
                if frame_crc_matches(&buf[..q]) {
                    return FrameEnd::Complete(q);
                }
                resync.get_or_insert(q);
                if starts_verified_frame(&buf[q..], next_header_len, max_len) {
                    return FrameEnd::Damaged(q);
                }
            }
            HeaderCheck::Incomplete if !eos => return FrameEnd::Pending,
            HeaderCheck::Incomplete | HeaderCheck::Invalid => {}
        }
    }

    if eos {
        let whole = buf.len();
        if whole > header_len + FRAME_FOOTER_LEN && whole <= max_len && frame_crc_matches(buf) {
            return FrameEnd::Complete(whole);
        }
        return FrameEnd::Damaged(resync.unwrap_or(whole));
    }
    if buf.len() > max_len {
        return FrameEnd::Damaged(resync.unwrap_or(limit));
    }
    FrameEnd::Pending
}

/// Whether `buf` holds a complete frame closed by a CRC-verified boundary.
fn starts_verified_frame(buf: &[u8], header_len: usize, max_len: usize) -> bool {
    let limit = buf.len().min(max_len + 1);
    (header_len + FRAME_FOOTER_LEN..limit).any(|r| {
        buf[r] == 0xFF
            && matches!(check_frame_header(&buf[r..]), HeaderCheck::Valid(_))
            && frame_crc_matches(&buf[..r])
    })
}

fn frame_crc_matches(frame: &[u8]) -> bool {
    let split = frame.len() - 2;
    crc16(&frame[..split]) == u16::from_be_bytes([frame[split], frame[split + 1]])
}

/// Frame header CRC-8 as defined by FLAC: polynomial x^8 + x^2 + x + 1 (0x07), initial
/// value 0, no reflection.
fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Frame footer CRC-16 as defined by FLAC: polynomial x^16 + x^15 + x^2 + 1 (0x8005),
/// initial value 0, no reflection.
fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x8005
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{ContainerDecoder, Decoder};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const BLOCK: usize = 32;

    fn config(bits: u16) -> StreamConfig {
        StreamConfig::new(Codec::Flac, 44_100, 2, bits)
    }

    /// One fixed-blocksize frame with VERBATIM subframes, 44.1 kHz stereo.
    fn verbatim_frame(number: u8, bits: u16, channels: &[Vec<i32>]) -> Vec<u8> {
        assert!(number < 0x80);
        let block = channels[0].len();
        let size_code: u8 = match bits {
            16 => 0b100,
            24 => 0b110,
            _ => panic!("unsupported test depth"),
        };
        let mut frame = vec![
            0xFF,
            0xF8,
            (0b0110 << 4) | 0b1001,
            (((channels.len() - 1) as u8) << 4) | (size_code << 1),
            number,
            (block - 1) as u8,
        ];
        frame.push(crc8(&frame));
        for ch in channels {
            frame.push(0b0000_0010);
            for &s in ch {
                let be = s.to_be_bytes();
                match bits {
                    16 => frame.extend_from_slice(&be[2..]),
                    _ => frame.extend_from_slice(&be[1..]),
                }
            }
        }
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_be_bytes());
        frame
    }

    fn test_channels(seed: i32) -> Vec<Vec<i32>> {
        let left = (0..BLOCK as i32).map(|i| (i * 517 + seed) % 30_000 - 15_000).collect();
        let right = (0..BLOCK as i32).map(|i| 12_000 - (i * 331 + seed) % 24_000).collect();
        vec![left, right]
    }

    fn interleave_i16(channels: &[Vec<i32>]) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..channels[0].len() {
            for ch in channels {
                out.extend_from_slice(&(ch[i] as i16).to_le_bytes());
            }
        }
        out
    }

    fn decode_all(decoder: &mut ContainerDecoder<FlacConverter>, chunks: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in chunks {
            decoder.decode_into(chunk, &mut out).unwrap();
        }
        decoder.flush(&mut out).unwrap();
        out
    }

    fn stream(frames: usize) -> (Vec<u8>, Vec<u8>) {
        let mut bytes = Vec::new();
        let mut pcm = Vec::new();
        for n in 0..frames {
            let chans = test_channels(n as i32 * 97);
            bytes.extend(verbatim_frame(n as u8, 16, &chans));
            pcm.extend(interleave_i16(&chans));
        }
        (bytes, pcm)
    }

    #[test]
    fn crc_helpers_match_reference_vectors() {
        assert_eq!(crc8(b"123456789"), 0xF4);
        assert_eq!(crc16(b"123456789"), 0xFEE8);
    }

    #[test]
    fn decodes_frames_and_holds_back_the_last_until_flush() {
        let (bytes, pcm) = stream(3);
        let mut d = ContainerDecoder::new(FlacConverter::new(&config(16)).unwrap());

        let mut out = Vec::new();
        d.decode_into(&bytes, &mut out).unwrap();
        let frame_bytes = BLOCK * 2 * 2;
        assert_eq!(out.len(), frame_bytes * 2);

        d.flush(&mut out).unwrap();
        assert_eq!(out, pcm);
    }

    #[test]
    fn byte_at_a_time_matches_single_call() {
        let (bytes, pcm) = stream(4);

        let mut whole = ContainerDecoder::new(FlacConverter::new(&config(16)).unwrap());
        let one_shot = decode_all(&mut whole, &[&bytes]);

        let mut fragmented = ContainerDecoder::new(FlacConverter::new(&config(16)).unwrap());
        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        let trickled = decode_all(&mut fragmented, &singles);

        assert_eq!(one_shot, pcm);
        assert_eq!(trickled, one_shot);
    }

    #[test]
    fn random_chunking_matches_single_call() {
        let (bytes, pcm) = stream(6);
        let mut rng = StdRng::seed_from_u64(3);
        let mut chunks = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let len = rng.gen_range(1..=40).min(bytes.len() - pos);
            chunks.push(&bytes[pos..pos + len]);
            pos += len;
        }
        let mut d = ContainerDecoder::new(FlacConverter::new(&config(16)).unwrap());
        assert_eq!(decode_all(&mut d, &chunks), pcm);
    }

    #[test]
    fn skips_in_band_stream_marker_and_metadata() {
        let (frames, pcm) = stream(2);
        let info = synthesize_stream_info(&config(16)).unwrap();
        let mut bytes = FLAC_MARKER.to_vec();
        bytes.push(0x80);
        bytes.extend_from_slice(&[0, 0, STREAMINFO_LEN as u8]);
        bytes.extend_from_slice(&info);
        bytes.extend(frames);

        let mut d = ContainerDecoder::new(FlacConverter::new(&config(16)).unwrap());
        let singles: Vec<&[u8]> = bytes.chunks(3).collect();
        assert_eq!(decode_all(&mut d, &singles), pcm);
    }

    #[test]
    fn skips_garbage_before_first_frame() {
        let (frames, pcm) = stream(2);
        let mut bytes = vec![0x13, 0x37, 0xFF, 0x00, 0x42];
        bytes.extend(frames);
        let mut d = ContainerDecoder::new(FlacConverter::new(&config(16)).unwrap());
        assert_eq!(decode_all(&mut d, &[&bytes]), pcm);
    }

    #[test]
    fn widens_24_bit_frames_to_left_justified_32_bit() {
        let chans = vec![vec![0x7F_FFFF, -0x80_0000], vec![1, -1]];
        let mut padded = chans.clone();
        for ch in padded.iter_mut() {
            ch.resize(16, 0);
        }
        let bytes = verbatim_frame(0, 24, &padded);

        let conv = FlacConverter::new(&config(24)).unwrap();
        assert_eq!(conv.output_format().bits, 32);
        let mut d = ContainerDecoder::new(conv);
        let out = decode_all(&mut d, &[&bytes]);

        let samples: Vec<i32> = out
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(samples.len(), 32);
        assert_eq!(&samples[..4], &[0x7FFF_FF00, 0x100, i32::MIN, -0x100]);
    }

    #[test]
    fn codec_header_variants_yield_stream_info() {
        let info = synthesize_stream_info(&config(16)).unwrap();

        let mut block = vec![0x80, 0, 0, STREAMINFO_LEN as u8];
        block.extend_from_slice(&info);
        let mut full = FLAC_MARKER.to_vec();
        full.extend_from_slice(&block);

        for header in [info.to_vec(), block, full] {
            let parsed = stream_info_from_header(&header).unwrap();
            assert_eq!(parsed, info);
            assert_eq!(
                parse_stream_info(&parsed),
                StreamInfo {
                    sample_rate: 44_100,
                    channels: 2,
                    bits_per_sample: 16,
                }
            );
        }

        assert!(matches!(
            stream_info_from_header(&[1, 2, 3]),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn stream_info_header_overrides_config() {
        let info = synthesize_stream_info(&StreamConfig::new(Codec::Flac, 96_000, 2, 24)).unwrap();
        let cfg = config(16).with_codec_header(info.to_vec());
        let conv = FlacConverter::new(&cfg).unwrap();
        assert_eq!(
            conv.output_format(),
            PcmFormat {
                sample_rate: 96_000,
                channels: 2,
                bits: 32,
            }
        );
    }

    #[test]
    fn rejects_parameters_flac_cannot_carry() {
        for cfg in [
            StreamConfig::new(Codec::Flac, 44_100, 9, 16),
            StreamConfig::new(Codec::Flac, 44_100, 2, 40),
            StreamConfig::new(Codec::Flac, 700_000, 2, 16),
        ] {
            assert!(matches!(
                FlacConverter::new(&cfg),
                Err(StreamError::ConverterInit { codec: Codec::Flac, .. })
            ));
        }
    }

    #[test]
    fn damaged_last_frame_fails_the_flush() {
        let (mut bytes, pcm) = stream(2);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut d = ContainerDecoder::new(FlacConverter::new(&config(16)).unwrap());

        let mut out = Vec::new();
        d.decode_into(&bytes, &mut out).unwrap();
        assert!(matches!(
            d.flush(&mut out),
            Err(StreamError::Decode { codec: Codec::Flac, .. })
        ));
        assert_eq!(out, pcm[..BLOCK * 4].to_vec());
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn damaged_frame_is_reported_and_decoding_resumes_after_it() {
        let (mut bytes, pcm) = stream(40);
        let frame_bytes = bytes.len() / 40;
        let pcm_frame = BLOCK * 2 * 2;
        bytes[frame_bytes + 20] ^= 0x55;

        let mut d = ContainerDecoder::new(FlacConverter::new(&config(16)).unwrap());
        let mut out = Vec::new();
        let mut errors = 0;
        for chunk in bytes.chunks(64) {
            match d.decode_into(chunk, &mut out) {
                Ok(_) => {}
                Err(StreamError::Decode { codec: Codec::Flac, .. }) => errors += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
            assert!(d.pending_len() < 4 * frame_bytes);
        }
        d.flush(&mut out).unwrap();

        assert_eq!(errors, 1);
        let mut expected = pcm[..pcm_frame].to_vec();
        expected.extend_from_slice(&pcm[2 * pcm_frame..]);
        assert_eq!(out, expected);
    }

    #[test]
    fn frame_that_outgrows_the_declared_maximum_is_dropped() {
        let mut info = synthesize_stream_info(&config(16)).unwrap();
        info[7..10].copy_from_slice(&[0, 0, 200]);
        let cfg = config(16).with_codec_header(info.to_vec());

        let (mut bytes, pcm) = stream(2);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        bytes.extend(std::iter::repeat_n(0u8, 1_000));

        let mut d = ContainerDecoder::new(FlacConverter::new(&cfg).unwrap());
        let mut out = Vec::new();
        let mut errors = 0;
        for chunk in bytes.chunks(64) {
            if d.decode_into(chunk, &mut out).is_err() {
                errors += 1;
            }
            assert!(d.pending_len() <= 200 + 64);
        }
        d.flush(&mut out).unwrap();

        assert_eq!(errors, 1);
        assert_eq!(out, pcm[..BLOCK * 4].to_vec());
    }

    #[test]
    fn max_frame_len_prefers_declared_size() {
        let mut info = synthesize_stream_info(&config(16)).unwrap();
        // 65535-sample blocks, two channels of 17-bit worst-case samples.
        assert_eq!(max_frame_len(&info), 16 + 2 * (5 + 139_262) + 2);

        info[7..10].copy_from_slice(&[0, 0x10, 0]);
        assert_eq!(max_frame_len(&info), 4096);
    }
}
