//! PCM normalization helpers.
//!
//! Everything downstream of a decoder sees interleaved little-endian signed samples in a
//! 16- or 32-bit container. 24-bit sources are left-justified into 32 bits.

use crate::error::StreamError;

/// Packed size of one sample of `bit_depth`, if the depth is byte-aligned and supported.
pub fn bytes_per_sample(bit_depth: u16) -> Option<usize> {
    match bit_depth {
        16 => Some(2),
        24 => Some(3),
        32 => Some(4),
        _ => None,
    }
}

/// Unpack 3-byte little-endian signed samples into left-justified 32-bit samples.
///
/// Each sample is sign-extended from bit 23 and shifted left by 8, so the 24-bit range
/// occupies the top 24 bits of the output.
pub fn unpack_s24le_to_s32le(input: &[u8], out: &mut Vec<u8>) -> Result<usize, StreamError> {
    if input.len() % 3 != 0 {
        return Err(StreamError::MisalignedInput {
            len: input.len(),
            align: 3,
        });
    }

    let samples = input.len() / 3;
    out.reserve(samples * 4);
    for s in input.chunks_exact(3) {
        let mut v = u32::from(s[0]) | (u32::from(s[1]) << 8) | (u32::from(s[2]) << 16);
        if v & 0x0080_0000 != 0 {
            v |= 0xFF00_0000;
        }
        let sample = (v as i32).wrapping_shl(8);
        out.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(samples * 4)
}

/// Append interleaved `i16` samples as little-endian bytes.
pub fn extend_i16_le(out: &mut Vec<u8>, samples: &[i16]) {
    out.reserve(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
}

/// Append interleaved `i32` samples as little-endian bytes.
pub fn extend_i32_le(out: &mut Vec<u8>, samples: &[i32]) {
    out.reserve(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
}

/// Convert whole little-endian samples of a 16- or 32-bit container to `f32`.
///
/// Returns the number of input bytes consumed; a trailing partial sample is left for the
/// caller to carry into the next call.
pub fn to_f32(input: &[u8], bits: u16, out: &mut Vec<f32>) -> usize {
    match bits {
        16 => {
            let chunks = input.chunks_exact(2);
            let used = input.len() - chunks.remainder().len();
            out.extend(chunks.map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32_768.0));
            used
        }
        32 => {
            let chunks = input.chunks_exact(4);
            let used = input.len() - chunks.remainder().len();
            out.extend(chunks.map(|b| {
                i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0
            }));
            used
        }
        _ => 0,
    }
}
