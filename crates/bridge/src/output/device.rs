//! Output device discovery and selection.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Pick the first output device whose name contains `needle` (case-insensitive), or the
/// host default device when `needle` is `None`.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle {
        let mut devices = host.output_devices().context("No output devices")?;
        return devices
            .find(|d| {
                d.description()
                    .ok()
                    .map(|n| matches_device_name(&n.name(), needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Pick an output config running at exactly `rate` Hz.
///
/// Among ranges that support the rate, prefer the stream's channel count and then the
/// sample format that loses the least precision.
pub fn pick_output_config(
    device: &cpal::Device,
    rate: u32,
    channels: u16,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_output_configs()
        .context("query supported output configs")?
        .collect();
    if ranges.is_empty() {
        return Err(anyhow!("No supported output configs"));
    }

    let mut best: Option<(Candidate, cpal::SupportedStreamConfigRange)> = None;
    for range in ranges {
        if !supports_rate(range.min_sample_rate(), range.max_sample_rate(), rate) {
            continue;
        }
        if sample_format_rank(range.sample_format()).is_none() {
            continue;
        }
        let candidate = Candidate {
            channels_match: range.channels() == channels,
            format_rank: sample_format_rank(range.sample_format()).unwrap_or(u8::MAX),
        };
        let replace = match &best {
            None => true,
            Some((b, _)) => candidate.is_better_than(b),
        };
        if replace {
            best = Some((candidate, range));
        }
    }

    best.map(|(_, range)| range.with_sample_rate(rate))
        .ok_or_else(|| anyhow!("device cannot play {rate} Hz (no resampling)"))
}

/// Prefer a fixed buffer size if the device advertises a range.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            const MAX_FRAMES: u32 = 16_384;
            let chosen = if *max > MAX_FRAMES {
                (*min).max(MAX_FRAMES)
            } else {
                *max
            };
            Some(cpal::BufferSize::Fixed(chosen))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Print available output devices to stdout.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Candidate {
    channels_match: bool,
    format_rank: u8,
}

impl Candidate {
    fn is_better_than(&self, other: &Candidate) -> bool {
        if self.channels_match != other.channels_match {
            self.channels_match
        } else {
            self.format_rank < other.format_rank
        }
    }
}

fn supports_rate(min: u32, max: u32, rate: u32) -> bool {
    min <= rate && rate <= max
}

fn sample_format_rank(format: cpal::SampleFormat) -> Option<u8> {
    match format {
        cpal::SampleFormat::F32 => Some(0),
        cpal::SampleFormat::I32 => Some(1),
        cpal::SampleFormat::I16 => Some(2),
        cpal::SampleFormat::U16 => Some(3),
        _ => None,
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", ""));
    }

    #[test]
    fn rate_must_fall_inside_range() {
        assert!(supports_rate(44_100, 96_000, 48_000));
        assert!(supports_rate(48_000, 48_000, 48_000));
        assert!(!supports_rate(48_000, 96_000, 44_100));
        assert!(!supports_rate(8_000, 48_000, 96_000));
    }

    #[test]
    fn channel_match_beats_sample_format() {
        let exact = Candidate {
            channels_match: true,
            format_rank: 2,
        };
        let float = Candidate {
            channels_match: false,
            format_rank: 0,
        };
        assert!(exact.is_better_than(&float));
        assert!(!float.is_better_than(&exact));
    }

    #[test]
    fn lower_format_rank_wins_on_tie() {
        let f32_out = Candidate {
            channels_match: true,
            format_rank: 0,
        };
        let i16_out = Candidate {
            channels_match: true,
            format_rank: 2,
        };
        assert!(f32_out.is_better_than(&i16_out));
        assert_eq!(sample_format_rank(cpal::SampleFormat::U8), None);
    }
}
