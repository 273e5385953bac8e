use std::net::SocketAddr;
use std::time::Duration;

use audio_stream::BufferConfig;

use crate::cli::Args;

/// Output engine tuning.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// Device name substring; `None` picks the host default.
    pub device: Option<String>,
    /// Maximum number of frames the output callback pulls from the queue per refill.
    pub refill_max_frames: usize,
    /// Capacity of the decoded sample queue between the pull thread and the device.
    pub queue_seconds: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            refill_max_frames: 4096,
            queue_seconds: 0.5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BridgeListenConfig {
    pub bind: SocketAddr,
    pub output: OutputConfig,
    pub buffers: BufferConfig,
}

impl BridgeListenConfig {
    pub fn from_args(args: &Args, bind: SocketAddr) -> Self {
        Self {
            bind,
            output: OutputConfig {
                device: normalize_device_name(args.device.clone()),
                refill_max_frames: args.refill_max_frames.max(1),
                ..OutputConfig::default()
            },
            buffers: BufferConfig {
                seconds: Some(args.buffer_seconds),
                read_wait: Duration::from_millis(args.read_wait_ms.max(1)),
                ..BufferConfig::default()
            },
        }
    }
}

fn normalize_device_name(device: Option<String>) -> Option<String> {
    device.and_then(|name| {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
