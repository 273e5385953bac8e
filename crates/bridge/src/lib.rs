//! Audio bridge receiver: plays streams sent over TCP through a CPAL output device.
//!
//! - [`net`] speaks the `audio-bridge-proto` framing and drives an
//!   [`audio_stream::StreamSession`].
//! - [`output`] is the CPAL-backed [`audio_stream::AudioEngine`] that pulls decoded PCM from
//!   the session.

pub mod cli;
pub mod config;
pub mod net;
pub mod output;
pub mod runtime;
