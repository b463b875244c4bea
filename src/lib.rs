//! # fanout-audio
//!
//! Low-latency fan-out of one logical audio output stream to multiple
//! independently enabled hardware playback sinks (an HDMI encoder, an
//! S/PDIF transmitter, an amplifier chip) that can be hot-plugged or
//! administratively toggled at runtime.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use fanout_audio::{AudioDevice, StreamConfig};
//! use fanout_audio::flags::{ConfigFlags, FlagStore};
//! use fanout_audio::sink::mock::MockDriver;
//!
//! let flags = Arc::new(FlagStore::new());
//! let device = AudioDevice::builder()
//!     .sink(Arc::new(MockDriver::new("hdmi")))
//!     .sink(Arc::new(MockDriver::new("spdif")))
//!     .sink(Arc::new(MockDriver::new("amp").hardware_volume()))
//!     .flags(flags.clone())
//!     .on_event(|e| tracing::warn!(?e, "stream event"))
//!     .open()
//!     .unwrap();
//!
//! let stream = device.open_output_stream(StreamConfig::default()).unwrap();
//! stream.write(&[0i16; 3840]); // one period of stereo silence
//!
//! // Disable a sink at runtime; the next write closes its handle.
//! flags.set("audio.spdif_enabled", false);
//!
//! stream.standby();
//! ```
//!
//! ## Architecture
//!
//! - **Enablement monitor**: a background thread watches one boolean flag
//!   per sink and publishes a lock-free enabled snapshot plus a change
//!   counter streams compare by value
//! - **Sink reconciliation**: each write brings the open handle set in
//!   line with `enabled ∧ connected`; a sink that fails to open stays
//!   dark without disturbing the others
//! - **Convert, mix, pace, fan out**: caller-rate frames are resampled to
//!   the sinks' native rate, software gain is applied for sinks without
//!   hardware volume, and the producer sleeps against the reference
//!   sink's buffer occupancy so the slowest drain never underruns
//!
//! Everything is synchronous and blocking: one monitor thread, a control
//! thread for volume and lifecycle calls, and the render thread calling
//! [`OutputStream::write`]. The device lock is always taken before the
//! stream lock.

#![warn(missing_docs)]

mod config;
mod device;
mod error;
mod event;
pub mod flags;
mod flow;
pub mod format;
mod monitor;
pub mod sink;
mod stream;

pub use config::{
    SampleFormat, StreamConfig, DEFAULT_PERIOD_COUNT, DEFAULT_PERIOD_FRAMES, MAX_RATE,
    MIN_PACE_SLEEP_US, MIN_RATE, NATIVE_RATE,
};
pub use device::{AudioDevice, AudioDeviceBuilder, Mode};
pub use error::{AudioError, FlagError, SinkError};
pub use event::{event_callback, EventCallback, StreamEvent};
pub use monitor::{Enablement, EnablementMonitor};
pub use stream::OutputStream;
