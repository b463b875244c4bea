//! Sink drivers, handles, and the per-stream handle set.
//!
//! A sink is one physical output path (HDMI encoder, S/PDIF transmitter,
//! amplifier chip). Each sink type is a [`SinkDriver`] implementation; an
//! open sink is a [`SinkHandle`]. The set of known sinks is fixed at device
//! open time in a registry indexed by [`SinkId`] and never resized.
//!
//! At most one registered driver may report
//! [`has_hardware_volume()`](SinkDriver::has_hardware_volume): that sink
//! applies volume and mute in its own hardware, is exempt from software
//! attenuation, and has its open handle published to the device so the
//! volume-control path can reach it.

pub mod mock;
mod registry;

pub(crate) use registry::{SinkRegistry, SinkSet};

use std::sync::Arc;
use std::time::Instant;

use crate::{SinkError, StreamConfig};

/// Stable index of a sink in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(pub usize);

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

/// Snapshot of a sink's hardware play position.
#[derive(Debug, Clone, Copy)]
pub struct PlayPointer {
    /// Frames of free space in the sink's hardware buffer.
    pub frames_available: usize,
    /// Monotonic timestamp of the query.
    pub at: Instant,
}

/// One physical output path's device driver.
///
/// Drivers are registered once at device open and live for the process.
/// The engine opens and closes handles as the sink is enabled, disabled,
/// or hot-plugged; the driver itself is stateless from the engine's point
/// of view.
///
/// # Implementation Notes
///
/// - Methods take `&self`; use interior mutability if the driver needs state
/// - `open` may be called again after the previous handle was dropped
/// - `is_connected` is polled once per reconciliation; keep it cheap
pub trait SinkDriver: Send + Sync {
    /// Human-readable name for logging and events.
    fn name(&self) -> &str;

    /// Whether the physical device is present.
    ///
    /// Only hot-pluggable sink types override this; fixed sinks are always
    /// connected. Default: `true`.
    fn is_connected(&self) -> bool {
        true
    }

    /// Whether this sink applies volume and mute in hardware.
    ///
    /// A hardware-volume sink receives the unattenuated signal and its
    /// handle is published for [`SinkHandle::set_hardware_volume`] calls.
    /// Default: `false`.
    fn has_hardware_volume(&self) -> bool {
        false
    }

    /// Opens the sink device with the stream's configuration.
    ///
    /// # Errors
    ///
    /// Open failures are recoverable: the engine logs them and leaves the
    /// sink unavailable until the next reconciliation.
    fn open(&self, config: &StreamConfig) -> Result<Arc<dyn SinkHandle>, SinkError>;
}

/// An open sink device.
///
/// Closing is dropping the last `Arc`. The engine may hold a clone in the
/// device's volume-control state for a hardware-volume sink; both clones
/// are dropped together under the device and stream locks.
pub trait SinkHandle: Send + Sync {
    /// Writes interleaved frames to the device, returning frames written.
    ///
    /// # Errors
    ///
    /// Write failures are recoverable; the engine logs them and retries
    /// next period with the handle left open.
    fn write(&self, samples: &[i16]) -> Result<usize, SinkError>;

    /// Queries the hardware play pointer.
    ///
    /// # Errors
    ///
    /// On failure the flow controller abandons pacing for the current
    /// write rather than retrying.
    fn play_pointer(&self) -> Result<PlayPointer, SinkError>;

    /// Total frames the sink's hardware buffer holds.
    fn buffer_frames(&self) -> usize;

    /// Applies volume in hardware, 0.0 (mute) to 1.0 (full scale).
    ///
    /// # Errors
    ///
    /// Default implementation returns [`SinkError::Unsupported`]; only the
    /// hardware-volume sink overrides it.
    fn set_hardware_volume(&self, _volume: f32) -> Result<(), SinkError> {
        Err(SinkError::Unsupported)
    }
}
