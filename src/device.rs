//! Process-wide audio device: shared volume/mute state, the sink registry,
//! and the stream open/close surface.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::flags::ConfigFlags;
use crate::monitor::{Enablement, EnablementMonitor};
use crate::sink::{SinkDriver, SinkHandle, SinkRegistry};
use crate::stream::OutputStream;
use crate::{AudioError, EventCallback, StreamConfig, StreamEvent};

/// Audio mode reported by the platform.
///
/// Recorded for completeness; this device has no mode-specific routing.
/// Telephony paths are out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Normal media playback.
    #[default]
    Normal,
    /// Ringtone playback.
    Ringtone,
    /// In a call.
    InCall,
}

/// State guarded by the device lock.
///
/// The hardware-volume handle aliases the stream's open handle for the one
/// sink that applies volume in hardware; it is published and cleared only
/// while both the device and stream locks are held.
pub(crate) struct DeviceControl {
    pub(crate) master_volume: f32,
    pub(crate) master_mute: bool,
    pub(crate) hw_volume: Option<Arc<dyn SinkHandle>>,
    pub(crate) mode: Mode,
}

impl DeviceControl {
    pub(crate) fn new() -> Self {
        Self {
            master_volume: 1.0,
            master_mute: false,
            hw_volume: None,
            mode: Mode::Normal,
        }
    }

    /// Effective software gain: 0.0 when muted, else the master volume.
    pub(crate) fn gain(&self) -> f32 {
        if self.master_mute {
            0.0
        } else {
            self.master_volume
        }
    }

    fn push_hw_volume(&self) {
        if let Some(handle) = &self.hw_volume {
            if let Err(e) = handle.set_hardware_volume(self.gain()) {
                warn!(error = %e, "cannot apply hardware volume");
            }
        }
    }
}

/// The shared audio device.
///
/// Built once at process start via [`AudioDevice::builder()`], then shared
/// (`Arc`) between the control thread and every output stream.
///
/// # Lock order
///
/// When the device lock and a stream lock are both needed, the device lock
/// is acquired first. Streams go through a single helper that takes both in
/// that order; the volume-control path takes only the device lock.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use fanout_audio::{AudioDevice, StreamConfig};
/// use fanout_audio::flags::FlagStore;
/// use fanout_audio::sink::mock::MockDriver;
///
/// let device = AudioDevice::builder()
///     .sink(Arc::new(MockDriver::new("hdmi")))
///     .sink(Arc::new(MockDriver::new("amp").hardware_volume()))
///     .flags(Arc::new(FlagStore::new()))
///     .open()
///     .unwrap();
///
/// let stream = device.open_output_stream(StreamConfig::default()).unwrap();
/// let written = stream.write(&[0i16; 3840]);
/// assert_eq!(written, 3840 * 2);
/// ```
pub struct AudioDevice {
    pub(crate) control: Mutex<DeviceControl>,
    pub(crate) registry: SinkRegistry,
    pub(crate) enablement: Arc<Enablement>,
    pub(crate) events: Option<EventCallback>,
    board: String,
}

impl AudioDevice {
    /// Starts building a device.
    #[must_use]
    pub fn builder() -> AudioDeviceBuilder {
        AudioDeviceBuilder::new()
    }

    /// The board identity resolved at open time.
    pub fn board(&self) -> &str {
        &self.board
    }

    /// Sets the master volume, 0.0 to 1.0 (clamped).
    ///
    /// Applied to the hardware-volume sink immediately if one is open;
    /// software gain covers the remaining sinks at write time.
    pub fn set_master_volume(&self, volume: f32) {
        let mut control = self.control.lock();
        control.master_volume = volume.clamp(0.0, 1.0);
        control.push_hw_volume();
    }

    /// Sets master mute. The stored volume is preserved across
    /// mute/unmute.
    pub fn set_master_mute(&self, mute: bool) {
        let mut control = self.control.lock();
        control.master_mute = mute;
        control.push_hw_volume();
    }

    /// Current master volume.
    pub fn master_volume(&self) -> f32 {
        self.control.lock().master_volume
    }

    /// Current master mute state.
    pub fn master_mute(&self) -> bool {
        self.control.lock().master_mute
    }

    /// Records the platform audio mode.
    pub fn set_mode(&self, mode: Mode) {
        self.control.lock().mode = mode;
    }

    /// Current platform audio mode.
    pub fn mode(&self) -> Mode {
        self.control.lock().mode
    }

    /// The lock-free enablement snapshot published by the monitor.
    pub fn enablement(&self) -> &Enablement {
        &self.enablement
    }

    /// Opens the logical output stream.
    ///
    /// The stream starts in standby; sinks open on the first write.
    ///
    /// # Errors
    ///
    /// Rejects unsupported configurations synchronously; no stream is
    /// created.
    pub fn open_output_stream(
        self: &Arc<Self>,
        config: StreamConfig,
    ) -> Result<OutputStream, AudioError> {
        config.validate()?;
        Ok(OutputStream::new(self.clone(), config))
    }

    /// Closes an output stream, forcing standby first.
    ///
    /// Dropping the stream has the same effect; this form makes the close
    /// point explicit.
    pub fn close_output_stream(&self, stream: OutputStream) {
        stream.standby();
        drop(stream);
    }

    pub(crate) fn emit(&self, event: StreamEvent) {
        if let Some(cb) = &self.events {
            cb(event);
        }
    }
}

/// Builder for [`AudioDevice`].
///
/// Sinks are registered in index order; the index is stable for the process
/// lifetime. Each sink's enablement flag is named `audio.<name>_enabled`.
pub struct AudioDeviceBuilder {
    drivers: Vec<Arc<dyn SinkDriver>>,
    flags: Option<Arc<dyn ConfigFlags>>,
    board: String,
    events: Option<EventCallback>,
}

impl AudioDeviceBuilder {
    fn new() -> Self {
        Self {
            drivers: Vec::new(),
            flags: None,
            board: "generic".to_string(),
            events: None,
        }
    }

    /// Registers a sink driver. Index order is registration order.
    #[must_use]
    pub fn sink(mut self, driver: Arc<dyn SinkDriver>) -> Self {
        self.drivers.push(driver);
        self
    }

    /// Attaches the flag store watched by the enablement monitor.
    ///
    /// Without a store, no monitor runs and every sink stays enabled.
    #[must_use]
    pub fn flags(mut self, flags: Arc<dyn ConfigFlags>) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Sets the board/product identity.
    #[must_use]
    pub fn board(mut self, board: impl Into<String>) -> Self {
        self.board = board.into();
        self
    }

    /// Registers a callback for runtime events.
    ///
    /// The callback runs on the thread that produced the event, after the
    /// engine has released its locks, so it may call back into the device
    /// (query or change volume, mute, mode).
    #[must_use]
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(StreamEvent) + Send + Sync + 'static,
    {
        self.events = Some(Arc::new(callback));
        self
    }

    /// Opens the device: resolves identity, fixes the sink arena, seeds
    /// the enablement snapshot, and spawns the monitor thread.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::NoSinksRegistered`] if no driver was added.
    pub fn open(self) -> Result<Arc<AudioDevice>, AudioError> {
        if self.drivers.is_empty() {
            return Err(AudioError::NoSinksRegistered);
        }

        let enablement = Arc::new(Enablement::new(self.drivers.len()));

        if let Some(flags) = self.flags {
            let names = self
                .drivers
                .iter()
                .map(|d| format!("audio.{}_enabled", d.name()))
                .collect();
            EnablementMonitor::spawn(flags, enablement.clone(), names);
        }

        info!(board = %self.board, sinks = self.drivers.len(), "audio device open");

        Ok(Arc::new(AudioDevice {
            control: Mutex::new(DeviceControl::new()),
            registry: SinkRegistry::new(self.drivers),
            enablement,
            events: self.events,
            board: self.board,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::mock::MockDriver;

    fn device_with_amp() -> (Arc<AudioDevice>, Arc<MockDriver>) {
        let amp = Arc::new(MockDriver::new("amp").hardware_volume());
        let device = AudioDevice::builder()
            .sink(Arc::new(MockDriver::new("hdmi")))
            .sink(amp.clone())
            .board("testboard")
            .open()
            .unwrap();
        (device, amp)
    }

    #[test]
    fn test_open_requires_sinks() {
        assert!(matches!(
            AudioDevice::builder().open(),
            Err(AudioError::NoSinksRegistered)
        ));
    }

    #[test]
    fn test_board_identity() {
        let (device, _) = device_with_amp();
        assert_eq!(device.board(), "testboard");
    }

    #[test]
    fn test_volume_clamped_and_stored() {
        let (device, _) = device_with_amp();
        device.set_master_volume(1.5);
        assert_eq!(device.master_volume(), 1.0);
        device.set_master_volume(0.3);
        assert_eq!(device.master_volume(), 0.3);
    }

    #[test]
    fn test_mute_preserves_volume() {
        let (device, _) = device_with_amp();
        device.set_master_volume(0.7);
        device.set_master_mute(true);
        assert!(device.master_mute());
        assert_eq!(device.master_volume(), 0.7);
        device.set_master_mute(false);
        assert_eq!(device.master_volume(), 0.7);
    }

    #[test]
    fn test_volume_pushed_to_open_hw_sink() {
        let (device, amp) = device_with_amp();
        let stream = device.open_output_stream(StreamConfig::default()).unwrap();
        stream.write(&[0i16; 128]); // leaves standby, publishes the handle

        device.set_master_volume(0.5);
        assert_eq!(amp.last_handle().unwrap().hw_volume(), Some(0.5));

        device.set_master_mute(true);
        assert_eq!(amp.last_handle().unwrap().hw_volume(), Some(0.0));
    }

    #[test]
    fn test_mode_recorded() {
        let (device, _) = device_with_amp();
        assert_eq!(device.mode(), Mode::Normal);
        device.set_mode(Mode::Ringtone);
        assert_eq!(device.mode(), Mode::Ringtone);
    }

    #[test]
    fn test_rejects_bad_stream_config() {
        let (device, _) = device_with_amp();
        let config = StreamConfig {
            channels: 6,
            ..Default::default()
        };
        assert!(device.open_output_stream(config).is_err());
    }
}
