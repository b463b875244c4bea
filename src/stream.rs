//! The output stream engine.
//!
//! Owns the stream lifecycle (`Standby ⇄ Active`), decides when sinks are
//! (re)opened, and runs the per-write pipeline: convert, mix, pace, fan
//! out. Writes, standby, and reconciliation are serialized by the stream
//! lock; whenever the device lock is also needed it is acquired first,
//! through one helper, matching the order used by the volume-control path.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::config::NATIVE_RATE;
use crate::device::{AudioDevice, DeviceControl};
use crate::flow;
use crate::format::{apply_gain, StreamResampler};
use crate::sink::SinkSet;
use crate::{SampleFormat, StreamConfig, StreamEvent};

struct StreamState {
    standby: bool,
    sinks: SinkSet,
    /// Change-counter value last reconciled against.
    stamp: u64,
    write_threshold: usize,
    resampler: Option<StreamResampler>,
    /// Rate-converted frames, reused across writes.
    rate_buf: Vec<i16>,
    /// Software-attenuated frames, reused across writes.
    vol_buf: Vec<i16>,
}

/// The single logical output stream.
///
/// Created by [`AudioDevice::open_output_stream`] in standby; the first
/// write opens the enabled-and-connected sinks. Writes block inside the
/// flow controller for bounded but unpredictable durations - that is the
/// backpressure mechanism, not a bug. Dropping the stream forces standby.
pub struct OutputStream {
    device: Arc<AudioDevice>,
    config: StreamConfig,
    state: Mutex<StreamState>,
}

impl OutputStream {
    pub(crate) fn new(device: Arc<AudioDevice>, config: StreamConfig) -> Self {
        let sink_count = device.registry.len();
        Self {
            device,
            config,
            state: Mutex::new(StreamState {
                standby: true,
                sinks: SinkSet::new(sink_count),
                stamp: 0,
                write_threshold: 0,
                resampler: None,
                rate_buf: Vec::new(),
                vol_buf: Vec::new(),
            }),
        }
    }

    /// The one place both locks are taken: device first, then stream.
    fn lock_both(&self) -> (MutexGuard<'_, DeviceControl>, MutexGuard<'_, StreamState>) {
        let control = self.device.control.lock();
        let state = self.state.lock();
        (control, state)
    }

    /// Writes interleaved `i16` frames, returning bytes consumed.
    ///
    /// Always reports the full byte count, even when no sink accepted the
    /// data - the caller's real-time cadence must never stall on a dead
    /// sink. Zero openable sinks is a valid (silently dark) state.
    pub fn write(&self, samples: &[i16]) -> usize {
        let bytes = samples.len() * self.config.format.sample_bytes();
        let frames_in = samples.len() / usize::from(self.config.channels);

        // Events are queued while the locks are held and delivered after
        // both are released, so a callback may call back into the device.
        let mut events = Vec::new();

        let (mut control, mut state) = self.lock_both();
        if state.standby {
            self.start_locked(&mut control, &mut state, &mut events);
        }

        // Catch up with the enablement monitor before touching hardware.
        loop {
            let counter = self.device.enablement.counter();
            if state.stamp == counter {
                break;
            }
            state.stamp = counter;
            state.sinks.reconcile(
                &self.device.registry,
                &self.device.enablement,
                &self.config,
                &mut control,
                &mut events,
            );
            events.push(StreamEvent::EnablementApplied { counter });
        }

        let gain = control.gain();
        drop(control); // device lock released for the render work

        let (open, failures) = {
            let st = &mut *state;
            let buf: &[i16] = if self.config.sample_rate == NATIVE_RATE {
                samples
            } else {
                let resampler = st.resampler.get_or_insert_with(|| {
                    StreamResampler::new(self.config.sample_rate, NATIVE_RATE, self.config.channels)
                });
                resampler.convert(samples, &mut st.rate_buf);
                &st.rate_buf
            };

            // Hardware-volume sinks always take the raw signal; scale only
            // if some open sink actually needs software gain.
            let needs_soft_volume = st
                .sinks
                .iter_open()
                .any(|(id, _)| !self.device.registry.driver(id).has_hardware_volume());
            let vol_buf: &[i16] = if gain < 1.0 && needs_soft_volume {
                apply_gain(buf, &mut st.vol_buf, gain);
                &st.vol_buf
            } else {
                buf
            };

            if let Some((id, reference)) = st.sinks.reference() {
                let paced = flow::pace(
                    &**reference,
                    st.write_threshold,
                    NATIVE_RATE,
                    Duration::from_micros(self.config.min_pace_sleep_us),
                );
                if !paced {
                    events.push(StreamEvent::PacingSkipped { sink: id });
                }
            }

            let open = st.sinks.open_count();
            let mut failures = 0;
            for (id, handle) in st.sinks.iter_open() {
                let driver = self.device.registry.driver(id);
                let data = if driver.has_hardware_volume() {
                    buf
                } else {
                    vol_buf
                };
                if let Err(e) = handle.write(data) {
                    warn!(sink = %id, name = driver.name(), error = %e, "sink write failed");
                    events.push(StreamEvent::SinkWriteFailed {
                        sink: id,
                        sink_name: driver.name().to_string(),
                        error: e.to_string(),
                    });
                    failures += 1;
                }
            }
            (open, failures)
        };
        drop(state);

        for event in events {
            self.device.emit(event);
        }

        if open > 0 && failures == open {
            // Nothing consumed the period. Sleep its duration so the caller
            // keeps real-time cadence instead of spinning.
            let us = frames_in as u64 * 1_000_000 / u64::from(self.config.sample_rate);
            thread::sleep(Duration::from_micros(us));
        }

        bytes
    }

    /// Closes every open sink handle and enters standby. Idempotent.
    pub fn standby(&self) {
        let (mut control, mut state) = self.lock_both();
        if state.standby {
            return;
        }
        debug!("output stream entering standby");
        state.sinks.close_all(&mut control);
        state.standby = true;
    }

    /// Whether the stream is currently in standby.
    pub fn is_standby(&self) -> bool {
        self.state.lock().standby
    }

    /// The caller's sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Channel count.
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Sample format.
    pub fn format(&self) -> SampleFormat {
        self.config.format
    }

    /// Preferred caller buffer size in bytes.
    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size_bytes()
    }

    /// Total playback latency in milliseconds.
    pub fn latency_ms(&self) -> u32 {
        self.config.latency_ms()
    }

    /// Leaves standby. Both locks held by the caller; events are queued
    /// onto `events` for delivery after they are released.
    fn start_locked(
        &self,
        control: &mut DeviceControl,
        state: &mut StreamState,
        events: &mut Vec<StreamEvent>,
    ) {
        debug!("output stream leaving standby");
        state.write_threshold = self.config.write_threshold();
        state.stamp = self.device.enablement.counter();
        state.sinks.reconcile(
            &self.device.registry,
            &self.device.enablement,
            &self.config,
            control,
            events,
        );
        if let Some(resampler) = &mut state.resampler {
            resampler.reset();
        }
        state.standby = false;
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        // Scratch buffers and the resampler go with the stream; handles
        // must close under both locks first.
        self.standby();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::mock::MockDriver;
    use crate::AudioDevice;

    fn device_3() -> (Arc<AudioDevice>, Vec<Arc<MockDriver>>) {
        let drivers: Vec<Arc<MockDriver>> = vec![
            Arc::new(MockDriver::new("hdmi")),
            Arc::new(MockDriver::new("spdif")),
            Arc::new(MockDriver::new("amp").hardware_volume()),
        ];
        let mut builder = AudioDevice::builder();
        for d in &drivers {
            builder = builder.sink(d.clone());
        }
        (builder.open().unwrap(), drivers)
    }

    #[test]
    fn test_first_write_leaves_standby_and_fans_out() {
        let (device, drivers) = device_3();
        let stream = device.open_output_stream(StreamConfig::default()).unwrap();
        assert!(stream.is_standby());

        let samples = vec![100i16; 256];
        assert_eq!(stream.write(&samples), 512);
        assert!(!stream.is_standby());

        for driver in &drivers {
            let handle = driver.last_handle().unwrap();
            assert_eq!(handle.write_count(), 1);
            assert_eq!(handle.last_write().unwrap(), samples);
        }
    }

    #[test]
    fn test_standby_idempotent() {
        let (device, drivers) = device_3();
        let stream = device.open_output_stream(StreamConfig::default()).unwrap();
        stream.write(&[0i16; 64]);
        assert_eq!(drivers[0].open_count(), 1);

        stream.standby();
        stream.standby();
        assert!(stream.is_standby());

        // Next write reopens once, not twice.
        stream.write(&[0i16; 64]);
        assert_eq!(drivers[0].open_count(), 2);
    }

    #[test]
    fn test_write_failure_keeps_handle_and_cadence() {
        let (device, drivers) = device_3();
        let stream = device.open_output_stream(StreamConfig::default()).unwrap();
        stream.write(&[0i16; 64]);

        drivers[1].last_handle().unwrap().fail_next_writes(1);
        assert_eq!(stream.write(&[0i16; 64]), 128);

        // Handle stays open and works next period.
        assert_eq!(stream.write(&[0i16; 64]), 128);
        assert_eq!(drivers[1].last_handle().unwrap().write_count(), 2);
        assert_eq!(drivers[1].open_count(), 1);
    }

    #[test]
    fn test_zero_sinks_silent_degradation() {
        let broken = Arc::new(MockDriver::new("only").fail_open());
        let device = AudioDevice::builder()
            .sink(broken.clone())
            .open()
            .unwrap();
        let stream = device.open_output_stream(StreamConfig::default()).unwrap();

        // Write proceeds, buffering nowhere, full byte count reported.
        assert_eq!(stream.write(&[0i16; 128]), 256);
        assert!(!stream.is_standby());
        assert_eq!(broken.open_count(), 0);
    }

    #[test]
    fn test_resampled_write_converts_before_fanout() {
        let (device, drivers) = device_3();
        let config = StreamConfig {
            sample_rate: 24_000,
            ..Default::default()
        };
        let stream = device.open_output_stream(config).unwrap();

        // 100 stereo frames at 24kHz become ~200 frames at 48kHz.
        let samples = vec![500i16; 200];
        assert_eq!(stream.write(&samples), 400);

        let written = drivers[0].last_handle().unwrap().last_write().unwrap();
        let frames_out = written.len() / 2;
        assert!((195..=205).contains(&frames_out), "frames = {frames_out}");
    }

    #[test]
    fn test_gain_splits_raw_and_attenuated() {
        let (device, drivers) = device_3();
        device.set_master_volume(0.5);
        let stream = device.open_output_stream(StreamConfig::default()).unwrap();

        let samples = vec![1000i16; 64];
        stream.write(&samples);

        // Hardware-volume sink gets the raw signal.
        let amp = drivers[2].last_handle().unwrap().last_write().unwrap();
        assert_eq!(amp, samples);

        // The others get half magnitude within 1 LSB.
        for driver in &drivers[..2] {
            let written = driver.last_handle().unwrap().last_write().unwrap();
            assert!(written.iter().all(|&s| (i32::from(s) - 500).abs() <= 1));
        }
    }

    #[test]
    fn test_mute_silences_software_sinks_only() {
        let (device, drivers) = device_3();
        device.set_master_mute(true);
        let stream = device.open_output_stream(StreamConfig::default()).unwrap();

        let samples = vec![1000i16; 64];
        stream.write(&samples);

        assert!(drivers[0]
            .last_handle()
            .unwrap()
            .last_write()
            .unwrap()
            .iter()
            .all(|&s| s == 0));
        // Hardware-volume sink muted in hardware, fed raw.
        assert_eq!(drivers[2].last_handle().unwrap().last_write().unwrap(), samples);
        assert_eq!(drivers[2].last_handle().unwrap().hw_volume(), Some(0.0));
    }

    #[test]
    fn test_latency_and_buffer_size_accessors() {
        let (device, _) = device_3();
        let stream = device.open_output_stream(StreamConfig::default()).unwrap();
        assert_eq!(stream.latency_ms(), 160);
        assert_eq!(stream.sample_rate(), NATIVE_RATE);
        assert!(stream.buffer_size() > 0);
    }

    #[test]
    fn test_drop_forces_standby() {
        let (device, drivers) = device_3();
        let stream = device.open_output_stream(StreamConfig::default()).unwrap();
        stream.write(&[0i16; 64]);
        device.close_output_stream(stream);

        // All handles released: the driver keeps the only remaining Arc.
        let handle = drivers[2].last_handle().unwrap();
        assert_eq!(Arc::strong_count(&handle), 2); // driver's list + ours
    }
}
