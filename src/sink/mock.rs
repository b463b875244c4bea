//! Mock sink driver for testing without hardware.
//!
//! [`MockDriver`] scripts connection state, open failures, write failures,
//! and play-pointer behavior, and records everything written to it, so the
//! full engine can run in CI with no audio devices present.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::sink::{PlayPointer, SinkDriver, SinkHandle};
use crate::{SinkError, StreamConfig};

const DEFAULT_BUFFER_FRAMES: usize = 7680;

/// A scriptable sink driver.
///
/// # Example
///
/// ```
/// use fanout_audio::sink::mock::MockDriver;
/// use fanout_audio::sink::{SinkDriver, SinkHandle};
/// use fanout_audio::StreamConfig;
///
/// let driver = MockDriver::new("hdmi");
/// let handle = driver.open(&StreamConfig::default()).unwrap();
/// handle.write(&[1, 2, 3, 4]).unwrap();
/// assert_eq!(driver.last_handle().unwrap().write_count(), 1);
/// ```
pub struct MockDriver {
    name: String,
    connected: AtomicBool,
    hardware_volume: bool,
    fail_open: AtomicBool,
    buffer_frames: usize,
    open_count: AtomicUsize,
    handles: Mutex<Vec<Arc<MockHandle>>>,
}

impl MockDriver {
    /// Creates a connected driver with no scripted failures.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            connected: AtomicBool::new(true),
            hardware_volume: false,
            fail_open: AtomicBool::new(false),
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            open_count: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Sets the initial connection state.
    #[must_use]
    pub fn connected(self, connected: bool) -> Self {
        self.connected.store(connected, Ordering::SeqCst);
        self
    }

    /// Marks this driver as applying volume in hardware.
    #[must_use]
    pub fn hardware_volume(mut self) -> Self {
        self.hardware_volume = true;
        self
    }

    /// Scripts every `open` call to fail.
    #[must_use]
    pub fn fail_open(self) -> Self {
        self.fail_open.store(true, Ordering::SeqCst);
        self
    }

    /// Sets the hardware buffer capacity reported by opened handles.
    #[must_use]
    pub fn buffer_frames(mut self, frames: usize) -> Self {
        self.buffer_frames = frames;
        self
    }

    /// Simulates hot-plugging at runtime.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Toggles scripted open failure at runtime.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// The most recently opened handle, if any.
    pub fn last_handle(&self) -> Option<Arc<MockHandle>> {
        self.handles.lock().last().cloned()
    }
}

impl SinkDriver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn has_hardware_volume(&self) -> bool {
        self.hardware_volume
    }

    fn open(&self, _config: &StreamConfig) -> Result<Arc<dyn SinkHandle>, SinkError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SinkError::open_failed("scripted open failure"));
        }
        let handle = Arc::new(MockHandle::new(self.buffer_frames));
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.handles.lock().push(handle.clone());
        Ok(handle)
    }
}

/// An open mock sink recording everything the engine does to it.
pub struct MockHandle {
    buffer_frames: usize,
    writes: Mutex<Vec<Vec<i16>>>,
    write_count: AtomicUsize,
    fail_writes: AtomicUsize,
    avail_schedule: Mutex<VecDeque<usize>>,
    fail_pointer: AtomicBool,
    hw_volume: Mutex<Option<f32>>,
}

impl MockHandle {
    fn new(buffer_frames: usize) -> Self {
        Self {
            buffer_frames,
            writes: Mutex::new(Vec::new()),
            write_count: AtomicUsize::new(0),
            fail_writes: AtomicUsize::new(0),
            avail_schedule: Mutex::new(VecDeque::new()),
            fail_pointer: AtomicBool::new(false),
            hw_volume: Mutex::new(None),
        }
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Copies of every buffer written so far.
    pub fn writes(&self) -> Vec<Vec<i16>> {
        self.writes.lock().clone()
    }

    /// The most recently written buffer, if any.
    pub fn last_write(&self) -> Option<Vec<i16>> {
        self.writes.lock().last().cloned()
    }

    /// Fails the next `n` writes with a scripted error.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Queues `frames_available` values returned by successive
    /// `play_pointer` calls. The last queued value repeats once the queue
    /// drains; with nothing queued the buffer reports fully available.
    pub fn schedule_avail<I: IntoIterator<Item = usize>>(&self, avail: I) {
        let mut schedule = self.avail_schedule.lock();
        schedule.clear();
        schedule.extend(avail);
    }

    /// Makes `play_pointer` fail until cleared.
    pub fn set_fail_pointer(&self, fail: bool) {
        self.fail_pointer.store(fail, Ordering::SeqCst);
    }

    /// The last hardware volume applied, if any.
    pub fn hw_volume(&self) -> Option<f32> {
        *self.hw_volume.lock()
    }
}

impl SinkHandle for MockHandle {
    fn write(&self, samples: &[i16]) -> Result<usize, SinkError> {
        let remaining = self.fail_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_writes.fetch_sub(1, Ordering::SeqCst);
            return Err(SinkError::write_failed("scripted write failure"));
        }
        self.writes.lock().push(samples.to_vec());
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(samples.len() / 2)
    }

    fn play_pointer(&self) -> Result<PlayPointer, SinkError> {
        if self.fail_pointer.load(Ordering::SeqCst) {
            return Err(SinkError::pointer_unavailable("scripted pointer failure"));
        }
        let mut schedule = self.avail_schedule.lock();
        let frames_available = if schedule.len() > 1 {
            schedule.pop_front().unwrap_or(self.buffer_frames)
        } else {
            schedule.front().copied().unwrap_or(self.buffer_frames)
        };
        Ok(PlayPointer {
            frames_available,
            at: Instant::now(),
        })
    }

    fn buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    fn set_hardware_volume(&self, volume: f32) -> Result<(), SinkError> {
        *self.hw_volume.lock() = Some(volume);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_writes() {
        let driver = MockDriver::new("mock");
        let handle = driver.open(&StreamConfig::default()).unwrap();
        handle.write(&[1, 2, 3, 4]).unwrap();
        handle.write(&[5, 6]).unwrap();

        let recorded = driver.last_handle().unwrap();
        assert_eq!(recorded.write_count(), 2);
        assert_eq!(recorded.writes()[0], vec![1, 2, 3, 4]);
        assert_eq!(recorded.last_write().unwrap(), vec![5, 6]);
    }

    #[test]
    fn test_scripted_open_failure() {
        let driver = MockDriver::new("mock").fail_open();
        assert!(driver.open(&StreamConfig::default()).is_err());
        driver.set_fail_open(false);
        assert!(driver.open(&StreamConfig::default()).is_ok());
    }

    #[test]
    fn test_scripted_write_failure() {
        let driver = MockDriver::new("mock");
        let handle = driver.open(&StreamConfig::default()).unwrap();
        driver.last_handle().unwrap().fail_next_writes(1);
        assert!(handle.write(&[0, 0]).is_err());
        assert!(handle.write(&[0, 0]).is_ok());
    }

    #[test]
    fn test_avail_schedule_repeats_last() {
        let driver = MockDriver::new("mock").buffer_frames(100);
        let handle = driver.open(&StreamConfig::default()).unwrap();
        let mock = driver.last_handle().unwrap();

        mock.schedule_avail([10, 50, 100]);
        assert_eq!(handle.play_pointer().unwrap().frames_available, 10);
        assert_eq!(handle.play_pointer().unwrap().frames_available, 50);
        assert_eq!(handle.play_pointer().unwrap().frames_available, 100);
        assert_eq!(handle.play_pointer().unwrap().frames_available, 100);
    }

    #[test]
    fn test_unscheduled_pointer_reports_empty_buffer() {
        let driver = MockDriver::new("mock").buffer_frames(64);
        let handle = driver.open(&StreamConfig::default()).unwrap();
        assert_eq!(handle.play_pointer().unwrap().frames_available, 64);
    }

    #[test]
    fn test_hardware_volume_recorded() {
        let driver = MockDriver::new("amp").hardware_volume();
        assert!(driver.has_hardware_volume());
        let handle = driver.open(&StreamConfig::default()).unwrap();
        handle.set_hardware_volume(0.25).unwrap();
        assert_eq!(driver.last_handle().unwrap().hw_volume(), Some(0.25));
    }
}
