//! Flow controller: paces the producer against sink buffer occupancy.
//!
//! Keeps queued frames in the reference sink's kernel buffer under the
//! write threshold by sleeping the calling thread just long enough for the
//! hardware to drain the excess. This is best-effort backpressure, not a
//! hard real-time scheduler: it prevents kernel-buffer overrun, nothing
//! more. All sinks derive their clocks from the same source, so one
//! reference sink paces the whole set.

use std::time::Duration;

use tracing::debug;

use crate::sink::SinkHandle;

/// Sleeps the caller until the reference sink's buffered frames drop to
/// `write_threshold`.
///
/// Returns `false` if the play pointer could not be read and pacing was
/// abandoned for this write - better to risk a glitch than to hang
/// indefinitely on a dead sink.
pub(crate) fn pace(
    handle: &dyn SinkHandle,
    write_threshold: usize,
    rate: u32,
    min_sleep: Duration,
) -> bool {
    pace_with(handle, write_threshold, rate, min_sleep, std::thread::sleep)
}

/// [`pace`] with an injected sleep function, so tests can count iterations
/// without waiting on real time.
pub(crate) fn pace_with<F: FnMut(Duration)>(
    handle: &dyn SinkHandle,
    write_threshold: usize,
    rate: u32,
    min_sleep: Duration,
    mut sleep: F,
) -> bool {
    loop {
        let pointer = match handle.play_pointer() {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "play pointer query failed, pacing abandoned");
                return false;
            }
        };

        let buffered = handle.buffer_frames().saturating_sub(pointer.frames_available);
        if buffered <= write_threshold {
            return true;
        }

        // Time for the hardware to drain the excess at the nominal rate,
        // clamped so wakeups stay coarse.
        let excess_frames = (buffered - write_threshold) as u64;
        let wait = Duration::from_micros(excess_frames * 1_000_000 / u64::from(rate));
        sleep(wait.max(min_sleep));
    }
}
