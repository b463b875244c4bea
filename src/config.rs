//! Stream configuration and derived timing values.

use crate::AudioError;

/// The fixed rate every sink device runs at, in Hz.
///
/// All sinks on the board derive their clocks from the same source, so they
/// share this nominal rate. Callers at any other rate are resampled.
pub const NATIVE_RATE: u32 = 48_000;

/// Lowest caller sample rate accepted.
pub const MIN_RATE: u32 = 8_000;
/// Highest caller sample rate accepted.
pub const MAX_RATE: u32 = 192_000;

/// Default frames per period exchanged with a sink's hardware buffer.
pub const DEFAULT_PERIOD_FRAMES: usize = 1920; // 40ms at 48kHz

/// Default number of periods in a sink's hardware buffer.
pub const DEFAULT_PERIOD_COUNT: usize = 4;

/// Minimum sleep quantum for the flow controller, in microseconds.
///
/// Pacing sleeps shorter than this are rounded up to avoid excessive wake
/// frequency.
pub const MIN_PACE_SLEEP_US: u64 = 5_000;

/// Sample formats understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian PCM. The only format the sinks accept.
    #[default]
    S16Le,
}

impl SampleFormat {
    /// Size of one sample in bytes.
    #[must_use]
    pub fn sample_bytes(&self) -> usize {
        match self {
            Self::S16Le => 2,
        }
    }
}

/// Configuration for an output stream.
///
/// Use [`StreamConfig::default()`] for the board's native format, or set the
/// caller's rate and let the engine resample.
///
/// # Example
///
/// ```
/// use fanout_audio::StreamConfig;
///
/// let config = StreamConfig {
///     sample_rate: 44_100,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// The caller's sample rate in Hz. Resampled to [`NATIVE_RATE`] when they
    /// differ.
    pub sample_rate: u32,

    /// Channel count. Only stereo is supported.
    pub channels: u16,

    /// Sample format. Only [`SampleFormat::S16Le`] is supported.
    pub format: SampleFormat,

    /// Frames per period exchanged with each sink.
    pub period_frames: usize,

    /// Periods in each sink's hardware buffer.
    pub period_count: usize,

    /// Frames that must be queued before a sink starts draining.
    pub start_threshold: usize,

    /// Minimum flow-controller sleep, in microseconds.
    pub min_pace_sleep_us: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: NATIVE_RATE,
            channels: 2,
            format: SampleFormat::S16Le,
            period_frames: DEFAULT_PERIOD_FRAMES,
            period_count: DEFAULT_PERIOD_COUNT,
            start_threshold: DEFAULT_PERIOD_FRAMES * 2,
            min_pace_sleep_us: MIN_PACE_SLEEP_US,
        }
    }
}

impl StreamConfig {
    /// Validates the configuration against what the sinks support.
    ///
    /// # Errors
    ///
    /// Returns an [`AudioError`] if the format, rate, channel count, or
    /// period geometry cannot be honored. Rejection happens here, at
    /// configuration time; the stream is never created.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.channels != 2 {
            return Err(AudioError::UnsupportedChannelCount {
                requested: self.channels,
                supported: 2,
            });
        }
        if !(MIN_RATE..=MAX_RATE).contains(&self.sample_rate) {
            return Err(AudioError::UnsupportedSampleRate {
                requested: self.sample_rate,
                min: MIN_RATE,
                max: MAX_RATE,
            });
        }
        if self.period_frames == 0 || self.period_count == 0 {
            return Err(AudioError::InvalidPeriodConfig {
                reason: "period size and count must be non-zero".to_string(),
            });
        }
        if self.start_threshold > self.period_frames * self.period_count {
            return Err(AudioError::InvalidPeriodConfig {
                reason: "start threshold exceeds buffer capacity".to_string(),
            });
        }
        Ok(())
    }

    /// Bytes in one frame (all channels).
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        self.format.sample_bytes() * usize::from(self.channels)
    }

    /// Frames the flow controller allows in a sink's kernel buffer.
    #[must_use]
    pub fn write_threshold(&self) -> usize {
        self.period_frames * self.period_count
    }

    /// Preferred caller buffer size in bytes.
    ///
    /// One period scaled from the native rate to the caller's rate, rounded
    /// up to a multiple of 16 frames as the mixing framework expects.
    #[must_use]
    pub fn buffer_size_bytes(&self) -> usize {
        let frames = self.period_frames * self.sample_rate as usize / NATIVE_RATE as usize;
        let frames = frames.div_ceil(16) * 16;
        frames * self.frame_bytes()
    }

    /// Total playback latency in milliseconds.
    #[must_use]
    pub fn latency_ms(&self) -> u32 {
        (self.period_frames * self.period_count * 1000 / self.sample_rate as usize) as u32
    }
}
