//! Streaming sample-rate conversion.
//!
//! Linear interpolation with filter state carried across calls, so that
//! successive writes produce one continuous signal instead of independently
//! resampled fragments. Fast, and adequate for the small rate deltas between
//! caller rates and the board's native rate.

/// A stateful rate converter for interleaved `i16` frames.
///
/// The fractional read phase and the previous input frame survive between
/// [`convert`](StreamResampler::convert) calls; neighboring output chunks
/// join without a click. [`reset`](StreamResampler::reset) clears that state
/// without reconstruction, for the standby-to-active transition.
///
/// Callers never construct one when the rates already match - the engine
/// passes the buffer through untouched in that case.
///
/// # Example
///
/// ```
/// use fanout_audio::format::StreamResampler;
///
/// let mut rs = StreamResampler::new(44_100, 48_000, 2);
/// let input = vec![0i16; 4410 * 2]; // 100ms of stereo silence
/// let mut output = Vec::new();
/// rs.convert(&input, &mut output);
/// assert_eq!(output.len() % 2, 0);
/// ```
pub struct StreamResampler {
    rate_in: u32,
    rate_out: u32,
    channels: usize,
    /// Input-frame advance per output frame.
    step: f64,
    /// Fractional position between `prev` and the next input frame.
    phase: f64,
    /// Last frame of the previous call, interpolation left neighbor.
    prev: Vec<i16>,
}

impl StreamResampler {
    /// Creates a converter from `rate_in` to `rate_out` for `channels`
    /// interleaved channels.
    #[must_use]
    pub fn new(rate_in: u32, rate_out: u32, channels: u16) -> Self {
        Self {
            rate_in,
            rate_out,
            channels: usize::from(channels),
            step: f64::from(rate_in) / f64::from(rate_out),
            phase: 0.0,
            prev: vec![0; usize::from(channels)],
        }
    }

    /// The input rate this converter was built for.
    #[must_use]
    pub fn rate_in(&self) -> u32 {
        self.rate_in
    }

    /// The output rate this converter was built for.
    #[must_use]
    pub fn rate_out(&self) -> u32 {
        self.rate_out
    }

    /// Clears phase and frame memory. The converter behaves as if freshly
    /// constructed, without reallocating.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.prev.fill(0);
    }

    /// Converts `input` (interleaved, whole frames) into `output`.
    ///
    /// `output` is cleared first; its capacity is reused across calls so
    /// the render path does not allocate in steady state.
    pub fn convert(&mut self, input: &[i16], output: &mut Vec<i16>) {
        output.clear();
        let frames = input.len() / self.channels;
        for frame_idx in 0..frames {
            let frame = &input[frame_idx * self.channels..(frame_idx + 1) * self.channels];
            while self.phase < 1.0 {
                for ch in 0..self.channels {
                    let a = f64::from(self.prev[ch]);
                    let b = f64::from(frame[ch]);
                    output.push((a + (b - a) * self.phase) as i16);
                }
                self.phase += self.step;
            }
            self.phase -= 1.0;
            self.prev.copy_from_slice(frame);
        }
    }
}
