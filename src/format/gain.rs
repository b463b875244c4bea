//! Software volume: fixed-point gain applied to sinks without hardware
//! volume control.

/// Converts a gain in `[0.0, 1.0]` to a Q16 fixed-point fraction.
///
/// Out-of-range input is clamped.
#[must_use]
pub fn gain_q16(gain: f32) -> u32 {
    (gain.clamp(0.0, 1.0) * 65536.0) as u32
}

/// Scales every sample of `input` by `gain` into `output`.
///
/// Gain is applied as a 16-bit fraction - one integer multiply and shift
/// per sample, no floating point on the render path. All channels get the
/// same gain; there is no per-channel balance in this design.
///
/// `output` is cleared first and its capacity reused, so steady-state
/// writes do not allocate.
///
/// # Example
///
/// ```
/// use fanout_audio::format::apply_gain;
///
/// let mut out = Vec::new();
/// apply_gain(&[1000, -1000], &mut out, 0.5);
/// assert_eq!(out, vec![500, -500]);
/// ```
pub fn apply_gain(input: &[i16], output: &mut Vec<i16>, gain: f32) {
    let mix = gain_q16(gain);
    output.clear();
    output.reserve(input.len());
    for &sample in input {
        output.push(((i64::from(sample) * i64::from(mix)) >> 16) as i16);
    }
}
