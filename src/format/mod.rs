//! Sample-rate conversion and software gain.

mod gain;
mod resample;

pub use gain::{apply_gain, gain_q16};
pub use resample::StreamResampler;
