mod engine;
mod error;
mod util;
mod windowing;

pub use engine::FftEngine;
pub use error::DspError;
pub use util::fft_size_for_bandwidth;
pub use windowing::{Hann2Window, WindowingFn};
