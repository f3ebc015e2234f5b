#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DspError {
	#[error("fft size {0} is invalid, must be a power of two >= 2")]
	InvalidFftSize(usize),
}
