use rustfft::num_complex::Complex32;

use crate::error::RadioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Rx,
	Tx,
}

/// Sentinel meaning "sample rate unspecified" (spec.md §4.7's `< 0` rule):
/// the device should default it to the configured bandwidth.
pub const SAMPLE_RATE_UNSET: f64 = -1.0;

/// Actual values read back after a `configure()` call (radios may snap
/// requested values to the nearest supported one).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActualConfig {
	pub frequency_hz: f64,
	pub bandwidth_hz: f64,
	pub sample_rate_hz: f64,
	pub gain_db: f64,
}

/// Thin abstraction over a radio front-end: enumerate/open/configure a
/// device, then stream complex samples in (RX) or out (TX).
///
/// Mirrors spec.md §4.7 exactly; a real hardware implementation backs this
/// with the `soapysdr` crate ([`crate::soapy::SoapyDevice`]), and a
/// deterministic synthetic generator backs it for tests
/// ([`crate::mock::MockDevice`]).
pub trait SdrDevice {
	/// Sets gain/frequency/bandwidth/sample-rate for `direction`, sleeps
	/// 10ms, then reads the values back (radios may snap requests). When
	/// `sample_rate_hz` is [`SAMPLE_RATE_UNSET`] it defaults to
	/// `bandwidth_hz`.
	///
	/// # Errors
	/// [`RadioError::ConfigureFailed`]
	fn configure(
		&mut self,
		direction: Direction,
		frequency_hz: f64,
		bandwidth_hz: f64,
		sample_rate_hz: f64,
		gain_db: f64,
	) -> Result<ActualConfig, RadioError>;

	/// # Errors
	/// [`RadioError::StreamSetupFailed`]
	fn setup_stream(&mut self, direction: Direction) -> Result<(), RadioError>;

	/// # Errors
	/// [`RadioError::StreamFatal`]
	fn activate_stream(&mut self, direction: Direction) -> Result<(), RadioError>;

	/// # Errors
	/// [`RadioError::StreamFatal`]
	fn deactivate_stream(&mut self, direction: Direction) -> Result<(), RadioError>;

	/// # Errors
	/// [`RadioError::StreamFatal`]
	fn close_stream(&mut self, direction: Direction) -> Result<(), RadioError>;

	/// Reads up to `buf.len()` complex samples with a `timeout_us`
	/// microsecond timeout.
	///
	/// # Errors
	/// - [`RadioError::Transient`] on a negative device status: the caller
	///   should log a warning and skip the slice without tearing anything
	///   down.
	/// - [`RadioError::StreamFatal`] on any other failure: fatal to the
	///   worker.
	fn read_stream(&mut self, buf: &mut [Complex32], timeout_us: i64) -> Result<usize, RadioError>;

	/// Writes `buf.len()` complex samples with a `timeout_us` microsecond
	/// timeout. A negative device status is fatal to the TX worker (spec.md
	/// §4.6), unlike `read_stream`'s transient read.
	///
	/// # Errors
	/// [`RadioError::StreamFatal`]
	fn write_stream(&mut self, buf: &[Complex32], timeout_us: i64) -> Result<usize, RadioError>;
}
