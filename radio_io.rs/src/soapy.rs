use std::thread::sleep;
use std::time::Duration;

use rustfft::num_complex::Complex32;
use soapysdr::{Args, Device as SoapyHandle, Direction as SoapyDirection, RxStream, TxStream};

use crate::device::{ActualConfig, Direction, SdrDevice};
use crate::error::RadioError;

const CONFIGURE_SETTLE: Duration = Duration::from_millis(10);
const CONFIGURE_RETRY_BACKOFF: Duration = Duration::from_secs(1);
const CONFIGURE_MAX_ATTEMPTS: u32 = 5;

fn to_soapy_direction(direction: Direction) -> SoapyDirection {
	match direction {
		Direction::Rx => SoapyDirection::Rx,
		Direction::Tx => SoapyDirection::Tx,
	}
}

/// Hardware-backed [`SdrDevice`], wrapping the `soapysdr` crate binding
/// used by this pack's own SDR repos (`web-rpi-tetra-bluestation`,
/// `ojnline-radiothing`).
pub struct SoapyDevice {
	handle: SoapyHandle,
	rx_stream: Option<RxStream<Complex32>>,
	tx_stream: Option<TxStream<Complex32>>,
}

impl SoapyDevice {
	/// Enumerates devices and opens the first one whose `driver` key
	/// matches `driver` exactly, per spec.md §6.
	///
	/// # Errors
	/// - [`RadioError::NoMatchingDevice`] if enumeration is empty or no
	///   entry's `driver` key matches.
	/// - [`RadioError::OpenFailed`] if `soapysdr::Device::new` fails on a
	///   matching entry.
	pub fn open(driver: &str) -> Result<Self, RadioError> {
		let devices = soapysdr::enumerate("")
			.map_err(|err| RadioError::NoMatchingDevice(err.to_string()))?;

		let matching = devices
			.into_iter()
			.find(|kwargs| kwargs.get("driver").is_some_and(|d| d == driver))
			.ok_or_else(|| RadioError::NoMatchingDevice(driver.to_string()))?;

		let handle = SoapyHandle::new(matching)
			.map_err(|err| RadioError::OpenFailed(err.to_string()))?;

		Ok(Self {
			handle,
			rx_stream: None,
			tx_stream: None,
		})
	}
}

impl SdrDevice for SoapyDevice {
	fn configure(
		&mut self,
		direction: Direction,
		frequency_hz: f64,
		bandwidth_hz: f64,
		sample_rate_hz: f64,
		gain_db: f64,
	) -> Result<ActualConfig, RadioError> {
		let dir = to_soapy_direction(direction);
		let sample_rate_hz = if sample_rate_hz < 0.0 {
			bandwidth_hz
		} else {
			sample_rate_hz
		};

		let mut last_err = None;
		for attempt in 1..=CONFIGURE_MAX_ATTEMPTS {
			let outcome = (|| -> Result<(), soapysdr::Error> {
				self.handle.set_gain(dir, 0, gain_db)?;
				self.handle.set_frequency(dir, 0, frequency_hz, Args::new())?;
				self.handle.set_bandwidth(dir, 0, bandwidth_hz)?;
				self.handle.set_sample_rate(dir, 0, sample_rate_hz)?;
				Ok(())
			})();

			match outcome {
				Ok(()) => {
					sleep(CONFIGURE_SETTLE);
					let actual = ActualConfig {
						frequency_hz: self
							.handle
							.frequency(dir, 0)
							.map_err(|err| RadioError::ConfigureFailed(err.to_string()))?,
						bandwidth_hz: self
							.handle
							.bandwidth(dir, 0)
							.map_err(|err| RadioError::ConfigureFailed(err.to_string()))?,
						sample_rate_hz: self
							.handle
							.sample_rate(dir, 0)
							.map_err(|err| RadioError::ConfigureFailed(err.to_string()))?,
						gain_db: self
							.handle
							.gain(dir, 0)
							.map_err(|err| RadioError::ConfigureFailed(err.to_string()))?,
					};
					return Ok(actual);
				}
				Err(err) => {
					tracing::warn!(%attempt, error = %err, "device configuration attempt failed, retrying");
					last_err = Some(err.to_string());
					if attempt < CONFIGURE_MAX_ATTEMPTS {
						sleep(CONFIGURE_RETRY_BACKOFF);
					}
				}
			}
		}

		Err(RadioError::ConfigureFailed(last_err.unwrap_or_else(|| {
			"configuration failed with no further detail".to_string()
		})))
	}

	fn setup_stream(&mut self, direction: Direction) -> Result<(), RadioError> {
		match direction {
			Direction::Rx => {
				let stream = self
					.handle
					.rx_stream::<Complex32>(&[0])
					.map_err(|err| RadioError::StreamSetupFailed(err.to_string()))?;
				self.rx_stream = Some(stream);
			}
			Direction::Tx => {
				let stream = self
					.handle
					.tx_stream::<Complex32>(&[0])
					.map_err(|err| RadioError::StreamSetupFailed(err.to_string()))?;
				self.tx_stream = Some(stream);
			}
		}
		Ok(())
	}

	fn activate_stream(&mut self, direction: Direction) -> Result<(), RadioError> {
		match direction {
			Direction::Rx => self
				.rx_stream
				.as_mut()
				.ok_or_else(|| RadioError::StreamFatal("rx stream not set up".to_string()))?
				.activate(None)
				.map_err(|err| RadioError::StreamFatal(err.to_string())),
			Direction::Tx => self
				.tx_stream
				.as_mut()
				.ok_or_else(|| RadioError::StreamFatal("tx stream not set up".to_string()))?
				.activate(None)
				.map_err(|err| RadioError::StreamFatal(err.to_string())),
		}
	}

	fn deactivate_stream(&mut self, direction: Direction) -> Result<(), RadioError> {
		match direction {
			Direction::Rx => self
				.rx_stream
				.as_mut()
				.ok_or_else(|| RadioError::StreamFatal("rx stream not set up".to_string()))?
				.deactivate(None)
				.map_err(|err| RadioError::StreamFatal(err.to_string())),
			Direction::Tx => self
				.tx_stream
				.as_mut()
				.ok_or_else(|| RadioError::StreamFatal("tx stream not set up".to_string()))?
				.deactivate(None)
				.map_err(|err| RadioError::StreamFatal(err.to_string())),
		}
	}

	fn close_stream(&mut self, direction: Direction) -> Result<(), RadioError> {
		match direction {
			Direction::Rx => self.rx_stream = None,
			Direction::Tx => self.tx_stream = None,
		}
		Ok(())
	}

	fn read_stream(&mut self, buf: &mut [Complex32], timeout_us: i64) -> Result<usize, RadioError> {
		let stream = self
			.rx_stream
			.as_mut()
			.ok_or_else(|| RadioError::StreamFatal("rx stream not set up".to_string()))?;

		match stream.read(&mut [buf], timeout_us) {
			Ok(n) => Ok(n),
			Err(err) => Err(RadioError::Transient(err.to_string())),
		}
	}

	fn write_stream(&mut self, buf: &[Complex32], timeout_us: i64) -> Result<usize, RadioError> {
		let stream = self
			.tx_stream
			.as_mut()
			.ok_or_else(|| RadioError::StreamFatal("tx stream not set up".to_string()))?;

		stream
			.write(&[buf], None, false, timeout_us)
			.map_err(|err| RadioError::StreamFatal(err.to_string()))
	}
}
