use rustfft::num_complex::Complex32;

use crate::device::{ActualConfig, Direction, SdrDevice, SAMPLE_RATE_UNSET};
use crate::error::RadioError;

/// Deterministic synthetic I/Q generator backing [`SdrDevice`] in tests,
/// so the round-robin dwell scenario (spec.md §8 scenario 6) can be
/// exercised without real hardware. Mirrors how the teacher's own crates
/// are built against `cpal`'s trait objects rather than a live device in
/// unit tests.
///
/// Emits a low-amplitude deterministic pseudo-noise baseline at every
/// frequency, except `anomaly_frequency_hz` (if set and the device is
/// currently tuned to within 1 Hz of it), where it emits a
/// high-amplitude tone instead.
pub struct MockDevice {
	rx_frequency_hz: f64,
	rx_bandwidth_hz: f64,
	rx_sample_rate_hz: f64,
	rx_gain_db: f64,
	tx_frequency_hz: f64,
	tx_bandwidth_hz: f64,
	tx_sample_rate_hz: f64,
	tx_gain_db: f64,
	anomaly_frequency_hz: Option<f64>,
	baseline_amplitude: f32,
	anomaly_amplitude: f32,
	rng_state: u64,
}

impl MockDevice {
	#[must_use]
	pub fn new(anomaly_frequency_hz: Option<f64>) -> Self {
		Self {
			rx_frequency_hz: 0.0,
			rx_bandwidth_hz: 1.0e6,
			rx_sample_rate_hz: 1.0e6,
			rx_gain_db: 0.0,
			tx_frequency_hz: 0.0,
			tx_bandwidth_hz: 1.0e6,
			tx_sample_rate_hz: 1.0e6,
			tx_gain_db: 0.0,
			anomaly_frequency_hz,
			baseline_amplitude: 0.01,
			anomaly_amplitude: 50.0,
			rng_state: 0x9e3779b97f4a7c15,
		}
	}

	/// xorshift64*, enough entropy for deterministic test noise without
	/// pulling in a real `rand` distribution in non-test code.
	fn next_unit(&mut self) -> f32 {
		let mut x = self.rng_state;
		x ^= x << 13;
		x ^= x >> 7;
		x ^= x << 17;
		self.rng_state = x;
		((x >> 40) as f32 / (1u32 << 24) as f32) - 0.5
	}

	fn is_tuned_to_anomaly(&self) -> bool {
		self.anomaly_frequency_hz
			.is_some_and(|f| (f - self.rx_frequency_hz).abs() < 1.0)
	}
}

impl SdrDevice for MockDevice {
	fn configure(
		&mut self,
		direction: Direction,
		frequency_hz: f64,
		bandwidth_hz: f64,
		sample_rate_hz: f64,
		gain_db: f64,
	) -> Result<ActualConfig, RadioError> {
		let sample_rate_hz = if sample_rate_hz == SAMPLE_RATE_UNSET {
			bandwidth_hz
		} else {
			sample_rate_hz
		};
		match direction {
			Direction::Rx => {
				self.rx_frequency_hz = frequency_hz;
				self.rx_bandwidth_hz = bandwidth_hz;
				self.rx_sample_rate_hz = sample_rate_hz;
				self.rx_gain_db = gain_db;
			}
			Direction::Tx => {
				self.tx_frequency_hz = frequency_hz;
				self.tx_bandwidth_hz = bandwidth_hz;
				self.tx_sample_rate_hz = sample_rate_hz;
				self.tx_gain_db = gain_db;
			}
		}
		Ok(ActualConfig {
			frequency_hz,
			bandwidth_hz,
			sample_rate_hz,
			gain_db,
		})
	}

	fn setup_stream(&mut self, _direction: Direction) -> Result<(), RadioError> {
		Ok(())
	}

	fn activate_stream(&mut self, _direction: Direction) -> Result<(), RadioError> {
		Ok(())
	}

	fn deactivate_stream(&mut self, _direction: Direction) -> Result<(), RadioError> {
		Ok(())
	}

	fn close_stream(&mut self, _direction: Direction) -> Result<(), RadioError> {
		Ok(())
	}

	fn read_stream(&mut self, buf: &mut [Complex32], _timeout_us: i64) -> Result<usize, RadioError> {
		let amplitude = if self.is_tuned_to_anomaly() {
			self.anomaly_amplitude
		} else {
			self.baseline_amplitude
		};
		for sample in buf.iter_mut() {
			let i = amplitude * (1.0 + self.next_unit() * 0.1);
			let q = amplitude * self.next_unit() * 0.1;
			*sample = Complex32::new(i, q);
		}
		Ok(buf.len())
	}

	fn write_stream(&mut self, buf: &[Complex32], _timeout_us: i64) -> Result<usize, RadioError> {
		Ok(buf.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_baseline_amplitude_much_lower_than_anomaly() {
		let mut device = MockDevice::new(Some(100.0e6));
		device
			.configure(Direction::Rx, 50.0e6, 1.0e6, SAMPLE_RATE_UNSET, 0.0)
			.unwrap();
		let mut buf = vec![Complex32::default(); 64];
		device.read_stream(&mut buf, 0).unwrap();
		let baseline_power: f32 = buf.iter().map(Complex32::norm_sqr).sum::<f32>() / 64.0;

		device
			.configure(Direction::Rx, 100.0e6, 1.0e6, SAMPLE_RATE_UNSET, 0.0)
			.unwrap();
		device.read_stream(&mut buf, 0).unwrap();
		let anomaly_power: f32 = buf.iter().map(Complex32::norm_sqr).sum::<f32>() / 64.0;

		assert!(anomaly_power > baseline_power * 100.0);
	}
}
