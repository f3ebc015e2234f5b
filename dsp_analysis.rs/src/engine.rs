use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::DspError;
use crate::util::fft_size_for_bandwidth;
use crate::windowing::{Hann2Window, WindowingFn};

/// Hann²-windowed forward FFT, bound to an FFT size derived from the
/// current bandwidth. Rebuilding the plan (`set_fft_size`) is the only way
/// the size changes; everything else assumes a fixed `N` for its lifetime.
pub struct FftEngine {
	fft_size: usize,
	windowing_fn: Hann2Window,
	fft_processor: Arc<dyn Fft<f32>>,
	scratch: Vec<Complex<f32>>,
}

impl FftEngine {
	/// # Errors
	/// - [`DspError::InvalidFftSize`] if `bandwidth_hz` maps to an N < 2.
	pub fn new(bandwidth_hz: f64) -> Result<Self, DspError> {
		let fft_size = fft_size_for_bandwidth(bandwidth_hz);
		if fft_size < 2 {
			return Err(DspError::InvalidFftSize(fft_size));
		}
		let mut planner = FftPlanner::new();
		let fft_processor = planner.plan_fft_forward(fft_size);
		let scratch = vec![Complex::default(); fft_processor.get_inplace_scratch_len()];
		Ok(Self {
			fft_size,
			windowing_fn: Hann2Window::new(),
			fft_processor,
			scratch,
		})
	}

	/// Rebuilds the cached plan and scratch buffer for the FFT size derived
	/// from `bandwidth_hz`.
	///
	/// # Errors
	/// - [`DspError::InvalidFftSize`] if `bandwidth_hz` maps to an N < 2.
	pub fn set_fft_size(&mut self, bandwidth_hz: f64) -> Result<(), DspError> {
		let fft_size = fft_size_for_bandwidth(bandwidth_hz);
		if fft_size < 2 {
			return Err(DspError::InvalidFftSize(fft_size));
		}
		let mut planner = FftPlanner::new();
		self.fft_processor = planner.plan_fft_forward(fft_size);
		self.scratch = vec![Complex::default(); self.fft_processor.get_inplace_scratch_len()];
		self.fft_size = fft_size;
		Ok(())
	}

	#[must_use]
	pub fn fft_size(&self) -> usize {
		self.fft_size
	}

	/// Applies the Hann² window to `input` in place, then writes the
	/// forward DFT of the windowed signal into `output`.
	///
	/// # Panics
	/// - if `input` or `output` don't have length [`Self::fft_size`].
	pub fn execute(&mut self, input: &mut [Complex<f32>], output: &mut [Complex<f32>]) {
		assert_eq!(input.len(), self.fft_size, "input length must equal fft_size");
		assert_eq!(output.len(), self.fft_size, "output length must equal fft_size");

		for (i, c) in input.iter_mut().enumerate() {
			*c *= self.windowing_fn.ratio_at(i, self.fft_size);
		}

		output.copy_from_slice(input);
		self.fft_processor
			.process_with_scratch(output, &mut self.scratch);
	}

	/// `(Σ |X[k]|²) / N`.
	#[must_use]
	#[allow(clippy::cast_precision_loss)]
	pub fn average_power(spectrum: &[Complex<f32>]) -> f64 {
		let sum: f64 = spectrum.iter().map(|c| f64::from(c.norm_sqr())).sum();
		sum / spectrum.len() as f64
	}

	/// `P[k] = 10*log10(|X[k]|² / (N * sample_rate))`, FFT-shifted so DC
	/// lands at index `N/2`.
	///
	/// # Panics
	/// - if `spectrum` or `out` don't have length [`Self::fft_size`].
	#[allow(clippy::cast_precision_loss)]
	pub fn real_psd(spectrum: &[Complex<f32>], sample_rate: f64, out: &mut [f32]) {
		let n = spectrum.len();
		assert_eq!(out.len(), n, "out length must equal spectrum length");

		for (k, c) in spectrum.iter().enumerate() {
			let mag_sq = f64::from(c.norm_sqr());
			out[k] = (10.0 * (mag_sq / (n as f64 * sample_rate)).log10()) as f32;
		}

		out.rotate_left(n / 2);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_average_power() {
		let x = [
			Complex::new(3.0, 4.0),
			Complex::new(0.0, 0.0),
			Complex::new(0.0, 0.0),
			Complex::new(0.0, 0.0),
		];
		assert!((FftEngine::average_power(&x) - 6.25).abs() < 1e-9);
	}

	#[test]
	fn test_real_psd_fft_shift() {
		// A pure zero-frequency complex sinusoid has all its energy in bin
		// 0 before rotation; after the shift its (unique) peak must land
		// at N/2, exactly as spec.md scenario 3 describes for the
		// abstract rotation `[0..7] -> [4,5,6,7,0,1,2,3]`.
		let mut pure_dc = vec![Complex::new(0.0f32, 0.0); 8];
		pure_dc[0] = Complex::new(10.0, 0.0);
		let mut psd = vec![0.0f32; 8];
		FftEngine::real_psd(&pure_dc, 1.0, &mut psd);
		let (max_idx, _) = psd
			.iter()
			.enumerate()
			.max_by(|a, b| a.1.total_cmp(b.1))
			.unwrap();
		assert_eq!(max_idx, 4);
	}

	#[test]
	fn test_execute_applies_window_then_fft() {
		let mut engine = FftEngine::new(1.0e6).unwrap();
		assert_eq!(engine.fft_size(), 64);
		let mut input = vec![Complex::new(1.0f32, 0.0); 64];
		let mut output = vec![Complex::default(); 64];
		engine.execute(&mut input, &mut output);
		// the window zeros both endpoints in place
		assert!((input[0].re).abs() < 1e-5);
	}

	#[test]
	fn test_set_fft_size_doubles() {
		let mut engine = FftEngine::new(1.0e6).unwrap();
		assert_eq!(engine.fft_size(), 64);
		engine.set_fft_size(2.0e6).unwrap();
		assert_eq!(engine.fft_size(), 128);
	}
}
