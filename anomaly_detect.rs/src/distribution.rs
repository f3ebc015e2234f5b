const EPSILON: f64 = 1e-18;
const LAMBDA_STEP: f64 = 1e-4;

/// Fitted skewed-Cauchy parameters: location, scale, skew.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionParams {
	pub x0: f64,
	pub sigma: f64,
	pub lambda: f64,
}

/// Three-way sign, `0` inside `[-EPSILON, EPSILON]`.
///
/// The original this system was ported from special-cased the epsilon band
/// incorrectly (`r < epsilon` instead of `r < -epsilon`), so `sgn(0)` came
/// out `-1`. This crate's pdf/cdf formulas assume `sgn(0) = 0` — the
/// testable property `cdf(x0) - (1-lambda)/2 == 0` only holds under the
/// corrected three-way form, so that's what's implemented here.
#[must_use]
pub fn sgn(r: f64) -> f64 {
	if r > EPSILON {
		1.0
	} else if r < -EPSILON {
		-1.0
	} else {
		0.0
	}
}

#[must_use]
pub fn pdf(x: f64, x0: f64, sigma: f64, lambda: f64) -> f64 {
	let r = x - x0;
	let beta = sigma * (1.0 + lambda * sgn(r));
	1.0 / (std::f64::consts::PI * sigma * (1.0 + (r * r) / (beta * beta)))
}

#[must_use]
pub fn cdf(x: f64, x0: f64, sigma: f64, lambda: f64) -> f64 {
	let r = x - x0;
	let s = sgn(r);
	(1.0 - lambda) / 2.0
		+ ((1.0 + s * lambda) / std::f64::consts::PI) * (r / (sigma * (1.0 + s * lambda))).atan()
}

/// Negative log-likelihood of `samples` under `(x0, sigma, lambda)`.
/// `+inf` if any sample's pdf is non-positive or non-finite.
#[must_use]
fn nll(samples: &[f64], x0: f64, sigma: f64, lambda: f64) -> f64 {
	let mut total = 0.0;
	for &y in samples {
		let p = pdf(y, x0, sigma, lambda);
		if p <= 0.0 || !p.is_finite() {
			return f64::INFINITY;
		}
		total -= p.ln();
	}
	total
}

/// Brute-force search over `lambda` in `[-1, 1 - LAMBDA_STEP]`, step
/// `LAMBDA_STEP`, minimizing the negative log-likelihood of `samples`
/// under `(x0, sigma, lambda)`. Ties go to the smaller lambda.
///
/// Returns `None` if `sigma == 0.` (degenerate IQR — the distribution is
/// ill-defined, so the caller should treat the detector as not-yet-calibrated)
/// or if every candidate lambda yields an infinite NLL.
#[must_use]
pub fn fit_lambda(samples: &[f64], x0: f64, sigma: f64) -> Option<f64> {
	if sigma == 0.0 {
		return None;
	}

	let mut best_lambda = None;
	let mut best_nll = f64::INFINITY;

	let mut lambda = -1.0;
	while lambda <= 1.0 - LAMBDA_STEP + LAMBDA_STEP / 2.0 {
		let candidate_nll = nll(samples, x0, sigma, lambda);
		if candidate_nll < best_nll {
			best_nll = candidate_nll;
			best_lambda = Some(lambda);
		}
		lambda += LAMBDA_STEP;
	}

	best_lambda
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sgn_zero_is_zero() {
		assert_eq!(sgn(0.0), 0.0);
		assert_eq!(sgn(1.0), 1.0);
		assert_eq!(sgn(-1.0), -1.0);
		assert_eq!(sgn(1e-19), 0.0);
		assert_eq!(sgn(-1e-19), 0.0);
	}

	#[test]
	fn test_cdf_at_x0_is_half_minus_lambda_half() {
		for lambda_milli in -999..1000 {
			let lambda = f64::from(lambda_milli) / 1000.0;
			let value = cdf(5.0, 5.0, 2.0, lambda) - (1.0 - lambda) / 2.0;
			assert!(value.abs() < 1e-12, "lambda={lambda} value={value}");
		}
	}

	#[test]
	fn test_pdf_integrates_to_one() {
		for &lambda in &[-0.5, 0.0, 0.5] {
			let sigma = 1.0;
			let x0 = 0.0;
			let step = 0.01;
			let mut total = 0.0;
			let mut x = -500.0;
			while x < 500.0 {
				total += pdf(x, x0, sigma, lambda) * step;
				x += step;
			}
			assert!((total - 1.0).abs() < 1e-3, "lambda={lambda} total={total}");
		}
	}

	#[test]
	fn test_fit_lambda_symmetric_history_near_zero() {
		let samples: Vec<f64> = (-50..=50).map(f64::from).collect();
		let lambda = fit_lambda(&samples, 0.0, 10.0).unwrap();
		assert!(lambda.abs() < 1e-6 + LAMBDA_STEP);
	}

	#[test]
	fn test_fit_lambda_degenerate_sigma_is_none() {
		assert_eq!(fit_lambda(&[1.0, 2.0, 3.0], 1.0, 0.0), None);
	}
}
