use std::path::{Path, PathBuf};

use serde::Deserialize;

use sdr_worker::{RxWorkerConfig, TxWorkerConfig};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	Read {
		path: String,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse config file {path}: {source}")]
	Parse {
		path: String,
		#[source]
		source: toml::de::Error,
	},
	#[error("mode '{0:?}' requires at least one frequency")]
	NoFrequencies(Mode),
}

/// Mode selection is a configuration parameter, never a compile-time
/// switch or a separate `main` per frequency-band/direction combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
	/// Plain RX on a single frequency.
	Rx,
	/// RX cycling across `frequencies` via the round-robin scheduler.
	RxRoundRobin,
	/// CW tone hopper across `tx_frequencies`.
	Tx,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrequencyBand {
	pub frequency_hz: f64,
	pub bandwidth_hz: f64,
}

fn default_gain_db() -> f64 {
	0.0
}

fn default_alpha() -> f64 {
	sdr_worker::DEFAULT_ALPHA
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
	pub driver: String,
	pub mode: Mode,
	#[serde(default)]
	pub frequencies: Vec<FrequencyBand>,
	#[serde(default)]
	pub tx_frequencies_hz: Vec<f64>,
	#[serde(default = "default_gain_db")]
	pub gain_db: f64,
	#[serde(default = "default_alpha")]
	pub alpha: f64,
	#[serde(default)]
	pub output_dir: PathBuf,
}

impl MonitorConfig {
	/// # Errors
	/// [`ConfigError::Read`] / [`ConfigError::Parse`] on I/O or TOML
	/// failure — both startup-fatal, per spec.md §7 class 1.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.display().to_string(),
			source,
		})?;
		toml::from_str(&raw).map_err(|source| ConfigError::Parse {
			path: path.display().to_string(),
			source,
		})
	}

	/// # Errors
	/// [`ConfigError::NoFrequencies`] if `mode` is `Rx`/`RxRoundRobin` and
	/// `frequencies` is empty.
	pub fn rx_worker_config(&self) -> Result<RxWorkerConfig, ConfigError> {
		if self.frequencies.is_empty() {
			return Err(ConfigError::NoFrequencies(self.mode));
		}
		Ok(RxWorkerConfig {
			driver: self.driver.clone(),
			frequencies: self
				.frequencies
				.iter()
				.map(|band| (band.frequency_hz, band.bandwidth_hz))
				.collect(),
			gain_db: self.gain_db,
			alpha: self.alpha,
			output_dir: self.output_dir.clone(),
		})
	}

	/// # Errors
	/// [`ConfigError::NoFrequencies`] if `tx_frequencies_hz` is empty.
	pub fn tx_worker_config(&self) -> Result<TxWorkerConfig, ConfigError> {
		if self.tx_frequencies_hz.is_empty() {
			return Err(ConfigError::NoFrequencies(self.mode));
		}
		Ok(TxWorkerConfig {
			driver: self.driver.clone(),
			frequencies: self.tx_frequencies_hz.clone(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parses_round_robin_config() {
		let toml_str = r#"
			driver = "lime"
			mode = "rx-round-robin"
			gain_db = 20.0

			[[frequencies]]
			frequency_hz = 100.0e6
			bandwidth_hz = 1.0e6

			[[frequencies]]
			frequency_hz = 200.0e6
			bandwidth_hz = 1.0e6
		"#;
		let config: MonitorConfig = toml::from_str(toml_str).unwrap();
		assert_eq!(config.mode, Mode::RxRoundRobin);
		assert_eq!(config.frequencies.len(), 2);
		assert!((config.alpha - sdr_worker::DEFAULT_ALPHA).abs() < f64::EPSILON);

		let worker_config = config.rx_worker_config().unwrap();
		assert_eq!(worker_config.frequencies.len(), 2);
	}

	#[test]
	fn test_tx_config_without_frequencies_errors() {
		let config = MonitorConfig {
			driver: "lime".to_string(),
			mode: Mode::Tx,
			frequencies: Vec::new(),
			tx_frequencies_hz: Vec::new(),
			gain_db: 0.0,
			alpha: sdr_worker::DEFAULT_ALPHA,
			output_dir: PathBuf::new(),
		};
		assert!(matches!(
			config.tx_worker_config(),
			Err(ConfigError::NoFrequencies(Mode::Tx))
		));
	}
}
