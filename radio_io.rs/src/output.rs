use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::RadioError;

/// Writes `contents` to `path` via the write-tmp-then-rename discipline
/// spec.md §5/§6 requires of every output artifact: a torn read by an
/// external consumer (e.g. the visualization tooling) must never be
/// possible. `std::fs::rename` is atomic within a directory on POSIX.
///
/// Mirrors `PowerSpectralDensity.cpp::toFile`'s `<name>.tmp` + `rename`
/// pair, generalized to any of the three output files.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), RadioError> {
	let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
	let map_err = |source: std::io::Error| RadioError::OutputWrite {
		path: path.display().to_string(),
		source: Arc::new(source),
	};

	let mut file = fs::File::create(&tmp_path).map_err(map_err)?;
	file.write_all(contents.as_bytes()).map_err(map_err)?;
	file.sync_all().map_err(map_err)?;
	drop(file);

	fs::rename(&tmp_path, path).map_err(map_err)
}

/// `psd_output.txt`: cf, bw, N, then N comma-separated dB bins (trailing
/// comma, per spec.md §6).
pub fn write_psd_output(
	path: &Path,
	center_frequency_hz: f64,
	bandwidth_hz: f64,
	bins: &[f32],
) -> Result<(), RadioError> {
	let mut contents = format!("{center_frequency_hz}\n{bandwidth_hz}\n{}\n", bins.len());
	for bin in bins {
		contents.push_str(&bin.to_string());
		contents.push(',');
	}
	write_atomic(path, &contents)
}

/// `avg_power_output.txt`: cf, bw, count=1, then the single average-power
/// value followed by a trailing comma.
pub fn write_avg_power_output(
	path: &Path,
	center_frequency_hz: f64,
	bandwidth_hz: f64,
	avg_power: f64,
) -> Result<(), RadioError> {
	let contents = format!("{center_frequency_hz}\n{bandwidth_hz}\n1\n{avg_power},");
	write_atomic(path, &contents)
}

/// `cauchy_dist.txt`: `x0`, `sigma`, `lambda`, one per line. Emitted on
/// every `process_distribution()` call (spec.md §6 — recovered from the
/// original's unused `AnomalyDetection::toFile`, not a spec invention).
pub fn write_cauchy_dist(path: &Path, x0: f64, sigma: f64, lambda: f64) -> Result<(), RadioError> {
	let contents = format!("{x0}\n{sigma}\n{lambda}\n");
	write_atomic(path, &contents)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_write_atomic_replaces_existing_file() {
		let dir = std::env::temp_dir().join(format!(
			"radio_io_test_{:?}",
			std::thread::current().id()
		));
		fs::create_dir_all(&dir).unwrap();
		let path = dir.join("out.txt");

		write_atomic(&path, "first").unwrap();
		assert_eq!(fs::read_to_string(&path).unwrap(), "first");

		write_atomic(&path, "second").unwrap();
		assert_eq!(fs::read_to_string(&path).unwrap(), "second");

		assert!(!PathBuf::from(format!("{}.tmp", path.display())).exists());

		fs::remove_dir_all(&dir).unwrap();
	}

	#[test]
	fn test_write_psd_output_format() {
		let dir = std::env::temp_dir().join(format!(
			"radio_io_test_psd_{:?}",
			std::thread::current().id()
		));
		fs::create_dir_all(&dir).unwrap();
		let path = dir.join("psd_output.txt");

		write_psd_output(&path, 100.0e6, 1.0e6, &[1.0, 2.0, 3.0]).unwrap();
		let contents = fs::read_to_string(&path).unwrap();
		let mut lines = contents.lines();
		assert_eq!(lines.next().unwrap(), "100000000");
		assert_eq!(lines.next().unwrap(), "1000000");
		assert_eq!(lines.next().unwrap(), "3");
		assert_eq!(lines.next().unwrap(), "1,2,3,");

		fs::remove_dir_all(&dir).unwrap();
	}

	#[test]
	fn test_write_avg_power_output_format() {
		let dir = std::env::temp_dir().join(format!(
			"radio_io_test_avg_{:?}",
			std::thread::current().id()
		));
		fs::create_dir_all(&dir).unwrap();
		let path = dir.join("avg_power_output.txt");

		write_avg_power_output(&path, 100.0e6, 1.0e6, 6.25).unwrap();
		let contents = fs::read_to_string(&path).unwrap();
		let mut lines = contents.lines();
		assert_eq!(lines.next().unwrap(), "100000000");
		assert_eq!(lines.next().unwrap(), "1000000");
		assert_eq!(lines.next().unwrap(), "1");
		assert_eq!(lines.next().unwrap(), "6.25,");

		fs::remove_dir_all(&dir).unwrap();
	}

	#[test]
	fn test_write_cauchy_dist_format() {
		let dir = std::env::temp_dir().join(format!(
			"radio_io_test_cauchy_{:?}",
			std::thread::current().id()
		));
		fs::create_dir_all(&dir).unwrap();
		let path = dir.join("cauchy_dist.txt");

		write_cauchy_dist(&path, 1.0, 2.0, 0.5).unwrap();
		let contents = fs::read_to_string(&path).unwrap();
		let mut lines = contents.lines();
		assert_eq!(lines.next().unwrap(), "1");
		assert_eq!(lines.next().unwrap(), "2");
		assert_eq!(lines.next().unwrap(), "0.5");

		fs::remove_dir_all(&dir).unwrap();
	}
}
