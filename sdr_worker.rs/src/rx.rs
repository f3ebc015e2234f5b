use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};

use anomaly_detect::AnomalyDetector;
use dsp_analysis::FftEngine;
use mutex_ext::LockExt;
use radio_io::{
	write_avg_power_output, write_cauchy_dist, write_psd_output, Direction, RadioError, SdrDevice,
	SAMPLE_RATE_UNSET,
};
use resource_daemon::{DaemonState, QuitSignal, ResourceDaemon};
use round_robin::{RoundRobin, RoundRobinKey};
use rustfft::num_complex::Complex32;

use crate::error::WorkerError;

const COLLECT_INTERVAL: Duration = Duration::from_millis(10);
const RECOMPUTE_INTERVAL: Duration = Duration::from_secs(10);
const CALIBRATION_THROTTLE: Duration = Duration::from_millis(20);
const CONSECUTIVE_COUNT: u32 = 10;
/// Exactly enough iterations for the hysteresis to complete a full flip
/// before the round-robin cursor is allowed to advance (spec.md §4.5).
const DWELL_ITERATIONS: u32 = CONSECUTIVE_COUNT + 1;
const READ_TIMEOUT_US: i64 = 100_000;

/// `(frequency, bandwidth, fft_engine, detector, anomalous_flag)` per
/// spec.md §3. The `anomalous_edge` flag is the per-config home of what
/// the original kept as a worker-frame local (`high`) — per spec.md §9's
/// "global hot loops with edge variables" design note, it must survive
/// cursor rotation, so it lives here instead.
pub struct PerFrequencyConfig {
	pub frequency_hz: f64,
	pub bandwidth_hz: f64,
	fft_engine: FftEngine,
	detector: AnomalyDetector,
	anomalous_edge: bool,
}

impl PerFrequencyConfig {
	/// # Errors
	/// [`WorkerError::Dsp`] if `bandwidth_hz` maps to an invalid FFT size.
	pub fn new(frequency_hz: f64, bandwidth_hz: f64) -> Result<Self, WorkerError> {
		Ok(Self {
			frequency_hz,
			bandwidth_hz,
			fft_engine: FftEngine::new(bandwidth_hz)?,
			detector: AnomalyDetector::new(),
			anomalous_edge: false,
		})
	}
}

impl RoundRobinKey for PerFrequencyConfig {
	fn round_robin_key(&self) -> f64 {
		self.frequency_hz
	}
}

/// A point-in-time snapshot of the RX worker's state, published behind a
/// `Mutex` (via [`mutex_ext::LockExt`]) for external inspection without a
/// dedicated channel type — the same pattern the teacher uses to expose a
/// recorder/player's live state to its own callers.
#[derive(Debug, Clone, Default)]
pub struct RxDiagnostics {
	pub current_frequency_hz: f64,
	pub anomalous: Vec<(f64, bool)>,
}

#[derive(Debug, Clone)]
pub struct RxWorkerConfig {
	pub driver: String,
	/// `(frequency_hz, bandwidth_hz)` pairs. One entry means plain RX;
	/// more than one means round-robin across the set.
	pub frequencies: Vec<(f64, f64)>,
	pub gain_db: f64,
	pub alpha: f64,
	pub output_dir: PathBuf,
}

pub struct RxWorkerHandle {
	daemon: ResourceDaemon<(), WorkerError>,
	diagnostics: Arc<Mutex<RxDiagnostics>>,
}

impl RxWorkerHandle {
	/// Spawns the RX worker thread and opens the device.
	///
	/// # Errors
	/// [`WorkerError::NoFrequencies`] if `config.frequencies` is empty.
	pub fn start(config: RxWorkerConfig) -> Result<Self, WorkerError> {
		if config.frequencies.is_empty() {
			return Err(WorkerError::NoFrequencies);
		}

		let diagnostics = Arc::new(Mutex::new(RxDiagnostics::default()));
		let daemon = ResourceDaemon::new({
			let diagnostics = diagnostics.clone();
			move |quit_signal| run(config, &diagnostics, &quit_signal)
		});

		Ok(Self { daemon, diagnostics })
	}

	#[must_use]
	pub fn diagnostics(&self) -> RxDiagnostics {
		self.diagnostics
			.with_lock(Clone::clone)
			.unwrap_or_default()
	}

	#[must_use]
	pub fn state(&self) -> DaemonState<WorkerError> {
		self.daemon.state()
	}

	pub fn stop(&mut self) {
		self.daemon.quit(WorkerError::Cancelled);
	}
}

fn run(
	config: RxWorkerConfig,
	diagnostics: &Arc<Mutex<RxDiagnostics>>,
	quit_signal: &QuitSignal<WorkerError>,
) -> Result<(), WorkerError> {
	let mut device = radio_io::SoapyDevice::open(&config.driver)?;
	run_with_device(&mut device, config, diagnostics, quit_signal)
}

/// Split out from [`run`] so tests can drive the dwell loop against
/// [`radio_io::MockDevice`] instead of real hardware (spec.md §8 scenario
/// 6).
fn run_with_device(
	device: &mut dyn SdrDevice,
	config: RxWorkerConfig,
	diagnostics: &Arc<Mutex<RxDiagnostics>>,
	quit_signal: &QuitSignal<WorkerError>,
) -> Result<(), WorkerError> {
	let mut round_robin: RoundRobin<PerFrequencyConfig> = RoundRobin::new();
	for &(frequency_hz, bandwidth_hz) in &config.frequencies {
		round_robin.emplace(PerFrequencyConfig::new(frequency_hz, bandwidth_hz)?);
	}

	let first = round_robin.current().expect("checked non-empty above");
	let actual = device.configure(
		Direction::Rx,
		first.frequency_hz,
		first.bandwidth_hz,
		SAMPLE_RATE_UNSET,
		config.gain_db,
	)?;
	let mut sample_rate_hz = actual.sample_rate_hz;

	device.setup_stream(Direction::Rx)?;
	device.activate_stream(Direction::Rx)?;

	let result = dwell_loop(
		device,
		&mut round_robin,
		&config,
		diagnostics,
		quit_signal,
		&mut sample_rate_hz,
	);

	// Released on every exit path, including the error path (spec.md §9's
	// "try/finally-style guarantee").
	let _ = device.deactivate_stream(Direction::Rx);
	let _ = device.close_stream(Direction::Rx);

	result
}

#[allow(clippy::too_many_lines)]
fn dwell_loop(
	device: &mut dyn SdrDevice,
	round_robin: &mut RoundRobin<PerFrequencyConfig>,
	config: &RxWorkerConfig,
	diagnostics: &Arc<Mutex<RxDiagnostics>>,
	quit_signal: &QuitSignal<WorkerError>,
	sample_rate_hz: &mut f64,
) -> Result<(), WorkerError> {
	let mut fft_size = round_robin.current().expect("non-empty").fft_size();
	let mut input = vec![Complex32::default(); fft_size];
	let mut output = vec![Complex32::default(); fft_size];
	let mut psd_bins = vec![0f32; fft_size];

	let psd_path = config.output_dir.join("psd_output.txt");
	let avg_power_path = config.output_dir.join("avg_power_output.txt");
	let cauchy_path = config.output_dir.join("cauchy_dist.txt");

	while !quit_signal.should_quit() {
		let frequency_hz = round_robin.current().expect("non-empty").frequency_hz;
		let bandwidth_hz = round_robin.current().expect("non-empty").bandwidth_hz;

		// [Uncalibrated] -> [Calibrating]: keep reading and pushing
		// samples at the current frequency until the history overflows,
		// then fit the initial distribution once.
		while !round_robin.current().expect("non-empty").detector.ready() {
			if quit_signal.should_quit() {
				return Ok(());
			}

			match device.read_stream(&mut input, READ_TIMEOUT_US) {
				Err(RadioError::Transient(reason)) => {
					tracing::warn!(%frequency_hz, %reason, "transient read error during calibration, skipping slice");
					continue;
				}
				Err(err) => return Err(err.into()),
				Ok(_) => {}
			}

			let cfg = round_robin.current_mut().expect("non-empty");
			cfg.fft_engine.execute(&mut input, &mut output);
			let avg_power = FftEngine::average_power(&output);
			cfg.detector.push_sample(avg_power);

			tracing::debug!(%frequency_hz, "Calibrating initial distribution...");
			sleep(CALIBRATION_THROTTLE);
		}

		// A degenerate fit (sigma == 0) leaves `params()` at `None`; per
		// spec.md §4.3 that means the detector stays uncalibrated, so keep
		// pulling samples and retrying the fit rather than falling into
		// [Detecting] with no distribution to test against.
		while round_robin
			.current()
			.expect("non-empty")
			.detector
			.params()
			.is_none()
		{
			if quit_signal.should_quit() {
				return Ok(());
			}

			let cfg = round_robin.current_mut().expect("non-empty");
			cfg.detector.process_distribution();
			if let Some(params) = cfg.detector.params() {
				let _ = write_cauchy_dist(&cauchy_path, params.x0, params.sigma, params.lambda);
				tracing::info!(%frequency_hz, "Calibrating initial distribution completed");
				break;
			}
			tracing::warn!(%frequency_hz, "distribution fit degenerate, continuing calibration");

			match device.read_stream(&mut input, READ_TIMEOUT_US) {
				Err(RadioError::Transient(reason)) => {
					tracing::warn!(%frequency_hz, %reason, "transient read error during calibration, skipping slice");
					continue;
				}
				Err(err) => return Err(err.into()),
				Ok(_) => {}
			}

			let cfg = round_robin.current_mut().expect("non-empty");
			cfg.fft_engine.execute(&mut input, &mut output);
			let avg_power = FftEngine::average_power(&output);
			cfg.detector.push_sample(avg_power);
			sleep(CALIBRATION_THROTTLE);
		}

		let mut last_sample_collected = Instant::now();
		let mut last_distribution_processed = Instant::now();

		// [Detecting]: dwell for up to DWELL_ITERATIONS reads — exactly
		// enough for the hysteresis counters to complete a full flip —
		// before the round-robin cursor is allowed to advance.
		for _ in 0..DWELL_ITERATIONS {
			if quit_signal.should_quit() {
				return Ok(());
			}

			match device.read_stream(&mut input, READ_TIMEOUT_US) {
				Err(RadioError::Transient(reason)) => {
					tracing::warn!(%frequency_hz, %reason, "transient read error, skipping slice");
					continue;
				}
				Err(err) => return Err(err.into()),
				Ok(_) => {}
			}

			let cfg = round_robin.current_mut().expect("non-empty");
			cfg.fft_engine.execute(&mut input, &mut output);
			let avg_power = FftEngine::average_power(&output);
			let is_anom = cfg.detector.is_anomaly(avg_power, config.alpha);

			if is_anom {
				if !cfg.anomalous_edge {
					cfg.anomalous_edge = true;
					tracing::info!("🔵 Anomaly Detected @ {frequency_hz}");
				}
			} else {
				if cfg.anomalous_edge {
					cfg.anomalous_edge = false;
					tracing::info!("🔴 Anomaly Ended @ {frequency_hz}");
				}

				let now = Instant::now();
				if now.duration_since(last_sample_collected) >= COLLECT_INTERVAL {
					cfg.detector.push_sample(avg_power);
					last_sample_collected = now;
				}
				if now.duration_since(last_distribution_processed) >= RECOMPUTE_INTERVAL {
					cfg.detector.process_distribution();
					last_distribution_processed = now;
					if let Some(params) = cfg.detector.params() {
						let _ =
							write_cauchy_dist(&cauchy_path, params.x0, params.sigma, params.lambda);
					}
				}
			}

			let anomalous_edge = cfg.anomalous_edge;

			let _ = write_avg_power_output(&avg_power_path, frequency_hz, bandwidth_hz, avg_power);
			FftEngine::real_psd(&output, *sample_rate_hz, &mut psd_bins);
			let _ = write_psd_output(&psd_path, frequency_hz, bandwidth_hz, &psd_bins);

			let _ = diagnostics.with_lock_mut(|d| {
				d.current_frequency_hz = frequency_hz;
				if let Some(entry) = d.anomalous.iter_mut().find(|(f, _)| *f == frequency_hz) {
					entry.1 = anomalous_edge;
				} else {
					d.anomalous.push((frequency_hz, anomalous_edge));
				}
			});
		}

		if round_robin.len() > 1 {
			round_robin.advance();
			let new_cfg = round_robin.current().expect("non-empty");
			let new_frequency_hz = new_cfg.frequency_hz;
			let new_bandwidth_hz = new_cfg.bandwidth_hz;
			let new_fft_size = new_cfg.fft_size();

			if (new_frequency_hz - frequency_hz).abs() > f64::EPSILON {
				let actual = device.configure(
					Direction::Rx,
					new_frequency_hz,
					new_bandwidth_hz,
					SAMPLE_RATE_UNSET,
					config.gain_db,
				)?;
				*sample_rate_hz = actual.sample_rate_hz;

				if new_fft_size != fft_size {
					fft_size = new_fft_size;
					input = vec![Complex32::default(); fft_size];
					output = vec![Complex32::default(); fft_size];
					psd_bins = vec![0f32; fft_size];
				}
			}
		}
	}

	Ok(())
}

impl PerFrequencyConfig {
	fn fft_size(&self) -> usize {
		self.fft_engine.fft_size()
	}

	/// Calibrates directly from a given sample set, bypassing the
	/// throttled device-read loop. Exists so tests can reach a ready,
	/// fitted detector without waiting out `CALIBRATION_THROTTLE` `MAX_SIZE`
	/// times over.
	#[cfg(test)]
	fn calibrate_from(&mut self, samples: &[f64]) {
		for &y in samples {
			self.detector.push_sample(y);
		}
		self.detector.process_distribution();
	}

	/// Feeds one average-power observation through the hysteresis edge
	/// tracker, exactly as the dwell loop's `[Detecting]` branch does,
	/// without needing a device or round-robin list. Returns the updated
	/// `anomalous_edge`.
	#[cfg(test)]
	fn observe(&mut self, avg_power: f64, alpha: f64) -> bool {
		let is_anom = self.detector.is_anomaly(avg_power, alpha);
		if is_anom {
			self.anomalous_edge = true;
		} else {
			self.anomalous_edge = false;
		}
		self.anomalous_edge
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use radio_io::MockDevice;
	use resource_daemon::ResourceDaemon;

	use super::*;

	/// spec.md §8 scenario 6 at the `PerFrequencyConfig` granularity: three
	/// independently calibrated configs, a tone only one of them would
	/// ever see pushed through `observe`. Only that one's `anomalous_edge`
	/// should flip true; the other two stay false even after the same
	/// number of observations.
	#[test]
	fn test_round_robin_flags_only_the_anomalous_frequency() {
		let quiet_history: Vec<f64> = (0..300).map(|i| f64::from(i % 7)).collect();

		let mut quiet_a = PerFrequencyConfig::new(10.0e6, 1.0e6).unwrap();
		quiet_a.calibrate_from(&quiet_history);
		let mut loud = PerFrequencyConfig::new(20.0e6, 1.0e6).unwrap();
		loud.calibrate_from(&quiet_history);
		let mut quiet_b = PerFrequencyConfig::new(30.0e6, 1.0e6).unwrap();
		quiet_b.calibrate_from(&quiet_history);

		assert!(quiet_a.detector.params().is_some());
		assert!(loud.detector.params().is_some());
		assert!(quiet_b.detector.params().is_some());

		let far_right = loud.detector.params().unwrap().x0 + 1.0e6;
		let at_median_a = quiet_a.detector.params().unwrap().x0;
		let at_median_b = quiet_b.detector.params().unwrap().x0;

		for _ in 0..10 {
			quiet_a.observe(at_median_a, 1e-8);
			loud.observe(far_right, 1e-8);
			quiet_b.observe(at_median_b, 1e-8);
		}

		assert!(!quiet_a.anomalous_edge);
		assert!(loud.anomalous_edge);
		assert!(!quiet_b.anomalous_edge);
	}

	// `run_with_device` takes a real `resource_daemon::QuitSignal`, which
	// can only be constructed by `ResourceDaemon` itself; exercise the
	// round-robin/device-reconfiguration/file-write plumbing by actually
	// running it, bounded by wall clock rather than by reaching
	// `detector.ready()` (MAX_SIZE=256 samples at a 20ms throttle would
	// make this test far too slow).
	#[test]
	fn test_dwell_loop_stops_cleanly_via_resource_daemon() {
		let dir = std::env::temp_dir().join(format!(
			"sdr_worker_test_{:?}",
			std::thread::current().id()
		));
		std::fs::create_dir_all(&dir).unwrap();

		let config = RxWorkerConfig {
			driver: "mock".to_string(),
			frequencies: vec![(10.0e6, 1.0e6), (20.0e6, 1.0e6)],
			gain_db: 0.0,
			alpha: 1e-8,
			output_dir: dir.clone(),
		};

		let mut daemon: ResourceDaemon<(), WorkerError> = ResourceDaemon::new(move |quit_signal| {
			let mut device = MockDevice::new(Some(20.0e6));
			let diagnostics = Arc::new(Mutex::new(RxDiagnostics::default()));
			run_with_device(&mut device, config, &diagnostics, &quit_signal)
		});

		std::thread::sleep(Duration::from_millis(100));
		daemon.quit(WorkerError::Cancelled);

		std::fs::remove_dir_all(&dir).ok();
	}
}
