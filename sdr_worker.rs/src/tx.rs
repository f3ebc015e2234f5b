use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use rand::Rng;
use radio_io::{Direction, RadioError, SdrDevice};
use resource_daemon::{DaemonState, QuitSignal, ResourceDaemon};
use rustfft::num_complex::Complex32;

use crate::error::WorkerError;

const TX_BUFFER_SIZE: usize = 2048;
const TX_DWELL: Duration = Duration::from_millis(20);
const IDLE_POLL: Duration = Duration::from_millis(100);
const TX_BANDWIDTH_HZ: f64 = 10.0e6;
const TX_GAIN_DB: f64 = 64.0;
const TX_SAMPLE_RATE_HZ: f64 = 30.0e6;
const TX_BASEBAND_FREQUENCY_HZ: f64 = 0.0;
const WRITE_TIMEOUT_US: i64 = 100_000;

#[derive(Debug, Clone)]
pub struct TxWorkerConfig {
	pub driver: String,
	/// `>= 1` hop frequencies, in Hz.
	pub frequencies: Vec<f64>,
}

/// Shared flag flipped by the keyboard listener thread and read by the TX
/// worker; the only cross-thread mutable data the TX/listener pair needs,
/// per spec.md §9's "two atomics, no stronger ordering" note.
#[derive(Debug, Clone)]
pub struct TriggerTx(Arc<AtomicBool>);

impl TriggerTx {
	#[must_use]
	pub fn new() -> Self {
		Self(Arc::new(AtomicBool::new(false)))
	}

	#[must_use]
	pub fn is_set(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}

	pub fn toggle(&self) -> bool {
		let previous = self.0.fetch_xor(true, Ordering::SeqCst);
		!previous
	}
}

impl Default for TriggerTx {
	fn default() -> Self {
		Self::new()
	}
}

pub struct TxWorkerHandle {
	daemon: ResourceDaemon<(), WorkerError>,
	trigger: TriggerTx,
}

impl TxWorkerHandle {
	/// Spawns the TX worker thread and opens the device. `trigger` is
	/// shared with the caller's keyboard listener.
	///
	/// # Errors
	/// [`WorkerError::NoFrequencies`] if `config.frequencies` is empty.
	pub fn start(config: TxWorkerConfig, trigger: TriggerTx) -> Result<Self, WorkerError> {
		if config.frequencies.is_empty() {
			return Err(WorkerError::NoFrequencies);
		}

		let daemon = {
			let trigger = trigger.clone();
			ResourceDaemon::new(move |quit_signal| run(&config, &trigger, &quit_signal))
		};

		Ok(Self { daemon, trigger })
	}

	#[must_use]
	pub fn trigger(&self) -> &TriggerTx {
		&self.trigger
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
	config: &TxWorkerConfig,
	trigger: &TriggerTx,
	quit_signal: &QuitSignal<WorkerError>,
) -> Result<(), WorkerError> {
	let mut device = radio_io::SoapyDevice::open(&config.driver)?;
	run_with_device(&mut device, config, trigger, quit_signal)
}

/// Split out from [`run`] so tests can drive the hop loop against
/// [`radio_io::MockDevice`] instead of real hardware.
fn run_with_device(
	device: &mut dyn SdrDevice,
	config: &TxWorkerConfig,
	trigger: &TriggerTx,
	quit_signal: &QuitSignal<WorkerError>,
) -> Result<(), WorkerError> {
	device.configure(
		Direction::Tx,
		TX_BASEBAND_FREQUENCY_HZ,
		TX_BANDWIDTH_HZ,
		TX_SAMPLE_RATE_HZ,
		TX_GAIN_DB,
	)?;
	device.setup_stream(Direction::Tx)?;
	device.activate_stream(Direction::Tx)?;
	tracing::info!("TX stream activated, waiting for trigger...");

	let result = hop_loop(device, config, trigger, quit_signal);

	let _ = device.deactivate_stream(Direction::Tx);
	let _ = device.close_stream(Direction::Tx);

	result
}

/// Uniformly picks a hop index different from `current`, per spec.md
/// §4.6 (`{0..|F|} \ {current}`). Skips entirely when there's only one
/// frequency to hop to.
fn next_hop_index(rng: &mut impl Rng, current: usize, len: usize) -> usize {
	if len <= 1 {
		return current;
	}
	let candidate = rng.gen_range(0..len - 1);
	if candidate >= current {
		candidate + 1
	} else {
		candidate
	}
}

fn generate_tone(cw_hz: f64, sample_rate_hz: f64, buf: &mut [Complex32]) {
	let phase_step = TAU * cw_hz / sample_rate_hz;
	let mut phase = 0.0;
	for sample in buf.iter_mut() {
		*sample = Complex32::new(phase.cos() as f32, phase.sin() as f32);
		phase += phase_step;
		if phase > TAU {
			phase -= TAU;
		}
	}
}

fn hop_loop(
	device: &mut dyn SdrDevice,
	config: &TxWorkerConfig,
	trigger: &TriggerTx,
	quit_signal: &QuitSignal<WorkerError>,
) -> Result<(), WorkerError> {
	let mut rng = rand::thread_rng();
	let mut freq_index = 0usize;
	let mut buf = vec![Complex32::default(); TX_BUFFER_SIZE];
	generate_tone(config.frequencies[freq_index], TX_SAMPLE_RATE_HZ, &mut buf);

	while !quit_signal.should_quit() {
		if !trigger.is_set() {
			sleep(IDLE_POLL);
			continue;
		}

		let dwell_start = Instant::now();
		while !quit_signal.should_quit() && trigger.is_set() {
			match device.write_stream(&buf, WRITE_TIMEOUT_US) {
				Ok(_) => {}
				Err(RadioError::StreamFatal(reason) | RadioError::Transient(reason)) => {
					tracing::error!(%reason, "TX write error");
					return Err(RadioError::StreamFatal(reason).into());
				}
				Err(err) => return Err(err.into()),
			}

			if dwell_start.elapsed() >= TX_DWELL {
				break;
			}
		}

		if quit_signal.should_quit() {
			break;
		}

		// Only one frequency to hop to: `next_hop_index` would just
		// return `freq_index` unchanged, so skip the retune/regenerate/log
		// entirely per spec.md §4.6 ("skip when |F| = 1").
		if config.frequencies.len() > 1 {
			freq_index = next_hop_index(&mut rng, freq_index, config.frequencies.len());
			let hop_frequency_hz = config.frequencies[freq_index];
			device.configure(
				Direction::Tx,
				hop_frequency_hz,
				TX_BANDWIDTH_HZ,
				TX_SAMPLE_RATE_HZ,
				TX_GAIN_DB,
			)?;
			generate_tone(hop_frequency_hz, TX_SAMPLE_RATE_HZ, &mut buf);
			tracing::info!("Hopped to {hop_frequency_hz} Hz");
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use radio_io::MockDevice;

	use super::*;

	#[test]
	fn test_next_hop_index_never_repeats_current() {
		let mut rng = rand::thread_rng();
		for current in 0..4 {
			for _ in 0..50 {
				let next = next_hop_index(&mut rng, current, 4);
				assert_ne!(next, current);
				assert!(next < 4);
			}
		}
	}

	#[test]
	fn test_next_hop_index_skips_when_single_frequency() {
		let mut rng = rand::thread_rng();
		assert_eq!(next_hop_index(&mut rng, 0, 1), 0);
	}

	#[test]
	fn test_generate_tone_is_unit_amplitude() {
		let mut buf = vec![Complex32::default(); 16];
		generate_tone(1.0e6, 30.0e6, &mut buf);
		for sample in &buf {
			assert!((sample.norm() - 1.0).abs() < 1e-6);
		}
	}

	#[test]
	fn test_hop_loop_stops_cleanly_via_resource_daemon() {
		let config = TxWorkerConfig {
			driver: "mock".to_string(),
			frequencies: vec![100.0e6, 200.0e6],
		};
		let trigger = TriggerTx::new();

		let mut daemon: ResourceDaemon<(), WorkerError> = {
			let trigger = trigger.clone();
			ResourceDaemon::new(move |quit_signal| {
				let mut device = MockDevice::new(None);
				run_with_device(&mut device, &config, &trigger, &quit_signal)
			})
		};

		trigger.toggle();
		std::thread::sleep(Duration::from_millis(100));
		daemon.quit(WorkerError::Cancelled);
	}
}
