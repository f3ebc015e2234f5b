mod config;

use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{Mode, MonitorConfig};
use sdr_worker::{InputListenerHandle, RxWorkerHandle, TriggerTx, TxWorkerHandle};

/// How often `run_tx` checks the keyboard listener for a `q`-requested
/// shutdown instead of sleeping the full `--duration` unconditionally.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(thiserror::Error, Debug)]
enum AppError {
	#[error(transparent)]
	Config(#[from] config::ConfigError),
	#[error(transparent)]
	Worker(#[from] sdr_worker::WorkerError),
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to the TOML monitor configuration.
	#[arg(short, long, default_value = "monitor.toml")]
	config: PathBuf,

	/// Overrides the `driver` key from the config file (e.g. "lime",
	/// "rtlsdr").
	#[arg(long)]
	driver: Option<String>,

	/// How long the supervisor runs before issuing `stop` to every worker,
	/// in seconds. Stands in for the out-of-scope process-bootstrap/lifetime
	/// manager.
	#[arg(long, default_value_t = 60)]
	duration: u64,

	/// Increases log verbosity (stacks: -v, -vv).
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,

	/// Decreases log verbosity to errors only.
	#[arg(short, long)]
	quiet: bool,
}

fn init_tracing(verbose: u8, quiet: bool) {
	let default_directive = if quiet {
		"error"
	} else {
		match verbose {
			0 => "info",
			1 => "debug",
			_ => "trace",
		}
	};

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
		)
		.init();
}

fn main() -> Result<(), AppError> {
	let args = Args::parse();
	init_tracing(args.verbose, args.quiet);

	let mut monitor_config = MonitorConfig::load(&args.config)?;
	if let Some(driver) = args.driver {
		monitor_config.driver = driver;
	}

	match monitor_config.mode {
		Mode::Rx | Mode::RxRoundRobin => run_rx(&monitor_config, args.duration)?,
		Mode::Tx => run_tx(&monitor_config, args.duration)?,
	}

	Ok(())
}

fn run_rx(monitor_config: &MonitorConfig, duration_secs: u64) -> Result<(), AppError> {
	let rx_config = monitor_config.rx_worker_config()?;
	tracing::info!(driver = %rx_config.driver, frequencies = rx_config.frequencies.len(), "starting RX worker");

	let mut handle = RxWorkerHandle::start(rx_config)?;
	sleep(Duration::from_secs(duration_secs));
	handle.stop();

	let diagnostics = handle.diagnostics();
	for (frequency_hz, anomalous) in diagnostics.anomalous {
		tracing::info!(%frequency_hz, %anomalous, "final frequency state");
	}

	Ok(())
}

fn run_tx(monitor_config: &MonitorConfig, duration_secs: u64) -> Result<(), AppError> {
	let tx_config = monitor_config.tx_worker_config()?;
	tracing::info!(driver = %tx_config.driver, hops = tx_config.frequencies.len(), "starting TX worker");

	let trigger = TriggerTx::new();
	let mut tx_handle = TxWorkerHandle::start(tx_config, trigger.clone())?;
	let listener_handle = InputListenerHandle::start(trigger);

	// Poll rather than sleeping the full duration unconditionally, so a
	// `q` keypress (which clears the listener's own `running` flag) can
	// end the run early instead of waiting out `--duration` regardless.
	let deadline = Instant::now() + Duration::from_secs(duration_secs);
	while listener_handle.is_running() && Instant::now() < deadline {
		sleep(POLL_INTERVAL);
	}

	drop(listener_handle);
	tx_handle.stop();

	Ok(())
}
