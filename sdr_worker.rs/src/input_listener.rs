use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::tx::TriggerTx;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Guards the terminal's raw-mode state: disables canonical mode/echo on
/// construction, restores it on drop. Scoping the restore to `Drop` rather
/// than a manual call at the end of the listener loop gives the
/// "try/finally-style guarantee" spec.md §9 calls for — it also runs if the
/// listener thread unwinds.
struct RawModeGuard;

impl RawModeGuard {
	fn enter() -> io::Result<Self> {
		enable_raw_mode()?;
		Ok(Self)
	}
}

impl Drop for RawModeGuard {
	fn drop(&mut self) {
		let _ = disable_raw_mode();
	}
}

/// Keyboard listener for TX mode (spec.md §4.6): space/enter toggle
/// `triggerTx`, `q` clears `running`. Polls with a 100ms timeout so it
/// notices a cleared `running` promptly without busy-spinning.
pub struct InputListenerHandle {
	running: Arc<AtomicBool>,
	join_handle: Option<JoinHandle<()>>,
}

impl InputListenerHandle {
	#[must_use]
	pub fn start(trigger: TriggerTx) -> Self {
		let running = Arc::new(AtomicBool::new(true));
		let join_handle = {
			let running = running.clone();
			thread::spawn(move || listen(&running, &trigger))
		};

		Self {
			running,
			join_handle: Some(join_handle),
		}
	}

	#[must_use]
	pub fn is_running(&self) -> bool {
		self.running.load(Ordering::SeqCst)
	}

	pub fn stop(&mut self) {
		self.running.store(false, Ordering::SeqCst);
		if let Some(handle) = self.join_handle.take() {
			let _ = handle.join();
		}
	}
}

impl Drop for InputListenerHandle {
	fn drop(&mut self) {
		self.stop();
	}
}

fn listen(running: &Arc<AtomicBool>, trigger: &TriggerTx) {
	let _raw_mode = match RawModeGuard::enter() {
		Ok(guard) => guard,
		Err(err) => {
			tracing::error!(%err, "failed to enable terminal raw mode, input listener exiting");
			return;
		}
	};

	tracing::info!("Input thread started, press SPACE to toggle TX, q to quit");

	while running.load(Ordering::SeqCst) {
		match event::poll(POLL_TIMEOUT) {
			Ok(true) => {}
			Ok(false) => continue,
			Err(err) => {
				tracing::error!(%err, "input listener poll error");
				break;
			}
		}

		let Ok(Event::Key(key_event)) = event::read() else {
			continue;
		};

		match key_event.code {
			KeyCode::Char(' ') | KeyCode::Enter => {
				let now_on = trigger.toggle();
				tracing::info!("TX {}", if now_on { "ON" } else { "OFF" });
			}
			KeyCode::Char('q') => {
				running.store(false, Ordering::SeqCst);
			}
			_ => {}
		}
	}
}
