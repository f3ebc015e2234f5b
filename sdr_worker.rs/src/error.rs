#[derive(thiserror::Error, Debug, Clone)]
pub enum WorkerError {
	#[error(transparent)]
	Radio(#[from] radio_io::RadioError),
	#[error(transparent)]
	Dsp(#[from] dsp_analysis::DspError),
	#[error("no frequencies configured")]
	NoFrequencies,
	#[error("worker cancelled")]
	Cancelled,
}
