#[derive(thiserror::Error, Debug, Clone)]
pub enum RadioError {
	#[error("no device found matching driver '{0}'")]
	NoMatchingDevice(String),
	#[error("failed to open device: {0}")]
	OpenFailed(String),
	#[error("failed to configure device: {0}")]
	ConfigureFailed(String),
	#[error("failed to set up stream: {0}")]
	StreamSetupFailed(String),
	/// A stream read/write returned a negative status. Per spec, this is
	/// a transient condition: the caller logs a warning and skips the
	/// slice without tearing down the stream.
	#[error("stream operation returned a transient status: {0}")]
	Transient(String),
	/// Any other failure escaping the dwell loop. Fatal to the owning
	/// worker: the stream must be released and the error propagated.
	#[error("device stream failed: {0}")]
	StreamFatal(String),
	#[error("failed to publish output file {path}: {source}")]
	OutputWrite {
		path: String,
		#[source]
		source: std::sync::Arc<std::io::Error>,
	},
}
