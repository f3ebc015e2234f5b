mod error;
mod input_listener;
mod rx;
mod tx;

pub use anomaly_detect::DEFAULT_ALPHA;
pub use error::WorkerError;
pub use input_listener::InputListenerHandle;
pub use rx::{PerFrequencyConfig, RxDiagnostics, RxWorkerConfig, RxWorkerHandle};
pub use tx::{TriggerTx, TxWorkerConfig, TxWorkerHandle};
