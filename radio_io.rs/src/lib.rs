mod device;
mod error;
mod output;
#[cfg(any(test, feature = "test-utils"))]
mod mock;
mod soapy;

pub use device::{ActualConfig, Direction, SdrDevice, SAMPLE_RATE_UNSET};
pub use error::RadioError;
pub use output::{write_atomic, write_avg_power_output, write_cauchy_dist, write_psd_output};
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockDevice;
pub use soapy::SoapyDevice;
