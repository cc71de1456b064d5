//! Periodic water-level agent: wake, join the network, sync time, measure
//! distance and climate, publish one reading over MQTT, then sleep until the
//! next period boundary.

pub mod config;
pub mod cycle;
pub mod error;
pub mod iio;
pub mod measurement;
pub mod mqtt;
pub mod network;
pub mod progress;
pub mod services;
pub mod sleep;
pub mod sntp;
pub mod step;
pub mod telemetry;

pub use cycle::{seconds_to_sleep, CycleReport, CycleRunner, CycleSettings};
pub use error::{ErrorCategory, SensorError};
pub use measurement::{DeviceId, Measurement, Reading};
pub use services::Services;
pub use step::{Step, StepOutcome, SEQUENCE};
