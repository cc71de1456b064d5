//! Narrow interfaces to everything the measurement cycle talks to.
//!
//! Each collaborator enforces its own timeouts; the cycle awaits them one at
//! a time and never races them against each other.
#![allow(async_fn_in_trait)]

use crate::{error::SensorError, measurement::DeviceId};

pub trait NetworkJoin {
    /// Brings the uplink up and reports the hardware-derived unit id.
    async fn join(&mut self) -> Result<DeviceId, SensorError>;
}

pub trait TimeSource {
    /// Seconds since the Unix epoch.
    async fn sync(&mut self) -> Result<u64, SensorError>;
}

pub trait RangeSensor {
    async fn configure(&mut self, timing_budget_us: u32) -> Result<(), SensorError>;
    async fn read_mm(&mut self) -> Result<u32, SensorError>;
    /// Quiesces the sensor ahead of a suspend.
    async fn power_down(&mut self) -> Result<(), SensorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClimateSample {
    /// Relative humidity, percent.
    pub humidity: i32,
    /// Degrees Celsius.
    pub temperature: i32,
}

pub trait ClimateSensor {
    async fn read(&mut self) -> Result<ClimateSample, SensorError>;
}

pub trait PublishSink {
    async fn publish(&mut self, payload: &[u8]) -> Result<(), SensorError>;
}

pub trait SleepController {
    /// Suspends for `seconds`. Returns once the device is awake again.
    async fn suspend(&mut self, seconds: u64) -> Result<(), SensorError>;
}

/// Every collaborator of one device, built once at boot and owned by the
/// cycle runner.
pub struct Services<N, T, R, C, P, S> {
    pub network: N,
    pub time: T,
    pub range: R,
    pub climate: C,
    pub sink: P,
    pub sleep: S,
}
