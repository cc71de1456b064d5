//! Range and climate sensors exposed by Linux IIO drivers under
//! `/sys/bus/iio/devices`.

use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    error::SensorError,
    services::{ClimateSample, ClimateSensor, RangeSensor},
};

async fn read_attribute(dir: &Path, name: &str) -> Result<String, (PathBuf, io::Error)> {
    let path = dir.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(value) => Ok(value.trim().to_owned()),
        Err(e) => Err((path, e)),
    }
}

/// Writes `name` only if the driver exposes it.
async fn write_optional_attribute(
    dir: &Path,
    name: &str,
    value: &str,
) -> Result<bool, SensorError> {
    let path = dir.join(name);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(false);
    }
    tokio::fs::write(&path, value)
        .await
        .map_err(|e| SensorError::device(path, e))?;
    Ok(true)
}

/// Converts a milli-unit IIO reading to whole units, rounding half away from zero.
fn milli_to_unit(raw: &str, what: &str) -> Result<i32, SensorError> {
    let milli: i64 = raw
        .parse()
        .map_err(|_| SensorError::Measurement(format!("unparsable {what} {raw:?}")))?;
    let half = if milli < 0 { -500 } else { 500 };
    i32::try_from((milli + half) / 1000)
        .map_err(|_| SensorError::Measurement(format!("{what} {milli} out of range")))
}

/// Time-of-flight ranging sensor (e.g. the `vl53l0x-i2c` driver).
pub struct IioRangeSensor {
    dir: PathBuf,
}

impl IioRangeSensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RangeSensor for IioRangeSensor {
    async fn configure(&mut self, timing_budget_us: u32) -> Result<(), SensorError> {
        let name = read_attribute(&self.dir, "name")
            .await
            .map_err(|(path, e)| SensorError::device(path, e))?;
        let seconds = format!("{:.6}", f64::from(timing_budget_us) / 1_000_000.0);
        let applied = write_optional_attribute(&self.dir, "integration_time", &seconds).await?;
        debug!(sensor = %name, applied, "Timing budget {seconds}s");
        Ok(())
    }

    async fn read_mm(&mut self) -> Result<u32, SensorError> {
        let raw = read_attribute(&self.dir, "in_distance_raw")
            .await
            .map_err(|(path, e)| SensorError::device(path, e))?;
        raw.parse()
            .map_err(|_| SensorError::Measurement(format!("unparsable distance {raw:?}")))
    }

    async fn power_down(&mut self) -> Result<(), SensorError> {
        write_optional_attribute(&self.dir, "power/control", "auto").await?;
        Ok(())
    }
}

/// Temperature/humidity sensor (e.g. the `dht11` driver, which also serves
/// DHT22). The driver reports checksum and timing failures as read errors.
pub struct IioClimateSensor {
    dir: PathBuf,
}

impl IioClimateSensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_milli(&self, name: &str) -> Result<i32, SensorError> {
        let raw = read_attribute(&self.dir, name).await.map_err(|(path, e)| {
            SensorError::Protocol(format!("reading {}: {e}", path.display()))
        })?;
        milli_to_unit(&raw, name)
    }
}

impl ClimateSensor for IioClimateSensor {
    async fn read(&mut self) -> Result<ClimateSample, SensorError> {
        let humidity = self.read_milli("in_humidityrelative_input").await?;
        let temperature = self.read_milli("in_temp_input").await?;
        Ok(ClimateSample {
            humidity,
            temperature,
        })
    }
}
