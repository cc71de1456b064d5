use core::fmt;

use tracing::{debug, info};

use crate::{
    error::SensorError,
    measurement::{Measurement, Reading},
    services::{ClimateSensor, NetworkJoin, PublishSink, RangeSensor, TimeSource},
};

/// One unit of the fixed measurement pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    JoinNetwork,
    SyncTime,
    PrepareRanging,
    MeasureRange,
    MeasureClimate,
    Publish,
    Sleep,
}

/// Execution order of a cycle. Always ends in [`Step::Sleep`].
pub const SEQUENCE: [Step; 7] = [
    Step::JoinNetwork,
    Step::SyncTime,
    Step::PrepareRanging,
    Step::MeasureRange,
    Step::MeasureClimate,
    Step::Publish,
    Step::Sleep,
];

impl Step {
    pub const fn description(self) -> &'static str {
        match self {
            Step::JoinNetwork => "Join network",
            Step::SyncTime => "Sync time",
            Step::PrepareRanging => "Prepare ranging sensor",
            Step::MeasureRange => "Measure range",
            Step::MeasureClimate => "Measure climate",
            Step::Publish => "Publish",
            Step::Sleep => "Enter low-power sleep",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Step::Sleep)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Result of attempting one step.
#[derive(Debug)]
pub enum StepOutcome {
    /// Move on to the next step.
    Continue,
    /// Abandon the rest of the pipeline and go to sleep.
    Abort(SensorError),
    /// The sleep step ran; the cycle is over.
    Suspended { seconds: u64 },
}

impl From<Result<(), SensorError>> for StepOutcome {
    fn from(result: Result<(), SensorError>) -> Self {
        match result {
            Ok(()) => StepOutcome::Continue,
            Err(e) => StepOutcome::Abort(e),
        }
    }
}

pub(crate) async fn join_network(
    m: &mut Measurement,
    network: &mut impl NetworkJoin,
) -> Result<(), SensorError> {
    m.device_id = network.join().await?;
    info!(device_id = %m.device_id, "Joined network");
    Ok(())
}

pub(crate) async fn sync_time(
    m: &mut Measurement,
    time: &mut impl TimeSource,
) -> Result<(), SensorError> {
    let now = time.sync().await?;
    m.epoch_time = now;
    match i64::try_from(now)
        .ok()
        .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
    {
        Some(at) => info!(epoch_time = now, "Time synced: {}", at.to_rfc3339()),
        None => info!(epoch_time = now, "Time synced"),
    }
    Ok(())
}

pub(crate) async fn prepare_ranging(
    range: &mut impl RangeSensor,
    timing_budget_us: u32,
) -> Result<(), SensorError> {
    range.configure(timing_budget_us).await?;
    debug!(timing_budget_us, "Ranging sensor configured");
    Ok(())
}

/// Precondition: the ranging sensor has been prepared.
pub(crate) async fn measure_range(
    m: &mut Measurement,
    range: &mut impl RangeSensor,
) -> Result<(), SensorError> {
    let mm = range.read_mm().await?;
    m.range_mm = Some(mm);
    info!(range_mm = mm, "Range measured");
    Ok(())
}

pub(crate) async fn measure_climate(
    m: &mut Measurement,
    climate: &mut impl ClimateSensor,
) -> Result<(), SensorError> {
    let sample = climate.read().await?;
    m.humidity = Some(sample.humidity);
    m.temperature = Some(sample.temperature);
    info!(
        humidity = sample.humidity,
        temperature = sample.temperature,
        "Climate measured"
    );
    Ok(())
}

/// Precondition: every earlier step has succeeded, so the record is complete.
pub(crate) async fn publish(
    m: &Measurement,
    sink: &mut impl PublishSink,
) -> Result<(), SensorError> {
    let reading = Reading::try_from(m)?;
    let payload = reading.to_json()?;
    sink.publish(&payload).await?;
    info!("Published {reading}");
    Ok(())
}
