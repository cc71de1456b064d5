use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::info;

use crate::{error::SensorError, services::SleepController};

/// Keeps the process running and waits out the period on a timer.
#[derive(Debug, Default)]
pub struct TimerSleep;

impl SleepController for TimerSleep {
    async fn suspend(&mut self, seconds: u64) -> Result<(), SensorError> {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        Ok(())
    }
}

/// Suspends the board to RAM with the RTC armed to wake it.
pub struct RtcSuspend {
    wakealarm: PathBuf,
    power_state: PathBuf,
}

impl RtcSuspend {
    pub fn new(rtc: &str) -> Self {
        Self::with_paths(
            PathBuf::from("/sys/class/rtc").join(rtc).join("wakealarm"),
            "/sys/power/state",
        )
    }

    pub fn with_paths(wakealarm: impl Into<PathBuf>, power_state: impl Into<PathBuf>) -> Self {
        Self {
            wakealarm: wakealarm.into(),
            power_state: power_state.into(),
        }
    }

    async fn write(path: &Path, value: &str) -> Result<(), SensorError> {
        tokio::fs::write(path, value)
            .await
            .map_err(|e| SensorError::device(path, e))
    }
}

impl SleepController for RtcSuspend {
    async fn suspend(&mut self, seconds: u64) -> Result<(), SensorError> {
        // An armed alarm has to be cleared before it can be set again.
        Self::write(&self.wakealarm, "0").await?;
        Self::write(&self.wakealarm, &format!("+{seconds}")).await?;
        info!(seconds, "RTC wake alarm armed, suspending to RAM");
        // Blocks until the kernel resumes.
        Self::write(&self.power_state, "mem").await
    }
}

/// Sleep controller picked at boot from configuration.
pub enum SleepBackend {
    Timer(TimerSleep),
    Rtc(RtcSuspend),
}

impl SleepController for SleepBackend {
    async fn suspend(&mut self, seconds: u64) -> Result<(), SensorError> {
        match self {
            SleepBackend::Timer(timer) => timer.suspend(seconds).await,
            SleepBackend::Rtc(rtc) => rtc.suspend(seconds).await,
        }
    }
}
