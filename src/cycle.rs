//! The measurement cycle: a fixed pipeline of steps over one
//! [`Measurement`], where any failure skips straight to sleep.

use std::num::NonZeroU64;

use tracing::{error, info, warn};

use crate::{
    measurement::Measurement,
    progress::{progress_line, BootClock},
    services::{
        ClimateSensor, NetworkJoin, PublishSink, RangeSensor, Services, SleepController,
        TimeSource,
    },
    step::{self, Step, StepOutcome, SEQUENCE},
};

/// Seconds until the next wall-clock multiple of `period`.
///
/// With `epoch_time == 0` (time never synced) this is simply `period`, which
/// only approximates alignment.
pub fn seconds_to_sleep(period: NonZeroU64, epoch_time: u64) -> u64 {
    period.get() - epoch_time % period.get()
}

#[derive(Debug, Clone, Copy)]
pub struct CycleSettings {
    pub period: NonZeroU64,
    pub timing_budget_us: u32,
}

/// What happened during one cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub measurement: Measurement,
    /// Steps in the order they were attempted, sleep included.
    pub executed: Vec<Step>,
    pub failed: Option<Step>,
    pub slept_secs: u64,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.failed.is_none()
    }
}

/// Cursor position of the sleep step, where every failure jumps to.
const SLEEP_INDEX: usize = SEQUENCE.len() - 1;

pub struct CycleRunner<N, T, R, C, P, S> {
    services: Services<N, T, R, C, P, S>,
    settings: CycleSettings,
    clock: BootClock,
}

impl<N, T, R, C, P, S> CycleRunner<N, T, R, C, P, S>
where
    N: NetworkJoin,
    T: TimeSource,
    R: RangeSensor,
    C: ClimateSensor,
    P: PublishSink,
    S: SleepController,
{
    pub fn new(
        services: Services<N, T, R, C, P, S>,
        settings: CycleSettings,
        clock: BootClock,
    ) -> Self {
        Self {
            services,
            settings,
            clock,
        }
    }

    /// Access to the collaborators between cycles.
    pub fn services_mut(&mut self) -> &mut Services<N, T, R, C, P, S> {
        &mut self.services
    }

    /// Runs one wake cycle on a fresh measurement. Every path ends with
    /// exactly one suspend.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut measurement = Measurement::new();
        let mut executed = Vec::with_capacity(SEQUENCE.len());
        let mut failed = None;
        let mut cursor = 0;

        loop {
            let step = SEQUENCE.get(cursor).copied().unwrap_or(Step::Sleep);
            executed.push(step);
            match self.attempt(step, &mut measurement).await {
                StepOutcome::Continue => {
                    info!("{}", progress_line(self.clock.elapsed(), step, false));
                    cursor += 1;
                }
                StepOutcome::Abort(e) => {
                    warn!("{}", progress_line(self.clock.elapsed(), step, true));
                    error!(
                        step = step.description(),
                        category = %e.category(),
                        "Cycle abandoned: {e}"
                    );
                    failed = Some(step);
                    cursor = SLEEP_INDEX;
                }
                StepOutcome::Suspended { seconds } => {
                    return CycleReport {
                        measurement,
                        executed,
                        failed,
                        slept_secs: seconds,
                    };
                }
            }
        }
    }

    /// Attempts a single step against `m`. Outside of [`Self::run_cycle`]
    /// this is meant for exercising steps in isolation; the caller is then
    /// responsible for the step-order preconditions.
    pub async fn attempt(&mut self, step: Step, m: &mut Measurement) -> StepOutcome {
        let services = &mut self.services;
        match step {
            Step::JoinNetwork => step::join_network(m, &mut services.network).await.into(),
            Step::SyncTime => step::sync_time(m, &mut services.time).await.into(),
            Step::PrepareRanging => {
                step::prepare_ranging(&mut services.range, self.settings.timing_budget_us)
                    .await
                    .into()
            }
            Step::MeasureRange => step::measure_range(m, &mut services.range).await.into(),
            Step::MeasureClimate => step::measure_climate(m, &mut services.climate).await.into(),
            Step::Publish => step::publish(m, &mut services.sink).await.into(),
            Step::Sleep => StepOutcome::Suspended {
                seconds: self.enter_sleep(m).await,
            },
        }
    }

    async fn enter_sleep(&mut self, m: &Measurement) -> u64 {
        let seconds = seconds_to_sleep(self.settings.period, m.epoch_time);
        if m.epoch_time == 0 {
            warn!("No synced time, sleeping a full period");
        }
        info!("{}", progress_line(self.clock.elapsed(), Step::Sleep, false));

        if let Err(e) = self.services.range.power_down().await {
            warn!(category = %e.category(), "Failed to power down ranging sensor: {e}");
        }
        info!(seconds, "Suspending");
        if let Err(e) = self.services.sleep.suspend(seconds).await {
            error!(category = %e.category(), "Suspend failed: {e}");
        }
        self.clock = BootClock::start();
        seconds
    }
}
