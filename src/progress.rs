use std::time::Duration;

use tokio::time::Instant;

use crate::step::Step;

/// Time reference for the progress log. Reset on every wake.
#[derive(Debug, Clone, Copy)]
pub struct BootClock {
    boot: Instant,
}

impl BootClock {
    pub fn start() -> Self {
        Self {
            boot: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.boot.elapsed()
    }
}

/// `[   1.234s] Sync time`, with ` FAIL` appended for the step that aborted
/// the cycle.
pub fn progress_line(elapsed: Duration, step: Step, failed: bool) -> String {
    let mut line = format!(
        "[{:>4}.{:03}s] {}",
        elapsed.as_secs(),
        elapsed.subsec_millis(),
        step.description()
    );
    if failed {
        line.push_str(" FAIL");
    }
    line
}
