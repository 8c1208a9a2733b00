//! Randomized periodic re-verification of one directory.
//!
//! The scheduler task sleeps until each planned checkpoint, then runs a full
//! snapshot-and-compare pass on the blocking pool and appends the report to the
//! directory's comparison log. Cancellation is observed while sleeping and
//! between passes; a pass already running is allowed to finish.

use crate::io::logs::append_comparison;
use crate::io::report::read_baseline;
use crate::models::{BaselineIndex, ComparisonResult};
use crate::services::clock::ReportClock;
use crate::services::diff::{compare, failed_closed};
use crate::services::schedule::{next_plan_start, plan_checkpoints, validate_plan};
use crate::services::traverse::build_baseline;
use crate::{BuildOptions, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything one comparison pass needs.
#[derive(Debug, Clone)]
pub struct ComparisonJob {
    pub directory: PathBuf,
    pub baseline_file: PathBuf,
    pub comparison_log: PathBuf,
    pub clock: ReportClock,
}

impl ComparisonJob {
    /// Snapshot the directory, compare it with the stored baseline and append
    /// the report.
    ///
    /// A stored baseline that cannot be read or parsed does not abort the pass:
    /// the report is written with 0% matching and the failure named in it.
    pub fn run_pass(&self) -> Result<ComparisonResult> {
        let opts = BuildOptions { clock: self.clock };
        let generated = build_baseline(&self.directory, &opts)?;
        let generated = BaselineIndex::from_baseline(&generated);
        let compared_at = self.clock.now_naive();

        let result = match read_baseline(&self.baseline_file) {
            Ok(original) => compare(&original, &generated, compared_at),
            Err(err) => {
                log::error!(
                    "Baseline {} is unusable, reporting no matches: {err}",
                    self.baseline_file.display()
                );
                failed_closed(&generated, compared_at, err.to_string())
            }
        };

        append_comparison(&self.comparison_log, &result)?;
        log::info!(
            "Compared {}: {} matched, {} not matched ({}%)",
            self.directory.display(),
            result.matched_file_count,
            result.unmatched_file_count,
            result.matching_percentage
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub regular_per_hour: u32,
    pub random_per_interval: u32,
    /// Plan the following hour once the current plan is exhausted.
    pub repeat: bool,
}

/// Handle to a running scheduler task
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the scheduler to stop; no new pass starts after this returns.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to end, including any pass in flight.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            log::error!("Scheduler task ended abnormally: {err}");
        }
    }
}

/// Start the scheduler for `job` on the current tokio runtime.
///
/// # Errors
/// `Error::InvalidInput` when the settings cannot produce a valid plan.
pub fn spawn_scheduler(job: ComparisonJob, settings: ScheduleSettings) -> Result<SchedulerHandle> {
    validate_plan(settings.regular_per_hour, settings.random_per_interval)?;

    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_schedule(job, settings, cancel.clone()));
    Ok(SchedulerHandle { cancel, task })
}

async fn run_schedule(job: ComparisonJob, settings: ScheduleSettings, cancel: CancellationToken) {
    let mut rng = StdRng::from_os_rng();
    let mut plan_start = job.clock.now();

    loop {
        let plan = match plan_checkpoints(
            plan_start,
            settings.regular_per_hour,
            settings.random_per_interval,
            &mut rng,
        ) {
            Ok(plan) => plan,
            Err(err) => {
                log::error!("Cannot plan checks for {}: {err}", job.directory.display());
                return;
            }
        };

        for checkpoint in plan {
            let wait = (checkpoint - job.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO);

            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(wait) => {}
            }

            // The timer and a stop can become ready together.
            if cancel.is_cancelled() {
                return;
            }

            let pass = job.clone();
            match tokio::task::spawn_blocking(move || pass.run_pass()).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    log::error!("Comparison of {} failed: {err}", job.directory.display());
                }
                Err(err) => {
                    log::error!("Comparison task for {} panicked: {err}", job.directory.display());
                }
            }
        }

        if !settings.repeat {
            log::info!("Check plan for {} exhausted", job.directory.display());
            return;
        }
        plan_start = next_plan_start(plan_start, job.clock.now());
    }
}
