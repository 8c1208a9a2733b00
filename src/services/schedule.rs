//! Checkpoint planning for periodic re-verification.
//!
//! One plan covers an hour from its start instant: `regular` evenly spaced
//! checkpoints beginning at the start, plus `random` extra instants drawn
//! inside each gap between consecutive regular checkpoints. Random instants in
//! the same gap are at least [`MIN_RANDOM_SPACING_SECS`] apart. The merged plan is
//! strictly increasing.

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, TimeDelta};
use rand::Rng;

/// Seconds covered by one plan.
pub const PLAN_SPAN_SECS: i64 = 3600;

/// Minimum seconds between two random checkpoints of the same gap.
pub const MIN_RANDOM_SPACING_SECS: i64 = 60;

/// Rejected whole-gap draws tolerated before switching to a constructive draw.
const MAX_DRAW_ATTEMPTS: usize = 256;

/// Check that `regular`/`random` can produce a valid plan.
pub fn validate_plan(regular: u32, random: u32) -> Result<()> {
    if regular == 0 {
        return Err(Error::InvalidInput(
            "regular interval must be at least 1 check per hour".to_string(),
        ));
    }

    let interval_secs = interval_secs(regular);
    if interval_secs == 0 {
        return Err(Error::InvalidInput(format!(
            "regular interval {regular} exceeds one check per second"
        )));
    }

    if regular > 1 && random > 1 {
        let usable_ms = interval_secs * 1000 - 2;
        let needed_ms = i64::from(random - 1) * MIN_RANDOM_SPACING_SECS * 1000;
        if needed_ms > usable_ms {
            return Err(Error::InvalidInput(format!(
                "{random} random checks cannot be spaced {MIN_RANDOM_SPACING_SECS}s apart within a {interval_secs}s interval"
            )));
        }
    }

    Ok(())
}

/// Plan one hour of checkpoints starting at `start`.
pub fn plan_checkpoints<R: Rng + ?Sized>(
    start: DateTime<FixedOffset>,
    regular: u32,
    random: u32,
    rng: &mut R,
) -> Result<Vec<DateTime<FixedOffset>>> {
    validate_plan(regular, random)?;

    let interval = TimeDelta::seconds(interval_secs(regular));
    let regular_points: Vec<DateTime<FixedOffset>> = (0..regular)
        .map(|i| start + interval * i32::try_from(i).unwrap_or(i32::MAX))
        .collect();

    let mut plan = regular_points.clone();
    for gap_start in regular_points.iter().take(regular_points.len().saturating_sub(1)) {
        let offsets = draw_gap(interval.num_milliseconds(), random, rng);
        plan.extend(
            offsets
                .into_iter()
                .map(|ms| *gap_start + TimeDelta::milliseconds(ms)),
        );
    }

    plan.sort();
    plan.dedup();

    log::debug!(
        "Planned {} checkpoints from {start} ({regular} regular, {random} random per gap)",
        plan.len()
    );

    Ok(plan)
}

/// Start of the plan following one that began at `previous`.
///
/// Normally one hour later. If `now` is already past that (the process was
/// suspended, or a pass overran), the next plan starts at `now` so stale
/// checkpoints are skipped instead of fired back to back.
#[must_use]
pub fn next_plan_start(
    previous: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> DateTime<FixedOffset> {
    (previous + TimeDelta::seconds(PLAN_SPAN_SECS)).max(now)
}

fn interval_secs(regular: u32) -> i64 {
    PLAN_SPAN_SECS / i64::from(regular)
}

/// Draw `count` millisecond offsets strictly inside `(0, gap_ms)`, pairwise
/// at least `MIN_RANDOM_SPACING_SECS` apart, sorted ascending.
fn draw_gap<R: Rng + ?Sized>(gap_ms: i64, count: u32, rng: &mut R) -> Vec<i64> {
    if count == 0 || gap_ms < 2 {
        return Vec::new();
    }

    let spacing = MIN_RANDOM_SPACING_SECS * 1000;

    for _ in 0..MAX_DRAW_ATTEMPTS {
        let mut picks: Vec<i64> = (0..count).map(|_| rng.random_range(1..gap_ms)).collect();
        picks.sort_unstable();
        if picks.windows(2).all(|pair| pair[1] - pair[0] >= spacing) {
            return picks;
        }
    }

    log::debug!("Random draw for a {gap_ms}ms gap kept colliding, spacing picks by construction");

    // Spread the leftover room randomly, then push each pick `spacing` past
    // the previous one.
    let slack = (gap_ms - 2) - i64::from(count - 1) * spacing;
    let mut room: Vec<i64> = (0..count).map(|_| rng.random_range(0..=slack)).collect();
    room.sort_unstable();
    room.into_iter()
        .zip(0i64..)
        .map(|(extra, i)| 1 + extra + i * spacing)
        .collect()
}
