//! Recurrence budget and run statistics.
//!
//! Two counting rules exist. When a job is written, [`compute_recurrences`]
//! walks the schedule window with [`is_next_run_valid`]. When the first
//! in-progress execution of a job is reconciled, [`advance_run_stats`] seeds
//! the statistics by counting every occurrence up to and including the end.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::CoreError;
use crate::job::{Job, RunStats, Schedule};
use crate::schedule::{self, CronSchedule};
use crate::status::RunStatus;
use crate::timefmt;

/// Recurrence count of a schedule without an end bound.
pub const UNBOUNDED_RECURRENCES: u64 = i64::MAX as u64;

/// Iteration cap for pathological cron/window combinations.
const MAX_ITERATIONS: u64 = 1_000_000;

/// Result of [`compute_recurrences`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrences {
    pub total: u64,
    pub next_run: Option<DateTime<Utc>>,
}

/// Whether `next` still falls inside the schedule window.
///
/// Valid when it is after `start` or exactly equal to `end`, and never when
/// it is after `end`. An unset bound is the zero instant for `start` and
/// unbounded for `end`.
pub fn is_next_run_valid(
    next: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> bool {
    let after_start = start.is_none_or(|s| next > s);
    let mut valid = after_start || end == Some(next);
    if let Some(end) = end {
        if next > end {
            valid = false;
        }
    }
    valid
}

/// Total recurrences and first run of a job being written.
///
/// A run-now request contributes one run at `run_now_schedule`. A recurring
/// schedule is walked from `max(now, start)`; without an end its budget is
/// [`UNBOUNDED_RECURRENCES`].
pub fn compute_recurrences(
    schedule: Option<&Schedule>,
    run_now_schedule: Option<&Schedule>,
    now: DateTime<Utc>,
) -> Result<Recurrences, CoreError> {
    let mut total = 0u64;
    let mut next_run = None;

    if let Some(rn) = run_now_schedule {
        total = 1;
        next_run = Some(schedule::next_run(rn, now)?);
    }

    if let Some(sched) = schedule {
        let cron = CronSchedule::parse(&sched.time_cycle, &sched.timezone)?;
        let start = timefmt::parse_optional(&sched.start)?;
        let end = timefmt::parse_optional(&sched.end)?;
        let seed = start.map_or(now, |s| s.max(now));

        let first = cron.next_after(seed).ok_or_else(|| {
            CoreError::InvalidSchedule(format!("no occurrence of {:?}", sched.time_cycle))
        })?;
        next_run = Some(next_run.map_or(first, |rn: DateTime<Utc>| rn.min(first)));

        if end.is_none() {
            total = UNBOUNDED_RECURRENCES;
        } else {
            let mut cursor = Some(first);
            let mut steps = 0;
            while let Some(t) = cursor {
                if !is_next_run_valid(t, start, end) || steps >= MAX_ITERATIONS {
                    break;
                }
                total += 1;
                steps += 1;
                cursor = cron.next_after(t);
            }
        }
    }

    Ok(Recurrences { total, next_run })
}

/// Advance run statistics for an execution status event.
///
/// Only in-progress events move the statistics. The first one seeds them;
/// later ones bump the run count and move `next_run` forward until the
/// budget is spent.
pub fn advance_run_stats(
    mut stats: RunStats,
    status: Option<RunStatus>,
    now: DateTime<Utc>,
) -> Result<RunStats, CoreError> {
    if status != Some(RunStatus::InProgress) {
        return Ok(stats);
    }
    if stats.run_count == 0 {
        return initial_run_stats(stats, now);
    }

    let Some(sched) = stats.schedule.as_ref() else {
        return Ok(stats);
    };
    let cycle_blank = sched.time_cycle.trim().is_empty();
    let next = if cycle_blank {
        None
    } else {
        Some(schedule::next_run(sched, now)?)
    };

    stats.last_run = stats.next_run;
    stats.run_count += 1;
    if stats.total_recurrences > 0 && stats.run_count >= stats.total_recurrences {
        debug!(run_count = stats.run_count, "recurrence budget exhausted");
        stats.next_run = None;
        return Ok(stats);
    }
    if let Some(next) = next {
        stats.next_run = Some(next);
    }
    Ok(stats)
}

fn initial_run_stats(mut stats: RunStats, now: DateTime<Utc>) -> Result<RunStats, CoreError> {
    stats.run_count = 1;
    stats.total_recurrences = 1;
    stats.last_run = Some(now);
    stats.next_run = Some(now);

    let Some(sched) = stats.schedule.clone() else {
        return Ok(stats);
    };

    if stats.run_now && !sched.start.trim().is_empty() {
        stats.next_run = Some(timefmt::parse_iso(&sched.start)?);
    }

    if sched.time_cycle.trim().is_empty() {
        if stats.run_now {
            stats.total_recurrences += 1;
        }
        return Ok(stats);
    }

    let cron = CronSchedule::parse(&sched.time_cycle, &sched.timezone)?;
    stats.next_run = cron.next_after(now);

    let Some(end) = timefmt::parse_optional(&sched.end)? else {
        // Unlimited executions; no countable total.
        stats.total_recurrences = 0;
        return Ok(stats);
    };

    let mut count = 0u64;
    let mut cursor = stats.next_run;
    while let Some(t) = cursor {
        if t > end || count >= MAX_ITERATIONS {
            break;
        }
        count += 1;
        cursor = cron.next_after(t);
    }
    stats.total_recurrences = count + u64::from(stats.run_now);
    Ok(stats)
}

/// Read-time presentation fix-ups for a stored job.
///
/// A schedule spanning exactly one day whose first occurrence after the
/// start is the end is a daily cycle with a single run, and is shown
/// without a cycle. A spent budget clears `next_run`. Drafts are left alone.
pub fn adjust_recurrence(mut job: Job) -> Job {
    if job.draft {
        return job;
    }

    let exhausted = job.total_recurrences > 0 && job.run_count == job.total_recurrences;
    if job.run_now_schedule.is_some() {
        if exhausted {
            job.next_run = None;
        }
        if job.schedule.is_none() {
            return job;
        }
    }

    let Some(sched) = job.schedule.as_mut() else {
        return job;
    };
    if sched.time_cycle.is_empty() || sched.start.is_empty() || sched.end.is_empty() {
        return job;
    }

    let (Ok(start), Ok(end)) = (timefmt::parse_iso(&sched.start), timefmt::parse_iso(&sched.end))
    else {
        return job;
    };
    if end - start != Duration::days(1) {
        return job;
    }
    if let Ok(next) = schedule::next_run(sched, start) {
        if next == end {
            sched.time_cycle.clear();
        }
    }

    if exhausted {
        job.next_run = None;
    }
    job
}

#[cfg(test)]
#[path = "recurrence_tests.rs"]
mod tests;
