//! Cron parsing and schedule construction.
//!
//! Job schedules use five-field cron expressions (`min hour dom month dow`,
//! Sunday = 0) evaluated in the schedule's IANA timezone. They are adapted to
//! the seconds-first, Sunday = 1 dialect of the `cron` crate before parsing.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;
use crate::job::Schedule;
use crate::timefmt;

/// Lead time between a run-now request and its first execution, giving the
/// workflow engine time to provision.
pub const RUN_NOW_LEAD_MINUTES: i64 = 2;

/// Resolve a zone name; blank means UTC.
pub fn parse_timezone(name: &str) -> Result<Tz, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    Tz::from_str(name).map_err(|_| CoreError::InvalidSchedule(format!("unknown timezone: {}", name)))
}

/// A parsed cron expression bound to a timezone.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    schedule: cron::Schedule,
    tz: Tz,
}

impl CronSchedule {
    pub fn parse(expr: &str, timezone: &str) -> Result<Self, CoreError> {
        let tz = parse_timezone(timezone)?;
        let normalized = normalize_expression(expr)?;
        let schedule = cron::Schedule::from_str(&normalized)
            .map_err(|e| CoreError::InvalidSchedule(format!("{}: {}", expr.trim(), e)))?;
        Ok(Self { schedule, tz })
    }

    /// First occurrence strictly after `t`.
    pub fn next_after(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&t.with_timezone(&self.tz))
            .next()
            .map(|d| d.with_timezone(&Utc))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Next occurrence of `schedule` strictly after `from`.
pub fn next_run(schedule: &Schedule, from: DateTime<Utc>) -> Result<DateTime<Utc>, CoreError> {
    let cron = CronSchedule::parse(&schedule.time_cycle, &schedule.timezone)?;
    cron.next_after(from).ok_or_else(|| {
        CoreError::InvalidSchedule(format!(
            "no occurrence of {:?} after {}",
            schedule.time_cycle,
            timefmt::format_iso(from)
        ))
    })
}

/// Translate a five-field expression into the `cron` crate dialect.
/// Six- and seven-field expressions and `@` descriptors pass through.
fn normalize_expression(expr: &str) -> Result<String, CoreError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(CoreError::InvalidSchedule("empty cron expression".to_string()));
    }
    if expr.starts_with('@') {
        return Ok(expr.to_string());
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => {
            let dow = fields[4]
                .split(',')
                .map(shift_weekday)
                .collect::<Vec<_>>()
                .join(",");
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], dow
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(CoreError::InvalidSchedule(format!(
            "expected 5 fields in cron expression {:?}, found {}",
            expr, n
        ))),
    }
}

/// Shift one numeric day-of-week item from Sunday = 0 to Sunday = 1.
fn shift_weekday(item: &str) -> String {
    let (base, step) = match item.split_once('/') {
        Some((b, s)) => (b, Some(s)),
        None => (item, None),
    };
    let with_step = |b: String| match step {
        Some(s) => format!("{}/{}", b, s),
        None => b,
    };

    if let Some((lo, hi)) = base.split_once('-') {
        return match (lo.parse::<u8>(), hi.parse::<u8>()) {
            (Ok(lo), Ok(7)) if step.is_none() && lo > 0 => format!("{}-7,1", lo + 1),
            (Ok(lo), Ok(hi)) => with_step(format!("{}-{}", lo + 1, (hi + 1).min(7))),
            _ => item.to_string(),
        };
    }

    match base.parse::<u8>() {
        Ok(7) => with_step("1".to_string()),
        Ok(n) => with_step((n + 1).to_string()),
        Err(_) => item.to_string(),
    }
}

/// Daily cycle firing at the given wall-clock time.
fn daily_cycle(minute: u32, hour: u32) -> String {
    format!("{} {} */1 * *", minute, hour)
}

/// `MM-DD-YYYY`, the date layout the workflow engine expects.
fn workflow_date<T: Datelike>(d: &T) -> String {
    format!("{:02}-{:02}-{}", d.month(), d.day(), d.year())
}

/// One-shot schedule for an immediate run: first execution shortly after
/// `now`, expiring a day later.
pub fn run_now_schedule(timezone: &str, now: DateTime<Utc>) -> Result<Schedule, CoreError> {
    let tz = parse_timezone(timezone)?;
    let start = now.with_timezone(&tz);
    let first = start + Duration::minutes(RUN_NOW_LEAD_MINUTES);
    let end = first + Duration::days(1);

    Ok(Schedule {
        time_cycle: daily_cycle(first.minute(), first.hour()),
        start: workflow_date(&start),
        end: workflow_date(&end),
        timezone: tz.name().to_string(),
        skip_concurrent: false,
    })
}

/// Complete a job schedule in place and return its workflow-engine form.
///
/// A schedule without a cycle runs once: it becomes a daily cycle at its
/// start time that ends one day after the start.
pub fn workflow_schedule(schedule: &mut Schedule) -> Result<Schedule, CoreError> {
    let tz = parse_timezone(&schedule.timezone)?;

    if schedule.time_cycle.trim().is_empty() {
        let start = timefmt::parse_iso(&schedule.start)?.with_timezone(&tz);
        if schedule.end.is_empty() {
            schedule.end = (start + Duration::days(1)).to_rfc3339();
        }
        schedule.time_cycle = daily_cycle(start.minute(), start.hour());
    }
    schedule.timezone = tz.name().to_string();

    let mut wschedule = Schedule {
        time_cycle: schedule.time_cycle.clone(),
        timezone: schedule.timezone.clone(),
        ..Schedule::default()
    };
    if !schedule.start.is_empty() {
        wschedule.start = workflow_date(&timefmt::parse_iso(&schedule.start)?.with_timezone(&tz));
    }
    if !schedule.end.is_empty() {
        wschedule.end = workflow_date(&timefmt::parse_iso(&schedule.end)?.with_timezone(&tz));
    }
    Ok(wschedule)
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
