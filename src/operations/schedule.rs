//! Schedule resolution - turns schedule specifications into wake-up instants
//!
//! A schedule is a `;`-separated union of entries. Each entry is either:
//! - a fixed interval (`30s`, `1h`), phased on the previous execution
//! - a cron expression, 5 fields (crontab, minute resolution) or 6/7 fields
//!   (with seconds, day-of-week numbered 1-7 from Sunday)

use crate::common::errors::ConfigError;
use crate::operations::duration::parse_duration_secs;
use chrono::{DateTime, TimeDelta, TimeZone};
use regex::Regex;
use std::{str::FromStr, sync::LazyLock};

static DURATION_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[A-Za-z]$").expect("duration shape pattern is valid"));

#[derive(Debug, Clone)]
pub enum ScheduleSpec {
    /// Fire every N seconds after the previous execution.
    Interval(u64),
    Cron(Box<cron::Schedule>),
}

impl ScheduleSpec {
    fn next_after<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        last_run: Option<&DateTime<Tz>>,
    ) -> Option<DateTime<Tz>> {
        match self {
            ScheduleSpec::Interval(secs) => {
                let Some(last_run) = last_run else {
                    return Some(now.clone());
                };
                let step = TimeDelta::try_seconds(i64::try_from(*secs).ok()?)?;
                let due = last_run.clone().checked_add_signed(step)?;
                Some(if due < *now { now.clone() } else { due })
            }
            ScheduleSpec::Cron(schedule) => {
                // an occurrence that already ran is never handed out twice
                if let Some(last_run) = last_run.filter(|last_run| *last_run >= now) {
                    return schedule.after(last_run).next();
                }
                if now.timestamp_subsec_nanos() == 0 && schedule.includes(now.clone()) {
                    Some(now.clone())
                } else {
                    schedule.after(now).next()
                }
            }
        }
    }
}

impl FromStr for ScheduleSpec {
    type Err = ConfigError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let entry = entry.trim();
        if DURATION_SHAPE.is_match(entry) {
            return parse_duration_secs(entry).and_then(|secs| {
                if secs == 0 {
                    Err(ConfigError::InvalidSchedule {
                        entry: entry.to_string(),
                        reason: "interval must be greater than zero".to_string(),
                    })
                } else {
                    Ok(ScheduleSpec::Interval(secs))
                }
            });
        }

        let expression = match entry.split_whitespace().count() {
            5 => crontab_to_cron(entry).map_err(|reason| ConfigError::InvalidSchedule {
                entry: entry.to_string(),
                reason,
            })?,
            6 | 7 => entry.to_string(),
            _ => {
                return Err(ConfigError::InvalidSchedule {
                    entry: entry.to_string(),
                    reason: "neither a duration nor a 5, 6 or 7 field cron expression".to_string(),
                });
            }
        };

        cron::Schedule::from_str(&expression)
            .map(|schedule| ScheduleSpec::Cron(Box::new(schedule)))
            .map_err(|error| ConfigError::InvalidSchedule {
                entry: entry.to_string(),
                reason: error.to_string(),
            })
    }
}

/// Rewrite a classic crontab line for the `cron` crate: add a zero seconds
/// field and renumber day-of-week from crontab's `0-7` (Sunday is 0 and 7)
/// to the crate's `1-7` (Sunday is 1). Day names pass through unchanged.
fn crontab_to_cron(entry: &str) -> Result<String, String> {
    let fields: Vec<&str> = entry.split_whitespace().collect();
    let [minute, hour, day, month, day_of_week] = fields[..] else {
        return Err("expected 5 fields".to_string());
    };
    let day_of_week = day_of_week
        .split(',')
        .map(crontab_weekday_item)
        .collect::<Result<Vec<_>, _>>()?
        .join(",");
    Ok(format!("0 {minute} {hour} {day} {month} {day_of_week}"))
}

fn crontab_weekday_item(item: &str) -> Result<String, String> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (item, None),
    };
    let with_step = |range: String| match step {
        Some(step) => format!("{range}/{step}"),
        None => range,
    };

    let Some((start, end)) = range.split_once('-') else {
        return Ok(match crontab_weekday(range)? {
            Some(day) => with_step(shift_weekday(day).to_string()),
            None => item.to_string(),
        });
    };
    match (crontab_weekday(start)?, crontab_weekday(end)?) {
        (Some(start), Some(end)) if start > end => {
            Err(format!("day-of-week range `{item}` runs backwards"))
        }
        (Some(0), Some(7)) => Ok(with_step("1-7".to_string())),
        (Some(7), Some(7)) => Ok(with_step("1".to_string())),
        // `a-7` ends on Sunday, which the crate numbers first
        (Some(start), Some(7)) if step.is_none() => Ok(format!("{}-7,1", start + 1)),
        (Some(_), Some(7)) => Err(format!("day-of-week range `{item}` is not supported")),
        (Some(start), Some(end)) => Ok(with_step(format!(
            "{}-{}",
            shift_weekday(start),
            shift_weekday(end)
        ))),
        _ => Ok(item.to_string()),
    }
}

/// `Some(day)` for a numeric crontab weekday, `None` for names and `*`.
fn crontab_weekday(value: &str) -> Result<Option<u8>, String> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    match value.parse::<u8>() {
        Ok(day @ 0..=7) => Ok(Some(day)),
        _ => Err(format!("day-of-week `{value}` is outside 0-7")),
    }
}

fn shift_weekday(day: u8) -> u8 {
    match day {
        0 | 7 => 1,
        day => day + 1,
    }
}

/// A non-empty union of schedule specifications.
#[derive(Debug, Clone)]
pub struct Schedule {
    specs: Vec<ScheduleSpec>,
}

impl Schedule {
    pub fn new(specs: Vec<ScheduleSpec>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[ScheduleSpec] {
        &self.specs
    }

    /// Earliest instant at or after `now` satisfying any entry.
    ///
    /// `last_run` is the instant the previous cycle was scheduled for; it only
    /// matters to interval entries. `None` means no entry will ever fire again.
    pub fn next_after<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        last_run: Option<&DateTime<Tz>>,
    ) -> Option<DateTime<Tz>> {
        self.specs
            .iter()
            .filter_map(|spec| spec.next_after(now, last_run))
            .min()
    }
}

impl FromStr for Schedule {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let specs = input
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ScheduleSpec::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Schedule::new(specs)
    }
}
