//! Five-field cron evaluator
//!
//! The donor workspace's scheduler only ever fires off filesystem-change
//! debounce timers; it has no cron analogue, so this is written fresh, in
//! the style of `gateway-core::config`'s validated-at-parse-time newtypes:
//! parsing happens once, at `Task` save time, and a malformed expression
//! never reaches the tick loop.
//!
//! Supports the usual five fields (minute, hour, day-of-month, month,
//! day-of-week) with `*`, comma lists, `a-b` ranges, and `*/n` steps,
//! combined per field with OR within the field and AND across fields.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("cron expression must have 5 fields, got {0}")]
    WrongFieldCount(usize),

    #[error("invalid cron field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// One parsed field: the set of values (within the field's valid range)
/// that satisfy it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldSpec {
    values: Vec<u32>,
}

impl FieldSpec {
    fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }

    fn parse(raw: &str, min: u32, max: u32) -> Result<Self, String> {
        let mut values = Vec::new();
        for part in raw.split(',') {
            values.extend(Self::parse_part(part, min, max)?);
        }
        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            return Err("field matches no values".to_string());
        }
        Ok(Self { values })
    }

    fn parse_part(part: &str, min: u32, max: u32) -> Result<Vec<u32>, String> {
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => (r, Some(s.parse::<u32>().map_err(|_| format!("bad step '{s}'"))?)),
            None => (part, None),
        };
        if step == Some(0) {
            return Err("step cannot be 0".to_string());
        }

        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            let lo = a.parse::<u32>().map_err(|_| format!("bad range start '{a}'"))?;
            let hi = b.parse::<u32>().map_err(|_| format!("bad range end '{b}'"))?;
            (lo, hi)
        } else {
            let v = range_part.parse::<u32>().map_err(|_| format!("bad value '{range_part}'"))?;
            (v, v)
        };

        if lo < min || hi > max || lo > hi {
            return Err(format!("range {lo}-{hi} out of bounds {min}-{max}"));
        }

        let step = step.unwrap_or(1);
        Ok((lo..=hi).step_by(step as usize).collect())
    }
}

/// A parsed five-field cron expression (design note §4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minute: FieldSpec,
    hour: FieldSpec,
    day_of_month: FieldSpec,
    month: FieldSpec,
    day_of_week: FieldSpec,
}

impl CronSchedule {
    pub fn parse(
        minute: &str,
        hour: &str,
        day_of_month: &str,
        month: &str,
        day_of_week: &str,
    ) -> Result<Self, CronError> {
        let field = |name: &str, raw: &str, min: u32, max: u32| {
            FieldSpec::parse(raw, min, max).map_err(|reason| CronError::InvalidField {
                field: name.to_string(),
                reason,
            })
        };

        Ok(Self {
            minute: field("minute", minute, 0, 59)?,
            hour: field("hour", hour, 0, 23)?,
            day_of_month: field("day_of_month", day_of_month, 1, 31)?,
            month: field("month", month, 1, 12)?,
            // 0 and 7 both mean Sunday.
            day_of_week: field("day_of_week", day_of_week, 0, 7)?,
        })
    }

    fn matches(&self, at: DateTime<Utc>) -> bool {
        let dow = at.weekday().num_days_from_sunday();
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.day_of_month.matches(at.day())
            && self.month.matches(at.month())
            && (self.day_of_week.matches(dow) || (dow == 0 && self.day_of_week.matches(7)))
    }

    /// The first minute boundary strictly after `after` that satisfies the
    /// expression. Searches up to four years ahead before giving up, which
    /// only matters for pathological expressions like `30 2 29 2 *`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = Utc
            .with_ymd_and_hms(after.year(), after.month(), after.day(), after.hour(), after.minute(), 0)
            .single()?
            + Duration::minutes(1);

        let limit = start + Duration::days(4 * 365);
        let mut candidate = start;
        while candidate < limit {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}
