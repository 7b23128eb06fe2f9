// Schedule time parsing and next firing calculation
//
// Schedule times are either "HH:MM" (daily) or a standard 5-field cron
// expression (min hour dom mon dow). Both are converted to the `cron` crate's
// seconds-first form and evaluated in a configured timezone.

use crate::errors::ScheduleError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

const WEEKDAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

fn hh_mm_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("Invalid regex pattern"))
}

/// A single recurring time of day (or cron expression) to run checks at
#[derive(Debug, Clone)]
pub struct TimeSpec {
    source: String,
    expression: String,
    schedule: CronSchedule,
}

impl TimeSpec {
    /// Parse "HH:MM", a 5-field cron expression, or a 6/7-field expression
    /// already in seconds-first form.
    pub fn parse(spec: &str) -> Result<Self, ScheduleError> {
        let trimmed = spec.trim();
        let expression = to_cron_expression(trimmed)?;
        let schedule = parse_cron_expression(&expression)?;

        Ok(Self {
            source: trimmed.to_string(),
            expression,
            schedule,
        })
    }

    /// The string this spec was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Equivalent seconds-first cron expression
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next firing strictly after `after`, evaluated in `timezone`
    pub fn next_after(&self, after: DateTime<Utc>, timezone: Tz) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|next| next.with_timezone(&Utc))
    }
}

/// Earliest next firing across all specs
pub fn next_fire_time(
    specs: &[TimeSpec],
    timezone: Tz,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    specs
        .iter()
        .filter_map(|spec| spec.next_after(after, timezone))
        .min()
        .ok_or_else(|| {
            let sources: Vec<&str> = specs.iter().map(TimeSpec::source).collect();
            ScheduleError::NoNextExecution(sources.join(", "))
        })
}

/// Parse and validate a seconds-first cron expression
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    CronSchedule::from_str(expression).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    Tz::from_str(name).map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// Default timezone for schedule times
pub fn default_timezone() -> Tz {
    chrono_tz::Asia::Tokyo
}

fn invalid_spec(spec: &str, reason: impl Into<String>) -> ScheduleError {
    ScheduleError::InvalidTimeSpec {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

fn to_cron_expression(spec: &str) -> Result<String, ScheduleError> {
    let fields: Vec<&str> = spec.split_whitespace().collect();

    match fields.len() {
        5 => {
            let weekdays = translate_weekdays(fields[4])
                .ok_or_else(|| invalid_spec(spec, "day of week must be 0-7 or a name"))?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], weekdays
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        1 => {
            let captures = hh_mm_pattern()
                .captures(spec)
                .ok_or_else(|| invalid_spec(spec, "expected HH:MM or a cron expression"))?;
            let hour: u32 = captures[1]
                .parse()
                .map_err(|_| invalid_spec(spec, "hour is not a number"))?;
            let minute: u32 = captures[2]
                .parse()
                .map_err(|_| invalid_spec(spec, "minute is not a number"))?;

            if hour > 23 {
                return Err(invalid_spec(spec, "hour must be between 0 and 23"));
            }
            if minute > 59 {
                return Err(invalid_spec(spec, "minute must be between 0 and 59"));
            }
            Ok(format!("0 {} {} * * *", minute, hour))
        }
        _ => Err(invalid_spec(spec, "expected HH:MM or a cron expression")),
    }
}

/// Rewrite numeric weekdays (0 and 7 = Sunday) as names, which the cron crate
/// reads unambiguously. Step values after '/' are left as numbers.
fn translate_weekdays(field: &str) -> Option<String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();
    let mut after_slash = false;

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            let mut digits = c.to_string();
            while let Some(&next) = chars.peek() {
                if !next.is_ascii_digit() {
                    break;
                }
                digits.push(next);
                chars.next();
            }

            if after_slash {
                out.push_str(&digits);
            } else {
                let day: usize = digits.parse().ok()?;
                out.push_str(WEEKDAY_NAMES.get(day)?);
            }
            after_slash = false;
        } else {
            after_slash = c == '/';
            out.push(c);
        }
    }

    Some(out)
}
