//! Night/day cycle arithmetic for the `night` status command.
//!
//! The in-game cycle repeats forever from a fixed local anchor: `night_minutes`
//! of night followed by `day_minutes` of day.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::VcWardenError;

const DEFAULT_NIGHT_ANCHOR: &str = "2025-01-06T22:00:00";
const DEFAULT_NIGHT_MINUTES: u32 = 30;
const DEFAULT_DAY_MINUTES: u32 = 120;

static MILITARY_TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]?[0-9]|2[0-3])([0-5][0-9])$").expect("military time regex is valid")
});
static CLOCK_TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(1[0-2]|0?[1-9])(?::([0-5][0-9]))?\s*([AaPp])[Mm]$")
        .expect("clock time regex is valid")
});
static SHORT_DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2})$").expect("short date regex is valid")
});

const INVALID_TIME_MESSAGE: &str =
    "Invalid time format. Please use \"HH:MM AM/PM\" or \"HHMM\" (military time)";
const INVALID_DATE_MESSAGE: &str = "Invalid date format. Please use \"MM/DD/YY\" or \"M/D/YY\"";

fn default_anchor() -> String {
    DEFAULT_NIGHT_ANCHOR.to_string()
}

fn default_night_minutes() -> u32 {
    DEFAULT_NIGHT_MINUTES
}

fn default_day_minutes() -> u32 {
    DEFAULT_DAY_MINUTES
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `NightCycleConfig` used across vcwarden components.
pub struct NightCycleConfig {
    /// Local start of some night, `YYYY-MM-DDTHH:MM:SS` in the config timezone.
    #[serde(default = "default_anchor")]
    pub anchor: String,
    #[serde(default = "default_night_minutes")]
    pub night_minutes: u32,
    #[serde(default = "default_day_minutes")]
    pub day_minutes: u32,
}

impl Default for NightCycleConfig {
    fn default() -> Self {
        Self {
            anchor: default_anchor(),
            night_minutes: DEFAULT_NIGHT_MINUTES,
            day_minutes: DEFAULT_DAY_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightCycle {
    anchor: DateTime<Tz>,
    night_seconds: i64,
    cycle_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightCycleStatus {
    pub is_night: bool,
    pub seconds_into_cycle: i64,
    pub seconds_until_next_night: i64,
    /// Present only while a night is running.
    pub seconds_left_in_night: Option<i64>,
    pub previous_night_start: DateTime<Tz>,
    pub next_night_start: DateTime<Tz>,
}

impl NightCycle {
    pub fn from_config(config: &NightCycleConfig, timezone: Tz) -> Result<Self, VcWardenError> {
        if config.night_minutes == 0 || config.day_minutes == 0 {
            return Err(VcWardenError::Config(
                "night cycle durations must be greater than 0".to_string(),
            ));
        }
        let naive = NaiveDateTime::parse_from_str(config.anchor.trim(), "%Y-%m-%dT%H:%M:%S")
            .map_err(|error| {
                VcWardenError::Config(format!(
                    "invalid night cycle anchor '{}': {error}",
                    config.anchor
                ))
            })?;
        let anchor = timezone
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| {
                VcWardenError::Config(format!(
                    "night cycle anchor '{}' does not exist in {}",
                    config.anchor,
                    timezone.name()
                ))
            })?;
        Ok(Self {
            anchor,
            night_seconds: i64::from(config.night_minutes) * 60,
            cycle_seconds: i64::from(config.night_minutes + config.day_minutes) * 60,
        })
    }

    pub fn status_at(&self, target: &DateTime<Tz>) -> NightCycleStatus {
        let elapsed = target
            .signed_duration_since(self.anchor)
            .num_seconds();
        let position = elapsed.rem_euclid(self.cycle_seconds);
        let is_night = position < self.night_seconds;
        let previous_night_start = *target - Duration::seconds(position);
        NightCycleStatus {
            is_night,
            seconds_into_cycle: position,
            seconds_until_next_night: self.cycle_seconds - position,
            seconds_left_in_night: is_night.then(|| self.night_seconds - position),
            previous_night_start,
            next_night_start: previous_night_start + Duration::seconds(self.cycle_seconds),
        }
    }
}

/// Maps a US zone label (EST, CST, MST, PST) to its IANA zone. Unknown labels fall back to Eastern.
pub fn zone_for_label(label: &str) -> Tz {
    match label.trim().to_ascii_uppercase().as_str() {
        "CST" => chrono_tz::America::Chicago,
        "MST" => chrono_tz::America::Denver,
        "PST" => chrono_tz::America::Los_Angeles,
        _ => chrono_tz::America::New_York,
    }
}

/// Resolves the instant a user asked about.
///
/// With no date the day of `now` (in `zone`) is used; with no time the instant is
/// `now` itself, or midnight of the given date.
pub fn parse_time_input(
    time: Option<&str>,
    date: Option<&str>,
    zone: Tz,
    now: DateTime<Tz>,
) -> Result<DateTime<Tz>, VcWardenError> {
    let now = now.with_timezone(&zone);
    let date = date.map(str::trim).filter(|value| !value.is_empty());
    let time = time.map(str::trim).filter(|value| !value.is_empty());

    let day = match date {
        Some(raw) => parse_short_date(raw)?,
        None => now.date_naive(),
    };

    let clock = match time {
        Some(raw) => parse_clock_time(raw)?,
        None if date.is_some() => NaiveTime::MIN,
        None => return Ok(now),
    };

    zone.from_local_datetime(&day.and_time(clock))
        .earliest()
        .ok_or_else(|| VcWardenError::validation(INVALID_TIME_MESSAGE))
}

fn parse_short_date(raw: &str) -> Result<NaiveDate, VcWardenError> {
    let captures = SHORT_DATE_REGEX
        .captures(raw)
        .ok_or_else(|| VcWardenError::validation(INVALID_DATE_MESSAGE))?;
    let month = captures[1].parse::<u32>().unwrap_or(0);
    let day = captures[2].parse::<u32>().unwrap_or(0);
    let year = 2000 + captures[3].parse::<i32>().unwrap_or(0);
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| VcWardenError::validation(INVALID_DATE_MESSAGE))
}

fn parse_clock_time(raw: &str) -> Result<NaiveTime, VcWardenError> {
    if let Some(captures) = MILITARY_TIME_REGEX.captures(raw) {
        let hour = captures[1].parse::<u32>().unwrap_or(0);
        let minute = captures[2].parse::<u32>().unwrap_or(0);
        return NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| VcWardenError::validation(INVALID_TIME_MESSAGE));
    }
    if let Some(captures) = CLOCK_TIME_REGEX.captures(raw) {
        let hour12 = captures[1].parse::<u32>().unwrap_or(0);
        let minute = captures
            .get(2)
            .and_then(|value| value.as_str().parse::<u32>().ok())
            .unwrap_or(0);
        let is_pm = captures[3].eq_ignore_ascii_case("p");
        let hour = match (hour12, is_pm) {
            (12, false) => 0,
            (12, true) => 12,
            (value, true) => value + 12,
            (value, false) => value,
        };
        return NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| VcWardenError::validation(INVALID_TIME_MESSAGE));
    }
    Err(VcWardenError::validation(INVALID_TIME_MESSAGE))
}

/// Renders whole minutes as `1h 5m` or `45m`.
pub fn format_cycle_duration(seconds: i64) -> String {
    let minutes = seconds.max(0) / 60;
    let hours = minutes / 60;
    let remainder = minutes % 60;
    if hours > 0 {
        format!("{hours}h {remainder}m")
    } else {
        format!("{remainder}m")
    }
}
