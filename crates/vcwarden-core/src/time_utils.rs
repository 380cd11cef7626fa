use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Converts a Unix millisecond timestamp into wall-clock time for `timezone`.
pub fn local_datetime(unix_ms: u64, timezone: Tz) -> Option<DateTime<Tz>> {
    timezone
        .timestamp_millis_opt(i64::try_from(unix_ms).ok()?)
        .single()
}

/// Renders a remaining wait as `4m 59s`, or `12s` under a minute.
///
/// Seconds round up so a wait of 200ms reads `1s` rather than `0s`.
pub fn format_remaining_wait(remaining_ms: u64) -> String {
    let minutes = remaining_ms / 60_000;
    let seconds = (remaining_ms % 60_000).div_ceil(1_000);
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Discord inline timestamp styles used in outbound text.
pub enum DiscordTimestampStyle {
    ShortTime,
    Relative,
}

/// Formats a `<t:unix:style>` token that clients render in the reader's own zone.
pub fn discord_timestamp(unix_seconds: i64, style: DiscordTimestampStyle) -> String {
    let flag = match style {
        DiscordTimestampStyle::ShortTime => 't',
        DiscordTimestampStyle::Relative => 'R',
    };
    format!("<t:{unix_seconds}:{flag}>")
}
