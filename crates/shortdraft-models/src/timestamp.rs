//! Timestamp formatting utilities.
//!
//! All formatters truncate toward zero rather than rounding, so a segment
//! never appears to start later than it does.

/// Format seconds as `HH:MM:SS`, dropping the fractional part.
///
/// # Examples
/// ```
/// use shortdraft_models::timestamp::format_hms;
/// assert_eq!(format_hms(3661.0), "01:01:01");
/// assert_eq!(format_hms(65.9), "00:01:05");
/// ```
pub fn format_hms(total_secs: f64) -> String {
    let whole = total_secs.max(0.0) as u64;
    let hours = whole / 3600;
    let mins = (whole % 3600) / 60;
    let secs = whole % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Format seconds as an SRT cue time, `HH:MM:SS,mmm`.
///
/// # Examples
/// ```
/// use shortdraft_models::timestamp::format_srt_time;
/// assert_eq!(format_srt_time(3661.5), "01:01:01,500");
/// ```
pub fn format_srt_time(total_secs: f64) -> String {
    // Small epsilon so values like 5.1 do not print as 5.099
    let total_ms = (total_secs.max(0.0) * 1000.0 + 1e-6).floor() as u64;
    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

/// Format seconds as `M:SS.ss`, minutes unpadded.
///
/// # Examples
/// ```
/// use shortdraft_models::timestamp::format_minutes_seconds;
/// assert_eq!(format_minutes_seconds(81.23), "1:21.23");
/// ```
pub fn format_minutes_seconds(total_secs: f64) -> String {
    let total_secs = total_secs.max(0.0);
    let minutes = (total_secs / 60.0).floor() as u64;
    let remaining = total_secs - (minutes as f64) * 60.0;
    format!("{}:{:05.2}", minutes, remaining)
}
