use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::macros::format_description;
use time::{Date, Month, PrimitiveDateTime};

/// Calendar day used as the partition key, rendered as zero-padded `YYYY-MM-DD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u8, // 1..=12
    pub day: u8,   // 1..=31
}

impl CalendarDate {
    /// Build a date, rejecting days that do not exist (e.g. Feb 30).
    pub fn new(year: i32, month: u8, day: u8) -> Option<Self> {
        let m = Month::try_from(month).ok()?;
        Date::from_calendar_date(year, m, day).ok().map(Self::from_date)
    }

    pub fn from_date(d: Date) -> Self {
        Self { year: d.year(), month: u8::from(d.month()), day: d.day() }
    }

    pub fn of(ts: &PrimitiveDateTime) -> Self {
        Self::from_date(ts.date())
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for CalendarDate {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let d = Date::parse(s, format_description!("[year]-[month]-[day]"))
            .map_err(|e| format!("expected YYYY-MM-DD, got '{s}': {e}"))?;
        Ok(Self::from_date(d))
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(self)
    }
}

/// Parse a raw timestamp without any timezone arithmetic.
///
/// Accepted: `YYYY-MM-DD HH:MM[:SS[.fff]]` with a space or `T` separator, an
/// optional trailing `Z` / `+HH:MM` / `+HHMM` (dropped, the wall clock is kept),
/// or a bare `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(raw: &str) -> Option<PrimitiveDateTime> {
    let s = strip_utc_offset(raw.trim());
    if s.is_empty() {
        return None;
    }

    let formats = [
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    ];
    for fmt in formats {
        if let Ok(dt) = PrimitiveDateTime::parse(s, fmt) {
            return Some(dt);
        }
    }

    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight())
}

// Offsets only ever follow the time part, which starts after the 10-char date.
fn strip_utc_offset(s: &str) -> &str {
    if let Some(rest) = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        return rest.trim_end();
    }
    let b = s.as_bytes();
    let is_sign = |c: u8| c == b'+' || c == b'-';
    let digits = |r: &[u8]| r.iter().all(u8::is_ascii_digit);

    // +HH:MM
    if b.len() > 16 {
        let t = &b[b.len() - 6..];
        if is_sign(t[0]) && digits(&t[1..3]) && t[3] == b':' && digits(&t[4..6]) {
            return s[..s.len() - 6].trim_end();
        }
    }
    // +HHMM
    if b.len() > 15 {
        let t = &b[b.len() - 5..];
        if is_sign(t[0]) && digits(&t[1..5]) {
            return s[..s.len() - 5].trim_end();
        }
    }
    s
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS` (fractional seconds are not kept).
pub fn format_timestamp(ts: &PrimitiveDateTime) -> String {
    format!(
        "{} {:02}:{:02}:{:02}",
        CalendarDate::of(ts),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}
