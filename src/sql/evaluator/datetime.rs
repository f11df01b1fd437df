//! Date and time helpers for the evaluator.
//!
//! Temporal values travel as text (`YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`,
//! `HH:MM:SS`); naive timestamps are taken as UTC when converted to or from
//! Unix time.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::types::Value;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const TIME_FORMAT: &str = "%H:%M:%S";

const DATETIME_INPUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Parsed temporal value; `has_time` remembers whether the source carried a time part
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temporal {
    pub datetime: NaiveDateTime,
    pub has_time: bool,
}

impl Temporal {
    pub fn date(&self) -> NaiveDate {
        self.datetime.date()
    }

    /// Render back in the shape it came in
    pub fn render(&self) -> String {
        if self.has_time {
            self.datetime.format(DATETIME_FORMAT).to_string()
        } else {
            self.datetime.format(DATE_FORMAT).to_string()
        }
    }
}

/// Interpret a value as a date or datetime
pub fn parse_temporal(value: &Value) -> Option<Temporal> {
    match value {
        Value::Text(s) => parse_temporal_str(s.trim()),
        // 20240115 or 20240115103000
        Value::Integer(i) if *i > 0 => parse_temporal_str(&i.to_string()).or_else(|| {
            let digits = i.to_string();
            match digits.len() {
                8 => NaiveDate::parse_from_str(&digits, "%Y%m%d").ok().map(|d| Temporal {
                    datetime: d.and_time(NaiveTime::MIN),
                    has_time: false,
                }),
                14 => NaiveDateTime::parse_from_str(&digits, "%Y%m%d%H%M%S")
                    .ok()
                    .map(|datetime| Temporal { datetime, has_time: true }),
                _ => None,
            }
        }),
        _ => None,
    }
}

fn parse_temporal_str(s: &str) -> Option<Temporal> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(Temporal {
            datetime: dt.naive_utc(),
            has_time: true,
        });
    }
    for format in DATETIME_INPUTS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Temporal { datetime, has_time: true });
        }
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok().map(|d| Temporal {
        datetime: d.and_time(NaiveTime::MIN),
        has_time: false,
    })
}

/// Time of day from a TIME string or the time part of a datetime
pub fn parse_time(value: &Value) -> Option<NaiveTime> {
    if let Value::Text(s) = value {
        let s = s.trim();
        for format in ["%H:%M:%S%.f", "%H:%M"] {
            if let Ok(t) = NaiveTime::parse_from_str(s, format) {
                return Some(t);
            }
        }
    }
    parse_temporal(value).map(|t| t.datetime.time())
}

pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Interval units accepted by INTERVAL, DATE_ADD, EXTRACT and TIMESTAMPDIFF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Microsecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl IntervalUnit {
    pub fn parse(name: &str) -> Option<Self> {
        let unit = match name.to_ascii_uppercase().trim_end_matches('S') {
            "MICROSECOND" => IntervalUnit::Microsecond,
            "SECOND" => IntervalUnit::Second,
            "MINUTE" => IntervalUnit::Minute,
            "HOUR" => IntervalUnit::Hour,
            "DAY" => IntervalUnit::Day,
            "WEEK" => IntervalUnit::Week,
            "MONTH" => IntervalUnit::Month,
            "QUARTER" => IntervalUnit::Quarter,
            "YEAR" => IntervalUnit::Year,
            _ => return None,
        };
        Some(unit)
    }

    fn is_sub_day(&self) -> bool {
        matches!(
            self,
            IntervalUnit::Microsecond | IntervalUnit::Second | IntervalUnit::Minute | IntervalUnit::Hour
        )
    }
}

/// `t + amount unit`; month arithmetic clamps to the end of the month
pub fn add_interval(t: Temporal, amount: i64, unit: IntervalUnit) -> Option<Temporal> {
    let dt = t.datetime;
    let shifted = match unit {
        IntervalUnit::Microsecond => dt.checked_add_signed(Duration::microseconds(amount)),
        IntervalUnit::Second => dt.checked_add_signed(Duration::try_seconds(amount)?),
        IntervalUnit::Minute => dt.checked_add_signed(Duration::try_minutes(amount)?),
        IntervalUnit::Hour => dt.checked_add_signed(Duration::try_hours(amount)?),
        IntervalUnit::Day => dt.checked_add_signed(Duration::try_days(amount)?),
        IntervalUnit::Week => dt.checked_add_signed(Duration::try_weeks(amount)?),
        IntervalUnit::Month => add_months(dt, amount),
        IntervalUnit::Quarter => add_months(dt, amount.checked_mul(3)?),
        IntervalUnit::Year => add_months(dt, amount.checked_mul(12)?),
    }?;
    Some(Temporal {
        datetime: shifted,
        has_time: t.has_time || unit.is_sub_day(),
    })
}

fn add_months(dt: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        dt.checked_add_months(magnitude)
    } else {
        dt.checked_sub_months(magnitude)
    }
}

/// TIMESTAMPDIFF(unit, start, end): whole units from `start` to `end`
pub fn diff(unit: IntervalUnit, start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    let delta = end - start;
    match unit {
        IntervalUnit::Microsecond => delta.num_microseconds().unwrap_or(i64::MAX),
        IntervalUnit::Second => delta.num_seconds(),
        IntervalUnit::Minute => delta.num_minutes(),
        IntervalUnit::Hour => delta.num_hours(),
        IntervalUnit::Day => delta.num_days(),
        IntervalUnit::Week => delta.num_weeks(),
        IntervalUnit::Month => month_diff(start, end),
        IntervalUnit::Quarter => month_diff(start, end) / 3,
        IntervalUnit::Year => month_diff(start, end) / 12,
    }
}

fn month_diff(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    let mut months =
        (end.year() as i64 - start.year() as i64) * 12 + end.month() as i64 - start.month() as i64;
    // A month only counts once the day/time of month has been reached
    let start_rest = (start.day(), start.time());
    let end_rest = (end.day(), end.time());
    if months > 0 && end_rest < start_rest {
        months -= 1;
    } else if months < 0 && end_rest > start_rest {
        months += 1;
    }
    months
}

/// EXTRACT(unit FROM t)
pub fn extract(unit: IntervalUnit, dt: &NaiveDateTime) -> i64 {
    match unit {
        IntervalUnit::Microsecond => (dt.nanosecond() / 1000) as i64,
        IntervalUnit::Second => dt.second() as i64,
        IntervalUnit::Minute => dt.minute() as i64,
        IntervalUnit::Hour => dt.hour() as i64,
        IntervalUnit::Day => dt.day() as i64,
        IntervalUnit::Week => dt.iso_week().week() as i64,
        IntervalUnit::Month => dt.month() as i64,
        IntervalUnit::Quarter => ((dt.month() - 1) / 3 + 1) as i64,
        IntervalUnit::Year => dt.year() as i64,
    }
}

pub fn last_day(date: NaiveDate) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}

const DAY_NAMES: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];

pub fn day_name(date: NaiveDate) -> &'static str {
    DAY_NAMES[date.weekday().num_days_from_monday() as usize]
}

pub fn month_name(date: NaiveDate) -> &'static str {
    MONTH_NAMES[date.month0() as usize]
}

/// MySQL DATE_FORMAT specifiers
pub fn date_format(dt: &NaiveDateTime, format: &str) -> String {
    let mut out = String::with_capacity(format.len() + 8);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(spec) = chars.next() else {
            out.push('%');
            break;
        };
        let date = dt.date();
        match spec {
            'Y' => out.push_str(&format!("{:04}", dt.year())),
            'y' => out.push_str(&format!("{:02}", dt.year().rem_euclid(100))),
            'm' => out.push_str(&format!("{:02}", dt.month())),
            'c' => out.push_str(&dt.month().to_string()),
            'd' => out.push_str(&format!("{:02}", dt.day())),
            'e' => out.push_str(&dt.day().to_string()),
            'H' => out.push_str(&format!("{:02}", dt.hour())),
            'h' | 'I' => out.push_str(&format!("{:02}", dt.hour12().1)),
            'i' => out.push_str(&format!("{:02}", dt.minute())),
            's' | 'S' => out.push_str(&format!("{:02}", dt.second())),
            'f' => out.push_str(&format!("{:06}", dt.nanosecond() / 1000)),
            'p' => out.push_str(if dt.hour12().0 { "PM" } else { "AM" }),
            'W' => out.push_str(day_name(date)),
            'a' => out.push_str(&day_name(date)[..3]),
            'w' => out.push_str(&date.weekday().num_days_from_sunday().to_string()),
            'M' => out.push_str(month_name(date)),
            'b' => out.push_str(&month_name(date)[..3]),
            'j' => out.push_str(&format!("{:03}", dt.ordinal())),
            'T' => out.push_str(&dt.format(TIME_FORMAT).to_string()),
            '%' => out.push('%'),
            other => out.push(other),
        }
    }
    out
}
