use chrono::{NaiveDate, NaiveTime};

/// Wire format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Wire format for slot times.
pub const TIME_FORMAT: &str = "%H:%M";

/// Parse a backend date, ignoring any time-of-day suffix.
///
/// Accepts `2025-01-15`, `2025-01-15T00:00:00Z`, `2025-01-15T08:30:00.000+08:00`
/// and `2025-01-15 00:00:00`. The calendar day is taken as written; no timezone
/// shift is applied.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(raw);
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, TIME_FORMAT))
        .ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/* -------------------------
   serde adapters
--------------------------*/

pub mod flexible_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::normalize_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date: {raw}")))
    }
}

pub mod flexible_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).ok_or_else(|| D::Error::custom(format!("invalid time: {raw}")))
    }
}
