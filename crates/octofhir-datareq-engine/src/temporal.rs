//! Temporal literal values carried by date filters

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{DataRequirementsError, DataRequirementsResult};

/// Precision of a partial date/time literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DateTimePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

/// Date or date/time literal of any precision, kept in its ISO 8601 form
/// (`2019`, `2019-01`, `2019-01-01T10:30:00.000Z`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialDateTime(String);

impl PartialDateTime {
    /// Parse a CQL or ISO literal.
    ///
    /// A CQL literal (`@` prefix) may end in a bare `T` (`@2019-01-01T`),
    /// which is stored as the date alone. ISO text must carry a time after
    /// any `T`.
    pub fn parse(text: &str) -> DataRequirementsResult<Self> {
        let trimmed = text.trim();
        let (iso, cql) = match trimmed.strip_prefix('@') {
            Some(rest) => (rest, true),
            None => (trimmed, false),
        };
        let invalid = || DataRequirementsError::invalid_temporal("DateTime", text);

        let (date, time) = match iso.split_once('T') {
            Some((date, time)) => (date, Some(time)),
            None => (iso, None),
        };
        validate_date(date).ok_or_else(invalid)?;
        match time {
            None => Ok(Self(iso.to_string())),
            Some("") if cql => Ok(Self(date.to_string())),
            Some("") => Err(invalid()),
            Some(time) => {
                validate_time(time).ok_or_else(invalid)?;
                Ok(Self(iso.to_string()))
            }
        }
    }

    /// Assemble from integer components (year first) and an optional
    /// timezone offset in hours
    pub fn from_components(
        components: &[i64],
        offset_hours: Option<f64>,
    ) -> DataRequirementsResult<Self> {
        let mut text = String::new();
        for (i, value) in components.iter().enumerate() {
            match i {
                0 => text.push_str(&format!("{value:04}")),
                1 | 2 => text.push_str(&format!("-{value:02}")),
                3 => text.push_str(&format!("T{value:02}")),
                4 | 5 => text.push_str(&format!(":{value:02}")),
                6 => text.push_str(&format!(".{value:03}")),
                _ => return Err(DataRequirementsError::invalid_temporal("DateTime", text)),
            }
        }
        if let Some(offset) = offset_hours.filter(|_| components.len() > 3) {
            let minutes = (offset * 60.0).round() as i64;
            let sign = if minutes < 0 { '-' } else { '+' };
            text.push_str(&format!(
                "{sign}{:02}:{:02}",
                minutes.abs() / 60,
                minutes.abs() % 60
            ));
        }
        Self::parse(&text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn precision(&self) -> DateTimePrecision {
        let (date, time) = match self.0.split_once('T') {
            Some((date, time)) => (date, time),
            None => (self.0.as_str(), ""),
        };
        let time = strip_offset(time);
        match (date.matches('-').count(), time.matches(':').count()) {
            (0, _) => DateTimePrecision::Year,
            (1, _) => DateTimePrecision::Month,
            _ if time.is_empty() => DateTimePrecision::Day,
            (_, 0) => DateTimePrecision::Hour,
            (_, 1) => DateTimePrecision::Minute,
            _ if time.contains('.') => DateTimePrecision::Millisecond,
            _ => DateTimePrecision::Second,
        }
    }
}

impl std::fmt::Display for PartialDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_date(date: &str) -> Option<()> {
    let parts: Vec<&str> = date.split('-').collect();
    if parts[0].len() != 4 || !parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    match parts.len() {
        1 => Some(()),
        2 => NaiveDate::parse_from_str(&format!("{date}-01"), "%Y-%m-%d").ok().map(drop),
        3 => NaiveDate::parse_from_str(date, "%Y-%m-%d").ok().map(drop),
        _ => None,
    }
}

fn strip_offset(time: &str) -> &str {
    if let Some(stripped) = time.strip_suffix('Z') {
        return stripped;
    }
    match time.rfind(['+', '-']) {
        Some(idx) => &time[..idx],
        None => time,
    }
}

fn validate_time(time: &str) -> Option<()> {
    let clock = strip_offset(time);
    let offset = &time[clock.len()..];
    if !offset.is_empty() && offset != "Z" {
        let (hours, minutes) = offset[1..].split_once(':')?;
        let hours: u32 = hours.parse().ok()?;
        let minutes: u32 = minutes.parse().ok()?;
        if hours > 14 || minutes > 59 {
            return None;
        }
    }
    let (clock, fraction) = clock.split_once('.').unwrap_or((clock, "0"));
    if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let padded = match clock.matches(':').count() {
        0 => format!("{clock}:00:00"),
        1 => format!("{clock}:00"),
        _ => clock.to_string(),
    };
    NaiveTime::parse_from_str(&padded, "%H:%M:%S").ok().map(drop)
}

/// Start and end of a period; either bound may be open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<PartialDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<PartialDateTime>,
}

impl Period {
    /// Parse `Interval[@2019-01-01, @2020-01-01)`; `null` bounds are open
    pub fn parse(text: &str) -> DataRequirementsResult<Self> {
        let invalid = || DataRequirementsError::invalid_temporal("Interval", text);
        let body = text.trim();
        let body = body.strip_prefix("Interval").unwrap_or(body).trim();
        let body = body
            .strip_prefix(['[', '('])
            .and_then(|b| b.strip_suffix([']', ')']))
            .ok_or_else(invalid)?;
        let (low, high) = body.split_once(',').ok_or_else(invalid)?;
        let bound = |s: &str| match s.trim() {
            "" | "null" => Ok(None),
            value => PartialDateTime::parse(value).map(Some),
        };
        Ok(Self {
            start: bound(low)?,
            end: bound(high)?,
        })
    }
}

/// Value of a date filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalValue {
    #[serde(rename = "valueDateTime")]
    DateTime(PartialDateTime),
    #[serde(rename = "valuePeriod")]
    Period(Period),
}
