//! Field-level (de)serializers for the GTFS encodings of times, dates and flags.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serializer};

const DATE_FORMAT: &str = "%Y%m%d";

/// Parses `H:MM:SS` or `HH:MM:SS` into seconds after midnight. Hours may exceed 24.
pub fn parse_time(s: &str) -> Result<u32> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 3 || parts[1].len() != 2 || parts[2].len() != 2 || parts[0].is_empty() {
        bail!("'{s}' is not a valid time; HH:MM:SS format is expected");
    }
    let hours: u32 = parts[0].parse()?;
    let minutes: u32 = parts[1].parse()?;
    let seconds: u32 = parts[2].parse()?;
    if minutes >= 60 || seconds >= 60 {
        bail!("'{s}' is not a valid time; minutes and seconds must be below 60");
    }
    hours
        .checked_mul(3600)
        .and_then(|x| x.checked_add(minutes * 60 + seconds))
        .ok_or_else(|| anyhow!("'{s}' is not a valid time; hours out of range"))
}

pub fn format_time(time: u32) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        time / 3600,
        time % 3600 / 60,
        time % 60
    )
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|err| anyhow!("date '{s}': {err}"))
}

pub fn deserialize_optional_time<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) if !s.trim().is_empty() => parse_time(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

pub fn serialize_optional_time<S: Serializer>(
    time: &Option<u32>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => s.serialize_str(&format_time(*t)),
        None => s.serialize_none(),
    }
}

pub fn deserialize_time<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let s = String::deserialize(d)?;
    parse_time(&s).map_err(serde::de::Error::custom)
}

pub fn serialize_time<S: Serializer>(time: &u32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_time(*time))
}

pub fn deserialize_date<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
    let s = String::deserialize(d)?;
    parse_date(&s).map_err(serde::de::Error::custom)
}

pub fn serialize_date<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&date.format(DATE_FORMAT).to_string())
}

pub fn deserialize_optional_date<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<NaiveDate>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) if !s.trim().is_empty() => parse_date(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

pub fn serialize_optional_date<S: Serializer>(
    date: &Option<NaiveDate>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => serialize_date(d, s),
        None => s.serialize_none(),
    }
}

pub fn parse_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let n = <u8>::deserialize(d)?;
    if n == 1 {
        return Ok(true);
    }
    if n == 0 {
        return Ok(false);
    }
    Err(serde::de::Error::custom(format!("Unknown bool value {n}")))
}

pub fn serialize_bool<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(u8::from(*value))
}
