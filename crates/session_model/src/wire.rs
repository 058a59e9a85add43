//! Lenient decoding helpers for backend field encodings.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

/// Parse a backend timestamp.
///
/// Accepts RFC 3339, and naive ISO 8601 / SQLite `YYYY-MM-DD HH:MM:SS[.ffffff]`
/// values which are interpreted as UTC.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(parsed);
    }

    let normalized = value.replacen(' ', "T", 1);
    let (base, fraction) = match normalized.split_once('.') {
        Some((base, fraction)) => (base, Some(fraction)),
        None => (normalized.as_str(), None),
    };

    let primitive = PrimitiveDateTime::parse(
        base,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .ok()?;
    let nanos = match fraction {
        Some(digits) => parse_fraction_nanos(digits)?,
        None => 0,
    };

    Some(primitive.assume_utc() + Duration::nanoseconds(nanos))
}

fn parse_fraction_nanos(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    let significant = &digits[..digits.len().min(9)];
    let value: i64 = significant.parse().ok()?;
    let scale = 10_i64.pow(9 - significant.len() as u32);
    Some(value * scale)
}

pub fn format_timestamp(value: &OffsetDateTime) -> Result<String, time::error::Format> {
    value.format(&Rfc3339)
}

/// Serde adapter for required timestamps.
pub mod timestamp {
    use super::*;

    pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = format_timestamp(value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    /// Serde adapter for optional timestamps; `null` and absent both decode to `None`.
    pub mod option {
        use super::*;

        pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => parse_timestamp(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
            }
        }
    }
}

/// Serde adapter for SQLite-style flags (`true`, `1`, `"1"`, `null`).
pub mod flag {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawFlag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<RawFlag>::deserialize(deserializer)? {
            None => false,
            Some(RawFlag::Bool(value)) => value,
            Some(RawFlag::Int(value)) => value != 0,
            Some(RawFlag::Text(value)) => {
                matches!(value.trim(), "1" | "true" | "TRUE" | "True")
            }
        })
    }
}
