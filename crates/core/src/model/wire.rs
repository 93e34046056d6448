//! Serde helpers for the timestamp formats the API emits.
//!
//! The backend serializes zone-less local date-times
//! (`2024-03-01T10:15:30.123`) while some endpoints already use RFC 3339.
//! Both are accepted; zone-less values are read as UTC. Output is always
//! RFC 3339.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an API timestamp.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub mod timestamp {
    use super::{DateTime, Deserialize, Deserializer, Serializer, Utc, parse_timestamp};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

pub mod option_timestamp {
    use super::{DateTime, Deserialize, Deserializer, Serializer, Utc, parse_timestamp};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => s.serialize_str(&at.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
        }
    }
}

/// Booleans that older endpoints send as `"true"`/`"false"` strings or `null`.
pub mod flag {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            None => Ok(false),
            Some(Raw::Bool(value)) => Ok(value),
            Some(Raw::Text(text)) => match text.trim() {
                "true" | "TRUE" | "True" | "1" => Ok(true),
                "false" | "FALSE" | "False" | "0" | "" => Ok(false),
                other => Err(serde::de::Error::custom(format!("invalid flag: {other}"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_with_offset() {
        let at = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn parses_zone_less_local_time_as_utc() {
        let at = parse_timestamp("2024-03-01T10:15:30.123").unwrap();
        assert_eq!(at.timestamp(), Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap().timestamp());
    }

    #[derive(serde::Deserialize)]
    struct Flagged {
        #[serde(default, deserialize_with = "flag::deserialize")]
        done: bool,
    }

    #[test]
    fn flag_accepts_strings_and_null() {
        let parse = |json: &str| serde_json::from_str::<Flagged>(json).unwrap().done;
        assert!(parse(r#"{"done": true}"#));
        assert!(parse(r#"{"done": "true"}"#));
        assert!(!parse(r#"{"done": null}"#));
        assert!(!parse(r#"{}"#));
        assert!(serde_json::from_str::<Flagged>(r#"{"done": "maybe"}"#).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
    }
}
