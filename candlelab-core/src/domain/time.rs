//! Millisecond timestamps and their ISO-8601 rendering.
//!
//! Candles and trades carry integer epoch milliseconds internally. Every
//! serialized artifact renders them as RFC 3339 strings with millisecond
//! precision; deserialization accepts either form.

use chrono::{DateTime, SecondsFormat, Utc};

/// Epoch milliseconds (UTC).
pub type TimestampMs = i64;

pub fn to_datetime(ts: TimestampMs) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts)
}

/// Render a timestamp as `2024-01-02T03:04:05.000Z`.
///
/// Out-of-range values fall back to the raw integer.
pub fn to_iso(ts: TimestampMs) -> String {
    match to_datetime(ts) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ts.to_string(),
    }
}

pub fn parse_iso(s: &str) -> Option<TimestampMs> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Serde adapter: `TimestampMs` <-> ISO-8601 string.
pub mod iso_millis {
    use super::{parse_iso, to_iso, TimestampMs};
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Iso(String),
        Millis(i64),
    }

    pub fn serialize<S: Serializer>(ts: &TimestampMs, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_iso(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<TimestampMs, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Millis(ms) => Ok(ms),
            Repr::Iso(s) => parse_iso(&s)
                .ok_or_else(|| de::Error::custom(format!("invalid ISO-8601 timestamp: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_has_millisecond_precision() {
        assert_eq!(to_iso(1_704_067_200_123), "2024-01-01T00:00:00.123Z");
    }

    #[test]
    fn parse_accepts_offsets() {
        assert_eq!(parse_iso("2024-01-01T01:00:00+01:00"), Some(1_704_067_200_000));
        assert_eq!(parse_iso("not a date"), None);
    }

    #[test]
    fn adapter_accepts_integer_and_string() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "iso_millis")]
            ts: TimestampMs,
        }

        let a: Wrapper = serde_json::from_str(r#"{"ts": 1704067200000}"#).unwrap();
        let b: Wrapper = serde_json::from_str(r#"{"ts": "2024-01-01T00:00:00.000Z"}"#).unwrap();
        assert_eq!(a.ts, b.ts);
    }
}
