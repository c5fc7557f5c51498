//! Serde helpers for the string-encoded scalars used by record and config files.
//!
//! Existing records store numbers (`"expiry": "1700000000"`) and flags
//! (`"use_client_credentials": "true"`) as JSON strings. Writers keep that
//! encoding; readers also accept native JSON numbers and booleans.

use serde::{Deserialize, Deserializer, Serializer};

/// Any JSON scalar, normalised to text before interpretation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    pub(crate) fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Integer(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

/// Parses a decimal integer, tolerating surrounding whitespace.
pub(crate) fn parse_decimal(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// Parses a lifetime in seconds. Fractional values are truncated toward zero.
pub(crate) fn parse_seconds(text: &str) -> Option<i64> {
    parse_decimal(text).or_else(|| {
        let secs: f64 = text.trim().parse().ok()?;
        if !secs.is_finite() || secs.abs() >= 9.0e18 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let whole = secs.trunc() as i64;
        Some(whole)
    })
}

/// Interprets a record flag: `yes`/`true` (any case) is true, anything else false.
pub(crate) fn parse_lenient_flag(text: &str) -> bool {
    matches!(text.trim().to_ascii_lowercase().as_str(), "yes" | "true")
}

/// Interprets a configuration flag strictly.
pub(crate) fn parse_strict_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

/// `i64` stored as a decimal string.
pub(crate) mod decimal {
    use super::{Deserialize, Deserializer, Scalar, Serializer, parse_decimal};

    #[allow(clippy::trivially_copy_pass_by_ref)] // serde's `serialize_with` signature
    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let text = Scalar::deserialize(deserializer)?.into_text();
        parse_decimal(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid number '{text}'")))
    }
}

/// `Option<i64>` stored as a decimal string when present. `null` is absent.
pub(crate) mod optional_decimal {
    use super::{Deserialize, Deserializer, Scalar, Serializer, parse_decimal};

    #[allow(clippy::ref_option)] // serde's `serialize_with` signature
    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) => serializer.serialize_str(&n.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        let Some(text) = Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_text) else {
            return Ok(None);
        };
        parse_decimal(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid number '{text}'")))
    }
}

/// `Option<bool>` stored as `"true"`/`"false"` when present. `null` is absent.
pub(crate) mod optional_flag {
    use super::{Deserialize, Deserializer, Scalar, Serializer, parse_lenient_flag};

    #[allow(clippy::ref_option)] // serde's `serialize_with` signature
    pub fn serialize<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(flag) => serializer.serialize_str(if *flag { "true" } else { "false" }),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<bool>, D::Error> {
        Ok(Option::<Scalar>::deserialize(deserializer)?
            .map(|scalar| parse_lenient_flag(&scalar.into_text())))
    }
}

/// `Option<String>` that also accepts non-string scalars. `null` is absent.
pub(crate) mod optional_text {
    use super::{Deserialize, Deserializer, Scalar};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_text))
    }
}
