//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains the CRM entities, their request payloads, and the response
//! envelopes shared by every route.

pub mod activity;
pub mod booking;
pub mod dashboard;
pub mod deal;
pub mod lead;
pub mod pagination;
pub mod summary;
pub mod task;
pub mod user;

// Re-export commonly used types
pub use activity::*;
pub use booking::*;
pub use dashboard::*;
pub use deal::*;
pub use lead::*;
pub use pagination::*;
pub use summary::*;
pub use task::*;
pub use user::*;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Loose international phone number pattern
pub(crate) static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ().\-]{5,18}[0-9]$").expect("phone pattern"));

/// Rejects strings made only of whitespace
pub(crate) fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if !value.trim().is_empty() {
        return Ok(());
    }
    let mut err = validator::ValidationError::new("blank");
    err.message = Some("Must not be empty".into());
    Err(err)
}

/// A JSON number, or a string holding one
#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn into_f64<E: de::Error>(self) -> Result<f64, E> {
        match self {
            Numeric::Number(n) => Ok(n),
            Numeric::Text(text) => text
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| E::custom(format!("expected a number, found \"{}\"", text))),
        }
    }
}

/// Accepts `10`, `10.5` or `"10"` for a money amount
pub(crate) fn deserialize_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Numeric::deserialize(deserializer)?.into_f64()
}

/// Optional form of [`deserialize_number`]; pair it with `#[serde(default)]`
pub(crate) fn deserialize_optional_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    Option::<Numeric>::deserialize(deserializer)?
        .map(Numeric::into_f64)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_pattern() {
        assert!(PHONE_RE.is_match("+1 (555) 010-2030"));
        assert!(PHONE_RE.is_match("0612345678"));
        assert!(!PHONE_RE.is_match("call me"));
        assert!(!PHONE_RE.is_match("12"));
    }

    #[test]
    fn test_success_response_omits_empty_message() {
        let json = serde_json::to_value(SuccessResponse::new(1)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 1}));
    }

    #[derive(Debug, Deserialize)]
    struct Amounts {
        #[serde(deserialize_with = "deserialize_number")]
        value: f64,
        #[serde(default, deserialize_with = "deserialize_optional_number")]
        extra: Option<f64>,
    }

    #[test]
    fn test_numbers_accept_numeric_strings() {
        let parsed: Amounts = serde_json::from_str(r#"{"value": "10", "extra": "2.5"}"#).unwrap();
        assert_eq!(parsed.value, 10.0);
        assert_eq!(parsed.extra, Some(2.5));

        let parsed: Amounts = serde_json::from_str(r#"{"value": 7}"#).unwrap();
        assert_eq!(parsed.value, 7.0);
        assert_eq!(parsed.extra, None);

        let parsed: Amounts = serde_json::from_str(r#"{"value": 7, "extra": null}"#).unwrap();
        assert_eq!(parsed.extra, None);
    }

    #[test]
    fn test_numbers_reject_other_strings() {
        assert!(serde_json::from_str::<Amounts>(r#"{"value": "ten"}"#).is_err());
        assert!(serde_json::from_str::<Amounts>(r#"{"value": ""}"#).is_err());
        assert!(serde_json::from_str::<Amounts>(r#"{"value": "NaN"}"#).is_err());
        assert!(serde_json::from_str::<Amounts>(r#"{"value": true}"#).is_err());
    }
}
