use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Field name to the first message reported for it.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Missing {missing}")]
    Config { missing: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("HubSpot error: {status} - {body}")]
    Upstream {
        status: u16,
        message: Option<String>,
        field_errors: FieldErrors,
        body: String,
    },

    #[error("{0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("{message}")]
    Validation {
        message: String,
        field_errors: FieldErrors,
    },
}

#[derive(Deserialize)]
struct VendorErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<VendorErrorDetail>,
}

#[derive(Deserialize)]
struct VendorErrorDetail {
    message: Option<String>,
    #[serde(default)]
    context: BTreeMap<String, Value>,
}

impl ApiError {
    pub fn config(missing: impl Into<String>) -> Self {
        Self::Config {
            missing: missing.into(),
        }
    }

    /// Builds an upstream failure from a non-2xx response, keeping the raw
    /// body and whatever HubSpot reported in its error envelope.
    pub fn from_response(status: u16, body: String) -> Self {
        let mut message = None;
        let mut field_errors = FieldErrors::new();
        if let Ok(parsed) = serde_json::from_str::<VendorErrorBody>(&body) {
            message = parsed.message.filter(|m| !m.trim().is_empty());
            for detail in parsed.errors {
                let Some(text) = detail.message else { continue };
                let names = detail
                    .context
                    .get("propertyName")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for name in names.iter().filter_map(Value::as_str) {
                    field_errors
                        .entry(name.to_string())
                        .or_insert_with(|| text.clone());
                }
            }
        }
        Self::Upstream {
            status,
            message,
            field_errors,
            body,
        }
    }

    pub fn validation(field_errors: FieldErrors) -> Self {
        let message = field_errors
            .values()
            .next()
            .cloned()
            .unwrap_or_else(|| "Invalid form submission".to_string());
        Self::Validation {
            message,
            field_errors,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Upstream { field_errors, .. } | Self::Validation { field_errors, .. } => {
                Some(field_errors)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// User-facing failure of a create/update operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct MutationFailure {
    pub message: String,
    pub field_errors: FieldErrors,
}

impl MutationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: FieldErrors::new(),
        }
    }

    /// Vendor message when HubSpot supplied one, otherwise `fallback`.
    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        let message = match err {
            ApiError::Upstream { message, .. } => message.clone(),
            ApiError::Validation { message, .. } => Some(message.clone()),
            ApiError::Config { .. } | ApiError::Unauthorized(_) | ApiError::Transport(_) => {
                Some(err.to_string())
            }
            ApiError::Decode(_) => None,
        };
        Self {
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string()),
            field_errors: err.field_errors().cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config dir")]
    NoConfigDir,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_extracts_message_and_fields() {
        let body = r#"{"status":"error","message":"Property values were not valid","category":"VALIDATION_ERROR",
            "errors":[{"message":"Email address foo is invalid","code":"INVALID_EMAIL","context":{"propertyName":["email"]}}]}"#;
        let err = ApiError::from_response(400, body.to_string());

        assert_eq!(err.status(), Some(400));
        match &err {
            ApiError::Upstream { message, field_errors, .. } => {
                assert_eq!(message.as_deref(), Some("Property values were not valid"));
                assert_eq!(
                    field_errors.get("email").map(String::as_str),
                    Some("Email address foo is invalid")
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_kept_raw() {
        let err = ApiError::from_response(502, "Bad Gateway".into());
        assert_eq!(err.to_string(), "HubSpot error: 502 - Bad Gateway");
        assert!(err.field_errors().is_some_and(|f| f.is_empty()));
    }

    #[test]
    fn failure_prefers_vendor_message() {
        let err = ApiError::from_response(409, r#"{"message":"Contact already exists"}"#.into());
        let failure = MutationFailure::from_api(&err, "Update failed.");
        assert_eq!(failure.message, "Contact already exists");
    }

    #[test]
    fn failure_falls_back_without_vendor_message() {
        let err = ApiError::from_response(500, "".into());
        assert_eq!(MutationFailure::from_api(&err, "Update failed.").message, "Update failed.");

        let decode = ApiError::Decode("missing field `id`".into());
        assert_eq!(MutationFailure::from_api(&decode, "Update failed.").message, "Update failed.");
    }

    #[test]
    fn validation_message_is_first_field_error() {
        let mut fields = FieldErrors::new();
        fields.insert("email".into(), "Enter a valid email".into());
        fields.insert("zip".into(), "Enter a 5 digit ZIP code".into());
        let err = ApiError::validation(fields);
        assert_eq!(err.to_string(), "Enter a valid email");
    }
}
