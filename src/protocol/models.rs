//! Licensing service wire structs and reply interpretation.

use crate::LicensureError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel key meaning "no paid key supplied".
pub const FREE_LICENSE_KEY: &str = "free";

/// A trimmed license key, or the `free` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Build a key from raw input, trimming surrounding whitespace.
    ///
    /// Blank input becomes the `free` sentinel.
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::free()
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The `free` sentinel.
    pub fn free() -> Self {
        Self(FREE_LICENSE_KEY.to_string())
    }

    /// Whether this is the `free` sentinel.
    pub fn is_free(&self) -> bool {
        self.0 == FREE_LICENSE_KEY
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of license granted by the service.
///
/// The service may introduce new kinds; unknown names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LicenseType {
    Free,
    Trial,
    Subscription,
    Perpetual,
    Enterprise,
    Other(String),
}

impl LicenseType {
    /// Free and trial licenses are never written to the saved record.
    pub fn is_free_or_trial(&self) -> bool {
        matches!(self, LicenseType::Free | LicenseType::Trial)
    }

    /// Wire name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            LicenseType::Free => "free",
            LicenseType::Trial => "trial",
            LicenseType::Subscription => "subscription",
            LicenseType::Perpetual => "perpetual",
            LicenseType::Enterprise => "enterprise",
            LicenseType::Other(name) => name,
        }
    }
}

impl From<String> for LicenseType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "free" => LicenseType::Free,
            "trial" => LicenseType::Trial,
            "subscription" => LicenseType::Subscription,
            "perpetual" => LicenseType::Perpetual,
            "enterprise" => LicenseType::Enterprise,
            _ => LicenseType::Other(value),
        }
    }
}

impl From<LicenseType> for String {
    fn from(value: LicenseType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body posted to the licensing service. Built fresh for every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub license_key: String,
    pub mode: String,
    pub number_of_templates: u64,
    pub version: String,
    pub host_id: String,
}

/// Raw HTTP reply from the licensing service.
#[derive(Debug, Clone)]
pub struct ServiceReply {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl ServiceReply {
    /// Whether the HTTP status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What the Remote Verifier concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// `status == 0`: the service granted a license.
    Accepted {
        license: String,
        license_type: LicenseType,
        expires_on: Option<DateTime<Utc>>,
        message: Option<String>,
    },
    /// `status == 1`: the service refused the key.
    Rejected { message: String },
    /// Timeout, transport failure or a reply we could not understand.
    Unreachable,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedBody {
    license: String,
    #[serde(default, rename = "type")]
    license_type: Option<String>,
    #[serde(default)]
    expires_on: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RejectedBody {
    message: String,
}

/// Interpret a successful-status reply body.
///
/// Returns `Accepted` or `Rejected` for well-formed bodies, and a
/// `ProtocolError` for anything else. The caller folds errors into
/// [`RemoteOutcome::Unreachable`].
pub fn parse_service_reply(body: &[u8]) -> Result<RemoteOutcome, LicensureError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        LicensureError::ProtocolError(format!("Failed to parse licensing reply: {}", e))
    })?;

    let status = value
        .get("status")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| {
            LicensureError::ProtocolError("Missing or non-integer status field".to_string())
        })?;

    match status {
        0 => {
            let body: AcceptedBody = serde_json::from_value(value).map_err(|e| {
                LicensureError::ProtocolError(format!("Malformed acceptance: {}", e))
            })?;
            let license_type = body
                .license_type
                .map(LicenseType::from)
                .unwrap_or_else(|| LicenseType::from(body.license.clone()));
            let expires_on = body
                .expires_on
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            Ok(RemoteOutcome::Accepted {
                license: body.license,
                license_type,
                expires_on,
                message: body.message,
            })
        }
        1 => {
            let body: RejectedBody = serde_json::from_value(value).map_err(|e| {
                LicensureError::ProtocolError(format!("Malformed rejection: {}", e))
            })?;
            Ok(RemoteOutcome::Rejected {
                message: body.message,
            })
        }
        other => Err(LicensureError::ProtocolError(format!(
            "Unknown status {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCEPTED: &str = r#"{
        "status": 0,
        "license": "enterprise",
        "type": "subscription",
        "expiresOn": "2027-01-01T00:00:00Z",
        "message": "License key verified"
    }"#;

    #[test]
    fn test_license_key_trims_and_defaults() {
        assert_eq!(LicenseKey::new("  ABC-123\n").as_str(), "ABC-123");
        assert!(LicenseKey::new("   ").is_free());
        assert!(LicenseKey::new("free").is_free());
        assert!(!LicenseKey::new("ABC").is_free());
    }

    #[test]
    fn test_license_type_known_and_unknown() {
        assert_eq!(LicenseType::from("perpetual".to_string()), LicenseType::Perpetual);
        assert_eq!(
            LicenseType::from("developer".to_string()),
            LicenseType::Other("developer".to_string())
        );
        assert!(LicenseType::Trial.is_free_or_trial());
        assert!(!LicenseType::Enterprise.is_free_or_trial());
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = VerificationRequest {
            license_key: "ABC".to_string(),
            mode: "production".to_string(),
            number_of_templates: 7,
            version: "2.1.0".to_string(),
            host_id: "h".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"licenseKey\":\"ABC\""));
        assert!(json.contains("\"numberOfTemplates\":7"));
        assert!(json.contains("\"hostId\":\"h\""));
    }

    #[test]
    fn test_parse_accepted() {
        let outcome = parse_service_reply(ACCEPTED.as_bytes()).unwrap();
        match outcome {
            RemoteOutcome::Accepted {
                license,
                license_type,
                expires_on,
                message,
            } => {
                assert_eq!(license, "enterprise");
                assert_eq!(license_type, LicenseType::Subscription);
                assert_eq!(expires_on.unwrap().to_rfc3339(), "2027-01-01T00:00:00+00:00");
                assert_eq!(message.as_deref(), Some("License key verified"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_parse_accepted_without_type_uses_tier() {
        let outcome = parse_service_reply(br#"{"status":0,"license":"trial"}"#).unwrap();
        assert!(matches!(
            outcome,
            RemoteOutcome::Accepted { license_type: LicenseType::Trial, .. }
        ));
    }

    #[test]
    fn test_parse_rejected() {
        let outcome =
            parse_service_reply(br#"{"status":1,"message":"Free license cannot be used"}"#)
                .unwrap();
        assert_eq!(
            outcome,
            RemoteOutcome::Rejected {
                message: "Free license cannot be used".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed_status() {
        for body in [
            r#"{"status":"1","message":"x"}"#,
            r#"{"status":2}"#,
            r#"{"status":0.5}"#,
            r#"{"message":"no status"}"#,
            r#"{"status":1}"#,
            r#"{"status":0}"#,
            "not json",
        ] {
            let result = parse_service_reply(body.as_bytes());
            assert!(
                matches!(result, Err(LicensureError::ProtocolError(_))),
                "body {} should be a protocol error",
                body
            );
        }
    }

    #[test]
    fn test_reply_success_range() {
        let ok = ServiceReply { status: 200, body: vec![] };
        let bad = ServiceReply { status: 503, body: vec![] };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }
}
