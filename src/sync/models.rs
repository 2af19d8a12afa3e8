//! JSON bodies exchanged with the storage server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Result, SyncError};

/// Server verdict on the token presented in the auth header.  Any status
/// other than `unset` or `incorrect` counts as accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStatus {
    Unset,
    Incorrect,
    #[serde(other)]
    Ok,
}

#[derive(Debug, Deserialize)]
pub struct PasswordStatusResponse {
    #[serde(default)]
    pub status: Option<PasswordStatus>,
}

impl PasswordStatusResponse {
    pub fn status(&self) -> PasswordStatus {
        self.status.unwrap_or(PasswordStatus::Ok)
    }
}

#[derive(Debug, Serialize)]
pub struct SetPasswordRequest<'a> {
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DigestRequest<'a> {
    pub data: &'a str,
}

/// Acknowledgement for write/remove.  A truthy `error` field fails the
/// call.
#[derive(Debug, Default, Deserialize)]
pub struct StorageAck {
    #[serde(default)]
    pub error: Option<Value>,
}

impl StorageAck {
    pub fn into_result(self) -> Result<()> {
        check_error(self.error)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncBlocksResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Outcome of a delta upload as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub success: bool,
    /// Size in bytes of the merged container, when reported.
    pub size: Option<u64>,
}

/// `null`, `false`, `0` and `""` mean no error.
pub(crate) fn check_error(error: Option<Value>) -> Result<()> {
    match error {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(()),
        Some(Value::String(message)) if message.is_empty() => Ok(()),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Ok(()),
        Some(Value::String(message)) => Err(SyncError::remote(message)),
        Some(other) => Err(SyncError::remote(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_counts_as_ok() {
        let r: PasswordStatusResponse = serde_json::from_str(r#"{"status":"correct"}"#).unwrap();
        assert_eq!(r.status(), PasswordStatus::Ok);
        let r: PasswordStatusResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(r.status(), PasswordStatus::Ok);
        let r: PasswordStatusResponse = serde_json::from_str(r#"{"status":"unset"}"#).unwrap();
        assert_eq!(r.status(), PasswordStatus::Unset);
    }

    #[test]
    fn error_field_fails() {
        let ack: StorageAck = serde_json::from_str(r#"{"error":"disk full"}"#).unwrap();
        match ack.into_result() {
            Err(SyncError::RemoteStorage { message }) => assert_eq!(message, "disk full"),
            other => panic!("unexpected {other:?}"),
        }
        let ack: StorageAck = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(ack.into_result().is_ok());
        let ack: StorageAck = serde_json::from_str(r#"{"error":true}"#).unwrap();
        assert!(ack.into_result().is_err());
    }

    #[test]
    fn falsy_error_field_passes() {
        for body in [r#"{"error":false}"#, r#"{"error":""}"#, r#"{"error":0}"#, r#"{"error":null}"#] {
            let ack: StorageAck = serde_json::from_str(body).unwrap();
            assert!(ack.into_result().is_ok(), "{body}");
        }
    }
}
