use serde::Serialize;

use crate::api::ApiError;

/// Uniform result of a session operation.
///
/// Transport failures and backend rejections both arrive as
/// `success == false` with a displayable `message`, so callers never branch
/// on error type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome<T = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> AuthOutcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn ok_with_message(data: Option<T>, message: Option<String>) -> Self {
        Self {
            success: true,
            message,
            data,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Prefer the backend's own error text, else `fallback`.
    pub fn from_api_error(err: &ApiError, fallback: &str) -> Self {
        Self::failed(err.backend_message().unwrap_or(fallback))
    }

    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.message.unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_api_error_prefers_backend_text() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"error":"Invalid or expired OTP"}"#);
        let outcome: AuthOutcome = AuthOutcome::from_api_error(&err, "OTP verification failed");
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("Invalid or expired OTP"));
    }

    #[test]
    fn test_from_api_error_falls_back() {
        let outcome: AuthOutcome = AuthOutcome::from_api_error(&ApiError::Timeout, "Login failed");
        assert_eq!(outcome.message.as_deref(), Some("Login failed"));
        assert!(outcome.data.is_none());
    }

    #[test]
    fn test_serializes_without_empty_fields() {
        let outcome = AuthOutcome::ok(());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": null}));

        let failed: AuthOutcome<u32> = AuthOutcome::failed("nope");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "message": "nope"}));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(AuthOutcome::ok(5).into_result(), Ok(Some(5)));
        assert_eq!(
            AuthOutcome::<u32>::failed("bad").into_result(),
            Err("bad".to_string())
        );
    }
}
