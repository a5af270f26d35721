use serde::Deserialize;
use thiserror::Error;

/// Errors produced by the backend HTTP layer.
///
/// Status-mapped variants carry the backend's `{"error": ...}` text in
/// `message` when the body had one, and a printable `detail` that falls
/// back to the (truncated) raw body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {detail}")]
    Unauthorized { message: Option<String>, detail: String },

    #[error("Access denied: {detail}")]
    AccessDenied { message: Option<String>, detail: String },

    #[error("Resource not found: {detail}")]
    NotFound { message: Option<String>, detail: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {detail}")]
    ServerError { message: Option<String>, detail: String },

    #[error("Request rejected ({status}): {detail}")]
    Rejected {
        status: u16,
        message: Option<String>,
        detail: String,
    },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(#[source] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkError(err)
        }
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Pull the `error` field out of a JSON error payload, if there is one
    fn extract_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body);
        let detail = match message {
            Some(ref m) => m.clone(),
            None if body.trim().is_empty() => status.to_string(),
            None => Self::truncate_body(body),
        };
        match status.as_u16() {
            401 => ApiError::Unauthorized { message, detail },
            403 => ApiError::AccessDenied { message, detail },
            404 => ApiError::NotFound { message, detail },
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError { message, detail },
            code => ApiError::Rejected {
                status: code,
                message,
                detail,
            },
        }
    }

    /// The backend's own error text, when the response carried one
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message, .. }
            | ApiError::AccessDenied { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::ServerError { message, .. }
            | ApiError::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// True for HTTP 401, which invalidates the stored credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}
