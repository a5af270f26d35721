//! API client for communicating with the account backend.
//!
//! This module provides the `ApiClient` struct, the reqwest-backed
//! implementation of `AuthApi`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{
    EmailRequest, LoginRequest, LoginResponse, MessageResponse, ProfileResponse, ProfileSummary,
    RegisterRequest, ResetPasswordRequest, VerifyOtpRequest,
};

use super::{ApiError, ApiResult, AuthApi};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds, used when the caller does not supply one.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const LOGIN_PATH: &str = "api/login";
const REGISTER_PATH: &str = "api/register";
const VERIFY_OTP_PATH: &str = "api/verify-otp";
const RESEND_OTP_PATH: &str = "api/resend-otp";
const FORGOT_PASSWORD_PATH: &str = "api/forgot-password";
const RESET_PASSWORD_PATH: &str = "api/reset-password";
const PROFILE_PATH: &str = "api/profile";
const DELETE_ACCOUNT_PATH: &str = "api/delete-account";

/// HTTP client for the account backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // A trailing slash makes `Url::join` append rather than replace the last segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidResponse(format!("Bad endpoint {}: {}", path, e)))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> ApiResult<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_body<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
        let text = response.text().await?;
        // Acknowledgement endpoints may reply with an empty body
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn send<T, F>(&self, url: &Url, build: F) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            debug!(url = %url, "Sending request");
            let response = build(&self.client).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Self::parse_body(response).await,
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(
                        url = %url,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + Sync,
    {
        let url = self.endpoint(path)?;
        self.send(&url, |client| client.post(url.clone()).json(body))
            .await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, username: &str, password: &str) -> ApiResult<LoginResponse> {
        self.post(LOGIN_PATH, &LoginRequest { username, password })
            .await
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<MessageResponse> {
        let body = RegisterRequest {
            username,
            email,
            password,
        };
        self.post(REGISTER_PATH, &body).await
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<MessageResponse> {
        self.post(VERIFY_OTP_PATH, &VerifyOtpRequest { email, otp })
            .await
    }

    async fn resend_otp(&self, email: &str) -> ApiResult<MessageResponse> {
        self.post(RESEND_OTP_PATH, &EmailRequest { email }).await
    }

    async fn forgot_password(&self, email: &str) -> ApiResult<MessageResponse> {
        self.post(FORGOT_PASSWORD_PATH, &EmailRequest { email })
            .await
    }

    async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> ApiResult<MessageResponse> {
        let body = ResetPasswordRequest {
            email,
            otp,
            new_password,
        };
        self.post(RESET_PASSWORD_PATH, &body).await
    }

    async fn fetch_profile(&self, token: &str) -> ApiResult<ProfileSummary> {
        let url = self.endpoint(PROFILE_PATH)?;
        let response: ProfileResponse = self
            .send(&url, |client| client.get(url.clone()).bearer_auth(token))
            .await?;
        Ok(response.data)
    }

    async fn delete_account(&self, token: &str) -> ApiResult<MessageResponse> {
        let url = self.endpoint(DELETE_ACCOUNT_PATH)?;
        self.send(&url, |client| client.delete(url.clone()).bearer_auth(token))
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Serve canned `(status line, body)` replies, one per connection, and
    /// report each raw request back to the test.
    async fn canned_server(
        replies: Vec<(&'static str, &'static str)>,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for (status, body) in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                let _ = tx.send(request);
                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        (format!("http://{}", addr), rx)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn client(base: &str) -> ApiClient {
        let mut client = ApiClient::new(base, Duration::from_secs(5)).unwrap();
        client.initial_backoff = Duration::from_millis(1);
        client
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = client("http://example.test/backend/");
        let url = client.endpoint(LOGIN_PATH).unwrap();
        assert_eq!(url.as_str(), "http://example.test/backend/api/login");

        let client = self::client("http://example.test/backend");
        let url = client.endpoint(PROFILE_PATH).unwrap();
        assert_eq!(url.as_str(), "http://example.test/backend/api/profile");
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let (base, mut requests) = canned_server(vec![(
            "200 OK",
            r#"{"access_token":"abc","user":{"id":1,"username":"alice","email":"a@x.com"}}"#,
        )])
        .await;

        let response = client(&base).login("alice", "correct-pw").await.unwrap();
        assert_eq!(response.access_token, "abc");
        assert_eq!(response.user.email, "a@x.com");

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("POST /api/login "));
        assert!(request.contains(r#""username":"alice""#));
        assert!(request.contains(r#""password":"correct-pw""#));
    }

    #[tokio::test]
    async fn test_login_rejection_carries_backend_error() {
        let (base, _requests) =
            canned_server(vec![("401 UNAUTHORIZED", r#"{"error":"Invalid credentials"}"#)]).await;

        let err = client(&base).login("bob", "wrong").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.backend_message(), Some("Invalid credentials"));
    }

    #[tokio::test]
    async fn test_register_accepts_empty_object() {
        let (base, mut requests) = canned_server(vec![("201 CREATED", "{}")]).await;

        let response = client(&base)
            .register("carol", "c@x.com", "Str0ng!pw")
            .await
            .unwrap();
        assert!(response.message.is_none());

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("POST /api/register "));
        assert!(request.contains(r#""email":"c@x.com""#));
    }

    #[tokio::test]
    async fn test_profile_sends_bearer_token() {
        let (base, mut requests) = canned_server(vec![(
            "200 OK",
            r#"{"data":{"username":"alice","email":"a@x.com","records":3}}"#,
        )])
        .await;

        let profile = client(&base).fetch_profile("abc").await.unwrap();
        assert_eq!(profile.records, 3);

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("GET /api/profile "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer abc"));
    }

    #[tokio::test]
    async fn test_delete_account_uses_delete_verb() {
        let (base, mut requests) = canned_server(vec![(
            "200 OK",
            r#"{"message":"Account deleted successfully"}"#,
        )])
        .await;

        let response = client(&base).delete_account("abc").await.unwrap();
        assert_eq!(response.message.as_deref(), Some("Account deleted successfully"));

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("DELETE /api/delete-account "));
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let (base, mut requests) = canned_server(vec![
            ("429 TOO MANY REQUESTS", "{}"),
            ("200 OK", r#"{"message":"OTP resent successfully."}"#),
        ])
        .await;

        let response = client(&base).resend_otp("a@x.com").await.unwrap();
        assert_eq!(response.message.as_deref(), Some("OTP resent successfully."));
        assert!(requests.recv().await.is_some());
        assert!(requests.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_invalid_response() {
        let (base, _requests) = canned_server(vec![("200 OK", r#"{"unexpected":true}"#)]).await;

        let err = client(&base).login("alice", "pw").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr))
            .forgot_password("a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NetworkError(_)));
    }
}
