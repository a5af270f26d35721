//! REST API client module for the account backend.
//!
//! This module provides the `AuthApi` trait describing the backend calls the
//! session lifecycle depends on, and `ApiClient`, its HTTP implementation.
//!
//! Authenticated endpoints take a bearer token obtained from `/api/login`.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::{LoginResponse, MessageResponse, ProfileSummary};

pub use client::ApiClient;
pub use error::ApiError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Backend operations used by the session manager.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> ApiResult<LoginResponse>;

    async fn register(&self, username: &str, email: &str, password: &str)
        -> ApiResult<MessageResponse>;

    async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<MessageResponse>;

    async fn resend_otp(&self, email: &str) -> ApiResult<MessageResponse>;

    async fn forgot_password(&self, email: &str) -> ApiResult<MessageResponse>;

    async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> ApiResult<MessageResponse>;

    async fn fetch_profile(&self, token: &str) -> ApiResult<ProfileSummary>;

    async fn delete_account(&self, token: &str) -> ApiResult<MessageResponse>;
}
