//! Data models for the account backend.
//!
//! This module contains the data structures exchanged with the backend
//! and persisted between runs:
//!
//! - `UserProfile`: the identity snapshot stored next to the access token
//! - `ProfileSummary`: account details shown on the profile view
//! - Request/response bodies for the auth endpoints

pub mod auth;
pub mod user;

pub use auth::{
    EmailRequest, LoginRequest, LoginResponse, MessageResponse,
    RegisterRequest, ResetPasswordRequest, VerifyOtpRequest,
};
pub use user::{ProfileResponse, ProfileSummary, UserProfile};
