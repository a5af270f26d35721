//! Core library for the AI toolkit client.
//!
//! Holds everything a front end needs to manage the signed-in user:
//! the backend API client, credential storage, the session lifecycle and
//! the route guard policy.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, AuthApi};
pub use auth::{AuthOutcome, GuardDecision, Route, RouteRequirement, SessionManager, SessionState};
pub use config::Config;
pub use models::{ProfileSummary, UserProfile};
