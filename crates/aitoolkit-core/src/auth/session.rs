//! Session lifecycle: startup hydration, login/logout and the account
//! operations that report through `AuthOutcome`.
//!
//! `SessionManager` is the only writer of the credential store. Every state
//! change happens synchronously after the awaited backend call returns, so a
//! caller that drops an operation future either cancels before the response
//! (nothing changes) or not at all.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, ApiResult, AuthApi};
use crate::models::{MessageResponse, ProfileSummary, UserProfile};

use super::credentials::{Credential, CredentialStore};
use super::outcome::AuthOutcome;

const LOGIN_FAILED: &str = "Login failed";
const REGISTER_FAILED: &str = "Registration failed";
const VERIFY_OTP_FAILED: &str = "OTP verification failed";
const RESEND_OTP_FAILED: &str = "Resend OTP failed";
const FORGOT_PASSWORD_FAILED: &str = "Forgot password failed";
const RESET_PASSWORD_FAILED: &str = "Reset password failed";
const PROFILE_FAILED: &str = "Failed to load profile";
const DELETE_ACCOUNT_FAILED: &str = "Failed to delete account";
const NOT_LOGGED_IN: &str = "Not logged in";

/// The client's current belief about who is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Startup hydration has not finished yet
    Unresolved,
    Anonymous,
    Authenticated(UserProfile),
}

impl SessionState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionState::Unresolved)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn CredentialStore>,
    ttl: Duration,
    state: watch::Sender<SessionState>,
    credential: Mutex<Option<Credential>>,
}

impl SessionManager {
    /// Create an unresolved session; call `hydrate` before trusting it.
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::Unresolved);
        Self {
            api,
            store,
            ttl,
            state,
            credential: Mutex::new(None),
        }
    }

    /// Resolve the session from the credential store.
    ///
    /// Runs at most once; later calls return the current state untouched.
    /// A store that cannot be read counts as logged out.
    pub fn hydrate(&self) -> SessionState {
        if self.is_resolved() {
            return self.state();
        }

        let credential = match self.store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Failed to load stored credential, starting logged out");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear unreadable credential");
                }
                None
            }
        };

        debug!(authenticated = credential.is_some(), "Session hydrated");
        self.set_credential(credential);
        self.state()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch for state changes (route guards, UI observers)
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_resolved(&self) -> bool {
        self.state.borrow().is_resolved()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user().cloned()
    }

    /// Bearer token for authenticated requests
    pub fn token(&self) -> Option<String> {
        self.current().as_ref().map(|c| c.token.clone())
    }

    /// Client-side expiry of the stored credential
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current().as_ref().map(|c| c.expires_at)
    }

    /// Whole days left on the stored credential
    pub fn days_until_expiry(&self) -> Option<i64> {
        self.current().as_ref().map(Credential::days_until_expiry)
    }

    fn current(&self) -> MutexGuard<'_, Option<Credential>> {
        // Plain data behind the lock; a panic elsewhere cannot leave it half-updated
        self.credential
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_credential(&self, credential: Option<Credential>) {
        let state = match credential {
            Some(ref c) => SessionState::Authenticated(c.user.clone()),
            None => SessionState::Anonymous,
        };
        *self.current() = credential;
        self.state.send_replace(state);
    }

    // =========================================================================
    // Login / Logout
    // =========================================================================

    /// Authenticate against the backend and persist the credential.
    ///
    /// On any failure the previous session is left exactly as it was.
    pub async fn login(&self, username: &str, password: &str) -> AuthOutcome<UserProfile> {
        let response = match self.api.login(username, password).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, username, "Login failed");
                return AuthOutcome::from_api_error(&e, LOGIN_FAILED);
            }
        };

        match self.store.save(&response.access_token, &response.user, self.ttl) {
            Ok(credential) => {
                let user = credential.user.clone();
                self.set_credential(Some(credential));
                info!(username = %user.username, "Login successful");
                AuthOutcome::ok(user)
            }
            Err(e) => {
                error!(error = %e, "Failed to save credential after login");
                AuthOutcome::failed(format!("{}: could not save session", LOGIN_FAILED))
            }
        }
    }

    /// Forget the current user. Local only; safe from any state.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
        self.set_credential(None);
        info!("Logged out");
    }

    /// Drop the session after the backend rejected our token.
    pub fn handle_unauthorized(&self) {
        warn!("Backend rejected the stored token, clearing session");
        self.logout();
    }

    // =========================================================================
    // Registration and password recovery
    // =========================================================================

    /// Register a new account; `data` carries the email for the OTP step.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> AuthOutcome<String> {
        match self.api.register(username, email, password).await {
            Ok(response) => {
                info!(username, "Registration accepted, OTP sent");
                AuthOutcome::ok_with_message(Some(email.to_string()), response.message)
            }
            Err(e) => {
                warn!(error = %e, username, "Registration failed");
                AuthOutcome::from_api_error(&e, REGISTER_FAILED)
            }
        }
    }

    pub async fn verify_otp(&self, email: &str, code: &str) -> AuthOutcome {
        Self::acknowledge(self.api.verify_otp(email, code).await, VERIFY_OTP_FAILED)
    }

    pub async fn resend_otp(&self, email: &str) -> AuthOutcome {
        Self::acknowledge(self.api.resend_otp(email).await, RESEND_OTP_FAILED)
    }

    pub async fn forgot_password(&self, email: &str) -> AuthOutcome {
        Self::acknowledge(self.api.forgot_password(email).await, FORGOT_PASSWORD_FAILED)
    }

    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> AuthOutcome {
        Self::acknowledge(
            self.api.reset_password(email, code, new_password).await,
            RESET_PASSWORD_FAILED,
        )
    }

    fn acknowledge(result: ApiResult<MessageResponse>, fallback: &str) -> AuthOutcome {
        match result {
            Ok(response) => AuthOutcome::ok_with_message(Some(()), response.message),
            Err(e) => {
                warn!(error = %e, operation = fallback, "Account request failed");
                AuthOutcome::from_api_error(&e, fallback)
            }
        }
    }

    // =========================================================================
    // Authenticated account operations
    // =========================================================================

    /// Fetch the profile and refresh the stored identity snapshot.
    pub async fn refresh_profile(&self) -> AuthOutcome<ProfileSummary> {
        let Some(token) = self.token() else {
            return AuthOutcome::failed(NOT_LOGGED_IN);
        };

        let summary = match self.api.fetch_profile(&token).await {
            Ok(summary) => summary,
            Err(e) => return self.authenticated_failure(&token, &e, PROFILE_FAILED),
        };

        let updated = {
            let current = self.current();
            match current.as_ref() {
                // The session may have changed while the request was in flight
                Some(c) if c.token == token => {
                    let mut updated = c.clone();
                    updated.user.username = summary.username.clone();
                    updated.user.email = summary.email.clone();
                    (updated != *c).then_some(updated)
                }
                _ => None,
            }
        };

        if let Some(credential) = updated {
            match self.store.write(&credential) {
                Ok(()) => {
                    debug!("Profile snapshot refreshed");
                    self.set_credential(Some(credential));
                }
                Err(e) => warn!(error = %e, "Failed to persist refreshed profile"),
            }
        }

        AuthOutcome::ok(summary)
    }

    /// Delete the account on the backend, then log out locally.
    pub async fn delete_account(&self) -> AuthOutcome {
        let Some(token) = self.token() else {
            return AuthOutcome::failed(NOT_LOGGED_IN);
        };

        match self.api.delete_account(&token).await {
            Ok(response) => {
                info!("Account deleted");
                self.logout();
                AuthOutcome::ok_with_message(Some(()), response.message)
            }
            Err(e) => self.authenticated_failure(&token, &e, DELETE_ACCOUNT_FAILED),
        }
    }

    fn authenticated_failure<T>(&self, token: &str, err: &ApiError, fallback: &str) -> AuthOutcome<T> {
        warn!(error = %err, operation = fallback, "Authenticated request failed");
        // Only drop the session the rejected token belonged to
        if err.is_unauthorized() && self.token().as_deref() == Some(token) {
            self.handle_unauthorized();
        }
        AuthOutcome::from_api_error(err, fallback)
    }
}

// ============================================================================
// Tests
// ============================================================================
