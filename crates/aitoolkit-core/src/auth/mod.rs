//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `CredentialStore`: durable token + profile storage (file, OS keychain, memory)
//! - `SessionManager`: the session state machine and account operations
//! - `guard`: the route protection policy driven by `SessionState`
//!
//! Stored credentials expire on the client after 30 days by default; the
//! backend's 401 remains the authoritative expiry signal.

pub mod credentials;
pub mod guard;
pub mod outcome;
pub mod session;

pub use credentials::{
    Credential, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    keychain_is_durable, MemoryCredentialStore, StoreError, DEFAULT_CREDENTIAL_TTL_DAYS,
};
pub use guard::{evaluate, GuardDecision, Route, RouteRequirement, LOGIN_PATH};
pub use outcome::AuthOutcome;
pub use session::{SessionManager, SessionState};
