//! Durable storage for the access token and the profile snapshot.
//!
//! Every backend stores exactly two values under fixed names (`jwt_token`
//! and `user`) and hands them back together or not at all.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use keyring::credential::{CredentialBuilderApi, CredentialPersistence};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::UserProfile;

/// Default client-side lifetime of a stored credential.
pub const DEFAULT_CREDENTIAL_TTL_DAYS: i64 = 30;

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "jwt_token";

/// Storage key for the profile snapshot
pub const USER_KEY: &str = "user";

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Credential file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored credential is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The persisted token + profile pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "jwt_token")]
    pub token: String,
    pub user: UserProfile,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, user: UserProfile, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            user,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get days remaining until expiry (for display)
    pub fn days_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_days().max(0)
    }
}

/// Scoped persistence for a single credential.
///
/// Implementors provide the raw `write`/`read`/`clear` primitives; `save`
/// and `load` layer the expiry policy on top. `write` must leave either the
/// complete new credential or the previous state behind, and `clear` must
/// succeed when nothing is stored.
pub trait CredentialStore: Send + Sync {
    fn write(&self, credential: &Credential) -> StoreResult<()>;

    fn read(&self) -> StoreResult<Option<Credential>>;

    fn clear(&self) -> StoreResult<()>;

    /// Persist `token` and `user` together, expiring after `ttl`.
    fn save(&self, token: &str, user: &UserProfile, ttl: Duration) -> StoreResult<Credential> {
        let credential = Credential::new(token, user.clone(), ttl);
        self.write(&credential)?;
        Ok(credential)
    }

    /// Return the stored credential, or `None` when absent or expired.
    fn load(&self) -> StoreResult<Option<Credential>> {
        match self.read()? {
            Some(credential) if credential.is_expired() => {
                debug!(expires_at = %credential.expires_at, "Stored credential expired");
                if let Err(e) = self.clear() {
                    warn!(error = %e, "Failed to remove expired credential");
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }
}

// ============================================================================
// File store
// ============================================================================

/// Credential kept as one JSON document in the cache directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl CredentialStore for FileCredentialStore {
    fn write(&self, credential: &Credential) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(credential)?;

        // Write then rename so readers never observe a half-written file
        let tmp = self.temp_path();
        std::fs::write(&tmp, contents)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = ?self.path, "Credential saved");
        Ok(())
    }

    fn read(&self) -> StoreResult<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let credential: Credential = serde_json::from_str(&contents)?;
        Ok(Some(credential))
    }

    fn clear(&self) -> StoreResult<()> {
        for path in [self.path.clone(), self.temp_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// ============================================================================
// Keychain store
// ============================================================================

/// What lives under the `user` keychain entry.
#[derive(Serialize, Deserialize)]
struct ProfileEnvelope {
    user: UserProfile,
    expires_at: DateTime<Utc>,
}

/// Whether the platform keychain keeps entries across restarts.
///
/// Builds without a native keystore fall back to keyring's in-process mock.
pub fn keychain_is_durable() -> bool {
    matches!(
        keyring::default::default_credential_builder().persistence(),
        CredentialPersistence::UntilDelete
    )
}

/// Credential kept in the OS keychain as two entries.
pub struct KeyringCredentialStore {
    token_entry: Entry,
    user_entry: Entry,
}

impl KeyringCredentialStore {
    pub fn new(service: &str) -> StoreResult<Self> {
        Ok(Self {
            token_entry: Entry::new(service, TOKEN_KEY)?,
            user_entry: Entry::new(service, USER_KEY)?,
        })
    }

    fn get(entry: &Entry) -> StoreResult<Option<String>> {
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(entry: &Entry) -> StoreResult<()> {
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
impl KeyringCredentialStore {
    fn fail_next(entry: &Entry, reason: &str) {
        entry
            .get_credential()
            .downcast_ref::<keyring::mock::MockCredential>()
            .expect("keyring tests run on the mock builder")
            .set_error(keyring::Error::PlatformFailure(reason.to_string().into()));
    }

    /// Make the next keychain call on the token entry fail
    pub(crate) fn fail_next_token_write(&self, reason: &str) {
        Self::fail_next(&self.token_entry, reason);
    }

    /// Make the next keychain call on the profile entry fail
    pub(crate) fn fail_next_profile_access(&self, reason: &str) {
        Self::fail_next(&self.user_entry, reason);
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn write(&self, credential: &Credential) -> StoreResult<()> {
        let envelope = serde_json::to_string(&ProfileEnvelope {
            user: credential.user.clone(),
            expires_at: credential.expires_at,
        })?;

        // Profile first; a failed token write puts the previous profile back
        // so the old pair stays intact
        let previous_user = Self::get(&self.user_entry)?;
        self.user_entry.set_password(&envelope)?;
        if let Err(e) = self.token_entry.set_password(&credential.token) {
            let restored = match previous_user {
                Some(previous) => self.user_entry.set_password(&previous).map_err(StoreError::from),
                None => Self::delete(&self.user_entry),
            };
            if let Err(rollback) = restored {
                warn!(error = %rollback, "Failed to restore previous profile entry");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<Option<Credential>> {
        let token = Self::get(&self.token_entry)?;
        let envelope = Self::get(&self.user_entry)?;

        match (token, envelope) {
            (Some(token), Some(envelope)) => {
                let envelope: ProfileEnvelope = serde_json::from_str(&envelope)?;
                Ok(Some(Credential {
                    token,
                    user: envelope.user,
                    expires_at: envelope.expires_at,
                }))
            }
            (None, None) => Ok(None),
            (token, _) => {
                warn!(
                    has_token = token.is_some(),
                    "Partial credential in keychain, treating as logged out"
                );
                Ok(None)
            }
        }
    }

    fn clear(&self) -> StoreResult<()> {
        let token = Self::delete(&self.token_entry);
        let user = Self::delete(&self.user_entry);
        token.and(user)
    }
}

// ============================================================================
// Memory store
// ============================================================================

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a credential already stored
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Option<Credential>>> {
        self.slot
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn write(&self, credential: &Credential) -> StoreResult<()> {
        *self.lock()? = Some(credential.clone());
        Ok(())
    }

    fn read(&self) -> StoreResult<Option<Credential>> {
        Ok(self.lock()?.clone())
    }

    fn clear(&self) -> StoreResult<()> {
        *self.lock()? = None;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
