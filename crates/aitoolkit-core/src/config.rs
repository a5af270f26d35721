//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URL, credential lifetime and storage backend, request timeout,
//! and the last used username.
//!
//! Configuration is stored at `~/.config/aitoolkit/config.json`. The
//! `AITOOLKIT_API_URL` and `AITOOLKIT_CREDENTIAL_BACKEND` environment
//! variables override the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::api::ApiClient;
use crate::auth::{
    keychain_is_durable, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore, SessionManager, DEFAULT_CREDENTIAL_TTL_DAYS,
};

/// Application name used for config/cache directory paths and the keychain service
pub const APP_NAME: &str = "aitoolkit";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend address used when nothing is configured
const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

const ENV_API_URL: &str = "AITOOLKIT_API_URL";
const ENV_CREDENTIAL_BACKEND: &str = "AITOOLKIT_CREDENTIAL_BACKEND";

/// Where the session credential is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for CredentialBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(CredentialBackend::File),
            "keyring" | "keychain" => Ok(CredentialBackend::Keyring),
            "memory" => Ok(CredentialBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown credential backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub credential_ttl_days: i64,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            credential_ttl_days: DEFAULT_CREDENTIAL_TTL_DAYS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Record the last used username in the config file.
    ///
    /// Reloads the file so environment and command line overrides applied
    /// to the running config are never persisted. An unreadable file is left
    /// untouched.
    pub fn remember_username(username: &str) -> Result<()> {
        Self::remember_username_at(&Self::config_path()?, username)
    }

    fn remember_username_at(path: &Path, username: &str) -> Result<()> {
        let mut on_disk = Self::load_from(path)?;
        if on_disk.last_username.as_deref() == Some(username) {
            return Ok(());
        }
        on_disk.last_username = Some(username.to_string());
        on_disk.save_to(path)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            debug!(url = %url, "API URL overridden from environment");
            self.api_base_url = url;
        }
        if let Some(backend) = lookup(ENV_CREDENTIAL_BACKEND) {
            self.credential_backend = backend
                .parse()
                .with_context(|| format!("Invalid {}", ENV_CREDENTIAL_BACKEND))?;
        }
        Ok(())
    }

    /// Client-side credential lifetime; non-positive values fall back to the default
    pub fn credential_ttl(&self) -> chrono::Duration {
        if self.credential_ttl_days > 0 {
            chrono::Duration::days(self.credential_ttl_days)
        } else {
            warn!(
                configured = self.credential_ttl_days,
                "Invalid credential TTL, using default"
            );
            chrono::Duration::days(DEFAULT_CREDENTIAL_TTL_DAYS)
        }
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        let secs = if self.request_timeout_secs == 0 {
            DEFAULT_REQUEST_TIMEOUT_SECS
        } else {
            self.request_timeout_secs
        };
        std::time::Duration::from_secs(secs)
    }

    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match self.credential_backend {
            CredentialBackend::File => Arc::new(FileCredentialStore::new(self.cache_dir()?)),
            CredentialBackend::Keyring => {
                if !keychain_is_durable() {
                    anyhow::bail!("No persistent keychain on this platform; use the file store");
                }
                Arc::new(KeyringCredentialStore::new(APP_NAME).context("Failed to open keychain")?)
            }
            CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        };
        Ok(store)
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.api_base_url, self.request_timeout())
    }

    /// Build the process-wide session manager (unresolved; call `hydrate`)
    pub fn session_manager(&self) -> Result<SessionManager> {
        let api = Arc::new(self.api_client()?);
        let store = self.credential_store()?;
        Ok(SessionManager::new(api, store, self.credential_ttl()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:5000");
        assert_eq!(config.credential_ttl(), chrono::Duration::days(30));
        assert_eq!(config.request_timeout(), std::time::Duration::from_secs(30));
        assert_eq!(config.credential_backend, CredentialBackend::File);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"credential_backend":"keyring"}"#).unwrap();
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.credential_ttl_days, 30);
        assert_eq!(config.api_base_url, "http://localhost:5000");
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("AITOOLKIT_API_URL", "https://tools.example.com"),
            ("AITOOLKIT_CREDENTIAL_BACKEND", "memory"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.api_base_url, "https://tools.example.com");
        assert_eq!(config.credential_backend, CredentialBackend::Memory);
    }

    #[test]
    fn test_invalid_backend_override_is_rejected() {
        let vars = env(&[("AITOOLKIT_CREDENTIAL_BACKEND", "floppy")]);
        let mut config = Config::default();
        assert!(config.apply_overrides(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_non_positive_values_use_defaults() {
        let config = Config {
            credential_ttl_days: 0,
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.credential_ttl(), chrono::Duration::days(30));
        assert_eq!(config.request_timeout(), std::time::Duration::from_secs(30));
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("File".parse::<CredentialBackend>().unwrap(), CredentialBackend::File);
        assert_eq!("keychain".parse::<CredentialBackend>().unwrap(), CredentialBackend::Keyring);
        assert!("".parse::<CredentialBackend>().is_err());
    }

    #[test]
    fn test_memory_backend_session_starts_unresolved() {
        let config = Config {
            credential_backend: CredentialBackend::Memory,
            ..Config::default()
        };
        let manager = config.session_manager().unwrap();
        assert!(!manager.is_resolved());
        assert_eq!(manager.hydrate(), crate::auth::SessionState::Anonymous);
    }

    fn scratch_config(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("aitoolkit-config-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join(CONFIG_FILE)
    }

    #[test]
    fn test_remember_username_keeps_file_settings() {
        let path = scratch_config("remember");
        Config::default().save_to(&path).unwrap();

        // A run with overrides applied must not leak them into the file
        let vars = env(&[("AITOOLKIT_CREDENTIAL_BACKEND", "memory")]);
        let mut running = Config::load_from(&path).unwrap();
        running.apply_overrides(|k| vars.get(k).cloned()).unwrap();
        running.api_base_url = "http://127.0.0.1:9".to_string();
        assert_eq!(running.credential_backend, CredentialBackend::Memory);

        Config::remember_username_at(&path, "alice").unwrap();

        let on_disk = Config::load_from(&path).unwrap();
        assert_eq!(on_disk.last_username.as_deref(), Some("alice"));
        assert_eq!(on_disk.credential_backend, CredentialBackend::File);
        assert_eq!(on_disk.api_base_url, "http://localhost:5000");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_remember_username_leaves_unparsable_file_alone() {
        let path = scratch_config("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(Config::remember_username_at(&path, "alice").is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
