//! On-disk session pool
//!
//! The pool is a small TOML file listing the identities a provider may use.
//! It is rebuilt from scratch before every session: [`SessionStore::reset`]
//! deletes whatever a previous run left behind, so a half-written or
//! otherwise corrupted pool never carries over.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::cookies::cookie_value;
use crate::error::StoreError;
use crate::session::SyntheticIdentity;

/// Pause after deleting the pool file before a new one is written
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    settle_delay: Duration,
}

/// Pool contents persisted to TOML
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreState {
    #[serde(default)]
    pub accounts: Vec<StoredAccount>,
}

/// One registered identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredAccount {
    pub username: String,
    pub password: String,
    pub email: String,
    pub email_password: String,
    pub user_agent: String,
    pub cookies: String,
    pub active: bool,
    pub added_at: DateTime<Utc>,
}

impl StoredAccount {
    /// Record an identity. It counts as active only when its cookies carry
    /// the `ct0` CSRF token the web endpoints require.
    pub fn from_identity(identity: &SyntheticIdentity) -> Self {
        let cookies = identity.cookies.expose_secret().to_string();
        let active = cookie_value(&cookies, "ct0").is_some_and(|v| !v.is_empty());
        Self {
            username: identity.username.clone(),
            password: identity.password.expose_secret().to_string(),
            email: identity.email.clone(),
            email_password: identity.email_password.expose_secret().to_string(),
            user_agent: identity.user_agent.clone(),
            cookies,
            active,
            added_at: Utc::now(),
        }
    }
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the pool file if present, then wait for the settle delay.
    ///
    /// Returns whether a file was actually removed.
    pub async fn reset(&self) -> Result<bool, StoreError> {
        if !self.path.exists() {
            return Ok(false);
        }

        tokio::fs::remove_file(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        tracing::info!("Reset session pool at {}", self.path.display());

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        Ok(true)
    }

    /// Register an identity, replacing any entry with the same username
    pub fn add_account(&self, account: StoredAccount) -> Result<(), StoreError> {
        let mut state = self.load()?;
        state.accounts.retain(|a| a.username != account.username);
        state.accounts.push(account);
        self.save(&state)
    }

    /// All registered identities. A missing pool file is an empty pool.
    pub fn accounts(&self) -> Result<Vec<StoredAccount>, StoreError> {
        Ok(self.load()?.accounts)
    }

    /// Registered identities usable for requests
    pub fn active_accounts(&self) -> Result<Vec<StoredAccount>, StoreError> {
        Ok(self
            .accounts()?
            .into_iter()
            .filter(|a| a.active)
            .collect())
    }

    fn load(&self) -> Result<StoreState, StoreError> {
        if !self.path.exists() {
            return Ok(StoreState::default());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        toml::from_str(&content).map_err(|e| StoreError::Format {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn save(&self, state: &StoreState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let content = toml::to_string_pretty(state).map_err(|e| StoreError::Format {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, content).map_err(|e| self.io_error(e))?;

        // Pool holds live cookies
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, permissions).map_err(|e| self.io_error(e))?;
        }

        Ok(())
    }

    fn io_error(&self, error: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            message: error.to_string(),
        }
    }
}
