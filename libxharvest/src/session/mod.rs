//! Session providers and session setup
//!
//! A [`SessionProvider`] is the narrow interface the fetch pipeline uses to
//! reach the platform: register an identity, check the pool, look up a
//! handle, and stream an account's posts newest first. Cursor handling and
//! HTTP transport live entirely behind it.
//!
//! [`SessionManager`] turns configuration into a ready [`AccountSession`]:
//! it rebuilds the on-disk pool, loads the cookie export, registers a
//! synthetic identity carrying the real cookies and confirms the pool has an
//! active entry.
//!
//! # Examples
//!
//! ```no_run
//! use libxharvest::config::Config;
//! use libxharvest::session::{x_web::XWebFactory, SessionManager};
//!
//! # async fn example() -> libxharvest::error::Result<()> {
//! let config = Config::load()?;
//! let factory = XWebFactory::from_config(&config.session);
//! let manager = SessionManager::new(Box::new(factory), &config.session);
//!
//! let session = manager.ensure_session().await?;
//! println!("{} session ready", session.provider().name());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use secrecy::SecretString;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::cookies::{cookie_count, cookie_header_from_file};
use crate::error::{HarvestError, ProviderError, Result};
use crate::types::Post;

pub mod store;
pub mod x_web;

// Mock provider is available for all builds (not just tests) to support integration tests
pub mod mock;

pub use store::SessionStore;

/// Posts for one account, newest first
pub type PostStream<'a> = BoxStream<'a, std::result::Result<Post, ProviderError>>;

/// Browser user agent sent with every request unless configured otherwise
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Wait between registering an identity and checking the pool
pub const REGISTRATION_DELAY: Duration = Duration::from_millis(100);

/// Public profile data returned by a handle lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: u64,
    pub handle: String,
    pub display_name: Option<String>,
}

/// Identity registered with a provider.
///
/// Only the cookies matter for cookie-authenticated scraping; password and
/// e-mail are random placeholders that satisfy the pool's schema.
#[derive(Debug)]
pub struct SyntheticIdentity {
    pub username: String,
    pub password: SecretString,
    pub email: String,
    pub email_password: SecretString,
    pub user_agent: String,
    pub cookies: SecretString,
}

impl SyntheticIdentity {
    pub fn new(username: &str, cookies: SecretString, user_agent: &str) -> Self {
        let dummy = Uuid::new_v4().to_string();
        Self {
            username: username.to_string(),
            password: SecretString::from(dummy.clone()),
            email: format!("{}@example.com", &dummy[..8]),
            email_password: SecretString::from(dummy),
            user_agent: user_agent.to_string(),
            cookies,
        }
    }
}

/// Platform access used by the fetch pipeline
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Short lowercase provider name for logs (e.g. "x-web", "mock")
    fn name(&self) -> &str;

    /// Register an identity in the provider's session pool
    async fn add_account(&self, identity: &SyntheticIdentity) -> std::result::Result<(), ProviderError>;

    /// Number of pool entries currently usable for requests
    async fn active_sessions(&self) -> std::result::Result<usize, ProviderError>;

    /// Look up an account by handle. `Ok(None)` means the handle does not exist.
    async fn user_by_login(&self, handle: &str) -> std::result::Result<Option<UserProfile>, ProviderError>;

    /// Stream an account's posts newest first.
    ///
    /// `limit` is a hint; providers that can cap server-side should stop
    /// after that many posts, but callers must not rely on it.
    fn user_posts(&self, user_id: u64, limit: Option<usize>) -> PostStream<'_>;
}

/// Builds a provider bound to a freshly reset session store
pub trait ProviderFactory: Send + Sync {
    fn create(&self, store: SessionStore) -> std::result::Result<Box<dyn SessionProvider>, ProviderError>;
}

/// An authenticated provider ready for fetching
pub struct AccountSession {
    provider: Box<dyn SessionProvider>,
    username: String,
}

impl AccountSession {
    pub fn provider(&self) -> &dyn SessionProvider {
        self.provider.as_ref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Creates sessions from configuration
pub struct SessionManager {
    factory: Box<dyn ProviderFactory>,
    cookie_file: PathBuf,
    username: String,
    store_path: PathBuf,
    user_agent: String,
    settle_delay: Duration,
    registration_delay: Duration,
}

impl SessionManager {
    pub fn new(factory: Box<dyn ProviderFactory>, config: &SessionConfig) -> Self {
        Self {
            factory,
            cookie_file: config.cookie_file_path(),
            username: config.username.clone(),
            store_path: config.store_file_path(),
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            settle_delay: store::DEFAULT_SETTLE_DELAY,
            registration_delay: REGISTRATION_DELAY,
        }
    }

    /// Override the pool settle delay and the post-registration wait
    pub fn with_delays(mut self, settle: Duration, registration: Duration) -> Self {
        self.settle_delay = settle;
        self.registration_delay = registration;
        self
    }

    pub fn store_path(&self) -> &std::path::Path {
        &self.store_path
    }

    /// Build a new session from scratch.
    ///
    /// The pool file is always deleted first. Failures surface as
    /// [`HarvestError::Session`] and are not retried here.
    pub async fn ensure_session(&self) -> Result<AccountSession> {
        let store = SessionStore::new(&self.store_path).with_settle_delay(self.settle_delay);
        store
            .reset()
            .await
            .map_err(|e| HarvestError::Session(e.to_string()))?;

        let cookies = cookie_header_from_file(&self.cookie_file)?;
        let count = cookie_count(&cookies);
        let identity = SyntheticIdentity::new(&self.username, cookies, &self.user_agent);

        let provider = self
            .factory
            .create(store)
            .map_err(|e| HarvestError::Session(format!("Failed to create provider: {}", e)))?;

        provider
            .add_account(&identity)
            .await
            .map_err(|e| HarvestError::Session(format!("Failed to add account '{}': {}", self.username, e)))?;
        tracing::info!("Account '{}' added with {} cookies", self.username, count);

        if !self.registration_delay.is_zero() {
            tokio::time::sleep(self.registration_delay).await;
        }

        let active = provider
            .active_sessions()
            .await
            .map_err(|e| HarvestError::Session(format!("Failed to inspect session pool: {}", e)))?;
        if active == 0 {
            return Err(HarvestError::Session(
                "No accounts found after adding".to_string(),
            ));
        }
        tracing::info!("Account is active and ready ({} active in pool)", active);

        Ok(AccountSession {
            provider,
            username: self.username.clone(),
        })
    }
}
