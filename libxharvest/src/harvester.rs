//! Public fetch entry points
//!
//! [`Harvester`] validates caller input (timestamps, dates, identifiers)
//! before any network activity, then delegates to the [`FetchPipeline`] for
//! one account or the [`MultiAccountFetcher`] for several. A single harvester
//! keeps its session across calls.
//!
//! # Examples
//!
//! ```no_run
//! use libxharvest::config::Config;
//! use libxharvest::harvester::Harvester;
//! use libxharvest::session::x_web::XWebFactory;
//! use libxharvest::types::AccountRef;
//!
//! # async fn example() -> libxharvest::error::Result<()> {
//! let config = Config::load()?;
//! let factory = XWebFactory::from_config(&config.session);
//! let mut harvester = Harvester::from_config(&config, Box::new(factory));
//!
//! let account = AccountRef::parse("@rustlang")?;
//! let posts = harvester
//!     .fetch_for_account_in_date_range(&account, "2024-03-01", "2024-03-07", Some(50))
//!     .await?;
//! println!("{} posts", posts.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use crate::config::{Config, FetchConfig};
use crate::error::Result;
use crate::orchestrator::{BatchReport, MultiAccountFetcher};
use crate::pipeline::{FetchPipeline, FetchRequest};
use crate::retry::RetryPolicy;
use crate::session::{ProviderFactory, SessionManager};
use crate::types::{AccountRef, Post};
use crate::window::TimeWindow;

pub struct Harvester {
    pipeline: FetchPipeline,
    retry: RetryPolicy,
    rate_limit_delay: Duration,
}

impl Harvester {
    pub fn new(pipeline: FetchPipeline, retry: RetryPolicy, rate_limit_delay: Duration) -> Self {
        Self {
            pipeline,
            retry,
            rate_limit_delay,
        }
    }

    pub fn from_config(config: &Config, factory: Box<dyn ProviderFactory>) -> Self {
        let sessions = SessionManager::new(factory, &config.session);
        Self::with_fetch_config(FetchPipeline::new(sessions), &config.fetch)
    }

    pub fn with_fetch_config(pipeline: FetchPipeline, fetch: &FetchConfig) -> Self {
        Self::new(pipeline, fetch.retry_policy(), fetch.rate_limit_delay())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetch posts for one account between optional
    /// `YYYY-MM-DDTHH:MM:SSZ` bounds, both inclusive.
    pub async fn fetch_for_account(
        &mut self,
        account: &AccountRef,
        start: Option<&str>,
        end: Option<&str>,
        max_count: Option<usize>,
    ) -> Result<Vec<Post>> {
        let window = TimeWindow::from_timestamps(start, end)?;
        self.fetch_window(account, window, max_count).await
    }

    /// Fetch posts for one account over whole `YYYY-MM-DD` days
    pub async fn fetch_for_account_in_date_range(
        &mut self,
        account: &AccountRef,
        start_date: &str,
        end_date: &str,
        max_count: Option<usize>,
    ) -> Result<Vec<Post>> {
        let window = TimeWindow::from_date_range(start_date, end_date)?;
        self.fetch_window(account, window, max_count).await
    }

    /// Fetch several accounts in order with the same bounds and per-account
    /// cap. Account failures are reported in the [`BatchReport`]; only
    /// invalid bounds fail the whole call.
    pub async fn fetch_for_accounts(
        &mut self,
        accounts: &[AccountRef],
        start: Option<&str>,
        end: Option<&str>,
        max_per_account: Option<usize>,
    ) -> Result<BatchReport> {
        let window = TimeWindow::from_timestamps(start, end)?;
        Ok(self.fetch_many(accounts, window, max_per_account).await)
    }

    pub async fn fetch_for_accounts_in_date_range(
        &mut self,
        accounts: &[AccountRef],
        start_date: &str,
        end_date: &str,
        max_per_account: Option<usize>,
    ) -> Result<BatchReport> {
        let window = TimeWindow::from_date_range(start_date, end_date)?;
        Ok(self.fetch_many(accounts, window, max_per_account).await)
    }

    /// Fetch one account over an already-built window
    pub async fn fetch_window(
        &mut self,
        account: &AccountRef,
        window: TimeWindow,
        max_count: Option<usize>,
    ) -> Result<Vec<Post>> {
        let request = FetchRequest::new(account.clone())
            .with_window(window)
            .with_max_count(max_count)
            .with_retry(self.retry);
        self.pipeline.fetch(&request).await
    }

    /// Fetch several accounts over an already-built window
    pub async fn fetch_many(
        &mut self,
        accounts: &[AccountRef],
        window: TimeWindow,
        max_per_account: Option<usize>,
    ) -> BatchReport {
        MultiAccountFetcher::new(self.rate_limit_delay, self.retry)
            .fetch_many(&mut self.pipeline, accounts, &window, max_per_account)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::error::HarvestError;
    use crate::session::mock::{MockConfig, MockFactory};
    use tempfile::TempDir;

    fn harvester(temp_dir: &TempDir, factory: MockFactory) -> Harvester {
        let cookie_file = temp_dir.path().join("cookies.json");
        std::fs::write(&cookie_file, r#"{"ct0": "token", "auth_token": "secret"}"#).unwrap();
        let session = SessionConfig {
            cookie_file: cookie_file.to_string_lossy().to_string(),
            store_path: temp_dir
                .path()
                .join("accounts.toml")
                .to_string_lossy()
                .to_string(),
            ..Default::default()
        };

        let sessions = SessionManager::new(Box::new(factory), &session)
            .with_delays(Duration::ZERO, Duration::ZERO);
        Harvester::new(
            FetchPipeline::new(sessions),
            RetryPolicy::new(2, Duration::ZERO),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_invalid_timestamp_rejected_before_session() {
        let temp_dir = TempDir::new().unwrap();
        let factory = MockFactory::new(MockConfig::default());
        let handle = factory.config().clone();
        let mut harvester = harvester(&temp_dir, factory);

        let result = harvester
            .fetch_for_account(&AccountRef::Id(1), Some("2024-03-01 00:00:00"), None, None)
            .await;

        assert!(matches!(result, Err(HarvestError::InvalidInput(_))));
        assert_eq!(result.unwrap_err().exit_code(), 3);
        assert_eq!(handle.factory_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_date_rejected_for_batch() {
        let temp_dir = TempDir::new().unwrap();
        let factory = MockFactory::new(MockConfig::default());
        let handle = factory.config().clone();
        let mut harvester = harvester(&temp_dir, factory);

        let result = harvester
            .fetch_for_accounts_in_date_range(&[AccountRef::Id(1)], "2024-13-01", "2024-03-05", None)
            .await;

        assert!(matches!(result, Err(HarvestError::InvalidInput(_))));
        assert_eq!(handle.factory_calls(), 0);
    }

    #[tokio::test]
    async fn test_session_reused_across_calls() {
        let temp_dir = TempDir::new().unwrap();
        let factory = MockFactory::new(MockConfig::default());
        let handle = factory.config().clone();
        let mut harvester = harvester(&temp_dir, factory);

        harvester
            .fetch_for_account(&AccountRef::Id(1), None, None, Some(5))
            .await
            .unwrap();
        harvester
            .fetch_for_account(&AccountRef::Id(2), None, None, Some(5))
            .await
            .unwrap();

        assert_eq!(handle.factory_calls(), 1);
        assert_eq!(handle.feed_opens(), 2);
    }
}
