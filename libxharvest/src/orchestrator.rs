//! Sequential fetching across several accounts
//!
//! Accounts are processed one at a time over the pipeline's shared session.
//! A failing account is logged and recorded in the [`BatchReport`]; it never
//! stops the remaining accounts.

use std::time::Duration;

use tracing::{error, info};

use crate::pipeline::{FetchPipeline, FetchRequest};
use crate::retry::RetryPolicy;
use crate::types::{AccountRef, TaggedPost};
use crate::window::TimeWindow;

/// Default pause between consecutive accounts
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(2);

/// An account that produced no results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFailure {
    pub account: AccountRef,
    pub error: String,
    pub exit_code: i32,
}

/// Outcome of a multi-account fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Posts of every successful account, in input order then feed order
    pub posts: Vec<TaggedPost>,
    pub failures: Vec<AccountFailure>,
    pub attempted: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    /// True when at least one account was attempted and none succeeded
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failures.len() == self.attempted
    }
}

#[derive(Debug, Clone)]
pub struct MultiAccountFetcher {
    rate_limit_delay: Duration,
    retry: RetryPolicy,
}

impl Default for MultiAccountFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_DELAY, RetryPolicy::default())
    }
}

impl MultiAccountFetcher {
    pub fn new(rate_limit_delay: Duration, retry: RetryPolicy) -> Self {
        Self {
            rate_limit_delay,
            retry,
        }
    }

    /// Fetch every account in order, applying the same window and per-account
    /// cap, and tag each post with the reference it was fetched for.
    ///
    /// The rate-limit delay is slept between accounts whether or not the
    /// previous one succeeded, and never after the last.
    pub async fn fetch_many(
        &self,
        pipeline: &mut FetchPipeline,
        accounts: &[AccountRef],
        window: &TimeWindow,
        max_per_account: Option<usize>,
    ) -> BatchReport {
        let total = accounts.len();
        let mut report = BatchReport {
            attempted: total,
            ..Default::default()
        };

        for (index, account) in accounts.iter().enumerate() {
            info!("{}", "=".repeat(50));
            info!(
                "Fetching tweets for account {}/{}: {}",
                index + 1,
                total,
                account.label()
            );
            info!("{}", "=".repeat(50));

            let request = FetchRequest::new(account.clone())
                .with_window(*window)
                .with_max_count(max_per_account)
                .with_retry(self.retry);

            match pipeline.fetch(&request).await {
                Ok(posts) => {
                    info!("Collected {} tweets from {}", posts.len(), account.label());
                    report
                        .posts
                        .extend(posts.into_iter().map(|post| TaggedPost {
                            post,
                            origin: account.clone(),
                        }));
                }
                Err(e) => {
                    error!("Failed to fetch tweets for {}: {}", account.label(), e);
                    report.failures.push(AccountFailure {
                        account: account.clone(),
                        error: e.to_string(),
                        exit_code: e.exit_code(),
                    });
                }
            }

            if index + 1 < total && !self.rate_limit_delay.is_zero() {
                info!(
                    "Waiting {} seconds before next account...",
                    self.rate_limit_delay.as_secs_f64()
                );
                tokio::time::sleep(self.rate_limit_delay).await;
            }
        }

        info!(
            "Fetched {} tweets from {}/{} accounts",
            report.posts.len(),
            report.succeeded(),
            total
        );
        report
    }
}
