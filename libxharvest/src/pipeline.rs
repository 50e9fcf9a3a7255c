//! Time-windowed fetch over a reverse-chronological feed
//!
//! One pass walks the provider's stream newest first, classifying every post
//! against the [`TimeWindow`]. Posts newer than the window are skipped, the
//! first post older than the window ends the pass, and everything between is
//! collected until the optional cap is reached.
//!
//! A stream error discards the pass's partial results. The next attempt
//! starts again from the newest post with an empty buffer, so retried passes
//! never produce duplicates.

use futures::StreamExt;
use tracing::{debug, info};

use crate::error::{HarvestError, ProviderError, Result};
use crate::resolve::resolve_account_id;
use crate::retry::RetryPolicy;
use crate::session::{AccountSession, SessionManager, SessionProvider};
use crate::types::{AccountRef, Post};
use crate::window::{FilterSignal, TimeWindow};

/// Accepted posts between progress log lines
pub const PROGRESS_EVERY: usize = 10;

/// What to fetch for a single account
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub target: AccountRef,
    pub window: TimeWindow,
    pub max_count: Option<usize>,
    pub retry: RetryPolicy,
}

impl FetchRequest {
    pub fn new(target: AccountRef) -> Self {
        Self {
            target,
            window: TimeWindow::unbounded(),
            max_count: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_max_count(mut self, max_count: Option<usize>) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Run one pass over `user_id`'s feed and collect the posts inside `window`.
///
/// Returns as soon as the window start is crossed or `max_count` posts have
/// been accepted; nothing past that point is pulled from the provider. A
/// `max_count` of zero returns immediately without opening the feed.
pub async fn collect_window(
    provider: &dyn SessionProvider,
    user_id: u64,
    window: &TimeWindow,
    max_count: Option<usize>,
    progress_every: usize,
) -> std::result::Result<Vec<Post>, ProviderError> {
    let mut posts = Vec::new();
    if max_count == Some(0) {
        return Ok(posts);
    }

    // Skipped posts would count against a server-side cap
    let native_limit = if window.end.is_none() { max_count } else { None };
    let mut feed = provider.user_posts(user_id, native_limit);

    while let Some(item) = feed.next().await {
        let post = item?;
        match window.classify(post.created_at) {
            FilterSignal::Stop => {
                debug!(
                    "Post {} at {} is before the window start, stopping",
                    post.id, post.created_at
                );
                break;
            }
            FilterSignal::Skip => continue,
            FilterSignal::Emit => {
                posts.push(post);
                if progress_every > 0 && posts.len() % progress_every == 0 {
                    info!("Fetched {} tweets...", posts.len());
                }
                if max_count.is_some_and(|max| posts.len() >= max) {
                    debug!("Reached max count of {}", posts.len());
                    break;
                }
            }
        }
    }

    Ok(posts)
}

/// Fetches posts for one account at a time over a lazily created session
pub struct FetchPipeline {
    sessions: SessionManager,
    session: Option<AccountSession>,
}

impl FetchPipeline {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions,
            session: None,
        }
    }

    /// The current session, creating one on first use
    pub async fn session(&mut self) -> Result<&AccountSession> {
        if self.session.is_none() {
            let session = self.sessions.ensure_session().await?;
            self.session = Some(session);
        }
        self.session
            .as_ref()
            .ok_or_else(|| HarvestError::Session("Session was not initialized".to_string()))
    }

    /// Fetch the posts of `request.target` that fall inside `request.window`,
    /// newest first.
    ///
    /// Session setup and handle resolution happen first; their errors are
    /// returned as-is. If every fetch pass fails the last provider error is
    /// returned inside [`HarvestError::Fetch`].
    pub async fn fetch(&mut self, request: &FetchRequest) -> Result<Vec<Post>> {
        let session = self.session().await?;
        let provider = session.provider();

        let user_id = resolve_account_id(provider, &request.target, &request.retry).await?;
        let account = request.target.label();
        info!(
            "Fetching tweets for {} (user id {}) in {} as {}",
            account,
            user_id,
            request.window,
            session.username()
        );

        let window = &request.window;
        let max_count = request.max_count;
        let label = format!("Fetching tweets for {}", account);
        let posts = request
            .retry
            .run(&label, |_| {
                collect_window(provider, user_id, window, max_count, PROGRESS_EVERY)
            })
            .await
            .map_err(|source| HarvestError::Fetch {
                account: account.clone(),
                attempts: request.retry.attempts,
                source,
            })?;

        info!("Collected {} tweets for {}", posts.len(), account);
        Ok(posts)
    }
}
