//! Mock session provider for testing
//!
//! Simulates a platform with a fixed set of users and feeds, including
//! failures partway through a feed and flaky handle lookups. Feeds are lazy:
//! a post is only produced when the pipeline pulls it, and every pull is
//! counted so tests can verify early termination.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::error::ProviderError;
use crate::session::store::{SessionStore, StoredAccount};
use crate::session::{PostStream, ProviderFactory, SessionProvider, SyntheticIdentity, UserProfile};
use crate::types::Post;

/// Posts served for one user id
#[derive(Debug, Clone)]
pub enum MockFeed {
    /// A fixed list, served in the given order
    Posts(Vec<Post>),
    /// An unbounded feed starting at `newest` and stepping back in time
    Endless {
        newest: DateTime<Utc>,
        step: chrono::Duration,
    },
}

/// Error injected into a feed after some number of posts
#[derive(Debug, Clone)]
pub struct FeedFailure {
    /// Posts yielded before the error
    pub after: usize,
    /// Number of feed opens that fail; `None` fails every open
    pub times: Option<usize>,
    pub error: ProviderError,
}

impl FeedFailure {
    /// Fail every time the feed is opened, before any post
    pub fn always(error: ProviderError) -> Self {
        Self {
            after: 0,
            times: None,
            error,
        }
    }

    /// Fail only the first `times` opens
    pub fn first(times: usize, error: ProviderError) -> Self {
        Self {
            after: 0,
            times: Some(times),
            error,
        }
    }

    /// Yield `after` posts before failing
    pub fn after(mut self, after: usize) -> Self {
        self.after = after;
        self
    }
}

/// Configuration and call counters for mock providers.
///
/// Counters are shared, so a clone taken before the config is handed to a
/// [`MockFactory`] observes every call made by providers it creates.
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,

    /// Lowercased handle -> user id
    pub users: HashMap<String, u64>,

    pub feeds: HashMap<u64, MockFeed>,

    pub feed_failures: HashMap<u64, FeedFailure>,

    /// Number of initial handle lookups that fail with a network error
    pub lookup_failures: usize,

    /// Error returned when registering an identity
    pub add_account_error: Option<String>,

    /// Fixed answer for `active_sessions`; otherwise the store decides
    pub active_sessions: Option<usize>,

    pub pulled: Arc<AtomicUsize>,
    pub feed_opens: Arc<Mutex<HashMap<u64, usize>>>,
    pub limits_seen: Arc<Mutex<Vec<Option<usize>>>>,
    pub lookup_calls: Arc<AtomicUsize>,
    pub add_account_calls: Arc<AtomicUsize>,
    pub factory_calls: Arc<AtomicUsize>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            users: HashMap::new(),
            feeds: HashMap::new(),
            feed_failures: HashMap::new(),
            lookup_failures: 0,
            add_account_error: None,
            active_sessions: None,
            pulled: Arc::new(AtomicUsize::new(0)),
            feed_opens: Arc::new(Mutex::new(HashMap::new())),
            limits_seen: Arc::new(Mutex::new(Vec::new())),
            lookup_calls: Arc::new(AtomicUsize::new(0)),
            add_account_calls: Arc::new(AtomicUsize::new(0)),
            factory_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockConfig {
    pub fn with_user(mut self, handle: &str, id: u64) -> Self {
        self.users.insert(handle.to_lowercase(), id);
        self
    }

    pub fn with_posts(mut self, user_id: u64, posts: Vec<Post>) -> Self {
        self.feeds.insert(user_id, MockFeed::Posts(posts));
        self
    }

    pub fn with_endless_feed(
        mut self,
        user_id: u64,
        newest: DateTime<Utc>,
        step: chrono::Duration,
    ) -> Self {
        self.feeds.insert(user_id, MockFeed::Endless { newest, step });
        self
    }

    pub fn with_feed_failure(mut self, user_id: u64, failure: FeedFailure) -> Self {
        self.feed_failures.insert(user_id, failure);
        self
    }

    pub fn with_lookup_failures(mut self, count: usize) -> Self {
        self.lookup_failures = count;
        self
    }

    /// Posts pulled from all feeds so far
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    /// Times any feed was opened
    pub fn feed_opens(&self) -> usize {
        self.feed_opens
            .lock()
            .map(|opens| opens.values().sum())
            .unwrap_or(0)
    }

    /// Times the feed for `user_id` was opened
    pub fn feed_opens_for(&self, user_id: u64) -> usize {
        self.feed_opens
            .lock()
            .map(|opens| opens.get(&user_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// The `limit` argument of every feed open, in call order
    pub fn limits_seen(&self) -> Vec<Option<usize>> {
        self.limits_seen
            .lock()
            .map(|limits| limits.clone())
            .unwrap_or_default()
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn add_account_calls(&self) -> usize {
        self.add_account_calls.load(Ordering::SeqCst)
    }

    pub fn factory_calls(&self) -> usize {
        self.factory_calls.load(Ordering::SeqCst)
    }

    /// Record a feed open and return its 0-based index for that user
    fn record_open(&self, user_id: u64, limit: Option<usize>) -> usize {
        if let Ok(mut limits) = self.limits_seen.lock() {
            limits.push(limit);
        }
        match self.feed_opens.lock() {
            Ok(mut opens) => {
                let count = opens.entry(user_id).or_insert(0);
                *count += 1;
                *count - 1
            }
            Err(_) => 0,
        }
    }
}

/// Mock provider. Registered identities go to the session store when one is
/// attached.
pub struct MockProvider {
    config: MockConfig,
    store: Option<SessionStore>,
}

impl MockProvider {
    pub fn new(config: MockConfig, store: SessionStore) -> Self {
        Self {
            config,
            store: Some(store),
        }
    }

    /// A provider without a session store; it reports one active session
    /// unless configured otherwise.
    pub fn detached(config: MockConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    fn feed_iter(&self, user_id: u64) -> Box<dyn Iterator<Item = Post> + Send> {
        match self.config.feeds.get(&user_id) {
            Some(MockFeed::Posts(posts)) => Box::new(posts.clone().into_iter()),
            Some(MockFeed::Endless { newest, step }) => {
                let newest = *newest;
                let step = *step;
                Box::new((0u64..).map(move |i| {
                    let created_at = newest - step * (i as i32);
                    Post::new(i + 1, format!("endless post {}", i + 1), created_at)
                        .with_author(user_id)
                }))
            }
            None => Box::new(std::iter::empty()),
        }
    }
}

#[async_trait]
impl SessionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn add_account(&self, identity: &SyntheticIdentity) -> Result<(), ProviderError> {
        self.config.add_account_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = &self.config.add_account_error {
            return Err(ProviderError::Authentication(error.clone()));
        }

        if let Some(store) = &self.store {
            store.add_account(StoredAccount::from_identity(identity))?;
        }
        Ok(())
    }

    async fn active_sessions(&self) -> Result<usize, ProviderError> {
        if let Some(count) = self.config.active_sessions {
            return Ok(count);
        }
        match &self.store {
            Some(store) => Ok(store.active_accounts()?.len()),
            None => Ok(1),
        }
    }

    async fn user_by_login(&self, handle: &str) -> Result<Option<UserProfile>, ProviderError> {
        let call = self.config.lookup_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.config.lookup_failures {
            return Err(ProviderError::Network(format!(
                "Mock lookup failure {}",
                call
            )));
        }

        Ok(self
            .config
            .users
            .get(&handle.to_lowercase())
            .map(|id| UserProfile {
                id: *id,
                handle: handle.to_string(),
                display_name: None,
            }))
    }

    fn user_posts(&self, user_id: u64, limit: Option<usize>) -> PostStream<'_> {
        let open_index = self.config.record_open(user_id, limit);

        let mut posts = self.feed_iter(user_id);
        if let Some(limit) = limit {
            posts = Box::new(posts.take(limit));
        }

        let failure = self
            .config
            .feed_failures
            .get(&user_id)
            .filter(|f| f.times.map_or(true, |times| open_index < times))
            .cloned();

        let items: Box<dyn Iterator<Item = Result<Post, ProviderError>> + Send> = match failure {
            Some(failure) => Box::new(
                posts
                    .take(failure.after)
                    .map(Ok)
                    .chain(std::iter::once(Err(failure.error))),
            ),
            None => Box::new(posts.map(Ok)),
        };

        let pulled = Arc::clone(&self.config.pulled);
        stream::iter(items)
            .inspect(move |item| {
                if item.is_ok() {
                    pulled.fetch_add(1, Ordering::SeqCst);
                }
            })
            .boxed()
    }
}

/// Creates [`MockProvider`]s that share one [`MockConfig`]
pub struct MockFactory {
    config: MockConfig,
}

impl MockFactory {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }
}

impl ProviderFactory for MockFactory {
    fn create(&self, store: SessionStore) -> Result<Box<dyn SessionProvider>, ProviderError> {
        self.config.factory_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockProvider::new(self.config.clone(), store)))
    }
}
