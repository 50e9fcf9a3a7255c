//! Cookie-authenticated provider for the x.com web GraphQL API
//!
//! Requests reuse the cookies of a logged-in browser: the `ct0` cookie doubles
//! as the CSRF token and the public web bearer token identifies the client.
//! Timelines are paged with opaque bottom cursors; each page is flattened to
//! [`Post`]s, newest first.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::SessionConfig;
use crate::cookies::cookie_value;
use crate::error::ProviderError;
use crate::session::store::{SessionStore, StoredAccount};
use crate::session::{PostStream, ProviderFactory, SessionProvider, SyntheticIdentity, UserProfile};
use crate::types::Post;

pub const DEFAULT_BASE_URL: &str = "https://x.com/i/api/graphql";

/// Bearer token shipped with the public web client
const WEB_BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Posts requested per timeline page
const PAGE_SIZE: usize = 20;

/// Format of `legacy.created_at` on post objects
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GraphQL persisted-query ids. They rotate when the web client is redeployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIds {
    pub user_by_screen_name: String,
    pub user_tweets: String,
}

impl Default for QueryIds {
    fn default() -> Self {
        Self {
            user_by_screen_name: "xmU6X_CKVnQ5lSrCbAmJsg".to_string(),
            user_tweets: "V7H0Ap3_Hh2FyS75OCDO3Q".to_string(),
        }
    }
}

fn feature_flags() -> Value {
    json!({
        "hidden_profile_subscriptions_enabled": true,
        "rweb_tipjar_consumption_enabled": true,
        "responsive_web_graphql_exclude_directive_enabled": true,
        "verified_phone_label_enabled": false,
        "subscriptions_verification_info_is_identity_verified_enabled": true,
        "subscriptions_verification_info_verified_since_enabled": true,
        "highlights_tweets_tab_ui_enabled": true,
        "responsive_web_twitter_article_notes_tab_enabled": true,
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "view_counts_everywhere_api_enabled": true
    })
}

/// One decoded timeline page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelinePage {
    /// Posts on the page, newest first
    pub posts: Vec<Post>,
    /// Cursor for the next (older) page
    pub next_cursor: Option<String>,
    /// Tweet and conversation entries on the page, whether or not they
    /// decoded to a post
    pub entry_count: usize,
}

pub struct XWebProvider {
    client: reqwest::Client,
    base_url: String,
    query_ids: QueryIds,
    store: SessionStore,
}

impl XWebProvider {
    pub fn new(client: reqwest::Client, store: SessionStore) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            query_ids: QueryIds::default(),
            store,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_query_ids(mut self, query_ids: QueryIds) -> Self {
        self.query_ids = query_ids;
        self
    }

    /// First active pool entry; its cookies sign every request
    fn credentials(&self) -> Result<StoredAccount, ProviderError> {
        self.store
            .active_accounts()?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ProviderError::Authentication("No active accounts in session pool".to_string())
            })
    }

    async fn graphql(
        &self,
        query_id: &str,
        operation: &str,
        variables: Value,
    ) -> Result<Value, ProviderError> {
        let account = self.credentials()?;
        let csrf_token = cookie_value(&account.cookies, "ct0").unwrap_or_default();
        let url = format!("{}/{}/{}", self.base_url, query_id, operation);

        tracing::debug!("GET {} ({})", operation, url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("variables", variables.to_string()),
                ("features", feature_flags().to_string()),
            ])
            .bearer_auth(WEB_BEARER_TOKEN)
            .header("cookie", &account.cookies)
            .header("x-csrf-token", csrf_token)
            .header("user-agent", &account.user_agent)
            .header("x-twitter-active-user", "yes")
            .header("x-twitter-auth-type", "OAuth2Session")
            .header("content-type", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("{} returned invalid JSON: {}", operation, e)))?;

        if body.get("data").map_or(true, Value::is_null) {
            let message = body
                .pointer("/errors/0/message")
                .and_then(Value::as_str)
                .unwrap_or("response carried no data")
                .to_string();
            return Err(if message.to_lowercase().contains("rate limit") {
                ProviderError::RateLimit(message)
            } else {
                ProviderError::Api {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        Ok(body)
    }

    fn timeline(&self, user_id: u64, limit: Option<usize>) -> impl Stream<Item = Result<Post, ProviderError>> + Send + '_ {
        async_stream::try_stream! {
            let mut cursor: Option<String> = None;
            let mut cursors: HashSet<String> = HashSet::new();
            let mut seen: HashSet<u64> = HashSet::new();
            let mut yielded = 0usize;

            'pages: loop {
                let mut variables = json!({
                    "userId": user_id.to_string(),
                    "count": PAGE_SIZE,
                    "includePromotedContent": false,
                    "withQuickPromoteEligibilityTweetFields": false,
                    "withVoice": true,
                    "withV2Timeline": true
                });
                if let Some(c) = &cursor {
                    variables["cursor"] = Value::String(c.clone());
                }

                let body = self
                    .graphql(&self.query_ids.user_tweets, "UserTweets", variables)
                    .await?;
                let page = parse_timeline_page(&body)?;
                tracing::debug!(
                    "Timeline page for {}: {} entries, {} posts, cursor {:?}",
                    user_id,
                    page.entry_count,
                    page.posts.len(),
                    page.next_cursor
                );

                for post in page.posts {
                    if !seen.insert(post.id) {
                        continue;
                    }
                    yielded += 1;
                    yield post;
                    if limit.is_some_and(|l| yielded >= l) {
                        break 'pages;
                    }
                }

                // Tombstones and repeats still count: only a page holding nothing
                // but cursors, or a cursor already followed, ends the timeline
                match page.next_cursor {
                    Some(next) if page.entry_count > 0 && cursors.insert(next.clone()) => {
                        cursor = Some(next);
                    }
                    _ => break 'pages,
                }
            }
        }
    }
}

#[async_trait]
impl SessionProvider for XWebProvider {
    fn name(&self) -> &str {
        "x-web"
    }

    async fn add_account(&self, identity: &SyntheticIdentity) -> Result<(), ProviderError> {
        let account = StoredAccount::from_identity(identity);
        if !account.active {
            tracing::warn!(
                "Cookies for '{}' carry no ct0 token; account will be inactive",
                account.username
            );
        }
        self.store.add_account(account)?;
        Ok(())
    }

    async fn active_sessions(&self) -> Result<usize, ProviderError> {
        Ok(self.store.active_accounts()?.len())
    }

    async fn user_by_login(&self, handle: &str) -> Result<Option<UserProfile>, ProviderError> {
        let variables = json!({
            "screen_name": handle,
            "withSafetyModeUserFields": true
        });
        let body = self
            .graphql(&self.query_ids.user_by_screen_name, "UserByScreenName", variables)
            .await?;
        parse_user(&body)
    }

    fn user_posts(&self, user_id: u64, limit: Option<usize>) -> PostStream<'_> {
        self.timeline(user_id, limit).boxed()
    }
}

/// Builds [`XWebProvider`]s with a shared timeout and endpoint
#[derive(Debug, Clone)]
pub struct XWebFactory {
    base_url: String,
    query_ids: QueryIds,
    timeout: Duration,
}

impl XWebFactory {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            query_ids: QueryIds::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        let mut factory = Self::new();
        if let Some(secs) = config.request_timeout_secs {
            factory.timeout = Duration::from_secs(secs);
        }
        factory
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_query_ids(mut self, query_ids: QueryIds) -> Self {
        self.query_ids = query_ids;
        self
    }
}

impl Default for XWebFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for XWebFactory {
    fn create(&self, store: SessionStore) -> Result<Box<dyn SessionProvider>, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Box::new(
            XWebProvider::new(client, store)
                .with_base_url(self.base_url.clone())
                .with_query_ids(self.query_ids.clone()),
        ))
    }
}

fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        body.chars().take(200).collect()
    };
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Authentication(format!("{}: {}", status, message))
        }
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Decode a `UserByScreenName` response. Unavailable users decode to `None`.
pub fn parse_user(body: &Value) -> Result<Option<UserProfile>, ProviderError> {
    let result = match body.pointer("/data/user/result") {
        Some(result) if !result.is_null() => result,
        _ => return Ok(None),
    };
    if result.get("__typename").and_then(Value::as_str) == Some("UserUnavailable") {
        return Ok(None);
    }

    let id = result
        .get("rest_id")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| ProviderError::Parse("user result has no rest_id".to_string()))?;
    let legacy = result.get("legacy");

    Ok(Some(UserProfile {
        id,
        handle: legacy
            .and_then(|l| l.get("screen_name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        display_name: legacy
            .and_then(|l| l.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }))
}

/// Decode one `UserTweets` response into posts and the bottom cursor.
///
/// Pinned entries are ignored so the page stays in reverse-chronological
/// order. Conversation modules contribute every post they contain.
pub fn parse_timeline_page(body: &Value) -> Result<TimelinePage, ProviderError> {
    let result = body
        .pointer("/data/user/result")
        .ok_or_else(|| ProviderError::Parse("response has no data.user.result".to_string()))?;

    let instructions = result
        .pointer("/timeline_v2/timeline/instructions")
        .or_else(|| result.pointer("/timeline/timeline/instructions"))
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Parse("timeline instructions missing".to_string()))?;

    let mut page = TimelinePage::default();
    for instruction in instructions {
        if instruction.get("type").and_then(Value::as_str) != Some("TimelineAddEntries") {
            continue;
        }
        let entries = instruction
            .get("entries")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for entry in entries {
            let entry_id = entry.get("entryId").and_then(Value::as_str).unwrap_or_default();
            let content = match entry.get("content") {
                Some(content) => content,
                None => continue,
            };

            if entry_id.starts_with("tweet-") {
                page.entry_count += 1;
                if let Some(post) = content
                    .pointer("/itemContent/tweet_results/result")
                    .and_then(parse_post)
                {
                    page.posts.push(post);
                }
            } else if entry_id.starts_with("profile-conversation-") {
                page.entry_count += 1;
                let items = content
                    .get("items")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                page.posts.extend(items.iter().filter_map(|item| {
                    item.pointer("/item/itemContent/tweet_results/result")
                        .and_then(parse_post)
                }));
            } else if content.get("cursorType").and_then(Value::as_str) == Some("Bottom") {
                page.next_cursor = content
                    .get("value")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }
    }

    page.posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(page)
}

fn parse_post(result: &Value) -> Option<Post> {
    let result = match result.get("__typename").and_then(Value::as_str) {
        Some("TweetWithVisibilityResults") => result.get("tweet")?,
        Some("TweetTombstone") => return None,
        _ => result,
    };

    let legacy = result.get("legacy")?;
    let id = legacy
        .get("id_str")
        .or_else(|| result.get("rest_id"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok())?;

    let created_at = legacy
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_str(s, CREATED_AT_FORMAT).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let created_at = match created_at {
        Some(ts) => ts,
        None => {
            tracing::debug!("Skipping post {} with unreadable created_at", id);
            return None;
        }
    };

    let text = result
        .pointer("/note_tweet/note_tweet_results/result/text")
        .or_else(|| legacy.get("full_text"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut post = Post::new(id, text, created_at);
    if let Some(author) = legacy
        .get("user_id_str")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok())
    {
        post = post.with_author(author);
    }
    Some(post)
}
