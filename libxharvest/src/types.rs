//! Core types for xharvest

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Literal pattern accepted for raw timestamps on input
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Literal pattern accepted for calendar dates on input
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single post as yielded by a session provider.
///
/// Posts are never mutated after the provider creates them; the pipeline
/// forwards them unchanged to the caller and the export layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: Option<u64>,
}

impl Post {
    pub fn new(id: u64, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text: text.into(),
            created_at,
            author_id: None,
        }
    }

    pub fn with_author(mut self, author_id: u64) -> Self {
        self.author_id = Some(author_id);
        self
    }
}

/// Account identifier as supplied by a caller.
///
/// Handles are resolved to numeric ids through the session provider; ids are
/// used as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountRef {
    Id(u64),
    Handle(String),
}

impl AccountRef {
    /// Parse a command-line style identifier.
    ///
    /// All-digit input becomes [`AccountRef::Id`]; anything else is a handle,
    /// with a single leading `@` removed.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(HarvestError::InvalidInput(
                "Account identifier cannot be empty".to_string(),
            ));
        }

        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            return trimmed.parse::<u64>().map(AccountRef::Id).map_err(|_| {
                HarvestError::InvalidInput(format!("Account id out of range: {}", trimmed))
            });
        }

        let handle = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if handle.is_empty() || handle.contains(char::is_whitespace) {
            return Err(HarvestError::InvalidInput(format!(
                "Invalid account handle: '{}'",
                input
            )));
        }
        Ok(AccountRef::Handle(handle.to_string()))
    }

    /// Short label for log lines (`@handle` or the numeric id)
    pub fn label(&self) -> String {
        match self {
            AccountRef::Id(id) => id.to_string(),
            AccountRef::Handle(handle) => format!("@{}", handle),
        }
    }
}

impl std::fmt::Display for AccountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountRef::Id(id) => write!(f, "{}", id),
            AccountRef::Handle(handle) => write!(f, "{}", handle),
        }
    }
}

impl From<u64> for AccountRef {
    fn from(id: u64) -> Self {
        AccountRef::Id(id)
    }
}

/// A post tagged with the account it was fetched for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedPost {
    pub post: Post,
    pub origin: AccountRef,
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` timestamp.
///
/// Fractional seconds and offsets other than `Z` are rejected.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    let invalid = || {
        HarvestError::InvalidInput(format!(
            "Invalid timestamp '{}'. Expected format YYYY-MM-DDTHH:MM:SSZ",
            input
        ))
    };

    if input.len() != 20 {
        return Err(invalid());
    }
    NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| invalid())
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let invalid = || {
        HarvestError::InvalidInput(format!(
            "Invalid date '{}'. Expected format YYYY-MM-DD",
            input
        ))
    };

    if input.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_| invalid())
}
