//! Result export: JSON, CSV and the console preview
//!
//! Every format shares the same five fields per post: `tweet_id` (string),
//! `text`, `date` (RFC 3339 with a `+00:00` offset), `time`
//! (`YYYY-MM-DD HH:MM:SS UTC`) and `user_identifier` (the account reference
//! the caller supplied, string or number).

use std::path::Path;

use chrono::SecondsFormat;
use serde::Serialize;

use crate::error::ExportError;
use crate::types::{AccountRef, Post, TaggedPost};

/// Posts shown in the console preview
pub const PREVIEW_LIMIT: usize = 10;

/// Characters of post text shown per preview line
pub const PREVIEW_TEXT_CHARS: usize = 80;

const CSV_HEADER: &str = "tweet_id,text,date,time,user_identifier";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    pub tweet_id: String,
    pub text: String,
    pub date: String,
    pub time: String,
    pub user_identifier: AccountRef,
}

impl ExportRecord {
    pub fn new(post: &Post, origin: &AccountRef) -> Self {
        Self {
            tweet_id: post.id.to_string(),
            text: post.text.clone(),
            date: post.created_at.to_rfc3339_opts(SecondsFormat::Secs, false),
            time: post.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            user_identifier: origin.clone(),
        }
    }
}

/// Records for posts fetched from a single account
pub fn records_for_account(posts: &[Post], origin: &AccountRef) -> Vec<ExportRecord> {
    posts.iter().map(|post| ExportRecord::new(post, origin)).collect()
}

/// Records for a multi-account batch, each tagged with its own origin
pub fn records_from_tagged(posts: &[TaggedPost]) -> Vec<ExportRecord> {
    posts
        .iter()
        .map(|tagged| ExportRecord::new(&tagged.post, &tagged.origin))
        .collect()
}

/// Pretty-printed JSON array. Non-ASCII text is kept as-is.
pub fn to_json(records: &[ExportRecord]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// CSV with a header row
pub fn to_csv(records: &[ExportRecord]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + records.len() * 96);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for record in records {
        let identifier = record.user_identifier.to_string();
        let fields = [
            record.tweet_id.as_str(),
            record.text.as_str(),
            record.date.as_str(),
            record.time.as_str(),
            identifier.as_str(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn write_json(path: &Path, records: &[ExportRecord]) -> Result<(), ExportError> {
    let json = to_json(records)?;
    write_file(path, &json)?;
    tracing::info!("Saved {} tweets to {}", records.len(), path.display());
    Ok(())
}

pub fn write_csv(path: &Path, records: &[ExportRecord]) -> Result<(), ExportError> {
    write_file(path, &to_csv(records))?;
    tracing::info!("Saved {} tweets to {}", records.len(), path.display());
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
    }
    std::fs::write(path, content).map_err(io_error)
}

/// Human-readable summary of the first [`PREVIEW_LIMIT`] records.
///
/// `show_origin` adds the account each post came from, for batch output.
pub fn render_preview(records: &[ExportRecord], show_origin: bool) -> String {
    let mut out = String::new();
    if records.is_empty() {
        out.push_str("No tweets found.\n");
        return out;
    }

    for (index, record) in records.iter().take(PREVIEW_LIMIT).enumerate() {
        let origin = if show_origin {
            format!("{} | ", record.user_identifier.label())
        } else {
            String::new()
        };
        out.push_str(&format!(
            "{}. [{}] {}ID: {} | {}\n",
            index + 1,
            record.time,
            origin,
            record.tweet_id,
            truncate(&record.text, PREVIEW_TEXT_CHARS)
        ));
    }

    if records.len() > PREVIEW_LIMIT {
        out.push_str(&format!(
            "... and {} more tweets\n",
            records.len() - PREVIEW_LIMIT
        ));
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut)
}
