//! Time window filtering for reverse-chronological feeds
//!
//! Feeds arrive newest first, so a post older than the window start means
//! every later post is older too. [`TimeWindow::classify`] therefore returns
//! a three-way [`FilterSignal`] instead of a boolean: callers must stop
//! paginating on [`FilterSignal::Stop`] but keep going on
//! [`FilterSignal::Skip`].

use chrono::{DateTime, Utc};

use crate::error::{HarvestError, Result};
use crate::types::{parse_date, parse_timestamp};

/// Outcome of checking one post timestamp against a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSignal {
    /// Older than the window start; nothing further down the feed can match
    Stop,
    /// Newer than the window end; keep paginating without emitting
    Skip,
    /// Inside the window
    Emit,
}

/// Inclusive time bounds for a fetch. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Build a window, rejecting a start that falls after the end
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(HarvestError::InvalidInput(format!(
                    "Window start {} is after window end {}",
                    s.format("%Y-%m-%dT%H:%M:%SZ"),
                    e.format("%Y-%m-%dT%H:%M:%SZ")
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// A window with no bounds at all
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build a window from optional `YYYY-MM-DDTHH:MM:SSZ` strings
    pub fn from_timestamps(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start.map(parse_timestamp).transpose()?;
        let end = end.map(parse_timestamp).transpose()?;
        Self::new(start, end)
    }

    /// Build a window covering whole calendar days.
    ///
    /// `start_date` maps to `<date>T00:00:00Z` and `end_date` to
    /// `<date>T23:59:59Z`, both inclusive.
    pub fn from_date_range(start_date: &str, end_date: &str) -> Result<Self> {
        parse_date(start_date)?;
        parse_date(end_date)?;

        let start = format!("{}T00:00:00Z", start_date);
        let end = format!("{}T23:59:59Z", end_date);
        Self::from_timestamps(Some(&start), Some(&end))
    }

    /// Stop below `start`, skip above `end`, emit in between
    pub fn classify(&self, ts: DateTime<Utc>) -> FilterSignal {
        if let Some(start) = self.start {
            if ts < start {
                return FilterSignal::Stop;
            }
        }
        if let Some(end) = self.end {
            if ts > end {
                return FilterSignal::Skip;
            }
        }
        FilterSignal::Emit
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_bound = |b: Option<DateTime<Utc>>| {
            b.map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                .unwrap_or_else(|| "*".to_string())
        };
        write!(f, "[{} .. {}]", fmt_bound(self.start), fmt_bound(self.end))
    }
}
