//! xharvest - time-windowed post collection from x.com timelines
//!
//! This library walks an account's reverse-chronological timeline through a
//! cookie-authenticated web session, keeps the posts that fall inside a time
//! window, and exports them as JSON or CSV.

pub mod config;
pub mod cookies;
pub mod error;
pub mod export;
pub mod harvester;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod resolve;
pub mod retry;
pub mod session;
pub mod types;
pub mod window;

// Re-export commonly used types
pub use config::Config;
pub use error::{HarvestError, Result};
pub use harvester::Harvester;
pub use orchestrator::{BatchReport, MultiAccountFetcher};
pub use pipeline::{FetchPipeline, FetchRequest};
pub use retry::RetryPolicy;
pub use session::{ProviderFactory, SessionManager, SessionProvider};
pub use types::{AccountRef, Post, TaggedPost};
pub use window::{FilterSignal, TimeWindow};
