//! Service layer for the watcher.
//!
//! This module contains the business logic for:
//! - Query parsing (`parse_query`)
//! - Paginated searching (`SearchClient`, `ApiSource`)
//! - Notification delivery (`Notifier`)

pub mod notify;
pub mod query;
pub mod search;

pub use notify::{ChannelNotifier, LogNotifier, Notifier};
pub use query::parse_query;
pub use search::{ApiSource, ListingSource, MatchSink, NoopSink, SearchClient, SweepStats};
