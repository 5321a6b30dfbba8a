// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod geo;
mod listing;
mod notification;
mod query;

// Re-export all public types
pub use config::{
    ApiConfig, Config, DedupConfig, LoggingConfig, SchedulerConfig, StorageConfig,
    TransportConfig,
};
pub use geo::{GeoPoint, GeoTable};
pub use listing::{Listing, RemoteListing, Snapshot};
pub use notification::Notification;
pub use query::{ChatRef, ParsedQuery, SearchSpec};
