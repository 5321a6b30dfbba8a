//! Utility functions and helpers.

pub mod http;
pub mod log;

pub use http::{FetchedBody, RateLimitedTransport, create_async_client};
