// src/lib.rs

//! Listing watcher library
//!
//! Keeps a set of saved marketplace searches, polls them in rotation and
//! emits a notification for every new listing or price drop.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

pub use error::{AppError, Result};
pub use pipeline::Scheduler;
