//! # ACM Common Library
//!
//! Shared code for the acoustic measurement service:
//! - Error and result types
//! - TOML configuration loading and path resolution
//! - Task lifecycle events (`TaskEvent`) and the `EventBus`
//! - Server-Sent Events helpers
//! - Human-readable duration formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod sse;

pub use error::{Error, Result};
