//! Common types and utilities shared across ixdb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`IndexConfig`]
//! - Error types
//! - Identifiers ([`PageId`], [`Rid`])

pub mod config;
pub mod error;
mod page_id;
mod rid;

pub use config::IndexConfig;
pub use error::{Error, ErrorKind, Result};
pub use page_id::PageId;
pub use rid::Rid;
