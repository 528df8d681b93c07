//! Storage layer - file I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`PagedFile`] - Fixed-size page I/O on one file
//! - [`IoStats`] - Read/write/append counters
//! - [`page`] - Page types and layouts

mod paged_file;
pub mod page;
mod stats;

pub use paged_file::PagedFile;
pub use stats::{IoStats, StatsSnapshot};
