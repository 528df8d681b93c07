//! B+Tree index over typed keys.
//!
//! # Modules
//! - [`key`] - Key types, encoding and ordering
//! - `btree` - On-disk node formats, insertion, deletion and scans
//! - `manager` - [`IndexManager`] and [`IndexHandle`]

mod btree;
pub mod key;
mod manager;

pub use btree::{MetaPage, ScanIterator};
pub use key::{Key, KeyType};
pub use manager::{IndexHandle, IndexManager};
