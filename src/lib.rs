//! ixdb - A disk-backed B+Tree index mapping typed keys to record IDs.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                              ixdb                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Manager (index/manager)               │   │
//! │  │   create / destroy / open / close, insert, delete, scan  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                B+Tree (index/btree)                      │   │
//! │  │   meta page · internal nodes · leaf chain · splits       │   │
//! │  │   slotted-page allocator shared by both node kinds       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │     PagedFile + Page + PageHeader (CRC32) + IoStats      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Rid, Error, config)
//! - [`storage`] - Page I/O and page headers
//! - [`index`] - Keys, the B+Tree and the index manager
//!
//! # Quick Start
//! ```no_run
//! use ixdb::{IndexConfig, IndexManager, Key, KeyType, Rid};
//!
//! let manager = IndexManager::new(IndexConfig::default());
//! manager.create_file("name.idx")?;
//! let mut handle = manager.open_file("name.idx")?;
//!
//! manager.insert_entry(&mut handle, KeyType::VarChar, &Key::varchar("ada"), Rid::new(3, 1))?;
//! manager.insert_entry(&mut handle, KeyType::VarChar, &Key::varchar("bob"), Rid::new(3, 2))?;
//!
//! for item in manager.scan(&mut handle, KeyType::VarChar, None, None, true, true)? {
//!     let (key, rid) = item?;
//!     println!("{} -> {}", key, rid);
//! }
//! manager.close_file(handle)?;
//! # Ok::<(), ixdb::Error>(())
//! ```

pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, ErrorKind, IndexConfig, PageId, Result, Rid};

pub use index::{IndexHandle, IndexManager, Key, KeyType, MetaPage, ScanIterator};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::{PagedFile, StatsSnapshot};
