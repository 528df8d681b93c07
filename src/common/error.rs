//! Error types for ixdb.

use std::path::PathBuf;

use thiserror::Error;

use crate::common::Rid;
use crate::index::KeyType;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// How a caller should treat a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operation could not apply (duplicate RID, missing entry, an entry
    /// too large for a page). The tree is unchanged and still valid.
    NotApplied,
    /// A precondition was rejected before any page was touched.
    Precondition,
    /// The page file failed or returned garbage. The tree may have been left
    /// partially updated.
    Storage,
}

/// All possible errors in ixdb.
///
/// Every public operation returns one of these on failure. Use
/// [`Error::kind`] to tell "did not apply" apart from "storage failure".
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error outside page reads/writes (create, open, sync, remove).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The named index file does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The named index file already exists.
    #[error("file already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// Another live handle already holds this file.
    #[error("file already open: {}", .0.display())]
    AlreadyOpen(PathBuf),

    /// Requested page does not exist in the file.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Reading a page from the file failed.
    #[error("failed to read page {page}: {source}")]
    ReadFailed {
        page: u32,
        #[source]
        source: std::io::Error,
    },

    /// Writing a page to the file failed.
    #[error("failed to write page {page}: {source}")]
    WriteFailed {
        page: u32,
        #[source]
        source: std::io::Error,
    },

    /// Appending a page to the file failed.
    #[error("failed to append page: {0}")]
    AppendFailed(#[source] std::io::Error),

    /// A page failed its checksum or carries an unexpected layout.
    #[error("corrupted page {page}: {reason}")]
    Corrupted { page: u32, reason: String },

    /// The key type presented does not match the index's key type.
    #[error("key type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: KeyType, found: KeyType },

    /// Encoded key exceeds [`MAX_KEY_SIZE`](crate::common::config::MAX_KEY_SIZE).
    #[error("key too large: {size} bytes (max: {max})")]
    KeyTooLarge { size: usize, max: usize },

    /// Key bytes do not decode as the given key type.
    #[error("invalid {key_type} key: {reason}")]
    InvalidKey {
        key_type: KeyType,
        reason: &'static str,
    },

    /// The RID is already indexed under this key.
    #[error("duplicate RID {rid}")]
    DuplicateRid { rid: Rid },

    /// The key, or the RID under the key, is not in the index.
    #[error("entry not found")]
    NotFound,

    /// A single entry outgrew a whole page and splitting cannot make room.
    /// Nothing was written; after a split it arrives inside `SplitFailed`.
    #[error("entry does not fit in page {page} even after splitting")]
    EntryTooLarge { page: u32 },

    /// A slotted page was asked to hold more than its free space.
    #[error("node overflow: need {needed} bytes, {available} available")]
    NodeOverflow { needed: usize, available: usize },

    /// A failure after a node split began. The tree may hold a stale
    /// parent pointer or separator.
    #[error("split of page {page} failed: {source}")]
    SplitFailed {
        page: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DuplicateRid { .. } | Error::NotFound | Error::EntryTooLarge { .. } => {
                ErrorKind::NotApplied
            }
            Error::FileNotFound(_)
            | Error::FileExists(_)
            | Error::AlreadyOpen(_)
            | Error::TypeMismatch { .. }
            | Error::KeyTooLarge { .. }
            | Error::InvalidKey { .. } => ErrorKind::Precondition,
            Error::Io(_)
            | Error::PageNotFound(_)
            | Error::ReadFailed { .. }
            | Error::WriteFailed { .. }
            | Error::AppendFailed(_)
            | Error::Corrupted { .. }
            | Error::NodeOverflow { .. }
            | Error::SplitFailed { .. } => ErrorKind::Storage,
        }
    }

    /// True if the tree may have been left inconsistent by this failure.
    pub fn is_storage_failure(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }

    /// Wrap a failure raised mid-split. Nested splits keep the innermost
    /// wrapper.
    pub(crate) fn split_failed(page: u32, source: Error) -> Self {
        match source {
            Error::SplitFailed { .. } => source,
            other => Error::SplitFailed {
                page,
                source: Box::new(other),
            },
        }
    }
}
