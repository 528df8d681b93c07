//! Configuration constants and runtime options for ixdb.

/// Size of a page in bytes (4KB).
///
/// Every index file is a sequence of pages of exactly this size. Slot and
/// key offsets inside a page are stored as `u16`, so this must stay below
/// 64KB.
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId.
pub const MAX_PAGES: u64 = (u32::MAX as u64) + 1;

/// Largest encoded key accepted by the index, in bytes.
///
/// Keeps at least four separator entries per internal page and two entries
/// per leaf, so a split always leaves both halves non-empty.
pub const MAX_KEY_SIZE: usize = 1000;

/// Size of an encoded record identifier (page number + slot number).
pub const RID_SIZE: usize = 8;

/// Runtime options for an [`IndexManager`](crate::IndexManager).
///
/// # Example
/// ```
/// use ixdb::IndexConfig;
///
/// let config = IndexConfig { sync_on_write: false };
/// assert!(!config.sync_on_write);
/// assert!(IndexConfig::default().sync_on_write);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Call `fsync()` after every page write and append.
    ///
    /// Turning this off trades durability for speed; the file is still
    /// synced when a handle is closed.
    pub sync_on_write: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
        }
    }
}
