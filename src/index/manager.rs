//! Index Manager - the public entry point for index files.
//!
//! The [`IndexManager`] provides:
//! - File lifecycle (create, destroy, open, close)
//! - Entry insertion and deletion
//! - Range scans
//! - Diagnostic tree dumps
//!
//! Each open file is represented by an [`IndexHandle`]. A file may be open
//! through at most one live handle at a time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{Error, IndexConfig, Result, Rid};
use crate::index::btree::{self, BPlusTree, MetaPage, ScanIterator};
use crate::index::key::{Key, KeyType};
use crate::storage::{PagedFile, StatsSnapshot};

/// Canonical paths of the files that currently have a live handle.
type Registry = Arc<Mutex<HashSet<PathBuf>>>;

/// Creates, opens and operates on index files.
///
/// `IndexManager` is a plain value: there is no process-wide instance.
/// Clones share the registry of open files.
///
/// # Usage
/// ```no_run
/// use ixdb::{IndexConfig, IndexManager, Key, KeyType, Rid};
///
/// let manager = IndexManager::new(IndexConfig::default());
/// manager.create_file("age.idx")?;
///
/// let mut handle = manager.open_file("age.idx")?;
/// manager.insert_entry(&mut handle, KeyType::Int, &Key::Int(42), Rid::new(1, 7))?;
/// manager.print_tree(&mut handle, KeyType::Int)?;
/// manager.close_file(handle)?;
/// # Ok::<(), ixdb::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    config: IndexConfig,
    open_files: Registry,
}

impl IndexManager {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            open_files: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    // ========================================================================
    // File lifecycle
    // ========================================================================

    /// Create an empty index file.
    ///
    /// The file has no pages until the first insertion.
    ///
    /// # Errors
    /// Returns `Error::FileExists` if the path already exists.
    pub fn create_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        PagedFile::create(path)?;
        Ok(())
    }

    /// Delete an index file.
    ///
    /// # Errors
    /// - `Error::FileNotFound` if the file does not exist
    /// - `Error::AlreadyOpen` if a handle on the file is still live
    pub fn destroy_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let canonical = canonicalize(path)?;
        if self.open_files.lock().contains(&canonical) {
            return Err(Error::AlreadyOpen(path.to_path_buf()));
        }
        PagedFile::destroy(&canonical)
    }

    /// Open an index file.
    ///
    /// # Errors
    /// - `Error::FileNotFound` if the file does not exist
    /// - `Error::AlreadyOpen` if another handle on the file is still live
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> Result<IndexHandle> {
        let path = path.as_ref();
        let canonical = canonicalize(path)?;

        let mut open_files = self.open_files.lock();
        if open_files.contains(&canonical) {
            return Err(Error::AlreadyOpen(path.to_path_buf()));
        }

        let mut file = PagedFile::open(&canonical)?;
        file.set_sync_on_write(self.config.sync_on_write);
        open_files.insert(canonical.clone());

        Ok(IndexHandle {
            file,
            canonical,
            open_files: Arc::clone(&self.open_files),
        })
    }

    /// Flush a handle's file to disk and release it.
    ///
    /// Dropping the handle releases it too, without the flush.
    pub fn close_file(&self, mut handle: IndexHandle) -> Result<()> {
        handle.file.sync()?;
        debug!(path = %handle.path().display(), "closed index file");
        Ok(())
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Add `rid` under `key`.
    ///
    /// The first insertion into an empty file fixes its key type.
    ///
    /// # Errors
    /// - `Error::TypeMismatch` if `key` or the file is not of `key_type`
    /// - `Error::KeyTooLarge` if the encoded key exceeds `MAX_KEY_SIZE`
    /// - `Error::DuplicateRid` if `key` already lists `rid`
    /// - `Error::EntryTooLarge` / `Error::SplitFailed` if the entry cannot be
    ///   placed; see [`Error::is_storage_failure`]
    pub fn insert_entry(
        &self,
        handle: &mut IndexHandle,
        key_type: KeyType,
        key: &Key,
        rid: Rid,
    ) -> Result<()> {
        let key = key.encode_checked(key_type)?;
        BPlusTree::new(&mut handle.file, key_type).insert(&key, rid)
    }

    /// Remove `rid` from `key`.
    ///
    /// # Errors
    /// - `Error::TypeMismatch` if `key` or the file is not of `key_type`
    /// - `Error::NotFound` if the pair is not in the index
    pub fn delete_entry(
        &self,
        handle: &mut IndexHandle,
        key_type: KeyType,
        key: &Key,
        rid: Rid,
    ) -> Result<()> {
        let key = key.encode_checked(key_type)?;
        BPlusTree::new(&mut handle.file, key_type).delete(&key, rid)
    }

    /// Scan entries between `low` and `high` in key order.
    ///
    /// A `None` bound is unbounded on that side. The iterator borrows the
    /// handle until it is dropped.
    ///
    /// # Errors
    /// Returns `Error::TypeMismatch` if a bound or the file is not of
    /// `key_type`.
    pub fn scan<'a>(
        &self,
        handle: &'a mut IndexHandle,
        key_type: KeyType,
        low: Option<&Key>,
        high: Option<&Key>,
        low_inclusive: bool,
        high_inclusive: bool,
    ) -> Result<ScanIterator<'a>> {
        ScanIterator::new(
            &mut handle.file,
            key_type,
            low,
            high,
            low_inclusive,
            high_inclusive,
        )
    }

    /// Render the tree as JSON-shaped text. Diagnostic only.
    pub fn dump_tree(&self, handle: &mut IndexHandle, key_type: KeyType) -> Result<String> {
        BPlusTree::new(&mut handle.file, key_type).dump()
    }

    /// Print [`dump_tree`](IndexManager::dump_tree) to stdout.
    pub fn print_tree(&self, handle: &mut IndexHandle, key_type: KeyType) -> Result<()> {
        print!("{}", self.dump_tree(handle, key_type)?);
        Ok(())
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .map_err(|_| Error::FileNotFound(path.to_path_buf()))
}

/// An open index file.
///
/// The file is released from its manager's registry when the handle is
/// dropped or passed to [`IndexManager::close_file`].
pub struct IndexHandle {
    file: PagedFile,
    canonical: PathBuf,
    open_files: Registry,
}

impl IndexHandle {
    /// Page I/O counters since the file was opened.
    pub fn io_stats(&self) -> StatsSnapshot {
        self.file.stats()
    }

    pub fn page_count(&self) -> u32 {
        self.file.page_count()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// The file's meta page, or `None` before the first insertion.
    pub fn meta(&mut self) -> Result<Option<MetaPage>> {
        btree::read_meta(&mut self.file)
    }
}

impl Drop for IndexHandle {
    fn drop(&mut self) {
        self.open_files.lock().remove(&self.canonical);
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("path", &self.canonical)
            .field("page_count", &self.file.page_count())
            .finish()
    }
}
