//! Paged file - low-level file I/O for index pages.
//!
//! The [`PagedFile`] handles all direct file operations:
//! - Creating, opening and destroying an index file
//! - Reading and writing pages by number
//! - Appending new pages at the end of the file

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use tracing::debug;

use crate::common::config::{MAX_PAGES, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::stats::{IoStats, StatsSnapshot};

/// Manages page I/O for a single index file.
///
/// # File Layout
/// The index is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (meta)  │ (leaf)  │         │         │         │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`. Pages are never
/// removed; the file only grows.
///
/// # Thread Safety
/// `PagedFile` is **single-threaded**. Every I/O method takes `&mut self`.
///
/// # Durability
/// With `sync_on_write` (the default) every write and append is followed by
/// `fsync()`.
pub struct PagedFile {
    file: File,
    path: PathBuf,
    /// Number of pages in the file.
    page_count: u32,
    sync_on_write: bool,
    stats: IoStats,
}

impl PagedFile {
    /// Create a new, empty index file.
    ///
    /// # Errors
    /// Returns `Error::FileExists` if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::FileExists(path.to_path_buf()),
                _ => Error::Io(e),
            })?;

        debug!(path = %path.display(), "created paged file");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_count: 0,
            sync_on_write: true,
            stats: IoStats::new(),
        })
    }

    /// Open an existing index file.
    ///
    /// # Errors
    /// Returns `Error::FileNotFound` if the file doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
                _ => Error::Io(e),
            })?;

        // Calculate page count from file size
        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        debug!(path = %path.display(), page_count, "opened paged file");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_count,
            sync_on_write: true,
            stats: IoStats::new(),
        })
    }

    /// Remove an index file from disk.
    ///
    /// # Errors
    /// Returns `Error::FileNotFound` if the file doesn't exist.
    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        fs::remove_file(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        debug!(path = %path.display(), "destroyed paged file");
        Ok(())
    }

    /// Enable or disable `fsync()` after every write and append.
    pub fn set_sync_on_write(&mut self, sync_on_write: bool) {
        self.sync_on_write = sync_on_write;
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist
    /// - `Error::ReadFailed` if the underlying read fails
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        let mut page = Page::new();

        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(page.as_mut_slice()))
            .map_err(|source| Error::ReadFailed {
                page: page_id.0,
                source,
            })?;

        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);
        Ok(page)
    }

    /// Overwrite an existing page.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page hasn't been appended yet
    /// - `Error::WriteFailed` if the underlying write fails
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        let sync = self.sync_on_write;

        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(page.as_slice()))
            .and_then(|_| if sync { self.file.sync_all() } else { Ok(()) })
            .map_err(|source| Error::WriteFailed {
                page: page_id.0,
                source,
            })?;

        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Append a page at the end of the file.
    ///
    /// Returns the `PageId` the page landed on.
    ///
    /// # Errors
    /// Returns `Error::AppendFailed` if the file cannot be extended.
    pub fn append_page(&mut self, page: &Page) -> Result<PageId> {
        // The last page number is the INVALID sentinel
        if u64::from(self.page_count) + 1 >= MAX_PAGES {
            return Err(Error::AppendFailed(std::io::Error::other(
                "page number space exhausted",
            )));
        }

        let page_id = PageId::new(self.page_count);
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        let sync = self.sync_on_write;

        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(page.as_slice()))
            .and_then(|_| if sync { self.file.sync_all() } else { Ok(()) })
            .map_err(Error::AppendFailed)?;

        self.page_count += 1;
        self.stats.pages_appended.fetch_add(1, Ordering::Relaxed);
        Ok(page_id)
    }

    /// Flush all file contents to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Path this file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Page I/O counters since the file was opened.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
