//! Disk-backed B+Tree over a [`PagedFile`].
//!
//! # File Layout
//! ```text
//! page 0        meta page (root, node counts, height, key type)
//! page 1        leftmost leaf, the initial root
//! page 2..      leaves and internal nodes in allocation order
//! ```
//!
//! Leaves form a doubly linked list through their sibling pointers. Splits
//! always move the right half to a newly appended page, so page 1 stays the
//! leftmost leaf for the life of the file.
//!
//! # Invariants
//! - Keys within a node are strictly increasing.
//! - For an internal separator `s`, keys in its left subtree are `≤ s` and
//!   keys in its right subtree are `> s`.
//! - Every non-root node's `parent` names the internal node pointing at it.
//!
//! Every page written here has its checksum stamped; every page read has it
//! verified.

mod delete;
mod insert;
mod internal_page;
mod leaf_page;
mod meta_page;
mod printer;
mod scan;
mod slotted;

pub use meta_page::MetaPage;
pub use scan::ScanIterator;

use tracing::{debug, warn};

use crate::common::{Error, PageId, Result};
use crate::index::key::KeyType;
use crate::storage::page::{Page, PageType};
use crate::storage::PagedFile;

use internal_page::InternalPage;
use leaf_page::LeafPage;

/// A B+Tree borrowed over an open index file for the length of one
/// operation.
pub(crate) struct BPlusTree<'a> {
    file: &'a mut PagedFile,
    key_type: KeyType,
}

impl<'a> BPlusTree<'a> {
    pub fn new(file: &'a mut PagedFile, key_type: KeyType) -> Self {
        Self { file, key_type }
    }

    /// Read the meta page, or `None` for a file with no tree yet.
    ///
    /// # Errors
    /// Returns `Error::TypeMismatch` if the tree was built for another key
    /// type.
    fn load_meta(&mut self) -> Result<Option<MetaPage>> {
        let Some(meta) = read_meta(self.file)? else {
            return Ok(None);
        };
        if meta.key_type != self.key_type {
            return Err(Error::TypeMismatch {
                expected: meta.key_type,
                found: self.key_type,
            });
        }
        Ok(Some(meta))
    }

    /// Lay down the meta page and an empty root leaf in an empty file.
    fn initialize(&mut self) -> Result<MetaPage> {
        let meta = MetaPage::new(self.key_type);
        let mut page = Page::new();
        meta.write_to(&mut page);
        self.append_page(&mut page)?;

        let mut leaf = Page::new();
        LeafPage::new(&mut leaf).init(PageId::INVALID, PageId::INVALID, PageId::INVALID);
        let leaf_id = self.append_page(&mut leaf)?;

        if leaf_id != PageId::FIRST_LEAF {
            return Err(Error::Corrupted {
                page: leaf_id.0,
                reason: "first leaf landed on the wrong page".to_string(),
            });
        }

        debug!(path = %self.file.path().display(), key_type = %self.key_type, "initialized tree");
        Ok(meta)
    }

    fn write_meta(&mut self, meta: &MetaPage) -> Result<()> {
        let mut page = Page::new();
        meta.write_to(&mut page);
        self.write_page(PageId::META, &mut page)
    }

    /// Read a page and check its checksum and type.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` on a checksum failure or if the page is
    /// not of type `expected`.
    fn read_page(&mut self, page_id: PageId, expected: PageType) -> Result<Page> {
        let page = self.read_any(page_id)?;
        if page.page_type() != expected {
            return Err(Error::Corrupted {
                page: page_id.0,
                reason: format!("expected {:?}, found {:?}", expected, page.page_type()),
            });
        }
        Ok(page)
    }

    /// Read a page of any type, checking only its checksum.
    fn read_any(&mut self, page_id: PageId) -> Result<Page> {
        read_checked(self.file, page_id)
    }

    /// Read a leaf or internal node.
    fn read_node(&mut self, page_id: PageId) -> Result<Page> {
        let page = self.read_any(page_id)?;
        if !page.page_type().is_node() {
            return Err(Error::Corrupted {
                page: page_id.0,
                reason: format!("expected a tree node, found {:?}", page.page_type()),
            });
        }
        Ok(page)
    }

    fn write_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        page.update_checksum();
        self.file.write_page(page_id, page)
    }

    fn append_page(&mut self, page: &mut Page) -> Result<PageId> {
        page.update_checksum();
        self.file.append_page(page)
    }

    /// Descend from the root to the leaf responsible for `key`.
    fn find_leaf(&mut self, meta: &MetaPage, key: &[u8]) -> Result<PageId> {
        let mut page_id = meta.root_page;
        for _ in 0..meta.tree_height {
            let page = self.read_page(page_id, PageType::BTreeInternal)?;
            let child = InternalPage::new(&page).child_for(self.key_type, key);
            if !child.is_valid() {
                return Err(Error::Corrupted {
                    page: page_id.0,
                    reason: "internal node has no children".to_string(),
                });
            }
            page_id = child;
        }
        Ok(page_id)
    }

    /// Parent pointer of a leaf or internal node. Both kinds keep it in the
    /// shared node header.
    fn parent_of(&mut self, node: PageId) -> Result<PageId> {
        let page = self.read_node(node)?;
        Ok(slotted::read_page_id(page.as_slice(), slotted::OFFSET_PARENT))
    }

    /// Rewrite the parent pointer of a leaf or internal node.
    fn set_parent(&mut self, child: PageId, parent: PageId) -> Result<()> {
        let mut page = self.read_node(child)?;
        slotted::write_page_id(page.as_mut_slice(), slotted::OFFSET_PARENT, parent);
        self.write_page(child, &mut page)
    }
}

/// Read the meta page of `file` without checking its key type.
///
/// Returns `None` for a file with no tree yet.
pub(crate) fn read_meta(file: &mut PagedFile) -> Result<Option<MetaPage>> {
    if file.page_count() == 0 {
        return Ok(None);
    }
    let page = read_checked(file, PageId::META)?;
    MetaPage::from_page(&page).map(Some)
}

fn read_checked(file: &mut PagedFile, page_id: PageId) -> Result<Page> {
    let page = file.read_page(page_id)?;
    if !page.verify_checksum() {
        warn!(page = page_id.0, "checksum mismatch");
        return Err(Error::Corrupted {
            page: page_id.0,
            reason: "checksum mismatch".to_string(),
        });
    }
    Ok(page)
}
