//! Meta page (page 0).

use super::slotted::{read_page_id, read_u32, write_page_id, write_u32};
use crate::common::{Error, PageId, Result};
use crate::index::key::KeyType;
use crate::storage::page::{Page, PageHeader, PageType};

/// Tree-wide bookkeeping stored in page 0.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       5     PageHeader (type = Meta)
/// 5       4     root_page
/// 9       4     internal_node_count
/// 13      4     leaf_node_count
/// 17      4     tree_height
/// 21      1     key_type
/// ```
///
/// A height of 0 means the root is a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaPage {
    pub root_page: PageId,
    pub internal_node_count: u32,
    pub leaf_node_count: u32,
    pub tree_height: u32,
    pub key_type: KeyType,
}

impl MetaPage {
    const OFFSET_ROOT: usize = PageHeader::SIZE;
    const OFFSET_INTERNAL_COUNT: usize = PageHeader::SIZE + 4;
    const OFFSET_LEAF_COUNT: usize = PageHeader::SIZE + 8;
    const OFFSET_HEIGHT: usize = PageHeader::SIZE + 12;
    const OFFSET_KEY_TYPE: usize = PageHeader::SIZE + 16;

    /// Meta for a fresh tree: a single empty leaf at page 1.
    pub fn new(key_type: KeyType) -> Self {
        Self {
            root_page: PageId::FIRST_LEAF,
            internal_node_count: 0,
            leaf_node_count: 1,
            tree_height: 0,
            key_type,
        }
    }

    /// Decode the meta page.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` if the page is not a meta page or carries
    /// an unknown key type.
    pub fn from_page(page: &Page) -> Result<Self> {
        if page.page_type() != PageType::Meta {
            return Err(Error::Corrupted {
                page: PageId::META.0,
                reason: format!("expected meta page, found {:?}", page.page_type()),
            });
        }

        let data = page.as_slice();
        let key_type = KeyType::from_u8(data[Self::OFFSET_KEY_TYPE]).ok_or_else(|| {
            Error::Corrupted {
                page: PageId::META.0,
                reason: format!("unknown key type {}", data[Self::OFFSET_KEY_TYPE]),
            }
        })?;

        Ok(Self {
            root_page: read_page_id(data, Self::OFFSET_ROOT),
            internal_node_count: read_u32(data, Self::OFFSET_INTERNAL_COUNT),
            leaf_node_count: read_u32(data, Self::OFFSET_LEAF_COUNT),
            tree_height: read_u32(data, Self::OFFSET_HEIGHT),
            key_type,
        })
    }

    /// Encode into `page`, replacing its contents.
    pub fn write_to(&self, page: &mut Page) {
        page.reset();
        page.set_header(&PageHeader::new(PageType::Meta));

        let data = page.as_mut_slice();
        write_page_id(data, Self::OFFSET_ROOT, self.root_page);
        write_u32(data, Self::OFFSET_INTERNAL_COUNT, self.internal_node_count);
        write_u32(data, Self::OFFSET_LEAF_COUNT, self.leaf_node_count);
        write_u32(data, Self::OFFSET_HEIGHT, self.tree_height);
        data[Self::OFFSET_KEY_TYPE] = self.key_type as u8;
    }
}
