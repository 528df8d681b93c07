//! Leaf node page.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       5     PageHeader (type = BTreeLeaf)
//! 5       2     entry_count
//! 7       2     free_space boundary
//! 9       4     parent_page
//! 13      4     left_sibling_page
//! 17      4     right_sibling_page
//! 21      8*n   slots { key_offset u16, key_length u16, rid_count u16,
//!                       tombstone u8, reserved u8 }
//! ...           free space
//! ...           per slot: key bytes followed by rid_count RIDs (8 bytes each)
//! ```

use std::cmp::Ordering;

use super::slotted::{
    read_page_id, read_u16, write_page_id, write_u16, SlotLayout, SlottedPage, NODE_HEADER_SIZE,
};
use crate::common::config::RID_SIZE;
use crate::common::{PageId, Result, Rid};
use crate::index::key::{self, KeyType};
use crate::storage::page::{PageHeader, PageType};

const OFFSET_LEFT_SIBLING: usize = NODE_HEADER_SIZE;
const OFFSET_RIGHT_SIBLING: usize = NODE_HEADER_SIZE + 4;

const SLOT_KEY_LENGTH: usize = 2;
const SLOT_RID_COUNT: usize = 4;
const SLOT_TOMBSTONE: usize = 6;

pub(crate) struct LeafLayout;

impl SlotLayout for LeafLayout {
    const HEADER_SIZE: usize = NODE_HEADER_SIZE + 8;
    const SLOT_SIZE: usize = 8;

    fn data_len(slot: &[u8]) -> usize {
        read_u16(slot, SLOT_KEY_LENGTH) as usize + read_u16(slot, SLOT_RID_COUNT) as usize * RID_SIZE
    }
}

/// Typed view of a leaf node.
pub(crate) struct LeafPage<B> {
    inner: SlottedPage<B, LeafLayout>,
}

impl<B: AsRef<[u8]>> LeafPage<B> {
    pub fn new(buf: B) -> Self {
        Self {
            inner: SlottedPage::new(buf),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.inner.entry_count()
    }

    pub fn free_space(&self) -> usize {
        self.inner.free_space()
    }

    pub fn parent(&self) -> PageId {
        self.inner.parent()
    }

    #[cfg(test)]
    pub fn left_sibling(&self) -> PageId {
        read_page_id(self.inner.bytes(), OFFSET_LEFT_SIBLING)
    }

    pub fn right_sibling(&self) -> PageId {
        read_page_id(self.inner.bytes(), OFFSET_RIGHT_SIBLING)
    }

    fn key_len(&self, index: usize) -> usize {
        read_u16(self.inner.slot(index), SLOT_KEY_LENGTH) as usize
    }

    pub fn key(&self, index: usize) -> &[u8] {
        &self.inner.data(index)[..self.key_len(index)]
    }

    pub fn rid_count(&self, index: usize) -> usize {
        read_u16(self.inner.slot(index), SLOT_RID_COUNT) as usize
    }

    pub fn rid(&self, index: usize, n: usize) -> Rid {
        let at = self.key_len(index) + n * RID_SIZE;
        Rid::from_bytes(&self.inner.data(index)[at..at + RID_SIZE])
    }

    pub fn rids(&self, index: usize) -> impl Iterator<Item = Rid> + '_ {
        (0..self.rid_count(index)).map(move |n| self.rid(index, n))
    }

    pub fn rid_position(&self, index: usize, rid: Rid) -> Option<usize> {
        self.rids(index).position(|r| r == rid)
    }

    pub fn is_tombstone(&self, index: usize) -> bool {
        self.inner.slot(index)[SLOT_TOMBSTONE] != 0
    }

    /// Linear search: `Ok(i)` if entry `i` holds `key`, otherwise `Err(i)`
    /// with the first position whose key is greater.
    pub fn find(&self, key_type: KeyType, key: &[u8]) -> std::result::Result<usize, usize> {
        let count = self.entry_count();
        for i in 0..count {
            match key::compare(key_type, self.key(i), key) {
                Ordering::Less => continue,
                Ordering::Equal => return Ok(i),
                Ordering::Greater => return Err(i),
            }
        }
        Err(count)
    }

    /// True if a new entry with a `key_len`-byte key and one RID fits.
    pub fn fits_new_entry(&self, key_len: usize) -> bool {
        self.inner.can_fit(key_len + RID_SIZE)
    }

    /// True if one more RID fits under an existing entry.
    pub fn fits_rid(&self) -> bool {
        self.free_space() >= RID_SIZE
    }

    /// True if `key` can take one more RID here without a split.
    ///
    /// A tombstoned entry is revived with an empty RID list, so the space
    /// its old RIDs hold counts as free.
    pub fn can_accept(&self, key_type: KeyType, key: &[u8]) -> bool {
        match self.find(key_type, key) {
            Ok(i) if self.is_tombstone(i) => {
                self.free_space() + self.rid_count(i) * RID_SIZE >= RID_SIZE
            }
            Ok(_) => self.fits_rid(),
            Err(_) => self.fits_new_entry(key.len()),
        }
    }

    /// True if the live entry for `key` already lists `rid`.
    pub fn contains(&self, key_type: KeyType, key: &[u8], rid: Rid) -> bool {
        match self.find(key_type, key) {
            Ok(i) => !self.is_tombstone(i) && self.rid_position(i, rid).is_some(),
            Err(_) => false,
        }
    }

    pub fn raw_entry(&self, index: usize) -> (&[u8], &[u8]) {
        self.inner.raw_entry(index)
    }

    #[cfg(test)]
    pub fn layout_is_consistent(&self) -> bool {
        self.inner.layout_is_consistent()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LeafPage<B> {
    /// Format the buffer as an empty leaf.
    pub fn init(&mut self, parent: PageId, left: PageId, right: PageId) {
        PageHeader::new(PageType::BTreeLeaf).write_to(self.inner.bytes_mut());
        self.inner.init(parent);
        self.set_left_sibling(left);
        self.set_right_sibling(right);
    }

    pub fn set_left_sibling(&mut self, page_id: PageId) {
        write_page_id(self.inner.bytes_mut(), OFFSET_LEFT_SIBLING, page_id);
    }

    pub fn set_right_sibling(&mut self, page_id: PageId) {
        write_page_id(self.inner.bytes_mut(), OFFSET_RIGHT_SIBLING, page_id);
    }

    pub fn set_tombstone(&mut self, index: usize, tombstone: bool) {
        self.inner.slot_mut(index)[SLOT_TOMBSTONE] = tombstone as u8;
    }

    fn set_rid_count(&mut self, index: usize, count: usize) {
        write_u16(self.inner.slot_mut(index), SLOT_RID_COUNT, count as u16);
    }

    /// Insert a new entry holding a single RID at `index`.
    pub fn insert_entry(&mut self, index: usize, key: &[u8], rid: Rid) -> Result<()> {
        let mut slot = [0u8; LeafLayout::SLOT_SIZE];
        write_u16(&mut slot, SLOT_KEY_LENGTH, key.len() as u16);
        write_u16(&mut slot, SLOT_RID_COUNT, 1);

        let mut data = Vec::with_capacity(key.len() + RID_SIZE);
        data.extend_from_slice(key);
        data.extend_from_slice(&rid.to_bytes());

        self.inner.insert(index, &slot, &data)
    }

    /// Append `rid` to the end of entry `index`'s RID list.
    pub fn append_rid(&mut self, index: usize, rid: Rid) -> Result<()> {
        let count = self.rid_count(index);
        self.inner.grow(index, &rid.to_bytes())?;
        self.set_rid_count(index, count + 1);
        Ok(())
    }

    /// Remove the `n`th RID of entry `index`, keeping the others in order.
    pub fn remove_rid(&mut self, index: usize, n: usize) {
        let count = self.rid_count(index);
        let at = self.key_len(index) + n * RID_SIZE;
        self.inner.shrink(index, at, RID_SIZE);
        self.set_rid_count(index, count - 1);
    }

    /// Drop every RID of entry `index` and clear its tombstone.
    pub fn clear_rids(&mut self, index: usize) {
        let count = self.rid_count(index);
        let key_len = self.key_len(index);
        self.inner.shrink(index, key_len, count * RID_SIZE);
        self.set_rid_count(index, 0);
        self.set_tombstone(index, false);
    }

    /// Add `rid` under `key`, creating the entry at its sorted position if
    /// needed and reviving it if tombstoned.
    ///
    /// # Errors
    /// Returns `Error::NodeOverflow` if the page is full; check
    /// [`can_accept`](LeafPage::can_accept) first.
    pub fn put(&mut self, key_type: KeyType, key: &[u8], rid: Rid) -> Result<()> {
        match self.find(key_type, key) {
            Ok(i) => {
                if self.is_tombstone(i) {
                    self.clear_rids(i);
                }
                self.append_rid(i, rid)
            }
            Err(i) => self.insert_entry(i, key, rid),
        }
    }

    pub fn remove_entry(&mut self, index: usize) {
        self.inner.remove(index);
    }

    pub fn push_raw(&mut self, slot: &[u8], data: &[u8]) -> Result<()> {
        self.inner.push(slot, data)
    }

    pub fn truncate(&mut self, keep: usize) {
        self.inner.truncate(keep);
    }
}
