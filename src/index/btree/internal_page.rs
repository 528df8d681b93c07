//! Internal node page.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       5     PageHeader (type = BTreeInternal)
//! 5       2     entry_count
//! 7       2     free_space boundary
//! 9       4     parent_page
//! 13      12*n  slots { key_offset u16, key_length u16,
//!                       left_child u32, right_child u32 }
//! ...           free space
//! ...           separator key bytes
//! ```
//!
//! Adjacent slots share a child: `right_child(i) == left_child(i + 1)`.

use std::cmp::Ordering;

use super::slotted::{
    read_page_id, read_u16, write_page_id, write_u16, SlotLayout, SlottedPage, NODE_HEADER_SIZE,
};
use crate::common::{PageId, Result};
use crate::index::key::{self, KeyType};
use crate::storage::page::{PageHeader, PageType};

const SLOT_KEY_LENGTH: usize = 2;
const SLOT_LEFT_CHILD: usize = 4;
const SLOT_RIGHT_CHILD: usize = 8;

pub(crate) struct InternalLayout;

impl SlotLayout for InternalLayout {
    const HEADER_SIZE: usize = NODE_HEADER_SIZE;
    const SLOT_SIZE: usize = 12;

    fn data_len(slot: &[u8]) -> usize {
        read_u16(slot, SLOT_KEY_LENGTH) as usize
    }
}

/// Typed view of an internal node.
pub(crate) struct InternalPage<B> {
    inner: SlottedPage<B, InternalLayout>,
}

impl<B: AsRef<[u8]>> InternalPage<B> {
    pub fn new(buf: B) -> Self {
        Self {
            inner: SlottedPage::new(buf),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.inner.entry_count()
    }

    pub fn parent(&self) -> PageId {
        self.inner.parent()
    }

    pub fn key(&self, index: usize) -> &[u8] {
        self.inner.data(index)
    }

    pub fn left_child(&self, index: usize) -> PageId {
        read_page_id(self.inner.slot(index), SLOT_LEFT_CHILD)
    }

    pub fn right_child(&self, index: usize) -> PageId {
        read_page_id(self.inner.slot(index), SLOT_RIGHT_CHILD)
    }

    /// Child to descend into for `key`: the left child of the first
    /// separator ≥ `key`, else the right child of the last separator.
    ///
    /// Returns `PageId::INVALID` for an empty node.
    pub fn child_for(&self, key_type: KeyType, key: &[u8]) -> PageId {
        let count = self.entry_count();
        for i in 0..count {
            if key::compare(key_type, self.key(i), key) != Ordering::Less {
                return self.left_child(i);
            }
        }
        match count {
            0 => PageId::INVALID,
            n => self.right_child(n - 1),
        }
    }

    /// All children in key order.
    pub fn children(&self) -> Vec<PageId> {
        let count = self.entry_count();
        let mut children = Vec::with_capacity(count + 1);
        if count > 0 {
            children.push(self.left_child(0));
            children.extend((0..count).map(|i| self.right_child(i)));
        }
        children
    }

    /// Slot position for a separator that splits child `left`: the slot
    /// whose left child is `left`, or one past the end if `left` is the
    /// rightmost child. `None` if `left` is not a child of this node.
    pub fn separator_position(&self, left: PageId) -> Option<usize> {
        let count = self.entry_count();
        if let Some(i) = (0..count).find(|&i| self.left_child(i) == left) {
            return Some(i);
        }
        (count > 0 && self.right_child(count - 1) == left).then_some(count)
    }

    /// True if a separator with a `key_len`-byte key fits.
    pub fn can_fit(&self, key_len: usize) -> bool {
        self.inner.can_fit(key_len)
    }

    pub fn raw_entry(&self, index: usize) -> (&[u8], &[u8]) {
        self.inner.raw_entry(index)
    }

    #[cfg(test)]
    pub fn layout_is_consistent(&self) -> bool {
        self.inner.layout_is_consistent()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> InternalPage<B> {
    /// Format the buffer as an empty internal node.
    pub fn init(&mut self, parent: PageId) {
        PageHeader::new(PageType::BTreeInternal).write_to(self.inner.bytes_mut());
        self.inner.init(parent);
    }

    pub fn set_left_child(&mut self, index: usize, child: PageId) {
        write_page_id(self.inner.slot_mut(index), SLOT_LEFT_CHILD, child);
    }

    pub fn insert_entry(&mut self, index: usize, key: &[u8], left: PageId, right: PageId) -> Result<()> {
        let mut slot = [0u8; InternalLayout::SLOT_SIZE];
        write_u16(&mut slot, SLOT_KEY_LENGTH, key.len() as u16);
        write_page_id(&mut slot, SLOT_LEFT_CHILD, left);
        write_page_id(&mut slot, SLOT_RIGHT_CHILD, right);
        self.inner.insert(index, &slot, key)
    }

    /// Insert separator `key` between `left` and its new right neighbour
    /// `right` at `index` (from [`separator_position`]), re-pointing the
    /// following slot's left child.
    ///
    /// [`separator_position`]: InternalPage::separator_position
    pub fn insert_separator(&mut self, index: usize, key: &[u8], left: PageId, right: PageId) -> Result<()> {
        self.insert_entry(index, key, left, right)?;
        if index + 1 < self.entry_count() {
            self.set_left_child(index + 1, right);
        }
        Ok(())
    }

    pub fn push_raw(&mut self, slot: &[u8], data: &[u8]) -> Result<()> {
        self.inner.push(slot, data)
    }

    pub fn truncate(&mut self, keep: usize) {
        self.inner.truncate(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Key;
    use crate::storage::page::Page;

    fn int(v: i32) -> Vec<u8> {
        Key::Int(v).encode()
    }

    fn pid(n: u32) -> PageId {
        PageId::new(n)
    }

    /// Separators 10, 20, 30 over children 1, 2, 3, 4.
    fn sample() -> Page {
        let mut page = Page::new();
        let mut node = InternalPage::new(&mut page);
        node.init(PageId::INVALID);
        node.insert_entry(0, &int(10), pid(1), pid(2)).unwrap();
        node.insert_entry(1, &int(20), pid(2), pid(3)).unwrap();
        node.insert_entry(2, &int(30), pid(3), pid(4)).unwrap();
        page
    }

    #[test]
    fn test_init() {
        let mut page = Page::new();
        InternalPage::new(&mut page).init(pid(7));

        let node = InternalPage::new(&page);
        assert_eq!(page.page_type(), PageType::BTreeInternal);
        assert_eq!(node.entry_count(), 0);
        assert_eq!(node.parent(), pid(7));
        assert!(node.children().is_empty());
        assert_eq!(node.child_for(KeyType::Int, &int(1)), PageId::INVALID);
    }

    #[test]
    fn test_child_for() {
        let page = sample();
        let node = InternalPage::new(&page);

        assert_eq!(node.child_for(KeyType::Int, &int(-100)), pid(1));
        // Equal keys go left
        assert_eq!(node.child_for(KeyType::Int, &int(10)), pid(1));
        assert_eq!(node.child_for(KeyType::Int, &int(11)), pid(2));
        assert_eq!(node.child_for(KeyType::Int, &int(30)), pid(3));
        assert_eq!(node.child_for(KeyType::Int, &int(31)), pid(4));
    }

    #[test]
    fn test_children() {
        let page = sample();
        let node = InternalPage::new(&page);
        assert_eq!(node.children(), vec![pid(1), pid(2), pid(3), pid(4)]);
    }

    #[test]
    fn test_insert_separator_in_the_middle() {
        let mut page = sample();
        let mut node = InternalPage::new(&mut page);

        // Child 2 (keys in (10, 20]) split into 2 and 9 around 15.
        let pos = node.separator_position(pid(2)).unwrap();
        assert_eq!(pos, 1);
        node.insert_separator(pos, &int(15), pid(2), pid(9)).unwrap();

        assert_eq!(node.children(), vec![pid(1), pid(2), pid(9), pid(3), pid(4)]);
        assert_eq!(node.key(1), &int(15)[..]);
        assert_eq!(node.child_for(KeyType::Int, &int(16)), pid(9));
        assert!(node.layout_is_consistent());
    }

    #[test]
    fn test_insert_separator_after_rightmost_child() {
        let mut page = sample();
        let mut node = InternalPage::new(&mut page);

        let pos = node.separator_position(pid(4)).unwrap();
        assert_eq!(pos, 3);
        node.insert_separator(pos, &int(40), pid(4), pid(5)).unwrap();

        assert_eq!(node.children(), vec![pid(1), pid(2), pid(3), pid(4), pid(5)]);
        assert_eq!(node.child_for(KeyType::Int, &int(41)), pid(5));
    }

    #[test]
    fn test_separator_position_unknown_child() {
        let page = sample();
        assert_eq!(InternalPage::new(&page).separator_position(pid(77)), None);
    }
}
