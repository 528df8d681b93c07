//! Slotted node pages: the free-space allocator shared by leaf and internal
//! nodes.
//!
//! # Page Layout
//!
//! ```text
//! +----------------------+ 0
//! | PageHeader (5)       |
//! | entry_count  u16     | 5
//! | free_space   u16     | 7   <- free-space boundary
//! | parent_page  u32     | 9
//! | node-specific fields |
//! +----------------------+ HEADER_SIZE
//! | slot 0               |
//! | slot 1               |   slot array, grows toward higher addresses
//! | ...                  |
//! +----------------------+ HEADER_SIZE + n * SLOT_SIZE
//! |                      |
//! |   free space         |
//! |                      |
//! +----------------------+ free_space boundary
//! | data of slot n-1     |
//! | ...                  |   data region, grows toward lower addresses
//! | data of slot 1       |
//! | data of slot 0       |
//! +----------------------+ PAGE_SIZE
//! ```
//!
//! Every slot starts with a `u16` offset to its data. Data blocks are kept in
//! slot order from the end of the page downward with no gaps, so the bytes
//! between the slot array and the boundary are exactly the free space.
//! Insert, remove, grow and shrink shift both regions to keep that true.

use std::marker::PhantomData;

use crate::common::{Error, PageId, Result};
use crate::storage::page::PageHeader;

pub(crate) const OFFSET_ENTRY_COUNT: usize = PageHeader::SIZE;
pub(crate) const OFFSET_FREE_SPACE: usize = PageHeader::SIZE + 2;
pub(crate) const OFFSET_PARENT: usize = PageHeader::SIZE + 4;

/// Size of the header prefix shared by every node page.
pub(crate) const NODE_HEADER_SIZE: usize = PageHeader::SIZE + 8;

#[inline]
pub(crate) fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
pub(crate) fn write_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[inline]
pub(crate) fn write_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn read_page_id(buf: &[u8], at: usize) -> PageId {
    PageId::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[inline]
pub(crate) fn write_page_id(buf: &mut [u8], at: usize, page_id: PageId) {
    buf[at..at + 4].copy_from_slice(&page_id.to_le_bytes());
}

/// Describes the slot format of one kind of node.
pub(crate) trait SlotLayout {
    /// Bytes before the first slot.
    const HEADER_SIZE: usize;
    /// Bytes per slot. The first two are always the data offset.
    const SLOT_SIZE: usize;

    /// Number of data-region bytes owned by `slot`.
    fn data_len(slot: &[u8]) -> usize;
}

/// A node page viewed through its slot layout.
///
/// Works over `&Page` for reading and `&mut Page` for writing (or any byte
/// buffer, which the tests use).
pub(crate) struct SlottedPage<B, L> {
    buf: B,
    _layout: PhantomData<L>,
}

impl<B: AsRef<[u8]>, L: SlotLayout> SlottedPage<B, L> {
    pub fn new(buf: B) -> Self {
        Self {
            buf,
            _layout: PhantomData,
        }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    #[inline]
    fn page_end(&self) -> usize {
        self.bytes().len()
    }

    #[inline]
    fn slot_pos(index: usize) -> usize {
        L::HEADER_SIZE + index * L::SLOT_SIZE
    }

    pub fn entry_count(&self) -> usize {
        read_u16(self.bytes(), OFFSET_ENTRY_COUNT) as usize
    }

    pub fn free_space_boundary(&self) -> usize {
        read_u16(self.bytes(), OFFSET_FREE_SPACE) as usize
    }

    pub fn parent(&self) -> PageId {
        read_page_id(self.bytes(), OFFSET_PARENT)
    }

    /// Bytes between the end of the slot array and the data region.
    pub fn free_space(&self) -> usize {
        self.free_space_boundary()
            .saturating_sub(Self::slot_pos(self.entry_count()))
    }

    /// True if a new slot owning `data_len` bytes fits.
    pub fn can_fit(&self, data_len: usize) -> bool {
        self.free_space() >= L::SLOT_SIZE + data_len
    }

    pub fn slot(&self, index: usize) -> &[u8] {
        assert!(index < self.entry_count(), "slot {} out of bounds", index);
        let at = Self::slot_pos(index);
        &self.bytes()[at..at + L::SLOT_SIZE]
    }

    pub fn data_offset(&self, index: usize) -> usize {
        read_u16(self.slot(index), 0) as usize
    }

    pub fn data_len(&self, index: usize) -> usize {
        L::data_len(self.slot(index))
    }

    pub fn data(&self, index: usize) -> &[u8] {
        let offset = self.data_offset(index);
        let len = self.data_len(index);
        &self.bytes()[offset..offset + len]
    }

    /// Slot bytes and data bytes of one entry, for copying into another page.
    pub fn raw_entry(&self, index: usize) -> (&[u8], &[u8]) {
        (self.slot(index), self.data(index))
    }

    /// Check the allocator invariants: the slot array ends at or before the
    /// boundary and the data blocks tile `[boundary, page_end)` in slot order.
    #[cfg(test)]
    pub fn layout_is_consistent(&self) -> bool {
        let count = self.entry_count();
        let boundary = self.free_space_boundary();
        if Self::slot_pos(count) > boundary || boundary > self.page_end() {
            return false;
        }

        let mut expected_end = self.page_end();
        for i in 0..count {
            let offset = self.data_offset(i);
            if offset + self.data_len(i) != expected_end {
                return false;
            }
            expected_end = offset;
        }
        expected_end == boundary
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, L: SlotLayout> SlottedPage<B, L> {
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }

    /// Reset to an empty node with the given parent.
    pub fn init(&mut self, parent: PageId) {
        let end = self.page_end();
        let buf = self.bytes_mut();
        buf[PageHeader::SIZE..].fill(0);
        write_u16(buf, OFFSET_FREE_SPACE, end as u16);
        write_page_id(buf, OFFSET_PARENT, parent);
    }

    fn set_entry_count(&mut self, count: usize) {
        write_u16(self.bytes_mut(), OFFSET_ENTRY_COUNT, count as u16);
    }

    fn set_free_space_boundary(&mut self, boundary: usize) {
        write_u16(self.bytes_mut(), OFFSET_FREE_SPACE, boundary as u16);
    }

    fn set_data_offset(&mut self, index: usize, offset: usize) {
        write_u16(self.slot_mut(index), 0, offset as u16);
    }

    fn shift_offsets(&mut self, range: std::ops::Range<usize>, delta: isize) {
        for i in range {
            let offset = self.data_offset(i) as isize + delta;
            self.set_data_offset(i, offset as usize);
        }
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut [u8] {
        assert!(index < self.entry_count(), "slot {} out of bounds", index);
        let at = Self::slot_pos(index);
        &mut self.bytes_mut()[at..at + L::SLOT_SIZE]
    }

    /// Insert a slot at `index`, owning a copy of `data`.
    ///
    /// Slots at `index..` move one position right and their data moves down
    /// by `data.len()`. The offset stored in `slot` is overwritten.
    ///
    /// # Errors
    /// Returns `Error::NodeOverflow` if the slot and data do not fit.
    pub fn insert(&mut self, index: usize, slot: &[u8], data: &[u8]) -> Result<()> {
        let count = self.entry_count();
        assert!(index <= count, "insert position {} out of bounds", index);
        assert_eq!(slot.len(), L::SLOT_SIZE, "slot has wrong size");

        let len = data.len();
        if !self.can_fit(len) {
            return Err(Error::NodeOverflow {
                needed: L::SLOT_SIZE + len,
                available: self.free_space(),
            });
        }

        let boundary = self.free_space_boundary();
        let hole_end = if index == 0 {
            self.page_end()
        } else {
            self.data_offset(index - 1)
        };
        let slot_start = Self::slot_pos(index);
        let slot_end = Self::slot_pos(count);

        let buf = self.bytes_mut();
        buf.copy_within(boundary..hole_end, boundary - len);
        buf[hole_end - len..hole_end].copy_from_slice(data);
        buf.copy_within(slot_start..slot_end, slot_start + L::SLOT_SIZE);
        buf[slot_start..slot_start + L::SLOT_SIZE].copy_from_slice(slot);

        self.set_entry_count(count + 1);
        self.set_free_space_boundary(boundary - len);
        self.set_data_offset(index, hole_end - len);
        self.shift_offsets(index + 1..count + 1, -(len as isize));
        Ok(())
    }

    /// Append a slot after the last one.
    pub fn push(&mut self, slot: &[u8], data: &[u8]) -> Result<()> {
        self.insert(self.entry_count(), slot, data)
    }

    /// Remove the slot at `index` and release its data.
    pub fn remove(&mut self, index: usize) {
        let count = self.entry_count();
        assert!(index < count, "remove position {} out of bounds", index);

        let offset = self.data_offset(index);
        let len = self.data_len(index);
        let boundary = self.free_space_boundary();
        let slot_start = Self::slot_pos(index);
        let slot_end = Self::slot_pos(count);

        let buf = self.bytes_mut();
        buf.copy_within(boundary..offset, boundary + len);
        buf[boundary..boundary + len].fill(0);
        buf.copy_within(slot_start + L::SLOT_SIZE..slot_end, slot_start);
        buf[slot_end - L::SLOT_SIZE..slot_end].fill(0);

        self.set_entry_count(count - 1);
        self.set_free_space_boundary(boundary + len);
        self.shift_offsets(index..count - 1, len as isize);
    }

    /// Drop every slot from `keep` onward.
    pub fn truncate(&mut self, keep: usize) {
        while self.entry_count() > keep {
            self.remove(self.entry_count() - 1);
        }
    }

    /// Append `bytes` to the tail of slot `index`'s data.
    ///
    /// The caller updates whatever slot field encodes the data length
    /// afterwards.
    ///
    /// # Errors
    /// Returns `Error::NodeOverflow` if there is not enough free space.
    pub fn grow(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let count = self.entry_count();
        assert!(index < count, "grow position {} out of bounds", index);

        let extra = bytes.len();
        if self.free_space() < extra {
            return Err(Error::NodeOverflow {
                needed: extra,
                available: self.free_space(),
            });
        }

        let end = self.data_offset(index) + self.data_len(index);
        let boundary = self.free_space_boundary();

        let buf = self.bytes_mut();
        buf.copy_within(boundary..end, boundary - extra);
        buf[end - extra..end].copy_from_slice(bytes);

        self.set_free_space_boundary(boundary - extra);
        self.shift_offsets(index..count, -(extra as isize));
        Ok(())
    }

    /// Cut `len` bytes starting `at` bytes into slot `index`'s data.
    ///
    /// The caller updates whatever slot field encodes the data length
    /// afterwards.
    pub fn shrink(&mut self, index: usize, at: usize, len: usize) {
        let count = self.entry_count();
        assert!(index < count, "shrink position {} out of bounds", index);
        assert!(at + len <= self.data_len(index), "shrink range out of bounds");

        let cut = self.data_offset(index) + at;
        let boundary = self.free_space_boundary();

        let buf = self.bytes_mut();
        buf.copy_within(boundary..cut, boundary + len);
        buf[boundary..boundary + len].fill(0);

        self.set_free_space_boundary(boundary + len);
        self.shift_offsets(index..count, len as isize);
    }
}
