//! Insertion with leaf and internal node splits.

use std::cmp::Ordering;

use tracing::{debug, trace};

use super::internal_page::InternalPage;
use super::leaf_page::LeafPage;
use super::{BPlusTree, MetaPage};
use crate::common::{Error, PageId, Result, Rid};
use crate::index::key;
use crate::storage::page::{Page, PageType};

impl BPlusTree<'_> {
    /// Add `rid` under the encoded `key`, splitting nodes as needed.
    ///
    /// An empty file is initialized first.
    ///
    /// # Errors
    /// - `Error::TypeMismatch` if the file holds another key type
    /// - `Error::DuplicateRid` if `key` already lists `rid` (nothing changes)
    /// - `Error::EntryTooLarge` if a leaf holding only this key is full
    /// - `Error::SplitFailed` for any failure after a split has begun; the
    ///   pages written before the failure stay as they are
    pub fn insert(&mut self, key: &[u8], rid: Rid) -> Result<()> {
        let mut meta = match self.load_meta()? {
            Some(meta) => meta,
            None => self.initialize()?,
        };

        let mut leaf_id = self.find_leaf(&meta, key)?;
        let mut page = self.read_page(leaf_id, PageType::BTreeLeaf)?;

        if LeafPage::new(&page).contains(self.key_type, key, rid) {
            return Err(Error::DuplicateRid { rid });
        }

        trace!(leaf = leaf_id.0, %rid, "insert");

        let mut split_from: Option<PageId> = None;
        let wrap = |split_from: Option<PageId>, err: Error| match split_from {
            Some(page) => Error::split_failed(page.0, err),
            None => err,
        };

        loop {
            if LeafPage::new(&page).can_accept(self.key_type, key) {
                LeafPage::new(&mut page)
                    .put(self.key_type, key, rid)
                    .map_err(|err| wrap(split_from, err))?;
                return self
                    .write_page(leaf_id, &mut page)
                    .map_err(|err| wrap(split_from, err));
            }

            if LeafPage::new(&page).entry_count() < 2 {
                return Err(wrap(split_from, Error::EntryTooLarge { page: leaf_id.0 }));
            }

            let first = *split_from.get_or_insert(leaf_id);
            let (separator, right_id) = self
                .split_leaf(&mut meta, leaf_id, page)
                .map_err(|err| Error::split_failed(first.0, err))?;

            if key::compare(self.key_type, key, &separator) == Ordering::Greater {
                leaf_id = right_id;
            }
            page = self
                .read_page(leaf_id, PageType::BTreeLeaf)
                .map_err(|err| Error::split_failed(first.0, err))?;
        }
    }

    /// Move the upper half of a full leaf to a new page and link the new page
    /// into the sibling chain and the parent.
    ///
    /// Returns the separator (the largest key left behind) and the new page.
    /// Every page touched is written, so callers re-read what they need.
    fn split_leaf(
        &mut self,
        meta: &mut MetaPage,
        leaf_id: PageId,
        mut page: Page,
    ) -> Result<(Vec<u8>, PageId)> {
        let leaf = LeafPage::new(&page);
        let count = leaf.entry_count();
        let mid = count / 2;
        let separator = leaf.key(mid - 1).to_vec();
        let old_right = leaf.right_sibling();

        let mut right = Page::new();
        let mut right_leaf = LeafPage::new(&mut right);
        right_leaf.init(leaf.parent(), leaf_id, old_right);
        for i in mid..count {
            let (slot, data) = leaf.raw_entry(i);
            right_leaf.push_raw(slot, data)?;
        }
        let right_id = self.append_page(&mut right)?;

        let mut leaf = LeafPage::new(&mut page);
        leaf.truncate(mid);
        leaf.set_right_sibling(right_id);
        self.write_page(leaf_id, &mut page)?;

        if old_right.is_valid() {
            let mut neighbour = self.read_page(old_right, PageType::BTreeLeaf)?;
            LeafPage::new(&mut neighbour).set_left_sibling(right_id);
            self.write_page(old_right, &mut neighbour)?;
        }

        meta.leaf_node_count += 1;
        debug!(
            left = leaf_id.0,
            right = right_id.0,
            moved = count - mid,
            "split leaf"
        );

        self.insert_into_parent(meta, leaf_id, &separator, right_id)?;
        self.write_meta(meta)?;
        Ok((separator, right_id))
    }

    /// Add `separator` between `left` and its new right sibling `right` in
    /// their parent, splitting the parent or growing a new root as needed.
    fn insert_into_parent(
        &mut self,
        meta: &mut MetaPage,
        left: PageId,
        separator: &[u8],
        right: PageId,
    ) -> Result<()> {
        let mut parent_id = self.parent_of(left)?;

        if !parent_id.is_valid() {
            let mut root = Page::new();
            let mut node = InternalPage::new(&mut root);
            node.init(PageId::INVALID);
            node.insert_entry(0, separator, left, right)?;
            let root_id = self.append_page(&mut root)?;

            self.set_parent(left, root_id)?;
            self.set_parent(right, root_id)?;

            meta.root_page = root_id;
            meta.tree_height += 1;
            meta.internal_node_count += 1;
            debug!(root = root_id.0, height = meta.tree_height, "grew new root");
            return Ok(());
        }

        let mut parent = self.read_page(parent_id, PageType::BTreeInternal)?;
        while !InternalPage::new(&parent).can_fit(separator.len()) {
            if InternalPage::new(&parent).entry_count() < 3 {
                return Err(Error::EntryTooLarge { page: parent_id.0 });
            }
            self.split_internal(meta, parent_id, parent)?;

            // `left` may have moved to the new right half
            parent_id = self.parent_of(left)?;
            parent = self.read_page(parent_id, PageType::BTreeInternal)?;
        }

        let mut node = InternalPage::new(&mut parent);
        let pos = node
            .separator_position(left)
            .ok_or_else(|| Error::Corrupted {
                page: parent_id.0,
                reason: format!("page {} is not a child", left.0),
            })?;
        node.insert_separator(pos, separator, left, right)?;
        self.write_page(parent_id, &mut parent)?;

        self.set_parent(right, parent_id)
    }

    /// Split a full internal node around its median, which moves up into
    /// the parent.
    fn split_internal(
        &mut self,
        meta: &mut MetaPage,
        node_id: PageId,
        mut page: Page,
    ) -> Result<()> {
        let node = InternalPage::new(&page);
        let count = node.entry_count();
        let mid = count / 2;
        let median = node.key(mid).to_vec();

        let mut right = Page::new();
        let mut right_node = InternalPage::new(&mut right);
        right_node.init(node.parent());
        for i in mid + 1..count {
            let (slot, data) = node.raw_entry(i);
            right_node.push_raw(slot, data)?;
        }
        let moved = right_node.children();
        let right_id = self.append_page(&mut right)?;

        InternalPage::new(&mut page).truncate(mid);
        self.write_page(node_id, &mut page)?;

        for child in moved {
            self.set_parent(child, right_id)?;
        }

        meta.internal_node_count += 1;
        debug!(
            left = node_id.0,
            right = right_id.0,
            moved = count - mid - 1,
            "split internal node"
        );

        self.insert_into_parent(meta, node_id, &median, right_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use crate::index::key::KeyType;
    use crate::index::Key;
    use crate::storage::PagedFile;
    use tempfile::tempdir;

    fn scratch(dir: &tempfile::TempDir) -> PagedFile {
        let mut file = PagedFile::create(dir.path().join("insert.idx")).unwrap();
        file.set_sync_on_write(false);
        file
    }

    fn insert(file: &mut PagedFile, key: &Key, rid: Rid) -> Result<()> {
        BPlusTree::new(file, key.key_type()).insert(&key.encode(), rid)
    }

    fn meta(file: &mut PagedFile, key_type: KeyType) -> MetaPage {
        BPlusTree::new(file, key_type).load_meta().unwrap().unwrap()
    }

    /// Keys of every leaf, left to right along the sibling chain.
    fn leaf_keys(file: &mut PagedFile) -> Vec<Vec<i32>> {
        let mut tree = BPlusTree::new(file, KeyType::Int);
        let mut leaves = Vec::new();
        let mut page_id = PageId::FIRST_LEAF;
        while page_id.is_valid() {
            let page = tree.read_page(page_id, PageType::BTreeLeaf).unwrap();
            let leaf = LeafPage::new(&page);
            leaves.push(
                (0..leaf.entry_count())
                    .map(|i| match Key::decode(KeyType::Int, leaf.key(i)).unwrap() {
                        Key::Int(v) => v,
                        other => panic!("unexpected key {:?}", other),
                    })
                    .collect(),
            );
            page_id = leaf.right_sibling();
        }
        leaves
    }

    #[test]
    fn test_first_insert_initializes_file() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        insert(&mut file, &Key::Int(7), Rid::new(1, 1)).unwrap();

        assert_eq!(file.page_count(), 2);
        assert_eq!(meta(&mut file, KeyType::Int), MetaPage::new(KeyType::Int));
        assert_eq!(leaf_keys(&mut file), vec![vec![7]]);
    }

    #[test]
    fn test_duplicate_rid_rejected_without_change() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        insert(&mut file, &Key::Int(5), Rid::new(1, 1)).unwrap();
        let written = file.stats().pages_written;

        let err = insert(&mut file, &Key::Int(5), Rid::new(1, 1)).unwrap_err();
        assert!(matches!(err, Error::DuplicateRid { .. }));
        assert_eq!(file.stats().pages_written, written);

        // Same RID under another key is fine
        insert(&mut file, &Key::Int(6), Rid::new(1, 1)).unwrap();
    }

    #[test]
    fn test_type_mismatch() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        insert(&mut file, &Key::Int(5), Rid::new(1, 1)).unwrap();
        assert!(matches!(
            insert(&mut file, &Key::Real(5.0), Rid::new(1, 2)),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_leaf_split_links_siblings() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        // A leaf holds 203 int entries, so 500 keys need at least 3 leaves
        for i in 0..500 {
            insert(&mut file, &Key::Int(i), Rid::new(i as u32, 0)).unwrap();
        }

        let m = meta(&mut file, KeyType::Int);
        assert_eq!(m.tree_height, 1);
        assert!(m.leaf_node_count >= 3);
        assert_eq!(m.internal_node_count, 1);
        assert_ne!(m.root_page, PageId::FIRST_LEAF);

        let leaves = leaf_keys(&mut file);
        assert_eq!(leaves.len() as u32, m.leaf_node_count);
        let flat: Vec<i32> = leaves.concat();
        assert_eq!(flat, (0..500).collect::<Vec<_>>());

        // Back links mirror forward links
        let mut tree = BPlusTree::new(&mut file, KeyType::Int);
        let mut prev = PageId::INVALID;
        let mut page_id = PageId::FIRST_LEAF;
        while page_id.is_valid() {
            let page = tree.read_page(page_id, PageType::BTreeLeaf).unwrap();
            let leaf = LeafPage::new(&page);
            assert_eq!(leaf.left_sibling(), prev);
            prev = page_id;
            page_id = leaf.right_sibling();
        }
    }

    #[test]
    fn test_split_in_the_middle_relinks_old_neighbour() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        for i in 0..300 {
            insert(&mut file, &Key::Int(i * 10), Rid::new(0, 0)).unwrap();
        }
        // Fill the first leaf's key range until it splits again
        for i in 0..150 {
            insert(&mut file, &Key::Int(i * 10 + 5), Rid::new(0, 1)).unwrap();
        }

        let flat: Vec<i32> = leaf_keys(&mut file).concat();
        let mut expected: Vec<i32> = (0..300).map(|i| i * 10).collect();
        expected.extend((0..150).map(|i| i * 10 + 5));
        expected.sort();
        assert_eq!(flat, expected);
    }

    #[test]
    fn test_separator_is_largest_left_key() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        for i in 0..204 {
            insert(&mut file, &Key::Int(i), Rid::new(0, 0)).unwrap();
        }

        let leaves = leaf_keys(&mut file);
        assert_eq!(leaves.len(), 2);
        let largest_left = *leaves[0].last().unwrap();

        let m = meta(&mut file, KeyType::Int);
        let mut tree = BPlusTree::new(&mut file, KeyType::Int);
        let root = tree.read_page(m.root_page, PageType::BTreeInternal).unwrap();
        let node = InternalPage::new(&root);
        assert_eq!(node.entry_count(), 1);
        assert_eq!(node.key(0), &Key::Int(largest_left).encode()[..]);
    }

    #[test]
    fn test_rid_list_overflow_is_entry_too_large() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        // (4096 - 21 - 8 - 4) / 8 RIDs fill a leaf holding one int key
        let capacity = (4096 - 21 - 8 - 4) / 8;
        for n in 0..capacity {
            insert(&mut file, &Key::Int(1), Rid::new(n as u32, 0)).unwrap();
        }

        let err = insert(&mut file, &Key::Int(1), Rid::new(u32::MAX, 0)).unwrap_err();
        assert!(matches!(err, Error::EntryTooLarge { page: 1 }));
        assert_eq!(err.kind(), ErrorKind::NotApplied);
        assert!(!err.is_storage_failure());

        // Nothing was written: every RID is still there
        let mut tree = BPlusTree::new(&mut file, KeyType::Int);
        let leaf = tree.read_page(PageId::FIRST_LEAF, PageType::BTreeLeaf).unwrap();
        assert_eq!(LeafPage::new(&leaf).rid_count(0), capacity);
    }

    #[test]
    fn test_failure_after_split_is_wrapped() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        // "m" takes ~3.4KB of RIDs, "z" sits to its right
        for n in 0..430 {
            insert(&mut file, &Key::varchar("m"), Rid::new(n, 0)).unwrap();
        }
        insert(&mut file, &Key::varchar("z"), Rid::new(0, 0)).unwrap();

        // The leaf splits [m] | [z], but [m] still has no room for the new key
        let big = Key::VarChar(vec![b'a'; 900]);
        match insert(&mut file, &big, Rid::new(1, 1)) {
            Err(Error::SplitFailed { page, source }) => {
                assert_eq!(page, 1);
                assert!(matches!(*source, Error::EntryTooLarge { page: 1 }));
            }
            other => panic!("expected SplitFailed, got {:?}", other),
        }

        let m = meta(&mut file, KeyType::VarChar);
        assert_eq!(m.leaf_node_count, 2);
        assert_eq!(m.tree_height, 1);
    }
}
