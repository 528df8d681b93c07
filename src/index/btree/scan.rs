//! Forward range scan over the leaf chain.

use std::cmp::Ordering;
use std::iter::FusedIterator;
use std::ops::Bound;

use tracing::trace;

use super::leaf_page::LeafPage;
use super::BPlusTree;
use crate::common::{PageId, Result, Rid};
use crate::index::key::{self, Key, KeyType};
use crate::storage::page::{Page, PageType};
use crate::storage::PagedFile;

enum ScanState {
    Unstarted,
    InLeaf {
        page: Box<Page>,
        entry: usize,
        rid: usize,
    },
    Exhausted,
}

/// Iterator over `(key, rid)` pairs in key order, one item per RID.
///
/// The scan walks the leaf chain from the leftmost leaf, skipping entries
/// below the lower bound and stopping at the first entry above the upper
/// bound. Tombstoned entries are skipped.
///
/// The iterator holds the file's `&mut` borrow, so the index cannot change
/// underneath it. A storage error is yielded once and ends the scan.
///
/// # Example
/// ```no_run
/// use ixdb::{IndexConfig, IndexManager, Key, KeyType};
///
/// let manager = IndexManager::new(IndexConfig::default());
/// let mut handle = manager.open_file("people.idx")?;
///
/// let low = Key::Int(3);
/// let high = Key::Int(7);
/// for item in manager.scan(&mut handle, KeyType::Int, Some(&low), Some(&high), true, false)? {
///     let (key, rid) = item?;
///     println!("{} -> {}", key, rid);
/// }
/// # Ok::<(), ixdb::Error>(())
/// ```
pub struct ScanIterator<'a> {
    file: &'a mut PagedFile,
    key_type: KeyType,
    low: Bound<Vec<u8>>,
    high: Bound<Vec<u8>>,
    state: ScanState,
}

impl<'a> ScanIterator<'a> {
    /// Start a scan; no pages are read until the first call to `next`.
    ///
    /// # Errors
    /// Returns `Error::TypeMismatch` if a bound or the file's key type
    /// differs from `key_type`.
    pub(crate) fn new(
        file: &'a mut PagedFile,
        key_type: KeyType,
        low: Option<&Key>,
        high: Option<&Key>,
        low_inclusive: bool,
        high_inclusive: bool,
    ) -> Result<Self> {
        let low = bound(key_type, low, low_inclusive)?;
        let high = bound(key_type, high, high_inclusive)?;

        let meta = BPlusTree::new(&mut *file, key_type).load_meta()?;
        let state = match meta {
            Some(_) if file.page_count() > PageId::FIRST_LEAF.0 => ScanState::Unstarted,
            _ => ScanState::Exhausted,
        };

        Ok(Self {
            file,
            key_type,
            low,
            high,
            state,
        })
    }

    fn load_leaf(&mut self, page_id: PageId) -> Result<Box<Page>> {
        BPlusTree::new(&mut *self.file, self.key_type)
            .read_page(page_id, PageType::BTreeLeaf)
            .map(Box::new)
    }

    fn step(&mut self) -> Result<Option<(Key, Rid)>> {
        loop {
            let next_leaf = match &mut self.state {
                ScanState::Exhausted => return Ok(None),
                ScanState::Unstarted => PageId::FIRST_LEAF,
                ScanState::InLeaf { page, entry, rid } => {
                    let leaf = LeafPage::new(&**page);

                    if *entry >= leaf.entry_count() {
                        let next = leaf.right_sibling();
                        if !next.is_valid() {
                            self.state = ScanState::Exhausted;
                            return Ok(None);
                        }
                        next
                    } else if leaf.is_tombstone(*entry)
                        || *rid >= leaf.rid_count(*entry)
                        || !above_low(self.key_type, &self.low, leaf.key(*entry))
                    {
                        *entry += 1;
                        *rid = 0;
                        continue;
                    } else if !below_high(self.key_type, &self.high, leaf.key(*entry)) {
                        self.state = ScanState::Exhausted;
                        return Ok(None);
                    } else {
                        let item = Key::decode(self.key_type, leaf.key(*entry))
                            .map(|key| (key, leaf.rid(*entry, *rid)));
                        *rid += 1;
                        return item.map(Some);
                    }
                }
            };

            trace!(leaf = next_leaf.0, "scan entering leaf");
            let page = self.load_leaf(next_leaf)?;
            self.state = ScanState::InLeaf {
                page,
                entry: 0,
                rid: 0,
            };
        }
    }
}

impl Iterator for ScanIterator<'_> {
    type Item = Result<(Key, Rid)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(item) => item.map(Ok),
            Err(err) => {
                self.state = ScanState::Exhausted;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for ScanIterator<'_> {}

fn bound(key_type: KeyType, key: Option<&Key>, inclusive: bool) -> Result<Bound<Vec<u8>>> {
    Ok(match key {
        None => Bound::Unbounded,
        Some(key) if inclusive => Bound::Included(key.encode_checked(key_type)?),
        Some(key) => Bound::Excluded(key.encode_checked(key_type)?),
    })
}

fn above_low(key_type: KeyType, low: &Bound<Vec<u8>>, key: &[u8]) -> bool {
    match low {
        Bound::Unbounded => true,
        Bound::Included(low) => key::compare(key_type, key, low) != Ordering::Less,
        Bound::Excluded(low) => key::compare(key_type, key, low) == Ordering::Greater,
    }
}

fn below_high(key_type: KeyType, high: &Bound<Vec<u8>>, key: &[u8]) -> bool {
    match high {
        Bound::Unbounded => true,
        Bound::Included(high) => key::compare(key_type, key, high) != Ordering::Greater,
        Bound::Excluded(high) => key::compare(key_type, key, high) == Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use tempfile::tempdir;

    fn scratch(dir: &tempfile::TempDir) -> PagedFile {
        let mut file = PagedFile::create(dir.path().join("scan.idx")).unwrap();
        file.set_sync_on_write(false);
        file
    }

    fn insert(file: &mut PagedFile, key: i32, rid: Rid) {
        BPlusTree::new(file, KeyType::Int)
            .insert(&Key::Int(key).encode(), rid)
            .unwrap();
    }

    fn keys(scan: ScanIterator<'_>) -> Vec<i32> {
        scan.map(|item| match item.unwrap().0 {
            Key::Int(v) => v,
            other => panic!("unexpected key {:?}", other),
        })
        .collect()
    }

    fn range(
        file: &mut PagedFile,
        low: Option<i32>,
        high: Option<i32>,
        low_inclusive: bool,
        high_inclusive: bool,
    ) -> Vec<i32> {
        let low = low.map(Key::Int);
        let high = high.map(Key::Int);
        let scan = ScanIterator::new(
            file,
            KeyType::Int,
            low.as_ref(),
            high.as_ref(),
            low_inclusive,
            high_inclusive,
        )
        .unwrap();
        keys(scan)
    }

    #[test]
    fn test_empty_file_yields_nothing() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        let mut scan = ScanIterator::new(&mut file, KeyType::Int, None, None, true, true).unwrap();
        assert!(scan.next().is_none());
        assert!(scan.next().is_none());
    }

    #[test]
    fn test_one_item_per_rid() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);

        insert(&mut file, 1, Rid::new(0, 1));
        insert(&mut file, 5, Rid::new(0, 2));
        insert(&mut file, 3, Rid::new(0, 3));
        insert(&mut file, 5, Rid::new(0, 4));

        let items: Vec<(Key, Rid)> = ScanIterator::new(&mut file, KeyType::Int, None, None, true, true)
            .unwrap()
            .map(|item| item.unwrap())
            .collect();
        assert_eq!(
            items,
            vec![
                (Key::Int(1), Rid::new(0, 1)),
                (Key::Int(3), Rid::new(0, 3)),
                (Key::Int(5), Rid::new(0, 2)),
                (Key::Int(5), Rid::new(0, 4)),
            ]
        );
    }

    #[test]
    fn test_bounds() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);
        for k in 0..10 {
            insert(&mut file, k, Rid::new(k as u32, 0));
        }

        assert_eq!(range(&mut file, Some(3), Some(7), true, false), vec![3, 4, 5, 6]);
        assert_eq!(range(&mut file, Some(3), Some(7), true, true), vec![3, 4, 5, 6, 7]);
        assert_eq!(range(&mut file, Some(3), Some(7), false, false), vec![4, 5, 6]);
        assert_eq!(range(&mut file, Some(3), Some(7), false, true), vec![4, 5, 6, 7]);
        assert_eq!(range(&mut file, None, Some(2), true, true), vec![0, 1, 2]);
        assert_eq!(range(&mut file, Some(8), None, false, true), vec![9]);
        assert!(range(&mut file, Some(7), Some(3), true, true).is_empty());
    }

    #[test]
    fn test_scan_crosses_leaves() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);
        for k in (0..2000).rev() {
            insert(&mut file, k, Rid::new(k as u32, 0));
        }

        assert_eq!(range(&mut file, None, None, true, true), (0..2000).collect::<Vec<_>>());
        assert_eq!(
            range(&mut file, Some(500), Some(1500), true, false),
            (500..1500).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_tombstoned_entries_skipped() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);
        for k in 0..4 {
            insert(&mut file, k, Rid::new(k as u32, 0));
        }

        let mut tree = BPlusTree::new(&mut file, KeyType::Int);
        let mut page = tree.read_page(PageId::FIRST_LEAF, PageType::BTreeLeaf).unwrap();
        LeafPage::new(&mut page).set_tombstone(2, true);
        tree.write_page(PageId::FIRST_LEAF, &mut page).unwrap();

        assert_eq!(range(&mut file, None, None, true, true), vec![0, 1, 3]);
    }

    #[test]
    fn test_bound_type_mismatch() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);
        insert(&mut file, 1, Rid::new(0, 0));

        let low = Key::varchar("a");
        assert!(matches!(
            ScanIterator::new(&mut file, KeyType::Int, Some(&low), None, true, true),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            ScanIterator::new(&mut file, KeyType::Real, None, None, true, true),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_storage_error_yielded_once() {
        let dir = tempdir().unwrap();
        let mut file = scratch(&dir);
        insert(&mut file, 1, Rid::new(0, 0));

        let mut page = file.read_page(PageId::FIRST_LEAF).unwrap();
        page.as_mut_slice()[100] ^= 0x5A;
        file.write_page(PageId::FIRST_LEAF, &page).unwrap();

        let mut scan = ScanIterator::new(&mut file, KeyType::Int, None, None, true, true).unwrap();
        assert!(matches!(scan.next(), Some(Err(Error::Corrupted { page: 1, .. }))));
        assert!(scan.next().is_none());
    }
}
