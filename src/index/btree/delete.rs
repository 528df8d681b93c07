//! Deletion without rebalancing.

use tracing::trace;

use super::leaf_page::LeafPage;
use super::BPlusTree;
use crate::common::{Error, Result, Rid};
use crate::storage::page::PageType;

impl BPlusTree<'_> {
    /// Remove `rid` from the encoded `key`'s RID list, dropping the entry
    /// when it was the last one.
    ///
    /// Nodes are never merged or rebalanced, so a leaf may end up empty and
    /// stays in the sibling chain.
    ///
    /// # Errors
    /// - `Error::NotFound` if the file is empty, the key is absent or
    ///   tombstoned, or the key does not list `rid`
    /// - `Error::TypeMismatch` if the file holds another key type
    pub fn delete(&mut self, key: &[u8], rid: Rid) -> Result<()> {
        let meta = self.load_meta()?.ok_or(Error::NotFound)?;
        let leaf_id = self.find_leaf(&meta, key)?;
        let mut page = self.read_page(leaf_id, PageType::BTreeLeaf)?;

        let mut leaf = LeafPage::new(&mut page);
        let index = match leaf.find(self.key_type, key) {
            Ok(i) if !leaf.is_tombstone(i) => i,
            _ => return Err(Error::NotFound),
        };
        let n = leaf.rid_position(index, rid).ok_or(Error::NotFound)?;

        if leaf.rid_count(index) == 1 {
            leaf.remove_entry(index);
        } else {
            leaf.remove_rid(index, n);
        }
        trace!(leaf = leaf_id.0, %rid, "delete");

        self.write_page(leaf_id, &mut page)
    }
}
