//! Diagnostic rendering of the tree.

use super::internal_page::InternalPage;
use super::leaf_page::LeafPage;
use super::BPlusTree;
use crate::common::{PageId, Result};
use crate::index::key::Key;
use crate::storage::page::PageType;

impl BPlusTree<'_> {
    /// Render the tree in pre-order as JSON-shaped text.
    ///
    /// ```text
    /// {"keys":["5"],
    ///  "children":[
    ///     {"keys":["1:[(0,1)]","5:[(0,2),(0,4)]"]},
    ///     {"keys":["9:[(3,3)]"]}
    /// ]}
    /// ```
    ///
    /// Tombstoned entries are left out. An empty file renders as `{}`.
    pub fn dump(&mut self) -> Result<String> {
        let mut out = String::new();
        match self.load_meta()? {
            Some(meta) => self.render(meta.root_page, meta.tree_height, 0, &mut out)?,
            None => out.push_str("{}"),
        }
        out.push('\n');
        Ok(out)
    }

    fn render(
        &mut self,
        page_id: PageId,
        height: u32,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        let indent = "    ".repeat(depth);

        if height == 0 {
            let page = self.read_page(page_id, PageType::BTreeLeaf)?;
            let leaf = LeafPage::new(&page);

            let mut entries = Vec::with_capacity(leaf.entry_count());
            for i in (0..leaf.entry_count()).filter(|&i| !leaf.is_tombstone(i)) {
                let key = Key::decode(self.key_type, leaf.key(i))?;
                let rids: Vec<String> = leaf.rids(i).map(|rid| rid.to_string()).collect();
                entries.push(format!("\"{}:[{}]\"", escape(&key.to_string()), rids.join(",")));
            }
            out.push_str(&format!("{}{{\"keys\":[{}]}}", indent, entries.join(",")));
            return Ok(());
        }

        let page = self.read_page(page_id, PageType::BTreeInternal)?;
        let node = InternalPage::new(&page);
        let mut keys = Vec::with_capacity(node.entry_count());
        for i in 0..node.entry_count() {
            let key = Key::decode(self.key_type, node.key(i))?;
            keys.push(format!("\"{}\"", escape(&key.to_string())));
        }
        let children = node.children();

        out.push_str(&format!("{}{{\"keys\":[{}],\n", indent, keys.join(",")));
        out.push_str(&format!("{} \"children\":[\n", indent));
        for (n, child) in children.iter().enumerate() {
            self.render(*child, height - 1, depth + 1, out)?;
            out.push_str(if n + 1 < children.len() { ",\n" } else { "\n" });
        }
        out.push_str(&format!("{}]}}", indent));
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
