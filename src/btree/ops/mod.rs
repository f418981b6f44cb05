/// B-tree operations: search, insert (with split and root promotion), leaf traversal.
///
/// The B-tree reads and writes pages only through the pager. Every page an
/// insert touches is flushed before the insert returns, children before the
/// page that references them.
use tracing::{debug, info, warn};

use crate::btree::node::*;
use crate::error::{PageDbError, Result};
use crate::storage::page::{Page, PageNum};
use crate::storage::pager::Pager;
use crate::types::Row;

/// Maximum B-tree depth to stop runaway walks on corrupted parent/child links.
const MAX_BTREE_DEPTH: usize = 64;

/// B-tree handle. Tracks the root page and the internal node fan-out.
pub struct BTree {
    root_page_num: PageNum,
    internal_max_keys: u32,
}

impl BTree {
    pub fn new(root_page_num: PageNum, internal_max_keys: u32) -> Self {
        BTree {
            root_page_num,
            internal_max_keys,
        }
    }

    /// Create a new B-tree with a fresh root leaf page.
    pub fn create(pager: &mut Pager, internal_max_keys: u32) -> Result<Self> {
        let root_num = pager.allocate_page()?;
        let root = load(pager, root_num)?;
        init_leaf(root);
        set_is_root(root, true);
        pager.flush(root_num)?;
        Ok(BTree::new(root_num, internal_max_keys))
    }

    pub fn root_page_num(&self) -> PageNum {
        self.root_page_num
    }

    pub fn internal_max_keys(&self) -> u32 {
        self.internal_max_keys
    }

    /// Locate the leaf that holds (or would hold) `key` and the slot within it.
    pub fn find(&self, pager: &mut Pager, key: u32) -> Result<(PageNum, FindResult)> {
        let mut page_num = self.root_page_num;
        for _ in 0..MAX_BTREE_DEPTH {
            let page = load(pager, page_num)?;
            match node_type(page)? {
                NodeType::Leaf => return Ok((page_num, leaf_find(page, key))),
                NodeType::Internal => {
                    let child_num = internal_find_child(page, key);
                    page_num = internal_child(page, child_num)?;
                }
            }
        }
        Err(depth_exceeded())
    }

    /// Search for a key. Returns the row if found.
    pub fn search(&self, pager: &mut Pager, key: u32) -> Result<Option<Row>> {
        let (page_num, slot) = self.find(pager, key)?;
        if !slot.is_duplicate {
            return Ok(None);
        }
        let page = load(pager, page_num)?;
        Ok(Some(leaf_row(page, slot.cell_num)))
    }

    /// Insert a row keyed by its id. Existing keys are rejected, never overwritten.
    pub fn insert(&mut self, pager: &mut Pager, row: &Row) -> Result<()> {
        row.validate()?;
        let key = row.id;

        let (leaf_num, slot) = self.find(pager, key)?;
        if slot.is_duplicate {
            return Err(PageDbError::DuplicateKey(key));
        }

        // Reserve room for the whole split cascade up front, so a full table
        // rejects the insert before any page changes.
        let needed = self.pages_needed(pager, leaf_num)?;
        if pager.num_pages() + needed > pager.max_pages() {
            warn!(
                key,
                needed,
                max_pages = pager.max_pages(),
                "insert rejected: page limit reached"
            );
            return Err(PageDbError::CapacityExceeded {
                max_pages: pager.max_pages(),
            });
        }

        let page = load(pager, leaf_num)?;
        if leaf_num_cells(page) < LEAF_NODE_MAX_CELLS {
            leaf_insert_cell(page, slot.cell_num, key, row);
            return pager.flush(leaf_num);
        }

        self.split_leaf_and_insert(pager, leaf_num, slot.cell_num, row)
    }

    /// Number of pages a split cascade starting at `leaf_num` would allocate:
    /// one per full node on the way up, plus one for the copied-out root.
    fn pages_needed(&self, pager: &mut Pager, leaf_num: PageNum) -> Result<u32> {
        let mut needed = 0;
        let mut page_num = leaf_num;
        for _ in 0..MAX_BTREE_DEPTH {
            let page = load(pager, page_num)?;
            let full = match node_type(page)? {
                NodeType::Leaf => leaf_num_cells(page) >= LEAF_NODE_MAX_CELLS,
                NodeType::Internal => internal_num_keys(page) >= self.internal_max_keys,
            };
            if !full {
                return Ok(needed);
            }
            needed += 1;
            if page_num == self.root_page_num {
                return Ok(needed + 1);
            }
            page_num = parent(page);
        }
        Err(depth_exceeded())
    }

    /// Split a full leaf: the lower half of the cells (new one included) stays
    /// in place, the upper half moves to a new leaf.
    fn split_leaf_and_insert(
        &mut self,
        pager: &mut Pager,
        old_num: PageNum,
        cell_num: u32,
        row: &Row,
    ) -> Result<()> {
        let (was_root, old_parent, mut cells) = {
            let old: &Page = load(pager, old_num)?;
            let cells: Vec<Vec<u8>> = (0..leaf_num_cells(old))
                .map(|i| leaf_cell(old, i).to_vec())
                .collect();
            (is_root(old), parent(old), cells)
        };
        cells.insert(cell_num as usize, encode_leaf_cell(row.id, row));

        let right_count = cells.len() / 2;
        let left_count = cells.len() - right_count;

        let new_num = pager.allocate_page()?;
        {
            let right = load(pager, new_num)?;
            init_leaf(right);
            set_parent(right, old_parent);
            write_leaf_cells(right, &cells[left_count..]);
        }
        {
            let left = load(pager, old_num)?;
            init_leaf(left);
            set_is_root(left, was_root);
            set_parent(left, old_parent);
            write_leaf_cells(left, &cells[..left_count]);
        }
        debug!(
            old_page = old_num,
            new_page = new_num,
            left_count,
            right_count,
            "split leaf"
        );

        pager.flush(new_num)?;
        if was_root {
            return self.create_new_root(pager, new_num);
        }
        pager.flush(old_num)?;

        let left_max = self.max_key(pager, old_num)?;
        self.insert_into_parent(pager, old_parent, old_num, left_max, new_num)
    }

    /// Register `right_num` as the sibling just after `left_num` in `parent_num`,
    /// with `left_max` as the new routing key for `left_num`.
    fn insert_into_parent(
        &mut self,
        pager: &mut Pager,
        parent_num: PageNum,
        left_num: PageNum,
        left_max: u32,
        right_num: PageNum,
    ) -> Result<()> {
        let (mut keys, mut children, parent_is_root, grandparent) = {
            let page = load(pager, parent_num)?;
            if node_type(page)? != NodeType::Internal {
                return Err(PageDbError::FormatViolation(format!(
                    "parent page {} of page {} is not an internal node",
                    parent_num, left_num
                )));
            }
            (
                internal_keys(page),
                internal_children(page)?,
                is_root(page),
                parent(page),
            )
        };

        let idx = children
            .iter()
            .position(|&c| c == left_num)
            .ok_or_else(|| {
                PageDbError::FormatViolation(format!(
                    "page {} is not a child of its parent {}",
                    left_num, parent_num
                ))
            })?;

        // The old routing key (if any) now bounds the right half.
        keys.insert(idx, left_max);
        children.insert(idx + 1, right_num);

        if keys.len() as u32 > self.internal_max_keys {
            return self.split_internal(pager, parent_num, &keys, &children);
        }

        {
            let right = load(pager, right_num)?;
            set_parent(right, parent_num);
        }
        pager.flush(right_num)?;

        let page = load(pager, parent_num)?;
        init_internal(page);
        set_is_root(page, parent_is_root);
        set_parent(page, grandparent);
        write_internal_cells(page, &keys, &children);
        pager.flush(parent_num)
    }

    /// Split an overflowing internal node given its would-be contents.
    ///
    /// The lower node keeps `children[..=mid]` with `children[mid]` as its
    /// right child. `keys[mid]` (the lower node's max key) moves up.
    fn split_internal(
        &mut self,
        pager: &mut Pager,
        node_num: PageNum,
        keys: &[u32],
        children: &[PageNum],
    ) -> Result<()> {
        let (was_root, node_parent) = {
            let page = load(pager, node_num)?;
            (is_root(page), parent(page))
        };

        let mid = keys.len() / 2;
        let promoted = keys[mid];

        let new_num = pager.allocate_page()?;
        {
            let right = load(pager, new_num)?;
            init_internal(right);
            set_parent(right, node_parent);
            write_internal_cells(right, &keys[mid + 1..], &children[mid + 1..]);
        }
        self.reparent(pager, &children[mid + 1..], new_num)?;
        // Children kept on the left may include a page created by the split
        // below us; make sure it points here.
        self.reparent(pager, &children[..=mid], node_num)?;
        pager.flush(new_num)?;

        {
            let left = load(pager, node_num)?;
            init_internal(left);
            set_is_root(left, was_root);
            set_parent(left, node_parent);
            write_internal_cells(left, &keys[..mid], &children[..=mid]);
        }
        debug!(
            old_page = node_num,
            new_page = new_num,
            promoted,
            "split internal node"
        );

        if was_root {
            return self.create_new_root(pager, new_num);
        }
        pager.flush(node_num)?;

        self.insert_into_parent(pager, node_parent, node_num, promoted, new_num)
    }

    /// The root has split: its page now holds the lower half. Move that half
    /// to a new page and turn the root page into an internal node over the
    /// two halves, so the root stays at the same page number.
    fn create_new_root(&mut self, pager: &mut Pager, right_num: PageNum) -> Result<()> {
        let root_num = self.root_page_num;
        let left_num = pager.allocate_page()?;

        let root_copy = load(pager, root_num)?.clone();
        let left_is_internal = {
            let left = load(pager, left_num)?;
            *left = root_copy;
            set_is_root(left, false);
            set_parent(left, root_num);
            node_type(left)? == NodeType::Internal
        };
        if left_is_internal {
            let grandchildren = internal_children(load(pager, left_num)?)?;
            self.reparent(pager, &grandchildren, left_num)?;
        }
        {
            let right = load(pager, right_num)?;
            set_parent(right, root_num);
        }
        pager.flush(right_num)?;
        pager.flush(left_num)?;

        let left_max = self.max_key(pager, left_num)?;
        let root = load(pager, root_num)?;
        init_internal(root);
        set_is_root(root, true);
        internal_append_child(root, left_max, left_num);
        set_internal_right_child(root, right_num);
        pager.flush(root_num)?;

        info!(
            root = root_num,
            left = left_num,
            right = right_num,
            key = left_max,
            "promoted new root"
        );
        Ok(())
    }

    /// Point each page in `children` at `parent_num`, flushing those that change.
    fn reparent(&self, pager: &mut Pager, children: &[PageNum], parent_num: PageNum) -> Result<()> {
        for &child in children {
            let page = load(pager, child)?;
            if parent(page) != parent_num {
                set_parent(page, parent_num);
                pager.flush(child)?;
            }
        }
        Ok(())
    }

    /// Largest key in the subtree rooted at `page_num`.
    pub fn max_key(&self, pager: &mut Pager, page_num: PageNum) -> Result<u32> {
        let mut page_num = page_num;
        for _ in 0..MAX_BTREE_DEPTH {
            let page = load(pager, page_num)?;
            match node_type(page)? {
                NodeType::Leaf => {
                    return leaf_max_key(page).ok_or_else(|| {
                        PageDbError::FormatViolation(format!("leaf {} is empty", page_num))
                    })
                }
                NodeType::Internal => page_num = internal_right_child(page)?,
            }
        }
        Err(depth_exceeded())
    }

    /// Leftmost leaf of the subtree rooted at `page_num`.
    pub fn leftmost_leaf(&self, pager: &mut Pager, page_num: PageNum) -> Result<PageNum> {
        let mut page_num = page_num;
        for _ in 0..MAX_BTREE_DEPTH {
            let page = load(pager, page_num)?;
            match node_type(page)? {
                NodeType::Leaf => return Ok(page_num),
                NodeType::Internal => page_num = internal_child(page, 0)?,
            }
        }
        Err(depth_exceeded())
    }

    /// The leaf after `leaf_num` in key order, found by climbing parent
    /// pointers to the first ancestor with a child to the right.
    pub fn next_leaf(&self, pager: &mut Pager, leaf_num: PageNum) -> Result<Option<PageNum>> {
        let mut child_num = leaf_num;
        for _ in 0..MAX_BTREE_DEPTH {
            if child_num == self.root_page_num {
                return Ok(None);
            }
            let parent_num = parent(load(pager, child_num)?);
            let parent_page = load(pager, parent_num)?;
            if node_type(parent_page)? != NodeType::Internal {
                return Err(PageDbError::FormatViolation(format!(
                    "parent page {} of page {} is not an internal node",
                    parent_num, child_num
                )));
            }
            let children = internal_children(parent_page)?;
            let idx = children
                .iter()
                .position(|&c| c == child_num)
                .ok_or_else(|| {
                    PageDbError::FormatViolation(format!(
                        "page {} is not a child of its parent {}",
                        child_num, parent_num
                    ))
                })?;
            if let Some(&sibling) = children.get(idx + 1) {
                return self.leftmost_leaf(pager, sibling).map(Some);
            }
            child_num = parent_num;
        }
        Err(depth_exceeded())
    }

    /// Indented dump of the tree: leaves list `index : key`, internal nodes
    /// interleave their children with `key` lines.
    pub fn render(&self, pager: &mut Pager) -> Result<String> {
        let mut out = String::new();
        self.render_node(pager, self.root_page_num, 0, &mut out)?;
        Ok(out)
    }

    fn render_node(
        &self,
        pager: &mut Pager,
        page_num: PageNum,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        if depth > MAX_BTREE_DEPTH {
            return Err(depth_exceeded());
        }
        let indent = "\t".repeat(depth);
        let page = load(pager, page_num)?;
        match node_type(page)? {
            NodeType::Leaf => {
                let n = leaf_num_cells(page);
                out.push_str(&format!("{}leaf (size {}).\n", indent, n));
                for i in 0..n {
                    out.push_str(&format!("{}\t{} : {}\n", indent, i, leaf_key(page, i)));
                }
            }
            NodeType::Internal => {
                let keys = internal_keys(page);
                let children = internal_children(page)?;
                out.push_str(&format!("{}internal (size {}).\n", indent, keys.len()));
                for (i, key) in keys.iter().enumerate() {
                    self.render_node(pager, children[i], depth + 1, out)?;
                    out.push_str(&format!("{}\tkey {}\n", indent, key));
                }
                self.render_node(pager, children[keys.len()], depth + 1, out)?;
            }
        }
        Ok(())
    }
}

/// Fetch a page the tree links to. A link past the end of the file is corruption.
fn load(pager: &mut Pager, page_num: PageNum) -> Result<&mut Page> {
    pager.get_page(page_num).map_err(|e| match e {
        PageDbError::PageNotFound(n) => {
            PageDbError::FormatViolation(format!("B-tree links to missing page {}", n))
        }
        other => other,
    })
}

fn depth_exceeded() -> PageDbError {
    PageDbError::FormatViolation("B-tree depth exceeds maximum (possible cycle)".into())
}
