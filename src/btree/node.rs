/// B-tree node layout on fixed-size pages.
///
/// Every node is exactly one page. All integers are little-endian.
///
/// Common header (6 bytes):
///   [node_type: u8 (0 = leaf, 1 = internal)] [is_root: u8] [parent: u32]
///
/// Leaf node:
///   header: common + [num_cells: u32]                      (10 bytes)
///   body:   num_cells x [key: u32][row: 296 bytes]         (300 bytes per cell)
///
/// Internal node:
///   header: common + [num_keys: u32] [right_child: u64]    (18 bytes)
///   body:   num_keys x [key: u32][child: u64]              (12 bytes per cell)
///
/// Internal key `i` is the maximum key stored in the subtree of child `i`.
/// The right child holds every key greater than the last internal key.
/// Children are page numbers, never memory addresses.
///
/// Calling a leaf accessor on an internal page (or the reverse) is a bug in
/// the caller and panics.
use crate::error::{PageDbError, Result};
use crate::storage::page::{Page, PageNum, PAGE_SIZE};
use crate::types::{Row, ROW_SIZE};

const NODE_TYPE_LEAF: u8 = 0;
const NODE_TYPE_INTERNAL: u8 = 1;

pub const NODE_TYPE_OFFSET: usize = 0;
pub const IS_ROOT_OFFSET: usize = 1;
pub const PARENT_POINTER_OFFSET: usize = 2;
pub const COMMON_NODE_HEADER_SIZE: usize = 6;

pub const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const LEAF_NODE_HEADER_SIZE: usize = LEAF_NODE_NUM_CELLS_OFFSET + 4;
pub const LEAF_NODE_KEY_SIZE: usize = 4;
pub const LEAF_NODE_VALUE_OFFSET: usize = LEAF_NODE_KEY_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + ROW_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: u32 = (LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE) as u32;

pub const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize = INTERNAL_NODE_NUM_KEYS_OFFSET + 4;
pub const INTERNAL_NODE_HEADER_SIZE: usize = INTERNAL_NODE_RIGHT_CHILD_OFFSET + 8;
pub const INTERNAL_NODE_KEY_SIZE: usize = 4;
pub const INTERNAL_NODE_CHILD_SIZE: usize = 8;
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_KEY_SIZE + INTERNAL_NODE_CHILD_SIZE;
pub const INTERNAL_NODE_MAX_KEYS: u32 =
    ((PAGE_SIZE - INTERNAL_NODE_HEADER_SIZE) / INTERNAL_NODE_CELL_SIZE) as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Leaf,
    Internal,
}

/// Outcome of a leaf binary search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindResult {
    /// Matching cell, or the first cell whose key is greater than the probe.
    pub cell_num: u32,
    pub is_duplicate: bool,
}

// --- Common header ---

/// Get the node type from a page.
pub fn node_type(page: &Page) -> Result<NodeType> {
    match page.read_u8(NODE_TYPE_OFFSET) {
        NODE_TYPE_LEAF => Ok(NodeType::Leaf),
        NODE_TYPE_INTERNAL => Ok(NodeType::Internal),
        tag => Err(PageDbError::FormatViolation(format!(
            "unknown node type tag {}",
            tag
        ))),
    }
}

pub fn set_node_type(page: &mut Page, node_type: NodeType) {
    let tag = match node_type {
        NodeType::Leaf => NODE_TYPE_LEAF,
        NodeType::Internal => NODE_TYPE_INTERNAL,
    };
    page.write_u8(NODE_TYPE_OFFSET, tag);
}

pub fn is_root(page: &Page) -> bool {
    page.read_u8(IS_ROOT_OFFSET) != 0
}

pub fn set_is_root(page: &mut Page, is_root: bool) {
    page.write_u8(IS_ROOT_OFFSET, u8::from(is_root));
}

pub fn parent(page: &Page) -> PageNum {
    page.read_u32(PARENT_POINTER_OFFSET)
}

pub fn set_parent(page: &mut Page, parent: PageNum) {
    page.write_u32(PARENT_POINTER_OFFSET, parent);
}

/// Check that header fields are in range for the declared node type.
pub fn check_header(page: &Page) -> Result<NodeType> {
    let kind = node_type(page)?;
    let root_flag = page.read_u8(IS_ROOT_OFFSET);
    if root_flag > 1 {
        return Err(PageDbError::FormatViolation(format!(
            "is_root flag has invalid value {}",
            root_flag
        )));
    }
    match kind {
        NodeType::Leaf => {
            let n = page.read_u32(LEAF_NODE_NUM_CELLS_OFFSET);
            if n > LEAF_NODE_MAX_CELLS {
                return Err(PageDbError::FormatViolation(format!(
                    "leaf cell count {} exceeds capacity {}",
                    n, LEAF_NODE_MAX_CELLS
                )));
            }
        }
        NodeType::Internal => {
            let n = page.read_u32(INTERNAL_NODE_NUM_KEYS_OFFSET);
            if n > INTERNAL_NODE_MAX_KEYS {
                return Err(PageDbError::FormatViolation(format!(
                    "internal key count {} exceeds capacity {}",
                    n, INTERNAL_NODE_MAX_KEYS
                )));
            }
        }
    }
    Ok(kind)
}

fn assert_leaf(page: &Page) {
    assert!(
        page.read_u8(NODE_TYPE_OFFSET) == NODE_TYPE_LEAF,
        "BUG: leaf accessor used on a non-leaf page"
    );
}

fn assert_internal(page: &Page) {
    assert!(
        page.read_u8(NODE_TYPE_OFFSET) == NODE_TYPE_INTERNAL,
        "BUG: internal accessor used on a non-internal page"
    );
}

// --- Leaf node operations ---

/// Reset a page to an empty, non-root leaf. The body is zeroed so unused
/// slots read back as empty rows.
pub fn init_leaf(page: &mut Page) {
    page.data.fill(0);
    set_node_type(page, NodeType::Leaf);
    set_is_root(page, false);
    set_leaf_num_cells(page, 0);
}

pub fn leaf_num_cells(page: &Page) -> u32 {
    assert_leaf(page);
    page.read_u32(LEAF_NODE_NUM_CELLS_OFFSET)
}

pub fn set_leaf_num_cells(page: &mut Page, num_cells: u32) {
    assert_leaf(page);
    page.write_u32(LEAF_NODE_NUM_CELLS_OFFSET, num_cells);
}

fn leaf_cell_offset(cell_num: u32) -> usize {
    assert!(
        cell_num < LEAF_NODE_MAX_CELLS,
        "BUG: leaf cell {} out of range",
        cell_num
    );
    LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE
}

/// Raw bytes of a leaf cell: [key][row].
pub fn leaf_cell(page: &Page, cell_num: u32) -> &[u8] {
    assert_leaf(page);
    let offset = leaf_cell_offset(cell_num);
    &page.data[offset..offset + LEAF_NODE_CELL_SIZE]
}

pub fn leaf_cell_mut(page: &mut Page, cell_num: u32) -> &mut [u8] {
    assert_leaf(page);
    let offset = leaf_cell_offset(cell_num);
    &mut page.data[offset..offset + LEAF_NODE_CELL_SIZE]
}

pub fn leaf_key(page: &Page, cell_num: u32) -> u32 {
    assert_leaf(page);
    page.read_u32(leaf_cell_offset(cell_num))
}

/// Encoded row bytes of a leaf cell.
pub fn leaf_value(page: &Page, cell_num: u32) -> &[u8] {
    &leaf_cell(page, cell_num)[LEAF_NODE_VALUE_OFFSET..]
}

pub fn leaf_row(page: &Page, cell_num: u32) -> Row {
    Row::deserialize(leaf_value(page, cell_num))
}

/// Write a full cell in place. Does not touch the cell count.
pub fn set_leaf_cell(page: &mut Page, cell_num: u32, key: u32, row: &Row) {
    let cell = leaf_cell_mut(page, cell_num);
    cell[..LEAF_NODE_KEY_SIZE].copy_from_slice(&key.to_le_bytes());
    row.serialize(&mut cell[LEAF_NODE_VALUE_OFFSET..]);
}

/// Encode a leaf cell: [key][row]
pub fn encode_leaf_cell(key: u32, row: &Row) -> Vec<u8> {
    let mut cell = vec![0u8; LEAF_NODE_CELL_SIZE];
    cell[..LEAF_NODE_KEY_SIZE].copy_from_slice(&key.to_le_bytes());
    row.serialize(&mut cell[LEAF_NODE_VALUE_OFFSET..]);
    cell
}

/// Write encoded cells from slot 0 onward and set the cell count.
pub fn write_leaf_cells(page: &mut Page, cells: &[Vec<u8>]) {
    assert!(
        cells.len() <= LEAF_NODE_MAX_CELLS as usize,
        "BUG: {} cells do not fit in a leaf",
        cells.len()
    );
    for (i, cell) in cells.iter().enumerate() {
        leaf_cell_mut(page, i as u32).copy_from_slice(cell);
    }
    set_leaf_num_cells(page, cells.len() as u32);
}

/// Insert a cell at `cell_num`, shifting later cells one slot right.
/// The leaf must have a free slot.
pub fn leaf_insert_cell(page: &mut Page, cell_num: u32, key: u32, row: &Row) {
    let num_cells = leaf_num_cells(page);
    assert!(
        num_cells < LEAF_NODE_MAX_CELLS && cell_num <= num_cells,
        "BUG: leaf insert at {} with {} cells",
        cell_num,
        num_cells
    );
    let start = LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE;
    let end = LEAF_NODE_HEADER_SIZE + num_cells as usize * LEAF_NODE_CELL_SIZE;
    page.data
        .copy_within(start..end, start + LEAF_NODE_CELL_SIZE);
    set_leaf_cell(page, cell_num, key, row);
    set_leaf_num_cells(page, num_cells + 1);
}

/// Largest key in a leaf, if any.
pub fn leaf_max_key(page: &Page) -> Option<u32> {
    match leaf_num_cells(page) {
        0 => None,
        n => Some(leaf_key(page, n - 1)),
    }
}

/// Binary search for `key` among the leaf's cells.
pub fn leaf_find(page: &Page, key: u32) -> FindResult {
    let mut min = 0u32;
    let mut max = leaf_num_cells(page);
    while min != max {
        let mid = min + (max - min) / 2;
        let mid_key = leaf_key(page, mid);
        match key.cmp(&mid_key) {
            std::cmp::Ordering::Equal => {
                return FindResult {
                    cell_num: mid,
                    is_duplicate: true,
                }
            }
            std::cmp::Ordering::Greater => min = mid + 1,
            std::cmp::Ordering::Less => max = mid,
        }
    }
    FindResult {
        cell_num: min,
        is_duplicate: false,
    }
}

/// Count live cells by scanning for the first all-zero row. Unused slots are
/// always zero on disk, so this is the authoritative count after a reload.
pub fn leaf_live_cells(page: &Page) -> u32 {
    assert_leaf(page);
    (0..LEAF_NODE_MAX_CELLS)
        .take_while(|&i| leaf_value(page, i).iter().any(|&b| b != 0))
        .count() as u32
}

// --- Internal node operations ---

/// Reset a page to an empty, non-root internal node.
pub fn init_internal(page: &mut Page) {
    page.data.fill(0);
    set_node_type(page, NodeType::Internal);
    set_is_root(page, false);
    set_internal_num_keys(page, 0);
}

pub fn internal_num_keys(page: &Page) -> u32 {
    assert_internal(page);
    page.read_u32(INTERNAL_NODE_NUM_KEYS_OFFSET)
}

pub fn set_internal_num_keys(page: &mut Page, num_keys: u32) {
    assert_internal(page);
    page.write_u32(INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
}

fn internal_cell_offset(cell_num: u32) -> usize {
    assert!(
        cell_num < INTERNAL_NODE_MAX_KEYS,
        "BUG: internal cell {} out of range",
        cell_num
    );
    INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE
}

pub fn internal_key(page: &Page, key_num: u32) -> u32 {
    assert_internal(page);
    page.read_u32(internal_cell_offset(key_num))
}

pub fn internal_set_key(page: &mut Page, key_num: u32, key: u32) {
    assert_internal(page);
    page.write_u32(internal_cell_offset(key_num), key);
}

fn to_page_num(raw: u64) -> Result<PageNum> {
    PageNum::try_from(raw).map_err(|_| {
        PageDbError::FormatViolation(format!("child page number {} out of range", raw))
    })
}

pub fn internal_right_child(page: &Page) -> Result<PageNum> {
    assert_internal(page);
    to_page_num(page.read_u64(INTERNAL_NODE_RIGHT_CHILD_OFFSET))
}

pub fn set_internal_right_child(page: &mut Page, child: PageNum) {
    assert_internal(page);
    page.write_u64(INTERNAL_NODE_RIGHT_CHILD_OFFSET, u64::from(child));
}

/// Child `child_num` for `0..=num_keys`; index `num_keys` is the right child.
pub fn internal_child(page: &Page, child_num: u32) -> Result<PageNum> {
    let num_keys = internal_num_keys(page);
    assert!(
        child_num <= num_keys,
        "BUG: child {} requested from node with {} keys",
        child_num,
        num_keys
    );
    if child_num == num_keys {
        internal_right_child(page)
    } else {
        let offset = internal_cell_offset(child_num) + INTERNAL_NODE_KEY_SIZE;
        to_page_num(page.read_u64(offset))
    }
}

pub fn internal_set_child(page: &mut Page, child_num: u32, child: PageNum) {
    let num_keys = internal_num_keys(page);
    if child_num == num_keys {
        set_internal_right_child(page, child);
    } else {
        let offset = internal_cell_offset(child_num) + INTERNAL_NODE_KEY_SIZE;
        page.write_u64(offset, u64::from(child));
    }
}

/// Append a `{key, child}` cell after the existing ones. The caller keeps
/// keys ascending and the right child in place.
pub fn internal_append_child(page: &mut Page, key: u32, child: PageNum) {
    let num_keys = internal_num_keys(page);
    let offset = internal_cell_offset(num_keys);
    page.write_u32(offset, key);
    page.write_u64(offset + INTERNAL_NODE_KEY_SIZE, u64::from(child));
    set_internal_num_keys(page, num_keys + 1);
}

/// Index of the child whose subtree may contain `key`: the first key that is
/// `>= key`, or the right child when every key is smaller.
pub fn internal_find_child(page: &Page, key: u32) -> u32 {
    let mut min = 0u32;
    let mut max = internal_num_keys(page);
    while min != max {
        let mid = min + (max - min) / 2;
        if internal_key(page, mid) >= key {
            max = mid;
        } else {
            min = mid + 1;
        }
    }
    min
}

/// All children in order, right child last.
pub fn internal_children(page: &Page) -> Result<Vec<PageNum>> {
    let num_keys = internal_num_keys(page);
    (0..=num_keys).map(|i| internal_child(page, i)).collect()
}

/// Fill a freshly initialized internal node from parallel key/child lists.
/// `children` has one more entry than `keys`; the last one becomes the right child.
pub fn write_internal_cells(page: &mut Page, keys: &[u32], children: &[PageNum]) {
    assert!(
        children.len() == keys.len() + 1,
        "BUG: {} keys need {} children, got {}",
        keys.len(),
        keys.len() + 1,
        children.len()
    );
    for (&key, &child) in keys.iter().zip(children) {
        internal_append_child(page, key, child);
    }
    set_internal_right_child(page, children[keys.len()]);
}

/// All keys in order.
pub fn internal_keys(page: &Page) -> Vec<u32> {
    let num_keys = internal_num_keys(page);
    (0..num_keys).map(|i| internal_key(page, i)).collect()
}
