use tracing::{debug, info};

use crate::btree::cursor::Cursor;
use crate::btree::node::{
    check_header, internal_children, is_root, leaf_live_cells, parent, set_leaf_num_cells,
    NodeType,
};
use crate::btree::ops::BTree;
use crate::config::TableConfig;
use crate::error::{PageDbError, Result};
use crate::storage::page::{Page, PageNum};
use crate::storage::pager::Pager;
use crate::types::Row;

/// Root page number. The file has no header, so the root is pinned here and
/// root promotion rewrites this page in place.
const ROOT_PAGE_NUM: PageNum = 0;

/// A single fixed-schema table stored as a B-tree in one file.
pub struct Table {
    pub(crate) pager: Pager,
    pub(crate) btree: BTree,
    config: TableConfig,
}

impl Table {
    /// Open the table at `config.path`, creating the file if needed.
    ///
    /// Existing pages are loaded and checked; each leaf's cell count is
    /// recomputed from its rows, so an all-zero row always ends a leaf.
    pub fn open(config: TableConfig) -> Result<Self> {
        config.validate()?;
        let mut pager = Pager::open(&config.path, config.max_pages)?;

        let btree = if pager.num_pages() == 0 {
            BTree::create(&mut pager, config.internal_max_keys)?
        } else {
            let num_pages = pager.num_pages();
            for page_num in 0..num_pages {
                let page = pager.get_page(page_num)?;
                let kind = check_header(page)?;
                if !is_root(page) && parent(page) >= num_pages {
                    return Err(dangling(page_num, "parent", parent(page)));
                }
                match kind {
                    NodeType::Leaf => {
                        let live = leaf_live_cells(page);
                        set_leaf_num_cells(page, live);
                        debug!(page_num, cells = live, "recounted leaf");
                    }
                    NodeType::Internal => {
                        for child in internal_children(page)? {
                            if child >= num_pages || child == page_num {
                                return Err(dangling(page_num, "child", child));
                            }
                        }
                    }
                }
            }
            if !is_root(pager.get_page(ROOT_PAGE_NUM)?) {
                return Err(PageDbError::FormatViolation(
                    "page 0 is not marked as the root".into(),
                ));
            }
            BTree::new(ROOT_PAGE_NUM, config.internal_max_keys)
        };

        info!(
            path = %config.path.display(),
            pages = pager.num_pages(),
            "opened table"
        );
        Ok(Table {
            pager,
            btree,
            config,
        })
    }

    /// Flush everything and release the file.
    pub fn close(mut self) -> Result<()> {
        self.pager.flush_all()?;
        info!(path = %self.config.path.display(), "closed table");
        Ok(())
    }

    /// Insert a row. Rejects duplicate ids and a full table without
    /// changing anything.
    pub fn insert(&mut self, row: &Row) -> Result<()> {
        self.btree.insert(&mut self.pager, row)
    }

    /// Cursor at the cell holding `key`, or where it would be inserted.
    pub fn find(&mut self, key: u32) -> Result<Cursor<'_>> {
        let (page_num, slot) = self.btree.find(&mut self.pager, key)?;
        Ok(Cursor::new(self, page_num, slot.cell_num, false))
    }

    /// Point lookup by id.
    pub fn get(&mut self, key: u32) -> Result<Option<Row>> {
        self.btree.search(&mut self.pager, key)
    }

    /// Cursor at the first row in key order.
    pub fn start(&mut self) -> Result<Cursor<'_>> {
        let root = self.btree.root_page_num();
        let leaf = self.btree.leftmost_leaf(&mut self.pager, root)?;
        let mut cursor = Cursor::new(self, leaf, 0, false);
        cursor.skip_empty_leaves()?;
        Ok(cursor)
    }

    /// A cursor flagged end-of-table.
    pub fn end(&mut self) -> Cursor<'_> {
        let root = self.btree.root_page_num();
        Cursor::new(self, root, 0, true)
    }

    /// Full scan in key order.
    pub fn rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut cursor = self.start()?;
        while !cursor.is_end() {
            if let Some(row) = cursor.value()? {
                rows.push(row);
            }
            cursor.advance()?;
        }
        Ok(rows)
    }

    /// Text dump of the tree structure.
    pub fn render_tree(&mut self) -> Result<String> {
        self.btree.render(&mut self.pager)
    }

    /// Read-only view of a page, for inspection.
    pub fn page(&mut self, page_num: PageNum) -> Result<&Page> {
        let page: &Page = self.pager.get_page(page_num)?;
        Ok(page)
    }

    pub fn root_page_num(&self) -> PageNum {
        self.btree.root_page_num()
    }

    pub fn num_pages(&self) -> u32 {
        self.pager.num_pages()
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }
}

fn dangling(page_num: PageNum, link: &str, target: PageNum) -> PageDbError {
    PageDbError::FormatViolation(format!(
        "page {} has {} pointer {} outside the file",
        page_num, link, target
    ))
}
