/// Cursor: a (page, cell) position in the table's leaves.
///
/// A cursor borrows the table mutably, so the tree cannot change while it is
/// alive. Walking crosses from one leaf to the next through parent pointers.
use crate::btree::node::{leaf_key, leaf_num_cells, leaf_row};
use crate::error::Result;
use crate::storage::page::PageNum;
use crate::table::Table;
use crate::types::Row;

pub struct Cursor<'a> {
    table: &'a mut Table,
    page_num: PageNum,
    cell_num: u32,
    end_of_table: bool,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(
        table: &'a mut Table,
        page_num: PageNum,
        cell_num: u32,
        end_of_table: bool,
    ) -> Self {
        Cursor {
            table,
            page_num,
            cell_num,
            end_of_table,
        }
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    pub fn cell_num(&self) -> u32 {
        self.cell_num
    }

    pub fn is_end(&self) -> bool {
        self.end_of_table
    }

    /// Row under the cursor, or `None` at end of table or past the last cell
    /// of the leaf (an insertion point).
    pub fn value(&mut self) -> Result<Option<Row>> {
        if self.end_of_table {
            return Ok(None);
        }
        let page = self.table.pager.get_page(self.page_num)?;
        if self.cell_num >= leaf_num_cells(page) {
            return Ok(None);
        }
        Ok(Some(leaf_row(page, self.cell_num)))
    }

    /// Key under the cursor, with the same rules as `value`.
    pub fn key(&mut self) -> Result<Option<u32>> {
        if self.end_of_table {
            return Ok(None);
        }
        let page = self.table.pager.get_page(self.page_num)?;
        if self.cell_num >= leaf_num_cells(page) {
            return Ok(None);
        }
        Ok(Some(leaf_key(page, self.cell_num)))
    }

    /// Step to the next cell, moving to the next leaf when this one is done.
    pub fn advance(&mut self) -> Result<()> {
        assert!(
            !self.end_of_table,
            "BUG: advancing a cursor that is already at end of table"
        );
        self.cell_num += 1;
        self.skip_empty_leaves()
    }

    /// While the cursor sits past the last cell of its leaf, move to the
    /// start of the next leaf, or flag end of table.
    pub(crate) fn skip_empty_leaves(&mut self) -> Result<()> {
        loop {
            let num_cells = leaf_num_cells(self.table.pager.get_page(self.page_num)?);
            if self.cell_num < num_cells {
                return Ok(());
            }
            match self
                .table
                .btree
                .next_leaf(&mut self.table.pager, self.page_num)?
            {
                Some(next) => {
                    self.page_num = next;
                    self.cell_num = 0;
                }
                None => {
                    self.end_of_table = true;
                    return Ok(());
                }
            }
        }
    }
}
