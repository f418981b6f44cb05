//! Table configuration.
//!
//! Everything `Table::open` needs is passed in explicitly; there is no
//! process-wide default path.
//!
//! # Invariants
//!
//! - `max_pages >= 1`
//! - `2 <= internal_max_keys <= INTERNAL_NODE_MAX_KEYS`

use std::path::PathBuf;

use crate::btree::node::INTERNAL_NODE_MAX_KEYS;
use crate::error::{PageDbError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Backing file. Created on first open.
    pub path: PathBuf,
    /// Ceiling on the number of pages in the file (and in memory).
    pub max_pages: u32,
    /// Keys an internal node may hold before it splits. Defaults to what
    /// physically fits in a page; tests lower it to grow deep trees cheaply.
    pub internal_max_keys: u32,
}

impl TableConfig {
    /// Default page ceiling.
    pub const DEFAULT_MAX_PAGES: u32 = 31;
    /// Default database file.
    pub const DEFAULT_PATH: &'static str = "data.db";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        TableConfig {
            path: path.into(),
            max_pages: Self::DEFAULT_MAX_PAGES,
            internal_max_keys: INTERNAL_NODE_MAX_KEYS,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_internal_max_keys(mut self, internal_max_keys: u32) -> Self {
        self.internal_max_keys = internal_max_keys;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(PageDbError::InvalidConfig(
                "max_pages must be at least 1".into(),
            ));
        }
        if !(2..=INTERNAL_NODE_MAX_KEYS).contains(&self.internal_max_keys) {
            return Err(PageDbError::InvalidConfig(format!(
                "internal_max_keys must be between 2 and {}, got {}",
                INTERNAL_NODE_MAX_KEYS, self.internal_max_keys
            )));
        }
        Ok(())
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}
