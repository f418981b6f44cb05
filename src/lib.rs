//! PageDB: single-file embedded record store.
//!
//! A fixed-schema table of `(id, username, email)` rows kept as a paged
//! B-tree:
//! - 4096-byte pages, one B-tree node per page, page 0 is always the root
//! - write-through pager with a configurable page ceiling
//! - ordered scans through a cursor, point lookups by id
//! - a small line-oriented command interpreter (`insert`, `select`, `.btree`)

pub mod error;
pub mod types;
pub mod config;
pub mod storage;
pub mod btree;
pub mod table;
pub mod command;

pub use crate::config::TableConfig;
pub use crate::error::{PageDbError, Result};
pub use crate::table::Table;
pub use crate::types::Row;
