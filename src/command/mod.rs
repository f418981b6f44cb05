//! Line-oriented command interpreter over a `Table`.
//!
//! Statements: `insert <id> <username> <email>`, `select` (alias `print`).
//! Meta commands: `.exit`, `.btree`.

pub mod executor;
pub mod parser;

pub use executor::{execute, run, ExecResult};
pub use parser::{parse, Command, MetaCommand, Statement};
