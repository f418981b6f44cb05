use crate::command::parser::{parse, Command, MetaCommand, Statement};
use crate::error::Result;
use crate::table::Table;
use crate::types::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecResult {
    Inserted,
    Rows(Vec<Row>),
    Tree(String),
    Exit,
}

/// Execute a parsed command against the table.
pub fn execute(table: &mut Table, command: Command) -> Result<ExecResult> {
    match command {
        Command::Meta(MetaCommand::Exit) => Ok(ExecResult::Exit),
        Command::Meta(MetaCommand::Btree) => table.render_tree().map(ExecResult::Tree),
        Command::Statement(Statement::Insert(row)) => {
            table.insert(&row)?;
            Ok(ExecResult::Inserted)
        }
        Command::Statement(Statement::Select) => table.rows().map(ExecResult::Rows),
    }
}

/// Parse and execute one input line.
pub fn run(table: &mut Table, line: &str) -> Result<ExecResult> {
    let command = parse(line)?;
    execute(table, command)
}
