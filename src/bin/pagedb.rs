use std::path::PathBuf;
use std::process;

use clap::Parser;
use pagedb::command::{run, ExecResult};
use pagedb::btree::node::INTERNAL_NODE_MAX_KEYS;
use pagedb::{PageDbError, Table, TableConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pagedb", about = "pagedb - single-table embedded B-tree store")]
struct Cli {
    /// Path to the database file
    #[arg(default_value = TableConfig::DEFAULT_PATH)]
    db_path: PathBuf,

    /// Maximum number of pages the file may hold
    #[arg(long, default_value_t = TableConfig::DEFAULT_MAX_PAGES)]
    max_pages: u32,

    /// Maximum keys per internal node
    #[arg(long, default_value_t = INTERNAL_NODE_MAX_KEYS)]
    internal_max_keys: u32,

    /// Execute one command and exit
    #[arg(short = 'e')]
    execute: Option<String>,
}

enum Outcome {
    Continue,
    Exit,
    Failed,
}

fn format_result(result: &ExecResult) -> Option<String> {
    match result {
        ExecResult::Inserted => Some("Inserted.".to_string()),
        ExecResult::Rows(rows) => {
            if rows.is_empty() {
                return None;
            }
            Some(
                rows.iter()
                    .map(|row| row.to_string())
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
        }
        ExecResult::Tree(tree) => Some(tree.trim_end().to_string()),
        ExecResult::Exit => None,
    }
}

fn execute_line(table: &mut Table, line: &str) -> Outcome {
    match run(table, line) {
        Ok(result) => {
            if let Some(out) = format_result(&result) {
                println!("{}", out);
            }
            match result {
                ExecResult::Exit => Outcome::Exit,
                _ => Outcome::Continue,
            }
        }
        Err(e) if e.is_recoverable() => {
            println!("{}", error_line(&e));
            Outcome::Failed
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    }
}

/// User-facing line for a recoverable error.
fn error_line(e: &PageDbError) -> String {
    match e {
        PageDbError::DuplicateKey(_) => "Error: Duplicate key.".to_string(),
        PageDbError::CapacityExceeded { .. } => "Error: Table full.".to_string(),
        PageDbError::InvalidId => "ID can't be negative or zero.".to_string(),
        PageDbError::UsernameTooLong { .. } => "Error: username too long.".to_string(),
        PageDbError::EmailTooLong { .. } => "Error: email too long.".to_string(),
        other => format!("Error: {}", other),
    }
}

fn run_repl(table: &mut Table) {
    let mut rl = rustyline::DefaultEditor::new().unwrap_or_else(|e| {
        eprintln!("ERROR: Failed to initialize REPL: {}", e);
        process::exit(1);
    });

    loop {
        match rl.readline("(sqlite)> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);
                if let Outcome::Exit = execute_line(table, trimmed) {
                    break;
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!();
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                break;
            }
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "pagedb=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = TableConfig::new(&cli.db_path)
        .with_max_pages(cli.max_pages)
        .with_internal_max_keys(cli.internal_max_keys);

    let mut table = Table::open(config).unwrap_or_else(|e| {
        eprintln!("ERROR: Failed to open {}: {}", cli.db_path.display(), e);
        process::exit(1);
    });

    let failed = match &cli.execute {
        Some(line) => matches!(execute_line(&mut table, line), Outcome::Failed),
        None => {
            run_repl(&mut table);
            false
        }
    };

    if let Err(e) = table.close() {
        eprintln!("ERROR: Failed to close database: {}", e);
        process::exit(1);
    }
    if failed {
        process::exit(1);
    }
}
