/// Command parser using nom. One command per line, words separated by whitespace.
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, opt, recognize},
    multi::many0,
    sequence::{pair, preceded, terminated},
    IResult,
};

use crate::error::{PageDbError, Result};
use crate::types::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Meta(MetaCommand),
    Statement(Statement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Exit,
    Btree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

/// Parse one input line.
pub fn parse(line: &str) -> Result<Command> {
    let input = line.trim();
    if input.is_empty() {
        return Err(PageDbError::Parse("empty command".into()));
    }
    if input.starts_with('.') {
        return parse_meta(input);
    }

    let words = tokenize(input)?;
    match words.as_slice() {
        ["insert", args @ ..] => {
            parse_insert(args).map(|row| Command::Statement(Statement::Insert(row)))
        }
        ["select"] | ["print"] => Ok(Command::Statement(Statement::Select)),
        _ => Err(unrecognized(input)),
    }
}

fn parse_meta(input: &str) -> Result<Command> {
    match input {
        ".exit" => Ok(Command::Meta(MetaCommand::Exit)),
        ".btree" => Ok(Command::Meta(MetaCommand::Btree)),
        _ => Err(unrecognized(input)),
    }
}

fn parse_insert(args: &[&str]) -> Result<Row> {
    match args {
        [id, username, email] => Row::new(parse_id(id)?, *username, *email),
        [_, _, _, ..] => Err(PageDbError::Parse("too many arguments".into())),
        _ => Err(PageDbError::Parse("not enough arguments".into())),
    }
}

/// Ids are positive integers that fit in 32 bits. A leading minus sign is
/// accepted by the grammar so that negative ids get a precise error.
fn parse_id(token: &str) -> Result<u32> {
    let (_, digits) = all_consuming(integer)(token)
        .map_err(|_| PageDbError::Parse(format!("invalid id '{}'", token)))?;
    let id: i64 = digits
        .parse()
        .map_err(|_| PageDbError::Parse(format!("id '{}' out of range", token)))?;
    if id <= 0 {
        return Err(PageDbError::InvalidId);
    }
    u32::try_from(id).map_err(|_| PageDbError::Parse(format!("id '{}' out of range", token)))
}

fn tokenize(input: &str) -> Result<Vec<&str>> {
    let (_, words) = all_consuming(terminated(many0(word), multispace0))(input)
        .map_err(|e| PageDbError::Parse(format!("cannot tokenize '{}': {}", input, e)))?;
    Ok(words)
}

fn word(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, take_while1(|c: char| !c.is_whitespace()))(input)
}

fn integer(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(char('-')), digit1))(input)
}

fn unrecognized(input: &str) -> PageDbError {
    PageDbError::Parse(format!("unrecognized command '{}'", input))
}
