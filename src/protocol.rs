//! Command grammar and shared wire constants.
//!
//! One parser serves both sides: the client validates a line before it
//! crosses the wire, the server re-validates authoritatively on receipt.

use chrono::NaiveDate;

use crate::error::CommandError;

/// Default server port.
pub const DEFAULT_PORT: u16 = 12347;

/// Trailing marker appended to binary payloads under legacy framing.
pub const EOF_MARKER: &[u8; 3] = b"EOF";

/// Size of the big-endian length prefix under default framing.
pub const LEN_PREFIX_BYTES: usize = 8;

/// Upper bound on archive payloads a client will accept (8 GiB) -
/// prevents memory exhaustion from a bogus length prefix.
pub const MAX_ARCHIVE_BYTES: u64 = 8 * 1024 * 1024 * 1024;

/// Longest command line the server will accept.
pub const MAX_LINE_BYTES: usize = 4096;

/// Ordering for `dirlist`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Lexicographic by name (`dirlist -a`)
    Name,
    /// Creation time ascending (`dirlist -t`)
    CreationTime,
}

/// A parsed, validated command. Invalid input never constructs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DirList(SortOrder),
    FindByName(String),
    FindBySize { min: u64, max: u64 },
    FindByType(Vec<String>),
    FindByDate { boundary: NaiveDate, before: bool },
    Quit,
}

impl Command {
    /// Parse one newline-terminated command line.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let line = line.trim_end_matches(['\r', '\n']).trim();
        let (verb, rest) = match line.split_once(' ') {
            Some((v, r)) => (v, r.trim()),
            None => (line, ""),
        };

        match verb {
            "quitc" => Ok(Command::Quit),
            "dirlist" => match rest {
                "-a" => Ok(Command::DirList(SortOrder::Name)),
                "-t" => Ok(Command::DirList(SortOrder::CreationTime)),
                _ => Err(CommandError::BadSortOrder),
            },
            "w24fn" => {
                if rest.is_empty() {
                    return Err(CommandError::EmptyFilename);
                }
                Ok(Command::FindByName(rest.to_string()))
            }
            "w24fz" => parse_size_range(rest),
            "w24ft" => parse_extensions(rest),
            "w24fdb" => Ok(Command::FindByDate {
                boundary: parse_date(rest)?,
                before: true,
            }),
            "w24fda" => Ok(Command::FindByDate {
                boundary: parse_date(rest)?,
                before: false,
            }),
            _ => Err(CommandError::UnknownVerb),
        }
    }

    /// Short verb name for logs.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::DirList(_) => "dirlist",
            Command::FindByName(_) => "w24fn",
            Command::FindBySize { .. } => "w24fz",
            Command::FindByType(_) => "w24ft",
            Command::FindByDate { before: true, .. } => "w24fdb",
            Command::FindByDate { before: false, .. } => "w24fda",
            Command::Quit => "quitc",
        }
    }
}

fn parse_size_range(rest: &str) -> Result<Command, CommandError> {
    let mut parts = rest.split_whitespace();
    let (min, max) = match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => (a, b),
        _ => return Err(CommandError::BadSizeFormat),
    };
    // u64 parsing rejects signs, so negatives fail the format check
    let min: u64 = min.parse().map_err(|_| CommandError::BadSizeFormat)?;
    let max: u64 = max.parse().map_err(|_| CommandError::BadSizeFormat)?;
    if min > max {
        return Err(CommandError::BadSizeRange);
    }
    Ok(Command::FindBySize { min, max })
}

fn parse_extensions(rest: &str) -> Result<Command, CommandError> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() > 3 {
        return Err(CommandError::BadExtensions);
    }
    for tok in &tokens {
        let mut chars = tok.chars();
        let leads_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        if !leads_alpha || !chars.all(|c| c.is_ascii_alphanumeric()) {
            return Err(CommandError::BadExtensions);
        }
    }
    Ok(Command::FindByType(
        tokens.into_iter().map(str::to_string).collect(),
    ))
}

fn parse_date(rest: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(rest, "%Y-%m-%d").map_err(|_| CommandError::BadDate)
}
