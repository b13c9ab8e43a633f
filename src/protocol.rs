//! Voting line protocol parser and response generator.
//!
//! One request line per connection:
//! - `list`: report every option and its count
//! - `vote <option>`: add one vote for `<option>`
//!
//! The command word is case-insensitive, tokens are whitespace-delimited,
//! and anything after the option token is ignored. Responses are one or
//! more `\n`-terminated lines, after which the server closes the connection.

use crate::error::{ParseError, StoreError};
use bytes::BytesMut;
use std::fmt;

/// Longest request line the server reads before parsing what it has.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Parsed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Report the full tally
    List,
    /// Add one vote for an option
    Vote { option: String },
}

/// Request kind as recorded in the request log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    List,
    Vote,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::List => "list",
            RequestKind::Vote => "vote",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Request {
    /// Parse one request line. Trailing line endings are tolerated.
    pub fn parse(line: &str) -> Result<Request, ParseError> {
        let mut tokens = line.split_whitespace();

        let command = tokens.next().ok_or(ParseError::EmptyRequest)?;

        if command.eq_ignore_ascii_case("list") {
            Ok(Request::List)
        } else if command.eq_ignore_ascii_case("vote") {
            let option = tokens.next().ok_or(ParseError::MissingArgument)?;
            Ok(Request::Vote {
                option: option.to_string(),
            })
        } else {
            Err(ParseError::UnknownCommand)
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Request::List => RequestKind::List,
            Request::Vote { .. } => RequestKind::Vote,
        }
    }

    /// Encode as a request line, used by the client.
    pub fn encode(&self) -> BytesMut {
        let mut line = BytesMut::new();
        match self {
            Request::List => line.extend_from_slice(b"list\n"),
            Request::Vote { option } => {
                line.extend_from_slice(b"vote ");
                line.extend_from_slice(option.as_bytes());
                line.extend_from_slice(b"\n");
            }
        }
        line
    }
}

/// Server response to a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Every option with its count
    Tally(Vec<(String, u64)>),
    /// A vote was counted
    Voted { option: String },
    /// The vote named an option the server does not know
    Rejected(StoreError),
    /// The request line could not be parsed
    Malformed(ParseError),
}

impl Response {
    /// Render the response as the bytes written to the client.
    pub fn encode(&self) -> BytesMut {
        let mut response = BytesMut::new();
        match self {
            Response::Tally(entries) => {
                for (option, count) in entries {
                    response.extend_from_slice(
                        format!("'{option}' has {count} vote(s).\n").as_bytes(),
                    );
                }
                // The tally block is terminated by an empty line
                response.extend_from_slice(b"\n");
            }
            Response::Voted { option } => {
                response.extend_from_slice(
                    format!("Incremented the number of votes for '{option}'.\n").as_bytes(),
                );
            }
            Response::Rejected(e) => Self::error_line(&mut response, e),
            Response::Malformed(e) => Self::error_line(&mut response, e),
        }
        response
    }

    fn error_line(response: &mut BytesMut, error: &dyn fmt::Display) {
        response.extend_from_slice(format!("Error: {error}\n").as_bytes());
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Rejected(_) | Response::Malformed(_))
    }
}
