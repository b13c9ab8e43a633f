//! Error types shared across the server and client.
//!
//! Each failure domain gets its own enum so the connection handler can
//! decide locally what reaches the client and what stays on the operator
//! stream.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal startup errors. The process exits with status 1 when one of these
/// reaches `main`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("At least two voting options are required (got {0})")]
    TooFewOptions(usize),

    #[error("Invalid voting option '{0}': options must be single non-empty words")]
    InvalidOption(String),

    #[error("Worker pool size must be at least 1")]
    NoWorkers,
}

/// Tally lookups that name an option the server was not started with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Option '{0}' does not exist.")]
    UnknownOption(String),
}

/// Request lines the protocol cannot turn into a request.
///
/// The `Display` text is exactly what the client sees after `Error: `.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Received empty request.")]
    EmptyRequest,

    #[error("Invalid command. Please use 'list' or 'vote <option>'.")]
    UnknownCommand,

    #[error("Missing voting option. Usage: vote <option>")]
    MissingArgument,
}

/// Per-connection failures. Logged by the worker, never propagated further.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for request line")]
    ReadTimeout,
}

/// Client-side failures. All of them map to exit status 1.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Unknown host {host}. {source}")]
    UnknownHost {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to connect to {server}. {source}")]
    Connect {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),
}
