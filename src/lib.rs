//! tally-server: a line-protocol voting server
//!
//! Clients connect over TCP and send a single request line:
//! - `list`: every configured option with its current count
//! - `vote <option>`: add one vote for an option
//!
//! Features:
//! - Fixed option set chosen at startup, tallied in memory
//! - Fixed-size worker pool with unbounded queuing of accepted connections
//! - Append-only request log of every request that was acted upon
//! - Configuration via CLI arguments or TOML file

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod request_log;
pub mod server;
pub mod store;

pub use config::Config;
pub use handler::ConnectionHandler;
pub use request_log::RequestLog;
pub use server::{Server, WorkerPool};
pub use store::VoteStore;
