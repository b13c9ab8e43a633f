//! tally-server: accept `list` and `vote <option>` requests over TCP and
//! keep an in-memory tally for the options given at startup.

use std::sync::Arc;
use tally_server::{Config, ConnectionHandler, RequestLog, Server, VoteStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        options = ?config.options,
        workers = config.workers,
        request_log = %config.request_log.display(),
        read_timeout_secs = config.read_timeout.map(|t| t.as_secs()),
        "Starting tally server"
    );

    let store = Arc::new(VoteStore::new(config.options.clone())?);
    let log = RequestLog::create(&config.request_log)?;
    let handler = ConnectionHandler::new(store, log, config.read_timeout);

    let server = Server::bind(&config, handler).await?;
    server.run_until_ctrl_c().await;
    Ok(())
}
