//! TCP listener and worker pool.
//!
//! The accept loop never waits on workers: every accepted connection is
//! queued on the pool, which serves at most `workers` connections at once
//! and holds the rest until a worker frees up.

use crate::config::Config;
use crate::handler::{outcome, ConnectionHandler};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Bounded concurrency, unbounded queue.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Workers not currently serving a connection
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Queue `job` to run once a worker is free. Waiting jobs are served in
    /// the order they were submitted.
    pub fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // The semaphore is never closed, so acquiring only waits
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            job.await;
        });
    }
}

/// Server instance
pub struct Server {
    listener: TcpListener,
    handler: ConnectionHandler,
    pool: WorkerPool,
}

impl Server {
    /// Bind the listening socket. Fails immediately if the address is taken.
    pub async fn bind(config: &Config, handler: ConnectionHandler) -> io::Result<Self> {
        let listener = TcpListener::bind(config.listen.as_str()).await?;
        info!(
            address = %listener.local_addr()?,
            workers = config.workers,
            "Server listening"
        );

        Ok(Server {
            listener,
            handler,
            pool: WorkerPool::new(config.workers),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// Connections already handed to the pool keep running after the
    /// accept loop stops.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            handler,
            pool,
        } = self;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(votes = handler.store().total(), "Server shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => dispatch(&pool, &handler, stream, peer),
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                }
            }
        }
    }

    /// Run until the process receives Ctrl-C.
    pub async fn run_until_ctrl_c(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to install Ctrl-C handler");
                // Without a signal handler the server runs until killed
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

fn dispatch(pool: &WorkerPool, handler: &ConnectionHandler, stream: TcpStream, peer: SocketAddr) {
    debug!(peer = %peer, idle_workers = pool.idle(), "New connection");

    let handler = handler.clone();
    pool.submit(async move {
        match handler.handle(stream, peer).await {
            Ok(response) => {
                debug!(peer = %peer, request = ?outcome(&response), "Request served")
            }
            Err(e) => warn!(peer = %peer, error = %e, "Connection error"),
        }
    });
}
