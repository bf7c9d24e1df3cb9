use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::{OwnedSemaphorePermit, Semaphore},
    task::{JoinError, JoinSet},
};
use tracing::Instrument;

use crate::{client, ledger::Collector, protocol::connection::Connection, stats::Statistics};

pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// pause after a failed accept, e.g. when the process ran out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// closes a booth connection that stays silent for this long
    pub read_timeout: Option<Duration>,
    /// connections above this limit wait to be accepted
    pub max_connections: usize,
    /// how long open connections may keep running after shutdown was requested
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

pub struct Server {
    listener: TcpListener,
    collector: Collector,
    config: ServerConfig,
}

impl Server {
    pub fn new(listener: TcpListener, collector: Collector, config: ServerConfig) -> Self {
        Self {
            listener,
            collector,
            config,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn collector(&self) -> Collector {
        self.collector.clone()
    }

    /// Accepts booths until `shutdown` resolves
    ///
    /// every booth is served by its own task. once shutdown is requested no new
    /// booths are accepted, and the open connections are given the grace period
    /// to finish before they are aborted.
    ///
    /// returns the statistics at the time the server stopped
    pub async fn run_until<F>(self, shutdown: F) -> Statistics
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            collector,
            config,
        } = self;
        let slots = Arc::new(Semaphore::new(config.max_connections.max(1)));
        let mut handlers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => break,
                Some(result) = handlers.join_next() => report_handler(result),
                permit = slots.clone().acquire_owned() => {
                    // the semaphore is never closed
                    let Ok(permit) = permit else { break };

                    select! {
                        _ = &mut shutdown => break,
                        Some(result) = handlers.join_next() => report_handler(result),
                        accepted = listener.accept() => match accepted {
                            Ok((stream, peer)) => {
                                spawn_handler(
                                    &mut handlers,
                                    stream,
                                    peer,
                                    permit,
                                    &collector,
                                    &config,
                                );
                                tracing::info!(
                                    %peer,
                                    active = handlers.len(),
                                    "accepted a new connection"
                                );
                            }
                            Err(err) => accept_failed(&err).await,
                        },
                    }
                }
            }
        }

        // stop accepting new booths
        drop(listener);
        tracing::info!(
            active = handlers.len(),
            "shutting down, waiting for open connections"
        );

        let drain = async {
            while let Some(result) = handlers.join_next().await {
                report_handler(result);
            }
        };
        let drained = tokio::time::timeout(config.shutdown_grace, drain).await;
        if drained.is_err() {
            tracing::warn!(
                remaining = handlers.len(),
                "grace period is over, aborting open connections"
            );
            handlers.shutdown().await;
        }

        let stats = collector.snapshot();
        tracing::info!("server stopped, {}", stats);
        stats
    }

    pub async fn run_until_ctrl_c(self) -> Statistics {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn spawn_handler(
    handlers: &mut JoinSet<()>,
    stream: TcpStream,
    peer: SocketAddr,
    permit: OwnedSemaphorePermit,
    collector: &Collector,
    config: &ServerConfig,
) {
    let conn = Connection::new(stream).with_read_timeout(config.read_timeout);
    let collector = collector.clone();

    let span = tracing::info_span!("booth", %peer);
    handlers.spawn(
        async move {
            // hold the slot for as long as the booth is connected
            let _permit = permit;

            match client::handle(conn, collector).await {
                Ok(()) => tracing::info!("connection closed"),
                Err(err) => tracing::warn!(error = %err, "connection closed with an error"),
            }
        }
        .instrument(span),
    );
}

async fn accept_failed(err: &std::io::Error) {
    tracing::warn!(error = %err, "failed to accept a connection");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

fn report_handler(result: Result<(), JoinError>) {
    if let Err(err) = result {
        if err.is_panic() {
            tracing::error!(error = %err, "connection handler panicked");
        }
    }
}
