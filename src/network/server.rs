//! WebSocket Server
//!
//! Accepts connections and hands each one to its own task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};

use crate::config::Config;
use crate::error::{ChunkpadError, Result};
use crate::session::Registry;

use super::Connection;

/// WebSocket server for Chunkpad
pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
    failures: mpsc::UnboundedReceiver<ChunkpadError>,
    connection_slots: Arc<Semaphore>,
}

impl Server {
    /// Bind the listen address and set up the session registry
    pub async fn bind(config: Config) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr).await?;
        let (failure_sink, failures) = mpsc::unbounded_channel();
        let connection_slots = Arc::new(Semaphore::new(config.max_connections));
        let registry = Arc::new(Registry::new(config, failure_sink));

        Ok(Self {
            listener,
            registry,
            failures,
            connection_slots,
        })
    }

    /// Address actually bound (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Registry shared with every connection
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until a fatal storage failure
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Listening on {}", self.local_addr()?);
        let reclaimer = self.registry.spawn_reclaimer();

        let failure = loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!("Accept failed: {}", e);
                            continue;
                        }
                    };

                    let Ok(slot) = Arc::clone(&self.connection_slots).try_acquire_owned() else {
                        tracing::warn!("Connection limit reached, refusing {}", peer_addr);
                        continue;
                    };

                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        let _slot = slot;
                        let outcome = match Connection::accept(stream, peer_addr, Arc::clone(&registry)).await {
                            Ok(connection) => connection.handle().await,
                            Err(e) => Err(e),
                        };
                        match outcome {
                            Ok(()) => {}
                            Err(e) if e.is_fatal() => registry.report_failure(e),
                            Err(e) => tracing::debug!("Connection from {} ended: {}", peer_addr, e),
                        }
                    });
                }

                failure = self.failures.recv() => {
                    break failure;
                }
            }
        };

        reclaimer.abort();
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
