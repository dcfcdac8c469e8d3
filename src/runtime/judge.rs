//! Spawnable judge server.
//!
//! Wraps the accept loop used by the `judge` binary so it can be started and
//! stopped programmatically (integration tests bind to port 0).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::judge::{Compiler, Judge, DEFAULT_MAX_REQUEST_BYTES};

/// Configuration for spawning a judge server.
#[derive(Clone)]
pub struct JudgeConfig {
    /// Address to listen on (e.g., "127.0.0.1:0" for automatic port assignment)
    pub listen_addr: SocketAddr,
    /// Compiler every connection hands its unit to.
    pub compiler: Arc<dyn Compiler>,
    /// Cap on the base64 request line.
    pub max_request_bytes: usize,
}

impl JudgeConfig {
    pub fn new(listen_addr: SocketAddr, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            listen_addr,
            compiler,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// Handle to a running judge server.
///
/// When dropped, the server stops accepting connections. Connections already
/// accepted run to completion.
pub struct JudgeHandle {
    /// The address the server is listening on.
    pub addr: SocketAddr,

    shutdown: CancellationToken,
    task: Option<JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>>,
}

impl JudgeHandle {
    pub async fn spawn(config: JudgeConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        let addr = listener.local_addr()?;
        let judge = Arc::new(
            Judge::new(config.compiler).with_max_request_bytes(config.max_request_bytes),
        );
        let shutdown = CancellationToken::new();

        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            info!("Judge shutdown requested");
                            break;
                        }
                        accepted = listener.accept() => {
                            let (stream, peer_addr) = match accepted {
                                Ok(pair) => pair,
                                Err(e) => {
                                    warn!(error = %e, "Accept error");
                                    continue;
                                }
                            };
                            let _ = stream.set_nodelay(true);
                            let judge = Arc::clone(&judge);
                            let span = info_span!("conn", peer_addr = %peer_addr);
                            tokio::spawn(
                                async move {
                                    match judge.serve_stream(stream).await {
                                        Ok(verdict) => tracing::debug!(?verdict, "Connection served"),
                                        Err(e) => warn!(error = %e, "Error handling connection"),
                                    }
                                }
                                .instrument(span),
                            );
                        }
                    }
                }
                Ok(())
            }
        });

        info!(listen_addr = %addr, "Judge listening");

        Ok(Self {
            addr,
            shutdown,
            task: Some(task),
        })
    }

    /// Request graceful shutdown of the judge.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the accept loop to finish.
    pub async fn wait(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Take the task so Drop doesn't try to cancel it
        if let Some(task) = self.task.take() {
            return task.await?;
        }
        Ok(())
    }
}

impl Drop for JudgeHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.shutdown();
        }
    }
}
