//! # TCP Vote Server
//!
//! Accepts vote connections, one task per connection.
//!
//! ## Connection lifecycle
//! 1. Send the `VOTIFIER 2 <challenge>` greeting
//! 2. Decode a single vote (v1 frame or v2 packet) within the connection timeout
//! 3. Hand the vote or the failure to the shared dispatcher
//! 4. Write the reply if there is one, then close
//!
//! Both protocol versions share the listening socket; the codec decides per
//! connection from the first bytes received.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::core::codec::{ModernDecoderFactory, Outbound, VotifierCodec};
use crate::core::session::Session;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{InboundDispatcher, Reply};
use crate::utils::keys::KeyProvider;

type VoteFramed = Framed<TcpStream, VotifierCodec>;

/// Everything a connection task needs, cloned into each task
#[derive(Clone)]
struct ConnectionContext {
    dispatcher: Arc<InboundDispatcher>,
    keys: Arc<dyn KeyProvider>,
    modern: Option<Arc<dyn ModernDecoderFactory>>,
    connection_timeout: Duration,
}

/// Listening vote server
pub struct VoteServer {
    listener: TcpListener,
    context: ConnectionContext,
    max_connections: usize,
    shutdown_timeout: Duration,
}

impl VoteServer {
    /// Bind the listener described by `config`
    #[instrument(skip_all, fields(address = %config.address))]
    pub async fn bind(
        config: &ServerConfig,
        keys: Arc<dyn KeyProvider>,
        dispatcher: Arc<InboundDispatcher>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.address).await?;
        info!(address = %listener.local_addr()?, "Votifier listening");

        Ok(Self {
            listener,
            context: ConnectionContext {
                dispatcher,
                keys,
                modern: None,
                connection_timeout: config.connection_timeout,
            },
            max_connections: config.max_connections,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Accept v2 connections using decoders from `factory`
    pub fn with_modern_decoder(mut self, factory: Arc<dyn ModernDecoderFactory>) -> Self {
        self.context.modern = Some(factory);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until CTRL+C
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_with_shutdown(shutdown_rx).await
    }

    /// Serve until a message arrives on `shutdown_rx` (or its sender is dropped)
    #[instrument(skip_all)]
    pub async fn run_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let limiter = Arc::new(Semaphore::new(self.max_connections));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server. Waiting for connections to close...");
                    self.drain(&limiter).await;
                    return Ok(());
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let Ok(permit) = limiter.clone().try_acquire_owned() else {
                                self.context.dispatcher.metrics().connection_refused();
                                warn!(peer = %peer, max = self.max_connections, "Connection limit reached, refusing");
                                drop(stream);
                                continue;
                            };

                            let context = self.context.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, peer, context).await;
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }
    }

    /// Wait for in-flight connections, up to the shutdown timeout
    async fn drain(&self, limiter: &Semaphore) {
        let timeout = tokio::time::sleep(self.shutdown_timeout);
        tokio::pin!(timeout);

        loop {
            let active = self.max_connections - limiter.available_permits();
            if active == 0 {
                info!("All connections closed, shutting down");
                return;
            }

            tokio::select! {
                _ = &mut timeout => {
                    warn!(connections = active, "Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    debug!(connections = active, "Waiting for connections to close");
                }
            }
        }
    }
}

#[instrument(skip(stream, context), fields(remote = %peer))]
async fn handle_connection(stream: TcpStream, peer: SocketAddr, context: ConnectionContext) {
    let metrics = context.dispatcher.metrics().clone();
    metrics.connection_established();

    let remote = peer.to_string();
    let mut session = Session::with_random_challenge();
    let codec = VotifierCodec::new(context.keys.clone(), remote.clone(), session.challenge())
        .with_modern_decoder(context.modern.clone());
    let mut framed = Framed::new(stream, codec);

    serve_vote(&mut framed, &mut session, &context, &remote).await;

    metrics.connection_closed();
    debug!("Connection closed");
}

async fn serve_vote(
    framed: &mut VoteFramed,
    session: &mut Session,
    context: &ConnectionContext,
    remote: &str,
) {
    let dispatcher = &context.dispatcher;

    if let Err(e) = framed
        .send(Outbound::Greeting(session.challenge().to_string()))
        .await
    {
        let outcome = dispatcher.on_failure(session, &e, remote);
        finish_quietly(framed, outcome.reply).await;
        return;
    }

    let next = match tokio::time::timeout(context.connection_timeout, framed.next()).await {
        Ok(next) => next,
        Err(_) => Some(Err(ProtocolError::ConnectionTimeout)),
    };

    if let Some(version) = framed.codec().version() {
        session.negotiate(version);
    }

    match next {
        Some(Ok(vote)) => {
            let reply = dispatcher.on_vote_decoded(session, vote, remote);
            if let Err(e) = finish(framed, reply).await {
                let outcome = dispatcher.on_failure(session, &e, remote);
                finish_quietly(framed, outcome.reply).await;
            }
        }
        Some(Err(e)) => {
            let outcome = dispatcher.on_failure(session, &e, remote);
            finish_quietly(framed, outcome.reply).await;
        }
        None => {
            debug!("Peer closed the connection before sending a vote");
        }
    }
}

/// Write the reply if any, then close. `send` completes the flush before
/// `close` shuts the write half down.
async fn finish(framed: &mut VoteFramed, reply: Reply) -> Result<()> {
    if let Reply::Respond(status) = reply {
        framed.send(Outbound::Status(status)).await?;
    }
    SinkExt::<Outbound>::close(framed).await
}

/// Like [`finish`] for the failure path, where a second failure has nowhere to go
async fn finish_quietly(framed: &mut VoteFramed, reply: Reply) {
    if let Err(e) = finish(framed, reply).await {
        debug!(error = %e, "Failed to deliver failure reply");
    }
}
