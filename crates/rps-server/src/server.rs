//! `RpsServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → hub → game engine.
//! Every accepted socket finishes its upgrade on its own task, so a slow
//! handshake never stalls the accept loop. Each upgraded link then gets a
//! reader task (this module's `handle_link`) and a writer task draining the connection's outbound queue. A separate
//! task sweeps idle games and stale queue entries.

use std::future::Future;
use std::sync::Arc;

use rps_game::{IdGenerator, Manager};
use rps_protocol::{Codec, JsonCodec, Message, PlayerId};
use rps_transport::{Handshake, Link, Transport, WebSocketLink, WebSocketTransport};
use tokio::sync::mpsc;

use crate::{Connection, RpsError, Server, ServerConfig};

/// Builder for configuring and starting an RPS server.
///
/// # Example
///
/// ```rust,ignore
/// use rps_server::prelude::*;
///
/// let server = RpsServer::builder().bind("0.0.0.0:8080").build().await?;
/// server.run().await
/// ```
pub struct RpsServerBuilder {
    config: ServerConfig,
    manager: Option<Manager>,
}

impl RpsServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            manager: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `ids` instead of random UUIDs for new game identifiers.
    pub fn id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.manager = Some(Manager::with_generator(ids));
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build(self) -> Result<RpsServer, RpsError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_handshake_timeout(self.config.handshake_timeout);
        let hub = Server::new(self.manager.unwrap_or_default(), JsonCodec);

        Ok(RpsServer {
            transport,
            hub: Arc::new(hub),
            config: self.config,
        })
    }
}

impl Default for RpsServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound RPS server. Call [`run()`](Self::run) to start accepting
/// connections.
pub struct RpsServer {
    transport: WebSocketTransport,
    hub: Arc<Server>,
    config: ServerConfig,
}

impl RpsServer {
    /// Creates a new builder.
    pub fn builder() -> RpsServerBuilder {
        RpsServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The shared hub, for inspection.
    pub fn hub(&self) -> &Arc<Server> {
        &self.hub
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), RpsError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RpsError> {
        tracing::info!("RPS server running");
        let sweeper = tokio::spawn(sweep_loop(Arc::clone(&self.hub), self.config.clone()));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutting down");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let hub = Arc::clone(&self.hub);
                        let capacity = self.config.outbound_capacity;
                        tokio::spawn(async move {
                            let peer = pending.peer_addr();
                            let link = match pending.complete().await {
                                Ok(link) => link,
                                Err(e) => {
                                    tracing::debug!(%peer, error = %e, "handshake failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_link(link, hub, capacity).await {
                                tracing::debug!(error = %e, "link ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        sweeper.abort();
        Ok(())
    }
}

/// Periodically removes idle games and players who waited too long for a
/// match.
async fn sweep_loop<C: Codec>(hub: Arc<Server<C>>, config: ServerConfig) {
    let period = config.sweep_interval.max(std::time::Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let removed = hub.sweep(config.game_max_age).await;
        let dropped = hub.queue().cleanup_timeout(config.queue_max_wait).await;
        if !removed.is_empty() || !dropped.is_empty() {
            tracing::info!(
                games = removed.len(),
                queued_players = dropped.len(),
                "sweep finished"
            );
        }
    }
}

/// Extracts a non-empty `player_id` query parameter from a request target
/// such as `/ws?player_id=alice`. The value is percent-decoded.
pub(crate) fn player_id_from_path(path: &str) -> Option<PlayerId> {
    let (_, query) = path.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "player_id")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .map(PlayerId::new)
}

/// Runs one link from accept to close: identify the player, attach, read
/// until the peer leaves or the connection is closed, then detach.
async fn handle_link<C: Codec>(
    link: WebSocketLink,
    hub: Arc<Server<C>>,
    capacity: usize,
) -> Result<(), RpsError> {
    let link = Arc::new(link);
    let link_id = link.id();

    let Some(player_id) = player_id_from_path(link.request_path()) else {
        tracing::warn!(%link_id, path = link.request_path(), "rejecting link without player_id");
        let bytes = hub.codec().encode(&Message::error("player_id is required"))?;
        link.send(&bytes).await?;
        link.close().await?;
        return Ok(());
    };

    let (conn, rx) = Connection::new(player_id, capacity);
    hub.attach(Arc::clone(&conn)).await;
    let writer = tokio::spawn(write_loop(Arc::clone(&link), Arc::clone(&conn), rx));

    loop {
        tokio::select! {
            () = conn.closed() => break,
            received = link.recv() => match received {
                Ok(Some(data)) => hub.dispatch(&conn, &data).await,
                Ok(None) => {
                    tracing::debug!(%link_id, player_id = %conn.player_id(), "link closed by peer");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%link_id, player_id = %conn.player_id(), error = %e, "recv error");
                    break;
                }
            },
        }
    }

    hub.detach(&conn).await;
    if let Err(e) = writer.await {
        tracing::error!(%link_id, error = %e, "writer task failed");
    }
    Ok(())
}

/// Drains the outbound queue onto the link until the queue is closed,
/// then closes the link.
async fn write_loop(
    link: Arc<WebSocketLink>,
    conn: Arc<Connection>,
    mut rx: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(bytes) = rx.recv().await {
        if let Err(e) = link.send(&bytes).await {
            tracing::debug!(link_id = %link.id(), error = %e, "send failed");
            conn.close();
            break;
        }
    }
    if let Err(e) = link.close().await {
        tracing::debug!(link_id = %link.id(), error = %e, "close failed");
    }
}
