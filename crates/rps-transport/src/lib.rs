//! Transport abstraction layer for the RPS backend.
//!
//! Provides the [`Transport`], [`Handshake`], and [`Link`] traits so the
//! connection hub never touches socket types directly. Accepting only
//! takes the raw connection; the protocol handshake runs separately so a
//! peer that never completes it can't hold up the accept loop. A link is
//! split into independent read and write halves: one task may block in
//! [`Link::recv`] while another task calls [`Link::send`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketLink, WebSocketTransport};

use std::fmt;

/// Opaque identifier for an accepted link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

impl LinkId {
    /// Creates a new `LinkId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The link type produced once a handshake completes.
    type Link: Link;
    /// An accepted connection that has not finished its handshake.
    type Pending: Handshake<Link = Self::Link, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming connection. Does not wait for the
    /// peer to say anything.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// The handshake step between accepting a connection and using it.
pub trait Handshake: Send + 'static {
    type Link: Link;
    type Error: std::error::Error + Send + Sync;

    /// Runs the handshake and yields a ready link.
    async fn complete(self) -> Result<Self::Link, Self::Error>;
}

/// A single bidirectional link that carries whole messages.
pub trait Link: Send + Sync + 'static {
    /// The error type for link operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one message to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the link is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the outgoing half of the link.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this link.
    fn id(&self) -> LinkId;

    /// Returns the request target the peer opened the link with,
    /// e.g. `/ws?player_id=alice`.
    fn request_path(&self) -> &str;
}
