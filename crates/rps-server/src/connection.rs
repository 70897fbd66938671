//! One client's presence on the server.
//!
//! A [`Connection`] owns the sending side of a bounded outbound queue. The
//! link's writer task owns the receiving side and drains it onto the
//! socket. Enqueueing never waits: when the queue is full the message is
//! dropped and the queue closed, which ends the writer and, through the
//! cancellation token, the reader.

use std::sync::Arc;

use parking_lot::Mutex;
use rps_protocol::{GameId, PlayerId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

pub struct Connection {
    player_id: PlayerId,
    outbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    game_id: Mutex<Option<GameId>>,
    cancel: CancellationToken,
}

impl Connection {
    /// Creates a connection for `player_id` and returns it together with
    /// the receiving end of its outbound queue.
    pub fn new(
        player_id: PlayerId,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Arc::new(Self {
            player_id,
            outbound: Mutex::new(Some(tx)),
            game_id: Mutex::new(None),
            cancel: CancellationToken::new(),
        });
        (conn, rx)
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// The game this connection last joined.
    pub fn game_id(&self) -> Option<GameId> {
        self.game_id.lock().clone()
    }

    pub(crate) fn set_game_id(&self, game_id: Option<GameId>) {
        *self.game_id.lock() = game_id;
    }

    /// Clears the game binding if it still names `game_id`.
    pub(crate) fn clear_game_id(&self, game_id: &GameId) {
        let mut current = self.game_id.lock();
        if current.as_ref() == Some(game_id) {
            *current = None;
        }
    }

    /// Enqueues `data` without waiting. Returns `false` if the message was
    /// dropped; a full queue also closes the connection.
    pub fn send(&self, data: Vec<u8>) -> bool {
        let mut outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return false;
        };

        match tx.try_send(data) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    player_id = %self.player_id,
                    "outbound queue full, dropping slow connection"
                );
                *outbound = None;
                self.cancel.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => {
                *outbound = None;
                self.cancel.cancel();
                false
            }
        }
    }

    /// Closes the outbound queue and signals the reader to stop.
    /// Messages already queued are still delivered by the writer.
    pub fn close(&self) {
        self.outbound.lock().take();
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("player_id", &self.player_id)
            .field("game_id", &self.game_id())
            .field("closed", &self.is_closed())
            .finish()
    }
}
