//! Unified error type for the RPS server.

use rps_game::GameError;
use rps_protocol::ProtocolError;
use rps_transport::TransportError;

/// Top-level error that wraps every layer's errors, plus the request
/// failures only the hub can detect.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum RpsError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A game-level error (bad move, finished match, unknown game).
    #[error(transparent)]
    Game(#[from] GameError),

    /// The connection asked for a game operation before joining one.
    #[error("not in a game")]
    NotInGame,

    /// `join_game` carried a `game_id` that is not a string.
    #[error("invalid game_id")]
    InvalidGameId,
}

impl RpsError {
    /// The text sent back to the client in an `error` message.
    pub fn client_message(&self) -> String {
        match self {
            RpsError::Game(GameError::InvalidMove(_)) => "invalid move".into(),
            RpsError::Game(GameError::NotFound(_)) => "game not found".into(),
            RpsError::Game(GameError::NoActiveRound) => "no active round".into(),
            RpsError::Game(GameError::NotAPlayer(_)) => {
                "not a player in this game".into()
            }
            RpsError::Protocol(ProtocolError::Decode(_)) => {
                "invalid message".into()
            }
            RpsError::Transport(_) | RpsError::Protocol(_) => {
                "internal error".into()
            }
            other => other.to_string(),
        }
    }
}
