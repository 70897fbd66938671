//! Error types for the game layer.

use rps_protocol::{GameId, PlayerId};

/// Errors raised by round resolution, the match state machine, and the
/// registry. All of them are recoverable and concern only the requesting
/// connection or game.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// The text is not exactly `rock`, `paper`, or `scissors`.
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// The match already has a winner.
    #[error("game is over")]
    GameOver,

    /// Every round of the match has been played.
    #[error("maximum rounds reached")]
    MaxRoundsReached,

    /// A move arrived while no round is in progress.
    #[error("no active round")]
    NoActiveRound,

    /// The registry holds no game with this identifier.
    #[error("game {0} not found")]
    NotFound(GameId),

    /// The identity is neither player of the game.
    #[error("player {0} is not a player in this game")]
    NotAPlayer(PlayerId),

    /// The ID generator kept producing identifiers already in use.
    #[error("failed to generate unique game ID")]
    IdGenerationExhausted,
}
