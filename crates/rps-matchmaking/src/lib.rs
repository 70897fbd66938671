//! Matchmaking for the RPS backend.
//!
//! Players waiting for an opponent sit in a [`MatchQueue`]; the hub asks
//! the queue for a pair and opens a game for them.

mod player;
mod queue;

pub use player::Player;
pub use queue::MatchQueue;
