//! Match engine for the RPS backend.
//!
//! # Key types
//!
//! - [`resolve`], [`Move`], [`Outcome`], [`Round`]: the rules of a single round
//! - [`Game`]: one match's state machine (rounds, score, connectivity)
//! - [`Manager`]: concurrency-safe registry of live games, ID issuance,
//!   and expiry sweeping
//! - [`IdGenerator`]: the replaceable source of game identifiers

mod error;
mod game;
mod id;
mod manager;
mod round;

pub use error::GameError;
pub use game::{Game, GameState, MAX_ROUNDS, SharedGame, Slot};
pub use id::{IdGenerator, ScriptedIdGenerator, UuidGenerator};
pub use manager::Manager;
pub use round::{Move, Outcome, Round, resolve};
