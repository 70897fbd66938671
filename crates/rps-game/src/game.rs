//! The per-match state machine.
//!
//! ```text
//!                 new_round()                 both moves in
//! NoActiveRound ─────────────→ RoundInProgress ──────────────→ (round appended)
//!       ↑                            │ new_round() restarts          │
//!       └────────────────────────────┴───────────────────────────────┘
//!
//! declare_winner() from anywhere ──→ MatchOver
//! ```
//!
//! A `Game` is plain data; callers share it as a [`SharedGame`] and hold
//! its lock for the duration of one operation. That lock is the only thing
//! serializing round completions on a match.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rps_protocol::{GameId, PlayerId};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{GameError, Move, Outcome, Round, resolve};

/// Number of rounds in every match.
pub const MAX_ROUNDS: usize = 5;

/// A game handle shared between the registry and request handlers.
pub type SharedGame = Arc<Mutex<Game>>;

/// Which seat a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    P1,
    P2,
}

/// Observable phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    NoActiveRound,
    RoundInProgress,
    MatchOver,
}

/// One match between two named players.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    id: GameId,
    p1: PlayerId,
    p2: PlayerId,
    rounds: Vec<Round>,
    current_round: Option<Round>,
    p1_wins: u32,
    p2_wins: u32,
    winner: Option<PlayerId>,
    p1_connected: bool,
    p2_connected: bool,
    created_at: DateTime<Utc>,
    pub(crate) last_activity: DateTime<Utc>,
}

impl Game {
    pub fn new(id: GameId, p1: PlayerId, p2: PlayerId) -> Self {
        let now = Utc::now();
        Self {
            id,
            p1,
            p2,
            rounds: Vec::with_capacity(MAX_ROUNDS),
            current_round: None,
            p1_wins: 0,
            p2_wins: 0,
            winner: None,
            p1_connected: false,
            p2_connected: false,
            created_at: now,
            last_activity: now,
        }
    }

    /// Wraps the game for sharing.
    pub fn into_shared(self) -> SharedGame {
        Arc::new(Mutex::new(self))
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn p1(&self) -> &PlayerId {
        &self.p1
    }

    pub fn p2(&self) -> &PlayerId {
        &self.p2
    }

    /// Completed rounds, oldest first.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.current_round.as_ref()
    }

    pub fn wins(&self, slot: Slot) -> u32 {
        match slot {
            Slot::P1 => self.p1_wins,
            Slot::P2 => self.p2_wins,
        }
    }

    pub fn winner(&self) -> Option<&PlayerId> {
        self.winner.as_ref()
    }

    pub fn is_connected(&self, slot: Slot) -> bool {
        match slot {
            Slot::P1 => self.p1_connected,
            Slot::P2 => self.p2_connected,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Seat of `player`, if they are one of the two named players.
    /// The blank identity never occupies a seat.
    pub fn slot_of(&self, player: &PlayerId) -> Option<Slot> {
        if player.is_blank() {
            None
        } else if *player == self.p1 {
            Some(Slot::P1)
        } else if *player == self.p2 {
            Some(Slot::P2)
        } else {
            None
        }
    }

    pub fn state(&self) -> GameState {
        if self.winner.is_some() {
            GameState::MatchOver
        } else if self.current_round.is_some() {
            GameState::RoundInProgress
        } else {
            GameState::NoActiveRound
        }
    }

    /// `true` while at least one player is connected.
    pub fn is_active(&self) -> bool {
        self.p1_connected || self.p2_connected
    }

    // -- transitions --------------------------------------------------------

    fn ensure_round_allowed(&self) -> Result<(), GameError> {
        if self.winner.is_some() {
            return Err(GameError::GameOver);
        }
        if self.rounds.len() >= MAX_ROUNDS {
            return Err(GameError::MaxRoundsReached);
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Opens a fresh round, discarding any unfinished one.
    ///
    /// # Errors
    /// [`GameError::GameOver`] once a winner is set,
    /// [`GameError::MaxRoundsReached`] after [`MAX_ROUNDS`] rounds.
    pub fn new_round(&mut self) -> Result<&Round, GameError> {
        self.ensure_round_allowed()?;
        self.touch();
        Ok(self.current_round.insert(Round::new()))
    }

    /// Stores `mv` in `slot` of the in-progress round. A second move from
    /// the same seat overwrites the first.
    ///
    /// # Errors
    /// [`GameError::NoActiveRound`] if no round is open.
    pub fn record_move(&mut self, slot: Slot, mv: Move) -> Result<(), GameError> {
        let round = self
            .current_round
            .as_mut()
            .ok_or(GameError::NoActiveRound)?;
        match slot {
            Slot::P1 => round.p1 = Some(mv),
            Slot::P2 => round.p2 = Some(mv),
        }
        round.updated_at = Utc::now();
        self.touch();
        Ok(())
    }

    /// Resolves the in-progress round with the given moves, updates the
    /// win counters, and appends the round to history. This is the only
    /// path that grows history.
    ///
    /// # Errors
    /// Same preconditions as [`Game::new_round`], plus
    /// [`GameError::NoActiveRound`] when no round is open.
    pub fn play_round(&mut self, p1: Move, p2: Move) -> Result<&Round, GameError> {
        self.ensure_round_allowed()?;
        let mut round = self.current_round.take().ok_or(GameError::NoActiveRound)?;

        let outcome = resolve(p1, p2);
        round.p1 = Some(p1);
        round.p2 = Some(p2);
        round.outcome = Some(outcome);
        round.updated_at = Utc::now();

        match outcome {
            Outcome::Player1Wins => self.p1_wins += 1,
            Outcome::Player2Wins => self.p2_wins += 1,
            Outcome::Draw => {}
        }

        self.rounds.push(round);
        self.touch();
        Ok(&self.rounds[self.rounds.len() - 1])
    }

    /// Records a move and, if that completes the round, resolves it in the
    /// same critical section. Returns the completed round, if any.
    ///
    /// # Errors
    /// Same preconditions as [`Game::play_round`]. A rejected move leaves
    /// the open round untouched.
    pub fn submit_move(
        &mut self,
        slot: Slot,
        mv: Move,
    ) -> Result<Option<Round>, GameError> {
        self.ensure_round_allowed()?;
        self.record_move(slot, mv)?;
        let Some((p1, p2)) = self.current_round.as_ref().and_then(Round::moves)
        else {
            return Ok(None);
        };
        self.play_round(p1, p2).map(|round| Some(round.clone()))
    }

    /// Updates the connected flag of whichever player `player` names.
    /// Unknown identities are ignored.
    pub fn set_connected(&mut self, player: &PlayerId, connected: bool) {
        match self.slot_of(player) {
            Some(Slot::P1) => self.p1_connected = connected,
            Some(Slot::P2) => self.p2_connected = connected,
            None => return,
        }
        self.touch();
    }

    /// Ends the match. Nothing in the round engine calls this; it exists
    /// for whatever policy decides a match winner.
    ///
    /// # Errors
    /// [`GameError::NotAPlayer`] if `player` has no seat in this game.
    pub fn declare_winner(&mut self, player: &PlayerId) -> Result<(), GameError> {
        if self.slot_of(player).is_none() {
            return Err(GameError::NotAPlayer(player.clone()));
        }
        self.winner = Some(player.clone());
        self.touch();
        Ok(())
    }
}
