//! Moves, outcomes, and the rule that turns two moves into an outcome.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::GameError;

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// One player's throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// Returns `true` if `self` defeats `other`.
    pub fn beats(self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors)
                | (Move::Scissors, Move::Paper)
                | (Move::Paper, Move::Rock)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact-token parse: no trimming, no case folding.
impl FromStr for Move {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            other => Err(GameError::InvalidMove(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a single round. Serialized as `"draw"`, `"p1"`, or `"p2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "draw")]
    Draw,
    #[serde(rename = "p1")]
    Player1Wins,
    #[serde(rename = "p2")]
    Player2Wins,
}

/// Resolves a round. Total over all nine move pairs; swapping the
/// arguments leaves a draw unchanged and flips a win.
pub fn resolve(p1: Move, p2: Move) -> Outcome {
    if p1 == p2 {
        Outcome::Draw
    } else if p1.beats(p2) {
        Outcome::Player1Wins
    } else {
        Outcome::Player2Wins
    }
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// One exchange of moves within a match.
///
/// While in progress either move may be missing and `outcome` is `None`.
/// Once appended to a game's history all three are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub p1: Option<Move>,
    pub p2: Option<Move>,
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Round {
    pub(crate) fn new() -> Self {
        let now = Utc::now();
        Self {
            p1: None,
            p2: None,
            outcome: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Both moves, once both players have submitted.
    pub fn moves(&self) -> Option<(Move, Move)> {
        Some((self.p1?, self.p2?))
    }

    pub fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_from_str_accepts_exact_tokens() {
        assert_eq!("rock".parse::<Move>(), Ok(Move::Rock));
        assert_eq!("paper".parse::<Move>(), Ok(Move::Paper));
        assert_eq!("scissors".parse::<Move>(), Ok(Move::Scissors));
    }

    #[test]
    fn test_move_from_str_rejects_everything_else() {
        for bad in ["lizard", "spock", "", "123", "rockk", "Rock", " rock"] {
            assert_eq!(
                bad.parse::<Move>(),
                Err(GameError::InvalidMove(bad.to_owned())),
                "{bad:?} must not parse"
            );
        }
    }

    #[test]
    fn test_resolve_equal_moves_draw() {
        for m in Move::ALL {
            assert_eq!(resolve(m, m), Outcome::Draw);
        }
    }

    #[test]
    fn test_resolve_winning_pairs_favor_player_one() {
        assert_eq!(resolve(Move::Rock, Move::Scissors), Outcome::Player1Wins);
        assert_eq!(resolve(Move::Scissors, Move::Paper), Outcome::Player1Wins);
        assert_eq!(resolve(Move::Paper, Move::Rock), Outcome::Player1Wins);
    }

    #[test]
    fn test_resolve_reversed_pairs_favor_player_two() {
        assert_eq!(resolve(Move::Scissors, Move::Rock), Outcome::Player2Wins);
        assert_eq!(resolve(Move::Paper, Move::Scissors), Outcome::Player2Wins);
        assert_eq!(resolve(Move::Rock, Move::Paper), Outcome::Player2Wins);
    }

    #[test]
    fn test_resolve_swap_symmetry_over_all_pairs() {
        for a in Move::ALL {
            for b in Move::ALL {
                let expected = match resolve(a, b) {
                    Outcome::Draw => Outcome::Draw,
                    Outcome::Player1Wins => Outcome::Player2Wins,
                    Outcome::Player2Wins => Outcome::Player1Wins,
                };
                assert_eq!(resolve(b, a), expected, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_round_wire_format() {
        let mut round = Round::new();
        round.p1 = Some(Move::Rock);
        round.outcome = Some(Outcome::Player2Wins);
        let json = serde_json::to_value(&round).unwrap();
        assert_eq!(json["p1"], "rock");
        assert!(json["p2"].is_null());
        assert_eq!(json["outcome"], "p2");
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn test_round_moves_requires_both() {
        let mut round = Round::new();
        assert_eq!(round.moves(), None);
        round.p2 = Some(Move::Paper);
        assert_eq!(round.moves(), None);
        round.p1 = Some(Move::Scissors);
        assert_eq!(round.moves(), Some((Move::Scissors, Move::Paper)));
    }
}
