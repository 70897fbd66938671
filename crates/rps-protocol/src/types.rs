//! Core protocol types: identifiers, the message envelope, and the typed
//! view of inbound requests.
//!
//! Every frame on the wire is a JSON object with a `type` string and a
//! `data` object:
//!
//! ```text
//! { "type": "make_move", "data": { "move": "rock" } }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's identity, as supplied by the client when it connects.
///
/// Serialized as a bare string. The empty string stands for "no player"
/// in the second seat of a bootstrap game.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the blank identity.
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A match identifier issued by the game manager.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Message kinds
// ---------------------------------------------------------------------------

/// The `type` strings used on the wire.
pub mod kind {
    // Client -> server
    pub const JOIN_GAME: &str = "join_game";
    pub const START_ROUND: &str = "start_round";
    pub const MAKE_MOVE: &str = "make_move";
    pub const FIND_MATCH: &str = "find_match";
    pub const CANCEL_MATCH: &str = "cancel_match";

    // Server -> client
    pub const GAME_JOINED: &str = "game_joined";
    pub const PLAYER_JOINED: &str = "player_joined";
    pub const ROUND_STARTED: &str = "round_started";
    pub const ROUND_PLAYED: &str = "round_played";
    pub const MATCH_FOUND: &str = "match_found";
    pub const ERROR: &str = "error";
}

// ---------------------------------------------------------------------------
// Message envelope
// ---------------------------------------------------------------------------

/// One frame on the wire, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Declared message type, e.g. `"join_game"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Free-form payload. Missing `data` decodes as an empty object.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Message {
    /// Creates a message with an empty payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: Map::new(),
        }
    }

    /// Adds a field to the payload.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_owned(), value.into());
        self
    }

    /// Adds a field by serializing any `Serialize` value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// as JSON.
    pub fn with_serialized<T: Serialize>(
        self,
        key: &str,
        value: &T,
    ) -> Result<Self, ProtocolError> {
        let value = serde_json::to_value(value).map_err(ProtocolError::Encode)?;
        Ok(self.with(key, value))
    }

    /// `error {message}`: sent only to the client whose request failed.
    pub fn error(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(kind::ERROR).with("message", message)
    }

    /// `game_joined {gameID, game}`: unicast to the joiner.
    pub fn game_joined<G: Serialize>(
        game_id: &GameId,
        game: &G,
    ) -> Result<Self, ProtocolError> {
        Self::new(kind::GAME_JOINED)
            .with("gameID", game_id.as_str())
            .with_serialized("game", game)
    }

    /// `player_joined {playerID}`: broadcast to the rest of the roster.
    pub fn player_joined(player_id: &PlayerId) -> Self {
        Self::new(kind::PLAYER_JOINED).with("playerID", player_id.as_str())
    }

    /// `round_started {round, game}`.
    pub fn round_started<R: Serialize, G: Serialize>(
        round: &R,
        game: &G,
    ) -> Result<Self, ProtocolError> {
        Self::new(kind::ROUND_STARTED)
            .with_serialized("round", round)?
            .with_serialized("game", game)
    }

    /// `round_played {round, game}`.
    pub fn round_played<R: Serialize, G: Serialize>(
        round: &R,
        game: &G,
    ) -> Result<Self, ProtocolError> {
        Self::new(kind::ROUND_PLAYED)
            .with_serialized("round", round)?
            .with_serialized("game", game)
    }

    /// `match_found {gameID, game}`: sent to both matched players.
    pub fn match_found<G: Serialize>(
        game_id: &GameId,
        game: &G,
    ) -> Result<Self, ProtocolError> {
        Self::new(kind::MATCH_FOUND)
            .with("gameID", game_id.as_str())
            .with_serialized("game", game)
    }
}

// ---------------------------------------------------------------------------
// Request: typed view of inbound messages
// ---------------------------------------------------------------------------

/// How a `join_game` request names its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameRef {
    /// No `game_id` (or an empty one): the bootstrap path.
    Missing,
    /// A concrete identifier to look up.
    Id(GameId),
    /// `game_id` was present but not a string.
    Invalid,
}

/// An inbound message routed by its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    JoinGame { game: GameRef },
    StartRound,
    /// `mv` is `None` when `move` is absent or not a string.
    MakeMove { mv: Option<String> },
    FindMatch,
    CancelMatch,
    /// Any other `type`; the hub logs and ignores it.
    Unknown(String),
}

impl From<Message> for Request {
    fn from(msg: Message) -> Self {
        match msg.kind.as_str() {
            kind::JOIN_GAME => {
                let game = match msg.data.get("game_id") {
                    None | Some(Value::Null) => GameRef::Missing,
                    Some(Value::String(s)) if s.is_empty() => GameRef::Missing,
                    Some(Value::String(s)) => GameRef::Id(GameId(s.clone())),
                    Some(_) => GameRef::Invalid,
                };
                Request::JoinGame { game }
            }
            kind::START_ROUND => Request::StartRound,
            kind::MAKE_MOVE => Request::MakeMove {
                mv: msg
                    .data
                    .get("move")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            },
            kind::FIND_MATCH => Request::FindMatch,
            kind::CANCEL_MATCH => Request::CancelMatch,
            _ => Request::Unknown(msg.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: &str) -> Request {
        let msg: Message = serde_json::from_str(raw).expect("valid message");
        Request::from(msg)
    }

    #[test]
    fn test_player_id_serializes_as_bare_string() {
        let json = serde_json::to_value(PlayerId::new("alice")).unwrap();
        assert_eq!(json, json!("alice"));
        assert_eq!(PlayerId::new("alice").to_string(), "alice");
        assert!(PlayerId::default().is_blank());
    }

    #[test]
    fn test_message_missing_data_defaults_to_empty_object() {
        let msg: Message = serde_json::from_str(r#"{"type":"start_round"}"#)
            .expect("data is optional");
        assert!(msg.data.is_empty());
    }

    #[test]
    fn test_message_missing_type_fails_to_decode() {
        let result: Result<Message, _> =
            serde_json::from_str(r#"{"data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_join_game_with_id() {
        assert_eq!(
            parse(r#"{"type":"join_game","data":{"game_id":"g-1"}}"#),
            Request::JoinGame {
                game: GameRef::Id(GameId::from("g-1"))
            }
        );
    }

    #[test]
    fn test_request_join_game_without_id_is_bootstrap() {
        assert_eq!(
            parse(r#"{"type":"join_game","data":{}}"#),
            Request::JoinGame {
                game: GameRef::Missing
            }
        );
        assert_eq!(
            parse(r#"{"type":"join_game","data":{"game_id":""}}"#),
            Request::JoinGame {
                game: GameRef::Missing
            }
        );
    }

    #[test]
    fn test_request_join_game_non_string_id_is_invalid() {
        assert_eq!(
            parse(r#"{"type":"join_game","data":{"game_id":42}}"#),
            Request::JoinGame {
                game: GameRef::Invalid
            }
        );
    }

    #[test]
    fn test_request_make_move_extracts_move_text() {
        assert_eq!(
            parse(r#"{"type":"make_move","data":{"move":"paper"}}"#),
            Request::MakeMove {
                mv: Some("paper".into())
            }
        );
        assert_eq!(
            parse(r#"{"type":"make_move","data":{"move":7}}"#),
            Request::MakeMove { mv: None }
        );
    }

    #[test]
    fn test_request_unknown_type_is_preserved() {
        assert_eq!(
            parse(r#"{"type":"fly_to_moon","data":{}}"#),
            Request::Unknown("fly_to_moon".into())
        );
    }

    #[test]
    fn test_game_joined_carries_id_and_snapshot() {
        let msg =
            Message::game_joined(&GameId::from("g-9"), &json!({"p1": "a"}))
                .unwrap();
        assert_eq!(msg.kind, kind::GAME_JOINED);
        assert_eq!(msg.data["gameID"], "g-9");
        assert_eq!(msg.data["game"]["p1"], "a");
    }

    #[test]
    fn test_player_joined_json_format() {
        let json =
            serde_json::to_value(Message::player_joined(&"bob".into())).unwrap();
        assert_eq!(json, json!({"type": "player_joined", "data": {"playerID": "bob"}}));
    }
}
