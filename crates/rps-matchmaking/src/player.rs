//! The player record carried through matchmaking.

use chrono::{DateTime, Utc};
use rps_protocol::PlayerId;
use serde::{Deserialize, Serialize};

/// A registered player. Only `id` matters to the game engine; the rest is
/// profile data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Player {
    /// A player known only by identity, as when a client connects with
    /// nothing but a `player_id`.
    pub fn new(id: PlayerId) -> Self {
        let username = id.as_str().to_owned();
        Self {
            id,
            username,
            email: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }
}
