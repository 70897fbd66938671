//! Game registry: creates, looks up, removes, and expires matches.
//!
//! # Locking
//!
//! The registry map has its own lock and each game has its own lock.
//! No method here holds both at once: handles are cloned out of the map
//! before any game is locked, so a request holding a game lock can never
//! deadlock against a sweep or a create.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use rps_protocol::{GameId, PlayerId};
use tokio::sync::RwLock;

use crate::{Game, GameError, IdGenerator, SharedGame, UuidGenerator};

/// How many extra candidates `create_game` draws after a collision.
const MAX_ID_RETRIES: usize = 5;

/// Process-wide registry of live games.
pub struct Manager {
    games: RwLock<HashMap<GameId, SharedGame>>,
    ids: Box<dyn IdGenerator>,
}

impl Manager {
    /// Creates an empty registry that issues random UUIDs.
    pub fn new() -> Self {
        Self::with_generator(UuidGenerator)
    }

    /// Creates an empty registry that draws identifiers from `ids`.
    pub fn with_generator(ids: impl IdGenerator) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            ids: Box::new(ids),
        }
    }

    /// Creates and registers a game between `p1` and `p2`.
    ///
    /// Empty or already-registered candidates count as collisions.
    ///
    /// # Errors
    /// [`GameError::IdGenerationExhausted`] if the first candidate and
    /// every retry collide.
    pub async fn create_game(
        &self,
        p1: PlayerId,
        p2: PlayerId,
    ) -> Result<SharedGame, GameError> {
        let mut games = self.games.write().await;

        for attempt in 0..=MAX_ID_RETRIES {
            let candidate = self.ids.generate();
            if candidate.is_empty() {
                tracing::debug!(attempt, "id generator returned empty id");
                continue;
            }
            let id = GameId(candidate);
            if games.contains_key(&id) {
                tracing::debug!(%id, attempt, "game id collision, retrying");
                continue;
            }

            let game = Game::new(id.clone(), p1, p2).into_shared();
            games.insert(id.clone(), game.clone());
            tracing::info!(game_id = %id, "game created");
            return Ok(game);
        }

        tracing::warn!("giving up on game id generation");
        Err(GameError::IdGenerationExhausted)
    }

    /// Looks up a game. `None` is an ordinary answer, not an error.
    pub async fn get_game(&self, id: &GameId) -> Option<SharedGame> {
        self.games.read().await.get(id).cloned()
    }

    /// Deletes a game from the registry.
    ///
    /// # Errors
    /// [`GameError::NotFound`] if no such game is registered.
    pub async fn remove_game(&self, id: &GameId) -> Result<(), GameError> {
        self.games
            .write()
            .await
            .remove(id)
            .ok_or_else(|| GameError::NotFound(id.clone()))?;
        tracing::info!(game_id = %id, "game removed");
        Ok(())
    }

    /// Removes every game whose last activity is older than `max_age` and
    /// returns their identifiers.
    ///
    /// Runs in three steps so the registry lock and game locks are never
    /// held together: snapshot the handles, read each game's timestamp
    /// under its own lock, then remove the stale entries that still map to
    /// the same handle.
    pub async fn sweep_expired(&self, max_age: Duration) -> Vec<GameId> {
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);

        let snapshot: Vec<(GameId, SharedGame)> = self
            .games
            .read()
            .await
            .iter()
            .map(|(id, game)| (id.clone(), game.clone()))
            .collect();

        let now = Utc::now();
        let mut stale = Vec::new();
        for (id, game) in snapshot {
            let last_activity = game.lock().await.last_activity();
            if now - last_activity > max_age {
                stale.push((id, game));
            }
        }

        if stale.is_empty() {
            return Vec::new();
        }

        let mut games = self.games.write().await;
        let mut removed = Vec::with_capacity(stale.len());
        for (id, handle) in stale {
            let same_entry = games
                .get(&id)
                .is_some_and(|current| SharedGame::ptr_eq(current, &handle));
            if same_entry {
                games.remove(&id);
                tracing::info!(game_id = %id, "expired game swept");
                removed.push(id);
            }
        }
        removed
    }

    /// Number of registered games.
    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
