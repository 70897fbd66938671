//! The waiting room for players who asked for a random opponent.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rps_protocol::PlayerId;
use tokio::sync::Mutex;

use crate::Player;

/// A player waiting in the queue, with the time they joined.
#[derive(Debug, Clone)]
struct QueuedPlayer {
    player: Player,
    joined_at: DateTime<Utc>,
}

/// Set of players waiting for a match, keyed by identity.
///
/// A player is queued at most once; adding them again refreshes their
/// entry and their wait clock.
#[derive(Debug, Default)]
pub struct MatchQueue {
    players: Mutex<HashMap<PlayerId, QueuedPlayer>>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_player(&self, player: Player) {
        tracing::debug!(player_id = %player.id, "player queued for match");
        let id = player.id.clone();
        self.players.lock().await.insert(
            id,
            QueuedPlayer {
                player,
                joined_at: Utc::now(),
            },
        );
    }

    /// Removes a player. Returns `false` if they were not queued.
    pub async fn remove_player(&self, id: &PlayerId) -> bool {
        self.players.lock().await.remove(id).is_some()
    }

    pub async fn contains(&self, id: &PlayerId) -> bool {
        self.players.lock().await.contains_key(id)
    }

    /// Pops the two longest-waiting players, if at least two are queued.
    pub async fn try_match(&self) -> Option<(Player, Player)> {
        let mut players = self.players.lock().await;
        if players.len() < 2 {
            tracing::debug!(queued = players.len(), "not enough players to match");
            return None;
        }

        let mut waiting: Vec<(&PlayerId, DateTime<Utc>)> = players
            .iter()
            .map(|(id, queued)| (id, queued.joined_at))
            .collect();
        waiting.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        let (first, second) = (waiting[0].0.clone(), waiting[1].0.clone());

        let a = players.remove(&first)?.player;
        let b = players.remove(&second)?.player;
        tracing::info!(p1 = %a.id, p2 = %b.id, "matched players");
        Some((a, b))
    }

    pub async fn queue_size(&self) -> usize {
        self.players.lock().await.len()
    }

    /// Drops everyone who has waited longer than `max_wait` and returns
    /// their identities.
    pub async fn cleanup_timeout(&self, max_wait: Duration) -> Vec<PlayerId> {
        let max_wait = TimeDelta::from_std(max_wait).unwrap_or(TimeDelta::MAX);
        let now = Utc::now();

        let mut players = self.players.lock().await;
        let expired: Vec<PlayerId> = players
            .iter()
            .filter(|(_, queued)| now - queued.joined_at > max_wait)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            players.remove(id);
            tracing::info!(player_id = %id, "removed idle player from queue");
        }
        expired
    }

    #[cfg(test)]
    async fn backdate(&self, id: &PlayerId, by: TimeDelta) {
        if let Some(queued) = self.players.lock().await.get_mut(id) {
            queued.joined_at -= by;
        }
    }
}
