//! The connection hub: who is connected, who is watching which game, and
//! the handlers that turn inbound requests into game operations.
//!
//! # Locking
//!
//! The hub keeps two maps behind two locks: player identity to live
//! connection, and game identity to roster. Neither is held while the
//! other is taken. Joining and leaving change a roster while holding that
//! game's lock, so roster membership and the game's connected flags move
//! together; the roster lock is never held while a game lock is taken. A
//! broadcast enqueues onto every roster member while holding the roster
//! lock, so joins and leaves never interleave with a half-finished
//! broadcast and per-game delivery order matches broadcast order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rps_game::{GameError, Manager, Move, SharedGame};
use rps_matchmaking::{MatchQueue, Player};
use rps_protocol::{Codec, GameId, GameRef, JsonCodec, Message, PlayerId, Request};
use tokio::sync::Mutex;

use crate::{Connection, RpsError};

/// Shared server state. One instance is wrapped in an `Arc` and handed to
/// every connection task.
pub struct Server<C: Codec = JsonCodec> {
    connections: Mutex<HashMap<PlayerId, Arc<Connection>>>,
    rosters: Mutex<HashMap<GameId, Vec<Arc<Connection>>>>,
    games: Manager,
    queue: MatchQueue,
    codec: C,
}

impl<C: Codec> Server<C> {
    pub fn new(games: Manager, codec: C) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            rosters: Mutex::new(HashMap::new()),
            games,
            queue: MatchQueue::new(),
            codec,
        }
    }

    pub fn manager(&self) -> &Manager {
        &self.games
    }

    pub fn queue(&self) -> &MatchQueue {
        &self.queue
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    // -- connection lifecycle ----------------------------------------------

    /// Registers `conn` under its player identity. An existing connection
    /// for the same identity is closed and replaced.
    pub async fn attach(&self, conn: Arc<Connection>) {
        let player_id = conn.player_id().clone();
        let previous = self
            .connections
            .lock()
            .await
            .insert(player_id.clone(), conn.clone());

        if let Some(old) = previous.filter(|old| !Arc::ptr_eq(old, &conn)) {
            tracing::info!(%player_id, "replacing existing connection");
            old.close();
        }
        tracing::info!(%player_id, "player connected");
    }

    /// Unregisters `conn`. The identity mapping is removed only if it
    /// still points at this exact connection, so a late detach from a
    /// replaced connection can't evict its successor.
    pub async fn detach(&self, conn: &Arc<Connection>) {
        let player_id = conn.player_id();
        let was_current = {
            let mut connections = self.connections.lock().await;
            let current = connections
                .get(player_id)
                .is_some_and(|current| Arc::ptr_eq(current, conn));
            if current {
                connections.remove(player_id);
            }
            current
        };

        // A replaced connection must not pull its successor out of the queue.
        if was_current {
            self.queue.remove_player(player_id).await;
        }

        if let Some(game_id) = conn.game_id() {
            self.leave_game(conn, &game_id).await;
        }

        conn.close();
        tracing::info!(%player_id, "player disconnected");
    }

    /// Removes `conn` from the roster of `game_id` and, unless another
    /// connection for the same player is still on that roster, marks the
    /// player disconnected in the game.
    async fn leave_game(&self, conn: &Arc<Connection>, game_id: &GameId) {
        match self.games.get_game(game_id).await {
            Some(handle) => {
                let mut game = handle.lock().await;
                if !self.remove_from_roster(conn, game_id).await {
                    game.set_connected(conn.player_id(), false);
                }
            }
            None => {
                self.remove_from_roster(conn, game_id).await;
            }
        }
        conn.clear_game_id(game_id);
    }

    /// Drops `conn` from a roster. Returns whether another connection for
    /// the same player is still on it.
    async fn remove_from_roster(&self, conn: &Arc<Connection>, game_id: &GameId) -> bool {
        let mut rosters = self.rosters.lock().await;
        let Some(roster) = rosters.get_mut(game_id) else {
            return false;
        };
        roster.retain(|member| !Arc::ptr_eq(member, conn));
        let still_present = roster
            .iter()
            .any(|member| member.player_id() == conn.player_id());
        if roster.is_empty() {
            rosters.remove(game_id);
        }
        still_present
    }

    // -- fan-out -----------------------------------------------------------

    /// Sends `msg` to every member of the game's roster except `exclude`.
    /// An unknown game is a silent no-op.
    ///
    /// # Errors
    /// Only if the message can't be encoded.
    pub async fn broadcast(
        &self,
        game_id: &GameId,
        msg: &Message,
        exclude: Option<&PlayerId>,
    ) -> Result<(), RpsError> {
        let bytes = self.codec.encode(msg)?;

        let rosters = self.rosters.lock().await;
        let Some(roster) = rosters.get(game_id) else {
            return Ok(());
        };
        for member in roster {
            if Some(member.player_id()) == exclude {
                continue;
            }
            member.send(bytes.clone());
        }
        tracing::debug!(%game_id, kind = %msg.kind, "broadcast");
        Ok(())
    }

    /// Sends `msg` to the live connection of `player_id`, if any.
    /// Returns whether it was enqueued.
    ///
    /// # Errors
    /// Only if the message can't be encoded.
    pub async fn unicast(
        &self,
        player_id: &PlayerId,
        msg: &Message,
    ) -> Result<bool, RpsError> {
        let bytes = self.codec.encode(msg)?;
        let conn = self.connections.lock().await.get(player_id).cloned();
        Ok(conn.is_some_and(|conn| conn.send(bytes)))
    }

    fn reply(&self, conn: &Connection, msg: &Message) -> Result<(), RpsError> {
        conn.send(self.codec.encode(msg)?);
        Ok(())
    }

    fn reply_error(&self, conn: &Connection, err: &RpsError) {
        let msg = Message::error(err.client_message());
        if let Err(e) = self.reply(conn, &msg) {
            tracing::error!(error = %e, "failed to encode error reply");
        }
    }

    // -- request routing ---------------------------------------------------

    /// Decodes one inbound frame and runs the matching handler. Failures
    /// are reported to `conn` only.
    pub async fn dispatch(&self, conn: &Arc<Connection>, data: &[u8]) {
        let msg: Message = match self.codec.decode(data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(
                    player_id = %conn.player_id(),
                    error = %e,
                    "failed to decode message"
                );
                self.reply_error(conn, &e.into());
                return;
            }
        };
        tracing::debug!(player_id = %conn.player_id(), kind = %msg.kind, "dispatch");

        let result = match Request::from(msg) {
            Request::JoinGame { game } => self.join_game(conn, game).await,
            Request::StartRound => self.start_round(conn).await,
            Request::MakeMove { mv } => self.make_move(conn, mv.as_deref()).await,
            Request::FindMatch => self.find_match(conn).await,
            Request::CancelMatch => self.cancel_match(conn).await,
            Request::Unknown(kind) => {
                tracing::warn!(
                    player_id = %conn.player_id(),
                    %kind,
                    "ignoring unknown message type"
                );
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::debug!(
                player_id = %conn.player_id(),
                error = %e,
                "request failed"
            );
            self.reply_error(conn, &e);
        }
    }

    async fn lookup(&self, game_id: &GameId) -> Result<SharedGame, GameError> {
        self.games
            .get_game(game_id)
            .await
            .ok_or_else(|| GameError::NotFound(game_id.clone()))
    }

    /// Joins `conn` to a game. Without a game identifier a fresh game is
    /// created with the joiner as player 1 and player 2 blank.
    pub async fn join_game(
        &self,
        conn: &Arc<Connection>,
        game: GameRef,
    ) -> Result<(), RpsError> {
        let handle = match game {
            GameRef::Invalid => return Err(RpsError::InvalidGameId),
            GameRef::Missing => {
                self.games
                    .create_game(conn.player_id().clone(), PlayerId::default())
                    .await?
            }
            GameRef::Id(id) => self.lookup(&id).await?,
        };

        let game_id = handle.lock().await.id().clone();
        if let Some(previous) = conn.game_id().filter(|id| *id != game_id) {
            self.leave_game(conn, &previous).await;
        }

        let joined = {
            let mut game = handle.lock().await;
            {
                let mut rosters = self.rosters.lock().await;
                let roster = rosters.entry(game_id.clone()).or_default();
                if !roster.iter().any(|member| Arc::ptr_eq(member, conn)) {
                    roster.push(conn.clone());
                }
            }
            conn.set_game_id(Some(game_id.clone()));
            game.set_connected(conn.player_id(), true);
            Message::game_joined(game.id(), &*game)?
        };
        tracing::info!(player_id = %conn.player_id(), %game_id, "player joined game");

        self.reply(conn, &joined)?;
        self.broadcast(
            &game_id,
            &Message::player_joined(conn.player_id()),
            Some(conn.player_id()),
        )
        .await
    }

    async fn start_round(&self, conn: &Connection) -> Result<(), RpsError> {
        let game_id = conn.game_id().ok_or(RpsError::NotInGame)?;
        let handle = self.lookup(&game_id).await?;

        let started = {
            let mut game = handle.lock().await;
            let round = game.new_round()?.clone();
            Message::round_started(&round, &*game)?
        };
        tracing::debug!(%game_id, "round started");
        self.broadcast(&game_id, &started, None).await
    }

    async fn make_move(
        &self,
        conn: &Connection,
        mv: Option<&str>,
    ) -> Result<(), RpsError> {
        let game_id = conn.game_id().ok_or(RpsError::NotInGame)?;
        let mv = mv.ok_or_else(|| GameError::InvalidMove(String::new()))?;
        let handle = self.lookup(&game_id).await?;

        let played = {
            let mut game = handle.lock().await;
            if game.current_round().is_none() {
                return Err(GameError::NoActiveRound.into());
            }
            let mv: Move = mv.parse()?;
            let slot = game
                .slot_of(conn.player_id())
                .ok_or_else(|| GameError::NotAPlayer(conn.player_id().clone()))?;
            match game.submit_move(slot, mv)? {
                Some(round) => Some(Message::round_played(&round, &*game)?),
                None => None,
            }
        };

        match played {
            Some(msg) => {
                tracing::info!(%game_id, "round played");
                self.broadcast(&game_id, &msg, None).await
            }
            None => Ok(()),
        }
    }

    /// Queues the sender for a random opponent. When two players are
    /// waiting, opens a game for them and tells both.
    async fn find_match(&self, conn: &Connection) -> Result<(), RpsError> {
        self.queue
            .add_player(Player::new(conn.player_id().clone()))
            .await;

        let Some((a, b)) = self.queue.try_match().await else {
            return Ok(());
        };

        let handle = match self.games.create_game(a.id.clone(), b.id.clone()).await {
            Ok(handle) => handle,
            Err(e) => {
                self.queue.add_player(a).await;
                self.queue.add_player(b).await;
                return Err(e.into());
            }
        };

        let found = {
            let game = handle.lock().await;
            Message::match_found(game.id(), &*game)?
        };
        for player in [&a.id, &b.id] {
            if !self.unicast(player, &found).await? {
                tracing::warn!(player_id = %player, "matched player is not connected");
            }
        }
        Ok(())
    }

    async fn cancel_match(&self, conn: &Connection) -> Result<(), RpsError> {
        if self.queue.remove_player(conn.player_id()).await {
            tracing::debug!(player_id = %conn.player_id(), "left match queue");
        }
        Ok(())
    }

    // -- maintenance -------------------------------------------------------

    /// Removes games idle for longer than `max_age` and drops their
    /// rosters. Returns the removed identifiers.
    pub async fn sweep(&self, max_age: Duration) -> Vec<GameId> {
        let removed = self.games.sweep_expired(max_age).await;
        if removed.is_empty() {
            return removed;
        }

        let orphaned: Vec<Arc<Connection>> = {
            let mut rosters = self.rosters.lock().await;
            removed
                .iter()
                .filter_map(|id| rosters.remove(id))
                .flatten()
                .collect()
        };
        for conn in orphaned {
            for id in &removed {
                conn.clear_game_id(id);
            }
        }
        removed
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Player identities on the roster of `game_id`, in join order.
    pub async fn roster(&self, game_id: &GameId) -> Vec<PlayerId> {
        self.rosters
            .lock()
            .await
            .get(game_id)
            .map(|roster| roster.iter().map(|c| c.player_id().clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_game::ScriptedIdGenerator;
    use serde_json::Value;
    use tokio::sync::mpsc;

    fn server(ids: &[&str]) -> Server {
        Server::new(
            Manager::with_generator(ScriptedIdGenerator::new(ids.iter().copied())),
            JsonCodec,
        )
    }

    async fn connect(
        hub: &Server,
        player: &str,
    ) -> (Arc<Connection>, mpsc::Receiver<Vec<u8>>) {
        let (conn, rx) = Connection::new(player.into(), 16);
        hub.attach(conn.clone()).await;
        (conn, rx)
    }

    fn next(rx: &mut mpsc::Receiver<Vec<u8>>) -> Value {
        let bytes = rx.try_recv().expect("expected a queued message");
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(hub: &Server, conn: &Arc<Connection>, raw: &str) {
        hub.dispatch(conn, raw.as_bytes()).await;
    }

    // =====================================================================
    // attach() / detach()
    // =====================================================================

    #[tokio::test]
    async fn test_attach_replaces_and_closes_previous() {
        let hub = server(&[]);
        let (first, _rx1) = connect(&hub, "alice").await;
        let (second, _rx2) = connect(&hub, "alice").await;

        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_detach_stale_connection_keeps_successor() {
        let hub = server(&[]);
        let (first, _rx1) = connect(&hub, "alice").await;
        let (second, mut rx2) = connect(&hub, "alice").await;

        hub.detach(&first).await;

        assert_eq!(hub.connection_count().await, 1);
        assert!(
            hub.unicast(&"alice".into(), &Message::new("ping"))
                .await
                .unwrap()
        );
        assert_eq!(next(&mut rx2)["type"], "ping");
        assert!(!second.is_closed());
    }

    #[tokio::test]
    async fn test_detach_marks_player_disconnected() {
        let hub = server(&["g1"]);
        let game = hub
            .manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (alice, _rx) = connect(&hub, "alice").await;
        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        assert!(game.lock().await.is_connected(rps_game::Slot::P1));

        hub.detach(&alice).await;

        assert!(!game.lock().await.is_connected(rps_game::Slot::P1));
        assert!(hub.roster(&"g1".into()).await.is_empty());
        assert!(alice.is_closed());
    }

    // =====================================================================
    // join_game()
    // =====================================================================

    #[tokio::test]
    async fn test_join_game_without_id_bootstraps_game() {
        let hub = server(&["fresh"]);
        let (alice, mut rx) = connect(&hub, "alice").await;

        send(&hub, &alice, r#"{"type":"join_game","data":{}}"#).await;

        let msg = next(&mut rx);
        assert_eq!(msg["type"], "game_joined");
        assert_eq!(msg["data"]["gameID"], "fresh");
        assert_eq!(msg["data"]["game"]["p1"], "alice");
        assert_eq!(msg["data"]["game"]["p2"], "");
        assert_eq!(msg["data"]["game"]["p1Connected"], true);
        assert_eq!(alice.game_id(), Some("fresh".into()));
    }

    #[tokio::test]
    async fn test_join_game_unknown_id_reports_not_found() {
        let hub = server(&[]);
        let (alice, mut rx) = connect(&hub, "alice").await;

        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"nope"}}"#)
            .await;

        let msg = next(&mut rx);
        assert_eq!(msg["type"], "error");
        assert_eq!(msg["data"]["message"], "game not found");
        assert_eq!(alice.game_id(), None);
    }

    #[tokio::test]
    async fn test_join_game_non_string_id_is_invalid() {
        let hub = server(&[]);
        let (alice, mut rx) = connect(&hub, "alice").await;

        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":7}}"#).await;

        assert_eq!(next(&mut rx)["data"]["message"], "invalid game_id");
    }

    #[tokio::test]
    async fn test_join_game_notifies_rest_of_roster() {
        let hub = server(&["g1"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (alice, mut rx_a) = connect(&hub, "alice").await;
        let (bob, mut rx_b) = connect(&hub, "bob").await;

        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        assert_eq!(next(&mut rx_a)["type"], "game_joined");

        send(&hub, &bob, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        assert_eq!(next(&mut rx_b)["type"], "game_joined");
        assert!(rx_b.try_recv().is_err(), "joiner is excluded");

        let joined = next(&mut rx_a);
        assert_eq!(joined["type"], "player_joined");
        assert_eq!(joined["data"]["playerID"], "bob");
    }

    #[tokio::test]
    async fn test_join_game_twice_keeps_single_roster_entry() {
        let hub = server(&["g1"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (alice, _rx) = connect(&hub, "alice").await;

        for _ in 0..2 {
            send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#)
                .await;
        }
        assert_eq!(hub.roster(&"g1".into()).await, vec![PlayerId::from("alice")]);
    }

    #[tokio::test]
    async fn test_join_game_switching_leaves_old_roster() {
        let hub = server(&["g1", "g2"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        hub.manager()
            .create_game("alice".into(), "carol".into())
            .await
            .unwrap();
        let (alice, _rx) = connect(&hub, "alice").await;

        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g2"}}"#).await;

        assert!(hub.roster(&"g1".into()).await.is_empty());
        assert_eq!(hub.roster(&"g2".into()).await, vec![PlayerId::from("alice")]);
        assert_eq!(alice.game_id(), Some("g2".into()));
    }

    #[tokio::test]
    async fn test_join_game_survives_concurrent_stale_detach() {
        for detach_first in [false, true] {
            let hub = Arc::new(server(&["g1"]));
            let game = hub
                .manager()
                .create_game("alice".into(), "bob".into())
                .await
                .unwrap();
            let (first, _rx1) = connect(&hub, "alice").await;
            send(&hub, &first, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
            let (second, mut rx2) = connect(&hub, "alice").await;
            assert!(first.is_closed());

            // Both tasks queue up behind the held game lock.
            let guard = game.lock().await;
            let joining = {
                let (hub, second) = (Arc::clone(&hub), Arc::clone(&second));
                async move { hub.join_game(&second, GameRef::Id("g1".into())).await }
            };
            let leaving = {
                let (hub, first) = (Arc::clone(&hub), Arc::clone(&first));
                async move { hub.detach(&first).await }
            };
            let (join_task, detach_task) = if detach_first {
                let d = tokio::spawn(leaving);
                tokio::time::sleep(Duration::from_millis(10)).await;
                (tokio::spawn(joining), d)
            } else {
                let j = tokio::spawn(joining);
                tokio::time::sleep(Duration::from_millis(10)).await;
                (j, tokio::spawn(leaving))
            };
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(guard);

            join_task.await.unwrap().expect("join should succeed");
            detach_task.await.unwrap();

            assert!(
                game.lock().await.is_connected(rps_game::Slot::P1),
                "detach_first = {detach_first}"
            );
            assert_eq!(hub.roster(&"g1".into()).await, vec![PlayerId::from("alice")]);
            assert_eq!(next(&mut rx2)["type"], "game_joined");
        }
    }

    // =====================================================================
    // broadcast()
    // =====================================================================

    #[tokio::test]
    async fn test_broadcast_unknown_game_is_noop() {
        let hub = server(&[]);
        hub.broadcast(&"ghost".into(), &Message::new("ping"), None)
            .await
            .expect("no-op");
    }

    #[tokio::test]
    async fn test_broadcast_respects_exclude() {
        let hub = server(&["g1"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (alice, mut rx_a) = connect(&hub, "alice").await;
        let (bob, mut rx_b) = connect(&hub, "bob").await;
        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        send(&hub, &bob, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        hub.broadcast(&"g1".into(), &Message::new("ping"), Some(&"alice".into()))
            .await
            .unwrap();

        assert!(rx_a.try_recv().is_err());
        assert_eq!(next(&mut rx_b)["type"], "ping");
    }

    #[tokio::test]
    async fn test_broadcast_after_reconnect_reaches_only_new_connection() {
        let hub = server(&["g1"]);
        let game = hub
            .manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (first, mut rx1) = connect(&hub, "alice").await;
        send(&hub, &first, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        assert_eq!(next(&mut rx1)["type"], "game_joined");

        let (second, mut rx2) = connect(&hub, "alice").await;
        assert!(first.is_closed());
        send(&hub, &second, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        assert_eq!(next(&mut rx2)["type"], "game_joined");

        hub.broadcast(&"g1".into(), &Message::new("ping"), None)
            .await
            .unwrap();

        assert_eq!(next(&mut rx2)["type"], "ping");
        assert!(rx1.try_recv().is_err(), "closed connection gets nothing");

        // The stale detach leaves the new connection seated and online.
        hub.detach(&first).await;
        assert_eq!(hub.roster(&"g1".into()).await, vec![PlayerId::from("alice")]);
        assert!(game.lock().await.is_connected(rps_game::Slot::P1));
    }

    // =====================================================================
    // start_round / make_move
    // =====================================================================

    #[tokio::test]
    async fn test_start_round_without_game_reports_not_in_game() {
        let hub = server(&[]);
        let (alice, mut rx) = connect(&hub, "alice").await;

        send(&hub, &alice, r#"{"type":"start_round","data":{}}"#).await;

        assert_eq!(next(&mut rx)["data"]["message"], "not in a game");
    }

    #[tokio::test]
    async fn test_full_round_broadcasts_start_and_result() {
        let hub = server(&["g1"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (alice, mut rx_a) = connect(&hub, "alice").await;
        let (bob, mut rx_b) = connect(&hub, "bob").await;
        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        send(&hub, &bob, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        send(&hub, &alice, r#"{"type":"start_round","data":{}}"#).await;
        assert_eq!(next(&mut rx_a)["type"], "round_started");
        assert_eq!(next(&mut rx_b)["type"], "round_started");

        send(&hub, &alice, r#"{"type":"make_move","data":{"move":"rock"}}"#).await;
        assert!(rx_a.try_recv().is_err(), "no broadcast after one move");

        send(&hub, &bob, r#"{"type":"make_move","data":{"move":"scissors"}}"#).await;
        for rx in [&mut rx_a, &mut rx_b] {
            let msg = next(rx);
            assert_eq!(msg["type"], "round_played");
            assert_eq!(msg["data"]["round"]["outcome"], "p1");
            assert_eq!(msg["data"]["game"]["p1Wins"], 1);
            assert_eq!(msg["data"]["game"]["p2Wins"], 0);
            assert_eq!(msg["data"]["game"]["rounds"].as_array().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_make_move_rejects_invalid_token() {
        let hub = server(&["g1"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (alice, mut rx) = connect(&hub, "alice").await;
        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        send(&hub, &alice, r#"{"type":"start_round","data":{}}"#).await;
        while rx.try_recv().is_ok() {}

        send(&hub, &alice, r#"{"type":"make_move","data":{"move":"lizard"}}"#).await;
        assert_eq!(next(&mut rx)["data"]["message"], "invalid move");

        send(&hub, &alice, r#"{"type":"make_move","data":{}}"#).await;
        assert_eq!(next(&mut rx)["data"]["message"], "invalid move");
    }

    #[tokio::test]
    async fn test_make_move_without_round_reports_no_active_round() {
        let hub = server(&["g1"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (alice, mut rx) = connect(&hub, "alice").await;
        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        while rx.try_recv().is_ok() {}

        send(&hub, &alice, r#"{"type":"make_move","data":{"move":"rock"}}"#).await;
        assert_eq!(next(&mut rx)["data"]["message"], "no active round");

        // An unparseable token is only looked at once a round is open.
        send(&hub, &alice, r#"{"type":"make_move","data":{"move":"lizard"}}"#).await;
        assert_eq!(next(&mut rx)["data"]["message"], "no active round");
    }

    #[tokio::test]
    async fn test_make_move_missing_token_checked_before_game_lookup() {
        let hub = server(&["g1"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (alice, mut rx) = connect(&hub, "alice").await;
        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        while rx.try_recv().is_ok() {}
        hub.manager().remove_game(&"g1".into()).await.unwrap();

        send(&hub, &alice, r#"{"type":"make_move","data":{"move":7}}"#).await;
        assert_eq!(next(&mut rx)["data"]["message"], "invalid move");

        send(&hub, &alice, r#"{"type":"make_move","data":{"move":"lizard"}}"#).await;
        assert_eq!(next(&mut rx)["data"]["message"], "game not found");
    }

    #[tokio::test]
    async fn test_make_move_from_stranger_is_rejected() {
        let hub = server(&["g1"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (eve, mut rx) = connect(&hub, "eve").await;
        send(&hub, &eve, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        send(&hub, &eve, r#"{"type":"start_round","data":{}}"#).await;
        while rx.try_recv().is_ok() {}

        send(&hub, &eve, r#"{"type":"make_move","data":{"move":"rock"}}"#).await;
        assert_eq!(next(&mut rx)["data"]["message"], "not a player in this game");

        // Move validity is checked before the seat.
        send(&hub, &eve, r#"{"type":"make_move","data":{"move":"lizard"}}"#).await;
        assert_eq!(next(&mut rx)["data"]["message"], "invalid move");
    }

    // =====================================================================
    // dispatch() edge cases
    // =====================================================================

    #[tokio::test]
    async fn test_dispatch_unknown_type_is_ignored() {
        let hub = server(&[]);
        let (alice, mut rx) = connect(&hub, "alice").await;
        send(&hub, &alice, r#"{"type":"fly_to_moon","data":{}}"#).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_malformed_frame_reports_invalid_message() {
        let hub = server(&[]);
        let (alice, mut rx) = connect(&hub, "alice").await;
        send(&hub, &alice, "{not json").await;
        assert_eq!(next(&mut rx)["data"]["message"], "invalid message");
    }

    // =====================================================================
    // matchmaking
    // =====================================================================

    #[tokio::test]
    async fn test_find_match_pairs_two_players() {
        let hub = server(&["m1"]);
        let (alice, mut rx_a) = connect(&hub, "alice").await;
        let (bob, mut rx_b) = connect(&hub, "bob").await;

        send(&hub, &alice, r#"{"type":"find_match","data":{}}"#).await;
        assert!(rx_a.try_recv().is_err());
        assert_eq!(hub.queue().queue_size().await, 1);

        send(&hub, &bob, r#"{"type":"find_match","data":{}}"#).await;
        for rx in [&mut rx_a, &mut rx_b] {
            let msg = next(rx);
            assert_eq!(msg["type"], "match_found");
            assert_eq!(msg["data"]["gameID"], "m1");
        }
        assert_eq!(hub.queue().queue_size().await, 0);
        assert!(hub.manager().get_game(&"m1".into()).await.is_some());
    }

    #[tokio::test]
    async fn test_cancel_match_and_detach_leave_queue() {
        let hub = server(&[]);
        let (alice, _rx_a) = connect(&hub, "alice").await;
        let (bob, _rx_b) = connect(&hub, "bob").await;

        send(&hub, &alice, r#"{"type":"find_match","data":{}}"#).await;
        send(&hub, &alice, r#"{"type":"cancel_match","data":{}}"#).await;
        assert_eq!(hub.queue().queue_size().await, 0);

        // Bob asks for a match but is gone before anyone else shows up.
        hub.queue().add_player(Player::new("bob".into())).await;
        hub.detach(&bob).await;
        assert_eq!(hub.queue().queue_size().await, 0);
    }

    // =====================================================================
    // sweep()
    // =====================================================================

    #[tokio::test]
    async fn test_sweep_drops_rosters_of_expired_games() {
        let hub = server(&["g1"]);
        hub.manager()
            .create_game("alice".into(), "bob".into())
            .await
            .unwrap();
        let (alice, _rx) = connect(&hub, "alice").await;
        send(&hub, &alice, r#"{"type":"join_game","data":{"game_id":"g1"}}"#).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let removed = hub.sweep(Duration::ZERO).await;

        assert_eq!(removed, vec![GameId::from("g1")]);
        assert!(hub.roster(&"g1".into()).await.is_empty());
        assert_eq!(alice.game_id(), None);
    }
}
