//! # RPS server
//!
//! Real-time two-player Rock-Paper-Scissors backend. Clients connect over
//! WebSocket with `?player_id=...`, join or are matched into a game, and
//! exchange JSON `{type, data}` messages with the [`Server`] hub.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rps_server::prelude::*;
//!
//! # async fn start() -> Result<(), RpsError> {
//! let server = RpsServer::builder().bind("0.0.0.0:8080").build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod connection;
mod error;
mod hub;
mod server;

pub use config::ServerConfig;
pub use connection::Connection;
pub use error::RpsError;
pub use hub::Server;
pub use server::{RpsServer, RpsServerBuilder};

/// Everything needed to run or embed a server.
pub mod prelude {
    pub use crate::{
        Connection, RpsError, RpsServer, RpsServerBuilder, Server,
        ServerConfig,
    };
    pub use rps_game::{
        Game, GameError, IdGenerator, MAX_ROUNDS, Manager, Move, Outcome,
        Round, ScriptedIdGenerator, Slot, UuidGenerator,
    };
    pub use rps_matchmaking::{MatchQueue, Player};
    pub use rps_protocol::{
        Codec, GameId, JsonCodec, Message, PlayerId, ProtocolError, Request,
    };
    pub use rps_transport::TransportError;
}
