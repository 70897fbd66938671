//! Wire protocol for the RPS backend.
//!
//! - **Types** ([`Message`], [`Request`], [`PlayerId`], [`GameId`]): what
//!   travels on the wire and how inbound messages are routed.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes to messages and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Server hub (Request handlers)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{GameId, GameRef, Message, PlayerId, Request, kind};
