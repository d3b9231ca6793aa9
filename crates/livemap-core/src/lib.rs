//! # livemap-core
//!
//! Shared library for the LiveMap relay and its subscribers.
//!
//! The relay keeps one WebSocket open to the game server's live map feed and
//! fans every frame out to any number of dashboard clients.  Both ends of
//! that chain (the relay's upstream link and each client's subscriber link)
//! run the same reconnect loop, so the pieces they share live here:
//!
//! - **`link`** – The `disconnected → connecting → connected` state machine
//!   and the single-slot [`ReconnectTimer`] that guarantees at most one
//!   pending reconnect per link.
//!
//! - **`protocol`** – The consumer-side view of relayed frames: a tagged
//!   union keyed by the JSON `"type"` field, plus lenient parsers for the
//!   game server's roster and chat snapshots.  The relay itself never decodes
//!   frames; only consumers do.
//!
//! This crate opens no sockets.  Its only runtime dependency is the tokio
//! timer used by [`ReconnectTimer`].

pub mod link;
pub mod protocol;

pub use link::{LinkError, LinkState, ReconnectTimer};
pub use protocol::messages::{
    decode_event, encode_event, ConnectionStatus, MapChunk, Player, RelayEvent,
};
pub use protocol::snapshot::{parse_chat_log, parse_player_locations, ChatMessage};
pub use protocol::ProtocolError;
