//! Consumer-side message envelope and upstream snapshot parsing.

pub mod messages;
pub mod snapshot;

use thiserror::Error;

pub use messages::{decode_event, encode_event, ConnectionStatus, MapChunk, Player, RelayEvent};
pub use snapshot::{parse_chat_log, parse_player_locations, ChatMessage};

/// Errors raised while interpreting relayed frames or upstream snapshots.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The text is not valid JSON, or does not match the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A value could not be serialized to JSON.
    #[error("failed to encode payload: {0}")]
    Encode(String),
}
