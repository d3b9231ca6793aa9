//! JSON envelope for frames delivered to relay subscribers.
//!
//! The relay forwards upstream frames byte-for-byte and only ever produces
//! one frame of its own (`connection_status`).  Interpretation happens at
//! the consumer, which switches on the `"type"` field:
//!
//! ```json
//! {"type":"connection_status","connected":true,"timestamp":"2024-05-01T12:00:00Z"}
//! {"type":"player_update","players":[{"name":"Guide","x":4200.0,"y":1200.0,"active":true}]}
//! {"type":"chunk_update","chunkX":3,"chunkY":1,"width":2,"height":1,"colors":["#000000","#ffffff"]}
//! ```
//!
//! Any other `"type"` decodes to [`RelayEvent::Unknown`] so new upstream
//! frame kinds never break an older consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// One decoded frame, keyed by its `"type"` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Upstream connectivity as seen by the relay.  Sent by the relay to each
    /// new subscriber before any data frame.
    ConnectionStatus(ConnectionStatus),

    /// Full replacement of the player roster.
    PlayerUpdate {
        #[serde(default)]
        players: Vec<Player>,
    },

    /// One rectangular block of map pixels.
    ChunkUpdate(MapChunk),

    /// A frame kind this consumer does not understand.
    #[serde(other)]
    Unknown,
}

impl RelayEvent {
    /// The wire discriminator for this event, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayEvent::ConnectionStatus(_) => "connection_status",
            RelayEvent::PlayerUpdate { .. } => "player_update",
            RelayEvent::ChunkUpdate(_) => "chunk_update",
            RelayEvent::Unknown => "unknown",
        }
    }
}

/// Payload of a `connection_status` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// `true` while the relay's upstream link is open.
    pub connected: bool,
    /// When the relay produced this status.
    pub timestamp: DateTime<Utc>,
}

impl ConnectionStatus {
    /// A status stamped with the current time.
    pub fn now(connected: bool) -> Self {
        Self {
            connected,
            timestamp: Utc::now(),
        }
    }
}

/// A player marker on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    /// World X coordinate in pixels.
    pub x: f64,
    /// World Y coordinate in pixels.
    pub y: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A block of map pixels, stored row-major in `colors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapChunk {
    /// Chunk column (in chunk units, not pixels).
    pub chunk_x: i32,
    /// Chunk row (in chunk units, not pixels).
    pub chunk_y: i32,
    pub width: u32,
    pub height: u32,
    /// One CSS color string per pixel.
    #[serde(default)]
    pub colors: Vec<String>,
    /// Whole-map width in pixels, when the upstream includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_width: Option<u32>,
    /// Whole-map height in pixels, when the upstream includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_height: Option<u32>,
}

impl MapChunk {
    /// The `(chunk_x, chunk_y)` key a chunk cache stores this block under.
    pub fn key(&self) -> (i32, i32) {
        (self.chunk_x, self.chunk_y)
    }

    /// Returns `true` if `colors` holds exactly `width * height` entries.
    pub fn is_complete(&self) -> bool {
        u64::from(self.width) * u64::from(self.height) == self.colors.len() as u64
    }
}

/// Decodes one relayed text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the text is not JSON, has no
/// `"type"` field, or a known kind is missing required fields.
pub fn decode_event(text: &str) -> Result<RelayEvent, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

/// Encodes an event as a JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_event(event: &RelayEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::Encode(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
