//! Dashboard state derived from relayed frames and polled snapshots.
//!
//! This is the headless equivalent of the browser's live map page.  Frames
//! are interpreted by their `type` discriminator:
//!
//! | Kind                | Effect                                            |
//! |---------------------|---------------------------------------------------|
//! | `player_update`     | Replaces the roster                               |
//! | `chunk_update`      | Caches the chunk by `(chunkX, chunkY)`, updates map size when present |
//! | `connection_status` | Records whether the relay reaches the game server |
//! | anything else       | Ignored                                           |
//!
//! A frame that is not valid JSON is reported to the caller and otherwise
//! ignored; the state is left untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use livemap_core::{
    decode_event, parse_chat_log, parse_player_locations, ChatMessage, LinkState, MapChunk,
    Player, ProtocolError, RelayEvent,
};
use tracing::{debug, warn};

/// Map size assumed until a chunk reports the real one.
pub const DEFAULT_MAP_SIZE: (u32, u32) = (4200, 1200);

/// Everything the live map page shows, rebuilt from frames and snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    /// Whether this subscriber's own link to the relay is up.
    pub connected: bool,
    /// Whether the relay last reported a live upstream connection.
    pub upstream_connected: bool,
    /// When the last `connection_status` frame was stamped by the relay.
    pub status_at: Option<DateTime<Utc>>,
    pub players: Vec<Player>,
    /// Roster size from the most recent polled snapshot.
    pub player_count: usize,
    pub chunks: BTreeMap<(i32, i32), MapChunk>,
    /// Whole-map size in pixels.
    pub map_size: (u32, u32),
    /// Most recent chat lines, oldest first.
    pub chat: Vec<ChatMessage>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            connected: false,
            upstream_connected: false,
            status_at: None,
            players: Vec::new(),
            player_count: 0,
            chunks: BTreeMap::new(),
            map_size: DEFAULT_MAP_SIZE,
            chat: Vec::new(),
        }
    }
}

impl DashboardState {
    /// An empty dashboard: disconnected, no players, default map size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows the subscriber link's state.
    pub fn set_link_state(&mut self, state: LinkState) {
        self.connected = state.is_connected();
    }

    /// Decodes and applies one relayed text frame.
    ///
    /// Returns the frame's kind (`"unknown"` for unrecognised types).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] if the frame is not a JSON
    /// object with a `type` field.  The state is unchanged in that case.
    pub fn apply_message(&mut self, text: &str) -> Result<&'static str, ProtocolError> {
        let event = decode_event(text)?;
        let kind = event.kind();
        self.apply_event(event);
        Ok(kind)
    }

    /// Applies one decoded frame.  Unknown kinds are ignored.
    pub fn apply_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::ConnectionStatus(status) => {
                self.upstream_connected = status.connected;
                self.status_at = Some(status.timestamp);
            }
            RelayEvent::PlayerUpdate { players } => {
                self.players = players;
            }
            RelayEvent::ChunkUpdate(chunk) => self.store_chunk(chunk),
            RelayEvent::Unknown => debug!("ignoring frame of unknown type"),
        }
    }

    fn store_chunk(&mut self, chunk: MapChunk) {
        if !chunk.is_complete() {
            warn!(
                x = chunk.chunk_x,
                y = chunk.chunk_y,
                expected = u64::from(chunk.width) * u64::from(chunk.height),
                got = chunk.colors.len(),
                "chunk colour count does not match its size"
            );
        }
        if let (Some(w), Some(h)) = (chunk.map_width, chunk.map_height) {
            if w > 0 && h > 0 {
                self.map_size = (w, h);
            }
        }
        self.chunks.insert(chunk.key(), chunk);
    }

    /// Applies a polled `/api/playerlocations` body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] if the body is not JSON.
    pub fn apply_player_snapshot(&mut self, body: &str) -> Result<(), ProtocolError> {
        let players = parse_player_locations(body)?;
        self.player_count = players.len();
        self.players = players;
        Ok(())
    }

    /// Applies a polled `/api/chatlog` body, keeping the latest lines.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] if the body is not JSON.
    pub fn apply_chat_snapshot(&mut self, body: &str) -> Result<(), ProtocolError> {
        self.chat = parse_chat_log(body)?;
        Ok(())
    }

    /// Number of roster entries marked active.
    pub fn active_players(&self) -> usize {
        self.players.iter().filter(|p| p.active).count()
    }

    /// One-line summary for log output.
    pub fn summary(&self) -> String {
        format!(
            "relay={} upstream={} players={}/{} chunks={} map={}x{} chat={}",
            if self.connected { "up" } else { "down" },
            if self.upstream_connected { "up" } else { "down" },
            self.active_players(),
            self.players.len(),
            self.chunks.len(),
            self.map_size.0,
            self.map_size.1,
            self.chat.len(),
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
