//! Parsers for the game server's REST snapshots (roster and chat log).
//!
//! The relay proxies these endpoints verbatim; consumers parse them here.
//! The upstream plugin has shipped several casings over time
//! (`PlayerName` / `Name` / `name`, `X` / `x`), so the roster parser accepts
//! any of them and falls back to neutral defaults instead of rejecting the
//! whole snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::messages::Player;
use super::ProtocolError;

/// How many chat lines a consumer keeps.
pub const CHAT_HISTORY_LEN: usize = 15;

/// One line of in-game chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub player: String,
    pub message: String,
    pub timestamp: String,
}

/// Parses a `/playerlocations` body of the form `{"Players": [...]}`.
///
/// A body without a `Players` array yields an empty roster.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the body is not JSON.
pub fn parse_player_locations(body: &str) -> Result<Vec<Player>, ProtocolError> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;

    let players = match root.get("Players").and_then(Value::as_array) {
        Some(list) => list.iter().map(player_from_snapshot).collect(),
        None => {
            debug!("roster snapshot has no Players array");
            Vec::new()
        }
    };
    Ok(players)
}

fn player_from_snapshot(entry: &Value) -> Player {
    let name = ["PlayerName", "Name", "name"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .unwrap_or("Unknown")
        .to_string();

    Player {
        name,
        x: first_number(entry, &["X", "x"]),
        y: first_number(entry, &["Y", "y"]),
        active: ["Active", "active"]
            .iter()
            .find_map(|key| entry.get(*key).and_then(Value::as_bool))
            .unwrap_or(true),
    }
}

fn first_number(entry: &Value, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_f64))
        .unwrap_or(0.0)
}

/// Parses a `/chatlog` body of the form `{"Messages": [...]}`, keeping the
/// most recent [`CHAT_HISTORY_LEN`] lines in their original order.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the body is not JSON.
pub fn parse_chat_log(body: &str) -> Result<Vec<ChatMessage>, ProtocolError> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;

    let Some(list) = root.get("Messages").and_then(Value::as_array) else {
        debug!("chat snapshot has no Messages array");
        return Ok(Vec::new());
    };

    let text = |entry: &Value, key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let skip = list.len().saturating_sub(CHAT_HISTORY_LEN);
    Ok(list
        .iter()
        .skip(skip)
        .map(|entry| ChatMessage {
            player: text(entry, "PlayerName"),
            message: text(entry, "Message"),
            timestamp: text(entry, "Timestamp"),
        })
        .collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
