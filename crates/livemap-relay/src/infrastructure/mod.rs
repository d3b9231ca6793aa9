//! Infrastructure layer for livemap-relay.
//!
//! Every socket the relay opens lives here:
//!
//! - [`upstream`] – the single WebSocket client to the game server's live map.
//! - [`server`] – the axum server for `/ws` and `/api/*`.
//! - [`snapshot_client`] – the `reqwest` client behind the `/api` proxies.

pub mod api_error;
pub mod server;
pub mod snapshot_client;
pub mod upstream;

pub use api_error::ApiError;
pub use server::{create_router, run_server, serve};
pub use snapshot_client::HttpSnapshotSource;
pub use upstream::UpstreamLink;
