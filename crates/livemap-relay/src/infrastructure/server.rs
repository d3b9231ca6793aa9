//! axum server: the `/ws` subscriber endpoint and the `/api` routes.
//!
//! | Route                     | Behaviour                                              |
//! |---------------------------|--------------------------------------------------------|
//! | `GET /ws`                 | WebSocket upgrade; joins the broadcast                 |
//! | `GET /api/chatlog`        | Proxies the game server's chat log (raw JSON)          |
//! | `GET /api/playerlocations`| Proxies the game server's roster (raw JSON)            |
//! | `GET /api/health`         | `{status, timestamp, upstream, subscribers, ...}`      |
//!
//! Every `/api` route is rate limited per client IP.  `/ws` is not.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::application::{HealthReport, SharedRelay, Subscription};
use crate::infrastructure::api_error::ApiError;

/// How long a closing subscriber's writer may take to flush the close reply.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

// ── Public API ────────────────────────────────────────────────────────────────

/// Builds the full router around one shared relay.
pub fn create_router(relay: SharedRelay) -> Router {
    let api = Router::new()
        .route("/chatlog", get(chat_log))
        .route("/playerlocations", get(player_locations))
        .route("/health", get(health))
        .route_layer(middleware::from_fn_with_state(relay.clone(), rate_limit));

    Router::new()
        .route("/ws", get(ws_handler))
        .nest("/api", api)
        .with_state(relay)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds `bind_addr` and serves until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_server(
    bind_addr: SocketAddr,
    relay: SharedRelay,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {bind_addr}"))?;
    serve(listener, relay, shutdown).await
}

/// Serves on an already-bound listener.  Tests bind port 0 and call this.
///
/// # Errors
///
/// Returns an error if the server fails while running.
pub async fn serve(
    listener: TcpListener,
    relay: SharedRelay,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr().context("listener has no local address")?;
    info!("relay listening on {local_addr}");

    axum::serve(
        listener,
        create_router(relay).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await
    .context("relay HTTP server failed")?;

    info!("relay HTTP server stopped");
    Ok(())
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// Rejects the request with 429 once the caller's IP is over budget.
///
/// Requests without connection info (in-process tests) share one bucket.
async fn rate_limit(
    State(relay): State<SharedRelay>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if let Err(limited) = relay.check_rate(ip) {
        debug!(%ip, path = %req.uri().path(), "rate limit exceeded");
        return Err(limited.into());
    }
    Ok(next.run(req).await)
}

// ── REST handlers ─────────────────────────────────────────────────────────────

async fn chat_log(State(relay): State<SharedRelay>) -> Result<Response, ApiError> {
    let body = relay.snapshots().chat_log().await.map_err(|e| {
        warn!("chat log fetch failed: {e}");
        ApiError::ChatLog(e)
    })?;
    Ok(json_passthrough(body))
}

async fn player_locations(State(relay): State<SharedRelay>) -> Result<Response, ApiError> {
    let body = relay.snapshots().player_locations().await.map_err(|e| {
        warn!("player locations fetch failed: {e}");
        ApiError::PlayerLocations(e)
    })?;
    Ok(json_passthrough(body))
}

async fn health(State(relay): State<SharedRelay>) -> Json<HealthReport> {
    Json(relay.health().await)
}

/// Returns an upstream body unchanged with a JSON content type.
fn json_passthrough(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

// ── WebSocket session ─────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(relay): State<SharedRelay>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_subscriber(socket, relay))
}

/// Runs one subscriber from upgrade to close.
///
/// The writer drains the subscriber's queue into the socket.  The reader
/// only watches for close; inbound messages are ignored.  When the reader
/// ends, the writer is told to stop and completes the close handshake
/// itself, so a browser that closed cleanly gets a clean close back.  The
/// subscriber is removed from the set once both are done.
async fn handle_subscriber(socket: WebSocket, relay: SharedRelay) {
    let broadcaster = Arc::clone(relay.broadcaster());
    let Subscription { id, mut frames } = broadcaster.subscribe().await;
    info!(subscriber = %id, "subscriber connected");

    let (mut sink, mut stream) = socket.split();
    let closing = CancellationToken::new();
    let writer_closing = closing.clone();

    let mut writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = writer_closing.cancelled() => break,
                frame = frames.recv() => {
                    let Some(frame) = frame else { break };
                    if sink.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
            }
        }
        // Sends our Close, or flushes the reply to the peer's.
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    });

    let mut reader = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => {
            closing.cancel();
            if timeout(CLOSE_GRACE, &mut writer).await.is_err() {
                debug!(subscriber = %id, "close handshake timed out");
                writer.abort();
            }
        }
    }

    broadcaster.unsubscribe(id).await;
    info!(subscriber = %id, "subscriber disconnected");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use http_body_util::BodyExt;
    use livemap_core::LinkState;
    use tokio::sync::watch;
    use tower::ServiceExt;

    use crate::application::snapshot::MockSnapshotSource;
    use crate::application::{RelayService, SnapshotError};
    use crate::domain::RateLimitConfig;

    fn relay_with(mock: MockSnapshotSource, max_requests: u32) -> SharedRelay {
        let (_tx, rx) = watch::channel(LinkState::Connected);
        Arc::new(RelayService::new(
            RateLimitConfig {
                max_requests,
                window: Duration::from_secs(60),
            },
            Arc::new(mock),
            rx,
        ))
    }

    fn get_from(uri: &str, peer: [u8; 4]) -> HttpRequest<Body> {
        let mut req = HttpRequest::builder().uri(uri).body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
        req
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_returns_ok_with_upstream_state() {
        // Arrange
        let app = create_router(relay_with(MockSnapshotSource::new(), 10));

        // Act
        let resp = app.oneshot(get_from("/api/health", [127, 0, 0, 1])).await.unwrap();

        // Assert
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["upstream"], "connected");
        assert_eq!(json["subscribers"], 0);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_chat_log_body_is_passed_through() {
        // Arrange
        let mut mock = MockSnapshotSource::new();
        mock.expect_chat_log()
            .times(1)
            .returning(|| Ok(r#"{"Messages":[]}"#.to_string()));
        let app = create_router(relay_with(mock, 10));

        // Act
        let resp = app.oneshot(get_from("/api/chatlog", [127, 0, 0, 1])).await.unwrap();

        // Assert
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"Messages":[]}"#);
    }

    #[tokio::test]
    async fn test_player_locations_failure_returns_500() {
        let mut mock = MockSnapshotSource::new();
        mock.expect_player_locations()
            .returning(|| Err(SnapshotError::Status(502)));
        let app = create_router(relay_with(mock, 10));

        let resp = app
            .oneshot(get_from("/api/playerlocations", [127, 0, 0, 1]))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({ "error": "Failed to fetch player locations" })
        );
    }

    #[tokio::test]
    async fn test_rate_limit_is_per_ip() {
        // Arrange: budget of 2 per window
        let app = create_router(relay_with(MockSnapshotSource::new(), 2));

        // Act
        for _ in 0..2 {
            let ok = app.clone().oneshot(get_from("/api/health", [10, 0, 0, 1])).await.unwrap();
            assert_eq!(ok.status(), StatusCode::OK);
        }
        let limited = app.clone().oneshot(get_from("/api/health", [10, 0, 0, 1])).await.unwrap();
        let other_ip = app.oneshot(get_from("/api/health", [10, 0, 0, 2])).await.unwrap();

        // Assert
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(limited).await,
            serde_json::json!({ "error": "Too many requests" })
        );
        assert_eq!(other_ip.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limited_request_does_not_reach_upstream() {
        // Arrange: `times(1)` fails the test if the second request gets through
        let mut mock = MockSnapshotSource::new();
        mock.expect_chat_log()
            .times(1)
            .returning(|| Ok("{}".to_string()));
        let app = create_router(relay_with(mock, 1));

        // Act
        let first = app.clone().oneshot(get_from("/api/chatlog", [10, 0, 0, 9])).await.unwrap();
        let second = app.oneshot(get_from("/api/chatlog", [10, 0, 0, 9])).await.unwrap();

        // Assert
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_router(relay_with(MockSnapshotSource::new(), 10));

        let resp = app.oneshot(get_from("/api/nope", [127, 0, 0, 1])).await.unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
