//! HTTP endpoints receiving mentions and exposing the collections.

use std::{fmt::Display, future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{bot::Bot, command::collection_name, event::Event, storage::RecordStore};

struct HttpState {
    bot: Bot,
}

/// Response body for the `/healthz` endpoint.
#[derive(Serialize, Deserialize)]
struct Health {
    /// Always "ok" when the server is running.
    status: String,
}

/// Build the application router.
pub fn router(bot: Bot) -> Router {
    let state = Arc::new(HttpState { bot });
    Router::new()
        .route("/", get(names))
        .route("/healthz", get(healthz))
        .route("/command", post(command))
        .route("/select", post(select))
        .route("/:name", get(collection))
        .with_state(state)
}

/// Start the HTTP server and run until `shutdown` resolves.
pub async fn serve_http(
    addr: SocketAddr,
    bot: Bot,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(bot).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// `{"err": ...}` payload with status 404, used whenever no reply can be made.
fn error_response(err: impl Display) -> Response {
    let body = serde_json::json!({ "err": err.to_string() });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

fn parse_mention(body: &Bytes) -> std::result::Result<Event, Response> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("unreadable mention: {e}");
        error_response(e)
    })
}

/// Health check endpoint.
async fn healthz() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

/// Run a command mention and return the signed reply.
async fn command(State(state): State<Arc<HttpState>>, body: Bytes) -> Response {
    let mention = match parse_mention(&body) {
        Ok(ev) => ev,
        Err(resp) => return resp,
    };
    info!(mention = %mention.id, author = %mention.pubkey, "POST /command");
    match state.bot.handle_command(&mention).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => error_response(e),
    }
}

/// Reply with a random image of the collection named in the mention.
async fn select(State(state): State<Arc<HttpState>>, body: Bytes) -> Response {
    let mention = match parse_mention(&body) {
        Ok(ev) => ev,
        Err(resp) => return resp,
    };
    info!(mention = %mention.id, "POST /select");
    match state.bot.handle_select(&mention).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => error_response(e),
    }
}

/// Collection names as a JSON array.
async fn names(State(state): State<Arc<HttpState>>) -> Response {
    match state.bot.store().list_names().await {
        Ok(names) => Json(names).into_response(),
        Err(e) => error_response(e),
    }
}

/// Records of one collection; a trailing `画像` in the path is ignored.
async fn collection(State(state): State<Arc<HttpState>>, Path(name): Path<String>) -> Response {
    let name = collection_name(&name);
    match state.bot.store().list_by_name(&name).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}
