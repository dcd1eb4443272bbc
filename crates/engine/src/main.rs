//! PartyHub Engine — the party session server binary.
//!
//! Accepts WebSocket connections at `/ws/party/{party_id}` (optional
//! `character_id`/`user_id` query params), admits them through the Party
//! Hub, and forwards inbound frames to the Macro Dispatcher or the plain
//! chat path for the lifetime of the socket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use partyhub_engine::app_state::AppState;
use partyhub_engine::infrastructure::clock::{SystemClock, SystemRandom};
use partyhub_engine::infrastructure::config::AppConfig;
use partyhub_engine::infrastructure::persistence::InMemoryStore;
use partyhub_engine::party::hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "partyhub_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PartyHub Engine");

    let config = AppConfig::from_env()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        listen_port = config.listen_port,
        "Configuration loaded"
    );

    // The entity store is a narrow trait (`PersistencePort`); a real
    // deployment swaps `InMemoryStore` for a SQL/document-store adapter
    // without touching the Party Hub or Macro Dispatcher.
    let store = InMemoryStore::new()
        .with_ability_max_uses_per_level(config.ability_max_uses_per_level.max(1) as u32);
    let state = AppState::new(
        Arc::new(store),
        Arc::new(SystemClock::new()),
        Arc::new(SystemRandom::new()),
        config,
    );
    let listen_port = state.config.listen_port;
    let bind_addr = state.config.bind_addr.clone();
    let state = Arc::new(state);

    let app = Router::new()
        .route("/healthz", get(health_check))
        .route("/ws/party/:party_id", get(ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{bind_addr}:{listen_port}").parse()?;
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

/// Query parameters accepted on the WebSocket upgrade — §6.1.
#[derive(Debug, Deserialize)]
struct ConnectParams {
    character_id: Option<String>,
    user_id: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(party_id): Path<String>,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, party_id, params))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    party_id_raw: String,
    params: ConnectParams,
) {
    let Ok(party_id) = party_id_raw.parse::<partyhub_domain::ids::PartyId>() else {
        tracing::warn!(party_id = %party_id_raw, "rejected connection: malformed party_id");
        return;
    };
    let character_id = params
        .character_id
        .as_deref()
        .and_then(|raw| raw.parse::<partyhub_domain::ids::CharacterId>().ok());
    let user_id = params
        .user_id
        .as_deref()
        .and_then(|raw| raw.parse::<partyhub_domain::ids::UserId>().ok());

    let connection = match hub::connect(&state, party_id, character_id, user_id).await {
        Ok(connection) => connection,
        Err(err) => {
            tracing::warn!(%party_id, error = %err, "connection rejected");
            return;
        }
    };
    let client_id = connection.client_id;
    let mut receiver = connection.receiver;

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Ok(json) = serde_json::to_string(&message) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(frame) => hub::handle_frame(&state, party_id, client_id, frame).await,
                Err(err) => {
                    hub::reject_malformed(&state, party_id, client_id, err).await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(%party_id, %client_id, error = %err, "socket read error");
                break;
            }
        }
    }

    send_task.abort();
    hub::disconnect(&state, party_id, client_id).await;
}
