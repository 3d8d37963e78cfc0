mod config;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use realtime_bridge::{
    accept, ClientEndpoint, ClientLink, Config, Connector, InboundFrame, OutboundFrame,
    RealtimeConnector, SessionOptions, StaticCredential,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::config::ServerConfig;

/// Shared by every connection.
#[derive(Clone)]
struct AppState {
    connector: Arc<dyn Connector>,
    options: SessionOptions,
    channel_capacity: usize,
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pumps one client socket through a [`ClientLink`] and runs a bridge session on it.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client, endpoint) = ClientLink::channel(state.channel_capacity);
    let ClientEndpoint {
        inbound,
        mut outbound,
    } = endpoint;
    let (mut sender, mut receiver) = socket.split();

    // Only this task writes to the client socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let message = match frame {
                OutboundFrame::Message(message) => match serde_json::to_string(&message) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        tracing::warn!("client message not serializable: {}", e);
                        continue;
                    }
                },
                OutboundFrame::Audio(audio) => Message::Binary(audio),
                OutboundFrame::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            let frame = match message {
                Ok(Message::Text(text)) => InboundFrame::Text(text.as_str().to_owned()),
                Ok(Message::Binary(audio)) => InboundFrame::Binary(audio),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("client socket error: {}", e);
                    break;
                }
            };
            if inbound.send(frame).await.is_err() {
                break;
            }
        }
    });

    let stats = accept(client, state.connector.clone(), state.options.clone()).await;
    reader.abort();
    let _ = writer.await;
    info!(
        responses = stats.responses(),
        total_tokens = stats.total_tokens(),
        "WebSocket connection closed"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server = ServerConfig::from_env().context("Failed to load server configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(server.env_filter())
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let config = Arc::new(Config::from_env().context("Failed to load bridge configuration")?);
    info!(backend = ?config.backend(), "Configuration loaded");

    let credentials = Arc::new(StaticCredential::from_config(&config));
    let state = AppState {
        connector: Arc::new(RealtimeConnector::new(config.clone(), credentials)),
        options: SessionOptions::from_config(&config),
        channel_capacity: config.channel_capacity(),
    };

    // Permissive CORS so a separately served frontend can connect.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route(&server.path, get(ws_handler))
        .layer(cors)
        .with_state(state);

    info!(
        "Starting WebSocket server, listening on {}{}",
        server.bind_address, server.path
    );
    let listener = tokio::net::TcpListener::bind(server.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

