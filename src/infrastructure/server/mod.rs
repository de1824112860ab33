//! Webhook server for Telegram and Chatwoot updates

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::application::errors::BotError;
use crate::application::messaging::Inbound;
use crate::domain::entities::HelpdeskUpdate;
use crate::infrastructure::adapters::telegram::Update;

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct AppState {
    pub sender: mpsc::Sender<Inbound>,
    pub secret_token: Option<String>,
    pub chat_id_attribute: String,
}

/// Routes for both webhooks plus a health check
pub fn router(state: AppState, telegram_path: &str, chatwoot_path: &str) -> Router {
    Router::new()
        .route(&format!("/{}", telegram_path.trim_matches('/')), post(telegram_webhook))
        .route(&format!("/{}", chatwoot_path.trim_matches('/')), post(chatwoot_webhook))
        .route("/healthcheck", get(healthcheck))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(app: Router, listen_addr: &str) -> Result<(), BotError> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|e| BotError::Network(format!("Failed to bind {}: {}", listen_addr, e)))?;
    tracing::info!("Webhook server listening on {}", listen_addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| BotError::Network(e.to_string()))
}

async fn enqueue(state: &AppState, inbound: Inbound) -> StatusCode {
    match state.sender.send(inbound).await {
        Ok(()) => StatusCode::OK,
        Err(_) => {
            tracing::error!("Update queue is closed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn telegram_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Some(secret) = &state.secret_token {
        let given = headers.get(SECRET_TOKEN_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(secret.as_str()) {
            tracing::warn!("Rejected Telegram webhook call with a wrong secret token");
            return StatusCode::FORBIDDEN;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!("Unparsable Telegram update: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    match update.into_incoming() {
        Some(incoming) => enqueue(&state, Inbound::Telegram(incoming)).await,
        None => StatusCode::OK,
    }
}

async fn chatwoot_webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let update = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|payload| HelpdeskUpdate::from_json(&payload, &state.chat_id_attribute));

    match update {
        Some(update) => enqueue(&state, Inbound::Helpdesk(update)).await,
        None => {
            tracing::warn!("Chatwoot payload without an event");
            StatusCode::BAD_REQUEST
        }
    }
}

async fn healthcheck() -> &'static str {
    "The bot is still running fine :)"
}
