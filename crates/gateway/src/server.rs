use std::net::SocketAddr;

use {
    axum::{
        Json, Router,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    serde::Deserialize,
    tower_http::cors::{Any, CorsLayer},
    tracing::{error, info},
};

use crate::state::AppState;

const SERVICE_NAME: &str = "wabridge";
const VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the control API router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/whatsapp/status", get(status_handler))
        .route("/api/whatsapp/qr", get(qr_handler))
        .route("/api/whatsapp/restart", post(restart_handler))
        .route("/api/whatsapp/send-test", post(send_test_handler))
        .route("/api/whatsapp/associate", post(associate_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve the control API.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "control api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": VERSION,
        "whatsapp": {
            "connected": state.session.connected(),
            "session_status": state.session.status(),
            "connected_number": state.session.identity(),
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "connected": state.session.connected(),
        "session_status": state.session.status(),
        "connected_number": state.session.identity(),
        "qr_available": state.session.pairing().is_some(),
    }))
}

async fn qr_handler(State(state): State<AppState>) -> Response {
    let status = state.session.status();
    match state.session.pairing() {
        Some(artifact) => Json(serde_json::json!({
            "qr_code": artifact.token,
            "qr_image": artifact.image,
            "session_status": status,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "QR code not available",
                "session_status": status,
            })),
        )
            .into_response(),
    }
}

async fn restart_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.session.restart().await;
    Json(serde_json::json!({ "message": "restarting whatsapp session" }))
}

#[derive(Debug, Deserialize)]
struct SendTestRequest {
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

async fn send_test_handler(
    State(state): State<AppState>,
    Json(body): Json<SendTestRequest>,
) -> Response {
    let (Some(phone_number), Some(message)) = (
        body.phone_number.filter(|s| !s.is_empty()),
        body.message.filter(|s| !s.is_empty()),
    ) else {
        return bad_request("phone_number and message are required");
    };

    let to = format_recipient(&phone_number);
    match state.outbound.send_text(&to, &message).await {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "message sent",
        }))
        .into_response(),
        Err(e) => {
            error!(to, error = %e, "test send failed");
            internal_error(&e.to_string())
        },
    }
}

#[derive(Debug, Deserialize)]
struct AssociateRequest {
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    chat_id: Option<String>,
}

async fn associate_handler(
    State(state): State<AppState>,
    Json(body): Json<AssociateRequest>,
) -> Response {
    let (Some(phone_number), Some(chat_id)) = (
        body.phone_number.filter(|s| !s.is_empty()),
        body.chat_id.filter(|s| !s.is_empty()),
    ) else {
        return bad_request("phone_number and chat_id are required");
    };

    match state.associations.associate(&phone_number, &chat_id).await {
        // Relay the backend's response verbatim.
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!(phone_number, error = %e, "association failed");
            internal_error("failed to associate number")
        },
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Append the network suffix unless the caller already passed a full JID.
fn format_recipient(phone_number: &str) -> String {
    if phone_number.contains('@') {
        phone_number.to_string()
    } else {
        format!("{phone_number}@c.us")
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
