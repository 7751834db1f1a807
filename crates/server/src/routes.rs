//! HTTP surface: conversation endpoints over the chat service.

use crate::service::{ChatService, TurnRequest};
use crate::store::{ChatTurn, SessionSummary, TokenTotals};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use docchat_core::{AppError, AppResult};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
}

#[derive(Serialize)]
struct TurnResponse {
    conversation_id: String,
    response: String,
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
}

#[derive(Serialize)]
struct ChatEntry {
    user_prompt: String,
    assistant_response: String,
    timestamp: String,
}

impl From<ChatTurn> for ChatEntry {
    fn from(turn: ChatTurn) -> Self {
        Self {
            user_prompt: turn.user_prompt,
            assistant_response: turn.assistant_response,
            timestamp: turn.created_at.to_rfc3339(),
        }
    }
}

/// Error wrapper mapping `AppError` to JSON problem responses.
#[derive(Debug)]
struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AppError::NotReady(_) => StatusCode::CONFLICT,
            AppError::Load(_) => StatusCode::NOT_FOUND,
            AppError::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Service(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!("Request failed ({}): {}", status, self.0);

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Build the router with all conversation endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/conversations", post(create_conversation))
        .route(
            "/conversations/{conversation_id}/messages",
            post(continue_conversation),
        )
        .route(
            "/users/{username}/conversations",
            get(list_conversations),
        )
        .route(
            "/sessions/{username}/{conversation_id}/messages",
            get(list_messages),
        )
        .route(
            "/conversations/{username}/{conversation_id}",
            delete(delete_conversation),
        )
        .route(
            "/sessions/{username}/{conversation_id}/token_usage",
            get(token_usage),
        )
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_conversation(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let conversation_id = Uuid::new_v4().to_string();

    let outcome = state.service.run_turn(&conversation_id, &request).await?;

    Ok(Json(TurnResponse {
        conversation_id,
        response: outcome.response,
    }))
}

async fn continue_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let outcome = state.service.run_turn(&conversation_id, &request).await?;

    Ok(Json(TurnResponse {
        conversation_id,
        response: outcome.response,
    }))
}

async fn list_conversations(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let sessions = state.service.store().sessions_for_user(&username)?;
    Ok(Json(sessions))
}

async fn list_messages(
    State(state): State<AppState>,
    Path((username, conversation_id)): Path<(String, String)>,
) -> Result<Json<Vec<ChatEntry>>, ApiError> {
    let turns = state
        .service
        .store()
        .turns_for_session(&username, &conversation_id)?;
    Ok(Json(turns.into_iter().map(ChatEntry::from).collect()))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Path((username, conversation_id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let success = state
        .service
        .store()
        .delete_session(&username, &conversation_id)?;
    Ok(Json(DeleteResponse { success }))
}

async fn token_usage(
    State(state): State<AppState>,
    Path((username, conversation_id)): Path<(String, String)>,
) -> Result<Json<TokenTotals>, ApiError> {
    let totals = state
        .service
        .store()
        .token_usage(&username, &conversation_id)?;
    Ok(Json(totals))
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState, port: u16) -> AppResult<()> {
    let router = build_router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Other(format!("Failed to bind on port {}: {}", port, e)))?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Server shutting down");
        })
        .await
        .map_err(|e| AppError::Other(format!("Server error: {}", e)))?;

    Ok(())
}
