//! HTTP command surface for the worker.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use courier_core::{StatusRecord, unix_timestamp};
use courier_dispatch::DispatchError;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/send-message", post(send_message))
        .route("/status", get(status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ping() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "courier-worker",
        "timestamp": unix_timestamp(),
    }))
}

/// Serves the last published status record whole, so an operator can read
/// the pairing artifact while pairing is required.
async fn status(State(state): State<AppState>) -> Json<StatusRecord> {
    Json(state.record.borrow().clone())
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    number: Option<String>,
    message: Option<String>,
}

/// Accepts an outbound send. A 200 means accepted, not delivered: the paced
/// transmission happens later and its failures are only logged.
async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    let (Some(number), Some(message)) = (req.number, req.message) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "number and message are required" })),
        )
            .into_response();
    };

    match state.dispatcher.send(&number, &message).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "send accepted",
                "messageId": receipt.message_id.to_string(),
            })),
        )
            .into_response(),
        Err(DispatchError::Validation(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": reason })),
        )
            .into_response(),
        Err(e @ DispatchError::NotRegistered) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": e.to_string() })),
        )
            .into_response(),
        Err(e @ DispatchError::ConnectionUnavailable) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": e.to_string() })),
        )
            .into_response(),
        Err(DispatchError::Client(e)) => {
            tracing::error!(error = %e, "send-message failed during registration check");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "failed to process the message" })),
            )
                .into_response()
        }
    }
}
