//! Notify service.

use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::correlation::CorrelationContext;
use crate::logging::LogLevel;
use crate::services::ServiceState;

#[derive(Debug, Deserialize)]
pub struct Notification {
    pub to: String,
    pub message: String,
}

pub fn routes() -> Router<ServiceState> {
    Router::new().route("/send", post(send))
}

async fn send(
    State(state): State<ServiceState>,
    Extension(ctx): Extension<CorrelationContext>,
    Json(notification): Json<Notification>,
) -> Json<Value> {
    state.logger.emit(
        state
            .logger
            .record(&ctx, "/send", LogLevel::Info, "notification sent")
            .with_field("event", "notification_sent")
            .with_field("to", &notification.to)
            .with_field("length", notification.message.len()),
    );
    Json(json!({ "status": "sent", "to": notification.to }))
}
