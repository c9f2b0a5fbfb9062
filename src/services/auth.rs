//! Auth service: demo login and user lookup.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::correlation::{CorrelationContext, X_USER_ID};
use crate::logging::LogLevel;
use crate::services::ServiceState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/login", post(login))
        .route("/user/{username}", get(get_user))
}

/// Any non-empty username logs in. The caller's id is returned in `x-user-id`
/// so the client can forward it on later calls.
async fn login(
    State(state): State<ServiceState>,
    Extension(ctx): Extension<CorrelationContext>,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let username = payload.username.trim();
    if username.is_empty() {
        state.logger.emit(
            state
                .logger
                .record(&ctx, "/login", LogLevel::Warn, "login failed: missing username")
                .with_field("event", "login_failed"),
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "username required" })),
        )
            .into_response();
    }

    let ctx = ctx.identified(username);
    state.logger.emit(
        state
            .logger
            .record(&ctx, "/login", LogLevel::Info, "login success")
            .with_field("event", "login_success"),
    );

    let mut response = Json(LoginResponse {
        access_token: format!("fake-token-for-{username}"),
        token_type: "bearer".to_string(),
    })
    .into_response();
    if let Ok(value) = HeaderValue::from_str(username) {
        response.headers_mut().insert(X_USER_ID, value);
    }
    response
}

async fn get_user(
    State(state): State<ServiceState>,
    Extension(ctx): Extension<CorrelationContext>,
    Path(username): Path<String>,
) -> Json<serde_json::Value> {
    let route = format!("/user/{username}");
    state.logger.emit(
        state
            .logger
            .record(&ctx, &route, LogLevel::Info, "fetched user")
            .with_field("username", &username),
    );
    Json(json!({ "username": username, "roles": ["user"] }))
}
