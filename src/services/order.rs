//! Order service.

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::correlation::CorrelationContext;
use crate::logging::LogLevel;
use crate::services::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub amount: f64,
}

pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/create", post(create_order))
        .route("/list", get(list_orders))
}

async fn create_order(
    State(state): State<ServiceState>,
    Extension(ctx): Extension<CorrelationContext>,
    Json(order): Json<Order>,
) -> Json<Value> {
    state.logger.emit(
        state
            .logger
            .record(&ctx, "/create", LogLevel::Info, "order created")
            .with_field("event", "order_created")
            .with_field("order_id", &order.id)
            .with_field("customer_id", &order.customer_id)
            .with_field("amount", order.amount),
    );
    Json(json!({ "status": "created", "order": order }))
}

async fn list_orders(
    State(state): State<ServiceState>,
    Extension(ctx): Extension<CorrelationContext>,
) -> Json<Value> {
    state
        .logger
        .emit(state.logger.record(&ctx, "/list", LogLevel::Info, "listed orders"));
    Json(json!([{ "id": "order-1", "amount": 100.0 }]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::correlation_middleware;
    use crate::logging::LogRecord;
    use crate::services::{testing, ServiceKind};
    use crate::source::file::read_tail_lines;
    use axum::{body::Body, http::Request, middleware};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_create_logs_order_fields_under_inbound_trace() {
        let (_dir, state) = testing::state(ServiceKind::Order);
        let app = ServiceKind::Order
            .routes()
            .layer(middleware::from_fn_with_state(state.logger.clone(), correlation_middleware))
            .with_state(state.clone());

        let response = app
            .oneshot(
                Request::post("/create")
                    .header("content-type", "application/json")
                    .header("x-trace-id", "trace-7")
                    .header("x-user-id", "james")
                    .body(Body::from(r#"{"id":"o-1","customer_id":"james","amount":150.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "created");
        assert_eq!(body["order"]["id"], "o-1");

        let lines = read_tail_lines(state.logger.path(), 10).unwrap();
        let created: LogRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(created.trace_id, "trace-7");
        assert_eq!(created.user_id, "james");
        assert_eq!(created.field("order_id"), Some("o-1"));
        assert_eq!(created.field("amount"), Some("150"));
    }
}
