//! REST handlers for the inventory, order and forecast services, and for the
//! request/response assistant.
//!
//! Handlers are thin: they parse the request, call into [`ErpTables`](crate::erp::ErpTables) and map
//! a [`ServiceError`] onto a status code with an `{"error": ...}` body.

use super::AppState;
use crate::erp::{ErrorKind, NewOrder, ServiceError};
use crate::providers::sanitize_api_error;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

const DEFAULT_FORECAST_PERIOD_DAYS: i64 = 30;
const DEFAULT_DEAD_STOCK_DAYS: i64 = 90;

fn service_error(e: ServiceError) -> Response {
    let status = match e.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Invalid => StatusCode::BAD_REQUEST,
        ErrorKind::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
    };
    tracing::debug!(%status, "Request rejected: {e}");
    (status, Json(e)).into_response()
}

fn respond<T: Serialize>(result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => service_error(e),
    }
}

/// Empty query values count as absent.
fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Positive whole number of days, or `default`.
fn positive_days(value: Option<&String>, default: i64) -> i64 {
    non_empty(value)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|days| *days > 0)
        .unwrap_or(default)
}

// ── Request types ───────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub sku: String,
    pub from_location: String,
    pub to_location: String,
    pub qty: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AiQueryRequest {
    #[serde(default)]
    pub query: String,
    pub session_id: Option<String>,
}

// ── Handlers ────────────────────────────────────────────────────

/// GET /health: liveness check
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// GET /api/status: runtime overview
pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let conversations = match state.relay.store().user_count().await {
        Ok(count) => count,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": format!("Conversation store failed: {e}")})),
            )
                .into_response();
        }
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.provider_name,
        "model": state.config.default_model,
        "credential_configured": state.relay.credential_configured(),
        "conversation_store": state.relay.store().name(),
        "conversations": conversations,
        "ai_sessions": state.assistant.session_count(),
        "fixtures": state.erp.counts(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
    .into_response()
}

/// GET /api/inventory?location=
pub async fn handle_inventory(
    State(state): State<AppState>,
    Query(params): Query<InventoryQuery>,
) -> impl IntoResponse {
    Json(state.erp.get_stock(non_empty(params.location.as_ref())))
}

/// GET /api/inventory/{sku}
pub async fn handle_inventory_by_sku(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> impl IntoResponse {
    Json(state.erp.get_stock_by_sku(&sku))
}

/// POST /api/inventory/transfer
pub async fn handle_transfer(
    State(state): State<AppState>,
    Json(body): Json<TransferRequest>,
) -> Response {
    respond(state.erp.transfer_stock(
        &body.sku,
        &body.from_location,
        &body.to_location,
        body.qty,
    ))
}

/// GET /api/locations
pub async fn handle_locations(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.erp.get_locations())
}

/// GET /api/orders?status=&customer_id=
pub async fn handle_orders(
    State(state): State<AppState>,
    Query(params): Query<OrdersQuery>,
) -> impl IntoResponse {
    Json(state.erp.get_orders(
        non_empty(params.status.as_ref()),
        non_empty(params.customer_id.as_ref()),
    ))
}

/// POST /api/orders
pub async fn handle_create_order(
    State(state): State<AppState>,
    Json(body): Json<NewOrder>,
) -> Response {
    respond(state.erp.create_order(body))
}

/// GET /api/orders/summary
pub async fn handle_order_summary(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.erp.get_order_summary())
}

/// GET /api/orders/{order_id}
pub async fn handle_order_detail(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Response {
    respond(state.erp.get_order_detail(&order_id))
}

/// PATCH /api/orders/{order_id}/status
pub async fn handle_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Response {
    respond(state.erp.update_order_status(&order_id, &body.status))
}

/// GET /api/customers
pub async fn handle_customers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.erp.get_customers())
}

/// GET /api/products
pub async fn handle_products(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.erp.get_products())
}

/// GET /api/reports/low-stock
pub async fn handle_low_stock(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.erp.low_stock_alerts())
}

/// GET /api/reports/dead-stock?days=90
pub async fn handle_dead_stock(
    State(state): State<AppState>,
    Query(params): Query<DaysQuery>,
) -> impl IntoResponse {
    let days = positive_days(params.days.as_ref(), DEFAULT_DEAD_STOCK_DAYS);
    Json(state.erp.dead_stock(days))
}

/// GET /api/forecast?period=
pub async fn handle_forecasts(
    State(state): State<AppState>,
    Query(params): Query<PeriodQuery>,
) -> impl IntoResponse {
    let period = positive_days(params.period.as_ref(), DEFAULT_FORECAST_PERIOD_DAYS);
    Json(state.erp.get_all_forecasts(period))
}

/// GET /api/forecast/recommendations: stockout risks
pub async fn handle_forecast_recommendations(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.erp.get_stockout_risks())
}

/// GET /api/forecast/seasonal/{sku}
pub async fn handle_seasonal_pattern(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> Response {
    respond(state.erp.get_seasonal_pattern(&sku))
}

/// GET /api/forecast/{sku}?period=30
pub async fn handle_forecast(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Query(params): Query<PeriodQuery>,
) -> Response {
    let period = positive_days(params.period.as_ref(), DEFAULT_FORECAST_PERIOD_DAYS);
    respond(state.erp.get_forecast(&sku, period))
}

/// POST /api/ai/query
pub async fn handle_ai_query(
    State(state): State<AppState>,
    Json(body): Json<AiQueryRequest>,
) -> Response {
    if body.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Query is required"})),
        )
            .into_response();
    }
    if !state.assistant.credential_configured() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "OPENAI_API_KEY is not configured"})),
        )
            .into_response();
    }

    let session_id = non_empty(body.session_id.as_ref())
        .map_or_else(|| format!("rest-{}", Uuid::new_v4()), str::to_string);

    match state.assistant.answer(&session_id, &body.query).await {
        Ok(reply) => Json(json!({
            "success": true,
            "message": reply.message,
            "data": reply.data,
            "evaluation": null,
            "session_id": session_id,
            "routed_to_orchestrator": reply.routed,
        }))
        .into_response(),
        Err(e) => {
            let error = sanitize_api_error(&format!("{e:#}"));
            tracing::warn!(%session_id, %error, "Assistant query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": error,
                    "error_details": null,
                    "session_id": session_id,
                })),
            )
                .into_response()
        }
    }
}

/// DELETE /api/ai/session/{session_id}
pub async fn handle_ai_clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    if !state.assistant.clear_session(&session_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Session not found"})),
        )
            .into_response();
    }
    Json(json!({"success": true, "message": format!("Session {session_id} cleared")}))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::build_router;
    use crate::gateway::test_support::{state_with, state_with_replies};
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = build_router(state.clone())
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
        call(state, Method::GET, uri, None).await
    }

    fn state() -> AppState {
        state_with(&[], Some("sk-test"))
    }

    #[test]
    fn positive_days_falls_back_on_bad_input() {
        let parse = |v: &str| positive_days(Some(&v.to_string()), 30);
        assert_eq!(parse("7"), 7);
        assert_eq!(parse(" 14 "), 14);
        assert_eq!(parse(""), 30);
        assert_eq!(parse("0"), 30);
        assert_eq!(parse("-5"), 30);
        assert_eq!(parse("soon"), 30);
        assert_eq!(positive_days(None, 90), 90);
    }

    #[tokio::test]
    async fn health_and_status() {
        let state = state();
        let (status, body) = get(&state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = get(&state, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "scripted");
        assert_eq!(body["credential_configured"], true);
        assert_eq!(body["conversations"], 0);
        assert_eq!(body["ai_sessions"], 0);
        assert_eq!(body["fixtures"]["customers"], 5);
    }

    #[tokio::test]
    async fn inventory_filters_by_location() {
        let state = state();
        let (_, all) = get(&state, "/api/inventory").await;
        assert_eq!(all.as_array().unwrap().len(), 14);

        let (_, nyc) = get(&state, "/api/inventory?location=STORE-NYC").await;
        let rows = nyc.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r["location"] == "STORE-NYC"));

        let (_, blank) = get(&state, "/api/inventory?location=").await;
        assert_eq!(blank.as_array().unwrap().len(), 14);
    }

    #[tokio::test]
    async fn inventory_by_sku_aggregates() {
        let (status, body) = get(&state(), "/api/inventory/WID-001").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_on_hand"], 480);
        assert_eq!(body["total_available"], 433);
        assert_eq!(body["by_location"].as_array().unwrap().len(), 2);

        let (status, body) = get(&state(), "/api/inventory/NOPE").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_on_hand"], 0);
    }

    #[tokio::test]
    async fn transfer_moves_stock_and_maps_errors() {
        let state = state();
        let transfer = |sku: &str, qty: i64| {
            json!({"sku": sku, "from_location": "WH-EAST", "to_location": "WH-WEST", "qty": qty})
        };

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/inventory/transfer",
            Some(transfer("WID-001", 10)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["transfer"]["to"], "WH-WEST");

        let (_, summary) = get(&state, "/api/inventory/WID-001").await;
        assert_eq!(summary["total_on_hand"], 480);

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/inventory/transfer",
            Some(transfer("WID-001", 100_000)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().starts_with("Insufficient available stock"));

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/inventory/transfer",
            Some(transfer("NOPE", 1)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "SKU NOPE not found in WH-EAST");

        let (status, _) = call(
            &state,
            Method::POST,
            "/api/inventory/transfer",
            Some(transfer("WID-001", 0)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (status, _) = call(
            &state(),
            Method::POST,
            "/api/inventory/transfer",
            Some(json!({"sku": "WID-001"})),
        )
        .await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn order_lifecycle() {
        let state = state();
        let (status, created) = call(
            &state,
            Method::POST,
            "/api/orders",
            Some(json!({
                "customer_id": "CUST-002",
                "items": [{"sku": "CAB-010", "qty": 4, "unit_price": 2.5, "location": "WH-CENTRAL"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["id"], "ORD-10008");
        assert_eq!(created["status"], "pending");
        assert_eq!(created["total"], 10.0);

        let (status, detail) = get(&state, "/api/orders/ORD-10008").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["customer_id"], "CUST-002");
        assert!(detail["customer_name"].is_string());

        let (status, shipped) = call(
            &state,
            Method::PATCH,
            "/api/orders/ORD-10008/status",
            Some(json!({"status": "shipped"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(shipped["shipped_at"].is_string());

        let (_, pending) = get(&state, "/api/orders?status=shipped&customer_id=CUST-002").await;
        assert!(pending
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["id"] == "ORD-10008"));
    }

    #[tokio::test]
    async fn order_errors_map_to_status_codes() {
        let state = state();
        let (status, body) = get(&state, "/api/orders/ORD-99999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Order ORD-99999 not found");

        let (status, _) = call(
            &state,
            Method::POST,
            "/api/orders",
            Some(json!({"customer_id": "CUST-999", "items": []})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &state,
            Method::PATCH,
            "/api/orders/ORD-10001/status",
            Some(json!({"status": "lost"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("pending, processing"));
    }

    #[tokio::test]
    async fn summary_and_catalog() {
        let state = state();
        let (_, summary) = get(&state, "/api/orders/summary").await;
        assert_eq!(summary["total_orders"], 7);
        assert!(summary["by_status"]["cancelled"].is_number());

        let (_, customers) = get(&state, "/api/customers").await;
        assert_eq!(customers.as_array().unwrap().len(), 5);
        let (_, products) = get(&state, "/api/products").await;
        assert_eq!(products.as_array().unwrap().len(), 8);
        let (_, locations) = get(&state, "/api/locations").await;
        assert_eq!(locations.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn reports() {
        let state = state();
        let (status, low) = get(&state, "/api/reports/low-stock").await;
        assert_eq!(status, StatusCode::OK);
        assert!(low.is_array());

        let (_, dead) = get(&state, "/api/reports/dead-stock?days=90").await;
        let dead = dead.as_array().unwrap();
        assert!(dead.iter().any(|d| d["sku"] == "LEG-900"));
        assert!(dead.iter().all(|d| d["qty_on_hand"].as_i64().unwrap() > 0));

        let (_, fallback) = get(&state, "/api/reports/dead-stock?days=0").await;
        assert_eq!(fallback.as_array().unwrap().len(), dead.len());

        for days in ["1000000000", "9223372036854775807"] {
            let (status, huge) = get(&state, &format!("/api/reports/dead-stock?days={days}")).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(huge, json!([]));
        }
    }

    #[tokio::test]
    async fn forecasts() {
        let state = state();
        let (status, forecast) = get(&state, "/api/forecast/WID-001?period=30").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(forecast["sku"], "WID-001");
        assert_eq!(forecast["confidence"], "high");

        let (status, body) = get(&state, "/api/forecast/CAB-020").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["error"],
            "Insufficient sales history for CAB-020. Need at least 3 data points, found 2."
        );

        let (_, all) = get(&state, "/api/forecast").await;
        assert_eq!(all.as_array().unwrap().len(), 6);

        let (status, seasonal) = get(&state, "/api/forecast/seasonal/WID-001").await;
        assert_eq!(status, StatusCode::OK);
        assert!(seasonal["monthly_averages"].is_array());

        let (status, _) = get(&state, "/api/forecast/seasonal/CAB-020").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, risks) = get(&state, "/api/forecast/recommendations").await;
        assert_eq!(status, StatusCode::OK);
        assert!(risks
            .as_array()
            .unwrap()
            .iter()
            .all(|r| r["risk_level"] != "low"));
    }

    #[tokio::test]
    async fn ai_query_validates_before_calling_the_model() {
        let state = state();
        for body in [json!({"query": ""}), json!({"query": "   "}), json!({})] {
            let (status, reply) = call(&state, Method::POST, "/api/ai/query", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(reply["error"], "Query is required");
        }

        let unconfigured = state_with_replies(&[], None);
        let (status, reply) = call(
            &unconfigured,
            Method::POST,
            "/api/ai/query",
            Some(json!({"query": "stock for WID-001"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(reply["error"], "OPENAI_API_KEY is not configured");
        assert_eq!(unconfigured.assistant.session_count(), 0);
    }

    #[tokio::test]
    async fn ai_query_routes_to_erp_worker() {
        let state = state_with_replies(
            &[
                r#"{"route_to_orchestrator": true, "reason": "pending orders"}"#,
                r#"{"operation": "GET_ORDERS", "parameters_json": "{\"status\": \"pending\"}", "explanation": "Fetching all pending orders"}"#,
            ],
            Some("sk-test"),
        );

        let (status, reply) = call(
            &state,
            Method::POST,
            "/api/ai/query",
            Some(json!({"query": "Which orders are pending?", "session_id": "sess-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["success"], true);
        assert_eq!(reply["message"], "Fetching all pending orders");
        assert_eq!(reply["evaluation"], Value::Null);
        assert_eq!(reply["session_id"], "sess-1");
        assert_eq!(reply["routed_to_orchestrator"], true);
        let orders = reply["data"].as_array().unwrap();
        assert!(orders.iter().all(|o| o["status"] == "pending"));
        assert_eq!(state.assistant.session_len("sess-1"), 2);
    }

    #[tokio::test]
    async fn ai_query_direct_answer_gets_generated_session() {
        let state = state_with_replies(
            &[r#"{"route_to_orchestrator": false, "response": "Hello there."}"#],
            Some("sk-test"),
        );

        let (status, reply) = call(
            &state,
            Method::POST,
            "/api/ai/query",
            Some(json!({"query": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["message"], "Hello there.");
        assert_eq!(reply["data"], Value::Null);
        assert_eq!(reply["routed_to_orchestrator"], false);
        let session_id = reply["session_id"].as_str().unwrap();
        assert!(session_id.starts_with("rest-"));
        assert_eq!(state.assistant.session_len(session_id), 2);
    }

    #[tokio::test]
    async fn ai_query_failure_is_500_with_session() {
        let state = state_with_replies(
            &[
                r#"{"route_to_orchestrator": true}"#,
                r#"{"operation": "REBOOT_WAREHOUSE", "parameters_json": "{}"}"#,
            ],
            Some("sk-test"),
        );

        let (status, reply) = call(
            &state,
            Method::POST,
            "/api/ai/query",
            Some(json!({"query": "restart things", "session_id": "sess-2"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply["success"], false);
        assert_eq!(reply["error"], "Unknown operation: REBOOT_WAREHOUSE");
        assert_eq!(reply["session_id"], "sess-2");
    }

    #[tokio::test]
    async fn ai_session_can_be_cleared_once() {
        let state = state_with_replies(
            &[r#"{"route_to_orchestrator": false, "response": "ok"}"#],
            Some("sk-test"),
        );
        call(
            &state,
            Method::POST,
            "/api/ai/query",
            Some(json!({"query": "hi", "session_id": "sess-3"})),
        )
        .await;

        let (status, reply) = call(&state, Method::DELETE, "/api/ai/session/sess-3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["message"], "Session sess-3 cleared");

        let (status, reply) = call(&state, Method::DELETE, "/api/ai/session/sess-3", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(reply["error"], "Session not found");
    }
}
