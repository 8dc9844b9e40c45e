//! HTTP/WebSocket gateway.
//!
//! `/ws` carries the streaming chat protocol; `/api/*` exposes the inventory
//! and order services plus the request/response assistant; `/health` is a
//! liveness check.

pub mod api;
pub mod ws;

use crate::agent::{AgentRuntime, AgentSettings};
use crate::assistant::Assistant;
use crate::config::Config;
use crate::erp::{fixture_source, ErpTables};
use crate::providers::{create_provider, Provider};
use crate::relay::ChatRelay;
use crate::sessions::create_conversation_store;
use anyhow::{Context, Result};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub erp: Arc<ErpTables>,
    pub relay: Arc<ChatRelay>,
    pub assistant: Arc<Assistant>,
    pub provider_name: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, erp: ErpTables, provider: Arc<dyn Provider>) -> Self {
        let provider_name = provider.name().to_string();
        let erp = Arc::new(erp);
        let settings = AgentSettings::from_config(&config);
        let credential_configured = config.credential().is_some();
        let runtime = AgentRuntime::new(provider);
        let assistant = Assistant::new(
            runtime.clone(),
            Arc::clone(&erp),
            settings.clone(),
            credential_configured,
        );
        let relay = ChatRelay::new(
            create_conversation_store(),
            runtime,
            settings,
            credential_configured,
        );
        Self {
            config: Arc::new(config),
            erp,
            relay: Arc::new(relay),
            assistant: Arc::new(assistant),
            provider_name,
            started_at: Instant::now(),
        }
    }

    /// Load fixtures and build the provider described by `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let data_dir = config.fixtures.resolved_data_dir();
        let source = fixture_source(data_dir.as_deref());
        let erp = ErpTables::load(source.as_ref()).context("Failed to load fixture data")?;
        let provider = create_provider(
            &config.default_provider,
            config.credential(),
            config.api_url.as_deref(),
        )?;
        Ok(Self::new(config, erp, Arc::from(provider)))
    }
}

/// Build the full router. Request limits apply to HTTP routes only.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.gateway.request_timeout_secs);
    let max_body_bytes = state.config.gateway.max_body_bytes;

    let http = Router::new()
        .route("/health", get(api::handle_health))
        .route("/api/status", get(api::handle_status))
        .route("/api/inventory", get(api::handle_inventory))
        .route("/api/inventory/transfer", post(api::handle_transfer))
        .route("/api/inventory/{sku}", get(api::handle_inventory_by_sku))
        .route("/api/locations", get(api::handle_locations))
        .route(
            "/api/orders",
            get(api::handle_orders).post(api::handle_create_order),
        )
        .route("/api/orders/summary", get(api::handle_order_summary))
        .route("/api/orders/{order_id}", get(api::handle_order_detail))
        .route(
            "/api/orders/{order_id}/status",
            patch(api::handle_order_status),
        )
        .route("/api/customers", get(api::handle_customers))
        .route("/api/products", get(api::handle_products))
        .route("/api/reports/low-stock", get(api::handle_low_stock))
        .route("/api/reports/dead-stock", get(api::handle_dead_stock))
        .route("/api/forecast", get(api::handle_forecasts))
        .route(
            "/api/forecast/recommendations",
            get(api::handle_forecast_recommendations),
        )
        .route(
            "/api/forecast/seasonal/{sku}",
            get(api::handle_seasonal_pattern),
        )
        .route("/api/forecast/{sku}", get(api::handle_forecast))
        .route("/api/ai/query", post(api::handle_ai_query))
        .route(
            "/api/ai/session/{session_id}",
            delete(api::handle_ai_clear_session),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(timeout));

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .merge(http)
        .with_state(state)
}

/// Run the gateway until Ctrl-C.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    if !state.relay.credential_configured() {
        tracing::warn!("No API key configured; chat turns will be answered with a configuration error");
    }

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {addr}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "Gateway listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Gateway shutting down");
        })
        .await
        .context("Gateway server error")?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::state_with;
    use super::*;

    #[test]
    fn state_reflects_credential() {
        assert!(state_with(&[], Some("sk-test")).relay.credential_configured());
        assert!(!state_with(&[], None).relay.credential_configured());
        assert!(!state_with(&[], Some("   ")).relay.credential_configured());
        assert!(!state_with(&[], None).assistant.credential_configured());
    }

    #[test]
    fn from_config_uses_embedded_fixtures_by_default() {
        let state = AppState::from_config(Config::default()).unwrap();
        assert_eq!(state.provider_name, "openai");
        assert!(state.erp.counts().stock > 0);
    }

    #[test]
    fn from_config_reports_missing_fixture_dir() {
        let mut config = Config::default();
        config.fixtures.data_dir = Some("/nonexistent/stockchat-fixtures".into());
        let err = AppState::from_config(config).err().unwrap();
        assert!(format!("{err:#}").contains("Failed to load fixture data"));
    }

    #[test]
    fn from_config_rejects_unknown_provider() {
        let config = Config {
            default_provider: "nope".into(),
            ..Config::default()
        };
        assert!(AppState::from_config(config).is_err());
    }
}
