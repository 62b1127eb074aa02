//! Axum gateway: receives inbound messenger events on a webhook and returns
//! the composed reply parts. The transport adapter (the actual messenger
//! integration) lives outside this repo and talks to these two routes:
//!
//! - `POST /update` — one inbound event, answered with the ordered reply
//!   parts plus the typing-delay hint.
//! - `GET /health` — component readiness for the process supervisor.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use brenda_core::{
    BotConfig, CatalogGateway, HandoffFlow, InboundEvent, LlmBridge, MemoryStore, Reply,
    SmtpEmailGateway, TurnEngine,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct AppState {
    engine: TurnEngine,
    llm_enabled: bool,
    email_enabled: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env();

    let memory = Arc::new(
        MemoryStore::open(&config.data_dir).expect("memory store must open at startup"),
    );
    let catalog = Arc::new(
        CatalogGateway::open(&config.catalog_db).expect("catalog database must open at startup"),
    );

    let llm = LlmBridge::from_config(&config).map(Arc::new);
    if llm.is_none() {
        tracing::warn!("BRENDA_LLM_API_KEY unset: running on rule-based analysis and tools only");
    }

    let email = SmtpEmailGateway::from_config(&config)
        .map(|g| Arc::new(g) as Arc<dyn brenda_core::EmailGateway>);
    if email.is_none() {
        tracing::warn!("SMTP not configured: advisor handoff will report dispatch failures");
    }
    let handoff = HandoffFlow::new(email.clone(), config.advisor_email.clone());

    let registry = Arc::new(brenda_tools::default_registry());
    tracing::info!(tools = registry.registered_ids().len(), "tool registry ready");

    let state = Arc::new(AppState {
        llm_enabled: llm.is_some(),
        email_enabled: email.is_some(),
        engine: TurnEngine::new(config, memory, catalog, llm, registry, handoff),
    });

    let app = Router::new()
        .route("/update", post(handle_update))
        .route("/health", get(health))
        .with_state(state);

    let bind = std::env::var("BRENDA_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    tracing::info!(%bind, "brenda-gateway listening");
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .expect("gateway bind address must be free");
    axum::serve(listener, app).await.expect("gateway serve loop");
}

async fn handle_update(
    State(state): State<Arc<AppState>>,
    Json(event): Json<InboundEvent>,
) -> Json<Reply> {
    let update_id = event.update_id;
    let user_id = event.user_id;
    let reply = state.engine.handle_event(event).await;
    tracing::debug!(user_id, update_id, parts = reply.parts.len(), "turn complete");
    Json(reply)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "llm": state.llm_enabled,
            "email": state.email_enabled,
        })),
    )
}
