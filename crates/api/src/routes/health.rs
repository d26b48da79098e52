use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use common::EngineState;

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Liveness probe, no auth required.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let engine_state = state.engine.state().await;
    let open = state.engine.open_signals().await.len();
    Json(health_body(engine_state, open))
}

fn health_body(engine_state: EngineState, open_signals: usize) -> Value {
    json!({
        "status": "ok",
        "engine": engine_state.to_string(),
        "open_signals": open_signals,
    })
}
