//! Liveness and feature discovery

use axum::Json;
use axum::extract::State;
use serde_json::json;

use crate::state::AppState;

/// `GET /health` - no auth, bypasses rate limiting
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "env": state.config.env.as_str(),
        "features": {
            "cache": state.kv.is_some(),
            "sessions": state.sessions.is_some(),
            "oauth_providers": state.oauth.names(),
            "worker_proxy": state.config.worker_base_url.is_some(),
            "terminal": state.config.enable_terminal,
        },
    }))
}
