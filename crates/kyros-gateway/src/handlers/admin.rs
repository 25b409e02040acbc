//! Admin surface

use axum::Json;
use axum::extract::State;
use serde_json::json;

use crate::state::AppState;

/// `GET /admin/providers` - provider configuration snapshot, secrets
/// excluded by construction
pub async fn providers(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"providers": state.oauth.snapshot()}))
}
