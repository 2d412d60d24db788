use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Todo API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "users": "/api/users (GET public, POST public)",
            "todos": "/api/todos/:todo_id (GET public, PATCH/DELETE owner), /api/todos (POST authenticated)",
            "todos_by_user": "/api/todos/user/:user_id (public)",
            "health": "/health",
        }
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": now, "database": "ok" })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            ApiError::service_unavailable("database unavailable").into_response()
        }
    }
}

/// Any route not matched above
pub async fn fallback() -> ApiError {
    ApiError::not_found("Could not find this route.")
}
