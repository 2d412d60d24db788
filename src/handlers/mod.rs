// handlers/mod.rs - two handler tiers
//
// Public (no identity) → Protected (verified caller identity via JWT)
pub mod protected; // POST/PATCH/DELETE /api/todos/*
pub mod public; // /, /health, GET /api/todos/*, /api/users

use axum::extract::rejection::JsonRejection;
use axum::Json;
use uuid::Uuid;

use crate::error::ApiError;

/// A path id that is not a UUID cannot name any record, so it gets the
/// operation's usual not-found error.
pub(crate) fn parse_id(raw: &str, not_found: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        tracing::debug!("Malformed id in path: {:?}", raw);
        ApiError::not_found(not_found)
    })
}

/// Unwraps a JSON body, reporting unparseable input as a 400
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::invalid_json(rejection.body_text()))
}
