use axum::{extract::State, Json};
use axum::extract::rejection::JsonRejection;

use crate::api::format::{UserBody, UsersBody};
use crate::api::requests::CreateUserRequest;
use crate::app::AppState;
use crate::handlers::json_body;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/users
pub async fn users_list(State(state): State<AppState>) -> ApiResult<UsersBody> {
    let users = state.users.list().await?;
    Ok(ApiResponse::success(UsersBody { users }))
}

/// POST /api/users - register a user; no credentials are issued here
pub async fn user_create(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<UserBody> {
    let new_user = json_body(payload)?.validate()?;
    let user = state.users.register(new_user).await?;
    Ok(ApiResponse::created(UserBody { user }))
}
