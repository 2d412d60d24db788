use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::api::format::{MessageBody, TodoBody};
use crate::api::requests::{CreateTodoRequest, UpdateTodoRequest};
use crate::app::AppState;
use crate::handlers::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::todo_service::{DELETE_NOT_FOUND, TODO_NOT_FOUND};

/// POST /api/todos
pub async fn todo_create(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> ApiResult<TodoBody> {
    let input = json_body(payload)?.validate()?;
    let todo = state.todos.create(caller.user_id, input).await?;
    Ok(ApiResponse::created(todo.into()))
}

/// PATCH /api/todos/:todo_id
pub async fn todo_update(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(todo_id): Path<String>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> ApiResult<TodoBody> {
    let changes = json_body(payload)?.validate()?;
    let todo_id = parse_id(&todo_id, TODO_NOT_FOUND)?;
    let todo = state.todos.update(caller.user_id, todo_id, changes).await?;
    Ok(ApiResponse::success(todo.into()))
}

/// DELETE /api/todos/:todo_id
pub async fn todo_delete(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(todo_id): Path<String>,
) -> ApiResult<MessageBody> {
    let todo_id = parse_id(&todo_id, DELETE_NOT_FOUND)?;
    let message = state.todos.delete(caller.user_id, todo_id).await?;
    Ok(ApiResponse::success(MessageBody {
        message: message.to_string(),
    }))
}
