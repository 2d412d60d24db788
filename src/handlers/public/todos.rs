use axum::extract::{Path, State};

use crate::api::format::{TodoBody, TodosBody};
use crate::app::AppState;
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::todo_service::{OWNER_HAS_NO_TODOS, TODO_NOT_FOUND};

/// GET /api/todos/:todo_id
pub async fn todo_get(State(state): State<AppState>, Path(todo_id): Path<String>) -> ApiResult<TodoBody> {
    let todo_id = parse_id(&todo_id, TODO_NOT_FOUND)?;
    let todo = state.todos.get_by_id(todo_id).await?;
    Ok(ApiResponse::success(todo.into()))
}

/// GET /api/todos/user/:user_id
pub async fn todos_by_user(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<TodosBody> {
    let user_id = parse_id(&user_id, OWNER_HAS_NO_TODOS)?;
    let todos = state.todos.get_by_owner(user_id).await?;
    Ok(ApiResponse::success(todos.into()))
}
