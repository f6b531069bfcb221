use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    routing::{post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{extractors::require_auth, AuthUser},
    error::{AppError, AppResult},
    state::AppState,
};

use super::dto::{ListQuery, TodoListResponse, TodoRequest};
use super::repo_types::Todo;
use super::services::Pagination;

pub fn todo_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/todos", post(create_todo).get(list_todos))
        .route("/todos/:id", put(update_todo).delete(delete_todo))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// An id that is not a UUID cannot name an existing todo.
fn todo_id(path: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    path.map(|Path(id)| id).map_err(|_| AppError::NotFound("todo"))
}

#[instrument(skip(state, payload))]
pub async fn create_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<TodoRequest>, JsonRejection>,
) -> AppResult<Json<Todo>> {
    let Json(body) = payload?;
    let todo = state
        .todos
        .create(user_id, &body.title, &body.description)
        .await?;
    Ok(Json(todo))
}

#[instrument(skip(state, path, payload))]
pub async fn update_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<TodoRequest>, JsonRejection>,
) -> AppResult<Json<Todo>> {
    let id = todo_id(path)?;
    // Ownership is decided before the body is read.
    let existing = state.todos.authorize(id, user_id).await?;
    let Json(body) = payload?;
    let todo = state
        .todos
        .apply_update(&existing, &body.title, &body.description)
        .await?;
    Ok(Json(todo))
}

#[instrument(skip(state, path))]
pub async fn delete_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let id = todo_id(path)?;
    state.todos.delete(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, query))]
pub async fn list_todos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<TodoListResponse>> {
    let Query(q) = query?;
    let pagination = Pagination::new(q.page, q.limit)?;
    let page = state.todos.list(user_id, pagination).await?;
    Ok(Json(page.into()))
}
