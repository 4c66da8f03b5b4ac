use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tasks::{service, CreateTask, Task, TaskRepository, UpdateTask};

/// Task persistence for the tenant resolved by the middleware
pub type TaskStore = Arc<dyn TaskRepository>;

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid task id: {}", raw)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::invalid_json(rejection.body_text()))
}

/// GET /api/:tenant/tasks
pub async fn list(State(store): State<TaskStore>) -> ApiResult<Vec<Task>> {
    let tasks = service::get_tasks(store.as_ref()).await?;
    Ok(ApiResponse::success(tasks))
}

/// GET /api/:tenant/tasks/:id
pub async fn get(State(store): State<TaskStore>, Path((_tenant, id)): Path<(String, String)>) -> ApiResult<Task> {
    let task = service::get_task(store.as_ref(), parse_id(&id)?).await?;
    Ok(ApiResponse::success(task))
}

/// POST /api/:tenant/tasks
pub async fn create(
    State(store): State<TaskStore>,
    payload: Result<Json<CreateTask>, JsonRejection>,
) -> ApiResult<Task> {
    let task = service::create_task(store.as_ref(), body(payload)?).await?;
    Ok(ApiResponse::created(task))
}

/// PUT /api/:tenant/tasks/:id
pub async fn update(
    State(store): State<TaskStore>,
    Path((_tenant, id)): Path<(String, String)>,
    payload: Result<Json<UpdateTask>, JsonRejection>,
) -> ApiResult<Task> {
    let id = parse_id(&id)?;
    let task = service::update_task(store.as_ref(), id, body(payload)?).await?;
    Ok(ApiResponse::success(task))
}

/// PUT /api/:tenant/tasks/:id/toggle
pub async fn toggle(State(store): State<TaskStore>, Path((_tenant, id)): Path<(String, String)>) -> ApiResult<Task> {
    let task = service::toggle_task(store.as_ref(), parse_id(&id)?).await?;
    Ok(ApiResponse::success(task))
}

/// DELETE /api/:tenant/tasks/:id
pub async fn delete(State(store): State<TaskStore>, Path((_tenant, id)): Path<(String, String)>) -> ApiResult<()> {
    service::delete_task(store.as_ref(), parse_id(&id)?).await?;
    Ok(ApiResponse::no_content())
}
