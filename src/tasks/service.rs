use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::database::DatabaseError;

use super::model::{CreateTask, Task, UpdateTask};
use super::repository::TaskRepository;
use super::validation::{validate_create_task, validate_update_task, ValidationResult};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task with ID {0} not found")]
    NotFound(Uuid),

    #[error("{message}")]
    Validation {
        message: String,
        field_errors: BTreeMap<String, String>,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<ValidationResult> for TaskError {
    fn from(result: ValidationResult) -> Self {
        TaskError::Validation {
            message: result.message(),
            field_errors: result.errors,
        }
    }
}

pub async fn get_tasks(repo: &dyn TaskRepository) -> Result<Vec<Task>, TaskError> {
    Ok(repo.find_all().await?)
}

pub async fn get_task(repo: &dyn TaskRepository, id: Uuid) -> Result<Task, TaskError> {
    repo.find_by_id(id).await?.ok_or(TaskError::NotFound(id))
}

/// Validate, trim, then persist
pub async fn create_task(repo: &dyn TaskRepository, input: CreateTask) -> Result<Task, TaskError> {
    let validation = validate_create_task(&input);
    if !validation.is_valid() {
        return Err(validation.into());
    }

    let input = CreateTask {
        title: input.title.trim().to_string(),
        description: input.description.map(|d| d.trim().to_string()),
    };
    Ok(repo.create(input).await?)
}

pub async fn update_task(repo: &dyn TaskRepository, id: Uuid, input: UpdateTask) -> Result<Task, TaskError> {
    let validation = validate_update_task(&input);
    if !validation.is_valid() {
        return Err(validation.into());
    }

    get_task(repo, id).await?;
    repo.update(id, input).await?.ok_or(TaskError::NotFound(id))
}

pub async fn toggle_task(repo: &dyn TaskRepository, id: Uuid) -> Result<Task, TaskError> {
    let task = get_task(repo, id).await?;
    repo.update(id, UpdateTask::toggle(&task))
        .await?
        .ok_or(TaskError::NotFound(id))
}

pub async fn delete_task(repo: &dyn TaskRepository, id: Uuid) -> Result<(), TaskError> {
    get_task(repo, id).await?;
    if repo.delete(id).await? {
        Ok(())
    } else {
        Err(TaskError::NotFound(id))
    }
}
