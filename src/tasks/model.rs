use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/:tenant/tasks`.
/// Fields default so that missing values surface as validation errors.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdateTask {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl UpdateTask {
    pub fn toggle(task: &Task) -> Self {
        Self {
            completed: Some(!task.completed),
            ..Default::default()
        }
    }
}
