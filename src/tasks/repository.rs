use async_trait::async_trait;
use uuid::Uuid;

use crate::database::{DatabaseError, PgClientFactory, TenantExecutor};

use super::model::{CreateTask, Task, UpdateTask};

/// Persistence port for tasks. Implementations scope every call to the
/// tenant of the current request.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Newest first
    async fn find_all(&self) -> Result<Vec<Task>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, DatabaseError>;

    async fn create(&self, input: CreateTask) -> Result<Task, DatabaseError>;

    /// `None` when no task has this id
    async fn update(&self, id: Uuid, input: UpdateTask) -> Result<Option<Task>, DatabaseError>;

    /// Whether a row was removed
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

// Unqualified `tasks`: the session's search_path picks the tenant schema
const SELECT_ALL: &str =
    "SELECT id, title, description, completed, created_at, updated_at FROM tasks ORDER BY created_at DESC";

const SELECT_BY_ID: &str =
    "SELECT id, title, description, completed, created_at, updated_at FROM tasks WHERE id = $1";

const INSERT: &str = "INSERT INTO tasks (id, title, description) VALUES ($1, $2, $3) \
    RETURNING id, title, description, completed, created_at, updated_at";

// NULL parameters leave the column untouched
const UPDATE: &str = "UPDATE tasks SET \
    title = COALESCE($2, title), \
    description = COALESCE($3, description), \
    completed = COALESCE($4, completed), \
    updated_at = now() \
    WHERE id = $1 \
    RETURNING id, title, description, completed, created_at, updated_at";

const DELETE: &str = "DELETE FROM tasks WHERE id = $1";

/// `tasks` table in the tenant's schema, reached through `search_path`
pub struct PgTaskRepository {
    executor: TenantExecutor<PgClientFactory>,
}

impl PgTaskRepository {
    pub fn new(executor: TenantExecutor<PgClientFactory>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn find_all(&self) -> Result<Vec<Task>, DatabaseError> {
        self.executor
            .execute(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query_as::<_, Task>(SELECT_ALL).fetch_all(&mut **conn).await?;
                    Ok::<_, DatabaseError>(rows)
                })
            })
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        self.executor
            .execute(move |conn| {
                Box::pin(async move {
                    let row = sqlx::query_as::<_, Task>(SELECT_BY_ID)
                        .bind(id)
                        .fetch_optional(&mut **conn)
                        .await?;
                    Ok::<_, DatabaseError>(row)
                })
            })
            .await
    }

    async fn create(&self, input: CreateTask) -> Result<Task, DatabaseError> {
        self.executor
            .execute(move |conn| {
                Box::pin(async move {
                    let task = sqlx::query_as::<_, Task>(INSERT)
                        .bind(Uuid::new_v4())
                        .bind(input.title)
                        .bind(input.description)
                        .fetch_one(&mut **conn)
                        .await?;
                    Ok::<_, DatabaseError>(task)
                })
            })
            .await
    }

    async fn update(&self, id: Uuid, input: UpdateTask) -> Result<Option<Task>, DatabaseError> {
        self.executor
            .execute(move |conn| {
                Box::pin(async move {
                    let task = sqlx::query_as::<_, Task>(UPDATE)
                        .bind(id)
                        .bind(input.title)
                        .bind(input.description)
                        .bind(input.completed)
                        .fetch_optional(&mut **conn)
                        .await?;
                    Ok::<_, DatabaseError>(task)
                })
            })
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        self.executor
            .execute(move |conn| {
                Box::pin(async move {
                    let result = sqlx::query(DELETE)
                        .bind(id)
                        .execute(&mut **conn)
                        .await?;
                    Ok::<_, DatabaseError>(result.rows_affected() > 0)
                })
            })
            .await
    }
}
