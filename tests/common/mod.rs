#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use tenant_router::app::{app, AppState, HttpOptions};
use tenant_router::database::{
    ClientFactory, DatabaseError, DatabaseManager, SchemaClient, SchemaSession, TenantExecutor,
};
use tenant_router::middleware::TenantRouting;
use tenant_router::tasks::{CreateTask, Task, TaskRepository, UpdateTask};
use tenant_router::tenant::{AllowList, SchemaName};

/// Rows per schema, standing in for one database with a `tasks` table in each schema
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    schemas: Arc<Mutex<HashMap<String, Vec<Task>>>>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl MemoryDatabase {
    pub fn rows(&self, schema: &str) -> Vec<Task> {
        self.schemas.lock().unwrap().get(schema).cloned().unwrap_or_default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

pub struct MemoryFactory {
    db: MemoryDatabase,
}

#[async_trait]
impl ClientFactory for MemoryFactory {
    type Client = MemoryClient;

    async fn connect(&self, _schema: &SchemaName) -> Result<MemoryClient, DatabaseError> {
        Ok(MemoryClient { db: self.db.clone() })
    }
}

pub struct MemoryClient {
    db: MemoryDatabase,
}

#[async_trait]
impl SchemaClient for MemoryClient {
    type Session = MemorySession;

    async fn acquire(&self) -> Result<MemorySession, DatabaseError> {
        Ok(MemorySession {
            db: self.db.clone(),
            search_path: SchemaName::PUBLIC.to_string(),
        })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn close(&self) {}
}

pub struct MemorySession {
    db: MemoryDatabase,
    search_path: String,
}

impl MemorySession {
    /// Unqualified `tasks`, resolved through the session's search_path
    fn with_tasks<R>(&self, f: impl FnOnce(&mut Vec<Task>) -> R) -> R {
        let mut schemas = self.db.schemas.lock().unwrap();
        f(schemas.entry(self.search_path.clone()).or_default())
    }
}

#[async_trait]
impl SchemaSession for MemorySession {
    async fn set_search_path(&mut self, schema: &SchemaName) -> Result<(), DatabaseError> {
        self.db.commands.lock().unwrap().push(format!("SET search_path TO {}", schema));
        self.search_path = schema.to_string();
        Ok(())
    }
}

pub struct MemoryTaskRepository {
    executor: TenantExecutor<MemoryFactory>,
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn find_all(&self) -> Result<Vec<Task>, DatabaseError> {
        self.executor
            .execute(|session| {
                Box::pin(async move {
                    let mut tasks = session.with_tasks(|tasks| tasks.clone());
                    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                    Ok::<_, DatabaseError>(tasks)
                })
            })
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        self.executor
            .execute(move |session| {
                Box::pin(async move {
                    Ok::<_, DatabaseError>(session.with_tasks(|tasks| tasks.iter().find(|t| t.id == id).cloned()))
                })
            })
            .await
    }

    async fn create(&self, input: CreateTask) -> Result<Task, DatabaseError> {
        self.executor
            .execute(move |session| {
                Box::pin(async move {
                    let now = Utc::now();
                    let task = Task {
                        id: Uuid::new_v4(),
                        title: input.title,
                        description: input.description,
                        completed: false,
                        created_at: now,
                        updated_at: now,
                    };
                    session.with_tasks(|tasks| tasks.push(task.clone()));
                    Ok::<_, DatabaseError>(task)
                })
            })
            .await
    }

    async fn update(&self, id: Uuid, input: UpdateTask) -> Result<Option<Task>, DatabaseError> {
        self.executor
            .execute(move |session| {
                Box::pin(async move {
                    let updated = session.with_tasks(|tasks| {
                        tasks.iter_mut().find(|t| t.id == id).map(|task| {
                            if let Some(title) = input.title {
                                task.title = title;
                            }
                            if let Some(description) = input.description {
                                task.description = Some(description);
                            }
                            if let Some(completed) = input.completed {
                                task.completed = completed;
                            }
                            task.updated_at = Utc::now();
                            task.clone()
                        })
                    });
                    Ok::<_, DatabaseError>(updated)
                })
            })
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        self.executor
            .execute(move |session| {
                Box::pin(async move {
                    let removed = session.with_tasks(|tasks| {
                        let before = tasks.len();
                        tasks.retain(|t| t.id != id);
                        tasks.len() < before
                    });
                    Ok::<_, DatabaseError>(removed)
                })
            })
            .await
    }
}

/// Full router over the in-memory database, tenants `project-a` and `project-b`
pub struct TestApp {
    pub router: Router,
    pub db: MemoryDatabase,
    pub manager: Arc<DatabaseManager<MemoryFactory>>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let db = MemoryDatabase::default();
        let manager = Arc::new(
            DatabaseManager::connect(MemoryFactory { db: db.clone() })
                .await
                .context("connect memory database")?,
        );
        let executor = TenantExecutor::new(Arc::clone(&manager));

        let state = AppState {
            tasks: Arc::new(MemoryTaskRepository { executor }),
            database: manager.clone(),
            routing: TenantRouting::new("api", AllowList::new(["project-a", "project-b"])),
        };

        Ok(Self {
            router: app(state, &HttpOptions::default()),
            db,
            manager,
        })
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json)?)
            }
            None => Body::empty(),
        };

        self.send(builder.body(body)?).await
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body: {:?}", bytes))?
        };
        Ok((status, value))
    }

    pub async fn cached_schemas(&self) -> Vec<String> {
        self.manager
            .cached_schemas()
            .await
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }
}
