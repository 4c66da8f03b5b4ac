use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;

use crate::database::client::{ClientFactory, PgClientFactory, SchemaClient};
use crate::tenant::{SchemaName, TenantError};

/// Errors from DatabaseManager and schema-scoped execution
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid schema name: {0}")]
    InvalidSchemaName(String),

    #[error("Connection manager is closed")]
    Closed,

    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// `Some` once connected. `close_all` seals empty slots with `None`.
type ClientSlot<C> = Arc<OnceCell<Option<Arc<C>>>>;

/// Lazily created, per-schema client cache plus the always-on `public` client.
///
/// The manager owns every client it hands out; callers borrow them per operation
/// and never close them.
pub struct DatabaseManager<F: ClientFactory = PgClientFactory> {
    factory: F,
    default_client: Arc<F::Client>,
    clients: RwLock<HashMap<SchemaName, ClientSlot<F::Client>>>,
    closed: AtomicBool,
}

impl<F: ClientFactory> DatabaseManager<F> {
    /// Connect the default client. Tenant clients are created on first use.
    pub async fn connect(factory: F) -> Result<Self, DatabaseError> {
        let default_client = factory.connect(&SchemaName::public()).await?;
        info!("Created default database client ({})", SchemaName::PUBLIC);

        Ok(Self {
            factory,
            default_client: Arc::new(default_client),
            clients: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Client for the shared `public` schema
    pub fn default_client(&self) -> Arc<F::Client> {
        Arc::clone(&self.default_client)
    }

    /// Get the cached client for `schema`, creating it on first use.
    ///
    /// Concurrent first requests for the same schema wait on a single
    /// construction. A failed construction leaves the slot empty.
    pub async fn schema_client(&self, schema: &SchemaName) -> Result<Arc<F::Client>, DatabaseError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DatabaseError::Closed);
        }
        if !schema.is_valid() {
            return Err(DatabaseError::InvalidSchemaName(schema.to_string()));
        }

        let slot = self.slot(schema).await?;
        let client = slot
            .get_or_try_init(|| async {
                let client = self.factory.connect(schema).await?;
                info!("Created database client for schema: {}", schema);
                Ok::<_, DatabaseError>(Some(Arc::new(client)))
            })
            .await?;

        // A client finished after shutdown began belongs to close_all
        match client {
            Some(client) if !self.closed.load(Ordering::Acquire) => Ok(Arc::clone(client)),
            _ => Err(DatabaseError::Closed),
        }
    }

    /// Slots are only handed out while the map is still live, so every slot
    /// is either drained by `close_all` or never created.
    async fn slot(&self, schema: &SchemaName) -> Result<ClientSlot<F::Client>, DatabaseError> {
        // Fast path: try read lock
        {
            let clients = self.clients.read().await;
            if self.closed.load(Ordering::Acquire) {
                return Err(DatabaseError::Closed);
            }
            if let Some(slot) = clients.get(schema) {
                return Ok(Arc::clone(slot));
            }
        }

        let mut clients = self.clients.write().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(DatabaseError::Closed);
        }
        Ok(Arc::clone(clients.entry(schema.clone()).or_default()))
    }

    /// Schemas with a live client, sorted
    pub async fn cached_schemas(&self) -> Vec<SchemaName> {
        let clients = self.clients.read().await;
        let mut names: Vec<SchemaName> = clients
            .iter()
            .filter(|(_, slot)| matches!(slot.get(), Some(Some(_))))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Pings the default client to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DatabaseError::Closed);
        }
        self.default_client.ping().await
    }

    /// Close every cached client and the default client. Only the first call does any work.
    pub async fn close_all(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let drained: Vec<(SchemaName, ClientSlot<F::Client>)> = {
            let mut clients = self.clients.write().await;
            clients.drain().collect()
        };

        for (name, slot) in drained {
            // Waits out a connect still in flight; otherwise seals the slot
            if let Some(client) = slot.get_or_init(|| async { None }).await {
                client.close().await;
                info!("Closed database client: {}", name);
            }
        }

        self.default_client.close().await;
        info!("Closed database client: {}", SchemaName::PUBLIC);
    }
}

/// Connectivity probe used by the health endpoint
#[async_trait]
pub trait DatabaseHealth: Send + Sync {
    async fn health_check(&self) -> Result<(), DatabaseError>;
}

#[async_trait]
impl<F: ClientFactory> DatabaseHealth for DatabaseManager<F> {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(self).await
    }
}
