use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::time::Duration;
use tracing::debug;

use crate::database::manager::DatabaseError;
use crate::tenant::SchemaName;

/// One physical connection, held exclusively for the length of an operation
#[async_trait]
pub trait SchemaSession: Send {
    /// Point unqualified table names at `schema` for this session
    async fn set_search_path(&mut self, schema: &SchemaName) -> Result<(), DatabaseError>;

    /// Close the connection instead of handing it back for reuse.
    /// Used when the session state can no longer be trusted.
    fn discard(self)
    where
        Self: Sized,
    {
    }
}

/// Long-lived client for one schema, owned by the `DatabaseManager`
#[async_trait]
pub trait SchemaClient: Send + Sync + 'static {
    type Session: SchemaSession + 'static;

    async fn acquire(&self) -> Result<Self::Session, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn close(&self);
}

/// Builds the client for a schema on first use
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    type Client: SchemaClient;

    async fn connect(&self, schema: &SchemaName) -> Result<Self::Client, DatabaseError>;
}

/// Session type handed to operations run through a factory's clients
pub type Session<F> = <<F as ClientFactory>::Client as SchemaClient>::Session;

pub fn search_path_sql(schema: &SchemaName) -> String {
    format!("SET search_path TO {}", schema.quoted())
}

#[async_trait]
impl SchemaSession for PoolConnection<Postgres> {
    async fn set_search_path(&mut self, schema: &SchemaName) -> Result<(), DatabaseError> {
        let sql = search_path_sql(schema);
        sqlx::query(&sql).execute(&mut **self).await?;
        debug!("search_path set to {}", schema);
        Ok(())
    }

    fn discard(self) {
        // Detached connections are closed on drop rather than returned to the pool
        drop(self.detach());
    }
}

#[async_trait]
impl SchemaClient for PgPool {
    type Session = PoolConnection<Postgres>;

    async fn acquire(&self) -> Result<Self::Session, DatabaseError> {
        Ok(PgPool::acquire(self).await?)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(self).await?;
        Ok(())
    }

    async fn close(&self) {
        PgPool::close(self).await
    }
}

/// Pool sizing shared by every schema pool
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// Creates one `PgPool` per schema against `DATABASE_URL`
pub struct PgClientFactory {
    base_url: String,
    settings: PoolSettings,
}

impl PgClientFactory {
    pub fn new(base_url: impl Into<String>, settings: PoolSettings) -> Result<Self, DatabaseError> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        Ok(Self { base_url, settings })
    }

    /// Reads `DATABASE_URL` from the environment
    pub fn from_env(settings: PoolSettings) -> Result<Self, DatabaseError> {
        let base = std::env::var("DATABASE_URL").map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        Self::new(base, settings)
    }

    /// Tag each pool's connections with the schema it serves so they can be told apart
    /// in `pg_stat_activity`
    pub fn build_connection_string(base: &str, schema: &SchemaName) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "application_name")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair("application_name", &format!("{}:{}", env!("CARGO_PKG_NAME"), schema));

        Ok(url.into())
    }
}

#[async_trait]
impl ClientFactory for PgClientFactory {
    type Client = PgPool;

    async fn connect(&self, schema: &SchemaName) -> Result<PgPool, DatabaseError> {
        let connection_string = Self::build_connection_string(&self.base_url, schema)?;

        let pool = PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(self.settings.acquire_timeout)
            .connect(&connection_string)
            .await?;

        Ok(pool)
    }
}
