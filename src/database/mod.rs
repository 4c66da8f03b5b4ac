pub mod bootstrap;
pub mod client;
pub mod executor;
pub mod manager;

pub use client::{ClientFactory, PgClientFactory, PoolSettings, SchemaClient, SchemaSession, Session};
pub use executor::TenantExecutor;
pub use manager::{DatabaseError, DatabaseHealth, DatabaseManager};
