use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::database::client::{ClientFactory, PgClientFactory, SchemaClient, SchemaSession, Session};
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::tenant::{SchemaName, TenantContext};

/// Runs units of work against the current tenant's schema.
///
/// Every operation checks out its own physical connection from the schema's
/// pool, so the `search_path` it sets is never visible to another operation.
pub struct TenantExecutor<F: ClientFactory = PgClientFactory> {
    manager: Arc<DatabaseManager<F>>,
    slow_threshold: Option<Duration>,
}

impl<F: ClientFactory> Clone for TenantExecutor<F> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            slow_threshold: self.slow_threshold,
        }
    }
}

impl<F: ClientFactory> TenantExecutor<F> {
    pub fn new(manager: Arc<DatabaseManager<F>>) -> Self {
        Self {
            manager,
            slow_threshold: None,
        }
    }

    /// Warn when an operation takes longer than `threshold`
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    pub fn manager(&self) -> &Arc<DatabaseManager<F>> {
        &self.manager
    }

    /// Run `op` in the schema of the tenant stored in the request context.
    ///
    /// Fails with `ContextNotSet` outside a request or before the tenant was resolved.
    pub async fn execute<T, E, Op>(&self, op: Op) -> Result<T, E>
    where
        Op: for<'c> FnOnce(&'c mut Session<F>) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<DatabaseError> + Send,
    {
        let schema = TenantContext::schema_name().map_err(DatabaseError::from)?;
        self.execute_in_schema(&schema, op).await
    }

    /// Set `search_path` to `schema`, run `op`, then reset it to `public` on every exit path.
    ///
    /// The callback's error is returned unchanged once the reset has run. A failed
    /// reset closes the connection instead of returning it to the pool; if the
    /// callback had succeeded, the reset error is returned.
    pub async fn execute_in_schema<T, E, Op>(&self, schema: &SchemaName, op: Op) -> Result<T, E>
    where
        Op: for<'c> FnOnce(&'c mut Session<F>) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<DatabaseError> + Send,
    {
        let client = self.manager.schema_client(schema).await?;
        let session = client.acquire().await?;
        let started = Instant::now();

        let mut guard = ResetGuard::new(session, schema.clone());
        let outcome = match guard.session.as_mut() {
            Some(session) => match session.set_search_path(schema).await {
                Ok(()) => {
                    debug!("Executing in schema {}", schema);
                    op(session).await
                }
                Err(err) => Err(err.into()),
            },
            None => Err(DatabaseError::Closed.into()),
        };
        let reset = guard.reset().await;

        self.report_slow(schema, started.elapsed());

        match (outcome, reset) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(reset_err)) => Err(reset_err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(reset_err)) => {
                error!("search_path reset for {} failed after an operation error: {}", schema, reset_err);
                Err(err)
            }
        }
    }

    /// Run `op` against the shared `public` client, with no schema switching
    pub async fn execute_public<T, E, Op>(&self, op: Op) -> Result<T, E>
    where
        Op: for<'c> FnOnce(&'c mut Session<F>) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<DatabaseError> + Send,
    {
        let mut session = self.manager.default_client().acquire().await?;
        op(&mut session).await
    }

    fn report_slow(&self, schema: &SchemaName, elapsed: Duration) {
        if let Some(threshold) = self.slow_threshold {
            if elapsed > threshold {
                warn!(
                    schema = %schema,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "slow schema-scoped operation"
                );
            }
        }
    }
}

/// Owns a session whose `search_path` has (possibly) been moved off `public`.
///
/// `reset` restores it inline. If the owning future is dropped first, `Drop`
/// hands the reset to the runtime so the connection never re-enters the pool
/// pointing at a tenant schema.
struct ResetGuard<S: SchemaSession + 'static> {
    session: Option<S>,
    schema: SchemaName,
}

impl<S: SchemaSession + 'static> ResetGuard<S> {
    fn new(session: S, schema: SchemaName) -> Self {
        Self {
            session: Some(session),
            schema,
        }
    }

    async fn reset(&mut self) -> Result<(), DatabaseError> {
        match self.session.take() {
            Some(session) => reset_session(session, &self.schema).await,
            None => Ok(()),
        }
    }
}

impl<S: SchemaSession + 'static> Drop for ResetGuard<S> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        warn!("Operation on schema {} was cancelled; resetting search_path in background", self.schema);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let schema = self.schema.clone();
                handle.spawn(async move {
                    let _ = reset_session(session, &schema).await;
                });
            }
            Err(_) => session.discard(),
        }
    }
}

async fn reset_session<S: SchemaSession>(mut session: S, schema: &SchemaName) -> Result<(), DatabaseError> {
    match session.set_search_path(&SchemaName::public()).await {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!("Failed to reset search_path after {}; discarding connection: {}", schema, err);
            session.discard();
            Err(err)
        }
    }
}
