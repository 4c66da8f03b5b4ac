use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tenant_router::app::{app, AppState, HttpOptions};
use tenant_router::config::config;
use tenant_router::database::{bootstrap, DatabaseManager, PgClientFactory, TenantExecutor};
use tenant_router::middleware::TenantRouting;
use tenant_router::tasks::PgTaskRepository;

#[derive(Debug, Parser)]
#[command(name = "tenant-router", version, about = "Multi-tenant task API")]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Create missing tenant schemas before serving (overrides DATABASE_AUTO_MIGRATE)
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, TENANCY_ALLOWED_TENANTS, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = config();
    tracing::info!("Starting tenant router in {:?} mode", config.environment);

    let allow_list = config.allow_list();
    if allow_list.as_slice().is_empty() {
        anyhow::bail!("TENANCY_ALLOWED_TENANTS is empty; nothing to serve");
    }
    allow_list.validate().context("TENANCY_ALLOWED_TENANTS")?;

    let factory = PgClientFactory::from_env(config.pool_settings()).context("database configuration")?;
    let manager = Arc::new(
        DatabaseManager::connect(factory)
            .await
            .context("failed to connect default database client")?,
    );

    let mut executor = TenantExecutor::new(Arc::clone(&manager));
    if let Some(threshold) = config.slow_query_threshold() {
        executor = executor.with_slow_threshold(threshold);
    }

    if args.migrate || config.database.auto_migrate {
        bootstrap::ensure_tenant_schemas(&executor, &allow_list)
            .await
            .context("failed to provision tenant schemas")?;
    }

    let state = AppState {
        tasks: Arc::new(PgTaskRepository::new(executor)),
        database: manager.clone(),
        routing: TenantRouting::new(config.tenancy.route_prefix.clone(), allow_list.clone()),
    };
    let options = HttpOptions {
        cors_origins: config.security.cors_origins.clone(),
        request_logging: config.api.enable_request_logging,
    };

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);
    for tenant in allow_list.tenants() {
        tracing::info!(
            "Tenant {} -> /{}/{}/tasks (schema {})",
            tenant,
            config.tenancy.route_prefix,
            tenant,
            tenant.schema_name()
        );
    }

    let served = axum::serve(listener, app(state, &options))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    manager.close_all().await;
    served.context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
