use axum::{
    extract::FromRef,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::database::DatabaseHealth;
use crate::handlers::{system, tasks, TaskStore};
use crate::middleware::{request_context_middleware, validate_tenant_middleware, TenantRouting};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskStore,
    pub database: Arc<dyn DatabaseHealth>,
    pub routing: TenantRouting,
}

impl FromRef<AppState> for TaskStore {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.tasks)
    }
}

/// Router options that do not affect tenant resolution
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub cors_origins: Vec<String>,
    pub request_logging: bool,
}

pub fn app(state: AppState, options: &HttpOptions) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        // Tenant-scoped API
        .merge(tenant_routes(&state))
        .with_state(state);

    let router = router.layer(cors_layer(&options.cors_origins));
    if options.request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// `/{prefix}/:tenant/tasks...`, each request wrapped in its own context and
/// rejected before the handler unless the tenant is allowed
fn tenant_routes(state: &AppState) -> Router<AppState> {
    let prefix = &state.routing.route_prefix;

    Router::new()
        .route(
            &format!("/{}/:tenant/tasks", prefix),
            get(tasks::list).post(tasks::create),
        )
        .route(
            &format!("/{}/:tenant/tasks/:id", prefix),
            get(tasks::get).put(tasks::update).delete(tasks::delete),
        )
        .route(&format!("/{}/:tenant/tasks/:id/toggle", prefix), put(tasks::toggle))
        .route_layer(from_fn_with_state(state.routing.clone(), validate_tenant_middleware))
        .route_layer(from_fn(request_context_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
