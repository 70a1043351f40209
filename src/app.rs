// Router and shared state for the portal

use axum::{
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::handlers::{protected, public};
use crate::middleware::forward_auth_middleware;
use crate::services::{Backends, CommissionService};

#[derive(Clone)]
pub struct AppState {
    pub service: CommissionService,
    pub security: SecurityConfig,
    /// Deadline applied to the backend calls of one request; 0 disables it
    pub request_timeout_ms: u64,
}

impl AppState {
    pub fn new(backends: Backends, config: &AppConfig) -> Self {
        Self {
            service: CommissionService::new(backends, config.commission.clone()),
            security: config.security.clone(),
            request_timeout_ms: config.backend.request_timeout_ms,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.security);

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Commission pages and API (bearer token forwarded to backends)
        .merge(commission_routes(state.clone()))
        .merge(commission_api_routes(state.clone()))
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn commission_routes(state: AppState) -> Router {
    use protected::commission;

    Router::new()
        .route(
            "/commission/remittance",
            get(commission::remittance_get).post(commission::remittance_post),
        )
        .route(
            "/commission/remittance/tier/:id/delete",
            post(commission::tier_delete_form),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), forward_auth_middleware))
        .with_state(state)
}

fn commission_api_routes(state: AppState) -> Router {
    use protected::commission;

    Router::new()
        .route("/api/commission/remittance", post(commission::remittance_api_post))
        .route("/api/commission/tier/:id", delete(commission::tier_delete))
        .route("/api/commission/remittance/sync", post(commission::sync_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), forward_auth_middleware))
        .with_state(state)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    }
}
