//! Axum application setup
//!
//! Creates and configures the Axum application with routes and middleware.
//! All services are explicit constructed objects wired into [`AppState`], so
//! tests can swap the session factory and transport for doubles.

use crate::browser::{BrowserPool, SessionFactory};
use crate::clearance::ClearanceCache;
use crate::config::Settings;
use crate::limiter::RateLimiter;
use crate::proxy::{HttpTransport, ProxyOrchestrator};
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Proxy request orchestrator
    pub orchestrator: Arc<ProxyOrchestrator>,
    /// Clearance cache, exposed for diagnostics endpoints
    pub cache: Arc<ClearanceCache>,
    /// Browser pool, exposed for health reporting and shutdown
    pub pool: Arc<BrowserPool>,
    /// Application settings
    pub settings: Arc<Settings>,
    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

/// Wire the service graph from settings and the two external seams
pub fn build_state(
    settings: Settings,
    factory: Arc<dyn SessionFactory>,
    transport: Arc<dyn HttpTransport>,
) -> AppState {
    let settings = Arc::new(settings);
    let pool = Arc::new(BrowserPool::new(settings.browser.max_sessions, factory));
    let cache = Arc::new(ClearanceCache::new(settings.cache.clearance_ttl_secs));
    let limiter = Arc::new(RateLimiter::new(settings.limits.per_minute));
    let orchestrator = Arc::new(ProxyOrchestrator::new(
        Arc::clone(&settings),
        Arc::clone(&cache),
        Arc::clone(&pool),
        transport,
        limiter,
    ));

    AppState {
        orchestrator,
        cache,
        pool,
        settings,
        start_time: std::time::Instant::now(),
    }
}

/// Create the main Axum application with routes and middleware
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/proxy", post(super::handlers::proxy))
        .route("/health", get(super::handlers::health))
        .route("/clearances", get(super::handlers::list_clearances))
        .route("/clearances/{domain}", delete(super::handlers::clear_clearance))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
