//! HTTP request handlers
//!
//! Implementation of HTTP endpoints for the clearance proxy server.

use crate::server::app::AppState;
use crate::types::{ClearanceInfo, ErrorResponse, HealthResponse, ProxyRequest, ProxyResponse};
use axum::Json as RequestJson;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map an error kind to the HTTP status the caller should see
fn error_status(error: &crate::Error) -> StatusCode {
    match error {
        crate::Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        crate::Error::TargetNotAllowed { .. } | crate::Error::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        crate::Error::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        crate::Error::PoolExhausted { .. } | crate::Error::PoolClosed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        crate::Error::ChallengeTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        crate::Error::ChallengeNotBypassable { .. }
        | crate::Error::ChallengeAutomation { .. }
        | crate::Error::Network(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_api_error(error: crate::Error) -> ApiError {
    (
        error_status(&error),
        Json(ErrorResponse::new(error.to_string(), error.code())),
    )
}

/// Authenticate the caller from the X-Token header.
///
/// The accepted token doubles as the rate-limiter caller identity. An empty
/// configured token list disables authentication.
fn require_token(state: &AppState, headers: &HeaderMap) -> crate::Result<String> {
    let tokens = &state.settings.security.api_tokens;
    if tokens.is_empty() {
        return Ok("anonymous".to_string());
    }
    let provided = headers.get("x-token").and_then(|value| value.to_str().ok());
    match provided {
        Some(token) if tokens.iter().any(|accepted| accepted == token) => Ok(token.to_string()),
        _ => Err(crate::Error::unauthorized("invalid or missing token")),
    }
}

/// Proxy a request through a cached clearance
///
/// POST /proxy
pub async fn proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    RequestJson(request): RequestJson<ProxyRequest>,
) -> Result<Json<ProxyResponse>, ApiError> {
    let caller = require_token(&state, &headers).map_err(into_api_error)?;
    tracing::debug!(caller, url = %request.url, "Received proxy request");

    match state.orchestrator.proxy(&caller, &request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::error!(caller, url = %request.url, "Proxy request failed: {}", e);
            Err(into_api_error(e))
        }
    }
}

/// Health and occupancy report
///
/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.pool.stats();
    Json(HealthResponse {
        status: "healthy".to_string(),
        active_clearances: state.cache.active_count().await,
        pool_busy: stats.busy,
        pool_free: stats.free,
        pool_total: stats.total,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// List cached clearances for diagnostics; never triggers a solve
///
/// GET /clearances
pub async fn list_clearances(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ClearanceInfo>>, ApiError> {
    require_token(&state, &headers).map_err(into_api_error)?;
    Ok(Json(state.cache.snapshot().await))
}

/// Admin-clear one cached domain
///
/// DELETE /clearances/{domain}
pub async fn clear_clearance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(domain): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_token(&state, &headers).map_err(into_api_error)?;
    let domain = domain.to_ascii_lowercase();
    if state.cache.invalidate(&domain).await {
        tracing::info!(domain, "Clearance cleared by admin request");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
