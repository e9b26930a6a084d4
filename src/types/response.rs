//! Response type definitions
//!
//! Defines the structures returned by the proxy and diagnostic endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response for a proxied request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyResponse {
    /// HTTP status code returned by the origin
    pub status_code: u16,

    /// Response headers from the origin
    pub headers: HashMap<String, String>,

    /// Response body as text
    pub body: String,
}

impl ProxyResponse {
    /// Create a new proxy response
    pub fn new(status_code: u16, headers: HashMap<String, String>, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers,
            body: body.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status string
    pub status: String,

    /// Number of unexpired cached clearances
    pub active_clearances: usize,

    /// Browser sessions currently leased
    pub pool_busy: usize,

    /// Idle browser sessions available for reuse
    pub pool_free: usize,

    /// Total live browser sessions
    pub pool_total: usize,

    /// Server uptime in seconds
    pub uptime_seconds: u64,
}

/// Diagnostic view of one cached clearance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearanceInfo {
    /// Domain the clearance applies to
    pub domain: String,

    /// User agent the clearance was issued under
    pub user_agent: String,

    /// When the clearance was obtained
    pub issued_at: DateTime<Utc>,

    /// When the clearance stops being served
    pub expires_at: DateTime<Utc>,
}

/// Error response for API errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,

    /// Machine-readable error code
    pub code: String,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}
