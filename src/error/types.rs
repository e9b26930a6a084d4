//! Error type definitions
//!
//! Defines the main error types used throughout the clearance proxy.

use thiserror::Error;

/// Main error type for the clearance proxy
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// No browser session became available within the acquire deadline
    #[error("Browser pool exhausted: no session available within {waited_secs}s")]
    PoolExhausted {
        /// How long the caller waited for a session
        waited_secs: u64,
    },

    /// The pool was shut down while callers were still using it
    #[error("Browser pool is closed")]
    PoolClosed,

    /// The challenge did not resolve within the solve deadline
    #[error("Challenge solve timed out for {domain}")]
    ChallengeTimeout {
        /// Target domain the solve was running against
        domain: String,
    },

    /// The underlying browser session capability failed
    #[error("Challenge automation error: {message}")]
    ChallengeAutomation { message: String },

    /// The origin kept rejecting replayed clearances after a forced re-solve
    #[error("Challenge not bypassable for {domain}")]
    ChallengeNotBypassable { domain: String },

    /// Caller exceeded the per-minute request ceiling for this domain
    #[error("Rate limit exceeded for caller {caller}")]
    RateLimitExceeded { caller: String },

    /// Target URL rejected by policy (private address or not allow-listed)
    #[error("Target not allowed: {reason}")]
    TargetNotAllowed { reason: String },

    /// Missing or invalid API token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed proxy request (bad URL, unsupported method, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Network/HTTP client errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new server error
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    /// Create a pool exhaustion error
    pub fn pool_exhausted(waited_secs: u64) -> Self {
        Self::PoolExhausted { waited_secs }
    }

    /// Create a challenge timeout error
    pub fn challenge_timeout(domain: impl Into<String>) -> Self {
        Self::ChallengeTimeout {
            domain: domain.into(),
        }
    }

    /// Create a challenge automation error
    pub fn automation(message: impl Into<String>) -> Self {
        Self::ChallengeAutomation {
            message: message.into(),
        }
    }

    /// Create a not-bypassable error
    pub fn not_bypassable(domain: impl Into<String>) -> Self {
        Self::ChallengeNotBypassable {
            domain: domain.into(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limited(caller: impl Into<String>) -> Self {
        Self::RateLimitExceeded {
            caller: caller.into(),
        }
    }

    /// Create a target policy error
    pub fn target_not_allowed(reason: impl Into<String>) -> Self {
        Self::TargetNotAllowed {
            reason: reason.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a caller could reasonably retry this request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted { .. } | Self::ChallengeTimeout { .. } | Self::Network(_)
        )
    }

    /// Stable machine-readable code for API error responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Server(_) => "server",
            Self::PoolExhausted { .. } => "pool_exhausted",
            Self::PoolClosed => "pool_closed",
            Self::ChallengeTimeout { .. } => "challenge_timeout",
            Self::ChallengeAutomation { .. } => "challenge_automation",
            Self::ChallengeNotBypassable { .. } => "challenge_not_bypassable",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::TargetNotAllowed { .. } => "target_not_allowed",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Network(_) => "network",
            Self::Json(_) => "json",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }
}
