//! Cloudflare Clearance Proxy
//!
//! An HTTP proxy service that transparently bypasses Cloudflare Turnstile
//! challenges. Requests are forwarded with cached clearance cookies; when a
//! target serves a challenge page instead of content, a pooled headless
//! browser solves the challenge once and the clearance is reused for every
//! subsequent request to that domain.
//!
//! # Architecture
//!
//! - **Browser pool**: a bounded set of lazily created headless browser
//!   sessions shared by all solve attempts
//! - **Clearance cache**: per-domain cookies and user-agent with a TTL,
//!   refreshed by at most one solver at a time
//! - **Proxy orchestrator**: detects challenge responses and retries exactly
//!   once with a fresh clearance before giving up
//!
//! # Usage
//!
//! ```bash
//! cf-clearance-proxy --port 8191 --host 0.0.0.0
//! ```
//!
//! # Examples
//!
//! ```rust
//! use cf_clearance_proxy::{ClearanceCache, Settings};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::default();
//! let cache = ClearanceCache::new(settings.cache.clearance_ttl_secs);
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod clearance;
pub mod config;
pub mod error;
pub mod limiter;
pub mod proxy;
pub mod security;
pub mod server;
pub mod solver;
pub mod types;
pub mod utils;

pub use browser::BrowserPool;
pub use clearance::ClearanceCache;
pub use config::Settings;
pub use error::{Error, Result};
pub use proxy::ProxyOrchestrator;
pub use types::{ErrorResponse, HealthResponse, ProxyRequest, ProxyResponse};
