//! Proxied request orchestration
//!
//! Composes the clearance cache, browser pool and solver with an outbound
//! HTTP transport: requests replay the cached cookies against the origin, and
//! a rejected replay invalidates the clearance and retries exactly once with a
//! fresh solve.

pub mod orchestrator;
pub mod transport;

pub use orchestrator::{ProxyOrchestrator, is_challenge_response};
pub use transport::{HttpTransport, OutboundRequest, ReqwestTransport, TransportResponse};
