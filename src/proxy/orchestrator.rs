//! Proxy request orchestrator
//!
//! The full request path: policy check, rate limit, clearance lookup (solving
//! a challenge on miss), outbound replay, and challenge-rejection detection
//! with a single bounded retry.

use crate::browser::BrowserPool;
use crate::clearance::{Clearance, ClearanceCache};
use crate::config::Settings;
use crate::limiter::RateLimiter;
use crate::proxy::transport::{HttpTransport, OutboundRequest};
use crate::security;
use crate::solver::TurnstileSolver;
use crate::types::{ProxyRequest, ProxyResponse};
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

/// Body markers that identify an anti-bot interstitial
const CHALLENGE_MARKERS: &[&str] = &[
    "just a moment",
    "challenge-platform",
    "cf-chl",
    "attention required",
    "checking your browser",
];

/// How much of the body the detection heuristic inspects
const DETECTION_WINDOW_CHARS: usize = 8192;

/// Whether an origin response is a challenge page rather than real content.
///
/// Only 403 and 503 are candidates; anything else is the origin speaking for
/// itself, even if the body happens to mention a challenge.
pub fn is_challenge_response(status: u16, body: &str) -> bool {
    if status != 403 && status != 503 {
        return false;
    }
    let head: String = body
        .chars()
        .take(DETECTION_WINDOW_CHARS)
        .collect::<String>()
        .to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| head.contains(marker))
}

/// Orchestrates proxied requests over cached clearances
pub struct ProxyOrchestrator {
    settings: Arc<Settings>,
    cache: Arc<ClearanceCache>,
    pool: Arc<BrowserPool>,
    solver: TurnstileSolver,
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
}

impl ProxyOrchestrator {
    /// Wire the orchestrator from its collaborators
    pub fn new(
        settings: Arc<Settings>,
        cache: Arc<ClearanceCache>,
        pool: Arc<BrowserPool>,
        transport: Arc<dyn HttpTransport>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let solver = TurnstileSolver::new(Duration::from_secs(
            settings.browser.poll_interval_secs,
        ));
        Self {
            settings,
            cache,
            pool,
            solver,
            transport,
            limiter,
        }
    }

    /// Proxy one request on behalf of `caller`.
    ///
    /// A response that still looks like a challenge invalidates the cached
    /// clearance and retries the whole sequence exactly once with a forced
    /// fresh solve; a second rejection surfaces as `ChallengeNotBypassable`.
    pub async fn proxy(
        &self,
        caller: &str,
        request: &ProxyRequest,
    ) -> crate::Result<ProxyResponse> {
        security::validate_target(&request.url, &self.settings.security)?;
        let domain = security::target_domain(&request.url)?;
        self.limiter.check(caller, &domain)?;

        let timeout = Duration::from_secs(
            request
                .timeout
                .unwrap_or(self.settings.server.request_timeout_secs),
        );

        for attempt in 0..2u8 {
            let started = std::time::Instant::now();
            let clearance = self
                .cache
                .ensure_valid(&domain, || {
                    self.obtain_clearance(domain.clone(), request.url.clone())
                })
                .await?;

            let response = self
                .transport
                .send(OutboundRequest {
                    method: request.method.clone(),
                    url: request.url.clone(),
                    headers: request.headers.clone(),
                    cookies: clearance.cookies,
                    user_agent: clearance.user_agent,
                    body: request.body.clone(),
                    timeout,
                })
                .await?;

            let elapsed_ms = started.elapsed().as_millis() as u64;
            if is_challenge_response(response.status, &response.body) {
                tracing::warn!(
                    caller,
                    domain = %domain,
                    attempt,
                    elapsed_ms,
                    status = response.status,
                    "Origin rejected replayed clearance, invalidating"
                );
                self.cache.invalidate(&domain).await;
                continue;
            }

            tracing::info!(
                caller,
                domain = %domain,
                attempt,
                elapsed_ms,
                status = response.status,
                "Proxied request completed"
            );
            return Ok(ProxyResponse::new(
                response.status,
                response.headers,
                response.body,
            ));
        }

        tracing::error!(caller, domain = %domain, "Clearance rejected twice, giving up");
        Err(crate::Error::not_bypassable(domain))
    }

    /// Lease a browser session, run the solver, and read out the clearance.
    ///
    /// The lease is returned to the pool on every path; automation failures
    /// mark it defective so the dead session is not handed to the next caller.
    async fn obtain_clearance(&self, domain: String, url: String) -> crate::Result<Clearance> {
        let lease = self
            .pool
            .acquire(Duration::from_secs(self.settings.browser.acquire_timeout_secs))
            .await?;

        let deadline = Duration::from_secs(self.settings.browser.solve_timeout_secs);
        let outcome = match self.solver.solve(lease.session(), &url, deadline).await {
            Ok(outcome) => outcome,
            Err(e) => {
                lease.mark_defective();
                return Err(e);
            }
        };

        if !outcome.succeeded() {
            tracing::warn!(domain = %domain, title = %outcome.title, "Challenge solve failed");
            if let Some(shot) = &outcome.screenshot {
                tracing::debug!(
                    domain = %domain,
                    screenshot_b64 = %base64::engine::general_purpose::STANDARD.encode(shot),
                    "Challenge failure screenshot"
                );
            }
            return Err(crate::Error::challenge_timeout(domain));
        }

        let cookies = match lease.session().current_cookies().await {
            Ok(cookies) => cookies,
            Err(e) => {
                lease.mark_defective();
                return Err(e);
            }
        };
        let user_agent = match lease.session().current_user_agent().await {
            Ok(user_agent) => user_agent,
            Err(e) => {
                lease.mark_defective();
                return Err(e);
            }
        };

        tracing::info!(
            domain = %domain,
            status = ?outcome.status,
            cookie_count = cookies.len(),
            "Challenge solved, caching clearance"
        );
        Ok(Clearance::new(domain, cookies, user_agent, self.cache.ttl()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(503, "<title>Just a moment...</title>", true)]
    #[case(403, "cf-chl-widget is loading", true)]
    #[case(403, "challenge-platform scripts", true)]
    #[case(200, "<title>Just a moment...</title>", false)]
    #[case(503, "service temporarily unavailable", false)]
    #[case(404, "not found", false)]
    fn test_challenge_detection(#[case] status: u16, #[case] body: &str, #[case] expected: bool) {
        assert_eq!(is_challenge_response(status, body), expected);
    }

    #[test]
    fn test_detection_is_case_insensitive() {
        assert!(is_challenge_response(503, "JUST A MOMENT"));
    }

    #[test]
    fn test_detection_bounds_inspection_window() {
        let mut body = "x".repeat(DETECTION_WINDOW_CHARS);
        body.push_str("just a moment");
        assert!(!is_challenge_response(503, &body));
    }
}
