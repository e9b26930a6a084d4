//! Common test utilities and helpers
//!
//! Shared doubles for integration tests: a scripted browser session that
//! solves instantly, a counting factory, and a transport that replays a
//! scripted response sequence.

use async_trait::async_trait;
use cf_clearance_proxy::browser::session::{ChallengeSession, ElementRef, SessionFactory};
use cf_clearance_proxy::config::Settings;
use cf_clearance_proxy::proxy::{HttpTransport, OutboundRequest, TransportResponse};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Session double whose challenge is already satisfied: the first token probe
/// succeeds, so a solve completes in one pass.
pub struct InstantSolveSession {
    pub navigations: Arc<AtomicUsize>,
}

#[async_trait]
impl ChallengeSession for InstantSolveSession {
    async fn navigate(&self, _url: &str) -> cf_clearance_proxy::Result<()> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn evaluate_script(&self, _js: &str) -> cf_clearance_proxy::Result<Option<String>> {
        Ok(Some("tok-test".to_string()))
    }

    async fn find_element(
        &self,
        _selector: &str,
        _timeout: Duration,
    ) -> cf_clearance_proxy::Result<Option<ElementRef>> {
        Ok(None)
    }

    async fn click(&self, _element: &ElementRef) -> cf_clearance_proxy::Result<()> {
        Ok(())
    }

    async fn current_title(&self) -> cf_clearance_proxy::Result<String> {
        Ok("Example Domain".to_string())
    }

    async fn current_cookies(&self) -> cf_clearance_proxy::Result<HashMap<String, String>> {
        let mut cookies = HashMap::new();
        cookies.insert("cf_clearance".to_string(), "clearance-value".to_string());
        Ok(cookies)
    }

    async fn current_user_agent(&self) -> cf_clearance_proxy::Result<String> {
        Ok("Mozilla/5.0 (test)".to_string())
    }

    async fn capture_screenshot(&self) -> cf_clearance_proxy::Result<Vec<u8>> {
        Ok(vec![])
    }

    fn is_alive(&self) -> bool {
        true
    }

    async fn terminate(&self) {}
}

/// Factory that counts how many sessions it has launched
pub struct CountingFactory {
    pub created: Arc<AtomicUsize>,
    pub navigations: Arc<AtomicUsize>,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self {
            created: Arc::new(AtomicUsize::new(0)),
            navigations: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl SessionFactory for CountingFactory {
    async fn create(&self) -> cf_clearance_proxy::Result<Arc<dyn ChallengeSession>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(InstantSolveSession {
            navigations: Arc::clone(&self.navigations),
        }))
    }
}

/// Transport that replays a scripted response sequence; once the script is
/// exhausted it keeps serving the final response.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<TransportResponse>>,
    last: Mutex<TransportResponse>,
    pub sends: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<TransportResponse>) -> Self {
        let last = responses
            .last()
            .cloned()
            .unwrap_or_else(|| ok_response("ok"));
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(last),
            sends: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(
        &self,
        _request: OutboundRequest,
    ) -> cf_clearance_proxy::Result<TransportResponse> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => {
                *self.last.lock().unwrap() = response.clone();
                Ok(response)
            }
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// A plain 200 response
pub fn ok_response(body: &str) -> TransportResponse {
    TransportResponse {
        status: 200,
        headers: HashMap::new(),
        body: body.to_string(),
    }
}

/// A 503 interstitial the challenge detector recognizes
pub fn challenge_response() -> TransportResponse {
    TransportResponse {
        status: 503,
        headers: HashMap::new(),
        body: "<html><title>Just a moment...</title></html>".to_string(),
    }
}

/// Settings tuned for fast tests: one browser slot, short timeouts
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.browser.max_sessions = 1;
    settings.browser.solve_timeout_secs = 2;
    settings.browser.acquire_timeout_secs = 2;
    settings
}
