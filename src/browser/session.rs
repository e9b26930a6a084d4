//! Browser session capability traits
//!
//! The core never talks to a browser directly; it drives an opaque
//! [`ChallengeSession`] capability. Production code plugs in the chromiumoxide
//! adapter, tests plug in scripted doubles.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Reference to an element located inside a live page.
///
/// Carries the selector it was found under and, when known, the viewport
/// coordinates of its center so a click can be simulated even when the element
/// sits inside a nested isolated document.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRef {
    /// Selector the element was located with
    pub selector: String,
    /// Viewport center of the element, when resolved
    pub center: Option<(f64, f64)>,
}

impl ElementRef {
    /// Create an element reference for a selector
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            center: None,
        }
    }

    /// Attach the resolved viewport center
    pub fn with_center(mut self, x: f64, y: f64) -> Self {
        self.center = Some((x, y));
        self
    }
}

/// One live browser session capable of being driven through a challenge.
///
/// All operations are fallible: the underlying browser process may die at any
/// point. Callers treat any error as grounds to discard the session.
#[async_trait]
pub trait ChallengeSession: Send + Sync {
    /// Navigate the session to the given URL
    async fn navigate(&self, url: &str) -> crate::Result<()>;

    /// Evaluate a JavaScript expression, returning its string value if any
    async fn evaluate_script(&self, js: &str) -> crate::Result<Option<String>>;

    /// Locate an element by selector, traversing into nested shadow roots.
    ///
    /// Returns `Ok(None)` when the element does not appear within `timeout`;
    /// errors are reserved for session-level failures.
    async fn find_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> crate::Result<Option<ElementRef>>;

    /// Click a previously located element
    async fn click(&self, element: &ElementRef) -> crate::Result<()>;

    /// Title of the currently loaded page
    async fn current_title(&self) -> crate::Result<String>;

    /// Cookies currently held by the session, keyed by name
    async fn current_cookies(&self) -> crate::Result<HashMap<String, String>>;

    /// User agent string the session presents
    async fn current_user_agent(&self) -> crate::Result<String>;

    /// Capture a screenshot of the current page (PNG bytes)
    async fn capture_screenshot(&self) -> crate::Result<Vec<u8>>;

    /// Whether the underlying browser process is still reachable
    fn is_alive(&self) -> bool;

    /// Best-effort teardown; never fails
    async fn terminate(&self);
}

/// Constructor for new browser sessions, used by the pool for lazy creation
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Launch a fresh session
    async fn create(&self) -> crate::Result<Arc<dyn ChallengeSession>>;
}
