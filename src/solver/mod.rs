//! Challenge solver
//!
//! Drives a leased browser session through an anti-bot interstitial. The solve
//! is a bounded polling protocol: probe for an already-issued token, otherwise
//! locate the challenge widget (which may sit two isolated documents deep),
//! click it once, and re-probe at a fixed interval until the deadline. There is
//! no backoff: these challenges resolve within seconds or not at all.

use crate::browser::session::ChallengeSession;
use std::time::Duration;

/// Selector for the Turnstile response input that carries the widget
const WIDGET_SELECTOR: &str = "input[name=\"cf-turnstile-response\"]";

/// Probe for a token issued by an already-satisfied widget
const TOKEN_PROBE_JS: &str =
    "(() => { try { return turnstile.getResponse() || null; } catch (e) { return null; } })()";

/// How long one element lookup may take before it counts as "not yet rendered"
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(3);

/// How a solve attempt concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    /// The page presented no challenge, or the token was already issued
    NoChallengeDetected,
    /// The widget was clicked and subsequently issued a token
    SolvedByClick,
    /// The deadline passed without a token
    Failed,
}

/// Result of one challenge solve attempt
#[derive(Debug, Clone)]
pub struct ChallengeOutcome {
    /// How the attempt concluded
    pub status: ChallengeStatus,
    /// Token issued by the widget, when one was observed
    pub token: Option<String>,
    /// Title of the page at the end of the attempt
    pub title: String,
    /// Diagnostic screenshot, captured only on failure
    pub screenshot: Option<Vec<u8>>,
}

impl ChallengeOutcome {
    /// Whether the session now holds a usable clearance
    pub fn succeeded(&self) -> bool {
        !matches!(self.status, ChallengeStatus::Failed)
    }
}

/// Whether a page title looks like an anti-bot interstitial
pub fn looks_like_challenge_title(title: &str) -> bool {
    let lower = title.to_lowercase();
    lower.contains("just a moment")
        || lower.contains("attention required")
        || lower.contains("checking your browser")
        || lower.contains("cloudflare")
}

/// Polling challenge solver for Turnstile-style interstitials
#[derive(Debug, Clone)]
pub struct TurnstileSolver {
    poll_interval: Duration,
}

impl TurnstileSolver {
    /// Create a solver with the given token poll interval
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Drive `session` through the challenge at `target_url`.
    ///
    /// Element lookup failures are transient and retried within the deadline;
    /// only deadline exhaustion produces a `Failed` outcome. Session-level
    /// errors on navigation propagate so the caller can discard the handle.
    pub async fn solve(
        &self,
        session: &dyn ChallengeSession,
        target_url: &str,
        deadline: Duration,
    ) -> crate::Result<ChallengeOutcome> {
        session.navigate(target_url).await?;

        if let Some(token) = self.probe_token(session).await {
            return Ok(ChallengeOutcome {
                status: ChallengeStatus::NoChallengeDetected,
                token: Some(token),
                title: self.title_of(session).await,
                screenshot: None,
            });
        }

        let deadline_at = tokio::time::Instant::now() + deadline;
        let mut clicked = false;
        while tokio::time::Instant::now() < deadline_at {
            if !clicked {
                match session.find_element(WIDGET_SELECTOR, ELEMENT_TIMEOUT).await {
                    Ok(Some(element)) => {
                        // A failed click means the element detached mid-flight;
                        // treat it like a lookup miss and retry
                        if session.click(&element).await.is_ok() {
                            tracing::debug!(url = target_url, "Clicked challenge widget");
                            clicked = true;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(url = target_url, "Transient element lookup failure: {}", e);
                    }
                }
            }

            if let Some(token) = self.probe_token(session).await {
                let status = if clicked {
                    ChallengeStatus::SolvedByClick
                } else {
                    ChallengeStatus::NoChallengeDetected
                };
                return Ok(ChallengeOutcome {
                    status,
                    token: Some(token),
                    title: self.title_of(session).await,
                    screenshot: None,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        let title = self.title_of(session).await;
        if !clicked && !looks_like_challenge_title(&title) {
            // The widget never appeared and the page settled on ordinary
            // content: the origin is simply not challenging us
            return Ok(ChallengeOutcome {
                status: ChallengeStatus::NoChallengeDetected,
                token: None,
                title,
                screenshot: None,
            });
        }

        // Screenshot only on the failure path to keep the success path cheap
        let screenshot = session.capture_screenshot().await.ok();
        Ok(ChallengeOutcome {
            status: ChallengeStatus::Failed,
            token: None,
            title,
            screenshot,
        })
    }

    async fn probe_token(&self, session: &dyn ChallengeSession) -> Option<String> {
        session
            .evaluate_script(TOKEN_PROBE_JS)
            .await
            .ok()
            .flatten()
            .filter(|token| !token.is_empty())
    }

    async fn title_of(&self, session: &dyn ChallengeSession) -> String {
        session.current_title().await.unwrap_or_default()
    }
}
