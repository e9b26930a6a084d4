//! Chromium-backed session adapter
//!
//! Implements [`ChallengeSession`] over the Chrome DevTools Protocol via
//! chromiumoxide. Element lookup pierces open shadow roots with an injected
//! script and reports viewport coordinates, so clicks can be simulated on
//! widgets that live inside nested isolated documents.

use crate::browser::session::{ChallengeSession, ElementRef, SessionFactory};
use crate::config::settings::BrowserSettings;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How often the deep-query script re-probes for an element
const ELEMENT_PROBE_INTERVAL: Duration = Duration::from_millis(250);

fn cdp_err(e: impl std::fmt::Display) -> crate::Error {
    crate::Error::automation(e.to_string())
}

#[derive(Debug, Deserialize)]
struct ElementRect {
    x: f64,
    y: f64,
}

/// One live Chromium instance with a single page
pub struct ChromiumSession {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromiumSession {
    /// Build the shadow-root piercing lookup script for a selector.
    ///
    /// Returns the viewport center of the first match as JSON, or null.
    fn deep_query_script(selector: &str, action: &str) -> String {
        let quoted = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
        format!(
            r#"(() => {{
                const deepQuery = (root, sel) => {{
                    const direct = root.querySelector(sel);
                    if (direct) return direct;
                    for (const el of root.querySelectorAll('*')) {{
                        if (el.shadowRoot) {{
                            const inner = deepQuery(el.shadowRoot, sel);
                            if (inner) return inner;
                        }}
                    }}
                    return null;
                }};
                const el = deepQuery(document, {quoted});
                if (!el) return null;
                {action}
            }})()"#
        )
    }
}

#[async_trait]
impl ChallengeSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> crate::Result<()> {
        self.page.goto(url).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn evaluate_script(&self, js: &str) -> crate::Result<Option<String>> {
        let result = self.page.evaluate(js).await.map_err(cdp_err)?;
        Ok(result.into_value::<Option<String>>().ok().flatten())
    }

    async fn find_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> crate::Result<Option<ElementRef>> {
        let script = Self::deep_query_script(
            selector,
            r#"const r = el.getBoundingClientRect();
               return JSON.stringify({ x: r.x + r.width / 2, y: r.y + r.height / 2 });"#,
        );
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(json) = self.evaluate_script(&script).await? {
                if let Ok(rect) = serde_json::from_str::<ElementRect>(&json) {
                    return Ok(Some(ElementRef::new(selector).with_center(rect.x, rect.y)));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(ELEMENT_PROBE_INTERVAL).await;
        }
    }

    async fn click(&self, element: &ElementRef) -> crate::Result<()> {
        match element.center {
            Some((x, y)) => {
                self.page.click(Point { x, y }).await.map_err(cdp_err)?;
            }
            None => {
                // Fall back to a scripted click when no coordinates were resolved
                let script =
                    Self::deep_query_script(&element.selector, "el.click(); return 'clicked';");
                if self.evaluate_script(&script).await?.is_none() {
                    return Err(crate::Error::automation(format!(
                        "element vanished before click: {}",
                        element.selector
                    )));
                }
            }
        }
        Ok(())
    }

    async fn current_title(&self) -> crate::Result<String> {
        let title = self.page.get_title().await.map_err(cdp_err)?;
        Ok(title.unwrap_or_default())
    }

    async fn current_cookies(&self) -> crate::Result<HashMap<String, String>> {
        let cookies = self.page.get_cookies().await.map_err(cdp_err)?;
        Ok(cookies
            .into_iter()
            .map(|cookie| (cookie.name, cookie.value))
            .collect())
    }

    async fn current_user_agent(&self) -> crate::Result<String> {
        self.evaluate_script("navigator.userAgent")
            .await?
            .ok_or_else(|| crate::Error::automation("could not read user agent"))
    }

    async fn capture_screenshot(&self) -> crate::Result<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(cdp_err)
    }

    fn is_alive(&self) -> bool {
        !self.handler_task.is_finished()
    }

    async fn terminate(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::debug!("Browser close failed during teardown: {}", e);
        }
        self.handler_task.abort();
    }
}

/// Launches Chromium sessions configured from [`BrowserSettings`]
#[derive(Debug, Clone)]
pub struct ChromiumSessionFactory {
    settings: BrowserSettings,
}

impl ChromiumSessionFactory {
    /// Create a factory from browser settings
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> crate::Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.settings.window_width, self.settings.window_height)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--lang=en-US");
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.settings.executable_path {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(crate::Error::automation)
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn create(&self) -> crate::Result<Arc<dyn ChallengeSession>> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_err)?;

        // The CDP event handler must be polled for the session to make progress;
        // the task ending means the browser process is gone.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(cdp_err)?;
        tracing::info!("Launched Chromium session");

        Ok(Arc::new(ChromiumSession {
            browser: Mutex::new(browser),
            page,
            handler_task,
        }))
    }
}
