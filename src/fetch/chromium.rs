//! Chromium-backed [`PageRenderer`] (enabled with the `browser` feature)

use super::browser::{PageRenderer, RenderError, RenderedPage};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Navigation budget on top of the settle period
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(45);

/// Idle gap that ends the drain of buffered response events
const EVENT_DRAIN: Duration = Duration::from_millis(100);

/// Renders pages in a single headless Chromium process
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launches headless Chromium
    ///
    /// Fails with [`RenderError::Unavailable`] when no Chrome/Chromium
    /// executable can be found or started.
    pub async fn launch(user_agent: &str) -> Result<Self, RenderError> {
        let config = BrowserConfig::builder()
            .window_size(1920, 1080)
            .request_timeout(NAVIGATION_TIMEOUT)
            .arg(format!("--user-agent={}", user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .build()
            .map_err(RenderError::Unavailable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {:?}", e);
                }
            }
        });

        tracing::info!("Headless browser launched");
        Ok(Self { browser, handler })
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, url: &Url, settle: Duration) -> Result<RenderedPage, RenderError> {
        let page = tokio::time::timeout(NAVIGATION_TIMEOUT, self.browser.new_page("about:blank"))
            .await
            .map_err(|_| RenderError::Timeout(NAVIGATION_TIMEOUT))?
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        let result = render_in(&page, url, settle).await;
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, e);
        }
        result
    }
}

async fn render_in(page: &Page, url: &Url, settle: Duration) -> Result<RenderedPage, RenderError> {
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| RenderError::Navigation(e.to_string()))?;

    tokio::time::timeout(NAVIGATION_TIMEOUT, page.goto(url.as_str()))
        .await
        .map_err(|_| RenderError::Timeout(NAVIGATION_TIMEOUT))?
        .map_err(|e| RenderError::Navigation(e.to_string()))?;

    tokio::time::sleep(settle).await;

    // Responses for the navigation are buffered by now
    let mut seen = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(EVENT_DRAIN, responses.next()).await {
        seen.push((event.r#type.clone(), event.response.status));
    }
    let status_code = document_status(&seen);
    tracing::trace!("Rendered {} (status {:?})", url, status_code);

    let content = page
        .content()
        .await
        .map_err(|e| RenderError::Navigation(e.to_string()))?;

    Ok(RenderedPage {
        content,
        status_code,
    })
}

/// Status of the first document response, which is the main frame's
fn document_status(responses: &[(ResourceType, i64)]) -> Option<u16> {
    responses
        .iter()
        .find(|(kind, _)| *kind == ResourceType::Document)
        .and_then(|(_, status)| u16::try_from(*status).ok())
}
