use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Element, Page};
use cloudgrab_core::{ElementHandle, PageHandle, Query, SessionError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::browser_error;
use crate::download::{ChromeDownloadWatch, DownloadSettings};
use crate::query::{resolve, Resolution};

/// A browser tab driven over CDP
#[derive(Clone)]
pub struct ChromePage {
    page: Page,
    browser: Arc<Browser>,
    downloads: DownloadSettings,
}

impl ChromePage {
    pub fn new(page: Page, browser: Arc<Browser>, downloads: DownloadSettings) -> Self {
        Self {
            page,
            browser,
            downloads,
        }
    }

    async fn find_css(&self, selector: &str) -> Result<Vec<ChromeElement>, SessionError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| SessionError::Script(format!("{}: {}", selector, e)))?;
        Ok(elements.into_iter().map(ChromeElement::new).collect())
    }

    async fn dispatch_key(&self, key: &str, kind: DispatchKeyEventType) -> Result<(), SessionError> {
        let mut builder = DispatchKeyEventParams::builder().r#type(kind).key(key).code(key);
        if let Some(code) = virtual_key_code(key) {
            builder = builder.windows_virtual_key_code(code).native_virtual_key_code(code);
        }
        let params = builder.build().map_err(SessionError::Browser)?;
        self.page.execute(params).await.map_err(browser_error)?;
        Ok(())
    }
}

fn virtual_key_code(key: &str) -> Option<i64> {
    match key {
        "Escape" => Some(27),
        "Enter" => Some(13),
        "Tab" => Some(9),
        _ => None,
    }
}

#[async_trait]
impl PageHandle for ChromePage {
    type Element = ChromeElement;
    type Download = ChromeDownloadWatch;

    async fn navigate(&self, url: &str, limit: Duration) -> Result<(), SessionError> {
        match timeout(limit, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Navigation(e.to_string())),
            Err(_) => Err(SessionError::Timeout(limit, "navigation")),
        }
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        let url = self.page.url().await.map_err(browser_error)?;
        Ok(url.unwrap_or_default())
    }

    async fn find_elements(&self, query: &Query) -> Result<Vec<ChromeElement>, SessionError> {
        match resolve(query) {
            Resolution::Css(selector) => self.find_css(&selector).await,
            Resolution::Marked { script, selector } => {
                let marked: u64 = self
                    .page
                    .evaluate(script)
                    .await
                    .map_err(|e| SessionError::Script(e.to_string()))?
                    .into_value()
                    .map_err(|e| SessionError::Script(e.to_string()))?;
                debug!("{} marked {} element(s)", query, marked);
                if marked == 0 {
                    return Ok(Vec::new());
                }
                self.find_css(&selector).await
            }
        }
    }

    async fn evaluate_script(&self, expression: &str) -> Result<(), SessionError> {
        self.page
            .evaluate(expression)
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), SessionError> {
        self.dispatch_key(key, DispatchKeyEventType::KeyDown).await?;
        self.dispatch_key(key, DispatchKeyEventType::KeyUp).await
    }

    async fn title(&self) -> Result<String, SessionError> {
        let title = self.page.get_title().await.map_err(browser_error)?;
        Ok(title.unwrap_or_default())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), SessionError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(browser_error)?;
        Ok(())
    }

    async fn watch_download(&self) -> Result<ChromeDownloadWatch, SessionError> {
        ChromeDownloadWatch::arm(&self.browser, self.downloads.clone()).await
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.page.clone().close().await.map_err(browser_error)
    }
}

pub struct ChromeElement {
    element: Element,
}

impl ChromeElement {
    fn new(element: Element) -> Self {
        Self { element }
    }
}

#[async_trait]
impl ElementHandle for ChromeElement {
    async fn is_visible(&self) -> Result<bool, SessionError> {
        // Detached or display:none elements have no box model
        match self.element.bounding_box().await {
            Ok(bbox) => Ok(bbox.width > 0.0 && bbox.height > 0.0),
            Err(e) => {
                debug!("No bounding box: {}", e);
                Ok(false)
            }
        }
    }

    async fn click(&self, limit: Duration) -> Result<(), SessionError> {
        match timeout(limit, self.element.click()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Element(e.to_string())),
            Err(_) => Err(SessionError::Timeout(limit, "click")),
        }
    }

    async fn scroll_into_view(&self) -> Result<(), SessionError> {
        self.element
            .scroll_into_view()
            .await
            .map_err(|e| SessionError::Element(e.to_string()))?;
        Ok(())
    }
}
