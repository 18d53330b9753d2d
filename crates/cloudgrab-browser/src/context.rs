use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::{EventTargetCreated, TargetId};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::{Browser, Page};
use cloudgrab_core::{BrowsingContext, PageWatch, SessionError};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::browser_error;
use crate::download::DownloadSettings;
use crate::page::ChromePage;

const ATTACH_RETRY: Duration = Duration::from_millis(100);

/// Observes tabs opened by the pages of one browser
#[derive(Clone)]
pub struct ChromeContext {
    browser: Arc<Browser>,
    downloads: DownloadSettings,
}

impl ChromeContext {
    pub fn new(browser: Arc<Browser>, downloads: DownloadSettings) -> Self {
        Self { browser, downloads }
    }
}

#[async_trait]
impl BrowsingContext for ChromeContext {
    type Page = ChromePage;
    type Watch = ChromePageWatch;

    async fn watch_new_page(&self) -> Result<ChromePageWatch, SessionError> {
        let events = self
            .browser
            .event_listener::<EventTargetCreated>()
            .await
            .map_err(browser_error)?;
        Ok(ChromePageWatch {
            events,
            browser: self.browser.clone(),
            downloads: self.downloads.clone(),
        })
    }
}

pub struct ChromePageWatch {
    events: EventStream<EventTargetCreated>,
    browser: Arc<Browser>,
    downloads: DownloadSettings,
}

impl ChromePageWatch {
    async fn next_page_target(&mut self) -> Result<TargetId, SessionError> {
        while let Some(event) = self.events.next().await {
            let info = &event.target_info;
            if info.r#type == "page" {
                debug!("New page target {:?} at {}", info.target_id, info.url);
                return Ok(info.target_id.clone());
            }
        }
        Err(SessionError::Browser("target event stream closed".to_string()))
    }

    /// The handler attaches to new targets asynchronously, so the page may not be known yet
    async fn attach(&self, target_id: TargetId) -> Page {
        loop {
            match self.browser.get_page(target_id.clone()).await {
                Ok(page) => return page,
                Err(e) => {
                    debug!("Page {:?} not attached yet: {}", target_id, e);
                    sleep(ATTACH_RETRY).await;
                }
            }
        }
    }
}

#[async_trait]
impl PageWatch for ChromePageWatch {
    type Page = ChromePage;

    async fn wait(mut self, limit: Duration) -> Result<ChromePage, SessionError> {
        let page = timeout(limit, async {
            let target_id = self.next_page_target().await?;
            Ok::<_, SessionError>(self.attach(target_id).await)
        })
        .await
        .map_err(|_| SessionError::Timeout(limit, "new page"))??;

        Ok(ChromePage::new(page, self.browser.clone(), self.downloads.clone()))
    }
}
