//! In-memory browser used by the unit tests.
//!
//! Pages hold canned elements per query. Clicking an element can open a page or start a
//! download. A page opened while no observer is armed is lost, as it would be in a real browser
//! where the target-created event fires before anyone listens.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::error::SessionError;
use crate::session::{
    BrowsingContext, DownloadWatch, ElementHandle, PageHandle, PageWatch, Query, TransferHandle,
};

type Slot<T> = Arc<Mutex<Option<T>>>;

#[derive(Clone, Default)]
pub struct FakeContext {
    inner: Arc<Mutex<ContextState>>,
}

#[derive(Default)]
struct ContextState {
    journal: Vec<String>,
    armed: Vec<Slot<FakePage>>,
}

impl FakeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_page(&self, url: &str) -> FakePage {
        FakePage {
            state: Arc::new(Mutex::new(PageState {
                url: url.to_string(),
                landing_url: None,
                navigate_error: None,
                elements: HashMap::new(),
                failing_queries: HashSet::new(),
                title: Ok(String::new()),
                closed: false,
                armed_download: None,
                scripts: Vec::new(),
                keys: Vec::new(),
                screenshots: Vec::new(),
            })),
            context: self.clone(),
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.inner.lock().unwrap().journal.clone()
    }

    fn record(&self, entry: impl Into<String>) {
        self.inner.lock().unwrap().journal.push(entry.into());
    }

    fn spawn(&self, page: FakePage) {
        let mut state = self.inner.lock().unwrap();
        // Observers whose watch was already dropped cannot receive the page
        let armed = std::mem::take(&mut state.armed);
        match armed.iter().rev().find(|slot| Arc::strong_count(slot) > 1) {
            Some(slot) => {
                *slot.lock().unwrap() = Some(page);
                state.journal.push("page_opened".to_string());
            }
            None => state.journal.push("page_lost".to_string()),
        }
    }
}

struct PageState {
    url: String,
    landing_url: Option<String>,
    navigate_error: Option<String>,
    elements: HashMap<Query, Vec<FakeElement>>,
    failing_queries: HashSet<Query>,
    title: Result<String, String>,
    closed: bool,
    armed_download: Option<Slot<FakeTransfer>>,
    scripts: Vec<String>,
    keys: Vec<String>,
    screenshots: Vec<PathBuf>,
}

#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<PageState>>,
    context: FakeContext,
}

impl fmt::Debug for FakePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("FakePage")
            .field("url", &state.url)
            .field("closed", &state.closed)
            .finish()
    }
}

impl FakePage {
    /// URL reported after the next navigation, simulating redirects
    pub fn set_landing_url(&self, url: &str) {
        self.state.lock().unwrap().landing_url = Some(url.to_string());
    }

    pub fn fail_navigation(&self, message: &str) {
        self.state.lock().unwrap().navigate_error = Some(message.to_string());
    }

    pub fn set_title(&self, title: Result<&str, &str>) {
        self.state.lock().unwrap().title = title.map(str::to_string).map_err(str::to_string);
    }

    pub fn fail_query(&self, query: Query) {
        self.state.lock().unwrap().failing_queries.insert(query);
    }

    pub fn add(&self, query: Query, behavior: ElementBehavior) -> &Self {
        let label = {
            let state = self.state.lock().unwrap();
            let count = state.elements.get(&query).map(Vec::len).unwrap_or(0);
            format!("{}#{}", query, count + 1)
        };
        let element = FakeElement {
            label,
            behavior: Arc::new(behavior),
            page: Arc::downgrade(&self.state),
            context: self.context.clone(),
        };
        self.state.lock().unwrap().elements.entry(query).or_default().push(element);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn keys_pressed(&self) -> Vec<String> {
        self.state.lock().unwrap().keys.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().screenshots.clone()
    }
}

pub enum ClickEffect {
    Nothing,
    OpenPage(FakePage),
    /// Starts a transfer; `bytes: None` simulates a save that never writes the file
    Download { suggested: String, bytes: Option<usize> },
}

pub struct ElementBehavior {
    visible: bool,
    click_fails: bool,
    scroll_fails: bool,
    effect: ClickEffect,
}

impl ElementBehavior {
    pub fn visible() -> Self {
        Self {
            visible: true,
            click_fails: false,
            scroll_fails: false,
            effect: ClickEffect::Nothing,
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Self::visible()
        }
    }

    pub fn failing_click() -> Self {
        Self {
            click_fails: true,
            ..Self::visible()
        }
    }

    pub fn failing_scroll() -> Self {
        Self {
            scroll_fails: true,
            ..Self::visible()
        }
    }

    pub fn opens(page: FakePage) -> Self {
        Self {
            effect: ClickEffect::OpenPage(page),
            ..Self::visible()
        }
    }

    pub fn downloads(suggested: &str, bytes: Option<usize>) -> Self {
        Self {
            effect: ClickEffect::Download {
                suggested: suggested.to_string(),
                bytes,
            },
            ..Self::visible()
        }
    }
}

#[derive(Clone)]
pub struct FakeElement {
    label: String,
    behavior: Arc<ElementBehavior>,
    page: Weak<Mutex<PageState>>,
    context: FakeContext,
}

#[async_trait]
impl ElementHandle for FakeElement {
    async fn is_visible(&self) -> Result<bool, SessionError> {
        Ok(self.behavior.visible)
    }

    async fn click(&self, timeout: Duration) -> Result<(), SessionError> {
        self.context.record(format!("click:{}", self.label));
        if self.behavior.click_fails {
            return Err(SessionError::Timeout(timeout, "click"));
        }

        match &self.behavior.effect {
            ClickEffect::Nothing => {}
            ClickEffect::OpenPage(page) => self.context.spawn(page.clone()),
            ClickEffect::Download { suggested, bytes } => {
                let page = self
                    .page
                    .upgrade()
                    .ok_or_else(|| SessionError::Element("page is gone".to_string()))?;
                let slot = page.lock().unwrap().armed_download.take();
                match slot {
                    Some(slot) => {
                        *slot.lock().unwrap() = Some(FakeTransfer {
                            suggested: suggested.clone(),
                            bytes: *bytes,
                            context: self.context.clone(),
                        });
                        self.context.record("download_started");
                    }
                    None => self.context.record("download_lost"),
                }
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<(), SessionError> {
        if self.behavior.scroll_fails {
            return Err(SessionError::Element(format!("{} detached", self.label)));
        }
        self.context.record(format!("scroll:{}", self.label));
        Ok(())
    }
}

pub struct FakeDownloadWatch {
    slot: Slot<FakeTransfer>,
}

#[async_trait]
impl DownloadWatch for FakeDownloadWatch {
    type Transfer = FakeTransfer;

    async fn wait(self, timeout: Duration) -> Result<FakeTransfer, SessionError> {
        let transfer = self.slot.lock().unwrap().take();
        transfer.ok_or(SessionError::Timeout(timeout, "download"))
    }
}

pub struct FakeTransfer {
    suggested: String,
    bytes: Option<usize>,
    context: FakeContext,
}

#[async_trait]
impl TransferHandle for FakeTransfer {
    fn suggested_filename(&self) -> &str {
        &self.suggested
    }

    async fn save_as(self, path: &Path) -> Result<(), SessionError> {
        self.context.record(format!("save_as:{}", path.display()));
        if let Some(bytes) = self.bytes {
            std::fs::write(path, vec![0u8; bytes])?;
        }
        Ok(())
    }
}

#[async_trait]
impl PageHandle for FakePage {
    type Element = FakeElement;
    type Download = FakeDownloadWatch;

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), SessionError> {
        self.context.record(format!("navigate:{}", url));
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.navigate_error.clone() {
            return Err(SessionError::Navigation(message));
        }
        state.url = state.landing_url.take().unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn find_elements(&self, query: &Query) -> Result<Vec<FakeElement>, SessionError> {
        let state = self.state.lock().unwrap();
        if state.failing_queries.contains(query) {
            return Err(SessionError::Script(format!("bad selector {}", query)));
        }
        Ok(state.elements.get(query).cloned().unwrap_or_default())
    }

    async fn evaluate_script(&self, expression: &str) -> Result<(), SessionError> {
        self.state.lock().unwrap().scripts.push(expression.to_string());
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), SessionError> {
        self.context.record(format!("key:{}", key));
        self.state.lock().unwrap().keys.push(key.to_string());
        Ok(())
    }

    async fn title(&self) -> Result<String, SessionError> {
        self.state.lock().unwrap().title.clone().map_err(SessionError::Script)
    }

    async fn screenshot(&self, path: &Path) -> Result<(), SessionError> {
        std::fs::write(path, b"png")?;
        self.state.lock().unwrap().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn watch_download(&self) -> Result<FakeDownloadWatch, SessionError> {
        self.context.record("arm_download");
        let slot: Slot<FakeTransfer> = Arc::new(Mutex::new(None));
        self.state.lock().unwrap().armed_download = Some(slot.clone());
        Ok(FakeDownloadWatch { slot })
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.context.record("close_page");
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

pub struct FakePageWatch {
    slot: Slot<FakePage>,
}

#[async_trait]
impl PageWatch for FakePageWatch {
    type Page = FakePage;

    async fn wait(self, timeout: Duration) -> Result<FakePage, SessionError> {
        let page = self.slot.lock().unwrap().take();
        page.ok_or(SessionError::Timeout(timeout, "new page"))
    }
}

#[async_trait]
impl BrowsingContext for FakeContext {
    type Page = FakePage;
    type Watch = FakePageWatch;

    async fn watch_new_page(&self) -> Result<FakePageWatch, SessionError> {
        let slot: Slot<FakePage> = Arc::new(Mutex::new(None));
        let mut state = self.inner.lock().unwrap();
        state.armed.push(slot.clone());
        state.journal.push("arm_page".to_string());
        Ok(FakePageWatch { slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_page_opened_before_arming_is_lost() {
        let context = FakeContext::new();
        let page = context.new_page("https://example.com/my-cloud");
        let detail = context.new_page("https://example.com/view/1");
        page.add(Query::css(".video"), ElementBehavior::opens(detail));

        let element = page.find_elements(&Query::css(".video")).await.unwrap().remove(0);
        element.click(Duration::from_millis(10)).await.unwrap();
        let watch = context.watch_new_page().await.unwrap();

        let result = watch.wait(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(SessionError::Timeout(_, "new page"))));
        assert_eq!(context.journal(), vec!["click:.video#1", "page_lost", "arm_page"]);
    }

    #[tokio::test]
    async fn test_page_opened_after_arming_is_captured() {
        let context = FakeContext::new();
        let page = context.new_page("https://example.com/my-cloud");
        let detail = context.new_page("https://example.com/view/1");
        page.add(Query::css(".video"), ElementBehavior::opens(detail));

        let watch = context.watch_new_page().await.unwrap();
        let element = page.find_elements(&Query::css(".video")).await.unwrap().remove(0);
        element.click(Duration::from_millis(10)).await.unwrap();

        let opened = watch.wait(Duration::from_millis(10)).await.unwrap();
        assert_eq!(opened.current_url().await.unwrap(), "https://example.com/view/1");
    }
}
