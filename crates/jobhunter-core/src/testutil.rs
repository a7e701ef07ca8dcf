//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::AppError;
use crate::models::Posting;
use crate::reporter::{RunEvent, RunReporter};
use crate::traits::{Generator, Notifier, Page, PageElement};

// ---------------------------------------------------------------------------
// MockPage
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockPageState {
    url: String,
    /// url -> selector -> elements
    sites: HashMap<String, HashMap<String, Vec<MockElement>>>,
    failing_selectors: Vec<String>,
    failing_navigation: Vec<String>,
    url_error: bool,
    heights: Vec<serde_json::Value>,
    scripts: Vec<String>,
    navigations: Vec<String>,
}

/// Mock browser tab. Elements are registered per page address and selector;
/// `query_all` answers from whatever address the tab is currently on.
#[derive(Clone)]
pub struct MockPage {
    state: Arc<Mutex<MockPageState>>,
}

impl MockPage {
    pub fn new(url: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockPageState {
                url: url.to_string(),
                ..Default::default()
            })),
        }
    }

    /// Register an element returned by `query_all(selector)` while on `url`.
    pub fn with_element(self, url: &str, selector: &str, mut element: MockElement) -> Self {
        element.page = Arc::downgrade(&self.state);
        self.state
            .lock()
            .unwrap()
            .sites
            .entry(url.to_string())
            .or_default()
            .entry(selector.to_string())
            .or_default()
            .push(element);
        self
    }

    /// Successive values for the page height script; the last one repeats.
    pub fn with_heights(self, heights: Vec<f64>) -> Self {
        self.state.lock().unwrap().heights =
            heights.into_iter().map(serde_json::Value::from).collect();
        self
    }

    pub fn with_height_value(self, value: serde_json::Value) -> Self {
        self.state.lock().unwrap().heights = vec![value];
        self
    }

    pub fn with_failing_selector(self, selector: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_selectors
            .push(selector.to_string());
        self
    }

    pub fn with_failing_navigation(self, url: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_navigation
            .push(url.to_string());
        self
    }

    pub fn with_url_error(self) -> Self {
        self.state.lock().unwrap().url_error = true;
        self
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn scroll_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .scripts
            .iter()
            .filter(|s| s.contains("scrollTo"))
            .count()
    }
}

impl Page for MockPage {
    type Element = MockElement;

    async fn navigate(&self, url: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_navigation.iter().any(|u| u == url) {
            return Err(AppError::Browser(format!("net::ERR_NAME_NOT_RESOLVED at {url}")));
        }
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AppError> {
        let state = self.state.lock().unwrap();
        if state.url_error {
            return Err(AppError::Browser("target closed".into()));
        }
        Ok(state.url.clone())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<MockElement>, AppError> {
        let state = self.state.lock().unwrap();
        if state.failing_selectors.iter().any(|s| s == selector) {
            return Err(AppError::Browser(format!("bad selector {selector}")));
        }
        Ok(state
            .sites
            .get(&state.url)
            .and_then(|site| site.get(selector))
            .cloned()
            .unwrap_or_default())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AppError> {
        let mut state = self.state.lock().unwrap();
        state.scripts.push(script.to_string());
        if script.contains("scrollTo") {
            return Ok(serde_json::Value::Null);
        }
        if state.heights.len() > 1 {
            Ok(state.heights.remove(0))
        } else {
            Ok(state
                .heights
                .first()
                .cloned()
                .unwrap_or_else(|| serde_json::Value::from(1000.0)))
        }
    }
}

// ---------------------------------------------------------------------------
// MockElement
// ---------------------------------------------------------------------------

/// Mock element with configurable text, attributes and click behaviour.
#[derive(Clone, Default)]
pub struct MockElement {
    text: Option<String>,
    attrs: BTreeMap<String, String>,
    href: Option<String>,
    hidden: bool,
    navigates_to: Option<String>,
    fail_click: bool,
    clicks: Arc<AtomicUsize>,
    heights: Arc<Mutex<Vec<f64>>>,
    scrolls: Arc<AtomicUsize>,
    page: Weak<Mutex<MockPageState>>,
}

impl MockElement {
    /// An `<a>` with visible text and a resolved link target.
    pub fn link(text: &str, href: &str) -> Self {
        let mut el = Self {
            text: Some(text.to_string()),
            href: Some(href.to_string()),
            ..Default::default()
        };
        el.attrs.insert("href".into(), href.to_string());
        el
    }

    pub fn button(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// A scrollable container whose `scrollHeight` follows `heights`.
    pub fn container(heights: Vec<f64>) -> Self {
        Self {
            text: Some(String::new()),
            heights: Arc::new(Mutex::new(heights)),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Clicking moves the owning page to `url`.
    pub fn navigates_to(mut self, url: &str) -> Self {
        self.navigates_to = Some(url.to_string());
        self
    }

    pub fn failing_click(mut self) -> Self {
        self.fail_click = true;
        self
    }

    pub fn failing_text(mut self) -> Self {
        self.text = None;
        self
    }

    pub fn click_count(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    pub fn scroll_count(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }
}

impl PageElement for MockElement {
    async fn text(&self) -> Result<String, AppError> {
        self.text
            .clone()
            .ok_or_else(|| AppError::Browser("node detached".into()))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, AppError> {
        Ok(self.attrs.get(name).cloned())
    }

    async fn attribute_names(&self) -> Result<Vec<String>, AppError> {
        Ok(self.attrs.keys().cloned().collect())
    }

    async fn href(&self) -> Result<Option<String>, AppError> {
        Ok(self.href.clone())
    }

    async fn click(&self) -> Result<(), AppError> {
        if self.fail_click {
            return Err(AppError::Browser("element is not clickable".into()));
        }
        self.clicks.fetch_add(1, Ordering::SeqCst);
        if let (Some(url), Some(page)) = (&self.navigates_to, self.page.upgrade()) {
            page.lock().unwrap().url = url.clone();
        }
        Ok(())
    }

    async fn is_visible(&self) -> Result<bool, AppError> {
        Ok(!self.hidden)
    }

    async fn scroll_height(&self) -> Result<f64, AppError> {
        let mut heights = self.heights.lock().unwrap();
        if heights.len() > 1 {
            Ok(heights.remove(0))
        } else {
            Ok(heights.first().copied().unwrap_or(0.0))
        }
    }

    async fn scroll_to_end(&self) -> Result<(), AppError> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Mock generator that replays queued responses and records prompts.
#[derive(Clone, Default)]
pub struct MockGenerator {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    pub fn new(response: &str) -> Self {
        Self::with_responses(vec![Ok(response.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("[]".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Mock notifier that records delivered messages.
#[derive(Clone)]
pub struct MockNotifier {
    name: String,
    max_message_length: usize,
    fail: bool,
    pub delivered: Arc<Mutex<Vec<String>>>,
}

impl MockNotifier {
    pub fn new(name: &str, max_message_length: usize) -> Self {
        Self {
            name: name.to_string(),
            max_message_length,
            fail: false,
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, 4096)
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_message_length(&self) -> usize {
        self.max_message_length
    }

    async fn deliver(&self, text: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::HttpError("HTTP 502 from channel".into()));
        }
        self.delivered.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn make_posting(id: usize, title: &str) -> Posting {
    Posting::new(
        id.to_string(),
        title,
        "Acme",
        format!("https://acme.com/jobs/{id}"),
        "https://acme.com/careers",
    )
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Records a short label for every run event.
#[derive(Clone, Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl RunReporter for MockReporter {
    fn report(&self, event: RunEvent<'_>) {
        let label = match event {
            RunEvent::PhaseStarted { phase } => format!("phase:{phase}"),
            RunEvent::Interrupted { phase } => format!("interrupted:{phase}"),
            RunEvent::Failed { kind, .. } => format!("failed:{kind}"),
            RunEvent::ChannelFailed { channel, .. } => format!("channel_failed:{channel}"),
            RunEvent::MarkedDelivered { count } => format!("marked:{count}"),
            RunEvent::Deferred { deferred, .. } => format!("deferred:{deferred}"),
            other => format!("{other:?}")
                .split([' ', '{'])
                .next()
                .unwrap_or_default()
                .to_lowercase(),
        };
        self.events.lock().unwrap().push(label);
    }
}
