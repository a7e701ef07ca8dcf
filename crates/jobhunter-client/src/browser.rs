use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Element};
use futures::StreamExt;
use jobhunter_core::error::AppError;
use jobhunter_core::traits::{Page, PageElement};
use tokio::task::JoinHandle;

const IS_VISIBLE_FN: &str = "function() { \
    const style = window.getComputedStyle(this); \
    const rect = this.getBoundingClientRect(); \
    return style.display !== 'none' && style.visibility !== 'hidden' \
        && rect.width > 0 && rect.height > 0; }";
const SCROLL_HEIGHT_FN: &str = "function() { return this.scrollHeight; }";
const SCROLL_TO_END_FN: &str = "function() { this.scrollTop = this.scrollHeight; }";

fn cdp_error(context: &str) -> impl Fn(chromiumoxide::error::CdpError) -> AppError + '_ {
    move |e| AppError::Browser(format!("{context}: {e}"))
}

/// One headless Chromium tab.
///
/// Owns the browser process; [`ChromiumPage::close`] shuts it down.
pub struct ChromiumPage {
    browser: Browser,
    handler: JoinHandle<()>,
    page: chromiumoxide::Page,
    timeout: Duration,
}

impl ChromiumPage {
    /// Launches a headless Chromium browser with a **30 s** navigation timeout.
    pub async fn launch() -> Result<Self, AppError> {
        Self::launch_with_timeout(Duration::from_secs(30)).await
    }

    /// Launches a headless Chromium browser and opens a blank tab.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$PATH`, the
    /// `CHROME_BIN` variable, or one of the usual install locations.
    pub async fn launch_with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .window_size(1920, 1080);

        if let Some(bin) = find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::Browser(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(cdp_error("Failed to launch browser"))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(cdp_error("Failed to open tab"))?;

        Ok(Self {
            browser,
            handler,
            page,
            timeout,
        })
    }

    /// Close the tab and the browser process.
    pub async fn close(mut self) {
        let _ = self.page.close().await;
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "Failed to close browser");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// The snap wrapper at `/snap/bin/chromium` strips unknown CLI flags, so the
/// binary inside the snap is preferred. `None` lets `chromiumoxide` search.
fn find_chrome_binary() -> Option<PathBuf> {
    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

impl Page for ChromiumPage {
    type Element = ChromiumElement;

    async fn navigate(&self, url: &str) -> Result<(), AppError> {
        match tokio::time::timeout(self.timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::Browser(format!("Failed to navigate to {url}: {e}"))),
            Err(_) => Err(AppError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn current_url(&self) -> Result<String, AppError> {
        self.page
            .url()
            .await
            .map_err(cdp_error("Failed to read page address"))?
            .ok_or_else(|| AppError::Browser("Page has no address".into()))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ChromiumElement>, AppError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(cdp_error("Query failed"))?;
        Ok(elements.into_iter().map(ChromiumElement).collect())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AppError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(cdp_error("Script failed"))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

/// An element handle inside a [`ChromiumPage`].
pub struct ChromiumElement(Element);

impl ChromiumElement {
    async fn call(&self, function: &str) -> Result<serde_json::Value, AppError> {
        let returns = self
            .0
            .call_js_fn(function, false)
            .await
            .map_err(cdp_error("Element script failed"))?;
        Ok(returns.result.value.unwrap_or(serde_json::Value::Null))
    }
}

impl PageElement for ChromiumElement {
    async fn text(&self) -> Result<String, AppError> {
        Ok(self
            .0
            .inner_text()
            .await
            .map_err(cdp_error("Failed to read text"))?
            .unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, AppError> {
        self.0
            .attribute(name)
            .await
            .map_err(cdp_error("Failed to read attribute"))
    }

    async fn attribute_names(&self) -> Result<Vec<String>, AppError> {
        // CDP returns a flat [name, value, name, value, ...] list
        let flat = self
            .0
            .attributes()
            .await
            .map_err(cdp_error("Failed to read attributes"))?;
        Ok(flat.into_iter().step_by(2).collect())
    }

    async fn href(&self) -> Result<Option<String>, AppError> {
        let value = self
            .0
            .property("href")
            .await
            .map_err(cdp_error("Failed to read href"))?;
        Ok(value.and_then(|v| v.as_str().map(str::to_string)))
    }

    async fn click(&self) -> Result<(), AppError> {
        self.0.click().await.map_err(cdp_error("Click failed"))?;
        Ok(())
    }

    async fn is_visible(&self) -> Result<bool, AppError> {
        Ok(self.call(IS_VISIBLE_FN).await?.as_bool().unwrap_or(false))
    }

    async fn scroll_height(&self) -> Result<f64, AppError> {
        let value = self.call(SCROLL_HEIGHT_FN).await?;
        value
            .as_f64()
            .ok_or_else(|| AppError::Browser(format!("Unexpected scrollHeight value: {value}")))
    }

    async fn scroll_to_end(&self) -> Result<(), AppError> {
        self.call(SCROLL_TO_END_FN).await?;
        Ok(())
    }
}
