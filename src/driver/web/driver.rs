//! Browser session backed by Playwright
//!
//! Every element is addressed through a Playwright `JsHandle` kept in a
//! per-session table; the runner only ever sees the numeric [`ElementHandle`].

use async_trait::async_trait;
use playwright::api::{BrowserContext, File, JsHandle, Page, Viewport};
use playwright::Playwright;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::driver::traits::{Browser, BrowserFactory, ElementHandle, SessionConfig};
use crate::error::{E2eError, Result};

/// Interval of the implicit element wait
const IMPLICIT_WAIT_TICK: Duration = Duration::from_millis(100);

/// Handles kept alive per session; the oldest are disposed beyond this
const MAX_LIVE_HANDLES: usize = 256;

const IS_VISIBLE_JS: &str = r#"el => {
    if (!el.isConnected) return false;
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}"#;

const IS_ENABLED_JS: &str = r#"el => {
    if (el.disabled) return false;
    if (el.getAttribute('disabled') !== null) return false;
    return el.getAttribute('aria-disabled') !== 'true';
}"#;

/// Web browser engine
#[derive(Debug, Clone, Copy, Default)]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserType {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "firefox" => BrowserType::Firefox,
            "webkit" => BrowserType::Webkit,
            _ => BrowserType::Chromium,
        }
    }
}

/// Launches one Playwright browser per session
#[derive(Debug, Clone, Default)]
pub struct WebBrowserFactory {
    pub browser_type: BrowserType,
}

impl WebBrowserFactory {
    pub fn new(browser_type: BrowserType) -> Self {
        Self { browser_type }
    }
}

#[async_trait]
impl BrowserFactory for WebBrowserFactory {
    async fn create(&self, config: &SessionConfig) -> Result<Box<dyn Browser>> {
        let browser = WebBrowser::launch(self.browser_type, config).await?;
        Ok(Box::new(browser))
    }
}

/// A live Playwright session: browser, context and a single page
pub struct WebBrowser {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: playwright::api::Browser,
    #[allow(dead_code)]
    context: BrowserContext,
    page: Arc<Mutex<Page>>,
    handles: Mutex<HandleTable<JsHandle>>,
    next_handle: AtomicU64,
    implicit_wait: Mutex<Duration>,
    page_load_timeout: Mutex<Duration>,
}

impl WebBrowser {
    /// Launch a browser and open a blank page
    pub async fn launch(browser_type: BrowserType, config: &SessionConfig) -> Result<Self> {
        let session_err = |e: Arc<playwright::Error>| E2eError::Session(e.to_string());

        let playwright = Playwright::initialize()
            .await
            .map_err(|e| E2eError::Session(format!("failed to initialize Playwright: {}", e)))?;

        let browser = match browser_type {
            BrowserType::Chromium => {
                let chromium = playwright.chromium();
                let mut launcher = chromium.launcher().headless(config.headless);
                let executable = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
                    .ok()
                    .map(PathBuf::from);
                if let Some(ref path) = executable {
                    log::info!("Using browser from env: {}", path.display());
                    launcher = launcher.executable(path);
                }
                launcher.launch().await.map_err(session_err)?
            }
            BrowserType::Firefox => playwright
                .firefox()
                .launcher()
                .headless(config.headless)
                .launch()
                .await
                .map_err(session_err)?,
            BrowserType::Webkit => playwright
                .webkit()
                .launcher()
                .headless(config.headless)
                .launch()
                .await
                .map_err(session_err)?,
        };

        let context = browser
            .context_builder()
            .build()
            .await
            .map_err(session_err)?;
        let page = context.new_page().await.map_err(session_err)?;

        log::info!("Launched {:?} (headless: {})", browser_type, config.headless);

        Ok(Self {
            playwright: Arc::new(playwright),
            browser,
            context,
            page: Arc::new(Mutex::new(page)),
            handles: Mutex::new(HandleTable::new(MAX_LIVE_HANDLES)),
            next_handle: AtomicU64::new(1),
            implicit_wait: Mutex::new(config.implicit_wait),
            page_load_timeout: Mutex::new(config.page_load_timeout),
        })
    }

    /// Store a handle; the oldest ones beyond the cap are disposed in the page
    async fn register(&self, handle: JsHandle, origin: &str) -> ElementHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let evicted = self.handles.lock().await.insert(id, handle);
        for (old_id, mut old) in evicted {
            if let Err(e) = old.dispose().await {
                log::debug!("Could not dispose element handle {}: {}", old_id, e);
            }
        }
        ElementHandle::new(id, origin)
    }

    async fn js_handle(&self, element: &ElementHandle) -> Result<JsHandle> {
        self.handles
            .lock()
            .await
            .get(element.id())
            .cloned()
            .ok_or_else(|| {
                E2eError::Driver(format!("stale element handle from {}", element.origin()))
            })
    }

    /// Evaluate `function` with the element as its only argument
    async fn eval_on<U>(&self, element: &ElementHandle, function: &str) -> Result<U>
    where
        U: serde::de::DeserializeOwned,
    {
        let handle = self.js_handle(element).await?;
        let page = self.page.lock().await;
        page.evaluate::<_, U>(function, handle)
            .await
            .map_err(E2eError::driver)
    }

    /// Evaluate an expression yielding an element or null
    async fn element_from(&self, expression: &str, origin: &str) -> Result<Option<ElementHandle>> {
        let handle = {
            let page = self.page.lock().await;
            let mut handle = page
                .evaluate_js_handle(expression, Some(()))
                .await
                .map_err(E2eError::driver)?;
            let json = handle
                .json_value::<Value>()
                .await
                .map_err(E2eError::driver)?;
            if json.is_null() {
                return Ok(None);
            }
            handle
        };
        Ok(Some(self.register(handle, origin).await))
    }

    async fn count_matches(&self, selector: &str) -> Result<usize> {
        let page = self.page.lock().await;
        page.evaluate::<_, usize>(
            "sel => document.querySelectorAll(sel).length",
            selector.to_string(),
        )
        .await
        .map_err(E2eError::driver)
    }

    /// Poll until at least one element matches or the implicit wait elapses
    async fn wait_for_matches(&self, selector: &str) -> Result<usize> {
        let implicit_wait = *self.implicit_wait.lock().await;
        let start = tokio::time::Instant::now();
        loop {
            let count = self.count_matches(selector).await?;
            if count > 0 || start.elapsed() >= implicit_wait {
                return Ok(count);
            }
            tokio::time::sleep(IMPLICIT_WAIT_TICK).await;
        }
    }

    async fn nth_match(&self, selector: &str, index: usize) -> Result<Option<ElementHandle>> {
        let expression = format!(
            "() => document.querySelectorAll({})[{}] || null",
            quote_js(selector),
            index
        );
        self.element_from(&expression, selector).await
    }
}

#[async_trait]
impl Browser for WebBrowser {
    async fn configure(&self, config: &SessionConfig) -> Result<()> {
        *self.implicit_wait.lock().await = config.implicit_wait;
        *self.page_load_timeout.lock().await = config.page_load_timeout;

        let page = self.page.lock().await;
        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await
        .map_err(|e| E2eError::Session(format!("failed to set viewport: {}", e)))
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let timeout = *self.page_load_timeout.lock().await;
        {
            let page = self.page.lock().await;
            page.goto_builder(url)
                .timeout(timeout.as_millis() as f64)
                .goto()
                .await
                .map_err(|e| E2eError::Navigation(format!("{}: {}", url, e)))?;
        }
        // Handles from the previous document are dead after a load
        self.handles.lock().await.clear();
        Ok(())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        let function = format!("(args) => {{ {} }}", script);
        let page = self.page.lock().await;
        page.evaluate::<_, Value>(&function, Value::Array(args))
            .await
            .map_err(E2eError::driver)
    }

    async fn probe_element(&self, script: &str) -> Result<Option<ElementHandle>> {
        let expression = format!("() => {{ {} }}", script);
        self.element_from(&expression, "probe").await
    }

    async fn find_element(&self, selector: &str) -> Result<Option<ElementHandle>> {
        if self.wait_for_matches(selector).await? == 0 {
            return Ok(None);
        }
        self.nth_match(selector, 0).await
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let count = self.count_matches(selector).await?;
        let mut elements = Vec::with_capacity(count);
        for index in 0..count {
            if let Some(el) = self.nth_match(selector, index).await? {
                elements.push(el);
            }
        }
        Ok(elements)
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let center: Value = self
            .eval_on(
                element,
                "el => {
                    el.scrollIntoView({ block: 'center' });
                    const r = el.getBoundingClientRect();
                    return { x: r.x + r.width / 2, y: r.y + r.height / 2, w: r.width, h: r.height };
                }",
            )
            .await?;

        let w = center.get("w").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let h = center.get("h").and_then(|v| v.as_f64()).unwrap_or(0.0);
        if w > 0.0 && h > 0.0 {
            let x = center.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let y = center.get("y").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let page = self.page.lock().await;
            let native = async {
                page.mouse.r#move(x, y, None).await?;
                page.mouse.down(None, None).await?;
                page.mouse.up(None, None).await
            }
            .await;
            match native {
                Ok(()) => return Ok(()),
                Err(e) => log::debug!("Native click failed, using in-page click: {}", e),
            }
        }

        self.eval_on::<()>(element, "el => el.click()").await
    }

    async fn set_value(&self, element: &ElementHandle, text: &str) -> Result<()> {
        let function = format!(
            "el => {{
                el.focus();
                const value = {};
                const proto = Object.getPrototypeOf(el);
                const desc = proto ? Object.getOwnPropertyDescriptor(proto, 'value') : null;
                if (desc && desc.set) {{ desc.set.call(el, value); }} else {{ el.value = value; }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return el.value;
            }}",
            quote_js(text)
        );
        let value: Value = self.eval_on(element, &function).await?;
        if value.as_str() != Some(text) {
            return Err(E2eError::Driver(format!(
                "input value did not stick on element from {}",
                element.origin()
            )));
        }
        Ok(())
    }

    async fn set_input_files(&self, element: &ElementHandle, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|e| {
            E2eError::Driver(format!("cannot read upload file {}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let file = File::new(name, mime_type(path).to_string(), &bytes);

        let handle = self.js_handle(element).await?;
        {
            let page = self.page.lock().await;
            let input = page
                .evaluate_element_handle("el => el", Some(handle))
                .await
                .map_err(E2eError::driver)?;
            input
                .set_input_files_builder(file)
                .set_input_files()
                .await
                .map_err(E2eError::driver)?;
        }

        let value: Option<String> = self.eval_on(element, "el => el.value || null").await?;
        if value.map_or(true, |v| v.is_empty()) {
            return Err(E2eError::Driver(format!(
                "file input from {} is still empty after selecting {}",
                element.origin(),
                path.display()
            )));
        }
        Ok(())
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool> {
        self.eval_on(element, IS_VISIBLE_JS).await
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool> {
        self.eval_on(element, IS_ENABLED_JS).await
    }

    async fn is_attached(&self, element: &ElementHandle) -> Result<bool> {
        self.eval_on(element, "el => !!el && el.isConnected === true")
            .await
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        self.eval_on(element, "el => (el.innerText || el.textContent || '').trim()")
            .await
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let function = format!("el => el.getAttribute({})", quote_js(name));
        self.eval_on(element, &function).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let page = self.page.lock().await;
        page.screenshot_builder()
            .r#type(playwright::api::ScreenshotType::Png)
            .screenshot()
            .await
            .map_err(E2eError::driver)
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page.lock().await;
        page.evaluate::<_, String>("() => window.location.href", ())
            .await
            .map_err(E2eError::driver)
    }

    async fn close(&self) -> Result<()> {
        self.handles.lock().await.clear();
        self.browser
            .close()
            .await
            .map_err(|e| E2eError::Session(format!("failed to close browser: {}", e)))
    }
}

/// Live handles by id, evicting the oldest once `capacity` is exceeded
struct HandleTable<T> {
    entries: BTreeMap<u64, T>,
    capacity: usize,
}

impl<T> HandleTable<T> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns the entries pushed out by this insert
    fn insert(&mut self, id: u64, value: T) -> Vec<(u64, T)> {
        self.entries.insert(id, value);
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            match self.entries.pop_first() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }
        evicted
    }

    fn get(&self, id: u64) -> Option<&T> {
        self.entries.get(&id)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Quote a string as a JavaScript literal
fn quote_js(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_js_escapes_quotes() {
        assert_eq!(quote_js(r#"a"b"#), r#""a\"b""#);
        assert_eq!(quote_js("ion-input[label='x']"), "\"ion-input[label='x']\"");
    }

    #[test]
    fn test_browser_type_from_name() {
        assert!(matches!(BrowserType::from_name("Firefox"), BrowserType::Firefox));
        assert!(matches!(BrowserType::from_name("webkit"), BrowserType::Webkit));
        assert!(matches!(BrowserType::from_name("chrome"), BrowserType::Chromium));
    }
}
