use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Opaque reference to an element held by a [`Browser`] session
///
/// Handles are only meaningful to the session that produced them and are
/// invalidated when that session is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    id: u64,
    /// How the element was found (probe or selector), for diagnostics
    origin: String,
}

impl ElementHandle {
    pub fn new(id: u64, origin: impl Into<String>) -> Self {
        Self {
            id,
            origin: origin.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Per-session browser settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub headless: bool,
    /// Implicit element wait applied to structural lookups
    pub implicit_wait: Duration,
    pub page_load_timeout: Duration,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: false,
            implicit_wait: Duration::from_secs(10),
            page_load_timeout: Duration::from_secs(30),
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }
}

/// Browser-control capability consumed by the runner
///
/// One value is one live session. It is created per attempt by a
/// [`BrowserFactory`] and closed by the attempt that owns it.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Apply timeouts and viewport to a freshly created session
    async fn configure(&self, config: &SessionConfig) -> Result<()>;

    /// Load a page
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Evaluate a script in the page and return its JSON result
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value>;

    /// Evaluate a probe script that returns an element or null
    async fn probe_element(&self, script: &str) -> Result<Option<ElementHandle>>;

    /// First element matching a CSS selector, waiting up to the session's
    /// implicit wait for one to appear
    async fn find_element(&self, selector: &str) -> Result<Option<ElementHandle>>;

    /// All elements currently matching a CSS selector, in document order
    async fn find_elements(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    /// Replace the value of an input element
    async fn set_value(&self, element: &ElementHandle, text: &str) -> Result<()>;

    /// Select a local file in an `<input type=file>` element
    async fn set_input_files(&self, element: &ElementHandle, path: &Path) -> Result<()>;

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool>;

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool>;

    /// Whether the element is still connected to the document
    async fn is_attached(&self, element: &ElementHandle) -> Result<bool>;

    /// Visible text content of the element
    async fn text(&self, element: &ElementHandle) -> Result<String>;

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// PNG screenshot of the current viewport
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn current_url(&self) -> Result<String>;

    /// Tear the session down
    async fn close(&self) -> Result<()>;
}

/// Creates browser sessions
#[async_trait]
pub trait BrowserFactory: Send + Sync {
    async fn create(&self, config: &SessionConfig) -> Result<Box<dyn Browser>>;
}
