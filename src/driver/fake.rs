//! Scripted in-memory browser for unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::driver::traits::{Browser, BrowserFactory, ElementHandle, SessionConfig};
use crate::error::{E2eError, Result};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub label: String,
    pub visible: bool,
    pub enabled: bool,
    pub attached: bool,
    pub text: String,
    pub value: String,
    pub attributes: HashMap<String, String>,
    /// A file input that ignores the selected file keeps an empty value
    pub accepts_files: bool,
}

impl FakeElement {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            visible: true,
            enabled: true,
            attached: true,
            text: String::new(),
            value: String::new(),
            attributes: HashMap::new(),
            accepts_files: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn detached(mut self) -> Self {
        self.attached = false;
        self
    }

    pub fn rejecting_files(mut self) -> Self {
        self.accepts_files = false;
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }
}

#[derive(Debug, Clone)]
enum ProbeReply {
    Element(u64),
    Nothing,
    Fail(String),
}

/// State shared by every session a [`FakeFactory`] hands out
#[derive(Default)]
pub struct FakeState {
    elements: Mutex<Vec<(String, FakeElement)>>,
    probes: Mutex<HashMap<String, ProbeReply>>,
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<Value, String>>>>,
    script_calls: Mutex<HashMap<String, usize>>,
    url: Mutex<String>,
    implicit_wait: Mutex<Duration>,
    actions: Mutex<Vec<String>>,
    navigation_failure: Mutex<Option<String>>,
    screenshot_failure: Mutex<Option<String>>,
    close_failure: Mutex<Option<String>>,
    configure_failures: Mutex<VecDeque<E2eError>>,
    create_failures: Mutex<VecDeque<E2eError>>,
    pub created: AtomicUsize,
    pub configured: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an element under a selector; returns its handle id
    pub fn add_element(&self, selector: &str, element: FakeElement) -> u64 {
        let mut elements = self.elements.lock().unwrap();
        elements.push((selector.to_string(), element));
        elements.len() as u64
    }

    pub fn update_element(&self, id: u64, f: impl FnOnce(&mut FakeElement)) {
        let mut elements = self.elements.lock().unwrap();
        if let Some((_, el)) = elements.get_mut(id as usize - 1) {
            f(el);
        }
    }

    pub fn element(&self, id: u64) -> FakeElement {
        self.elements.lock().unwrap()[id as usize - 1].1.clone()
    }

    pub fn probe_returns(&self, script: &str, id: u64) {
        self.probes
            .lock()
            .unwrap()
            .insert(script.to_string(), ProbeReply::Element(id));
    }

    pub fn probe_returns_nothing(&self, script: &str) {
        self.probes
            .lock()
            .unwrap()
            .insert(script.to_string(), ProbeReply::Nothing);
    }

    pub fn probe_fails(&self, script: &str, message: &str) {
        self.probes
            .lock()
            .unwrap()
            .insert(script.to_string(), ProbeReply::Fail(message.to_string()));
    }

    /// Queue script results; the last one repeats once the queue drains
    pub fn script_returns(&self, script: &str, results: Vec<std::result::Result<Value, String>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(script.to_string(), results.into_iter().collect());
    }

    pub fn script_calls(&self, script: &str) -> usize {
        self.script_calls
            .lock()
            .unwrap()
            .get(script)
            .copied()
            .unwrap_or(0)
    }

    /// `find_element` waits this long for a missing selector, as a real
    /// session does
    pub fn set_implicit_wait(&self, wait: Duration) {
        *self.implicit_wait.lock().unwrap() = wait;
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock().unwrap() = url.to_string();
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    pub fn fail_navigation(&self, message: &str) {
        *self.navigation_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_screenshot(&self, message: &str) {
        *self.screenshot_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_close(&self, message: &str) {
        *self.close_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Fail the next `configure` calls, one error per call
    pub fn fail_configure(&self, errors: Vec<E2eError>) {
        self.configure_failures.lock().unwrap().extend(errors);
    }

    /// Fail the next `create` calls, one error per call
    pub fn fail_create(&self, errors: Vec<E2eError>) {
        self.create_failures.lock().unwrap().extend(errors);
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    fn with_element<T>(&self, handle: &ElementHandle, f: impl FnOnce(&mut FakeElement) -> T) -> Result<T> {
        let mut elements = self.elements.lock().unwrap();
        match elements.get_mut(handle.id() as usize - 1) {
            Some((_, el)) => Ok(f(el)),
            None => Err(E2eError::Driver(format!("unknown element {}", handle.id()))),
        }
    }
}

pub struct FakeBrowser {
    state: Arc<FakeState>,
}

impl FakeBrowser {
    pub fn new(state: Arc<FakeState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn configure(&self, _config: &SessionConfig) -> Result<()> {
        self.state.configured.fetch_add(1, Ordering::SeqCst);
        match self.state.configure_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.state.record(format!("navigate:{}", url));
        if let Some(msg) = self.state.navigation_failure.lock().unwrap().clone() {
            return Err(E2eError::Navigation(msg));
        }
        self.state.set_url(url);
        Ok(())
    }

    async fn execute_script(&self, script: &str, _args: Vec<Value>) -> Result<Value> {
        *self
            .state
            .script_calls
            .lock()
            .unwrap()
            .entry(script.to_string())
            .or_insert(0) += 1;

        let mut scripts = self.state.scripts.lock().unwrap();
        let reply = match scripts.get_mut(script) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match reply {
            Some(Ok(value)) => Ok(value),
            Some(Err(msg)) => Err(E2eError::Driver(msg)),
            None => Ok(Value::Null),
        }
    }

    async fn probe_element(&self, script: &str) -> Result<Option<ElementHandle>> {
        let reply = self.state.probes.lock().unwrap().get(script).cloned();
        match reply {
            Some(ProbeReply::Element(id)) => Ok(Some(ElementHandle::new(id, "probe"))),
            Some(ProbeReply::Fail(msg)) => Err(E2eError::Driver(msg)),
            Some(ProbeReply::Nothing) | None => Ok(None),
        }
    }

    async fn find_element(&self, selector: &str) -> Result<Option<ElementHandle>> {
        if let Some(el) = self.find_elements(selector).await?.into_iter().next() {
            return Ok(Some(el));
        }
        let wait = *self.state.implicit_wait.lock().unwrap();
        if wait.is_zero() {
            return Ok(None);
        }
        tokio::time::sleep(wait).await;
        Ok(self.find_elements(selector).await?.into_iter().next())
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let elements = self.state.elements.lock().unwrap();
        Ok(elements
            .iter()
            .enumerate()
            .filter(|(_, (sel, el))| sel == selector && el.attached)
            .map(|(i, _)| ElementHandle::new(i as u64 + 1, selector))
            .collect())
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let label = self.state.with_element(element, |el| el.label.clone())?;
        self.state.record(format!("click:{}", label));
        Ok(())
    }

    async fn set_value(&self, element: &ElementHandle, text: &str) -> Result<()> {
        let label = self.state.with_element(element, |el| {
            el.value = text.to_string();
            el.label.clone()
        })?;
        self.state.record(format!("input:{}={}", label, text));
        Ok(())
    }

    async fn set_input_files(&self, element: &ElementHandle, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(E2eError::Driver(format!(
                "cannot read upload file {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (label, accepted) = self.state.with_element(element, |el| {
            if el.accepts_files {
                el.value = format!("C:\\fakepath\\{}", name);
            }
            (el.label.clone(), el.accepts_files)
        })?;
        self.state.record(format!("upload:{}={}", label, name));
        if !accepted {
            return Err(E2eError::Driver(format!(
                "file input from {} is still empty after selecting {}",
                element.origin(),
                path.display()
            )));
        }
        Ok(())
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool> {
        self.state.with_element(element, |el| el.attached && el.visible)
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool> {
        self.state.with_element(element, |el| el.enabled)
    }

    async fn is_attached(&self, element: &ElementHandle) -> Result<bool> {
        self.state.with_element(element, |el| el.attached)
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        self.state.with_element(element, |el| el.text.clone())
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        self.state
            .with_element(element, |el| el.attributes.get(name).cloned())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        if let Some(msg) = self.state.screenshot_failure.lock().unwrap().clone() {
            return Err(E2eError::Driver(msg));
        }
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.url.lock().unwrap().clone())
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.state.close_failure.lock().unwrap().clone() {
            return Err(E2eError::Session(msg));
        }
        Ok(())
    }
}

pub struct FakeFactory {
    pub state: Arc<FakeState>,
}

impl FakeFactory {
    pub fn new(state: Arc<FakeState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl BrowserFactory for FakeFactory {
    async fn create(&self, _config: &SessionConfig) -> Result<Box<dyn Browser>> {
        if let Some(err) = self.state.create_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBrowser::new(self.state.clone())))
    }
}
