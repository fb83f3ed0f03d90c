//! Probe-then-fallback element resolution
//!
//! A [`Locator`] names one UI element two ways: an in-page probe script that
//! can express semantic predicates ("the button whose text is X and that has
//! no `fill=outline`"), and an ordered list of CSS selectors used when the
//! probe is absent or yields nothing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::driver::{Browser, ElementHandle};
use crate::error::{E2eError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
    /// Function body evaluated in the page; returns an element or null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,
    /// Structural fallback, tried in order
    #[serde(default, rename = "selectors")]
    pub fallback_selectors: Vec<String>,
}

impl Locator {
    pub fn probe(script: &str) -> Self {
        Self {
            probe: Some(script.to_string()),
            fallback_selectors: Vec::new(),
        }
    }

    pub fn selectors<S: AsRef<str>>(selectors: &[S]) -> Self {
        Self {
            probe: None,
            fallback_selectors: selectors.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    pub fn with_fallback(mut self, selector: &str) -> Self {
        self.fallback_selectors.push(selector.to_string());
        self
    }

    /// At least one strategy must be present
    pub fn validate(&self) -> Result<()> {
        let has_probe = self
            .probe
            .as_deref()
            .map_or(false, |p| !p.trim().is_empty());
        let has_selectors = self.fallback_selectors.iter().any(|s| !s.trim().is_empty());
        if has_probe || has_selectors {
            Ok(())
        } else {
            Err(E2eError::InvalidLocator(
                "locator needs a probe or at least one selector".to_string(),
            ))
        }
    }

    /// Short human-readable form for logs and errors
    pub fn describe(&self) -> String {
        match (&self.probe, self.fallback_selectors.is_empty()) {
            (Some(_), true) => "probe".to_string(),
            (Some(_), false) => format!("probe | {}", self.fallback_selectors.join(" | ")),
            (None, _) => self.fallback_selectors.join(" | "),
        }
    }
}

/// jQuery-style pseudo-classes that CSS engines reject
fn unsupported_pseudo() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r":(?:contains|eq|gt|lt|nth)\(|:(?:first|last|even|odd|visible|hidden)(?:$|[^-\w])")
            .expect("static regex")
    })
}

/// Whether a selector uses a matcher the structural path cannot evaluate
pub fn is_supported_selector(selector: &str) -> bool {
    !selector.trim().is_empty() && !unsupported_pseudo().is_match(selector)
}

/// Resolve a locator to an actionable element.
///
/// The probe runs first; a non-null, attached result wins immediately. A
/// failing probe is logged and treated as "nothing found". Fallback
/// selectors are tried in order and the first match that is both visible and
/// enabled is returned. Read-only: nothing in the page is changed.
pub async fn resolve(browser: &dyn Browser, locator: &Locator) -> Result<ElementHandle> {
    resolve_with(browser, locator, Lookup::Wait).await
}

/// Like [`resolve`], but each selector is checked against the current DOM
/// only, without the session's implicit wait. Used by polled conditions so
/// one tick costs a few queries, not a full wait per missing selector.
pub async fn resolve_now(browser: &dyn Browser, locator: &Locator) -> Result<ElementHandle> {
    resolve_with(browser, locator, Lookup::Snapshot).await
}

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Wait,
    Snapshot,
}

async fn first_match(browser: &dyn Browser, selector: &str, lookup: Lookup) -> Result<Option<ElementHandle>> {
    match lookup {
        Lookup::Wait => browser.find_element(selector).await,
        Lookup::Snapshot => Ok(browser.find_elements(selector).await?.into_iter().next()),
    }
}

async fn resolve_with(browser: &dyn Browser, locator: &Locator, lookup: Lookup) -> Result<ElementHandle> {
    locator.validate()?;

    if let Some(ref probe) = locator.probe {
        match browser.probe_element(probe).await {
            Ok(Some(el)) => match browser.is_attached(&el).await {
                Ok(true) => {
                    log::debug!("Resolved {} via probe", locator.describe());
                    return Ok(el);
                }
                Ok(false) => log::debug!("Probe returned a detached element"),
                Err(e) => log::debug!("Probe element check failed: {}", e),
            },
            Ok(None) => log::debug!("Probe found nothing, trying selectors"),
            Err(e) => log::debug!("Probe failed, trying selectors: {}", e),
        }
    }

    for selector in &locator.fallback_selectors {
        if !is_supported_selector(selector) {
            log::debug!("Skipping unsupported selector: {}", selector);
            continue;
        }

        let element = match first_match(browser, selector, lookup).await {
            Ok(Some(el)) => el,
            Ok(None) => continue,
            Err(e) => {
                log::debug!("Selector '{}' failed: {}", selector, e);
                continue;
            }
        };

        if is_actionable(browser, &element).await {
            log::debug!("Resolved {} via selector '{}'", locator.describe(), selector);
            return Ok(element);
        }
        log::debug!("Selector '{}' matched a hidden or disabled element", selector);
    }

    Err(E2eError::ElementNotFound(locator.describe()))
}

/// [`resolve_now`], mapping "not found" to `None` and passing other errors
/// through
pub async fn try_resolve_now(browser: &dyn Browser, locator: &Locator) -> Result<Option<ElementHandle>> {
    match resolve_now(browser, locator).await {
        Ok(el) => Ok(Some(el)),
        Err(E2eError::ElementNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn is_actionable(browser: &dyn Browser, element: &ElementHandle) -> bool {
    let visible = browser.is_visible(element).await.unwrap_or(false);
    visible && browser.is_enabled(element).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeBrowser, FakeElement, FakeState};
    use std::time::Duration;
    use tokio::time::Instant;

    #[test]
    fn test_locator_needs_a_strategy() {
        let blank = Locator {
            probe: Some("  ".into()),
            fallback_selectors: vec!["".into()],
        };
        assert!(blank.validate().is_err());
        assert!(Locator::selectors::<&str>(&[]).validate().is_err());
        assert!(Locator::selectors(&["#login"]).validate().is_ok());
        assert!(Locator::probe("return null;").validate().is_ok());
    }

    #[test]
    fn test_unsupported_selectors() {
        assert!(!is_supported_selector("ion-button:contains('Login')"));
        assert!(!is_supported_selector("li:eq(2)"));
        assert!(!is_supported_selector("div:visible"));
        assert!(is_supported_selector("li:first-child"));
        assert!(is_supported_selector("ion-item:last-of-type"));
        assert!(is_supported_selector("ion-modal[is-open='true'] ion-input"));
    }

    #[tokio::test]
    async fn test_probe_wins_over_selectors() {
        let state = FakeState::new();
        let via_selector = state.add_element("#submit", FakeElement::new("selector"));
        let via_probe = state.add_element("(none)", FakeElement::new("probe"));
        state.probe_returns("return findLogin();", via_probe);
        let browser = FakeBrowser::new(state.clone());

        let locator = Locator::probe("return findLogin();").with_fallback("#submit");
        let el = resolve(&browser, &locator).await.unwrap();
        assert_eq!(el.id(), via_probe);
        assert_ne!(el.id(), via_selector);
    }

    #[tokio::test]
    async fn test_failing_or_empty_probe_falls_back() {
        let state = FakeState::new();
        let target = state.add_element("#submit", FakeElement::new("submit"));
        state.probe_fails("return broken();", "ReferenceError: broken is not defined");
        state.probe_returns_nothing("return missing();");
        let browser = FakeBrowser::new(state.clone());

        for probe in ["return broken();", "return missing();"] {
            let locator = Locator::probe(probe).with_fallback("#submit");
            assert_eq!(resolve(&browser, &locator).await.unwrap().id(), target);
        }
    }

    #[tokio::test]
    async fn test_detached_probe_result_is_ignored() {
        let state = FakeState::new();
        let stale = state.add_element("(none)", FakeElement::new("stale").detached());
        let target = state.add_element(".btn", FakeElement::new("btn"));
        state.probe_returns("return stale;", stale);
        let browser = FakeBrowser::new(state.clone());

        let locator = Locator::probe("return stale;").with_fallback(".btn");
        assert_eq!(resolve(&browser, &locator).await.unwrap().id(), target);
    }

    #[tokio::test]
    async fn test_fallback_skips_hidden_disabled_and_unsupported() {
        let state = FakeState::new();
        state.add_element(".hidden", FakeElement::new("hidden").hidden());
        state.add_element(".disabled", FakeElement::new("disabled").disabled());
        state.add_element("button:contains('Go')", FakeElement::new("jquery"));
        let target = state.add_element(".ok", FakeElement::new("ok"));
        let browser = FakeBrowser::new(state.clone());

        let locator = Locator::selectors(&[
            ".missing",
            ".hidden",
            ".disabled",
            "button:contains('Go')",
            ".ok",
        ]);
        let el = resolve(&browser, &locator).await.unwrap();
        assert_eq!(el.id(), target);
        assert!(browser.is_visible(&el).await.unwrap());
        assert!(browser.is_enabled(&el).await.unwrap());
    }

    #[tokio::test]
    async fn test_not_found_when_everything_fails() {
        let state = FakeState::new();
        state.add_element(".hidden", FakeElement::new("hidden").hidden());
        let browser = FakeBrowser::new(state.clone());

        let locator = Locator::probe("return null;").with_fallback(".hidden");
        let err = resolve(&browser, &locator).await.unwrap_err();
        assert!(matches!(err, E2eError::ElementNotFound(_)));
        assert!(try_resolve_now(&browser, &locator).await.unwrap().is_none());
        assert!(state.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_resolution_skips_implicit_wait() {
        let state = FakeState::new();
        state.set_implicit_wait(Duration::from_secs(10));
        let target = state.add_element(".ok", FakeElement::new("ok"));
        let browser = FakeBrowser::new(state.clone());
        let locator = Locator::selectors(&[".missing", ".ok"]);

        let start = Instant::now();
        assert_eq!(resolve_now(&browser, &locator).await.unwrap().id(), target);
        assert_eq!(start.elapsed(), Duration::ZERO);

        let start = Instant::now();
        assert_eq!(resolve(&browser, &locator).await.unwrap().id(), target);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
