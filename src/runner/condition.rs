//! Composable, read-only predicates over the current UI state
//!
//! Conditions are re-evaluated on every poll tick, so evaluating one must
//! not change anything in the page.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::driver::Browser;
use crate::error::Result;
use crate::runner::locator::{self, Locator};

/// Programmatic condition for cases a workflow file cannot express
#[async_trait]
pub trait Predicate: Send + Sync + fmt::Debug {
    async fn check(&self, browser: &dyn Browser) -> Result<bool>;

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    /// In-page script whose result is interpreted for truthiness
    Script(String),
    /// Locator resolves to an attached (probe) or visible and enabled
    /// element, checked without waiting
    Visible(Locator),
    /// Current URL contains any of the patterns
    UrlContains(Vec<String>),
    /// Page text contains the given text, ignoring case
    TextPresent(String),
    /// A displayed element matching `selector` whose text contains a keyword
    Overlay {
        selector: String,
        #[serde(default)]
        keywords: Vec<String>,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
    #[serde(skip)]
    Custom(Arc<dyn Predicate>),
}

impl Condition {
    pub fn script(src: &str) -> Self {
        Condition::Script(src.to_string())
    }

    pub fn custom(predicate: impl Predicate + 'static) -> Self {
        Condition::Custom(Arc::new(predicate))
    }

    pub fn evaluate<'a>(&'a self, browser: &'a dyn Browser) -> BoxFuture<'a, Result<bool>> {
        async move {
            match self {
                Condition::Script(src) => {
                    let value = browser.execute_script(src, Vec::new()).await?;
                    Ok(is_truthy(&value))
                }
                Condition::Visible(target) => {
                    Ok(locator::try_resolve_now(browser, target).await?.is_some())
                }
                Condition::UrlContains(patterns) => {
                    let url = browser.current_url().await?;
                    Ok(patterns.iter().any(|p| url.contains(p.as_str())))
                }
                Condition::TextPresent(text) => {
                    let Some(body) = browser.find_elements("body").await?.into_iter().next() else {
                        return Ok(false);
                    };
                    let page_text = browser.text(&body).await?.to_lowercase();
                    Ok(page_text.contains(&text.to_lowercase()))
                }
                Condition::Overlay { selector, keywords } => {
                    overlay_displayed(browser, selector, keywords).await
                }
                Condition::All(conditions) => {
                    for condition in conditions {
                        if !condition.evaluate(browser).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Condition::Any(conditions) => {
                    for condition in conditions {
                        if condition.evaluate(browser).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Condition::Not(inner) => Ok(!inner.evaluate(browser).await?),
                Condition::Custom(predicate) => predicate.check(browser).await,
            }
        }
        .boxed()
    }

    /// Used in timeout messages
    pub fn describe(&self) -> String {
        match self {
            Condition::Script(_) => "script condition".to_string(),
            Condition::Visible(target) => format!("visible({})", target.describe()),
            Condition::UrlContains(patterns) => format!("url contains {}", patterns.join(" or ")),
            Condition::TextPresent(text) => format!("text '{}' present", text),
            Condition::Overlay { selector, keywords } if keywords.is_empty() => {
                format!("overlay '{}'", selector)
            }
            Condition::Overlay { selector, keywords } => {
                format!("overlay '{}' mentioning {}", selector, keywords.join("/"))
            }
            Condition::All(items) => join_described(items, " and "),
            Condition::Any(items) => join_described(items, " or "),
            Condition::Not(inner) => format!("not {}", inner.describe()),
            Condition::Custom(predicate) => predicate.describe(),
        }
    }
}

fn join_described(items: &[Condition], sep: &str) -> String {
    let parts: Vec<String> = items.iter().map(Condition::describe).collect();
    format!("({})", parts.join(sep))
}

/// JavaScript-style truthiness, with `found`/`success` objects honoured
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) => true,
        Value::Object(map) => match map.get("found").or_else(|| map.get("success")) {
            Some(flag) => is_truthy(flag),
            None => true,
        },
    }
}

async fn overlay_displayed(browser: &dyn Browser, selector: &str, keywords: &[String]) -> Result<bool> {
    for element in browser.find_elements(selector).await? {
        if !browser.is_visible(&element).await? {
            continue;
        }
        if keywords.is_empty() {
            return Ok(true);
        }
        let text = browser.text(&element).await?.to_lowercase();
        if keywords.iter().any(|k| text.contains(&k.to_lowercase())) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Where the application surfaces its own error messages
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBanner {
    /// Script returning the error text, or null/empty when there is none
    #[serde(default)]
    pub probe: Option<String>,
    #[serde(default)]
    pub selectors: Vec<String>,
}

impl ErrorBanner {
    /// Text of the currently displayed error, if any. Lookup failures are
    /// logged and read as "no error".
    pub async fn detect(&self, browser: &dyn Browser) -> Option<String> {
        if let Some(ref probe) = self.probe {
            match browser.execute_script(probe, Vec::new()).await {
                Ok(Value::String(text)) if !text.trim().is_empty() => {
                    return Some(text.trim().to_string());
                }
                Ok(_) => {}
                Err(e) => log::warn!("Error banner probe failed: {}", e),
            }
        }

        for selector in &self.selectors {
            let elements = match browser.find_elements(selector).await {
                Ok(elements) => elements,
                Err(e) => {
                    log::warn!("Error banner lookup '{}' failed: {}", selector, e);
                    continue;
                }
            };
            for element in elements {
                if !browser.is_visible(&element).await.unwrap_or(false) {
                    continue;
                }
                let text = browser.text(&element).await.unwrap_or_default();
                let text = text.trim();
                return (!text.is_empty()).then(|| text.to_string());
            }
        }

        None
    }
}
