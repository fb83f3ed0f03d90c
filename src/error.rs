//! Error taxonomy for workflow execution
//!
//! Every failure raised by the browser layer, the locator, the poller or a
//! step carries an explicit kind. Retry decisions are made from the kind,
//! never from the wrapper a step adds for context.

use thiserror::Error;

/// Result alias used by the driver and runner layers
pub type Result<T> = std::result::Result<T, E2eError>;

#[derive(Debug, Error)]
pub enum E2eError {
    /// Browser session could not be created, configured or torn down
    #[error("browser session error: {0}")]
    Session(String),

    /// Page load failed
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Locator exhausted both the probe and every fallback selector
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// A polled condition was never satisfied
    #[error("condition not satisfied after {attempts} attempts: {description}")]
    ConditionTimeout { description: String, attempts: u32 },

    /// The application itself surfaced an error indicator
    #[error("application reported an error: {0}")]
    ApplicationError(String),

    /// Untagged failure from the browser binding
    #[error("browser driver error: {0}")]
    Driver(String),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failure inside a named step
    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<E2eError>,
    },
}

/// Failure class of an [`E2eError`], independent of step wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Session,
    Navigation,
    ElementNotFound,
    ConditionTimeout,
    ApplicationError,
    Driver,
    InvalidLocator,
    Config,
}

impl E2eError {
    /// Wrap an error with the name of the step it occurred in
    pub fn in_step(step: &str, source: E2eError) -> Self {
        E2eError::Step {
            step: step.to_string(),
            source: Box::new(source),
        }
    }

    /// Build a driver error from any binding error
    pub fn driver(err: impl std::fmt::Display) -> Self {
        E2eError::Driver(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            E2eError::Session(_) => ErrorKind::Session,
            E2eError::Navigation(_) => ErrorKind::Navigation,
            E2eError::ElementNotFound(_) => ErrorKind::ElementNotFound,
            E2eError::ConditionTimeout { .. } => ErrorKind::ConditionTimeout,
            E2eError::ApplicationError(_) => ErrorKind::ApplicationError,
            E2eError::Driver(_) => ErrorKind::Driver,
            E2eError::InvalidLocator(_) => ErrorKind::InvalidLocator,
            E2eError::Config(_) => ErrorKind::Config,
            E2eError::Step { source, .. } => source.kind(),
        }
    }

    /// Innermost error, with step wrappers removed
    pub fn root(&self) -> &E2eError {
        match self {
            E2eError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}
