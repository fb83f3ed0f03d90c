//! Retry decisions for failed attempts

use crate::error::{E2eError, ErrorKind};

/// Substrings that mark an untagged driver failure as environmental
const DRIVER_MARKERS: &[&str] = &[
    "browser",
    "session",
    "connection",
    "disconnected",
    "target closed",
    "timed out waiting for",
    "crash",
];

/// Decides whether a failed attempt is worth repeating.
///
/// Session and navigation failures are retryable. Element, condition,
/// application, locator and configuration failures are terminal: repeating
/// them only hides a real defect. Untagged driver failures are retryable when
/// their message names the session or browser process.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureClassifier;

impl FailureClassifier {
    pub fn is_retryable(&self, error: &E2eError) -> bool {
        match error.kind() {
            ErrorKind::Session | ErrorKind::Navigation => true,
            ErrorKind::Driver => match error.root() {
                E2eError::Driver(message) => has_driver_marker(message),
                _ => false,
            },
            ErrorKind::ElementNotFound
            | ErrorKind::ConditionTimeout
            | ErrorKind::ApplicationError
            | ErrorKind::InvalidLocator
            | ErrorKind::Config => false,
        }
    }
}

fn has_driver_marker(message: &str) -> bool {
    let message = message.to_lowercase();
    DRIVER_MARKERS.iter().any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_kinds() {
        let classifier = FailureClassifier;
        assert!(classifier.is_retryable(&E2eError::Session("could not start chromium".into())));
        assert!(classifier.is_retryable(&E2eError::Navigation("net::ERR_CONNECTION_RESET".into())));
        assert!(!classifier.is_retryable(&E2eError::ElementNotFound("#submit".into())));
        assert!(!classifier.is_retryable(&E2eError::ApplicationError("Wrong password".into())));
        assert!(!classifier.is_retryable(&E2eError::InvalidLocator("empty".into())));
        assert!(!classifier.is_retryable(&E2eError::ConditionTimeout {
            description: "url contains /tabs".into(),
            attempts: 10,
        }));
    }

    #[test]
    fn test_terminal_errors_stay_terminal_even_when_text_mentions_browser() {
        let classifier = FailureClassifier;
        let err = E2eError::ElementNotFound("browser session panel".into());
        assert!(!classifier.is_retryable(&err));
    }

    #[test]
    fn test_driver_errors_use_markers() {
        let classifier = FailureClassifier;
        assert!(classifier.is_retryable(&E2eError::Driver("Target closed".into())));
        assert!(classifier.is_retryable(&E2eError::Driver("Browser has been DISCONNECTED".into())));
        assert!(classifier.is_retryable(&E2eError::Driver("page crashed".into())));
        assert!(!classifier.is_retryable(&E2eError::Driver("TypeError: x is undefined".into())));
    }

    #[test]
    fn test_step_wrapper_is_transparent() {
        let classifier = FailureClassifier;
        let wrapped = E2eError::in_step("Open login", E2eError::Navigation("timeout".into()));
        assert!(classifier.is_retryable(&wrapped));
        let wrapped = E2eError::in_step("Submit", E2eError::Driver("TypeError".into()));
        assert!(!classifier.is_retryable(&wrapped));
    }
}
