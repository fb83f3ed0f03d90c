use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::driver::SessionConfig;
use crate::error::E2eError;
use crate::runner::orchestrator::RetryPolicy;

/// Run configuration shared by every workflow in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    /// Base URL of the application under test; relative navigations join it
    pub base_url: String,
    pub test_username: String,
    pub test_password: String,
    pub headless: bool,
    /// Implicit element wait (seconds)
    pub timeout_seconds: u64,
    pub page_load_timeout_seconds: u64,
    /// chromium, firefox or webkit
    pub browser: String,
    pub output_dir: PathBuf,
    /// Defaults to `<output_dir>/screenshots`
    pub screenshot_dir: Option<PathBuf>,
    pub retry: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            test_username: String::new(),
            test_password: String::new(),
            headless: false,
            timeout_seconds: 10,
            page_load_timeout_seconds: 30,
            browser: "chromium".to_string(),
            output_dir: PathBuf::from("./output"),
            screenshot_dir: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layer alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub headless: Option<bool>,
    pub timeout_seconds: Option<u64>,
    pub browser: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub max_attempts: Option<u32>,
    pub retry_delay_seconds: Option<f64>,
}

impl RunConfig {
    /// Defaults, then the YAML file, then `LUMI_*` environment variables,
    /// then command-line overrides. The result is validated.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("LUMI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(username) = var("LUMI_USERNAME") {
            self.test_username = username;
        }
        if let Some(password) = var("LUMI_PASSWORD") {
            self.test_password = password;
        }
        if let Some(headless) = var("LUMI_HEADLESS") {
            self.headless = matches!(headless.trim().to_lowercase().as_str(), "true" | "1");
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref url) = overrides.base_url {
            self.base_url = url.clone();
        }
        if let Some(ref username) = overrides.username {
            self.test_username = username.clone();
        }
        if let Some(ref password) = overrides.password {
            self.test_password = password.clone();
        }
        if let Some(headless) = overrides.headless {
            self.headless = headless;
        }
        if let Some(timeout) = overrides.timeout_seconds {
            self.timeout_seconds = timeout;
        }
        if let Some(ref browser) = overrides.browser {
            self.browser = browser.clone();
        }
        if let Some(ref dir) = overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.retry.max_attempts = max_attempts;
        }
        if let Some(delay) = overrides.retry_delay_seconds {
            self.retry.retry_delay_seconds = delay;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), E2eError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(E2eError::Config("baseUrl must not be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(E2eError::Config(format!(
                "baseUrl must start with http:// or https://, got '{}'",
                url
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(E2eError::Config("timeoutSeconds must be at least 1".to_string()));
        }
        if self.page_load_timeout_seconds == 0 {
            return Err(E2eError::Config(
                "pageLoadTimeoutSeconds must be at least 1".to_string(),
            ));
        }
        if !matches!(
            self.browser.to_lowercase().as_str(),
            "chromium" | "chrome" | "firefox" | "webkit"
        ) {
            return Err(E2eError::Config(format!("unknown browser '{}'", self.browser)));
        }
        self.retry.validate()
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.screenshot_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("screenshots"))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            headless: self.headless,
            implicit_wait: Duration::from_secs(self.timeout_seconds),
            page_load_timeout: Duration::from_secs(self.page_load_timeout_seconds),
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.retry_delay_seconds, 2.0);
        assert_eq!(config.screenshot_dir(), PathBuf::from("./output/screenshots"));
        assert!(config.validate().is_ok());

        let session = config.session_config();
        assert_eq!(session.implicit_wait, Duration::from_secs(10));
        assert_eq!(session.viewport_width, 1920);
    }

    #[test]
    fn test_layer_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "baseUrl: https://staging.example.com\ntestUsername: file-user\nheadless: false\nretry:\n  maxAttempts: 5"
        )
        .unwrap();

        let mut config = RunConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_url, "https://staging.example.com");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.retry_delay_seconds, 2.0);
        assert_eq!(config.page_load_timeout_seconds, 30);

        let env: HashMap<&str, &str> = [("LUMI_USERNAME", "env-user"), ("LUMI_HEADLESS", "1")]
            .into_iter()
            .collect();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.test_username, "env-user");
        assert!(config.headless);

        config.apply_overrides(&ConfigOverrides {
            username: Some("cli-user".into()),
            max_attempts: Some(1),
            ..Default::default()
        });
        assert_eq!(config.test_username, "cli-user");
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.base_url, "https://staging.example.com");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = RunConfig {
            base_url: "ftp://nope".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));

        config.base_url = "http://ok".into();
        config.timeout_seconds = 0;
        assert!(config.validate().is_err());

        config.timeout_seconds = 5;
        config.browser = "netscape".into();
        assert!(config.validate().is_err());

        config.browser = "Firefox".into();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
