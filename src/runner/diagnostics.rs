//! Best-effort failure artifacts
//!
//! Capture never fails the caller: every problem is logged and reported as
//! "no artifact".

use std::path::PathBuf;

use crate::driver::Browser;

/// Writes viewport screenshots as `{context}_{unix_timestamp}.png`
#[derive(Debug, Clone)]
pub struct ScreenshotCapture {
    dir: PathBuf,
}

impl ScreenshotCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn capture(&self, browser: &dyn Browser, context: &str) -> Option<PathBuf> {
        let bytes = match browser.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Screenshot failed for {}: {}", context, e);
                return None;
            }
        };

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            log::warn!(
                "Cannot create screenshot directory {}: {}",
                self.dir.display(),
                e
            );
            return None;
        }

        let filename = format!(
            "{}_{}.png",
            sanitize(context),
            chrono::Utc::now().timestamp()
        );
        let path = self.dir.join(filename);
        match std::fs::write(&path, bytes) {
            Ok(()) => {
                log::info!("Saved screenshot: {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("Cannot write screenshot {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn sanitize(context: &str) -> String {
    context
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' => '_',
            c => c,
        })
        .collect()
}
