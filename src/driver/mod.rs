#[cfg(test)]
pub mod fake;
pub mod traits;
pub mod web;

pub use traits::{Browser, BrowserFactory, ElementHandle, SessionConfig};
