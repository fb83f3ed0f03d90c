mod driver;

pub use driver::{BrowserType, WebBrowser, WebBrowserFactory};
