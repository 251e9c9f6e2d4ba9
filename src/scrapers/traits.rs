use anyhow::Result;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// One browser tab: the narrow set of actions the scrapers need.
///
/// Waits are soft: they report whether the condition was met within the
/// timeout instead of failing.
pub trait PageHandle {
    /// Load `url` and wait for the navigation to settle.
    fn navigate(&self, url: &str) -> Result<()>;

    /// Full rendered HTML of the current document.
    fn current_document(&self) -> Result<String>;

    fn current_url(&self) -> String;

    fn title(&self) -> Result<String>;

    /// Wait until an element matching `selector` exists.
    fn wait_for(&self, selector: &str, timeout: Duration) -> bool;

    /// Wait until `document.readyState` is `complete`.
    fn wait_for_ready(&self, timeout: Duration) -> bool;

    /// Scroll down the page in `steps` increments to trigger lazy loading.
    fn scroll_through(&self, steps: u32) -> Result<()>;

    /// Click the first of `selectors` that shows up within `timeout`.
    fn click_first(&self, selectors: &[&str], timeout: Duration) -> bool;

    fn close(&self) -> Result<()>;
}

/// A browser session owning the discovery tab and able to open isolated
/// tabs for individual listings.
pub trait BrowserSession {
    type Page: PageHandle;

    /// The long-lived tab used for search results pagination.
    fn discovery_page(&self) -> &Self::Page;

    /// Open `url` in a new tab, leaving the discovery tab untouched.
    fn open_isolated(&self, url: &str) -> Result<Self::Page>;

    /// Session cookies in Chrome DevTools protocol shape.
    fn cookies(&self) -> Result<Vec<Value>>;

    /// Inject cookies, returning how many the engine accepted.
    fn set_cookies(&self, cookies: Vec<Value>) -> Result<usize>;

    fn reload(&self) -> Result<()>;
}

/// Out-of-band operator signal used when the site shows a login wall.
pub trait Operator {
    /// Block until the operator reports the login is done.
    fn await_login(&self, page_url: &str);
}

/// Run `load` on a freshly opened page, closing the page when it fails.
pub fn load_or_close<P: PageHandle>(page: P, load: impl FnOnce(&P) -> Result<()>) -> Result<P> {
    match load(&page) {
        Ok(()) => Ok(page),
        Err(e) => {
            if let Err(close_err) = page.close() {
                debug!(error = %close_err, "Could not close page after failed load");
            }
            Err(e)
        }
    }
}
