use anyhow::{Context, Result};
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{Pacing, ScrapeConfig, USER_AGENT};
use crate::error::ScoutError;
use crate::scrapers::traits::{load_or_close, BrowserSession, PageHandle};

const READY_POLL: Duration = Duration::from_millis(250);

/// Browser session backed by headless Chrome
pub struct ChromeSession {
    browser: Browser,
    main: ChromePage,
    config: ScrapeConfig,
}

/// One Chrome tab
pub struct ChromePage {
    tab: Arc<Tab>,
    pacing: Pacing,
}

impl ChromeSession {
    /// Launch Chrome and open the discovery tab
    pub fn launch(config: &ScrapeConfig) -> Result<Self, ScoutError> {
        info!(headless = config.headless, "Launching Chrome...");

        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--lang=es-CL"),
            OsStr::new("--blink-settings=imagesEnabled=false"),
        ];

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(Duration::from_secs(600))
            .args(args)
            .build()
            .context("Failed to build launch options")
            .map_err(ScoutError::BrowserLaunch)?;

        let browser = Browser::new(options)
            .context("Failed to launch Chrome browser")
            .map_err(ScoutError::BrowserLaunch)?;

        let tab = browser
            .new_tab()
            .context("Failed to open discovery tab")
            .map_err(ScoutError::BrowserLaunch)?;
        let main = ChromePage::configure(tab, config).map_err(ScoutError::BrowserLaunch)?;

        Ok(Self {
            browser,
            main,
            config: config.clone(),
        })
    }
}

impl ChromePage {
    fn configure(tab: Arc<Tab>, config: &ScrapeConfig) -> Result<Self> {
        tab.set_default_timeout(config.page_load_timeout);
        tab.set_user_agent(USER_AGENT, Some("es-CL"), None)
            .context("Failed to set user agent")?;
        Ok(Self {
            tab,
            pacing: config.pacing,
        })
    }

    fn evaluate(&self, script: &str) -> Result<Option<Value>> {
        let result = self
            .tab
            .evaluate(script, false)
            .with_context(|| format!("Script failed: {script}"))?;
        Ok(result.value)
    }
}

impl PageHandle for ChromePage {
    fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, "Navigating");
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {url}"))?;
        self.tab
            .wait_until_navigated()
            .with_context(|| format!("Navigation to {url} did not complete"))?;
        self.pacing.settle.pause();
        Ok(())
    }

    fn current_document(&self) -> Result<String> {
        self.tab.get_content().context("Failed to read page HTML")
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    fn title(&self) -> Result<String> {
        self.tab.get_title().context("Failed to read page title")
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> bool {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .is_ok()
    }

    fn wait_for_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(Some(state)) = self.evaluate("document.readyState") {
                if state.as_str() == Some("complete") {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(READY_POLL);
        }
    }

    fn scroll_through(&self, steps: u32) -> Result<()> {
        let height = self
            .evaluate("document.body.scrollHeight")?
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        for step in 1..=steps {
            let y = (f64::from(step) * height / f64::from(steps + 1)) as i64;
            self.evaluate(&format!("window.scrollTo(0, {y});"))?;
            self.pacing.scroll.pause();
        }
        Ok(())
    }

    fn click_first(&self, selectors: &[&str], timeout: Duration) -> bool {
        for selector in selectors {
            if let Ok(element) = self.tab.wait_for_element_with_custom_timeout(selector, timeout) {
                if element.click().is_ok() {
                    return true;
                }
            }
        }
        false
    }

    fn close(&self) -> Result<()> {
        self.tab.close(true).context("Failed to close tab")?;
        Ok(())
    }
}

impl BrowserSession for ChromeSession {
    type Page = ChromePage;

    fn discovery_page(&self) -> &ChromePage {
        &self.main
    }

    fn open_isolated(&self, url: &str) -> Result<ChromePage> {
        let tab = self.browser.new_tab().context("Failed to open listing tab")?;
        let page = match ChromePage::configure(Arc::clone(&tab), &self.config) {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = tab.close(true) {
                    debug!(error = %close_err, "Could not close unconfigured tab");
                }
                return Err(e);
            }
        };
        let page = load_or_close(page, |p| {
            p.tab
                .navigate_to(url)
                .with_context(|| format!("Failed to open {url}"))?;
            Ok(())
        })?;
        self.config.pacing.listing_open.pause();
        Ok(page)
    }

    fn cookies(&self) -> Result<Vec<Value>> {
        let cookies = self.main.tab.get_cookies().context("Failed to read cookies")?;
        cookies
            .into_iter()
            .map(|c| serde_json::to_value(c).context("Failed to serialize cookie"))
            .collect()
    }

    fn set_cookies(&self, cookies: Vec<Value>) -> Result<usize> {
        let mut accepted = 0;
        for cookie in cookies {
            let param: CookieParam = match serde_json::from_value(cookie) {
                Ok(param) => param,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed cookie");
                    continue;
                }
            };
            let name = param.name.clone();
            match self.main.tab.set_cookies(vec![param]) {
                Ok(()) => accepted += 1,
                Err(e) => debug!(cookie = %name, error = %e, "Cookie rejected"),
            }
        }
        Ok(accepted)
    }

    fn reload(&self) -> Result<()> {
        self.main
            .tab
            .reload(false, None)
            .context("Failed to reload page")?;
        self.main
            .tab
            .wait_until_navigated()
            .context("Reload did not complete")?;
        self.config.pacing.settle.pause();
        Ok(())
    }
}
