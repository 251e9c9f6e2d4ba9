//! Candidate URL discovery over paginated search results.

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ScrapeConfig;
use crate::error::ScoutError;
use crate::scrapers::session::save_cookie_jar;
use crate::scrapers::traits::{BrowserSession, Operator, PageHandle};
use crate::scrapers::types::DiscoveryState;
use crate::scrapers::urls::{is_listing_url, normalize_url, offset_url, on_login_wall};

/// Anchor patterns likely to point at listing pages.
const LINK_SELECTORS: [&str; 5] = [
    "a[href*='/MLC-']",
    "a[href*='/p/']",
    "a[href*='/propiedad/']",
    "li.ui-search-layout__item a",
    "a.ui-search-link",
];

/// Cookie consent buttons, tried in order.
pub const COOKIE_BANNER_SELECTORS: [&str; 4] = [
    "button.cookies-banner__accept-button",
    "button[data-testid='action:understood-button']",
    ".cookie-consent-banner-opt-out__accept",
    "#newCookieDisclaimerButton",
];

static LINK_SELS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    LINK_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});

/// Union of listing-shaped links in a search results document, in
/// first-seen order.
pub fn harvest_links(html: &str, origin: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for selector in LINK_SELS.iter() {
        for anchor in document.select(selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(url) = normalize_url(href, origin) else {
                continue;
            };
            if is_listing_url(&url, origin) && seen.insert(url.clone()) {
                links.push(url);
            }
        }
    }
    links
}

/// Paginates search results and collects unique listing URLs.
pub struct UrlDiscovery<'a, S: BrowserSession> {
    session: &'a S,
    config: &'a ScrapeConfig,
    operator: &'a dyn Operator,
    origin: Url,
}

impl<'a, S: BrowserSession> UrlDiscovery<'a, S> {
    pub fn new(
        session: &'a S,
        config: &'a ScrapeConfig,
        operator: &'a dyn Operator,
    ) -> Result<Self, ScoutError> {
        let origin = Url::parse(&config.origin).map_err(|e| ScoutError::InvalidUrl {
            url: config.origin.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            session,
            config,
            operator,
            origin,
        })
    }

    /// Collect up to `target` listing URLs not present in `skip`.
    ///
    /// Stops at the target, at the offset ceiling, or when a page after the
    /// first shows no listing this run has not already observed.
    ///
    /// # Errors
    ///
    /// Navigation failures abort discovery with [`ScoutError::Navigation`].
    pub fn collect(
        &self,
        search_url: &str,
        target: usize,
        skip: &HashSet<String>,
    ) -> Result<Vec<String>, ScoutError> {
        let mut state = DiscoveryState::new();

        while state.len() < target && state.offset <= self.config.offset_ceiling {
            let page_url = if state.offset == 1 {
                search_url.to_string()
            } else {
                offset_url(search_url, state.offset)?
            };
            info!(page = state.page, url = %page_url, "Loading search results page");

            let html = self.load_results_page(&page_url)?;
            let found = harvest_links(&html, &self.origin);

            let before = state.len();
            let mut fresh = 0usize;
            for url in found {
                if state.observe(&url) {
                    fresh += 1;
                }
                if skip.contains(&url) {
                    continue;
                }
                state.accept(url);
                if state.len() >= target {
                    break;
                }
            }

            info!(
                page = state.page,
                added = state.len() - before,
                total = state.len(),
                target,
                "Collected listing URLs"
            );

            if fresh == 0 && state.page > 1 {
                debug!(page = state.page, "No new listings, end of results");
                break;
            }
            state.advance(self.config.page_size);
        }

        info!(unique = state.len(), "URL discovery finished");
        Ok(state.into_urls())
    }

    fn load_results_page(&self, page_url: &str) -> Result<String, ScoutError> {
        let page = self.session.discovery_page();
        page.navigate(page_url)
            .map_err(|e| ScoutError::navigation(page_url, e))?;

        let title = page.title().unwrap_or_default();
        if on_login_wall(&page.current_url(), &title) {
            warn!(url = %page.current_url(), "Login wall detected, waiting for operator");
            self.operator.await_login(page_url);
            if let Some(jar) = self.config.cookie_jar.as_deref() {
                self.persist_cookies(jar);
            }
            page.navigate(page_url)
                .map_err(|e| ScoutError::navigation(page_url, e))?;
        }

        if page.click_first(&COOKIE_BANNER_SELECTORS, self.config.banner_wait) {
            debug!("Dismissed cookie banner");
        }

        if !page.wait_for(&self.config.results_selector, self.config.results_wait) {
            warn!(url = %page_url, "Timed out waiting for search results");
        }

        if let Err(e) = page.scroll_through(self.config.scroll_steps) {
            warn!(error = %e, "Scrolling search results failed");
        }

        page.current_document()
            .map_err(|e| ScoutError::navigation(page_url, e))
    }

    fn persist_cookies(&self, jar: &Path) {
        match self.session.cookies() {
            Ok(cookies) => {
                if let Err(e) = save_cookie_jar(jar, &cookies) {
                    warn!(error = %e, "Could not save session cookies");
                }
            }
            Err(e) => warn!(error = %e, "Could not read session cookies"),
        }
    }
}
