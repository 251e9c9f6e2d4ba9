//! Street address lookup for already-scraped listings.

use scraper::Html;
use tracing::warn;

use crate::config::ScrapeConfig;
use crate::scrapers::rules::{first_match, ADDRESS_RULES};
use crate::scrapers::traits::{BrowserSession, PageHandle};

/// Address from a rendered listing document.
pub fn parse_address(html: &str) -> Option<String> {
    first_match(&Html::parse_document(html), ADDRESS_RULES)
}

/// Loads listings in the session's main tab and reads their address.
pub struct AddressScraper<'a, S: BrowserSession> {
    session: &'a S,
    config: &'a ScrapeConfig,
}

impl<'a, S: BrowserSession> AddressScraper<'a, S> {
    pub fn new(session: &'a S, config: &'a ScrapeConfig) -> Self {
        Self { session, config }
    }

    /// Address for `url`, or `None` when the page fails or has none.
    pub fn address_for(&self, url: &str) -> Option<String> {
        let page = self.session.discovery_page();
        if let Err(e) = page.navigate(url) {
            warn!(url, error = %e, "Could not load listing");
            return None;
        }
        if !page.wait_for_ready(self.config.ready_wait) {
            warn!(url, "Page took too long to load");
            return None;
        }
        match page.current_document() {
            Ok(html) => parse_address(&html),
            Err(e) => {
                warn!(url, error = %e, "Could not read listing document");
                None
            }
        }
    }
}
