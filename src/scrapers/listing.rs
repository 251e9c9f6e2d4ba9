//! Listing detail page extraction and the acceptance gate.

use anyhow::{Context, Result};
use scraper::Html;
use tracing::{debug, warn};

use crate::config::ScrapeConfig;
use crate::models::ListingRecord;
use crate::normalize::{to_float, to_int};
use crate::scrapers::rules::{
    amenity_flag, first_match, key_facts, mentions_condominium, near_commerce, near_education,
    near_health, Attribute, AREA_RULES, PRICE_RULES, TITLE_RULES,
};
use crate::scrapers::traits::{BrowserSession, PageHandle};

const DEFAULT_BEDROOMS: i64 = 1;
const DEFAULT_AGE_YEARS: i64 = 0;

/// Why a listing page produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingBuiltArea,
    MissingBathrooms,
}

/// Build a record from a rendered listing document.
///
/// Rejects listings without built area or bathroom count. Fills the total
/// area from the built area and defaults bedrooms to 1 and age to 0.
pub fn parse_listing(
    html: &str,
    url: &str,
    fallback_area: &str,
) -> std::result::Result<ListingRecord, Rejection> {
    let document = Html::parse_document(html);

    let titulo = first_match(&document, TITLE_RULES);
    let comuna =
        first_match(&document, AREA_RULES).unwrap_or_else(|| fallback_area.to_string());
    let precio_uf = first_match(&document, PRICE_RULES);

    let facts = key_facts(&document);
    let m2_construidos = to_float(facts.text(Attribute::BuiltArea))
        .ok_or(Rejection::MissingBuiltArea)?;
    let banos = to_int(facts.text(Attribute::Bathrooms)).ok_or(Rejection::MissingBathrooms)?;

    let m2_totales = to_float(facts.text(Attribute::TotalArea)).or(Some(m2_construidos));
    let dormitorios = to_int(facts.text(Attribute::Bedrooms)).or(Some(DEFAULT_BEDROOMS));
    let antiguedad_anos = to_int(facts.text(Attribute::Age)).or(Some(DEFAULT_AGE_YEARS));
    let estacionamientos = to_int(facts.text(Attribute::Parking));

    let raw_lower = html.to_lowercase();

    Ok(ListingRecord {
        comuna,
        titulo,
        precio_uf,
        m2_totales,
        m2_construidos: Some(m2_construidos),
        banos: Some(banos),
        dormitorios,
        antiguedad_anos,
        estacionamientos,
        jardin: amenity_flag(&facts, Attribute::Garden, &raw_lower, "jardín"),
        piscina: amenity_flag(&facts, Attribute::Pool, &raw_lower, "piscina"),
        quincho: amenity_flag(&facts, Attribute::Barbecue, &raw_lower, "quincho"),
        condominio_cerrado: mentions_condominium(&raw_lower),
        educacion: near_education(html),
        comercios: near_commerce(html),
        salud: near_health(html),
        url: url.to_string(),
    })
}

/// Opens each listing in its own tab and extracts a record.
pub struct ListingExtractor<'a, S: BrowserSession> {
    session: &'a S,
    config: &'a ScrapeConfig,
}

impl<'a, S: BrowserSession> ListingExtractor<'a, S> {
    pub fn new(session: &'a S, config: &'a ScrapeConfig) -> Self {
        Self { session, config }
    }

    /// Extract one listing; `None` when it is rejected or fails to load.
    /// Failures never escape this call.
    pub fn extract(&self, url: &str, fallback_area: &str) -> Option<ListingRecord> {
        let page = match self.session.open_isolated(url) {
            Ok(page) => page,
            Err(e) => {
                warn!(url, error = %e, "Could not open listing");
                return None;
            }
        };

        let outcome = self.read_listing(&page, url, fallback_area);

        if let Err(e) = page.close() {
            debug!(url, error = %e, "Could not close listing tab");
        }

        match outcome {
            Ok(record) => record,
            Err(e) => {
                warn!(url, error = %e, "Listing extraction failed");
                None
            }
        }
    }

    fn read_listing(
        &self,
        page: &S::Page,
        url: &str,
        fallback_area: &str,
    ) -> Result<Option<ListingRecord>> {
        if !page.wait_for(&self.config.heading_selector, self.config.heading_wait) {
            debug!(url, "Heading never rendered, skipping");
            return Ok(None);
        }
        let html = page
            .current_document()
            .with_context(|| format!("Failed to read document for {url}"))?;

        match parse_listing(&html, url, fallback_area) {
            Ok(record) => Ok(Some(record)),
            Err(reason) => {
                debug!(url, ?reason, "Listing rejected");
                Ok(None)
            }
        }
    }
}
