//! Run-wide tunables for the scraper.
//!
//! Every timeout, pause and batch size lives here so the pipeline stages
//! never hard-code them. The command line only overrides a handful of
//! fields; the rest keep their defaults.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use rand::Rng;

/// Canonical origin of the target site.
pub const SITE_ORIGIN: &str = "https://www.portalinmobiliario.com";

/// Desktop Chrome user agent presented to the site.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124 Safari/537.36";

/// Uniform random pause between two bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PauseRange {
    pub min: Duration,
    pub max: Duration,
}

impl PauseRange {
    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub const fn none() -> Self {
        Self::millis(0, 0)
    }

    pub fn sample(&self) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        if hi <= lo {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    pub fn pause(&self) {
        let wait = self.sample();
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
}

/// Human-like pacing applied by the browser session.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// After every top-level navigation.
    pub settle: PauseRange,
    /// Between incremental scroll steps.
    pub scroll: PauseRange,
    /// After opening a listing in its own tab.
    pub listing_open: PauseRange,
    /// Between areas of a batch run.
    pub between_areas: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: PauseRange::millis(2_000, 3_500),
            scroll: PauseRange::millis(600, 1_200),
            listing_open: PauseRange::millis(700, 1_500),
            between_areas: Duration::from_secs(5),
        }
    }
}

impl Pacing {
    /// No pauses at all; used by tests and fake sessions.
    pub fn immediate() -> Self {
        Self {
            settle: PauseRange::none(),
            scroll: PauseRange::none(),
            listing_open: PauseRange::none(),
            between_areas: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub origin: String,
    /// Listings per search results page; the pagination offset step.
    pub page_size: u32,
    /// Highest pagination offset that will be requested.
    pub offset_ceiling: u32,
    pub results_selector: String,
    pub results_wait: Duration,
    pub heading_selector: String,
    pub heading_wait: Duration,
    pub ready_wait: Duration,
    pub banner_wait: Duration,
    pub page_load_timeout: Duration,
    /// Accepted records between two persisted checkpoints.
    pub checkpoint_every: usize,
    /// Multiplier applied to the remaining row budget when requesting candidates.
    pub oversample: f64,
    pub scroll_steps: u32,
    /// Number of recent items averaged for the ETA.
    pub eta_window: usize,
    pub pacing: Pacing,
    pub headless: bool,
    pub cookie_jar: Option<PathBuf>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            origin: SITE_ORIGIN.to_string(),
            page_size: 48,
            offset_ceiling: 5_000,
            results_selector: "div.ui-search-results".to_string(),
            results_wait: Duration::from_secs(15),
            heading_selector: "h1".to_string(),
            heading_wait: Duration::from_secs(20),
            ready_wait: Duration::from_secs(10),
            banner_wait: Duration::from_secs(4),
            page_load_timeout: Duration::from_secs(60),
            checkpoint_every: 25,
            oversample: 1.0,
            scroll_steps: 4,
            eta_window: 10,
            pacing: Pacing::default(),
            headless: true,
            cookie_jar: None,
        }
    }
}

impl ScrapeConfig {
    /// Number of candidate URLs to discover for a remaining row budget.
    pub fn candidate_request(&self, remaining: usize) -> usize {
        let factor = if self.oversample.is_finite() && self.oversample >= 1.0 {
            self.oversample
        } else {
            1.0
        };
        (remaining as f64 * factor).ceil() as usize
    }
}
