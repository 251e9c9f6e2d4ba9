//! End-to-end runs: listing scrape with resume, and address enrichment.

use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::ScrapeConfig;
use crate::error::ScoutError;
use crate::models::ListingRecord;
use crate::progress::{format_eta, progress_path, EtaTracker, ProgressLog};
use crate::scrapers::{AddressScraper, BrowserSession, ListingExtractor, Operator, UrlDiscovery};
use crate::store::{ListingStore, RawTable};

const TITLE_SNIPPET: usize = 55;

/// One area to scrape.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub search_url: String,
    /// Fallback `comuna` for listings without a breadcrumb.
    pub area: String,
    pub max_rows: usize,
    pub out: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub rows_at_start: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub rows: usize,
    pub out: PathBuf,
}

/// Mutable state of one scrape run.
pub struct RunContext {
    pub seen: HashSet<String>,
    pub rows_at_start: usize,
    pub max_rows: usize,
    pub accepted: usize,
    pub pending: Vec<ListingRecord>,
    pub eta: EtaTracker,
}

impl RunContext {
    pub fn new(store: &ListingStore, max_rows: usize, config: &ScrapeConfig) -> Self {
        Self {
            seen: store.seen_urls(),
            rows_at_start: store.len(),
            max_rows,
            accepted: 0,
            pending: Vec::new(),
            eta: EtaTracker::new(config.eta_window),
        }
    }

    pub fn total_done(&self) -> usize {
        self.rows_at_start + self.accepted
    }

    pub fn remaining(&self) -> usize {
        self.max_rows.saturating_sub(self.total_done())
    }

    pub fn accept(&mut self, record: ListingRecord) {
        self.seen.insert(record.url.clone());
        self.pending.push(record);
        self.accepted += 1;
    }
}

/// Scrape one area into its table, resuming from previous rows.
///
/// # Errors
///
/// Fails on an unreadable table, a navigation fault during discovery, or a
/// failed write. Individual listing failures are logged and skipped.
pub fn run_scrape<S: BrowserSession>(
    session: &S,
    config: &ScrapeConfig,
    operator: &dyn Operator,
    job: &ScrapeJob,
) -> Result<ScrapeSummary, ScoutError> {
    let mut store = ListingStore::open(&job.out, &job.area, job.max_rows)?;
    let mut ctx = RunContext::new(&store, job.max_rows, config);

    if store.is_full() {
        info!(rows = store.len(), max = job.max_rows, "Table already complete");
        return Ok(ScrapeSummary {
            rows_at_start: ctx.rows_at_start,
            candidates: 0,
            accepted: 0,
            rows: store.len(),
            out: job.out.clone(),
        });
    }

    let remaining = store.remaining();
    info!(remaining, max = job.max_rows, "Rows still needed");

    let request = config.candidate_request(remaining);
    let discovery = UrlDiscovery::new(session, config, operator)?;
    let candidates = discovery.collect(&job.search_url, request, &ctx.seen)?;
    let candidates: Vec<String> = candidates
        .into_iter()
        .filter(|u| !ctx.seen.contains(u))
        .collect();
    info!(candidates = candidates.len(), "New candidate URLs");

    let extractor = ListingExtractor::new(session, config);
    for url in &candidates {
        let started = Utc::now();
        let record = extractor.extract(url, &job.area);
        ctx.eta.record(Utc::now() - started);

        let snippet = record
            .as_ref()
            .map(|r| r.title_snippet(TITLE_SNIPPET))
            .unwrap_or_default();
        if let Some(record) = record {
            ctx.accept(record);
        }

        if ctx.total_done() >= job.max_rows {
            info!(done = ctx.total_done(), max = job.max_rows, "Row limit reached");
            break;
        }

        info!(
            "[{:>3}/{}] ETA {} - {}",
            ctx.total_done(),
            job.max_rows,
            format_eta(ctx.eta.eta(ctx.remaining())),
            snippet
        );

        if ctx.pending.len() >= config.checkpoint_every {
            let rows = store.checkpoint(std::mem::take(&mut ctx.pending))?;
            info!(rows, "checkpoint: rows persisted");
        }
    }

    let rows = store.checkpoint(std::mem::take(&mut ctx.pending))?;
    info!(
        rows,
        path = %store.path().display(),
        elapsed = %format_eta(ctx.eta.elapsed()),
        "Saved listing table"
    );
    if rows < job.max_rows {
        warn!(rows, max = job.max_rows, "Fewer rows than requested");
    }

    Ok(ScrapeSummary {
        rows_at_start: ctx.rows_at_start,
        candidates: candidates.len(),
        accepted: ctx.accepted,
        rows,
        out: job.out.clone(),
    })
}

/// Add a `direccion` column to a listing table.
#[derive(Debug, Clone)]
pub struct AddressJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSummary {
    pub resumed: usize,
    pub processed: usize,
    pub found: usize,
    pub out: PathBuf,
}

/// Look up addresses for every input URL, logging each to the progress file.
///
/// # Errors
///
/// Fails when the input is missing or has no `url` column, when the
/// progress log cannot be written, or with
/// [`ScoutError::RowCountMismatch`] when addresses and inputs disagree.
pub fn run_address_enrichment<S: BrowserSession>(
    session: &S,
    config: &ScrapeConfig,
    job: &AddressJob,
) -> Result<AddressSummary, ScoutError> {
    let table = RawTable::read(&job.input)?;
    let urls = table.column("url").ok_or_else(|| ScoutError::MissingColumn {
        path: job.input.clone(),
        column: "url".to_string(),
    })?;

    let log_path = progress_path(&job.output);
    let mut addresses = ProgressLog::read(&log_path)?;
    let resumed = addresses.len();
    if resumed > 0 {
        info!(resumed, "Resuming address lookup");
    }

    let pending: Vec<&String> = urls.iter().skip(resumed).collect();
    let mut processed = 0usize;
    if !pending.is_empty() {
        let scraper = AddressScraper::new(session, config);
        let mut log = ProgressLog::open(&log_path)?;
        let mut eta = EtaTracker::new(config.eta_window);
        let total = pending.len();

        for (i, url) in pending.into_iter().enumerate() {
            let started = Utc::now();
            let address = scraper.address_for(url);
            eta.record(Utc::now() - started);

            log.append(url, address.as_deref())?;
            info!(
                "[{:>3}/{}] ETA {} - {} | {}",
                i + 1,
                total,
                format_eta(eta.eta(total - i - 1)),
                url,
                address.as_deref().unwrap_or("-")
            );
            addresses.push(address);
            processed += 1;
        }
    }

    if addresses.len() != table.len() {
        return Err(ScoutError::RowCountMismatch {
            expected: table.len(),
            actual: addresses.len(),
        });
    }

    table.write_with_column(&job.output, "direccion", &addresses)?;
    let found = addresses.iter().filter(|a| a.is_some()).count();
    info!(path = %job.output.display(), found, rows = table.len(), "Address table saved");

    Ok(AddressSummary {
        resumed,
        processed,
        found,
        out: job.output.clone(),
    })
}
