use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::thread;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use portal_scout::scrapers::session::save_cookie_jar;
use portal_scout::scrapers::{
    bootstrap_session, AreaTarget, BrowserSession, ChromeSession, ConsoleOperator, Operator,
    PageHandle,
};
use portal_scout::{
    run_address_enrichment, run_scrape, AddressJob, ScoutError, ScrapeConfig, ScrapeJob,
};

#[derive(Debug, Parser)]
#[command(name = "portal-scout")]
#[command(about = "Scrape property listings from portalinmobiliario.com")]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one area into a CSV table, resuming if it exists
    Scrape(ScrapeArgs),
    /// Scrape every area listed in a JSON file
    Batch(BatchArgs),
    /// Add a street address column to a scraped table
    Addresses(AddressArgs),
    /// Log in manually and save the session cookies
    Login(LoginArgs),
}

#[derive(Debug, Args)]
struct BrowserArgs {
    /// Run Chrome without a window
    #[arg(long)]
    headless: bool,

    /// Cookie jar (JSON) used to reuse a logged-in session
    #[arg(long, env = "PORTAL_SCOUT_COOKIES")]
    cookies: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ScrapeArgs {
    #[arg(long)]
    search_url: String,

    /// Area label used when a listing has no breadcrumb
    #[arg(long)]
    comuna: String,

    #[arg(long, default_value_t = 200)]
    max: usize,

    #[arg(long, default_value = "propiedades.csv")]
    out: PathBuf,

    /// Candidates requested per missing row
    #[arg(long, default_value_t = 1.0)]
    oversample: f64,

    #[command(flatten)]
    browser: BrowserArgs,
}

#[derive(Debug, Args)]
struct BatchArgs {
    /// JSON array of {"nombre", "url"} objects
    #[arg(long)]
    areas: PathBuf,

    #[arg(long, default_value_t = 200)]
    max: usize,

    #[arg(long, default_value = "data/raw")]
    out_dir: PathBuf,

    #[arg(long, default_value_t = 1.0)]
    oversample: f64,

    #[command(flatten)]
    browser: BrowserArgs,
}

#[derive(Debug, Args)]
struct AddressArgs {
    #[arg(long, default_value = "Dataset_viviendas.csv")]
    input: PathBuf,

    #[arg(long, default_value = "Dataset_viviendas_con_direccion.csv")]
    output: PathBuf,

    #[command(flatten)]
    browser: BrowserArgs,
}

#[derive(Debug, Args)]
struct LoginArgs {
    #[arg(long, default_value = "cookies.json")]
    cookies: PathBuf,
}

fn config_for(browser: &BrowserArgs, oversample: f64) -> ScrapeConfig {
    ScrapeConfig {
        headless: browser.headless,
        cookie_jar: browser.cookies.clone(),
        oversample,
        ..ScrapeConfig::default()
    }
}

fn start_session(config: &ScrapeConfig) -> anyhow::Result<ChromeSession> {
    let session = ChromeSession::launch(config)?;
    bootstrap_session(&session, config.cookie_jar.as_deref(), &config.origin)?;
    Ok(session)
}

fn scrape(args: ScrapeArgs) -> anyhow::Result<()> {
    let config = config_for(&args.browser, args.oversample);
    let session = start_session(&config)?;
    let job = ScrapeJob {
        search_url: args.search_url,
        area: args.comuna,
        max_rows: args.max,
        out: args.out,
    };
    let summary = run_scrape(&session, &config, &ConsoleOperator, &job)?;
    println!(
        "Saved {} rows to {} ({} new)",
        summary.rows,
        summary.out.display(),
        summary.accepted
    );
    Ok(())
}

fn batch(args: BatchArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.areas)
        .with_context(|| format!("Failed to read {}", args.areas.display()))?;
    let areas: Vec<AreaTarget> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", args.areas.display()))?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let config = config_for(&args.browser, args.oversample);
    if config.cookie_jar.as_deref().map_or(true, |p| !p.exists()) {
        warn!("No cookie jar found; run `portal-scout login` first for fewer login walls");
    }
    let session = start_session(&config)?;

    let total = areas.len();
    info!(total, "Starting batch");
    for (i, area) in areas.iter().enumerate() {
        info!("({}/{}) Processing {}", i + 1, total, area.nombre);
        let job = ScrapeJob {
            search_url: area.url.clone(),
            area: area.nombre.clone(),
            max_rows: args.max,
            out: args.out_dir.join(area.file_name()),
        };
        match run_scrape(&session, &config, &ConsoleOperator, &job) {
            Ok(summary) => info!(area = %area.nombre, rows = summary.rows, "Area done"),
            Err(e) => error!(area = %area.nombre, error = %e, "Area failed, moving on"),
        }
        if i + 1 < total {
            thread::sleep(config.pacing.between_areas);
        }
    }
    println!("Finished {total} areas");
    Ok(())
}

fn addresses(args: AddressArgs) -> anyhow::Result<()> {
    let config = config_for(&args.browser, 1.0);
    let job = AddressJob {
        input: args.input,
        output: args.output,
    };
    if !job.input.exists() {
        return Err(ScoutError::InputMissing { path: job.input }.into());
    }
    let session = start_session(&config)?;
    let summary = run_address_enrichment(&session, &config, &job)?;
    println!(
        "Saved {} with {} addresses found",
        summary.out.display(),
        summary.found
    );
    Ok(())
}

fn login(args: LoginArgs) -> anyhow::Result<()> {
    let config = ScrapeConfig {
        headless: false,
        ..ScrapeConfig::default()
    };
    let session = ChromeSession::launch(&config)?;
    session.discovery_page().navigate(&config.origin)?;
    ConsoleOperator.await_login(&config.origin);
    let cookies = session.cookies()?;
    save_cookie_jar(&args.cookies, &cookies)?;
    println!("Saved {} cookies to {}", cookies.len(), args.cookies.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Scrape(args) => scrape(args),
        Commands::Batch(args) => batch(args),
        Commands::Addresses(args) => addresses(args),
        Commands::Login(args) => login(args),
    }
}
