//! In-memory browser session serving canned HTML.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use portal_scout::config::{Pacing, ScrapeConfig};
use portal_scout::scrapers::{load_or_close, BrowserSession, Operator, PageHandle};

pub const ORIGIN: &str = "https://www.portalinmobiliario.com";
pub const SEARCH_URL: &str =
    "https://www.portalinmobiliario.com/venta/casa/la-reina-metropolitana/_DisplayType_LF";
pub const LOGIN_URL: &str = "https://www.mercadolibre.cl/jms/mlc/lgz/login?platform_id=PI";

pub const LISTING_FULL: &str = include_str!("../fixtures/listing_full.html");
pub const LISTING_NO_BATHROOMS: &str = include_str!("../fixtures/listing_no_bathrooms.html");
pub const LISTING_MINIMAL: &str = include_str!("../fixtures/listing_minimal.html");
pub const LISTING_ADDRESS: &str = include_str!("../fixtures/listing_address.html");
pub const SEARCH_PAGE: &str = include_str!("../fixtures/search_page.html");

pub fn config() -> ScrapeConfig {
    ScrapeConfig {
        pacing: Pacing::immediate(),
        ..ScrapeConfig::default()
    }
}

pub fn listing_url(id: usize) -> String {
    format!("{ORIGIN}/MLC-{id}-propiedad-en-venta-_JM")
}

/// Search results page linking to `urls`.
pub fn results_page(urls: &[String]) -> String {
    let items: String = urls
        .iter()
        .map(|u| {
            format!(
                r#"<li class="ui-search-layout__item"><a class="ui-search-link" href="{u}">Propiedad</a></li>"#
            )
        })
        .collect();
    format!(
        r#"<html><head><title>Resultados</title></head><body>
        <div class="ui-search-results"><ol>{items}</ol></div></body></html>"#
    )
}

/// Listing page that passes the acceptance gate.
pub fn accepted_listing(title: &str, built: u32, bathrooms: u32) -> String {
    format!(
        r#"<html><head><title>{title}</title></head><body>
        <h1 class="ui-pdp-title">{title}</h1>
        <div class="ui-pdp-specs"><h2>Características principales</h2>
        <table class="andes-table">
          <tr><th>Superficie útil</th><td>{built} m²</td></tr>
          <tr><th>Baños</th><td>{bathrooms}</td></tr>
        </table></div></body></html>"#
    )
}

#[derive(Default)]
pub struct FakeSite {
    pub pages: HashMap<String, String>,
    pub titles: HashMap<String, String>,
    /// Navigating here fails like a crashed engine.
    pub broken: HashSet<String>,
    /// The tab opens but loading the URL fails.
    pub unopenable: HashSet<String>,
    /// First visit lands on the login page instead.
    pub login_wall_once: RefCell<HashSet<String>>,
}

impl FakeSite {
    pub fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

#[derive(Default)]
pub struct Journal {
    pub navigations: Vec<String>,
    pub opened: Vec<String>,
    pub closed: usize,
    pub cookies_set: Vec<Value>,
    pub reloads: usize,
    /// Row count of the watched table at each listing open.
    pub table_rows_at_open: Vec<usize>,
}

pub struct FakePage {
    site: Rc<FakeSite>,
    journal: Rc<RefCell<Journal>>,
    current: RefCell<String>,
}

impl FakePage {
    fn document(&self) -> Option<String> {
        let current = self.current.borrow();
        if current.as_str() == LOGIN_URL {
            return Some("<html><head><title>Ingresa a tu cuenta</title></head></html>".into());
        }
        self.site.pages.get(current.as_str()).cloned()
    }
}

impl PageHandle for FakePage {
    fn navigate(&self, url: &str) -> Result<()> {
        self.journal.borrow_mut().navigations.push(url.to_string());
        if self.site.broken.contains(url) {
            return Err(anyhow!("chrome not reachable"));
        }
        if self.site.login_wall_once.borrow_mut().remove(url) {
            *self.current.borrow_mut() = LOGIN_URL.to_string();
        } else {
            *self.current.borrow_mut() = url.to_string();
        }
        Ok(())
    }

    fn current_document(&self) -> Result<String> {
        Ok(self
            .document()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    fn current_url(&self) -> String {
        self.current.borrow().clone()
    }

    fn title(&self) -> Result<String> {
        let current = self.current.borrow();
        if current.as_str() == LOGIN_URL {
            return Ok("Ingresa a tu cuenta".into());
        }
        Ok(self.site.titles.get(current.as_str()).cloned().unwrap_or_default())
    }

    fn wait_for(&self, selector: &str, _timeout: Duration) -> bool {
        let Some(html) = self.document() else {
            return false;
        };
        let Ok(selector) = Selector::parse(selector) else {
            return false;
        };
        Html::parse_document(&html).select(&selector).next().is_some()
    }

    fn wait_for_ready(&self, _timeout: Duration) -> bool {
        self.document().is_some()
    }

    fn scroll_through(&self, _steps: u32) -> Result<()> {
        Ok(())
    }

    fn click_first(&self, _selectors: &[&str], _timeout: Duration) -> bool {
        false
    }

    fn close(&self) -> Result<()> {
        self.journal.borrow_mut().closed += 1;
        Ok(())
    }
}

pub struct FakeSession {
    site: Rc<FakeSite>,
    pub journal: Rc<RefCell<Journal>>,
    main: FakePage,
    watch: Option<PathBuf>,
}

impl FakeSession {
    pub fn new(site: FakeSite) -> Self {
        let site = Rc::new(site);
        let journal = Rc::new(RefCell::new(Journal::default()));
        let main = FakePage {
            site: Rc::clone(&site),
            journal: Rc::clone(&journal),
            current: RefCell::new(String::new()),
        };
        Self {
            site,
            journal,
            main,
            watch: None,
        }
    }

    /// Record the row count of `table` every time a listing is opened.
    pub fn watching(mut self, table: PathBuf) -> Self {
        self.watch = Some(table);
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.journal.borrow().opened.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.journal.borrow().navigations.clone()
    }
}

impl BrowserSession for FakeSession {
    type Page = FakePage;

    fn discovery_page(&self) -> &FakePage {
        &self.main
    }

    fn open_isolated(&self, url: &str) -> Result<FakePage> {
        let rows = self
            .watch
            .as_ref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .map_or(0, |text| text.lines().count().saturating_sub(1));
        {
            let mut journal = self.journal.borrow_mut();
            journal.opened.push(url.to_string());
            journal.table_rows_at_open.push(rows);
        }
        let page = FakePage {
            site: Rc::clone(&self.site),
            journal: Rc::clone(&self.journal),
            current: RefCell::new(url.to_string()),
        };
        load_or_close(page, |_| {
            if self.site.unopenable.contains(url) {
                Err(anyhow!("tab crashed"))
            } else {
                Ok(())
            }
        })
    }

    fn cookies(&self) -> Result<Vec<Value>> {
        Ok(vec![json!({
            "name": "ssid",
            "value": "logged-in",
            "domain": ".portalinmobiliario.com",
            "path": "/",
            "sameSite": "Lax"
        })])
    }

    fn set_cookies(&self, cookies: Vec<Value>) -> Result<usize> {
        let count = cookies.len();
        self.journal.borrow_mut().cookies_set.extend(cookies);
        Ok(count)
    }

    fn reload(&self) -> Result<()> {
        self.journal.borrow_mut().reloads += 1;
        Ok(())
    }
}

/// Operator that returns immediately and counts prompts.
#[derive(Default)]
pub struct CountingOperator {
    pub prompts: Cell<usize>,
}

impl Operator for CountingOperator {
    fn await_login(&self, _page_url: &str) {
        self.prompts.set(self.prompts.get() + 1);
    }
}
