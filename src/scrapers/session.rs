//! Cookie-jar session bootstrap and the console login prompt.

use serde_json::Value;
use std::io::{self, BufRead};
use std::path::Path;
use tracing::{info, warn};

use crate::error::ScoutError;
use crate::scrapers::traits::{BrowserSession, Operator, PageHandle};

/// Read a cookie jar; `Ok(None)` when the file does not exist.
pub fn load_cookie_jar(path: &Path) -> Result<Option<Vec<Value>>, ScoutError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|e| ScoutError::io(path, e))?;
    let cookies: Vec<Value> =
        serde_json::from_str(&raw).map_err(|e| ScoutError::CookieJar {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
    Ok(Some(cookies))
}

pub fn save_cookie_jar(path: &Path, cookies: &[Value]) -> Result<(), ScoutError> {
    let json = serde_json::to_string_pretty(cookies).map_err(|e| ScoutError::CookieJar {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    std::fs::write(path, json).map_err(|e| ScoutError::io(path, e))?;
    info!(path = %path.display(), count = cookies.len(), "Saved session cookies");
    Ok(())
}

/// Load the cookie jar into the session: open the site root, inject the
/// cookies and reload. A missing jar only logs a warning.
pub fn bootstrap_session<S: BrowserSession>(
    session: &S,
    jar: Option<&Path>,
    origin: &str,
) -> Result<usize, ScoutError> {
    let Some(jar) = jar else {
        warn!("No cookie jar configured, browsing anonymously");
        return Ok(0);
    };
    let Some(mut cookies) = load_cookie_jar(jar)? else {
        warn!(path = %jar.display(), "Cookie jar not found, browsing anonymously");
        return Ok(0);
    };

    session
        .discovery_page()
        .navigate(origin)
        .map_err(|e| ScoutError::navigation(origin, e))?;

    for cookie in &mut cookies {
        if let Some(fields) = cookie.as_object_mut() {
            fields.remove("sameSite");
        }
    }
    let offered = cookies.len();
    let accepted = session.set_cookies(cookies).map_err(|e| ScoutError::CookieJar {
        path: jar.to_path_buf(),
        source: e,
    })?;
    session
        .reload()
        .map_err(|e| ScoutError::navigation(origin, e))?;

    info!(accepted, offered, "Session cookies loaded");
    Ok(accepted)
}

/// Waits for ENTER on stdin.
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn await_login(&self, page_url: &str) {
        info!(url = page_url, "Log in using the browser window, then press ENTER here");
        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            warn!(error = %e, "Could not read from stdin, continuing");
        }
    }
}
