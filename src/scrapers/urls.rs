//! URL helpers for search pagination and listing classification.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::error::ScoutError;

static OFFSET_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_Desde_\d+").expect("valid regex"));

/// Path fragments of pages that are never a single listing.
const NON_LISTING_MARKERS: [&str; 14] = [
    "_desde_",
    "/listado/",
    "/ayuda",
    "/favoritos",
    "/ofertas",
    "/tiendas-oficiales",
    "/perfil/",
    "/cart/",
    "/auth.",
    "/login",
    "/registration",
    "/buscar",
    "/search",
    "/user/",
];

/// Path fragments that identify a listing detail page.
const LISTING_MARKERS: [&str; 8] = [
    "/mlc-",
    "/mco-",
    "/mcu-",
    "/p/",
    "/propiedad/",
    "/casa-",
    "/venta-",
    "/departamento-",
];

const LOGIN_URL_MARKERS: [&str; 2] = ["auth.mercadolibre", "login"];
const LOGIN_TITLE_MARKERS: [&str; 3] = ["ingresa", "login", "cuenta"];

/// Search URL for a pagination offset.
///
/// Replaces an existing `_Desde_N` path marker or appends one.
pub fn offset_url(search_url: &str, offset: u32) -> Result<String, ScoutError> {
    let mut url = Url::parse(search_url).map_err(|e| ScoutError::InvalidUrl {
        url: search_url.to_string(),
        reason: e.to_string(),
    })?;

    let marker = format!("_Desde_{offset}");
    let path = url.path().to_string();
    let new_path = if OFFSET_MARKER_RE.is_match(&path) {
        OFFSET_MARKER_RE.replace(&path, marker.as_str()).into_owned()
    } else {
        format!("{}/{marker}", path.trim_end_matches('/'))
    };
    url.set_path(&new_path);
    Ok(url.into())
}

/// Strip the fragment and resolve protocol- or root-relative hrefs against `origin`.
pub fn normalize_url(href: &str, origin: &Url) -> Option<String> {
    let href = href.split('#').next().unwrap_or_default().trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("//") {
        return Some(format!("{}:{href}", origin.scheme()));
    }
    if href.starts_with('/') {
        return origin.join(href).ok().map(String::from);
    }
    Some(href.to_string())
}

/// Whether `url` points at a listing detail page on the site of `origin`.
pub fn is_listing_url(url: &str, origin: &Url) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let (Some(host), Some(site)) = (parsed.host_str(), origin.host_str()) else {
        return false;
    };
    if !same_site(host, site) {
        return false;
    }

    // Exclusions apply to the whole URL: auth subdomains and login redirects
    // in the query string are never listings.
    let full = parsed.as_str().to_lowercase();
    if NON_LISTING_MARKERS.iter().any(|m| full.contains(m)) {
        return false;
    }
    let path = parsed.path().to_lowercase();
    LISTING_MARKERS.iter().any(|m| path.contains(m))
}

fn same_site(host: &str, site: &str) -> bool {
    let host = host.to_lowercase();
    let root = site.trim_start_matches("www.").to_lowercase();
    host == root || host.ends_with(&format!(".{root}"))
}

/// Whether the page looks like an authentication wall.
pub fn on_login_wall(current_url: &str, title: &str) -> bool {
    let url = current_url.to_lowercase();
    let title = title.to_lowercase();
    LOGIN_URL_MARKERS.iter().any(|m| url.contains(m))
        || LOGIN_TITLE_MARKERS.iter().any(|m| title.contains(m))
}
