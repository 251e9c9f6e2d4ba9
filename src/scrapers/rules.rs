//! Extraction rules for listing detail pages.
//!
//! Each field is read by an ordered list of rules, `document -> Option<T>`;
//! the first rule that yields a value wins. Rules are plain functions so
//! each one can be tested against a fragment on its own.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::normalize::to_float;

pub type Rule<T> = fn(&Html) -> Option<T>;

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1.ui-pdp-title").expect("valid selector"));
static BREADCRUMB_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("nav.ui-pdp-breadcrumb a").expect("valid selector"));
static PRICE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.ui-pdp-price").expect("valid selector"));
static FRACTION_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("span.andes-money-amount__fraction").expect("valid selector")
});
static CURRENCY_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("span.andes-money-amount__currency-symbol").expect("valid selector")
});
static SUBHEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));
static ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static TH_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("valid selector"));
static TD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static LOCATION_SUBTITLE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".ui-pdp-location__subtitle").expect("valid selector")
});
static H2_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2").expect("valid selector"));
static PARAGRAPH_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid selector"));

/// Characters allowed between a proximity keyword and its distance.
pub const PROXIMITY_WINDOW: usize = 300;

fn proximity_regex(keyword: &str) -> Regex {
    Regex::new(&format!(
        r"(?is){keyword}.{{0,{PROXIMITY_WINDOW}}}?\d+\s*(?:metros|min)"
    ))
    .expect("valid regex")
}

static EDUCATION_RE: LazyLock<Regex> = LazyLock::new(|| proximity_regex("educaci[óo]n"));
static COMMERCE_RE: LazyLock<Regex> = LazyLock::new(|| proximity_regex("comercios?"));
static HEALTH_RE: LazyLock<Regex> = LazyLock::new(|| proximity_regex("salud"));

/// Canonical fields read from the key facts table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    TotalArea,
    BuiltArea,
    Bedrooms,
    Bathrooms,
    Parking,
    Age,
    Garden,
    Pool,
    Barbecue,
}

impl Attribute {
    /// Map a normalized table key to its field.
    pub fn from_key(key: &str) -> Option<Self> {
        let attribute = match key {
            "superficie total" => Self::TotalArea,
            "superficie útil" | "superficie construida" => Self::BuiltArea,
            "dormitorios" => Self::Bedrooms,
            "baños" => Self::Bathrooms,
            "estacionamientos" => Self::Parking,
            "antigüedad" => Self::Age,
            "jardín" => Self::Garden,
            "piscina" => Self::Pool,
            "quincho" => Self::Barbecue,
            _ => return None,
        };
        Some(attribute)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Affirmative,
    Text(String),
}

/// Key facts of one listing, keyed by canonical field.
#[derive(Debug, Default, Clone)]
pub struct AttributeTable {
    values: HashMap<Attribute, AttributeValue>,
}

impl AttributeTable {
    pub fn insert(&mut self, attribute: Attribute, value: AttributeValue) {
        self.values.insert(attribute, value);
    }

    pub fn text(&self, attribute: Attribute) -> Option<&str> {
        match self.values.get(&attribute)? {
            AttributeValue::Text(text) => Some(text.as_str()),
            AttributeValue::Affirmative => None,
        }
    }

    /// `Some(true)` for an affirmative value, `Some(false)` for any other
    /// value, `None` when the row is missing.
    pub fn flag(&self, attribute: Attribute) -> Option<bool> {
        self.values
            .get(&attribute)
            .map(|v| matches!(v, AttributeValue::Affirmative))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Run `rules` in order and keep the first value produced.
pub fn first_match<T>(document: &Html, rules: &[Rule<T>]) -> Option<T> {
    rules.iter().find_map(|rule| rule(document))
}

pub fn title_from_pdp_heading(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SEL)
        .next()
        .map(element_text)
        .and_then(non_empty)
}

pub fn area_from_breadcrumb(document: &Html) -> Option<String> {
    document
        .select(&BREADCRUMB_SEL)
        .last()
        .map(element_text)
        .and_then(non_empty)
}

/// Price fraction, only when the currency symbol is UF.
pub fn price_in_uf(document: &Html) -> Option<f64> {
    let container = document.select(&PRICE_SEL).next()?;
    let fraction = container.select(&FRACTION_SEL).next()?;
    let currency = container.select(&CURRENCY_SEL).next()?;
    if !element_text(currency).contains("UF") {
        return None;
    }
    to_float(Some(element_text(fraction).as_str()))
}

pub const TITLE_RULES: &[Rule<String>] = &[title_from_pdp_heading];
pub const AREA_RULES: &[Rule<String>] = &[area_from_breadcrumb];
pub const PRICE_RULES: &[Rule<f64>] = &[price_in_uf];

fn is_affirmative(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "sí" | "si")
}

/// Read the table that follows the "principales" heading.
pub fn key_facts(document: &Html) -> AttributeTable {
    let mut table = AttributeTable::default();

    let Some(heading) = document
        .select(&SUBHEADING_SEL)
        .find(|h| h.text().collect::<String>().to_lowercase().contains("principales"))
    else {
        return table;
    };

    let Some(facts) = heading.next_siblings().filter_map(ElementRef::wrap).find(|el| {
        el.value().name() == "table" && el.value().classes().any(|c| c == "andes-table")
    }) else {
        return table;
    };

    for row in facts.select(&ROW_SEL) {
        let (Some(key), Some(value)) = (row.select(&TH_SEL).next(), row.select(&TD_SEL).next())
        else {
            continue;
        };
        let key = element_text(key).to_lowercase();
        let Some(attribute) = Attribute::from_key(&key) else {
            continue;
        };
        let value = element_text(value);
        if is_affirmative(&value) {
            table.insert(attribute, AttributeValue::Affirmative);
        } else {
            table.insert(attribute, AttributeValue::Text(value));
        }
    }
    table
}

/// Amenity flag: the table row when present, else a term anywhere in the page.
pub fn amenity_flag(
    table: &AttributeTable,
    attribute: Attribute,
    raw_lower: &str,
    term: &str,
) -> bool {
    table
        .flag(attribute)
        .unwrap_or_else(|| raw_lower.contains(term))
}

pub fn mentions_condominium(raw_lower: &str) -> bool {
    raw_lower.contains("condominio")
}

pub fn near_education(raw: &str) -> bool {
    EDUCATION_RE.is_match(raw)
}

pub fn near_commerce(raw: &str) -> bool {
    COMMERCE_RE.is_match(raw)
}

pub fn near_health(raw: &str) -> bool {
    HEALTH_RE.is_match(raw)
}

/// Paragraph in the block after the "Ubicación" heading.
pub fn address_from_location_section(document: &Html) -> Option<String> {
    let heading = document
        .select(&H2_SEL)
        .find(|h| h.text().collect::<String>().contains("Ubicación"))?;
    let block = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")?;
    block
        .select(&PARAGRAPH_SEL)
        .next()
        .map(element_text)
        .and_then(non_empty)
}

pub fn address_from_location_subtitle(document: &Html) -> Option<String> {
    document
        .select(&LOCATION_SUBTITLE_SEL)
        .next()
        .map(element_text)
        .and_then(non_empty)
}

/// Last three breadcrumb links joined with " > ", for trails of two or more.
pub fn address_from_breadcrumb(document: &Html) -> Option<String> {
    let parts: Vec<String> = document
        .select(&BREADCRUMB_SEL)
        .map(|a| a.text().collect::<String>())
        .collect();
    if parts.len() <= 1 {
        return None;
    }
    let start = parts.len().saturating_sub(3);
    Some(parts[start..].join(" > "))
}

pub const ADDRESS_RULES: &[Rule<String>] = &[
    address_from_location_section,
    address_from_location_subtitle,
    address_from_breadcrumb,
];

#[cfg(test)]
mod tests {
    use super::*;

    const FACTS: &str = r#"
        <div class="ui-pdp-specs">
          <h3 class="ui-pdp-specs__title">Características principales</h3>
          <p>Ficha</p>
          <table class="andes-table">
            <tr><th>Superficie total</th><td>150 m²</td></tr>
            <tr><th>Superficie útil</th><td>95,5 m²</td></tr>
            <tr><th> Baños </th><td>2</td></tr>
            <tr><th>Jardín</th><td>Sí</td></tr>
            <tr><th>Piscina</th><td>No</td></tr>
            <tr><th>Gastos comunes</th><td>120.000 CLP</td></tr>
          </table>
        </div>"#;

    #[test]
    fn key_facts_maps_known_rows() {
        let doc = Html::parse_document(FACTS);
        let table = key_facts(&doc);
        assert_eq!(table.len(), 5);
        assert_eq!(table.text(Attribute::TotalArea), Some("150 m²"));
        assert_eq!(table.text(Attribute::BuiltArea), Some("95,5 m²"));
        assert_eq!(table.text(Attribute::Bathrooms), Some("2"));
        assert_eq!(table.flag(Attribute::Garden), Some(true));
        assert_eq!(table.flag(Attribute::Pool), Some(false));
        assert_eq!(table.flag(Attribute::Barbecue), None);
    }

    #[test]
    fn key_facts_requires_heading() {
        let html = r#"<table class="andes-table"><tr><th>Baños</th><td>2</td></tr></table>"#;
        assert!(key_facts(&Html::parse_document(html)).is_empty());
    }

    #[test]
    fn key_facts_heading_level_does_not_matter() {
        let html = r#"<section><h2>PRINCIPALES</h2>
            <table class="andes-table"><tr><th>Dormitorios</th><td>3</td></tr></table></section>"#;
        let table = key_facts(&Html::parse_document(html));
        assert_eq!(table.text(Attribute::Bedrooms), Some("3"));

        for level in ["h4", "h5", "h6"] {
            let html = format!(
                r#"<div><{level}>Características principales</{level}>
                <table class="andes-table"><tr><th>Baños</th><td>2</td></tr></table></div>"#
            );
            let table = key_facts(&Html::parse_document(&html));
            assert_eq!(table.len(), 1, "heading {level}");
            assert_eq!(table.text(Attribute::Bathrooms), Some("2"));
        }
    }

    #[test]
    fn price_requires_uf_currency() {
        let uf = r#"<div class="ui-pdp-price"><span class="andes-money-amount__currency-symbol">UF</span>
            <span class="andes-money-amount__fraction">4.350</span></div>"#;
        let clp = r#"<div class="ui-pdp-price"><span class="andes-money-amount__currency-symbol">$</span>
            <span class="andes-money-amount__fraction">185.000.000</span></div>"#;
        assert_eq!(price_in_uf(&Html::parse_document(uf)), Some(4350.0));
        assert_eq!(price_in_uf(&Html::parse_document(clp)), None);
    }

    #[test]
    fn area_uses_last_breadcrumb() {
        let html = r#"<nav class="ui-pdp-breadcrumb"><a>Inicio</a><a>Metropolitana</a><a> Ñuñoa </a></nav>"#;
        let doc = Html::parse_document(html);
        assert_eq!(first_match(&doc, AREA_RULES).as_deref(), Some("Ñuñoa"));
        assert_eq!(first_match(&Html::parse_document("<p></p>"), AREA_RULES), None);
    }

    #[test]
    fn title_requires_pdp_class() {
        let doc = Html::parse_document(r#"<h1>Otro</h1><h1 class="ui-pdp-title"> Casa en venta </h1>"#);
        assert_eq!(first_match(&doc, TITLE_RULES).as_deref(), Some("Casa en venta"));
        let plain = Html::parse_document("<h1>Casa</h1>");
        assert_eq!(first_match(&plain, TITLE_RULES), None);
    }

    #[test]
    fn amenity_flag_prefers_table_over_page_text() {
        let mut table = AttributeTable::default();
        table.insert(Attribute::Pool, AttributeValue::Text("No".into()));
        assert!(!amenity_flag(&table, Attribute::Pool, "con piscina temperada", "piscina"));
        assert!(amenity_flag(&table, Attribute::Barbecue, "amplio quincho", "quincho"));
        assert!(!amenity_flag(&table, Attribute::Garden, "terraza", "jardín"));
    }

    #[test]
    fn proximity_needs_distance_after_keyword() {
        assert!(near_education("Educación: Colegio San Ignacio a 450 metros"));
        assert!(near_commerce("Comercio - Supermercado 5 min caminando"));
        assert!(near_health("<li>Salud</li><li>Clínica Alemana</li><li>12 min</li>"));
        assert!(!near_health("Seguro de salud incluido"));
        assert!(!near_education("450 metros de la educación"));
    }

    #[test]
    fn proximity_window_is_bounded() {
        let far = format!("educación {} 300 metros", "x".repeat(PROXIMITY_WINDOW + 10));
        assert!(!near_education(&far));
    }

    #[test]
    fn address_chain_falls_back_in_order() {
        let section = r#"<h2>Ubicación</h2><div><p>Av. Irarrázaval 3000, Ñuñoa</p></div>
            <div class="ui-pdp-location__subtitle">Ñuñoa, Metropolitana</div>"#;
        let doc = Html::parse_document(section);
        assert_eq!(
            first_match(&doc, ADDRESS_RULES).as_deref(),
            Some("Av. Irarrázaval 3000, Ñuñoa")
        );

        let subtitle = r#"<div class="ui-pdp-location__subtitle"> Ñuñoa, Metropolitana </div>"#;
        assert_eq!(
            first_match(&Html::parse_document(subtitle), ADDRESS_RULES).as_deref(),
            Some("Ñuñoa, Metropolitana")
        );

        let crumbs = r#"<nav class="ui-pdp-breadcrumb"><a>Inicio</a><a>Venta</a><a>Casa</a><a>Ñuñoa</a></nav>"#;
        assert_eq!(
            first_match(&Html::parse_document(crumbs), ADDRESS_RULES).as_deref(),
            Some("Venta > Casa > Ñuñoa")
        );

        let lonely = r#"<nav class="ui-pdp-breadcrumb"><a>Inicio</a></nav>"#;
        assert_eq!(first_match(&Html::parse_document(lonely), ADDRESS_RULES), None);
    }
}
