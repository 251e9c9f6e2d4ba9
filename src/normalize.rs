//! Numeric normalization for text scraped from listing pages.
//!
//! Listing pages mix Chilean (`1.234,56`) and English (`1,234.56`) number
//! formats, often with units glued on (`120 m²`, `UF 4.500`). Parsing never
//! fails loudly: anything that cannot be read becomes `None`.

/// Parses a number out of free text, guessing which separator is decimal.
///
/// - Only digits, `,` and `.` are kept.
/// - Both separators present: the one that appears last is the decimal
///   separator, the other is a thousands separator.
/// - Only `,`: decimal when at most two digits follow the last comma,
///   otherwise a thousands separator.
/// - Only `.`: thousands separator when it appears more than once or when
///   exactly three digits follow a single occurrence, otherwise decimal.
#[must_use]
pub fn parse_number_smart(text: &str) -> Option<f64> {
    let kept: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if kept.is_empty() {
        return None;
    }

    let has_comma = kept.contains(',');
    let has_period = kept.contains('.');

    let canonical = match (has_comma, has_period) {
        (true, true) => {
            let last_comma = kept.rfind(',')?;
            let last_period = kept.rfind('.')?;
            let (thousands, decimal) = if last_comma > last_period {
                ('.', ',')
            } else {
                (',', '.')
            };
            kept.replace(thousands, "").replace(decimal, ".")
        }
        (true, false) => {
            let tail = kept.rsplit(',').next().unwrap_or_default();
            if tail.len() <= 2 {
                kept.replace(',', ".")
            } else {
                kept.replace(',', "")
            }
        }
        (false, true) => {
            let parts: Vec<&str> = kept.split('.').collect();
            if parts.len() > 2 || (parts.len() == 2 && parts[1].len() == 3) {
                kept.replace('.', "")
            } else {
                kept
            }
        }
        (false, false) => kept,
    };

    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Float field value from raw text.
#[must_use]
pub fn to_float(text: Option<&str>) -> Option<f64> {
    text.and_then(parse_number_smart)
}

/// Integer field value from raw text; fractional parts are truncated.
#[must_use]
pub fn to_int(text: Option<&str>) -> Option<i64> {
    to_float(text).map(|v| v.trunc() as i64)
}
