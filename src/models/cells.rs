//! Lenient cell coercion for the listing table.
//!
//! Numeric cells that do not parse become absent, boolean cells default to
//! `false`. Booleans are written as `True`/`False`.

use serde::{Deserialize, Deserializer, Serializer};

fn raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

pub(super) fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    raw(deserializer)
}

pub(super) fn float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(raw(deserializer)?
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

pub(super) fn integer<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    // Integer columns may have been written as "3.0" by float-typed tooling.
    Ok(raw(deserializer)?
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64))
}

pub(super) fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(
        raw(deserializer)?.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("true" | "1" | "1.0" | "yes")
    ))
}

#[allow(clippy::trivially_copy_pass_by_ref)]
pub(super) fn write_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "True" } else { "False" })
}
