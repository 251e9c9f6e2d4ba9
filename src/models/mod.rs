use serde::{Deserialize, Serialize};

mod cells;

/// Column order of the persisted listing table.
pub const LISTING_COLUMNS: [&str; 17] = [
    "comuna",
    "titulo",
    "precio_uf",
    "m2_totales",
    "m2_construidos",
    "banos",
    "dormitorios",
    "antiguedad_anos",
    "estacionamientos",
    "jardin",
    "piscina",
    "quincho",
    "condominio_cerrado",
    "educacion",
    "comercios",
    "salud",
    "url",
];

/// One scraped property, keyed by its detail-page URL.
///
/// Field order matches [`LISTING_COLUMNS`]; the CSV writer relies on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(default)]
    pub comuna: String,
    #[serde(default, deserialize_with = "cells::text")]
    pub titulo: Option<String>,
    #[serde(default, deserialize_with = "cells::float")]
    pub precio_uf: Option<f64>,
    #[serde(default, deserialize_with = "cells::float")]
    pub m2_totales: Option<f64>,
    #[serde(default, deserialize_with = "cells::float")]
    pub m2_construidos: Option<f64>,
    #[serde(default, deserialize_with = "cells::integer")]
    pub banos: Option<i64>,
    #[serde(default, deserialize_with = "cells::integer")]
    pub dormitorios: Option<i64>,
    #[serde(default, deserialize_with = "cells::integer")]
    pub antiguedad_anos: Option<i64>,
    #[serde(default, deserialize_with = "cells::integer")]
    pub estacionamientos: Option<i64>,
    #[serde(default, serialize_with = "cells::write_flag", deserialize_with = "cells::flag")]
    pub jardin: bool,
    #[serde(default, serialize_with = "cells::write_flag", deserialize_with = "cells::flag")]
    pub piscina: bool,
    #[serde(default, serialize_with = "cells::write_flag", deserialize_with = "cells::flag")]
    pub quincho: bool,
    #[serde(default, serialize_with = "cells::write_flag", deserialize_with = "cells::flag")]
    pub condominio_cerrado: bool,
    #[serde(default, serialize_with = "cells::write_flag", deserialize_with = "cells::flag")]
    pub educacion: bool,
    #[serde(default, serialize_with = "cells::write_flag", deserialize_with = "cells::flag")]
    pub comercios: bool,
    #[serde(default, serialize_with = "cells::write_flag", deserialize_with = "cells::flag")]
    pub salud: bool,
    pub url: String,
}

impl ListingRecord {
    /// Title cut to `max` characters with a trailing ellipsis, for progress lines.
    pub fn title_snippet(&self, max: usize) -> String {
        let Some(title) = self.titulo.as_deref() else {
            return String::new();
        };
        if title.chars().count() > max {
            let cut: String = title.chars().take(max).collect();
            format!("{cut}…")
        } else {
            title.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_snippet_truncates_long_titles() {
        let record = ListingRecord {
            titulo: Some("Casa amplia en condominio con piscina".to_string()),
            ..ListingRecord::default()
        };
        assert_eq!(record.title_snippet(10), "Casa ampli…");
    }

    #[test]
    fn title_snippet_keeps_short_titles_and_handles_absence() {
        let record = ListingRecord {
            titulo: Some("Depto".to_string()),
            ..ListingRecord::default()
        };
        assert_eq!(record.title_snippet(55), "Depto");
        assert_eq!(ListingRecord::default().title_snippet(55), "");
    }
}
