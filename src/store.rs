//! Incremental listing table with atomic rewrites.
//!
//! Every checkpoint merges the pending batch into a fresh snapshot of the
//! whole table, writes it to `<path>.tmp` and renames it over `<path>`. The
//! persisted file is never edited in place.

use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::ScoutError;
use crate::models::{ListingRecord, LISTING_COLUMNS};

/// Existing rows first, then new rows; first occurrence of a URL wins and
/// the result is cut to `max_rows`. Rows without a URL have no identity and
/// are never collapsed.
pub fn merge_rows(
    existing: Vec<ListingRecord>,
    incoming: Vec<ListingRecord>,
    max_rows: usize,
) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    existing
        .into_iter()
        .chain(incoming)
        .filter(|row| row.url.trim().is_empty() || seen.insert(row.url.clone()))
        .take(max_rows)
        .collect()
}

/// `<path>.tmp`, next to the final file so the rename stays on one filesystem.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `rows` to `path` through a temporary file and a rename.
pub fn write_table_atomic(path: &Path, rows: &[ListingRecord]) -> Result<(), ScoutError> {
    let builder = {
        let mut builder = WriterBuilder::new();
        builder.has_headers(false);
        builder
    };
    write_atomic(path, &builder, |writer, tmp| {
        writer
            .write_record(LISTING_COLUMNS)
            .map_err(|e| ScoutError::csv(tmp, e))?;
        for row in rows {
            writer.serialize(row).map_err(|e| ScoutError::csv(tmp, e))?;
        }
        Ok(())
    })
}

/// Fill `<path>.tmp`, sync it and rename it over `path`. The temporary file
/// is removed when any step fails.
fn write_atomic(
    path: &Path,
    builder: &WriterBuilder,
    fill: impl FnOnce(&mut Writer<File>, &Path) -> Result<(), ScoutError>,
) -> Result<(), ScoutError> {
    let tmp = temp_path(path);
    let outcome = write_then_rename(path, &tmp, builder, fill);
    if outcome.is_err() && tmp.exists() {
        if let Err(e) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %e, "Could not remove temporary table");
        }
    }
    outcome
}

fn write_then_rename(
    path: &Path,
    tmp: &Path,
    builder: &WriterBuilder,
    fill: impl FnOnce(&mut Writer<File>, &Path) -> Result<(), ScoutError>,
) -> Result<(), ScoutError> {
    let mut writer = builder
        .from_path(tmp)
        .map_err(|e| ScoutError::csv(tmp, e))?;
    fill(&mut writer, tmp)?;
    let file = writer
        .into_inner()
        .map_err(|e| ScoutError::io(tmp, e.into_error()))?;
    file.sync_all().map_err(|e| ScoutError::io(tmp, e))?;
    fs::rename(tmp, path).map_err(|e| ScoutError::io(path, e))
}

/// Read a persisted table, filling empty `comuna` cells with `area`.
pub fn read_table(path: &Path, area: &str) -> Result<Vec<ListingRecord>, ScoutError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ScoutError::csv(path, e))?;

    let mut rows = Vec::new();
    let mut without_url = 0usize;
    for result in reader.deserialize::<ListingRecord>() {
        let mut row = result.map_err(|e| ScoutError::csv(path, e))?;
        if row.url.trim().is_empty() {
            without_url += 1;
        }
        if row.comuna.trim().is_empty() {
            row.comuna = area.to_string();
        }
        rows.push(row);
    }
    if without_url > 0 {
        warn!(path = %path.display(), rows = without_url, "Rows without url kept as-is");
    }
    Ok(rows)
}

/// The persisted listing table of one area.
#[derive(Debug)]
pub struct ListingStore {
    path: PathBuf,
    area: String,
    max_rows: usize,
    rows: Vec<ListingRecord>,
}

impl ListingStore {
    /// Open the table at `path`, loading previous rows when it exists.
    pub fn open(path: &Path, area: &str, max_rows: usize) -> Result<Self, ScoutError> {
        let rows = if path.exists() {
            let rows = read_table(path, area)?;
            info!(path = %path.display(), rows = rows.len(), "Resuming from existing table");
            rows
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            area: area.to_string(),
            max_rows,
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[ListingRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.max_rows
    }

    /// Rows still needed to reach the maximum.
    pub fn remaining(&self) -> usize {
        self.max_rows.saturating_sub(self.rows.len())
    }

    pub fn seen_urls(&self) -> HashSet<String> {
        self.rows
            .iter()
            .filter(|r| !r.url.trim().is_empty())
            .map(|r| r.url.clone())
            .collect()
    }

    /// Merge a batch and rewrite the table. Returns the persisted row count.
    pub fn checkpoint(&mut self, batch: Vec<ListingRecord>) -> Result<usize, ScoutError> {
        let batch = batch
            .into_iter()
            .map(|mut row| {
                if row.comuna.trim().is_empty() {
                    row.comuna = self.area.clone();
                }
                row
            })
            .collect();
        self.rows = merge_rows(std::mem::take(&mut self.rows), batch, self.max_rows);
        write_table_atomic(&self.path, &self.rows)?;
        debug!(path = %self.path.display(), rows = self.rows.len(), "Table written");
        Ok(self.rows.len())
    }
}

/// A headed CSV kept as raw string records.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: StringRecord,
    pub records: Vec<StringRecord>,
}

impl RawTable {
    pub fn read(path: &Path) -> Result<Self, ScoutError> {
        if !path.exists() {
            return Err(ScoutError::InputMissing {
                path: path.to_path_buf(),
            });
        }
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| ScoutError::csv(path, e))?;
        let headers = reader
            .headers()
            .map_err(|e| ScoutError::csv(path, e))?
            .clone();
        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ScoutError::csv(path, e))?;
        Ok(Self { headers, records })
    }

    /// Values of column `name`, empty strings for short rows.
    pub fn column(&self, name: &str) -> Option<Vec<String>> {
        let index = self.headers.iter().position(|h| h == name)?;
        Some(
            self.records
                .iter()
                .map(|r| r.get(index).unwrap_or_default().to_string())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the table plus one extra column, atomically.
    pub fn write_with_column(
        &self,
        path: &Path,
        name: &str,
        values: &[Option<String>],
    ) -> Result<(), ScoutError> {
        let builder = {
            let mut builder = WriterBuilder::new();
            builder.flexible(true);
            builder
        };
        write_atomic(path, &builder, |writer, tmp| {
            let mut headers = self.headers.clone();
            headers.push_field(name);
            writer
                .write_record(&headers)
                .map_err(|e| ScoutError::csv(tmp, e))?;
            for (record, value) in self.records.iter().zip(values) {
                let mut row = record.clone();
                row.push_field(value.as_deref().unwrap_or_default());
                writer
                    .write_record(&row)
                    .map_err(|e| ScoutError::csv(tmp, e))?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> ListingRecord {
        ListingRecord {
            comuna: "Macul".into(),
            m2_construidos: Some(60.0),
            m2_totales: Some(60.0),
            banos: Some(1),
            dormitorios: Some(2),
            antiguedad_anos: Some(0),
            url: url.into(),
            ..ListingRecord::default()
        }
    }

    #[test]
    fn merge_keeps_existing_first_and_drops_duplicates() {
        let merged = merge_rows(
            vec![record("a"), record("b")],
            vec![record("b"), record("c"), record("c")],
            10,
        );
        let urls: Vec<_> = merged.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["a", "b", "c"]);
    }

    #[test]
    fn merge_truncates_tail() {
        let merged = merge_rows(vec![record("a"), record("b")], vec![record("c")], 2);
        let urls: Vec<_> = merged.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["a", "b"]);
    }

    #[test]
    fn table_roundtrips_with_absent_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macul.csv");
        let mut row = record("https://www.portalinmobiliario.com/MLC-1");
        row.titulo = Some("Depto, con \"vista\"".into());
        row.precio_uf = None;
        row.estacionamientos = None;
        row.piscina = true;

        write_table_atomic(&path, &[row.clone()]).unwrap();
        assert!(!temp_path(&path).exists());

        let back = read_table(&path, "Macul").unwrap();
        assert_eq!(back, vec![row]);
    }

    #[test]
    fn table_header_and_boolean_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_table_atomic(&path, &[record("u1")]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), LISTING_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "Macul,,,60.0,60.0,1,2,0,,False,False,False,False,False,False,False,u1"
        );
    }

    #[test]
    fn empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_table_atomic(&path, &[]).unwrap();
        assert!(read_table(&path, "Macul").unwrap().is_empty());
        assert!(fs::read_to_string(&path).unwrap().starts_with("comuna,titulo"));
    }

    #[test]
    fn read_coerces_loose_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loose.csv");
        fs::write(
            &path,
            "url,comuna,banos,m2_construidos,piscina,precio_uf\n\
             u1,,2.0,abc,True,\n\
             u2,Renca,x,55,false,3100.5\n",
        )
        .unwrap();
        let rows = read_table(&path, "Quilicura").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].comuna, "Quilicura");
        assert_eq!(rows[0].banos, Some(2));
        assert_eq!(rows[0].m2_construidos, None);
        assert!(rows[0].piscina);
        assert!(!rows[0].salud);
        assert_eq!(rows[1].comuna, "Renca");
        assert_eq!(rows[1].banos, None);
        assert_eq!(rows[1].precio_uf, Some(3100.5));
    }

    #[test]
    fn checkpoint_merges_writes_and_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.csv");
        let mut store = ListingStore::open(&path, "Macul", 3).unwrap();
        assert!(store.is_empty());

        assert_eq!(store.checkpoint(vec![record("a"), record("b")]).unwrap(), 2);
        assert_eq!(
            store.checkpoint(vec![record("b"), record("c"), record("d")]).unwrap(),
            3
        );
        assert!(store.is_full());

        let reopened = ListingStore::open(&path, "Macul", 3).unwrap();
        let urls: Vec<_> = reopened.rows().iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["a", "b", "c"]);
        assert_eq!(reopened.remaining(), 0);
    }

    #[test]
    fn checkpoint_fills_missing_area() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.csv");
        let mut store = ListingStore::open(&path, "Macul", 5).unwrap();
        let mut row = record("a");
        row.comuna = String::new();
        store.checkpoint(vec![row]).unwrap();
        assert_eq!(store.rows()[0].comuna, "Macul");
    }

    #[test]
    fn raw_table_appends_column() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        fs::write(&input, "comuna,url\nMacul,u1\nRenca,u2\n").unwrap();

        let table = RawTable::read(&input).unwrap();
        assert_eq!(table.column("url").unwrap(), ["u1", "u2"]);
        table
            .write_with_column(&output, "direccion", &[Some("Av. Macul 100".into()), None])
            .unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "comuna,url,direccion\nMacul,u1,Av. Macul 100\nRenca,u2,\n"
        );
    }

    #[test]
    fn rows_without_url_survive_reload_and_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        fs::write(
            &path,
            "comuna,banos,m2_construidos,url\n\
             Macul,1,50,u1\n\
             Macul,2,70,\n\
             Macul,1,40,u2\n",
        )
        .unwrap();

        let mut store = ListingStore::open(&path, "Macul", 10).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.seen_urls().len(), 2);
        store.checkpoint(vec![record("u3")]).unwrap();

        let rows = read_table(&path, "Macul").unwrap();
        let urls: Vec<_> = rows.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["u1", "", "u2", "u3"]);
        assert_eq!(rows[1].banos, Some(2));
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in place of the table makes the final rename fail.
        let path = dir.path().join("blocked.csv");
        fs::create_dir(&path).unwrap();

        let err = write_table_atomic(&path, &[record("u1")]).unwrap_err();

        assert!(matches!(err, ScoutError::Io { .. }));
        assert!(!temp_path(&path).exists());
        assert!(path.is_dir());
    }

    #[test]
    fn raw_table_missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RawTable::read(&dir.path().join("nope.csv")),
            Err(ScoutError::InputMissing { .. })
        ));
    }
}
