use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ServiceError;
use crate::models::{Bar, CleanBar, Resolution};

/// Which of the two per-symbol tables to address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Raw,
    Clean,
}

impl SeriesKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "raw" => Some(SeriesKind::Raw),
            "clean" => Some(SeriesKind::Clean),
            _ => None,
        }
    }

    fn dir(&self) -> &'static str {
        match self {
            SeriesKind::Raw => "raw",
            SeriesKind::Clean => "clean",
        }
    }
}

/// File-backed store of raw and clean series
///
/// Layout under the data directory:
///
/// ```text
/// 5minutecharts/raw/AAPL_5min.csv
/// 5minutecharts/clean/AAPL_5min_clean.csv
/// dailycharts/raw/AAPL_1day.csv
/// ```
///
/// Each CSV has a tab-separated `.tsv` export next to it for spreadsheet use.
/// All methods are blocking; async callers go through `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: PathBuf,
}

impl SeriesStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the primary CSV table for a series
    pub fn path(&self, symbol: &str, resolution: Resolution, kind: SeriesKind) -> PathBuf {
        let freq = resolution.provider_interval();
        let file_name = match kind {
            SeriesKind::Raw => format!("{}_{}.csv", symbol, freq),
            SeriesKind::Clean => format!("{}_{}_clean.csv", symbol, freq),
        };
        self.root
            .join(resolution.chart_dir())
            .join(kind.dir())
            .join(file_name)
    }

    pub fn read_raw(&self, symbol: &str, resolution: Resolution) -> Result<Vec<Bar>, ServiceError> {
        read_table(&self.path(symbol, resolution, SeriesKind::Raw))
    }

    pub fn read_clean(&self, symbol: &str, resolution: Resolution) -> Result<Vec<CleanBar>, ServiceError> {
        read_table(&self.path(symbol, resolution, SeriesKind::Clean))
    }

    /// Timestamp of the last clean row, the sync cursor of a series
    pub fn tail_timestamp(
        &self,
        symbol: &str,
        resolution: Resolution,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let clean = self.read_clean(symbol, resolution)?;
        Ok(clean.last().map(|row| row.timestamp))
    }

    /// Replace both tables of a series
    ///
    /// The CSV tables are written to a temporary file and renamed into place.
    /// The spreadsheet exports are best-effort: a failure is logged only.
    pub fn write_series(
        &self,
        symbol: &str,
        resolution: Resolution,
        raw: &[Bar],
        clean: &[CleanBar],
    ) -> Result<(), ServiceError> {
        let raw_path = self.path(symbol, resolution, SeriesKind::Raw);
        let clean_path = self.path(symbol, resolution, SeriesKind::Clean);

        write_table_atomic(&raw_path, raw)?;
        write_table_atomic(&clean_path, clean)?;

        for (path, result) in [
            (&raw_path, export_tsv(&raw_path, raw)),
            (&clean_path, export_tsv(&clean_path, clean)),
        ] {
            if let Err(e) = result {
                tracing::warn!("⚠️  Spreadsheet export for {} failed: {}", path.display(), e);
            }
        }

        tracing::debug!(
            "💾 Wrote {} raw / {} clean rows for {} {}",
            raw.len(),
            clean.len(),
            symbol,
            resolution
        );
        Ok(())
    }
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ServiceError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

fn write_table_atomic<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ServiceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn export_tsv<T: Serialize>(csv_path: &Path, rows: &[T]) -> Result<(), ServiceError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(csv_path.with_extension("tsv"))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
