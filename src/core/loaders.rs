//! Loaders for the DOE Analysis and ParamCurrent CSV exports.
//!
//! Analysis files are read restricted to the requested columns and grouped by
//! (weld identifier, DOE). ParamCurrent files are read in full and grouped by
//! (schedule identifier, DOE), keeping only the time index, current and
//! schedule identifier. Both are concatenated across DOEs and sorted by
//! (time index, schedule identifier) before grouping.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use log::debug;
use thiserror::Error;

use super::table::{Cell, Table};
use crate::config::ColumnConfig;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Invalid time index \"{raw}\" in {path} at line {line}")]
    InvalidTimeIndex {
        path: PathBuf,
        line: u64,
        raw: String,
    },

    #[error("Invalid current value \"{raw}\" in {path} at line {line}")]
    InvalidCurrent {
        path: PathBuf,
        line: u64,
        raw: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Key of one weld's rows: (weld identifier, DOE).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeldKey {
    pub weld_id: Cell,
    pub dataset: Cell,
}

impl WeldKey {
    /// Output record name, `"{DOE}, {weld}"`.
    pub fn record_name(&self) -> String {
        format!("{}, {}", self.dataset, self.weld_id)
    }
}

/// Key of one schedule's rows: (schedule identifier, DOE).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleKey {
    pub schedule_id: Cell,
    pub dataset: Cell,
}

/// Commanded current trace of one schedule, ordered by time index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleTrace {
    /// Time index of each sample.
    pub msec: Vec<i64>,
    /// Commanded current of each sample.
    pub current: Vec<f64>,
    /// Schedule identifier of each sample.
    pub schedule_id: Vec<Cell>,
}

impl ScheduleTrace {
    #[inline]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    fn push(&mut self, msec: i64, current: f64, schedule_id: Cell) {
        self.msec.push(msec);
        self.current.push(current);
        self.schedule_id.push(schedule_id);
    }
}

/// Analysis rows grouped by weld, in key order.
pub type AnalysisGroups = BTreeMap<WeldKey, Table>;

/// Schedule traces grouped by schedule, in key order.
pub type ScheduleGroups = BTreeMap<ScheduleKey, ScheduleTrace>;

/// Everything the loader produces for one batch.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub welds: AnalysisGroups,
    pub schedules: ScheduleGroups,
}

fn open_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file)))
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> LoaderError + '_ {
    move |e| LoaderError::Csv {
        path: path.to_path_buf(),
        source: e,
    }
}

/// Read the header row and the first data row of a CSV file as raw strings.
///
/// Used to compare header layouts across DOEs and to find columns that hold
/// data. Files with fewer than two rows are rejected as empty.
pub fn read_header_rows<P: AsRef<Path>>(path: P) -> Result<(Vec<String>, Vec<String>)> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let headers = reader.headers().map_err(csv_error(path))?.clone();

    let mut first = StringRecord::new();
    let has_row = reader.read_record(&mut first).map_err(csv_error(path))?;
    if headers.is_empty() || !has_row {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok((
        headers.iter().map(str::to_string).collect(),
        first.iter().map(str::to_string).collect(),
    ))
}

/// Read only the header row of a CSV file.
pub fn read_header_row<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let headers = reader.headers().map_err(csv_error(path))?;
    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(headers.iter().map(str::to_string).collect())
}

fn require_column(path: &Path, headers: &StringRecord, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| LoaderError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
}

fn parse_time_index(path: &Path, record: &StringRecord, idx: usize) -> Result<i64> {
    let raw = record.get(idx).unwrap_or_default();
    Cell::parse(raw)
        .as_i64()
        .ok_or_else(|| LoaderError::InvalidTimeIndex {
            path: path.to_path_buf(),
            line: record.position().map_or(0, |p| p.line()),
            raw: raw.to_string(),
        })
}

/// A loaded row plus the keys it is sorted by.
struct SortableRow<K, T> {
    msec: K,
    schedule_id: Cell,
    row: T,
}

fn sort_rows<K: Ord, T>(rows: &mut [SortableRow<K, T>]) {
    // Stable, so file order breaks ties.
    rows.sort_by(|a, b| {
        a.msec
            .cmp(&b.msec)
            .then_with(|| a.schedule_id.cmp(&b.schedule_id))
    });
}

/// Load and group Analysis rows from every file.
///
/// Columns are restricted to `headers` and kept in the column order of the
/// first file. Every requested header must exist in every file. Rows with a
/// blank weld identifier or DOE number are not assigned to any group.
///
/// Time index values are sorted as cells and not validated here, so a blank
/// or fractional value only fails the weld it belongs to.
pub fn load_analysis(
    paths: &[PathBuf],
    headers: &BTreeSet<String>,
    columns: &ColumnConfig,
) -> Result<AnalysisGroups> {
    let mut projection: Option<Vec<String>> = None;
    let mut rows: Vec<SortableRow<Cell, Vec<Cell>>> = Vec::new();

    for path in paths {
        let mut reader = open_reader(path)?;
        let file_headers = reader.headers().map_err(csv_error(path))?.clone();

        for header in headers {
            require_column(path, &file_headers, header)?;
        }

        let names = projection.get_or_insert_with(|| {
            file_headers
                .iter()
                .filter(|h| headers.contains(*h))
                .map(str::to_string)
                .collect()
        });
        let indices: Vec<usize> = names
            .iter()
            .map(|name| require_column(path, &file_headers, name))
            .collect::<Result<_>>()?;
        let msec_idx = require_column(path, &file_headers, &columns.msec)?;
        let schedule_idx = require_column(path, &file_headers, &columns.schedule_id)?;

        let before = rows.len();
        for result in reader.records() {
            let record = result.map_err(csv_error(path))?;
            let msec = Cell::parse(record.get(msec_idx).unwrap_or_default());
            let schedule_id = Cell::parse(record.get(schedule_idx).unwrap_or_default());
            let row = indices
                .iter()
                .map(|&i| Cell::parse(record.get(i).unwrap_or_default()))
                .collect();
            rows.push(SortableRow {
                msec,
                schedule_id,
                row,
            });
        }
        debug!("{}: {} analysis rows", path.display(), rows.len() - before);
    }

    let names = projection.unwrap_or_default();
    sort_rows(&mut rows);

    let weld_idx = names.iter().position(|h| h == &columns.weld_id);
    let doe_idx = names.iter().position(|h| h == &columns.doe);
    let (Some(weld_idx), Some(doe_idx)) = (weld_idx, doe_idx) else {
        // No files were given, so there is nothing to group.
        return Ok(AnalysisGroups::new());
    };

    let mut groups = AnalysisGroups::new();
    let mut ungrouped = 0usize;
    for SortableRow { row, .. } in rows {
        let key = WeldKey {
            weld_id: row[weld_idx].clone(),
            dataset: row[doe_idx].clone(),
        };
        if key.weld_id.is_empty() || key.dataset.is_empty() {
            ungrouped += 1;
            continue;
        }
        groups
            .entry(key)
            .or_insert_with(|| Table::new(names.clone()))
            .push(row);
    }
    if ungrouped > 0 {
        debug!("{} analysis rows without weld/DOE key were ignored", ungrouped);
    }

    Ok(groups)
}

/// Load and group ParamCurrent rows from every file.
pub fn load_schedules(paths: &[PathBuf], columns: &ColumnConfig) -> Result<ScheduleGroups> {
    let mut rows: Vec<SortableRow<i64, (f64, Cell)>> = Vec::new();

    for path in paths {
        let mut reader = open_reader(path)?;
        let file_headers = reader.headers().map_err(csv_error(path))?.clone();

        let [msec_idx, current_idx, schedule_idx, doe_idx] = {
            let [msec, current, schedule, doe] = columns.schedule_headers();
            [
                require_column(path, &file_headers, msec)?,
                require_column(path, &file_headers, current)?,
                require_column(path, &file_headers, schedule)?,
                require_column(path, &file_headers, doe)?,
            ]
        };

        for result in reader.records() {
            let record = result.map_err(csv_error(path))?;
            let msec = parse_time_index(path, &record, msec_idx)?;
            let raw_current = record.get(current_idx).unwrap_or_default();
            let current =
                Cell::parse(raw_current)
                    .as_f64()
                    .ok_or_else(|| LoaderError::InvalidCurrent {
                        path: path.to_path_buf(),
                        line: record.position().map_or(0, |p| p.line()),
                        raw: raw_current.to_string(),
                    })?;
            rows.push(SortableRow {
                msec,
                schedule_id: Cell::parse(record.get(schedule_idx).unwrap_or_default()),
                row: (current, Cell::parse(record.get(doe_idx).unwrap_or_default())),
            });
        }
    }

    sort_rows(&mut rows);

    let mut groups = ScheduleGroups::new();
    for SortableRow {
        msec,
        schedule_id,
        row: (current, dataset),
    } in rows
    {
        if schedule_id.is_empty() || dataset.is_empty() {
            continue;
        }
        let key = ScheduleKey {
            schedule_id: schedule_id.clone(),
            dataset,
        };
        groups.entry(key).or_default().push(msec, current, schedule_id);
    }

    Ok(groups)
}

/// Load both exports for a batch.
pub fn load_records(
    analysis_paths: &[PathBuf],
    schedule_paths: &[PathBuf],
    headers: &BTreeSet<String>,
    columns: &ColumnConfig,
) -> Result<LoadedRecords> {
    let welds = load_analysis(analysis_paths, headers, columns)?;
    let schedules = load_schedules(schedule_paths, columns)?;
    debug!(
        "loaded {} weld groups and {} schedule groups",
        welds.len(),
        schedules.len()
    );
    Ok(LoadedRecords { welds, schedules })
}
