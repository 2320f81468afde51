//! Record stores for the finished weld database.
//!
//! A [`RecordStore`] receives one named record per weld and is finished once
//! after the batch. Two stores are provided:
//! - [`JsonStore`], a single JSON document on disk
//! - [`MemoryStore`], for tests and callers that post-process in memory
//!
//! A single record's matrix can also be exported as CSV.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::record::{Attribute, Matrix, OutputRecord};

/// Errors that can occur while writing or reading a store.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open a store for reading.
    #[error("failed to open '{path}': {source}")]
    OpenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding error.
    #[error("JSON error for '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Two records share a name.
    #[error("duplicate record name \"{0}\"")]
    DuplicateRecord(String),

    /// A stored matrix does not match its declared shape.
    #[error("record \"{name}\" declares {rows}x{cols} but holds {found} values")]
    ShapeMismatch {
        name: String,
        rows: usize,
        cols: usize,
        found: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Destination for output records.
pub trait RecordStore {
    /// Add one record. Names must be unique within a store.
    fn put(&mut self, record: &OutputRecord) -> Result<()>;

    /// Flush everything added so far.
    fn finish(&mut self) -> Result<()>;
}

/// Write every record, keeping only the selected attributes plus `headers`,
/// then finish the store. Returns the number of records written.
pub fn write_records<S: RecordStore + ?Sized>(
    store: &mut S,
    records: &[OutputRecord],
    selected: &BTreeSet<String>,
) -> Result<usize> {
    for record in records {
        store.put(&record.with_selected_attributes(selected))?;
    }
    store.finish()?;
    Ok(records.len())
}

/// Keeps records in memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<OutputRecord>,
    finished: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    pub fn get(&self, name: &str) -> Option<&OutputRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl RecordStore for MemoryStore {
    fn put(&mut self, record: &OutputRecord) -> Result<()> {
        if self.get(&record.name).is_some() {
            return Err(WriteError::DuplicateRecord(record.name.clone()));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    name: String,
    rows: usize,
    cols: usize,
    /// Row-major; `NaN` is stored as `null`
    data: Vec<Vec<Option<f64>>>,
    attributes: Vec<Attribute>,
}

#[derive(Serialize, Deserialize, Default)]
struct StoredDatabase {
    records: Vec<StoredRecord>,
}

impl From<&OutputRecord> for StoredRecord {
    fn from(record: &OutputRecord) -> Self {
        let data = (0..record.data.rows())
            .map(|i| {
                record
                    .data
                    .row(i)
                    .iter()
                    .map(|v| (!v.is_nan()).then_some(*v))
                    .collect()
            })
            .collect();
        Self {
            name: record.name.clone(),
            rows: record.data.rows(),
            cols: record.data.cols(),
            data,
            attributes: record.attributes.clone(),
        }
    }
}

impl TryFrom<StoredRecord> for OutputRecord {
    type Error = WriteError;

    fn try_from(stored: StoredRecord) -> Result<Self> {
        let values: Vec<f64> = stored
            .data
            .into_iter()
            .flatten()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        let found = values.len();
        let data = Matrix::from_row_major(stored.rows, stored.cols, values).ok_or(
            WriteError::ShapeMismatch {
                name: stored.name.clone(),
                rows: stored.rows,
                cols: stored.cols,
                found,
            },
        )?;
        Ok(Self {
            name: stored.name,
            data,
            attributes: stored.attributes,
        })
    }
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// A JSON document holding every record, written on [`RecordStore::finish`].
///
/// An existing file at the path is replaced. Writing the same records twice
/// produces byte-identical files.
///
/// # Example
///
/// ```no_run
/// use doe_database::core::writers::{JsonStore, RecordStore};
///
/// let mut store = JsonStore::new("Database_out.json");
/// store.finish().unwrap();
/// ```
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    records: Vec<OutputRecord>,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonStore {
    fn put(&mut self, record: &OutputRecord) -> Result<()> {
        if self.records.iter().any(|r| r.name == record.name) {
            return Err(WriteError::DuplicateRecord(record.name.clone()));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        ensure_parent_dirs(&self.path)?;
        let path_str = self.path.display().to_string();

        let database = StoredDatabase {
            records: self.records.iter().map(StoredRecord::from).collect(),
        };

        let mut writer = create_buffered_writer(&self.path)?;
        serde_json::to_writer_pretty(&mut writer, &database).map_err(|e| WriteError::Json {
            path: path_str.clone(),
            source: e,
        })?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| WriteError::WriteFile {
                path: path_str,
                source: e,
            })?;

        info!(
            "Wrote {} records to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Read every record back from a file written by [`JsonStore`].
pub fn read_json_store<P: AsRef<Path>>(path: P) -> Result<Vec<OutputRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| WriteError::OpenFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let database: StoredDatabase =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| WriteError::Json {
            path: path.display().to_string(),
            source: e,
        })?;

    database
        .records
        .into_iter()
        .map(OutputRecord::try_from)
        .collect()
}

/// Export one record's matrix as CSV with its headers as the first row.
///
/// `NaN` values are written as empty fields.
pub fn write_record_csv(path: &Path, record: &OutputRecord) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut csv_writer = csv::Writer::from_writer(create_buffered_writer(path)?);
    let path_str = path.display().to_string();

    csv_writer
        .write_record(record.headers())
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for i in 0..record.data.rows() {
        csv_writer
            .write_record(record.data.row(i).iter().map(|v| {
                if v.is_nan() {
                    String::new()
                } else {
                    v.to_string()
                }
            }))
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
