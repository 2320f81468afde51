//! Header consistency checks across DOEs.
//!
//! Every selected DOE must export the same Analysis (and ParamCurrent) header
//! layout. Columns that exist structurally but hold no data in some DOE are
//! not offered for selection.

use thiserror::Error;

use super::discovery::DatasetFiles;
use crate::core::loaders::{read_header_row, read_header_rows, LoaderError};

/// Errors from header harmonization. All of them stop the batch.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("No datasets selected")]
    NoDatasets,

    #[error("Headers aren't consistent: {dataset} has \"{found}\" at column {position}, expected \"{expected}\"")]
    HeaderMismatch {
        dataset: String,
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Header \"{0}\" contains ':'")]
    InvalidHeaderName(String),

    #[error(transparent)]
    Loader(#[from] LoaderError),
}

/// First two rows of one DOE's Analysis export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRows {
    /// DOE folder name
    pub dataset: String,
    /// Header names
    pub headers: Vec<String>,
    /// First data row, raw
    pub sample: Vec<String>,
}

/// A header that holds data in every selected DOE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleHeader {
    pub name: String,
    /// Value of the first data row in the first DOE
    pub sample: String,
}

impl std::fmt::Display for EligibleHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}  :  [ {} ]", self.name, self.sample)
    }
}

/// Check that every header row equals the first one, element-wise up to the
/// length of the shortest row.
///
/// Returns the dataset name and column position of the first difference.
pub fn check_equal_headers<'a, I>(rows: I) -> Result<(), HeaderError>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let rows: Vec<(&str, &[String])> = rows.into_iter().collect();
    let Some((_, reference)) = rows.first() else {
        return Err(HeaderError::NoDatasets);
    };
    let shortest = rows.iter().map(|(_, r)| r.len()).min().unwrap_or(0);

    for (dataset, row) in &rows[1..] {
        if let Some(position) = (0..shortest).find(|&i| row[i] != reference[i]) {
            return Err(HeaderError::HeaderMismatch {
                dataset: dataset.to_string(),
                position,
                expected: reference[position].clone(),
                found: row[position].clone(),
            });
        }
    }
    Ok(())
}

/// Indexes of the columns whose sample value is non-empty in every DOE.
///
/// Positions are taken from the first sample row; a shorter row counts as
/// empty at the missing positions.
pub fn find_valid_columns(samples: &[Vec<String>]) -> Vec<usize> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    (0..first.len())
        .filter(|&i| {
            samples
                .iter()
                .all(|row| row.get(i).is_some_and(|v| !v.is_empty()))
        })
        .collect()
}

/// Determine the Analysis headers eligible for selection.
///
/// `schedule_headers` are the ParamCurrent header rows of the same DOEs; they
/// must agree with each other as well.
pub fn harmonize(
    analysis: &[HeaderRows],
    schedule_headers: &[(String, Vec<String>)],
) -> Result<Vec<EligibleHeader>, HeaderError> {
    check_equal_headers(
        analysis
            .iter()
            .map(|r| (r.dataset.as_str(), r.headers.as_slice())),
    )?;
    if !schedule_headers.is_empty() {
        check_equal_headers(
            schedule_headers
                .iter()
                .map(|(name, headers)| (name.as_str(), headers.as_slice())),
        )?;
    }

    let samples: Vec<Vec<String>> = analysis.iter().map(|r| r.sample.clone()).collect();
    let first = &analysis[0];

    find_valid_columns(&samples)
        .into_iter()
        .filter_map(|i| {
            first.headers.get(i).map(|name| EligibleHeader {
                name: name.clone(),
                sample: first.sample[i].clone(),
            })
        })
        .map(|header| {
            if header.name.contains(':') {
                Err(HeaderError::InvalidHeaderName(header.name))
            } else {
                Ok(header)
            }
        })
        .collect()
}

/// Read the header rows of every DOE's exports and harmonize them.
pub fn harmonize_files(files: &[DatasetFiles]) -> Result<Vec<EligibleHeader>, HeaderError> {
    let mut analysis = Vec::with_capacity(files.len());
    let mut schedule = Vec::with_capacity(files.len());

    for dataset in files {
        let (headers, sample) = read_header_rows(&dataset.analysis)?;
        analysis.push(HeaderRows {
            dataset: dataset.name.clone(),
            headers,
            sample,
        });
        schedule.push((dataset.name.clone(), read_header_row(&dataset.schedule)?));
    }

    harmonize(&analysis, &schedule)
}
