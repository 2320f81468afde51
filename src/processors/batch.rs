//! Batch driver: loads, matches, reconciles and assembles every selected weld.
//!
//! Errors that stop the batch are returned as [`BatchError`]. Per-weld
//! failures are collected in the [`BatchResult`] instead, so that one bad weld
//! does not cost the rest of the database.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use super::assemble::{assemble, AssemblyError};
use super::classify::Classification;
use super::discovery::{find_all_dataset_files, DatasetFiles, DiscoveryError};
use super::headers::{harmonize_files, HeaderError};
use super::matching::{match_schedules, MatchError, SchedulePair};
use super::reconcile::{ReconcileError, Reconciled, Reconciler};
use crate::config::{BatchConfig, InputConfig, StackFailurePolicy};
use crate::core::loaders::{load_records, LoaderError};
use crate::core::record::OutputRecord;

/// Errors that stop a batch before any record is produced.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("No welds found in the selected datasets")]
    NoWelds,
}

/// Result type for batch runs.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Why a single weld was left out of the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeldError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// A weld that failed, with its record name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeldFailure {
    pub weld: String,
    pub error: WeldError,
}

impl fmt::Display for WeldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Weld {} {}", self.weld, self.error)
    }
}

/// Outcome of a batch run that got as far as reconciliation.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Finished records, in weld key order
    pub records: Vec<OutputRecord>,
    /// Welds that failed without stopping the batch
    pub failures: Vec<WeldFailure>,
    /// Non-detail welds skipped in detail-mode-only runs
    pub skipped: usize,
    /// Column-stack failure that stopped the batch early, if any
    pub halted: Option<AssemblyError>,
}

impl BatchResult {
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }

    /// One-line outcome, e.g. `Completed with 2 failed welds`.
    pub fn summary(&self) -> String {
        match &self.halted {
            Some(e) => format!(
                "Stopped after {} records with {} failed welds: {}",
                self.records.len(),
                self.failures.len(),
                e
            ),
            None => format!("Completed with {} failed welds", self.failures.len()),
        }
    }
}

enum WeldOutcome {
    Record(OutputRecord),
    Skipped,
    Failed(WeldFailure),
    Halted(AssemblyError),
}

fn process_weld(
    pair: &SchedulePair<'_>,
    reconciler: &Reconciler<'_>,
    classification: &Classification,
    config: &BatchConfig,
) -> WeldOutcome {
    let name = pair.weld.record_name();
    let series = match reconciler.reconcile(pair.analysis, pair.trace) {
        Ok(Reconciled::Series(series)) => series,
        Ok(Reconciled::NotDetailMode) => return WeldOutcome::Skipped,
        Err(e) => {
            return WeldOutcome::Failed(WeldFailure {
                weld: name,
                error: e.into(),
            })
        }
    };

    match assemble(pair.weld, pair.analysis, series, classification, &config.columns) {
        Ok(record) => WeldOutcome::Record(record),
        Err(e) => match config.stack_failure {
            StackFailurePolicy::Abort => WeldOutcome::Halted(e),
            StackFailurePolicy::SkipWeld => WeldOutcome::Failed(WeldFailure {
                weld: name,
                error: e.into(),
            }),
        },
    }
}

/// Run the pipeline over already located DOE exports.
///
/// # Errors
///
/// Header mismatches, loader errors and unmatched schedules stop the batch.
/// A column-stack failure under [`StackFailurePolicy::Abort`] is reported in
/// [`BatchResult::halted`] together with the records finished before it.
pub fn run_batch(files: &[DatasetFiles], config: &BatchConfig) -> Result<BatchResult> {
    let eligible = harmonize_files(files)?;
    for header in &config.selected_headers {
        if !eligible.iter().any(|e| e.name == *header) {
            warn!("Selected header \"{}\" is blank in at least one DOE", header);
        }
    }

    let analysis: Vec<PathBuf> = files.iter().map(|f| f.analysis.clone()).collect();
    let schedules: Vec<PathBuf> = files.iter().map(|f| f.schedule.clone()).collect();
    let combined = config.combined_headers();
    let loaded = load_records(&analysis, &schedules, &combined, &config.columns)?;

    let Some(first) = loaded.welds.values().next() else {
        return Err(BatchError::NoWelds);
    };
    let pairs = match_schedules(&loaded.welds, &loaded.schedules, &config.columns)?;

    let combined: Vec<&String> = combined.iter().collect();
    let classification = Classification::from_table(first, &combined);
    debug!(
        "attributes: {:?}, time series: {:?}",
        classification.attributes, classification.time_series
    );

    let reconciler = Reconciler::new(config, &classification);
    let outcomes: Vec<WeldOutcome> = pairs
        .par_iter()
        .map(|pair| process_weld(pair, &reconciler, &classification, config))
        .collect();

    let mut result = BatchResult::default();
    for outcome in outcomes {
        match outcome {
            WeldOutcome::Record(record) => result.records.push(record),
            WeldOutcome::Skipped => result.skipped += 1,
            WeldOutcome::Failed(failure) => {
                warn!("{}", failure);
                result.failures.push(failure);
            }
            WeldOutcome::Halted(e) => {
                warn!("{}", e);
                result.halted = Some(e);
                break;
            }
        }
    }

    info!(
        "{} ({} records, {} skipped)",
        result.summary(),
        result.records.len(),
        result.skipped
    );
    Ok(result)
}

/// Locate the selected DOE folders under `root` and run the pipeline on them.
pub fn run_batch_in(root: &Path, input: &InputConfig, config: &BatchConfig) -> Result<BatchResult> {
    if config.selected_datasets.is_empty() {
        return Err(HeaderError::NoDatasets.into());
    }
    let files = find_all_dataset_files(root, &config.selected_datasets, input)?;
    run_batch(&files, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(path: &Path, lines: &[&str]) {
        let mut file = File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    /// One DOE with two non-detail welds on schedule 7. Weld 2 has one row
    /// too many for the offset array.
    fn dataset(root: &Path) -> DatasetFiles {
        let dir = root.join("DOE-1");
        fs::create_dir_all(&dir).unwrap();
        let analysis = dir.join("DOE-1_Analysis.csv");
        let schedule = dir.join("DOE-1_ParamCurrent.csv");
        write_csv(
            &analysis,
            &[
                "vspotid,Bi-PartID,Bi-Msec,Bi-WTC Mode,# for DoE Based Model,Force",
                "7,1,1,Normal,1,10",
                "7,1,2,Normal,1,20",
                "7,2,1,Normal,1,10",
                "7,2,2,Normal,1,20",
                "7,2,3,Normal,1,30",
            ],
        );
        write_csv(
            &schedule,
            &[
                "Bi-Msec,Current,vspotid,# for DoE Based Model",
                "1,5,7,1",
                "2,0,7,1",
                "3,6,7,1",
            ],
        );
        DatasetFiles {
            name: "DOE-1".into(),
            analysis,
            schedule,
        }
    }

    #[test]
    fn test_run_batch_collects_weld_failures() {
        let dir = TempDir::new().unwrap();
        let files = vec![dataset(dir.path())];
        let config = BatchConfig::new(&PipelineConfig::default()).with_headers(["Force"]);

        let result = run_batch(&files, &config).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].name, "1, 1");
        // offsets [0, 1] shift weld 1 to msec [1, 3]
        assert_eq!(result.records[0].data.column(0), vec![10.0, 15.0, 20.0]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].weld, "1, 2");
        assert!(matches!(
            result.failures[0].error,
            WeldError::Reconcile(ReconcileError::OffsetLengthMismatch { .. })
        ));
        assert!(result.is_complete());
        assert_eq!(result.summary(), "Completed with 1 failed welds");
    }

    #[test]
    fn test_run_batch_detail_mode_only_skips() {
        let dir = TempDir::new().unwrap();
        let files = vec![dataset(dir.path())];
        let config = BatchConfig::new(&PipelineConfig::default())
            .with_headers(["Force"])
            .with_detail_mode_only(true);

        let result = run_batch(&files, &config).unwrap();
        assert!(result.records.is_empty());
        assert!(result.failures.is_empty());
        assert_eq!(result.skipped, 2);
    }

    #[test]
    fn test_run_batch_in_requires_datasets() {
        let dir = TempDir::new().unwrap();
        let config = BatchConfig::new(&PipelineConfig::default());
        let result = run_batch_in(dir.path(), &InputConfig::default(), &config);
        assert!(matches!(
            result,
            Err(BatchError::Header(HeaderError::NoDatasets))
        ));
    }

    #[test]
    fn test_summary_when_halted() {
        let result = BatchResult {
            halted: Some(AssemblyError::ColumnStack {
                weld: "1, 1".into(),
                lengths: vec![],
            }),
            ..Default::default()
        };
        assert!(!result.is_complete());
        assert!(result.summary().starts_with("Stopped after 0 records"));
    }
}
