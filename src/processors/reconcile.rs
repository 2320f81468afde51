//! Reconciliation of a weld's Analysis rows with its schedule trace.
//!
//! The schedule recorder drops samples while the commanded current is zero.
//! Detail-mode welds keep a row for those idle cycles, which has to be cut
//! out; non-detail welds lack them, so their time index is shifted by the
//! number of idle cycles already elapsed. Either way the result is then
//! interpolated onto a dense time index.

use thiserror::Error;

use super::classify::Classification;
use crate::config::BatchConfig;
use crate::core::loaders::ScheduleTrace;
use crate::core::table::{Cell, Table};
use crate::core::transforms::{interpolate, zero_fill, TransformError};

/// Per-weld reconciliation failures. None of them stop the batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("(Detail Mode) has a schedule with {schedule_len} data points and the analysis has {analysis_len}")]
    DetailLengthMismatch {
        schedule_len: usize,
        analysis_len: usize,
    },

    #[error("(Non-Detail Mode) has an offset array with {offset_len} data points and the analysis has {analysis_len}")]
    OffsetLengthMismatch {
        offset_len: usize,
        analysis_len: usize,
    },

    #[error("column \"{0}\" is missing")]
    MissingColumn(String),

    #[error("column \"{header}\" holds non-numeric value \"{value}\"")]
    NonNumericSeries { header: String, value: String },

    #[error("time index value \"{0}\" is not an integer")]
    InvalidTimeIndex(String),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Time-series columns of one weld, ready to be stacked into a matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledSeries {
    /// Column headers, in output order
    pub headers: Vec<String>,
    /// One value sequence per header
    pub columns: Vec<Vec<f64>>,
}

impl ReconciledSeries {
    fn push(&mut self, header: impl Into<String>, column: Vec<f64>) {
        self.headers.push(header.into());
        self.columns.push(column);
    }
}

/// Outcome of reconciling one weld.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    Series(ReconciledSeries),
    /// The batch only wants detail-mode welds and this one is not.
    NotDetailMode,
}

/// Idle cycles found in a schedule trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOffsets {
    /// Positions of the zero-current samples
    pub zero_indices: Vec<usize>,
    /// For each non-zero sample, the number of zero samples before it
    pub offsets: Vec<i64>,
}

/// Scan a schedule's current for idle (zero) cycles.
///
/// ```
/// use doe_database::processors::reconcile::schedule_offsets;
///
/// let idle = schedule_offsets(&[0.0, 0.0, 4.0, 0.0, 6.0]);
/// assert_eq!(idle.zero_indices, vec![0, 1, 3]);
/// assert_eq!(idle.offsets, vec![2, 3]);
/// ```
pub fn schedule_offsets(current: &[f64]) -> ScheduleOffsets {
    let mut result = ScheduleOffsets::default();
    let mut offset = 0i64;
    for (i, &c) in current.iter().enumerate() {
        if c == 0.0 {
            offset += 1;
            result.zero_indices.push(i);
        } else {
            result.offsets.push(offset);
        }
    }
    result
}

/// Read one column as numbers. Blank cells become `NaN`.
fn numeric_column(table: &Table, header: &str) -> Result<Vec<f64>> {
    let column = table
        .column(header)
        .ok_or_else(|| ReconcileError::MissingColumn(header.to_string()))?;
    column
        .map(|cell| {
            cell.as_f64().ok_or_else(|| ReconcileError::NonNumericSeries {
                header: header.to_string(),
                value: cell.to_string(),
            })
        })
        .collect()
}

fn time_index(table: &Table, header: &str) -> Result<Vec<i64>> {
    let column = table
        .column(header)
        .ok_or_else(|| ReconcileError::MissingColumn(header.to_string()))?;
    column
        .map(|cell| {
            cell.as_i64()
                .ok_or_else(|| ReconcileError::InvalidTimeIndex(cell.to_string()))
        })
        .collect()
}

/// Reconciles welds of one batch against their schedules.
pub struct Reconciler<'a> {
    config: &'a BatchConfig,
    classification: &'a Classification,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a BatchConfig, classification: &'a Classification) -> Self {
        Self {
            config,
            classification,
        }
    }

    /// Whether the weld was recorded in detail mode, judged by its first row.
    pub fn is_detail_mode(&self, weld: &Table) -> bool {
        let columns = &self.config.columns;
        weld.first(&columns.detail_mode).and_then(Cell::as_text)
            == Some(columns.detail_mode_value.as_str())
    }

    /// Turn one matched (weld, schedule) pair into its output columns.
    pub fn reconcile(&self, weld: &Table, schedule: &ScheduleTrace) -> Result<Reconciled> {
        let detail_mode = self.is_detail_mode(weld);
        if self.config.detail_mode_only {
            if !detail_mode {
                return Ok(Reconciled::NotDetailMode);
            }
            return self.verbatim(weld, schedule).map(Reconciled::Series);
        }

        let columns = &self.config.columns;
        let idle = schedule_offsets(&schedule.current);
        let mut analysis = weld.clone();

        if detail_mode {
            if schedule.len() != analysis.len() {
                return Err(ReconcileError::DetailLengthMismatch {
                    schedule_len: schedule.len(),
                    analysis_len: analysis.len(),
                });
            }
            analysis.drop_rows(&idle.zero_indices);
        } else {
            if idle.offsets.len() != analysis.len() {
                return Err(ReconcileError::OffsetLengthMismatch {
                    offset_len: idle.offsets.len(),
                    analysis_len: analysis.len(),
                });
            }
            let msec = analysis
                .column_mut(&columns.msec)
                .ok_or_else(|| ReconcileError::MissingColumn(columns.msec.clone()))?;
            for (cell, offset) in msec.zip(&idle.offsets) {
                let value = cell
                    .as_i64()
                    .ok_or_else(|| ReconcileError::InvalidTimeIndex(cell.to_string()))?;
                *cell = Cell::Number((value + offset) as f64);
            }
        }

        self.interpolated(&analysis, schedule)
    }

    /// Detail-mode-only output: the series as recorded.
    fn verbatim(&self, weld: &Table, schedule: &ScheduleTrace) -> Result<ReconciledSeries> {
        let mut series = ReconciledSeries::default();
        for header in &self.classification.time_series {
            series.push(header.clone(), numeric_column(weld, header)?);
        }
        if self.config.include_schedule {
            let n = weld.len().min(schedule.len());
            series.push(
                self.config.columns.schedule_output.clone(),
                schedule.current[..n].to_vec(),
            );
        }
        Ok(series)
    }

    fn interpolated(&self, analysis: &Table, schedule: &ScheduleTrace) -> Result<Reconciled> {
        let columns = &self.config.columns;
        let indexes = time_index(analysis, &columns.msec)?;

        let data_headers: Vec<&String> = self
            .classification
            .time_series
            .iter()
            .filter(|h| **h != columns.msec && **h != columns.current_analysis)
            .collect();
        let data = data_headers
            .iter()
            .map(|h| numeric_column(analysis, h))
            .collect::<Result<Vec<_>>>()?;

        let filled = interpolate(&indexes, data.as_slice())?;

        let mut series = ReconciledSeries::default();
        for (header, column) in data_headers.into_iter().zip(filled.values) {
            series.push(header.clone(), column);
        }

        if self.config.is_selected(&columns.current_analysis) {
            let current = numeric_column(analysis, &columns.current_analysis)?;
            series.push(
                columns.current_analysis.clone(),
                zero_fill(&indexes, &current)?,
            );
        }

        if self.config.is_selected(&columns.msec) {
            series.push(
                columns.msec.clone(),
                filled.index.iter().map(|&i| i as f64).collect(),
            );
        }

        if self.config.include_schedule {
            let n = filled.index.len().min(schedule.len());
            series.push(
                columns.schedule_output.clone(),
                schedule.current[..n].to_vec(),
            );
        }

        Ok(Reconciled::Series(series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    const HEADERS: [&str; 7] = [
        "vspotid",
        "Bi-PartID",
        "Bi-Msec",
        "Bi-WTC Mode",
        "# for DoE Based Model",
        "Force",
        "current_data",
    ];

    fn weld(mode: &str, msec: &[i64], force: &[f64], current: &[f64]) -> Table {
        let rows = msec
            .iter()
            .zip(force)
            .zip(current)
            .map(|((&m, &f), &c)| {
                vec![
                    Cell::Number(7.0),
                    Cell::Text("W1".into()),
                    Cell::Number(m as f64),
                    Cell::Text(mode.into()),
                    Cell::Number(1.0),
                    Cell::Number(f),
                    Cell::Number(c),
                ]
            })
            .collect();
        Table::from_rows(HEADERS.iter().map(|s| s.to_string()).collect(), rows)
    }

    fn schedule(current: &[f64]) -> ScheduleTrace {
        ScheduleTrace {
            msec: (1..=current.len() as i64).collect(),
            current: current.to_vec(),
            schedule_id: vec![Cell::Number(7.0); current.len()],
        }
    }

    fn batch(headers: &[&str]) -> BatchConfig {
        BatchConfig::new(&PipelineConfig::default()).with_headers(headers.iter().copied())
    }

    fn classify(table: &Table, config: &BatchConfig) -> Classification {
        let headers: Vec<String> = config.combined_headers().into_iter().collect();
        Classification::from_table(table, &headers)
    }

    fn series(outcome: Reconciled) -> ReconciledSeries {
        match outcome {
            Reconciled::Series(s) => s,
            other => panic!("Expected series, got {:?}", other),
        }
    }

    #[test]
    fn test_schedule_offsets() {
        let idle = schedule_offsets(&[0.0, 0.0, 4.0, 0.0, 6.0]);
        assert_eq!(idle.zero_indices, vec![0, 1, 3]);
        assert_eq!(idle.offsets, vec![2, 3]);
    }

    #[test]
    fn test_blank_time_index_fails_weld() {
        let config = batch(&["Force"]);
        let mut w = weld("Normal", &[1, 2, 3], &[1.0, 2.0, 3.0], &[0.0; 3]);
        if let Some(cell) = w.column_mut("Bi-Msec").and_then(|mut c| c.next()) {
            *cell = Cell::Empty;
        }
        let classification = classify(&w, &config);
        let reconciler = Reconciler::new(&config, &classification);

        let result = reconciler.reconcile(&w, &schedule(&[5.0, 5.0, 6.0]));
        assert_eq!(result, Err(ReconcileError::InvalidTimeIndex(String::new())));
    }

    #[test]
    fn test_detail_mode_drops_idle_rows() {
        let config = batch(&["Force", "Bi-Msec"]);
        let w = weld("Detail Mode", &[1, 2, 3, 4], &[1.0, 2.0, 3.0, 4.0], &[0.0; 4]);
        let classification = classify(&w, &config);
        let reconciler = Reconciler::new(&config, &classification);

        assert!(reconciler.is_detail_mode(&w));
        let out = series(reconciler.reconcile(&w, &schedule(&[0.0, 3.0, 0.0, 5.0])).unwrap());

        // Rows 2 and 4 survive; the gap between them is interpolated.
        assert_eq!(out.headers, vec!["Force", "Bi-Msec"]);
        assert_eq!(out.columns[0], vec![2.0, 3.0, 4.0]);
        assert_eq!(out.columns[1], vec![2.0, 3.0, 4.0]);
        assert!(out.columns[1].windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_detail_mode_row_count_after_drop() {
        let config = batch(&["Force"]);
        let w = weld("Detail Mode", &[1, 2, 3, 4], &[1.0, 2.0, 3.0, 4.0], &[0.0; 4]);
        let mut analysis = w.clone();
        analysis.drop_rows(&schedule_offsets(&[0.0, 3.0, 0.0, 5.0]).zero_indices);
        assert_eq!(analysis.len(), 2);

        let classification = classify(&w, &config);
        let out = series(
            Reconciler::new(&config, &classification)
                .reconcile(&w, &schedule(&[0.0, 3.0, 0.0, 5.0]))
                .unwrap(),
        );
        assert_eq!(out.columns[0].first(), Some(&2.0));
        assert_eq!(out.columns[0].last(), Some(&4.0));
    }

    #[test]
    fn test_detail_mode_length_mismatch() {
        let config = batch(&["Force"]);
        let w = weld("Detail Mode", &[1, 2, 3], &[1.0, 2.0, 3.0], &[0.0; 3]);
        let classification = classify(&w, &config);

        let result = Reconciler::new(&config, &classification).reconcile(&w, &schedule(&[0.0, 3.0]));
        assert_eq!(
            result,
            Err(ReconcileError::DetailLengthMismatch {
                schedule_len: 2,
                analysis_len: 3
            })
        );
    }

    #[test]
    fn test_non_detail_offsets_time_index() {
        let config = batch(&["Force", "Bi-Msec", "current_data"]);
        // Schedule has idle cycles at 1, 2 and 4; the weld recorded 2 samples.
        let w = weld("Normal", &[1, 2], &[10.0, 40.0], &[5.0, 9.0]);
        let classification = classify(&w, &config);
        let out = series(
            Reconciler::new(&config, &classification)
                .reconcile(&w, &schedule(&[0.0, 0.0, 4.0, 0.0, 6.0]))
                .unwrap(),
        );

        // Time index becomes [3, 5] and is filled to [3, 4, 5].
        assert_eq!(out.headers, vec!["Force", "current_data", "Bi-Msec"]);
        assert_eq!(out.columns[0], vec![10.0, 25.0, 40.0]);
        assert_eq!(out.columns[2], vec![3.0, 4.0, 5.0]);
        // Current is zero-filled on the 1-based time axis, not interpolated.
        assert_eq!(out.columns[1], vec![0.0, 0.0, 5.0, 0.0, 9.0]);
    }

    #[test]
    fn test_non_detail_offset_length_mismatch() {
        let config = batch(&["Force"]);
        let w = weld("Normal", &[1, 2, 3], &[1.0, 2.0, 3.0], &[1.0; 3]);
        let classification = classify(&w, &config);

        let result = Reconciler::new(&config, &classification).reconcile(&w, &schedule(&[0.0, 3.0]));
        assert_eq!(
            result,
            Err(ReconcileError::OffsetLengthMismatch {
                offset_len: 1,
                analysis_len: 3
            })
        );
    }

    #[test]
    fn test_include_schedule_truncated() {
        let config = batch(&["Force"]).with_include_schedule(true);
        let w = weld("Normal", &[1, 3], &[1.0, 3.0], &[1.0; 2]);
        let classification = classify(&w, &config);
        let out = series(
            Reconciler::new(&config, &classification)
                .reconcile(&w, &schedule(&[2.0, 4.0]))
                .unwrap(),
        );

        assert_eq!(out.headers, vec!["Force", "Schedule"]);
        assert_eq!(out.columns[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(out.columns[1], vec![2.0, 4.0]);
    }

    #[test]
    fn test_detail_mode_only_skips_normal_welds() {
        let config = batch(&["Force"]).with_detail_mode_only(true);
        let w = weld("Normal", &[1, 2], &[1.0, 2.0], &[1.0; 2]);
        let classification = classify(&w, &config);

        let outcome = Reconciler::new(&config, &classification)
            .reconcile(&w, &schedule(&[1.0, 1.0]))
            .unwrap();
        assert_eq!(outcome, Reconciled::NotDetailMode);
    }

    #[test]
    fn test_detail_mode_only_verbatim() {
        let config = batch(&["Force"])
            .with_detail_mode_only(true)
            .with_include_schedule(true);
        let w = weld("Detail Mode", &[1, 2, 5], &[1.0, 2.0, 5.0], &[0.0; 3]);
        let classification = classify(&w, &config);
        let out = series(
            Reconciler::new(&config, &classification)
                .reconcile(&w, &schedule(&[0.0, 1.0, 1.0, 1.0]))
                .unwrap(),
        );

        // No interpolation, no idle-row removal.
        assert_eq!(out.headers, vec!["Bi-Msec", "Force", "Schedule"]);
        assert_eq!(out.columns[0], vec![1.0, 2.0, 5.0]);
        assert_eq!(out.columns[1], vec![1.0, 2.0, 5.0]);
        assert_eq!(out.columns[2], vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_too_few_samples() {
        let config = batch(&["Force"]);
        let w = weld("Normal", &[1], &[1.0], &[1.0]);
        let classification = Classification {
            attributes: Vec::new(),
            time_series: vec!["Force".to_string()],
        };

        let result = Reconciler::new(&config, &classification).reconcile(&w, &schedule(&[2.0]));
        assert_eq!(
            result,
            Err(ReconcileError::Transform(TransformError::TooFewPoints { got: 1 }))
        );
    }
}
