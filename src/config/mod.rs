//! Configuration types for the DOE database pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Column names used to locate the fixed fields of the Analysis and
/// ParamCurrent exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Column that identifies a welding schedule
    #[serde(default = "default_schedule_id")]
    pub schedule_id: String,

    /// Column that identifies an individual weld within a DOE
    #[serde(default = "default_weld_id")]
    pub weld_id: String,

    /// Integer time-step column used as the alignment axis
    #[serde(default = "default_msec")]
    pub msec: String,

    /// Column holding the recording mode of a weld
    #[serde(default = "default_detail_mode_header")]
    pub detail_mode: String,

    /// Value of `detail_mode` that flags a detail-mode recording
    #[serde(default = "default_detail_mode_value")]
    pub detail_mode_value: String,

    /// Current column in the Analysis export
    #[serde(default = "default_current_analysis")]
    pub current_analysis: String,

    /// Current column in the ParamCurrent export
    #[serde(default = "default_current_schedule")]
    pub current_schedule: String,

    /// Column holding the DOE number
    #[serde(default = "default_doe")]
    pub doe: String,

    /// Header used for the appended schedule current column
    #[serde(default = "default_schedule_output")]
    pub schedule_output: String,
}

fn default_schedule_id() -> String {
    "vspotid".to_string()
}

fn default_weld_id() -> String {
    "Bi-PartID".to_string()
}

fn default_msec() -> String {
    "Bi-Msec".to_string()
}

fn default_detail_mode_header() -> String {
    "Bi-WTC Mode".to_string()
}

fn default_detail_mode_value() -> String {
    "Detail Mode".to_string()
}

fn default_current_analysis() -> String {
    "current_data".to_string()
}

fn default_current_schedule() -> String {
    "Current".to_string()
}

fn default_doe() -> String {
    "# for DoE Based Model".to_string()
}

fn default_schedule_output() -> String {
    "Schedule".to_string()
}

impl ColumnConfig {
    /// Headers that must be present in every Analysis export.
    pub fn required_headers(&self) -> [&str; 5] {
        [
            &self.schedule_id,
            &self.weld_id,
            &self.msec,
            &self.detail_mode,
            &self.doe,
        ]
    }

    /// Headers that must be present in every ParamCurrent export.
    pub fn schedule_headers(&self) -> [&str; 4] {
        [&self.msec, &self.current_schedule, &self.schedule_id, &self.doe]
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            schedule_id: default_schedule_id(),
            weld_id: default_weld_id(),
            msec: default_msec(),
            detail_mode: default_detail_mode_header(),
            detail_mode_value: default_detail_mode_value(),
            current_analysis: default_current_analysis(),
            current_schedule: default_current_schedule(),
            doe: default_doe(),
            schedule_output: default_schedule_output(),
        }
    }
}

/// File discovery and output naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Substring identifying the Analysis export in a DOE folder
    #[serde(default = "default_analysis_marker")]
    pub analysis_marker: String,

    /// Substring identifying the ParamCurrent export in a DOE folder
    #[serde(default = "default_schedule_marker")]
    pub schedule_marker: String,

    /// File name of the database written into the data root
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

fn default_analysis_marker() -> String {
    "Analysis".to_string()
}

fn default_schedule_marker() -> String {
    "ParamCurrent".to_string()
}

fn default_output_name() -> String {
    "Database_out.json".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            analysis_marker: default_analysis_marker(),
            schedule_marker: default_schedule_marker(),
            output_name: default_output_name(),
        }
    }
}

/// What to do when a weld's reconciled columns cannot be stacked into a
/// matrix because their lengths disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackFailurePolicy {
    /// Stop the batch; records assembled before the failure are kept.
    #[default]
    Abort,
    /// Record the weld as failed and keep going.
    SkipWeld,
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub columns: ColumnConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub stack_failure: StackFailurePolicy,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Parameters of one batch run.
///
/// Built once by the caller and passed by reference through the pipeline;
/// nothing in the pipeline mutates it.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Column naming shared by every stage
    pub columns: ColumnConfig,
    /// DOE folder names to include
    pub selected_datasets: BTreeSet<String>,
    /// Analysis headers the user asked for
    pub selected_headers: BTreeSet<String>,
    /// Append the schedule current as an extra column
    pub include_schedule: bool,
    /// Only keep detail-mode welds and skip offset correction and interpolation
    pub detail_mode_only: bool,
    /// Handling of column-stack failures during assembly
    pub stack_failure: StackFailurePolicy,
}

impl BatchConfig {
    /// Create a batch with the given pipeline configuration and no selections.
    pub fn new(pipeline: &PipelineConfig) -> Self {
        Self {
            columns: pipeline.columns.clone(),
            selected_datasets: BTreeSet::new(),
            selected_headers: BTreeSet::new(),
            include_schedule: false,
            detail_mode_only: false,
            stack_failure: pipeline.stack_failure,
        }
    }

    pub fn with_datasets<I, S>(mut self, datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_datasets = datasets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include_schedule(mut self, include: bool) -> Self {
        self.include_schedule = include;
        self
    }

    pub fn with_detail_mode_only(mut self, only: bool) -> Self {
        self.detail_mode_only = only;
        self
    }

    pub fn with_stack_failure(mut self, policy: StackFailurePolicy) -> Self {
        self.stack_failure = policy;
        self
    }

    /// Required headers followed by the selected ones, without duplicates.
    pub fn combined_headers(&self) -> BTreeSet<String> {
        self.columns
            .required_headers()
            .iter()
            .map(|h| h.to_string())
            .chain(self.selected_headers.iter().cloned())
            .collect()
    }

    /// Whether `header` was explicitly selected by the user.
    pub fn is_selected(&self, header: &str) -> bool {
        self.selected_headers.contains(header)
    }
}
