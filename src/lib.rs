//! Per-weld database builder for DOE resistance-welding exports.
//!
//! This crate provides tools for:
//! - Checking that the Analysis and ParamCurrent exports of several DOEs share one header layout
//! - Loading both exports and grouping them by weld and by schedule
//! - Correcting detail-mode and idle-cycle offsets between the two traces
//! - Interpolating each weld onto a dense time index (parallelized)
//! - Writing one named, attributed record per weld
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use doe_database::{BatchConfig, PipelineConfig};
//! use doe_database::core::writers::{write_records, JsonStore};
//! use doe_database::processors::batch::run_batch_in;
//!
//! let pipeline = PipelineConfig::default();
//! let batch = BatchConfig::new(&pipeline)
//!     .with_datasets(["DOE-1", "DOE-2"])
//!     .with_headers(["Bi-Msec", "current_data"]);
//! let result = run_batch_in(Path::new("data"), &pipeline.input, &batch).unwrap();
//! let mut store = JsonStore::new("Database_out.json");
//! write_records(&mut store, &result.records, &batch.selected_headers).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{BatchConfig, ColumnConfig, InputConfig, PipelineConfig, StackFailurePolicy};
pub use core::record::{Attribute, OutputRecord};
pub use processors::batch::{BatchError, BatchResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
