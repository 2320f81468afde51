//! Assembly of reconciled weld series into named output records.

use log::warn;
use thiserror::Error;

use super::classify::Classification;
use super::reconcile::ReconciledSeries;
use crate::config::ColumnConfig;
use crate::core::loaders::WeldKey;
use crate::core::record::{Attribute, Matrix, OutputRecord};
use crate::core::table::{Cell, Table};

/// Errors from record assembly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("column lengths disagree for weld {weld}: {}", format_lengths(.lengths))]
    ColumnStack {
        weld: String,
        lengths: Vec<(String, usize)>,
    },
}

fn format_lengths(lengths: &[(String, usize)]) -> String {
    if lengths.is_empty() {
        return "no columns".to_string();
    }
    lengths
        .iter()
        .map(|(h, n)| format!("{h}={n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn first_value(table: &Table, header: &str) -> Option<Cell> {
    table.column(header)?.find(|c| !c.is_empty()).cloned()
}

/// Build the ordered attribute list of one weld.
///
/// Attribute headers that are not constant in this weld are left out and
/// logged, since the classification came from a different weld.
pub fn build_attributes(
    key: &WeldKey,
    table: &Table,
    classification: &Classification,
    columns: &ColumnConfig,
    series_headers: &[String],
) -> Vec<Attribute> {
    let mut attributes = vec![
        Attribute::Scalar {
            name: columns.doe.clone(),
            value: key.dataset.clone(),
        },
        Attribute::Scalar {
            name: columns.weld_id.clone(),
            value: key.weld_id.clone(),
        },
    ];

    for header in &classification.attributes {
        if *header == columns.doe || *header == columns.weld_id {
            continue;
        }
        if !Classification::is_constant_in(table, header) {
            warn!(
                "{}: attribute \"{}\" varies within this weld, leaving it out",
                key.record_name(),
                header
            );
            continue;
        }
        if let Some(value) = first_value(table, header) {
            attributes.push(Attribute::Scalar {
                name: header.clone(),
                value,
            });
        }
    }

    attributes.push(Attribute::HeaderList(series_headers.to_vec()));
    attributes
}

/// Build the output record of one reconciled weld.
///
/// # Errors
///
/// Returns [`AssemblyError::ColumnStack`] when the series lengths disagree.
pub fn assemble(
    key: &WeldKey,
    table: &Table,
    series: ReconciledSeries,
    classification: &Classification,
    columns: &ColumnConfig,
) -> Result<OutputRecord, AssemblyError> {
    let name = key.record_name();
    let data = Matrix::from_columns(&series.columns).map_err(|lengths| {
        AssemblyError::ColumnStack {
            weld: name.clone(),
            lengths: series.headers.iter().cloned().zip(lengths).collect(),
        }
    })?;

    let attributes = build_attributes(key, table, classification, columns, &series.headers);
    Ok(OutputRecord {
        name,
        data,
        attributes,
    })
}
