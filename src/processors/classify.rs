//! Attribute vs. time-series classification of weld columns.

use crate::core::table::Table;

/// Split of a weld's columns into constant attributes and varying series.
///
/// Both lists keep the column order of the table they were derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub attributes: Vec<String>,
    pub time_series: Vec<String>,
}

impl Classification {
    /// Classify every column of `table` that is listed in `headers`.
    ///
    /// A column with exactly one distinct non-blank value is an attribute;
    /// anything else, including an all-blank column, is a time series.
    pub fn from_table<S: AsRef<str>>(table: &Table, headers: &[S]) -> Self {
        let mut classification = Self::default();
        for header in table.headers() {
            if !headers.iter().any(|h| h.as_ref() == header) {
                continue;
            }
            if table.distinct_count(header) == 1 {
                classification.attributes.push(header.clone());
            } else {
                classification.time_series.push(header.clone());
            }
        }
        classification
    }

    /// Whether `header` holds a single shared value across `table`'s rows.
    ///
    /// The batch classifies once from its first weld; this re-checks that
    /// assumption for a later weld.
    pub fn is_constant_in(table: &Table, header: &str) -> bool {
        table.distinct_count(header) == 1
    }
}
