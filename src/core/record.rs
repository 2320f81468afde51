//! Per-weld output records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::table::Cell;

/// Name of the reserved attribute listing the matrix column headers.
pub const HEADERS_ATTRIBUTE: &str = "headers";

/// One metadata entry of an output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// A header whose value is the same on every row of the weld.
    Scalar { name: String, value: Cell },
    /// The reserved `headers` entry: matrix column headers in order.
    HeaderList(Vec<String>),
}

impl Attribute {
    pub fn name(&self) -> &str {
        match self {
            Attribute::Scalar { name, .. } => name,
            Attribute::HeaderList(_) => HEADERS_ATTRIBUTE,
        }
    }
}

/// Dense row-major matrix of time steps by series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl Matrix {
    /// Build a matrix from row-major values.
    pub fn from_row_major(rows: usize, cols: usize, values: Vec<f64>) -> Option<Self> {
        (rows * cols == values.len()).then_some(Self { rows, cols, values })
    }

    /// Stack equal-length columns side by side.
    ///
    /// Returns the column lengths when they disagree or when there are no
    /// columns at all.
    ///
    /// ```
    /// use doe_database::core::record::Matrix;
    ///
    /// let m = Matrix::from_columns(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    /// assert_eq!(m.row(0), &[1.0, 3.0]);
    /// assert_eq!(Matrix::from_columns(&[vec![1.0], vec![]]), Err(vec![1, 0]));
    /// ```
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self, Vec<usize>> {
        let lengths: Vec<usize> = columns.iter().map(Vec::len).collect();
        let Some(&rows) = lengths.first() else {
            return Err(lengths);
        };
        if lengths.iter().any(|&n| n != rows) {
            return Err(lengths);
        }

        let cols = columns.len();
        let mut values = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            values.extend(columns.iter().map(|c| c[i]));
        }
        Ok(Self { rows, cols, values })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.cols..(i + 1) * self.cols]
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self.values[i * self.cols + j]).collect()
    }
}

/// A finished weld: its time-series matrix plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    /// `"{DOE}, {weld}"`
    pub name: String,
    pub data: Matrix,
    /// DOE and weld first, `headers` last
    pub attributes: Vec<Attribute>,
}

impl OutputRecord {
    /// Column headers of the matrix, from the `headers` attribute.
    pub fn headers(&self) -> &[String] {
        self.attributes
            .iter()
            .find_map(|a| match a {
                Attribute::HeaderList(h) => Some(h.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Copy of the record keeping only user-selected attributes and `headers`.
    pub fn with_selected_attributes(&self, selected: &BTreeSet<String>) -> Self {
        Self {
            name: self.name.clone(),
            data: self.data.clone(),
            attributes: self
                .attributes
                .iter()
                .filter(|a| a.name() == HEADERS_ATTRIBUTE || selected.contains(a.name()))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> OutputRecord {
        OutputRecord {
            name: "3, 1001".into(),
            data: Matrix::from_columns(&[vec![1.0, 2.0]]).unwrap(),
            attributes: vec![
                Attribute::Scalar {
                    name: "# for DoE Based Model".into(),
                    value: Cell::Number(3.0),
                },
                Attribute::Scalar {
                    name: "Material".into(),
                    value: Cell::Text("X".into()),
                },
                Attribute::HeaderList(vec!["Force".into()]),
            ],
        }
    }

    #[test]
    fn test_from_columns() {
        let m = Matrix::from_columns(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.cols(), 2);
        assert_eq!(m.row(1), &[2.0, 5.0]);
        assert_eq!(m.column(1), vec![4.0, 5.0, 6.0]);
        assert_eq!(m.values(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_from_columns_mismatch() {
        assert_eq!(
            Matrix::from_columns(&[vec![1.0, 2.0], vec![1.0]]),
            Err(vec![2, 1])
        );
        assert_eq!(Matrix::from_columns(&[]), Err(vec![]));
    }

    #[test]
    fn test_from_row_major() {
        assert!(Matrix::from_row_major(2, 2, vec![1.0; 4]).is_some());
        assert!(Matrix::from_row_major(2, 2, vec![1.0; 3]).is_none());
    }

    #[test]
    fn test_headers_attribute() {
        let r = record();
        assert_eq!(r.headers(), &["Force".to_string()]);
        assert_eq!(r.attribute("headers").map(Attribute::name), Some("headers"));
        assert!(r.attribute("Gun").is_none());
    }

    #[test]
    fn test_with_selected_attributes() {
        let r = record();
        let selected: BTreeSet<String> = ["Material".to_string()].into_iter().collect();
        let filtered = r.with_selected_attributes(&selected);
        let names: Vec<_> = filtered.attributes.iter().map(Attribute::name).collect();
        assert_eq!(names, vec!["Material", "headers"]);
        assert_eq!(filtered.data, r.data);
    }
}
