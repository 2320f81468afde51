//! In-memory tabular data loaded from the DOE exports.
//!
//! Every CSV field becomes a [`Cell`]. Cells carry a total order so that rows
//! can be sorted and grouped by identifier columns regardless of whether the
//! identifiers are numeric or textual.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A single CSV value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Field parsed as a finite or infinite float.
    Number(f64),
    /// Any non-numeric, non-blank field.
    Text(String),
    /// Blank field.
    Empty,
}

impl Cell {
    /// Parse a raw CSV field. Surrounding whitespace is dropped. Blank fields
    /// and `NaN` become [`Cell::Empty`].
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_nan() => Cell::Empty,
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Numeric value of the cell. Blank cells read as `NaN`, text as `None`.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Empty => Some(f64::NAN),
            Cell::Text(_) => None,
        }
    }

    /// Integer value of the cell, if it holds a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Number(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value with `-0.0` folded into `0.0`, for ordering and hashing.
    fn canonical(v: f64) -> f64 {
        if v == 0.0 {
            0.0
        } else {
            v
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Number(_) => 1,
            Cell::Text(_) => 2,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => {
                Cell::canonical(*a).total_cmp(&Cell::canonical(*b))
            }
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Cell::Number(v) => Cell::canonical(*v).to_bits().hash(state),
            Cell::Text(s) => s.hash(state),
            Cell::Empty => {}
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(_) => match self.as_i64() {
                Some(i) => write!(f, "{}", i),
                None => write!(f, "{}", self.as_f64().unwrap_or(f64::NAN)),
            },
            Cell::Text(s) => f.write_str(s),
            Cell::Empty => Ok(()),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Cell::Empty
        } else {
            Cell::Number(v)
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::parse(s)
    }
}

/// Row-major table with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given column headers.
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from headers and rows. Every row must match the header width.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == headers.len()));
        Self { headers, rows }
    }

    #[inline]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[inline]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Iterate over the values of one column, or `None` if it does not exist.
    pub fn column<'a>(&'a self, header: &str) -> Option<impl Iterator<Item = &'a Cell> + 'a> {
        let idx = self.column_index(header)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// First-row value of a column.
    pub fn first(&self, header: &str) -> Option<&Cell> {
        let idx = self.column_index(header)?;
        self.rows.first().map(|row| &row[idx])
    }

    /// Number of distinct non-blank values in a column.
    pub fn distinct_count(&self, header: &str) -> usize {
        let mut values: Vec<&Cell> = match self.column(header) {
            Some(col) => col.filter(|c| !c.is_empty()).collect(),
            None => return 0,
        };
        values.sort();
        values.dedup();
        values.len()
    }

    /// Remove the rows at the given positions. Out-of-range positions are ignored.
    pub fn drop_rows(&mut self, positions: &[usize]) {
        if positions.is_empty() {
            return;
        }
        let mut i = 0;
        self.rows.retain(|_| {
            let keep = !positions.contains(&i);
            i += 1;
            keep
        });
    }

    /// Mutable access to one column's cells.
    pub fn column_mut(&mut self, header: &str) -> Option<impl Iterator<Item = &mut Cell>> {
        let idx = self.column_index(header)?;
        Some(self.rows.iter_mut().map(move |row| &mut row[idx]))
    }
}
