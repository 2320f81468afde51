//! Time-axis transforms: linear gap interpolation and zero re-insertion.
//!
//! Both operate on an integer time index. [`interpolate`] makes the index
//! dense by synthesizing the missing steps between neighbouring samples;
//! [`zero_fill`] rebuilds a channel whose zero samples were never recorded.

use thiserror::Error;

/// Errors from the time-axis transforms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("interpolation needs at least 2 index points, got {got}")]
    TooFewPoints { got: usize },

    #[error("value sequence {series} has {got} elements, index has {expected}")]
    LengthMismatch {
        series: usize,
        expected: usize,
        got: usize,
    },

    #[error("zero-fill index {index} is below 1")]
    IndexOutOfRange { index: i64 },

    #[error("zero-fill needs at least one index")]
    EmptyIndex,
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Dense index and the value sequences filled along it.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolated {
    /// `index[0], index[0] + 1, ..., index[n - 1]` for a non-decreasing input.
    pub index: Vec<i64>,
    /// One filled sequence per input sequence, each `index.len()` long.
    pub values: Vec<Vec<f64>>,
}

/// Fill integer gaps in `index` with linearly interpolated values.
///
/// For every neighbouring pair with gap `g = index[i + 1] - index[i] > 1`,
/// the steps `index[i] + 1 ..= index[i + 1] - 1` are inserted and every
/// value sequence gets `v[i] + (v[i + 1] - v[i]) * k / g` at step `k`.
/// Original samples are kept verbatim, including the last one, so nothing
/// is extrapolated beyond `[index[0], index[n - 1]]`. Pairs with a gap of 1
/// or less are copied as they are.
///
/// # Errors
///
/// Returns [`TransformError::TooFewPoints`] for fewer than two index points
/// and [`TransformError::LengthMismatch`] when a value sequence is not as long
/// as the index.
///
/// # Example
///
/// ```
/// use doe_database::core::transforms::interpolate;
///
/// let out = interpolate(&[0, 1, 4], &[vec![10.0, 20.0, 50.0]]).unwrap();
/// assert_eq!(out.index, vec![0, 1, 2, 3, 4]);
/// assert_eq!(out.values[0], vec![10.0, 20.0, 30.0, 40.0, 50.0]);
/// ```
pub fn interpolate<S: AsRef<[f64]>>(index: &[i64], values: &[S]) -> Result<Interpolated> {
    let n = index.len();
    if n < 2 {
        return Err(TransformError::TooFewPoints { got: n });
    }
    for (series, v) in values.iter().enumerate() {
        let got = v.as_ref().len();
        if got != n {
            return Err(TransformError::LengthMismatch {
                series,
                expected: n,
                got,
            });
        }
    }

    let span = (index[n - 1] - index[0]).max(0) as usize + 1;
    let capacity = span.max(n);
    let mut out_index = Vec::with_capacity(capacity);
    let mut out_values: Vec<Vec<f64>> = values.iter().map(|_| Vec::with_capacity(capacity)).collect();

    for i in 0..n - 1 {
        out_index.push(index[i]);
        for (out, v) in out_values.iter_mut().zip(values) {
            out.push(v.as_ref()[i]);
        }

        let gap = index[i + 1] - index[i];
        if gap > 1 {
            for k in 1..gap {
                out_index.push(index[i] + k);
                let t = k as f64 / gap as f64;
                for (out, v) in out_values.iter_mut().zip(values) {
                    let v = v.as_ref();
                    out.push(v[i] + (v[i + 1] - v[i]) * t);
                }
            }
        }
    }

    out_index.push(index[n - 1]);
    for (out, v) in out_values.iter_mut().zip(values) {
        out.push(v.as_ref()[n - 1]);
    }

    Ok(Interpolated {
        index: out_index,
        values: out_values,
    })
}

/// Rebuild a channel whose zero samples were dropped at recording time.
///
/// Returns a zero array of length `max(indices)` with `values[k]` written at
/// position `indices[k] - 1`. Idle samples are exactly zero, so they are
/// re-inserted rather than interpolated.
///
/// # Errors
///
/// Returns an error if `indices` is empty, if any index is below 1, or if
/// `values` is not as long as `indices`.
///
/// # Example
///
/// ```
/// use doe_database::core::transforms::zero_fill;
///
/// assert_eq!(zero_fill(&[2, 4], &[5.0, 9.0]).unwrap(), vec![0.0, 5.0, 0.0, 9.0]);
/// ```
pub fn zero_fill(indices: &[i64], values: &[f64]) -> Result<Vec<f64>> {
    if values.len() != indices.len() {
        return Err(TransformError::LengthMismatch {
            series: 0,
            expected: indices.len(),
            got: values.len(),
        });
    }
    let max = *indices.iter().max().ok_or(TransformError::EmptyIndex)?;
    if let Some(&index) = indices.iter().find(|&&i| i < 1) {
        return Err(TransformError::IndexOutOfRange { index });
    }

    let mut filled = vec![0.0; max as usize];
    for (&i, &v) in indices.iter().zip(values) {
        filled[(i - 1) as usize] = v;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_fills_gap() {
        let out = interpolate(&[0, 1, 4], &[vec![10.0, 20.0, 50.0]]).unwrap();
        assert_eq!(out.index, vec![0, 1, 2, 3, 4]);
        assert_eq!(out.values, vec![vec![10.0, 20.0, 30.0, 40.0, 50.0]]);
    }

    #[test]
    fn test_interpolate_multiple_series() {
        let out = interpolate(&[1, 3], &[vec![0.0, 2.0], vec![10.0, 0.0]]).unwrap();
        assert_eq!(out.index, vec![1, 2, 3]);
        assert_eq!(out.values[0], vec![0.0, 1.0, 2.0]);
        assert_eq!(out.values[1], vec![10.0, 5.0, 0.0]);
    }

    #[test]
    fn test_interpolate_dense_input_unchanged() {
        let values = vec![1.5, -2.0, 7.25, 3.0];
        let out = interpolate(&[5, 6, 7, 8], &[values.clone()]).unwrap();
        assert_eq!(out.index, vec![5, 6, 7, 8]);
        assert_eq!(out.values[0], values);
    }

    #[test]
    fn test_interpolate_preserves_endpoints() {
        let index = [3, 10, 11, 20];
        let values = vec![0.1, 7.7, -3.3, 42.0];
        let out = interpolate(&index, &[values.clone()]).unwrap();

        assert_eq!(out.index.first(), Some(&3));
        assert_eq!(out.index.last(), Some(&20));
        assert_eq!(out.values[0].first(), Some(&0.1));
        assert_eq!(out.values[0].last(), Some(&42.0));
        assert_eq!(out.index.len(), 18);
        assert!(out.index.iter().all(|&i| (3..=20).contains(&i)));
        // Original samples survive at their own index.
        for (i, v) in index.iter().zip(&values) {
            let pos = out.index.iter().position(|x| x == i).unwrap();
            assert_eq!(out.values[0][pos], *v);
        }
    }

    #[test]
    fn test_interpolate_repeated_index_kept() {
        let out = interpolate(&[1, 1, 2], &[vec![1.0, 2.0, 3.0]]).unwrap();
        assert_eq!(out.index, vec![1, 1, 2]);
        assert_eq!(out.values[0], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_interpolate_without_series() {
        let out = interpolate::<Vec<f64>>(&[0, 3], &[]).unwrap();
        assert_eq!(out.index, vec![0, 1, 2, 3]);
        assert!(out.values.is_empty());
    }

    #[test]
    fn test_interpolate_too_few_points() {
        let result = interpolate(&[4], &[vec![1.0]]);
        assert_eq!(result, Err(TransformError::TooFewPoints { got: 1 }));
    }

    #[test]
    fn test_interpolate_length_mismatch() {
        let result = interpolate(&[0, 1, 2], &[vec![1.0, 2.0, 3.0], vec![1.0]]);
        assert_eq!(
            result,
            Err(TransformError::LengthMismatch {
                series: 1,
                expected: 3,
                got: 1
            })
        );
    }

    #[test]
    fn test_zero_fill() {
        assert_eq!(zero_fill(&[2, 4], &[5.0, 9.0]).unwrap(), vec![0.0, 5.0, 0.0, 9.0]);
    }

    #[test]
    fn test_zero_fill_dense_is_identity() {
        assert_eq!(zero_fill(&[1, 2, 3], &[4.0, 5.0, 6.0]).unwrap(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zero_fill_errors() {
        assert_eq!(zero_fill(&[], &[]), Err(TransformError::EmptyIndex));
        assert_eq!(
            zero_fill(&[0, 2], &[1.0, 2.0]),
            Err(TransformError::IndexOutOfRange { index: 0 })
        );
        assert!(matches!(
            zero_fill(&[1, 2], &[1.0]),
            Err(TransformError::LengthMismatch { .. })
        ));
    }
}
