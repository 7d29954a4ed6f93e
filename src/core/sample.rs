//! Dense row-major numeric tables.
//!
//! A [`Sample`] stores `len()` points of a fixed `dimension` contiguously, one
//! row per point. It is the vertex table of a [`Mesh`](crate::core::mesh::Mesh),
//! the value table of a P1 field and the input/output of every batched query.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or reshaping a [`Sample`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    /// A point does not have the dimension of the sample.
    #[error("Dimension mismatch: expected a point of dimension {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the sample.
        expected: usize,
        /// Dimension of the offending point.
        actual: usize,
    },
    /// Flat storage length is not a multiple of the dimension.
    #[error("Flat data of length {len} cannot be split into rows of dimension {dimension}")]
    RaggedData {
        /// Length of the flat buffer.
        len: usize,
        /// Requested row dimension.
        dimension: usize,
    },
    /// The description does not have one label per component.
    #[error("Invalid description: got {actual} labels for a sample of dimension {expected}")]
    InvalidDescription {
        /// Dimension of the sample.
        expected: usize,
        /// Number of labels supplied.
        actual: usize,
    },
}

/// Row-major table of `f64` points sharing one dimension.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::core::sample::Sample;
///
/// let sample = Sample::from_rows(&[[0.0, 1.0], [2.0, -1.0]]).unwrap();
/// assert_eq!(sample.len(), 2);
/// assert_eq!(sample.row(1), &[2.0, -1.0]);
/// assert_eq!(sample.min().unwrap(), vec![0.0, -1.0]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    dimension: usize,
    data: Vec<f64>,
    #[serde(default)]
    description: Vec<String>,
}

impl Sample {
    /// Creates a zero-filled sample of `size` rows.
    #[must_use]
    pub fn new(size: usize, dimension: usize) -> Self {
        Self {
            dimension,
            data: vec![0.0; size * dimension],
            description: Vec::new(),
        }
    }

    /// Creates an empty sample of the given dimension.
    #[must_use]
    pub const fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            description: Vec::new(),
        }
    }

    /// Builds a sample from rows that must all share one length.
    ///
    /// An empty slice yields an empty sample of dimension 0.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::DimensionMismatch`] if a row differs in length from the first.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, SampleError> {
        let dimension = rows.first().map_or(0, |r| r.as_ref().len());
        let mut sample = Self::empty(dimension);
        sample.data.reserve(rows.len() * dimension);
        for row in rows {
            sample.push(row.as_ref())?;
        }
        Ok(sample)
    }

    /// Wraps a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::RaggedData`] if `data.len()` is not a multiple of `dimension`.
    pub fn from_flat(dimension: usize, data: Vec<f64>) -> Result<Self, SampleError> {
        let ragged = if dimension == 0 {
            !data.is_empty()
        } else {
            data.len() % dimension != 0
        };
        if ragged {
            return Err(SampleError::RaggedData {
                len: data.len(),
                dimension,
            });
        }
        Ok(Self {
            dimension,
            data,
            description: Vec::new(),
        })
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    /// Returns `true` when the sample holds no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of components per row.
    #[inline]
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Row `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[inline]
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Mutable row `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[inline]
    pub fn row_mut(&mut self, index: usize) -> &mut [f64] {
        let start = index * self.dimension;
        &mut self.data[start..start + self.dimension]
    }

    /// Component `j` of row `i`.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dimension + j]
    }

    /// Iterates over the rows in order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        // chunks_exact(0) panics, and a 0-dimensional sample has no rows anyway
        self.data.chunks_exact(self.dimension.max(1)).take(self.len())
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::DimensionMismatch`] if `point.len() != self.dimension()`.
    pub fn push(&mut self, point: &[f64]) -> Result<(), SampleError> {
        if point.len() != self.dimension {
            return Err(SampleError::DimensionMismatch {
                expected: self.dimension,
                actual: point.len(),
            });
        }
        self.data.extend_from_slice(point);
        Ok(())
    }

    /// Flat row-major view of the data.
    #[inline]
    #[must_use]
    pub fn as_flat(&self) -> &[f64] {
        &self.data
    }

    /// Mutable flat row-major view of the data.
    #[inline]
    pub fn as_flat_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Componentwise minimum, or `None` for an empty sample.
    #[must_use]
    pub fn min(&self) -> Option<Vec<f64>> {
        self.reduce(f64::min)
    }

    /// Componentwise maximum, or `None` for an empty sample.
    #[must_use]
    pub fn max(&self) -> Option<Vec<f64>> {
        self.reduce(f64::max)
    }

    fn reduce(&self, op: fn(f64, f64) -> f64) -> Option<Vec<f64>> {
        let mut rows = self.rows();
        let mut acc = rows.next()?.to_vec();
        for row in rows {
            for (a, &v) in acc.iter_mut().zip(row) {
                *a = op(*a, v);
            }
        }
        Some(acc)
    }

    /// Component labels; empty when none were set.
    #[must_use]
    pub fn description(&self) -> &[String] {
        &self.description
    }

    /// Sets the component labels.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::InvalidDescription`] unless there is exactly one label per component.
    pub fn set_description<S: Into<String>>(
        &mut self,
        labels: impl IntoIterator<Item = S>,
    ) -> Result<(), SampleError> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.len() != self.dimension {
            return Err(SampleError::InvalidDescription {
                expected: self.dimension,
                actual: labels.len(),
            });
        }
        self.description = labels;
        Ok(())
    }

    /// Bit-for-bit equality of shape and data (labels ignored).
    ///
    /// Unlike `==`, this treats `NaN` payloads as equal to themselves and
    /// distinguishes `0.0` from `-0.0`.
    #[must_use]
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension
            && self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_rejects_mixed_lengths() {
        let rows: Vec<Vec<f64>> = vec![vec![0.0, 1.0], vec![2.0]];
        assert_eq!(
            Sample::from_rows(&rows),
            Err(SampleError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn from_flat_rejects_ragged_data() {
        assert!(matches!(
            Sample::from_flat(3, vec![0.0; 7]),
            Err(SampleError::RaggedData { len: 7, dimension: 3 })
        ));
        assert_eq!(Sample::from_flat(3, vec![0.0; 6]).unwrap().len(), 2);
    }

    #[test]
    fn min_max_are_componentwise() {
        let s = Sample::from_rows(&[[1.0, 5.0], [-2.0, 7.0], [0.5, -3.0]]).unwrap();
        assert_eq!(s.min().unwrap(), vec![-2.0, -3.0]);
        assert_eq!(s.max().unwrap(), vec![1.0, 7.0]);
        assert!(Sample::empty(2).min().is_none());
    }

    #[test]
    fn rows_iterates_in_order() {
        let s = Sample::from_rows(&[[1.0], [2.0], [3.0]]).unwrap();
        let collected: Vec<f64> = s.rows().map(|r| r[0]).collect();
        assert_eq!(collected, vec![1.0, 2.0, 3.0]);
        assert_eq!(Sample::new(0, 0).rows().count(), 0);
    }

    #[test]
    fn description_must_match_dimension() {
        let mut s = Sample::new(2, 2);
        assert!(s.set_description(["x"]).is_err());
        s.set_description(["x", "y"]).unwrap();
        assert_eq!(s.description(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn bitwise_eq_distinguishes_signed_zero() {
        let a = Sample::from_rows(&[[0.0]]).unwrap();
        let b = Sample::from_rows(&[[-0.0]]).unwrap();
        assert_eq!(a, b);
        assert!(!a.bitwise_eq(&b));

        let nan = Sample::from_rows(&[[f64::NAN]]).unwrap();
        assert!(nan.bitwise_eq(&nan.clone()));
    }
}
