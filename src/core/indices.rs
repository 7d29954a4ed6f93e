//! Ragged tables of vertex indices.
//!
//! Each row of an [`IndicesCollection`] is the vertex list of one simplex.
//! Rows are expected to share a width of `dim + 1`, but the storage is ragged
//! so that malformed input can be represented and rejected by validation
//! instead of being silently reshaped.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Offsets + flat values storage of integer rows.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::core::indices::IndicesCollection;
///
/// let simplices = IndicesCollection::uniform(3, vec![0, 1, 2, 1, 3, 2]);
/// assert_eq!(simplices.len(), 2);
/// assert_eq!(simplices.row(1), &[1, 3, 2]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<usize>>", into = "Vec<Vec<usize>>")]
pub struct IndicesCollection {
    offsets: Vec<usize>,
    values: Vec<usize>,
}

impl Default for IndicesCollection {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            values: Vec::new(),
        }
    }
}

impl IndicesCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from arbitrary rows.
    pub fn from_rows<R: AsRef<[usize]>>(rows: &[R]) -> Self {
        let mut collection = Self::default();
        for row in rows {
            collection.push(row.as_ref());
        }
        collection
    }

    /// Builds a collection whose rows all have `width` entries.
    ///
    /// A trailing partial row is kept as a shorter row so that validation
    /// reports it rather than losing it.
    #[must_use]
    pub fn uniform(width: usize, values: Vec<usize>) -> Self {
        if width == 0 {
            return Self::default();
        }
        let mut offsets: Vec<usize> = (0..values.len()).step_by(width).collect();
        offsets.push(values.len());
        Self { offsets, values }
    }

    /// Appends one row.
    pub fn push(&mut self, row: &[usize]) {
        self.values.extend_from_slice(row);
        self.offsets.push(self.values.len());
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns `true` when there are no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[inline]
    #[must_use]
    pub fn row(&self, index: usize) -> &[usize] {
        &self.values[self.offsets[index]..self.offsets[index + 1]]
    }

    /// Mutable row `index`; its length cannot change.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[inline]
    pub fn row_mut(&mut self, index: usize) -> &mut [usize] {
        &mut self.values[self.offsets[index]..self.offsets[index + 1]]
    }

    /// Iterates over the rows in order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[usize]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.values[w[0]..w[1]])
    }

    /// All indices, row after row.
    #[must_use]
    pub fn flat_values(&self) -> &[usize] {
        &self.values
    }
}

impl From<Vec<Vec<usize>>> for IndicesCollection {
    fn from(rows: Vec<Vec<usize>>) -> Self {
        Self::from_rows(&rows)
    }
}

impl From<IndicesCollection> for Vec<Vec<usize>> {
    fn from(collection: IndicesCollection) -> Self {
        collection.iter().map(<[usize]>::to_vec).collect()
    }
}
