//! Axis-aligned bounding boxes.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Componentwise `[lower, upper]` extent of a set of points.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::geometry::bounding_box::BoundingBox;
///
/// let bbox = BoundingBox::from_points([[0.0, 1.0], [2.0, -1.0]].iter().map(|p| &p[..]), 2);
/// assert_eq!(bbox.lower(), &[0.0, -1.0]);
/// assert!(bbox.contains(&[1.0, 0.0]));
/// assert!(!bbox.contains(&[3.0, 0.0]));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BoundingBox {
    /// The empty box of the given dimension (contains nothing).
    #[must_use]
    pub fn empty(dimension: usize) -> Self {
        Self {
            lower: vec![f64::INFINITY; dimension],
            upper: vec![f64::NEG_INFINITY; dimension],
        }
    }

    /// Smallest box enclosing `points`; empty when there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f64]>, dimension: usize) -> Self {
        let mut bbox = Self::empty(dimension);
        for p in points {
            bbox.expand(p);
        }
        bbox
    }

    /// Grows the box to include `point`.
    pub fn expand(&mut self, point: &[f64]) {
        for ((lo, hi), &x) in self.lower.iter_mut().zip(self.upper.iter_mut()).zip(point) {
            *lo = lo.min(x);
            *hi = hi.max(x);
        }
    }

    /// Lower corner.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper corner.
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Number of axes.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Width along `axis` (negative for an empty box).
    #[must_use]
    pub fn extent(&self, axis: usize) -> f64 {
        self.upper[axis] - self.lower[axis]
    }

    /// Closed containment test.
    #[must_use]
    pub fn contains(&self, point: &[f64]) -> bool {
        point
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(&x, (&lo, &hi))| lo <= x && x <= hi)
    }

    /// Containment with each axis widened by `epsilon` times its extent.
    #[must_use]
    pub fn contains_with_tolerance(&self, point: &[f64], epsilon: f64) -> bool {
        point
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(&x, (&lo, &hi))| {
                let slack = epsilon * (hi - lo);
                lo - slack <= x && x <= hi + slack
            })
    }
}
