//! Point location: which simplex of a mesh encloses a point?
//!
//! [`SimplexLocator`] holds the data every strategy needs (vertices,
//! simplices, the global bounding box and one bounding box per simplex) and
//! the containment predicate. Strategies implement
//! [`EnclosingSimplexAlgorithm`] on top of it and differ only in how they pick
//! candidate simplices.
//!
//! A point that no simplex encloses is an ordinary outcome near mesh
//! boundaries, reported as `None` rather than as an error.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::indices::IndicesCollection;
use crate::core::parallel::Executor;
use crate::core::sample::Sample;
use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::matrix::SquareMatrix;
use crate::geometry::predicates::{
    SimplexDimension, build_simplex_matrix, coordinates_within, point_in_simplex_closed_form,
};

/// Default tolerance on barycentric coordinates.
pub const DEFAULT_BARYCENTRIC_EPSILON: f64 = 1e-12;

const fn default_barycentric_epsilon() -> f64 {
    DEFAULT_BARYCENTRIC_EPSILON
}

/// Errors raised when binding or querying a point-location strategy.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EnclosingSimplexError {
    /// A simplex references a vertex that does not exist.
    #[error(
        "Simplex {simplex} references vertex index {vertex_index}, which must be less than the number of vertices {vertices_number}"
    )]
    VertexIndexOutOfRange {
        /// Index of the offending simplex.
        simplex: usize,
        /// The out-of-range vertex index.
        vertex_index: usize,
        /// Number of vertices supplied.
        vertices_number: usize,
    },
    /// A simplex does not have `dim + 1` vertices.
    #[error("Simplex {simplex} has {actual} vertices, expected {expected}")]
    InvalidSimplexArity {
        /// Index of the offending simplex.
        simplex: usize,
        /// Required number of vertices.
        expected: usize,
        /// Number of vertices found.
        actual: usize,
    },
    /// A tolerance was negative.
    #[error("Barycentric coordinates epsilon must be non-negative, got {epsilon}")]
    NegativeEpsilon {
        /// The rejected tolerance.
        epsilon: f64,
    },
    /// A query point does not have the dimension of the vertices.
    #[error("Invalid point dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the bound vertices.
        expected: usize,
        /// Dimension of the query.
        actual: usize,
    },
}

// =============================================================================
// LOCATOR
// =============================================================================

/// Persisted part of a [`SimplexLocator`]; bounding boxes are derived.
#[derive(Serialize, Deserialize)]
struct LocatorRecord {
    vertices: Sample,
    simplices: IndicesCollection,
    #[serde(default = "default_barycentric_epsilon")]
    epsilon: f64,
}

/// Vertices, simplices and cached bounding boxes shared by all strategies.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::core::algorithms::enclosing_simplex::SimplexLocator;
/// use simplicial_interp::core::indices::IndicesCollection;
/// use simplicial_interp::core::sample::Sample;
/// use simplicial_interp::geometry::matrix::SquareMatrix;
///
/// let vertices = Sample::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
/// let simplices = IndicesCollection::from_rows(&[[0, 1, 2]]);
/// let locator = SimplexLocator::from_parts(&vertices, &simplices).unwrap();
///
/// let mut scratch = SquareMatrix::new(0);
/// assert!(locator.check_point_in_simplex(&[0.2, 0.2], 0, &mut scratch));
/// assert!(!locator.check_point_in_simplex(&[0.8, 0.8], 0, &mut scratch));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "LocatorRecord", into = "LocatorRecord")]
pub struct SimplexLocator {
    vertices: Sample,
    simplices: IndicesCollection,
    bounding_box: BoundingBox,
    lower_bounding_boxes: Sample,
    upper_bounding_boxes: Sample,
    epsilon: f64,
}

impl Default for SimplexLocator {
    fn default() -> Self {
        Self::with_epsilon(DEFAULT_BARYCENTRIC_EPSILON)
    }
}

impl TryFrom<LocatorRecord> for SimplexLocator {
    type Error = EnclosingSimplexError;

    fn try_from(record: LocatorRecord) -> Result<Self, Self::Error> {
        let mut locator = Self::default();
        locator.set_barycentric_epsilon(record.epsilon)?;
        locator.set_vertices_and_simplices(&record.vertices, &record.simplices)?;
        Ok(locator)
    }
}

impl From<SimplexLocator> for LocatorRecord {
    fn from(locator: SimplexLocator) -> Self {
        Self {
            vertices: locator.vertices,
            simplices: locator.simplices,
            epsilon: locator.epsilon,
        }
    }
}

impl SimplexLocator {
    /// An unbound locator with the given tolerance (not validated).
    #[must_use]
    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            vertices: Sample::empty(0),
            simplices: IndicesCollection::new(),
            bounding_box: BoundingBox::empty(0),
            lower_bounding_boxes: Sample::empty(0),
            upper_bounding_boxes: Sample::empty(0),
            epsilon,
        }
    }

    /// A locator bound to `vertices` and `simplices`.
    ///
    /// # Errors
    ///
    /// Same as [`SimplexLocator::set_vertices_and_simplices`].
    pub fn from_parts(
        vertices: &Sample,
        simplices: &IndicesCollection,
    ) -> Result<Self, EnclosingSimplexError> {
        let mut locator = Self::default();
        locator.set_vertices_and_simplices(vertices, simplices)?;
        Ok(locator)
    }

    /// Binds new data and rebuilds every bounding box.
    ///
    /// Returns `false` without doing anything when the data is bit-identical
    /// to what is already bound. On error the locator is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`EnclosingSimplexError::InvalidSimplexArity`] or
    /// [`EnclosingSimplexError::VertexIndexOutOfRange`] for the first
    /// malformed simplex.
    pub fn set_vertices_and_simplices(
        &mut self,
        vertices: &Sample,
        simplices: &IndicesCollection,
    ) -> Result<bool, EnclosingSimplexError> {
        if self.vertices.bitwise_eq(vertices) && self.simplices == *simplices {
            return Ok(false);
        }
        let dimension = vertices.dimension();
        let vertices_number = vertices.len();
        for (index, simplex) in simplices.iter().enumerate() {
            if simplex.len() != dimension + 1 {
                return Err(EnclosingSimplexError::InvalidSimplexArity {
                    simplex: index,
                    expected: dimension + 1,
                    actual: simplex.len(),
                });
            }
            if let Some(&vertex_index) = simplex.iter().find(|&&v| v >= vertices_number) {
                return Err(EnclosingSimplexError::VertexIndexOutOfRange {
                    simplex: index,
                    vertex_index,
                    vertices_number,
                });
            }
        }

        let mut lower = Sample::new(simplices.len(), dimension);
        let mut upper = Sample::new(simplices.len(), dimension);
        for (index, simplex) in simplices.iter().enumerate() {
            let bbox = BoundingBox::from_points(simplex.iter().map(|&v| vertices.row(v)), dimension);
            lower.row_mut(index).copy_from_slice(bbox.lower());
            upper.row_mut(index).copy_from_slice(bbox.upper());
        }

        self.bounding_box = BoundingBox::from_points(vertices.rows(), dimension);
        self.vertices = vertices.clone();
        self.simplices = simplices.clone();
        self.lower_bounding_boxes = lower;
        self.upper_bounding_boxes = upper;
        tracing::debug!(
            vertices = vertices_number,
            simplices = self.simplices.len(),
            dimension,
            "rebuilt simplex bounding boxes"
        );
        Ok(true)
    }

    /// Bound vertices.
    #[must_use]
    pub const fn vertices(&self) -> &Sample {
        &self.vertices
    }

    /// Bound simplices.
    #[must_use]
    pub const fn simplices(&self) -> &IndicesCollection {
        &self.simplices
    }

    /// Number of bound simplices.
    #[must_use]
    pub fn simplices_number(&self) -> usize {
        self.simplices.len()
    }

    /// Dimension of the bound vertices.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.vertices.dimension()
    }

    /// Box enclosing every vertex.
    #[must_use]
    pub const fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    /// Lower and upper corners of the box of simplex `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.simplices_number()`.
    #[must_use]
    pub fn simplex_bounds(&self, index: usize) -> (&[f64], &[f64]) {
        (
            self.lower_bounding_boxes.row(index),
            self.upper_bounding_boxes.row(index),
        )
    }

    /// Tolerance on barycentric coordinates.
    #[must_use]
    pub const fn barycentric_epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Sets the tolerance on barycentric coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`EnclosingSimplexError::NegativeEpsilon`] if `epsilon < 0` (or NaN).
    pub fn set_barycentric_epsilon(&mut self, epsilon: f64) -> Result<(), EnclosingSimplexError> {
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(EnclosingSimplexError::NegativeEpsilon { epsilon });
        }
        self.epsilon = epsilon;
        Ok(())
    }

    /// Fails unless `point` has the dimension of the bound vertices.
    ///
    /// # Errors
    ///
    /// Returns [`EnclosingSimplexError::DimensionMismatch`].
    pub fn check_dimension(&self, point: &[f64]) -> Result<(), EnclosingSimplexError> {
        if point.len() != self.dimension() {
            return Err(EnclosingSimplexError::DimensionMismatch {
                expected: self.dimension(),
                actual: point.len(),
            });
        }
        Ok(())
    }

    /// Relative widening applied to bounding-box rejection tests.
    ///
    /// A point whose barycentric coordinates are all `≥ −ε` lies at most
    /// `d·ε` times the simplex extent outside the simplex box along any axis.
    #[must_use]
    pub fn bounding_box_tolerance(&self) -> f64 {
        self.dimension().max(1) as f64 * self.epsilon
    }

    /// Returns `true` if `point` may lie in some simplex.
    #[must_use]
    pub fn in_bounding_box(&self, point: &[f64]) -> bool {
        self.bounding_box
            .contains_with_tolerance(point, self.bounding_box_tolerance())
    }

    /// Returns `true` if `point` may lie in simplex `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.simplices_number()`.
    #[must_use]
    pub fn in_simplex_bounding_box(&self, point: &[f64], index: usize) -> bool {
        let tolerance = self.bounding_box_tolerance();
        let (lower, upper) = self.simplex_bounds(index);
        point
            .iter()
            .zip(lower.iter().zip(upper))
            .all(|(&x, (&lo, &hi))| {
                let slack = tolerance * (hi - lo);
                lo - slack <= x && x <= hi + slack
            })
    }

    /// Containment test of `point` in simplex `index` within the barycentric
    /// tolerance.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.simplices_number()` or if `point` does not
    /// have the locator dimension.
    #[must_use]
    pub fn check_point_in_simplex(
        &self,
        point: &[f64],
        index: usize,
        scratch: &mut SquareMatrix,
    ) -> bool {
        self.check_point_in_simplex_with(SimplexDimension::of(self.dimension()), point, index, scratch)
    }

    /// [`SimplexLocator::check_point_in_simplex`] through an explicit code path.
    ///
    /// Closed forms skip the bounding boxes; `General` rejects through the
    /// global box, then the simplex box, then solves for the barycentric
    /// coordinates.
    ///
    /// # Panics
    ///
    /// Same as [`SimplexLocator::check_point_in_simplex`].
    #[must_use]
    pub fn check_point_in_simplex_with(
        &self,
        variant: SimplexDimension,
        point: &[f64],
        index: usize,
        scratch: &mut SquareMatrix,
    ) -> bool {
        let simplex = self.simplices.row(index);
        if let Some(inside) =
            point_in_simplex_closed_form(variant, &self.vertices, simplex, point, self.epsilon)
        {
            return inside;
        }
        if !self.in_bounding_box(point) || !self.in_simplex_bounding_box(point, index) {
            return false;
        }
        build_simplex_matrix(&self.vertices, simplex, scratch);
        let mut rhs = Vec::with_capacity(point.len() + 1);
        rhs.extend_from_slice(point);
        rhs.push(1.0);
        scratch
            .solve_linear_system(&rhs)
            .is_ok_and(|coordinates| coordinates_within(&coordinates, self.epsilon))
    }

    /// First simplex, in index order, among `candidates` that contains `point`.
    pub fn first_enclosing<I>(&self, point: &[f64], candidates: I) -> Option<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut scratch = SquareMatrix::new(0);
        candidates
            .into_iter()
            .find(|&index| self.check_point_in_simplex(point, index, &mut scratch))
    }
}

// =============================================================================
// STRATEGY TRAIT
// =============================================================================

/// A point-location strategy bound to one (vertices, simplices) pair.
///
/// Implementors provide [`query`](EnclosingSimplexAlgorithm::query); the
/// batched query, binding and tolerance handling are shared.
pub trait EnclosingSimplexAlgorithm: Send + Sync + fmt::Debug {
    /// Shared locator data.
    fn locator(&self) -> &SimplexLocator;

    /// Mutable access to the shared locator data.
    fn locator_mut(&mut self) -> &mut SimplexLocator;

    /// Short human-readable strategy name.
    fn name(&self) -> &'static str;

    /// Same strategy and configuration, bound to nothing.
    fn empty_clone(&self) -> Box<dyn EnclosingSimplexAlgorithm>;

    /// Index of a simplex enclosing `point`, or `None`.
    ///
    /// `point` must have the locator dimension.
    fn query(&self, point: &[f64]) -> Option<usize>;

    /// Rebuilds strategy-specific acceleration data after new data was bound.
    fn rebuild_index(&mut self) {}

    /// Binds new data; a no-op when it is bit-identical to the current data.
    ///
    /// # Errors
    ///
    /// Same as [`SimplexLocator::set_vertices_and_simplices`].
    fn set_vertices_and_simplices(
        &mut self,
        vertices: &Sample,
        simplices: &IndicesCollection,
    ) -> Result<(), EnclosingSimplexError> {
        if self.locator_mut().set_vertices_and_simplices(vertices, simplices)? {
            self.rebuild_index();
        }
        Ok(())
    }

    /// A new instance of this strategy bound to `vertices` and `simplices`.
    ///
    /// # Errors
    ///
    /// Same as [`SimplexLocator::set_vertices_and_simplices`].
    fn rebind(
        &self,
        vertices: &Sample,
        simplices: &IndicesCollection,
    ) -> Result<Box<dyn EnclosingSimplexAlgorithm>, EnclosingSimplexError> {
        let mut fresh = self.empty_clone();
        fresh.set_vertices_and_simplices(vertices, simplices)?;
        Ok(fresh)
    }

    /// [`query`](EnclosingSimplexAlgorithm::query) with a dimension check.
    ///
    /// # Errors
    ///
    /// Returns [`EnclosingSimplexError::DimensionMismatch`].
    fn locate(&self, point: &[f64]) -> Result<Option<usize>, EnclosingSimplexError> {
        self.locator().check_dimension(point)?;
        Ok(self.query(point))
    }

    /// Locates every row of `points`; slot `i` answers row `i`.
    ///
    /// # Errors
    ///
    /// Returns [`EnclosingSimplexError::DimensionMismatch`].
    fn query_sample(
        &self,
        points: &Sample,
        executor: &Executor,
    ) -> Result<Vec<Option<usize>>, EnclosingSimplexError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let dimension = self.locator().dimension();
        if points.dimension() != dimension {
            return Err(EnclosingSimplexError::DimensionMismatch {
                expected: dimension,
                actual: points.dimension(),
            });
        }
        let mut located = vec![None; points.len()];
        executor.map_chunks(&mut located, executor.grain_size(), |offset, chunk| {
            for (k, slot) in chunk.iter_mut().enumerate() {
                *slot = self.query(points.row(offset + k));
            }
        });
        Ok(located)
    }

    /// Containment test of `point` in simplex `index`.
    fn check_point_in_simplex(
        &self,
        point: &[f64],
        index: usize,
        scratch: &mut SquareMatrix,
    ) -> bool {
        self.locator().check_point_in_simplex(point, index, scratch)
    }

    /// Tolerance on barycentric coordinates.
    fn barycentric_epsilon(&self) -> f64 {
        self.locator().barycentric_epsilon()
    }

    /// Sets the tolerance on barycentric coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`EnclosingSimplexError::NegativeEpsilon`].
    fn set_barycentric_epsilon(&mut self, epsilon: f64) -> Result<(), EnclosingSimplexError> {
        self.locator_mut().set_barycentric_epsilon(epsilon)
    }
}

// =============================================================================
// NAIVE STRATEGY
// =============================================================================

/// Global bounding-box rejection followed by a scan of every simplex.
///
/// Returns the lowest-index enclosing simplex.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NaiveEnclosingSimplex {
    locator: SimplexLocator,
}

impl NaiveEnclosingSimplex {
    /// An unbound instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An instance bound to `vertices` and `simplices`.
    ///
    /// # Errors
    ///
    /// Same as [`SimplexLocator::set_vertices_and_simplices`].
    pub fn from_parts(
        vertices: &Sample,
        simplices: &IndicesCollection,
    ) -> Result<Self, EnclosingSimplexError> {
        Ok(Self {
            locator: SimplexLocator::from_parts(vertices, simplices)?,
        })
    }
}

impl EnclosingSimplexAlgorithm for NaiveEnclosingSimplex {
    fn locator(&self) -> &SimplexLocator {
        &self.locator
    }

    fn locator_mut(&mut self) -> &mut SimplexLocator {
        &mut self.locator
    }

    fn name(&self) -> &'static str {
        "naive"
    }

    fn empty_clone(&self) -> Box<dyn EnclosingSimplexAlgorithm> {
        Box::new(Self {
            locator: SimplexLocator::with_epsilon(self.locator.barycentric_epsilon()),
        })
    }

    fn query(&self, point: &[f64]) -> Option<usize> {
        if !self.locator.in_bounding_box(point) {
            return None;
        }
        self.locator
            .first_enclosing(point, 0..self.locator.simplices_number())
    }
}
