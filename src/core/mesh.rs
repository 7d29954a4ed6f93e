//! Unstructured simplicial meshes.
//!
//! A [`Mesh`] pairs a vertex table ([`Sample`]) with a table of simplices
//! ([`IndicesCollection`]), each simplex listing the `dim + 1` vertex indices
//! of a segment, triangle, tetrahedron or higher-dimensional simplex.
//!
//! Topology is validated once and the result cached in an explicit
//! [`Validity`] state: any mutator returns the mesh to
//! [`Validity::Unchecked`] and [`Mesh::check_validity`] is the only way back
//! to [`Validity::Valid`].
//!
//! # Examples
//!
//! ```rust
//! use simplicial_interp::core::indices::IndicesCollection;
//! use simplicial_interp::core::mesh::Mesh;
//! use simplicial_interp::core::sample::Sample;
//!
//! // unit square split along its diagonal
//! let vertices = Sample::from_rows(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).unwrap();
//! let simplices = IndicesCollection::from_rows(&[[0, 1, 2], [0, 2, 3]]);
//! let mesh = Mesh::new(vertices, simplices).unwrap();
//!
//! assert!((mesh.volume().unwrap() - 1.0).abs() < 1e-15);
//! let weights = mesh.compute_weights().unwrap();
//! assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-15);
//! ```

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::indices::IndicesCollection;
use crate::core::sample::{Sample, SampleError};
use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::matrix::{MatrixError, SquareMatrix};
use crate::geometry::measures::{p1_elementary_gram_factor, simplex_volume_with};
use crate::geometry::predicates::{
    Orientation, SimplexDimension, barycentric_coordinates_with, build_simplex_matrix,
    coordinates_within, edge_determinant,
};

/// Default tolerance of [`Mesh::check_point_in_simplex_with_coordinates`].
pub const DEFAULT_VERTEX_EPSILON: f64 = 1e-12;

const fn default_vertex_epsilon() -> f64 {
    DEFAULT_VERTEX_EPSILON
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors raised by [`Mesh`] construction and geometry queries.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MeshError {
    /// A simplex does not have `dim + 1` vertices.
    #[error("Simplex {simplex} has {actual} vertices, expected {expected} for a mesh of dimension {dimension}")]
    InvalidSimplexArity {
        /// Index of the offending simplex.
        simplex: usize,
        /// Required number of vertices (`dim + 1`).
        expected: usize,
        /// Number of vertices found.
        actual: usize,
        /// Mesh dimension.
        dimension: usize,
    },
    /// A simplex references a vertex that does not exist.
    #[error(
        "Simplex {simplex} references vertex index {vertex_index}, which must be less than the number of vertices {vertices_number}"
    )]
    VertexIndexOutOfRange {
        /// Index of the offending simplex.
        simplex: usize,
        /// The out-of-range vertex index.
        vertex_index: usize,
        /// Number of vertices in the mesh.
        vertices_number: usize,
    },
    /// A simplex index is past the end of the simplex table.
    #[error("Simplex index {index} must be less than the number of simplices {simplices_number}")]
    SimplexIndexOutOfRange {
        /// Requested simplex index.
        index: usize,
        /// Number of simplices in the mesh.
        simplices_number: usize,
    },
    /// A point does not have the mesh dimension.
    #[error("Invalid point dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Mesh dimension.
        expected: usize,
        /// Dimension of the supplied point.
        actual: usize,
    },
    /// A tolerance was negative.
    #[error("Vertex epsilon must be non-negative, got {epsilon}")]
    NegativeEpsilon {
        /// The rejected tolerance.
        epsilon: f64,
    },
    /// A factorisation of an affine simplex matrix failed.
    #[error("Simplex matrix error: {0}")]
    Matrix(#[from] MatrixError),
    /// A vertex table operation failed.
    #[error(transparent)]
    Sample(#[from] SampleError),
}

// =============================================================================
// VALIDITY
// =============================================================================

/// Cached outcome of topology validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Validity {
    /// Not validated since the last mutation.
    #[default]
    Unchecked,
    /// Every simplex has `dim + 1` in-range vertex indices.
    Valid,
}

// =============================================================================
// MESH
// =============================================================================

/// Vertices plus simplices, with the geometry queries needed by P1
/// interpolation and quadrature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mesh {
    vertices: Sample,
    simplices: IndicesCollection,
    #[serde(default = "default_vertex_epsilon")]
    vertex_epsilon: f64,
    #[serde(skip)]
    validity: Validity,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::from_vertices(Sample::empty(0))
    }
}

impl Mesh {
    /// Builds and validates a mesh.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidSimplexArity`] or
    /// [`MeshError::VertexIndexOutOfRange`] for the first malformed simplex.
    pub fn new(vertices: Sample, simplices: IndicesCollection) -> Result<Self, MeshError> {
        let mut mesh = Self {
            vertices,
            simplices,
            vertex_epsilon: DEFAULT_VERTEX_EPSILON,
            validity: Validity::Unchecked,
        };
        mesh.check_validity()?;
        Ok(mesh)
    }

    /// A mesh made of isolated vertices only.
    #[must_use]
    pub fn from_vertices(vertices: Sample) -> Self {
        Self {
            vertices,
            simplices: IndicesCollection::new(),
            vertex_epsilon: DEFAULT_VERTEX_EPSILON,
            validity: Validity::Valid,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Dimension of the embedding space (and of every simplex).
    #[inline]
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.vertices.dimension()
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertices_number(&self) -> usize {
        self.vertices.len()
    }

    /// Number of simplices.
    #[inline]
    #[must_use]
    pub fn simplices_number(&self) -> usize {
        self.simplices.len()
    }

    /// The vertex table.
    #[must_use]
    pub const fn vertices(&self) -> &Sample {
        &self.vertices
    }

    /// The simplex table.
    #[must_use]
    pub const fn simplices(&self) -> &IndicesCollection {
        &self.simplices
    }

    /// Coordinates of vertex `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.vertices_number()`.
    #[must_use]
    pub fn vertex(&self, index: usize) -> &[f64] {
        self.vertices.row(index)
    }

    /// Vertex indices of simplex `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.simplices_number()`.
    #[must_use]
    pub fn simplex(&self, index: usize) -> &[usize] {
        self.simplices.row(index)
    }

    /// Replaces the vertex table.
    pub fn set_vertices(&mut self, vertices: Sample) {
        self.vertices = vertices;
        self.validity = Validity::Unchecked;
    }

    /// Replaces the simplex table.
    pub fn set_simplices(&mut self, simplices: IndicesCollection) {
        self.simplices = simplices;
        self.validity = Validity::Unchecked;
    }

    /// Componentwise minimum of the vertices.
    #[must_use]
    pub fn lower_bound(&self) -> Option<Vec<f64>> {
        self.vertices.min()
    }

    /// Componentwise maximum of the vertices.
    #[must_use]
    pub fn upper_bound(&self) -> Option<Vec<f64>> {
        self.vertices.max()
    }

    /// Box enclosing every vertex.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.rows(), self.dimension())
    }

    /// Component labels of the vertices.
    #[must_use]
    pub fn description(&self) -> &[String] {
        self.vertices.description()
    }

    /// Sets the component labels of the vertices.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::Sample`] unless there is one label per axis.
    pub fn set_description<S: Into<String>>(
        &mut self,
        labels: impl IntoIterator<Item = S>,
    ) -> Result<(), MeshError> {
        Ok(self.vertices.set_description(labels)?)
    }

    /// Tolerance on barycentric coordinates used by containment tests.
    #[must_use]
    pub const fn vertex_epsilon(&self) -> f64 {
        self.vertex_epsilon
    }

    /// Sets the containment tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::NegativeEpsilon`] if `epsilon < 0` (or NaN).
    pub fn set_vertex_epsilon(&mut self, epsilon: f64) -> Result<(), MeshError> {
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(MeshError::NegativeEpsilon { epsilon });
        }
        self.vertex_epsilon = epsilon;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Validity
    // -------------------------------------------------------------------------

    /// Cached validation state.
    #[must_use]
    pub const fn validity(&self) -> Validity {
        self.validity
    }

    /// Checks every simplex without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns the error of the first malformed simplex.
    pub fn validate(&self) -> Result<(), MeshError> {
        (0..self.simplices.len()).try_for_each(|index| self.validate_simplex(index))
    }

    /// Validates the topology once and caches success.
    ///
    /// A failure leaves the mesh [`Validity::Unchecked`].
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::validate`].
    pub fn check_validity(&mut self) -> Result<(), MeshError> {
        if self.validity == Validity::Valid {
            return Ok(());
        }
        self.validate()?;
        self.validity = Validity::Valid;
        tracing::debug!(
            vertices = self.vertices_number(),
            simplices = self.simplices_number(),
            dimension = self.dimension(),
            "mesh validated"
        );
        Ok(())
    }

    fn ensure_valid(&self) -> Result<(), MeshError> {
        match self.validity {
            Validity::Valid => Ok(()),
            Validity::Unchecked => self.validate(),
        }
    }

    fn validate_simplex(&self, index: usize) -> Result<(), MeshError> {
        let simplex = self.simplices.row(index);
        let dimension = self.dimension();
        if simplex.len() != dimension + 1 {
            return Err(MeshError::InvalidSimplexArity {
                simplex: index,
                expected: dimension + 1,
                actual: simplex.len(),
                dimension,
            });
        }
        let vertices_number = self.vertices_number();
        if let Some(&vertex_index) = simplex.iter().find(|&&v| v >= vertices_number) {
            return Err(MeshError::VertexIndexOutOfRange {
                simplex: index,
                vertex_index,
                vertices_number,
            });
        }
        Ok(())
    }

    /// Simplex `index`, range-checked, and validated when the cache is cold.
    fn checked_simplex(&self, index: usize) -> Result<&[usize], MeshError> {
        if index >= self.simplices.len() {
            return Err(MeshError::SimplexIndexOutOfRange {
                index,
                simplices_number: self.simplices.len(),
            });
        }
        if self.validity == Validity::Unchecked {
            self.validate_simplex(index)?;
        }
        Ok(self.simplices.row(index))
    }

    fn check_point_dimension(&self, point: &[f64]) -> Result<(), MeshError> {
        if point.len() != self.dimension() {
            return Err(MeshError::DimensionMismatch {
                expected: self.dimension(),
                actual: point.len(),
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Per-simplex geometry
    // -------------------------------------------------------------------------

    /// Fills `matrix` with the `(d+1)×(d+1)` affine matrix of simplex `index`:
    /// vertex coordinates in the columns, ones in the last row.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::SimplexIndexOutOfRange`] for a bad index, or the
    /// validation error of a malformed simplex.
    pub fn build_simplex_matrix(
        &self,
        index: usize,
        matrix: &mut SquareMatrix,
    ) -> Result<(), MeshError> {
        let simplex = self.checked_simplex(index)?;
        build_simplex_matrix(&self.vertices, simplex, matrix);
        Ok(())
    }

    /// Returns whether `point` lies in simplex `index` within
    /// [`Mesh::vertex_epsilon`], filling `coordinates` with its `d + 1`
    /// barycentric coordinates.
    ///
    /// A degenerate simplex contains nothing and leaves `coordinates` empty.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::DimensionMismatch`] for a point of the wrong
    /// dimension and the errors of [`Mesh::build_simplex_matrix`].
    pub fn check_point_in_simplex_with_coordinates(
        &self,
        point: &[f64],
        index: usize,
        coordinates: &mut Vec<f64>,
    ) -> Result<bool, MeshError> {
        let mut scratch = SquareMatrix::new(0);
        self.check_point_in_simplex_with_coordinates_with(
            SimplexDimension::of(self.dimension()),
            point,
            index,
            &mut scratch,
            coordinates,
        )
    }

    /// [`Mesh::check_point_in_simplex_with_coordinates`] with an explicit
    /// code path and a reusable scratch matrix.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::check_point_in_simplex_with_coordinates`].
    pub fn check_point_in_simplex_with_coordinates_with(
        &self,
        variant: SimplexDimension,
        point: &[f64],
        index: usize,
        scratch: &mut SquareMatrix,
        coordinates: &mut Vec<f64>,
    ) -> Result<bool, MeshError> {
        self.check_point_dimension(point)?;
        let simplex = self.checked_simplex(index)?;
        Ok(barycentric_coordinates_with(
            variant,
            &self.vertices,
            simplex,
            point,
            scratch,
            coordinates,
        ) && coordinates_within(coordinates, self.vertex_epsilon))
    }

    /// Barycentric coordinates of `point` in simplex `index`, whether or not
    /// the point is inside; `None` for a degenerate simplex.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::check_point_in_simplex_with_coordinates`].
    pub fn barycentric_coordinates(
        &self,
        point: &[f64],
        index: usize,
    ) -> Result<Option<Vec<f64>>, MeshError> {
        self.check_point_dimension(point)?;
        let simplex = self.checked_simplex(index)?;
        let mut scratch = SquareMatrix::new(0);
        let mut coordinates = Vec::with_capacity(simplex.len());
        let ok = barycentric_coordinates_with(
            SimplexDimension::of(self.dimension()),
            &self.vertices,
            simplex,
            point,
            &mut scratch,
            &mut coordinates,
        );
        Ok(ok.then_some(coordinates))
    }

    /// Unsigned volume of simplex `index`.
    ///
    /// # Errors
    ///
    /// Index and validation errors, plus [`MeshError::Matrix`] when the
    /// general path cannot factorise the affine matrix.
    pub fn compute_simplex_volume(&self, index: usize) -> Result<f64, MeshError> {
        let simplex = self.checked_simplex(index)?;
        let mut scratch = SquareMatrix::new(0);
        Ok(simplex_volume_with(
            SimplexDimension::of(self.dimension()),
            &self.vertices,
            simplex,
            &mut scratch,
        )?)
    }

    // -------------------------------------------------------------------------
    // Whole-mesh geometry
    // -------------------------------------------------------------------------

    /// Unsigned volume of every simplex.
    ///
    /// # Errors
    ///
    /// Validation errors, plus [`MeshError::Matrix`] from the general path.
    pub fn compute_simplices_volume(&self) -> Result<Vec<f64>, MeshError> {
        self.compute_simplices_volume_with(SimplexDimension::of(self.dimension()))
    }

    /// [`Mesh::compute_simplices_volume`] through an explicit code path.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::compute_simplices_volume`].
    pub fn compute_simplices_volume_with(
        &self,
        variant: SimplexDimension,
    ) -> Result<Vec<f64>, MeshError> {
        self.ensure_valid()?;
        let mut scratch = SquareMatrix::new(0);
        self.simplices
            .iter()
            .map(|simplex| {
                simplex_volume_with(variant, &self.vertices, simplex, &mut scratch)
                    .map_err(MeshError::from)
            })
            .collect()
    }

    /// Total volume of the mesh.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::compute_simplices_volume`].
    pub fn volume(&self) -> Result<f64, MeshError> {
        Ok(self.compute_simplices_volume()?.iter().sum())
    }

    /// P1 quadrature weights: every simplex gives `volume / (d + 1)` to each
    /// of its vertices.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::compute_simplices_volume`].
    pub fn compute_weights(&self) -> Result<Vec<f64>, MeshError> {
        let volumes = self.compute_simplices_volume()?;
        let share = 1.0 / (self.dimension() + 1) as f64;
        let mut weights = vec![0.0; self.vertices_number()];
        for (simplex, volume) in self.simplices.iter().zip(volumes) {
            let delta = volume * share;
            for &v in simplex {
                weights[v] += delta;
            }
        }
        Ok(weights)
    }

    /// Assembles the P1 mass matrix `∫ φᵢ φⱼ` over the mesh.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::compute_simplices_volume`].
    pub fn compute_p1_gram(&self) -> Result<SquareMatrix, MeshError> {
        let volumes = self.compute_simplices_volume()?;
        let factor = p1_elementary_gram_factor(self.dimension());
        let mut gram = SquareMatrix::new(self.vertices_number());
        for (simplex, volume) in self.simplices.iter().zip(volumes) {
            let delta = factor * volume;
            for (j, &vj) in simplex.iter().enumerate() {
                for (k, &vk) in simplex.iter().enumerate() {
                    gram.add_to(vj, vk, if j == k { 2.0 * delta } else { delta });
                }
            }
        }
        Ok(gram)
    }

    /// Orientation of simplex `index` through an explicit code path.
    ///
    /// # Errors
    ///
    /// Index and validation errors, plus [`MeshError::Matrix`] from the
    /// general path (non-finite coordinates, dimension above the
    /// factorisation limit).
    pub fn simplex_orientation_with(
        &self,
        variant: SimplexDimension,
        index: usize,
        scratch: &mut SquareMatrix,
    ) -> Result<Orientation, MeshError> {
        let simplex = self.checked_simplex(index)?;
        let dimension = self.dimension();
        let affine_sign = match edge_determinant(variant, &self.vertices, simplex) {
            // det(affine) = (-1)^d · det(edges)
            Some(edge) if dimension % 2 == 1 => -edge,
            Some(edge) => edge,
            None => {
                build_simplex_matrix(&self.vertices, simplex, scratch);
                scratch.log_abs_determinant()?.1
            }
        };
        Ok(Orientation::from_affine_determinant(affine_sign, dimension))
    }

    /// Makes simplex `index` positively oriented by swapping its first two
    /// vertices when needed.
    ///
    /// Returns the orientation found before the fix; [`Orientation::NEGATIVE`]
    /// means the simplex was swapped. Degenerate simplices are left alone.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::simplex_orientation_with`].
    pub fn fix_simplex_orientation(
        &mut self,
        index: usize,
        scratch: &mut SquareMatrix,
    ) -> Result<Orientation, MeshError> {
        self.fix_simplex_orientation_with(SimplexDimension::of(self.dimension()), index, scratch)
    }

    /// [`Mesh::fix_simplex_orientation`] through an explicit code path.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::simplex_orientation_with`].
    pub fn fix_simplex_orientation_with(
        &mut self,
        variant: SimplexDimension,
        index: usize,
        scratch: &mut SquareMatrix,
    ) -> Result<Orientation, MeshError> {
        let orientation = self.simplex_orientation_with(variant, index, scratch)?;
        if orientation == Orientation::NEGATIVE {
            self.simplices.row_mut(index).swap(0, 1);
        }
        Ok(orientation)
    }

    /// Makes every simplex positively oriented.
    ///
    /// Returns the number of simplices that were swapped; a second call
    /// returns zero.
    ///
    /// # Errors
    ///
    /// Validation errors, plus [`MeshError::Matrix`] from the general path.
    pub fn fix_orientation(&mut self) -> Result<usize, MeshError> {
        self.fix_orientation_with(SimplexDimension::of(self.dimension()))
    }

    /// [`Mesh::fix_orientation`] through an explicit code path.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::fix_orientation`].
    pub fn fix_orientation_with(&mut self, variant: SimplexDimension) -> Result<usize, MeshError> {
        self.check_validity()?;
        let mut scratch = SquareMatrix::new(0);
        let mut swapped = 0;
        for index in 0..self.simplices_number() {
            if self.fix_simplex_orientation_with(variant, index, &mut scratch)?
                == Orientation::NEGATIVE
            {
                swapped += 1;
            }
        }
        if swapped > 0 {
            tracing::debug!(swapped, "fixed simplex orientation");
        }
        Ok(swapped)
    }

    // -------------------------------------------------------------------------
    // Topology queries
    // -------------------------------------------------------------------------

    /// For every vertex, the indices of the simplices containing it (in
    /// increasing order).
    ///
    /// # Errors
    ///
    /// Validation errors.
    pub fn vertices_to_simplices_map(&self) -> Result<IndicesCollection, MeshError> {
        self.ensure_valid()?;
        let mut map = vec![Vec::new(); self.vertices_number()];
        for (index, simplex) in self.simplices.iter().enumerate() {
            for &v in simplex {
                // a vertex repeated inside one simplex is listed once
                if map[v].last() != Some(&index) {
                    map[v].push(index);
                }
            }
        }
        Ok(IndicesCollection::from(map))
    }

    /// Vertices that no simplex references.
    ///
    /// # Errors
    ///
    /// Validation errors.
    pub fn pending_vertices(&self) -> Result<Vec<usize>, MeshError> {
        self.ensure_valid()?;
        let mut used = vec![false; self.vertices_number()];
        for &v in self.simplices.flat_values() {
            used[v] = true;
        }
        Ok(used
            .iter()
            .enumerate()
            .filter_map(|(v, &u)| (!u).then_some(v))
            .collect())
    }

    /// Returns `true` when every simplex has a strictly positive volume.
    ///
    /// # Errors
    ///
    /// Same as [`Mesh::compute_simplices_volume`].
    pub fn is_numerically_valid(&self) -> Result<bool, MeshError> {
        Ok(self
            .compute_simplices_volume()?
            .iter()
            .all(|&v| v > 0.0 && v.is_finite()))
    }

    /// Returns `true` for a valid 1-D mesh whose segments all share one
    /// length, up to [`Mesh::vertex_epsilon`] relative to that length.
    ///
    /// Meshes of any other dimension are never regular.
    #[must_use]
    pub fn is_regular(&self) -> bool {
        if self.dimension() != 1 || self.ensure_valid().is_err() {
            return false;
        }
        let length = |simplex: &[usize]| {
            (self.vertices.get(simplex[1], 0) - self.vertices.get(simplex[0], 0)).abs()
        };
        let mut segments = self.simplices.iter();
        let Some(first) = segments.next() else {
            return true;
        };
        let step = length(first);
        let tolerance = self.vertex_epsilon * step;
        segments.all(|s| (length(s) - step).abs() <= tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn unit_square() -> Mesh {
        let vertices =
            Sample::from_rows(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).unwrap();
        let simplices = IndicesCollection::from_rows(&[[0, 1, 2], [0, 2, 3]]);
        Mesh::new(vertices, simplices).unwrap()
    }

    fn segments(xs: &[f64]) -> Mesh {
        let rows: Vec<[f64; 1]> = xs.iter().map(|&x| [x]).collect();
        let simplices: Vec<[usize; 2]> = (1..xs.len()).map(|i| [i - 1, i]).collect();
        Mesh::new(
            Sample::from_rows(&rows).unwrap(),
            IndicesCollection::from_rows(&simplices),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_out_of_range_vertex() {
        let vertices = Sample::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
        let simplices = IndicesCollection::from_rows(&[[0, 1, 3]]);
        let err = Mesh::new(vertices, simplices).unwrap_err();
        assert_eq!(
            err,
            MeshError::VertexIndexOutOfRange {
                simplex: 0,
                vertex_index: 3,
                vertices_number: 3
            }
        );
        assert!(err.to_string().contains("vertex index 3"));
    }

    #[test]
    fn new_rejects_wrong_arity() {
        let vertices = Sample::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
        let simplices = IndicesCollection::from_rows(&[vec![0, 1, 2], vec![0, 1]]);
        assert!(matches!(
            Mesh::new(vertices, simplices),
            Err(MeshError::InvalidSimplexArity {
                simplex: 1,
                expected: 3,
                actual: 2,
                dimension: 2
            })
        ));
    }

    #[test]
    fn mutators_reset_validity() {
        let mut mesh = unit_square();
        assert_eq!(mesh.validity(), Validity::Valid);

        mesh.set_simplices(IndicesCollection::from_rows(&[[0, 1, 7]]));
        assert_eq!(mesh.validity(), Validity::Unchecked);
        assert!(mesh.check_validity().is_err());
        assert_eq!(mesh.validity(), Validity::Unchecked);
        assert!(mesh.compute_weights().is_err());

        mesh.set_simplices(IndicesCollection::from_rows(&[[0, 1, 2]]));
        mesh.check_validity().unwrap();
        assert_eq!(mesh.validity(), Validity::Valid);
    }

    #[test]
    fn simplex_matrix_layout() {
        let mesh = unit_square();
        let mut m = SquareMatrix::new(0);
        mesh.build_simplex_matrix(1, &mut m).unwrap();
        assert_eq!(m.dimension(), 3);
        assert_eq!(m.row(0), &[0.0, 1.0, 0.0]);
        assert_eq!(m.row(1), &[0.0, 1.0, 1.0]);
        assert_eq!(m.row(2), &[1.0, 1.0, 1.0]);
        assert!(matches!(
            mesh.build_simplex_matrix(2, &mut m),
            Err(MeshError::SimplexIndexOutOfRange {
                index: 2,
                simplices_number: 2
            })
        ));
    }

    #[test]
    fn point_in_simplex_fills_coordinates() {
        let mesh = unit_square();
        let mut coordinates = Vec::new();
        assert!(
            mesh.check_point_in_simplex_with_coordinates(&[0.75, 0.25], 0, &mut coordinates)
                .unwrap()
        );
        assert_relative_eq!(coordinates.iter().sum::<f64>(), 1.0, epsilon = 1e-15);
        assert_relative_eq!(coordinates[0], 0.25, epsilon = 1e-15);
        assert_relative_eq!(coordinates[1], 0.5, epsilon = 1e-15);
        assert_relative_eq!(coordinates[2], 0.25, epsilon = 1e-15);

        assert!(
            !mesh
                .check_point_in_simplex_with_coordinates(&[0.25, 0.75], 0, &mut coordinates)
                .unwrap()
        );
        assert!(matches!(
            mesh.check_point_in_simplex_with_coordinates(&[0.5], 0, &mut coordinates),
            Err(MeshError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn general_path_agrees_on_coordinates() {
        let mesh = unit_square();
        let mut scratch = SquareMatrix::new(0);
        let mut fast = Vec::new();
        let mut general = Vec::new();
        let point = [0.3, 0.6];
        let a = mesh
            .check_point_in_simplex_with_coordinates_with(
                SimplexDimension::Two,
                &point,
                1,
                &mut scratch,
                &mut fast,
            )
            .unwrap();
        let b = mesh
            .check_point_in_simplex_with_coordinates_with(
                SimplexDimension::General,
                &point,
                1,
                &mut scratch,
                &mut general,
            )
            .unwrap();
        assert_eq!(a, b);
        for (x, y) in fast.iter().zip(&general) {
            assert_relative_eq!(*x, *y, epsilon = 1e-14);
        }
    }

    #[test]
    fn degenerate_segment_contains_nothing() {
        let vertices = Sample::from_rows(&[[1.0], [1.0]]).unwrap();
        let mesh = Mesh::new(vertices, IndicesCollection::from_rows(&[[0, 1]])).unwrap();
        let mut coordinates = Vec::new();
        assert!(
            !mesh
                .check_point_in_simplex_with_coordinates(&[1.0], 0, &mut coordinates)
                .unwrap()
        );
        assert_eq!(mesh.barycentric_coordinates(&[1.0], 0).unwrap(), None);
    }

    #[test]
    fn volumes_weights_and_gram_agree() {
        let mesh = unit_square();
        let volumes = mesh.compute_simplices_volume().unwrap();
        assert_relative_eq!(volumes[0], 0.5);
        assert_relative_eq!(volumes[1], 0.5);

        let weights = mesh.compute_weights().unwrap();
        // vertices 0 and 2 belong to both triangles
        assert_relative_eq!(weights[0], 1.0 / 3.0, epsilon = 1e-15);
        assert_relative_eq!(weights[1], 1.0 / 6.0, epsilon = 1e-15);
        assert_relative_eq!(weights[2], 1.0 / 3.0, epsilon = 1e-15);
        assert_relative_eq!(weights[3], 1.0 / 6.0, epsilon = 1e-15);

        let gram = mesh.compute_p1_gram().unwrap();
        assert_eq!(gram.dimension(), 4);
        assert_relative_eq!(gram.as_flat().iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        // diagonal entry of a vertex in one triangle: 2 · (1/12) · 0.5
        assert_relative_eq!(gram.get(1, 1), 1.0 / 12.0, epsilon = 1e-15);
        assert_relative_eq!(gram.get(1, 3), 0.0);
        for i in 0..4 {
            for j in 0..4 {
                assert_relative_eq!(gram.get(i, j), gram.get(j, i));
            }
        }
    }

    #[test]
    fn fix_orientation_is_idempotent() {
        let vertices =
            Sample::from_rows(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).unwrap();
        // second triangle is clockwise
        let simplices = IndicesCollection::from_rows(&[[0, 1, 2], [0, 3, 2]]);
        let mut mesh = Mesh::new(vertices, simplices).unwrap();
        assert_eq!(mesh.fix_orientation().unwrap(), 1);
        assert_eq!(mesh.simplex(1), &[3, 0, 2]);
        assert_eq!(mesh.fix_orientation().unwrap(), 0);
        assert_eq!(
            mesh.fix_orientation_with(SimplexDimension::General).unwrap(),
            0
        );
    }

    #[test]
    fn increasing_segments_are_positive() {
        let mut mesh = segments(&[0.0, 1.0, 2.0]);
        let mut scratch = SquareMatrix::new(0);
        for variant in [SimplexDimension::One, SimplexDimension::General] {
            assert_eq!(
                mesh.simplex_orientation_with(variant, 0, &mut scratch).unwrap(),
                Orientation::POSITIVE
            );
        }
        mesh.set_simplices(IndicesCollection::from_rows(&[[1, 0], [1, 2]]));
        assert_eq!(mesh.fix_orientation().unwrap(), 1);
        assert_eq!(mesh.simplex(0), &[0, 1]);
    }

    #[test]
    fn fix_orientation_skips_degenerate_simplices() {
        let vertices = Sample::from_rows(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).unwrap();
        let mut mesh = Mesh::new(vertices, IndicesCollection::from_rows(&[[0, 2, 1]])).unwrap();
        let mut scratch = SquareMatrix::new(0);
        assert_eq!(
            mesh.fix_simplex_orientation(0, &mut scratch).unwrap(),
            Orientation::DEGENERATE
        );
        assert_eq!(mesh.simplex(0), &[0, 2, 1]);
        assert!(!mesh.is_numerically_valid().unwrap());
    }

    #[test]
    fn vertex_maps_and_pending_vertices() {
        let vertices = Sample::from_rows(&[
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [5.0, 5.0],
        ])
        .unwrap();
        let simplices = IndicesCollection::from_rows(&[[0, 1, 2], [0, 2, 3]]);
        let mesh = Mesh::new(vertices, simplices).unwrap();

        let map = mesh.vertices_to_simplices_map().unwrap();
        assert_eq!(map.len(), 5);
        assert_eq!(map.row(0), &[0, 1]);
        assert_eq!(map.row(1), &[0]);
        assert_eq!(map.row(3), &[1]);
        assert!(map.row(4).is_empty());

        assert_eq!(mesh.pending_vertices().unwrap(), vec![4]);
    }

    #[test]
    fn regularity_of_one_dimensional_meshes() {
        assert!(segments(&[0.0, 0.5, 1.0, 1.5]).is_regular());
        assert!(!segments(&[0.0, 0.5, 1.5]).is_regular());
        assert!(!unit_square().is_regular());
        assert!(Mesh::from_vertices(Sample::from_rows(&[[0.0]]).unwrap()).is_regular());
    }

    #[test]
    fn negative_vertex_epsilon_is_rejected() {
        let mut mesh = unit_square();
        assert!(matches!(
            mesh.set_vertex_epsilon(-1e-3),
            Err(MeshError::NegativeEpsilon { .. })
        ));
        assert!(mesh.set_vertex_epsilon(f64::NAN).is_err());
        mesh.set_vertex_epsilon(0.0).unwrap();
        assert_relative_eq!(mesh.vertex_epsilon(), 0.0);
    }

    #[test]
    fn bounds_follow_vertices() {
        let mesh = unit_square();
        assert_eq!(mesh.lower_bound().unwrap(), vec![0.0, 0.0]);
        assert_eq!(mesh.upper_bound().unwrap(), vec![1.0, 1.0]);
        assert!(mesh.bounding_box().contains(&[0.5, 0.5]));
    }
}
