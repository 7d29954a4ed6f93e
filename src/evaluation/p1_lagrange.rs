//! Piecewise-linear (P1 Lagrange) interpolation of vertex values.
//!
//! Inside the mesh a point is located in a simplex and the vertex values of
//! that simplex are blended with the point's barycentric coordinates. Outside
//! the mesh (or when no simplex can be confirmed) the value of the nearest
//! vertex is returned, so evaluation never fails for a well-formed point.
//!
//! # Examples
//!
//! ```rust
//! use simplicial_interp::core::indices::IndicesCollection;
//! use simplicial_interp::core::mesh::Mesh;
//! use simplicial_interp::core::sample::Sample;
//! use simplicial_interp::evaluation::p1_lagrange::P1LagrangeEvaluation;
//!
//! let vertices = Sample::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
//! let mesh = Mesh::new(vertices, IndicesCollection::from_rows(&[[0, 1, 2]])).unwrap();
//! let values = Sample::from_rows(&[[5.0], [7.0], [9.0]]).unwrap();
//! let field = P1LagrangeEvaluation::new(mesh, values).unwrap();
//!
//! assert_eq!(field.evaluate(&[0.0, 0.0]).unwrap(), vec![5.0]);
//! let centre = field.evaluate(&[1.0 / 3.0, 1.0 / 3.0]).unwrap();
//! assert!((centre[0] - 7.0).abs() < 1e-12);
//! // outside: nearest vertex
//! assert_eq!(field.evaluate(&[3.0, -0.1]).unwrap(), vec![7.0]);
//! ```

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::config::InterpolationConfig;
use crate::core::algorithms::bin_grid::BinGridEnclosingSimplex;
use crate::core::algorithms::enclosing_simplex::{
    EnclosingSimplexAlgorithm, EnclosingSimplexError,
};
use crate::core::algorithms::nearest_neighbour::{KdTree, NearestNeighbourAlgorithm};
use crate::core::mesh::{Mesh, MeshError};
use crate::core::parallel::{Executor, ExecutorError};
use crate::core::sample::Sample;
use crate::geometry::matrix::SquareMatrix;
use crate::geometry::predicates::SimplexDimension;

/// Errors raised by [`P1LagrangeEvaluation`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvaluationError {
    /// The input point or sample does not have the mesh dimension.
    #[error("Invalid input dimension: expected {expected}, got {actual}")]
    InvalidInputDimension {
        /// Mesh dimension.
        expected: usize,
        /// Dimension supplied.
        actual: usize,
    },
    /// The value table does not have one row per vertex.
    #[error("Value table has {values} rows but the mesh has {vertices} vertices")]
    ValueCountMismatch {
        /// Rows in the value table.
        values: usize,
        /// Vertices in the mesh.
        vertices: usize,
    },
    /// The mesh is malformed.
    #[error(transparent)]
    Mesh(#[from] MeshError),
    /// The point-location strategy could not be bound.
    #[error(transparent)]
    EnclosingSimplex(#[from] EnclosingSimplexError),
    /// The configured thread pool could not be built.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// A P1 finite-element field over a [`Mesh`].
///
/// Point location and the nearest-vertex fallback are pluggable strategies,
/// exclusively owned and rebuilt from empty clones whenever the mesh changes,
/// so a user-selected strategy and its configuration survive [`set_mesh`].
///
/// [`set_mesh`]: P1LagrangeEvaluation::set_mesh
#[derive(Debug)]
pub struct P1LagrangeEvaluation {
    mesh: Mesh,
    values: Sample,
    nearest_neighbour: Box<dyn NearestNeighbourAlgorithm>,
    enclosing_simplex: Box<dyn EnclosingSimplexAlgorithm>,
    executor: Executor,
    calls_number: AtomicUsize,
}

impl P1LagrangeEvaluation {
    /// Field with a k-d tree fallback, bin-grid point location and the
    /// global thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::Mesh`] for a malformed mesh and
    /// [`EvaluationError::ValueCountMismatch`] unless `values` has one row
    /// per vertex.
    pub fn new(mesh: Mesh, values: Sample) -> Result<Self, EvaluationError> {
        Self::with_algorithms(
            mesh,
            values,
            Box::new(KdTree::default()),
            Box::new(BinGridEnclosingSimplex::default()),
            Executor::global(),
        )
    }

    /// Field tuned by `config`: the mesh takes its vertex tolerance, the
    /// bin-grid locator its bin count and barycentric tolerance, and the
    /// executor its thread count and grain size.
    ///
    /// # Errors
    ///
    /// Same as [`P1LagrangeEvaluation::new`], plus [`EvaluationError::Executor`]
    /// if the dedicated pool cannot be built.
    pub fn from_config(
        mut mesh: Mesh,
        values: Sample,
        config: &InterpolationConfig,
    ) -> Result<Self, EvaluationError> {
        mesh.set_vertex_epsilon(config.vertex_epsilon)?;
        Self::with_algorithms(
            mesh,
            values,
            Box::new(KdTree::default()),
            Box::new(BinGridEnclosingSimplex::from_config(config)?),
            Executor::from_config(config)?,
        )
    }

    /// Field with explicit strategies, which are bound to `mesh` here.
    ///
    /// # Errors
    ///
    /// Same as [`P1LagrangeEvaluation::new`], plus
    /// [`EvaluationError::EnclosingSimplex`] if binding fails.
    pub fn with_algorithms(
        mut mesh: Mesh,
        values: Sample,
        mut nearest_neighbour: Box<dyn NearestNeighbourAlgorithm>,
        mut enclosing_simplex: Box<dyn EnclosingSimplexAlgorithm>,
        executor: Executor,
    ) -> Result<Self, EvaluationError> {
        mesh.check_validity()?;
        check_value_count(&mesh, &values)?;
        nearest_neighbour.set_sample(mesh.vertices());
        enclosing_simplex.set_vertices_and_simplices(mesh.vertices(), mesh.simplices())?;
        warn_pending_vertices(&mesh)?;
        Ok(Self {
            mesh,
            values,
            nearest_neighbour,
            enclosing_simplex,
            executor,
            calls_number: AtomicUsize::new(0),
        })
    }

    /// The interpolation mesh.
    #[must_use]
    pub const fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Replaces the mesh, keeping the values, and rebinds both strategies.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::ValueCountMismatch`] if the current values
    /// do not match the new vertex count, or the validation and binding
    /// errors of the new mesh. The field is unchanged on error.
    pub fn set_mesh(&mut self, mut mesh: Mesh) -> Result<(), EvaluationError> {
        mesh.check_validity()?;
        check_value_count(&mesh, &self.values)?;
        let enclosing_simplex = self
            .enclosing_simplex
            .rebind(mesh.vertices(), mesh.simplices())?;
        let nearest_neighbour = self.nearest_neighbour.rebind(mesh.vertices());
        warn_pending_vertices(&mesh)?;
        self.enclosing_simplex = enclosing_simplex;
        self.nearest_neighbour = nearest_neighbour;
        self.mesh = mesh;
        Ok(())
    }

    /// Vertex values, one row per mesh vertex.
    #[must_use]
    pub const fn values(&self) -> &Sample {
        &self.values
    }

    /// Replaces the vertex values.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::ValueCountMismatch`] unless `values` has
    /// one row per vertex.
    pub fn set_values(&mut self, values: Sample) -> Result<(), EvaluationError> {
        check_value_count(&self.mesh, &values)?;
        self.values = values;
        Ok(())
    }

    /// The nearest-vertex fallback strategy.
    #[must_use]
    pub fn nearest_neighbour_algorithm(&self) -> &dyn NearestNeighbourAlgorithm {
        self.nearest_neighbour.as_ref()
    }

    /// Installs a fallback strategy, bound to the current vertices.
    pub fn set_nearest_neighbour_algorithm(
        &mut self,
        mut algorithm: Box<dyn NearestNeighbourAlgorithm>,
    ) {
        algorithm.set_sample(self.mesh.vertices());
        self.nearest_neighbour = algorithm;
    }

    /// The point-location strategy.
    #[must_use]
    pub fn enclosing_simplex_algorithm(&self) -> &dyn EnclosingSimplexAlgorithm {
        self.enclosing_simplex.as_ref()
    }

    /// Installs a point-location strategy, bound to the current mesh.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::EnclosingSimplex`] if binding fails.
    pub fn set_enclosing_simplex_algorithm(
        &mut self,
        mut algorithm: Box<dyn EnclosingSimplexAlgorithm>,
    ) -> Result<(), EvaluationError> {
        algorithm.set_vertices_and_simplices(self.mesh.vertices(), self.mesh.simplices())?;
        self.enclosing_simplex = algorithm;
        Ok(())
    }

    /// Executor used by [`P1LagrangeEvaluation::evaluate_sample`].
    #[must_use]
    pub const fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Replaces the executor.
    pub fn set_executor(&mut self, executor: Executor) {
        self.executor = executor;
    }

    /// Dimension of the points the field accepts.
    #[must_use]
    pub const fn input_dimension(&self) -> usize {
        self.mesh.dimension()
    }

    /// Dimension of the values the field returns.
    #[must_use]
    pub const fn output_dimension(&self) -> usize {
        self.values.dimension()
    }

    /// Number of points evaluated so far.
    #[must_use]
    pub fn calls_number(&self) -> usize {
        self.calls_number.load(Ordering::Relaxed)
    }

    fn check_input_dimension(&self, actual: usize) -> Result<(), EvaluationError> {
        let expected = self.input_dimension();
        if actual != expected {
            return Err(EvaluationError::InvalidInputDimension { expected, actual });
        }
        Ok(())
    }

    /// Value of the field at `point`.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::InvalidInputDimension`].
    pub fn evaluate(&self, point: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.check_input_dimension(point.len())?;
        self.calls_number.fetch_add(1, Ordering::Relaxed);
        let mut value = vec![0.0; self.output_dimension()];
        let mut scratch = SquareMatrix::new(0);
        let mut coordinates = Vec::with_capacity(self.input_dimension() + 1);
        self.evaluate_into(point, &mut value, &mut scratch, &mut coordinates);
        Ok(value)
    }

    /// Values of the field at every row of `points`.
    ///
    /// Evaluating exactly at the mesh vertices returns the value table.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::InvalidInputDimension`].
    pub fn evaluate_sample(&self, points: &Sample) -> Result<Sample, EvaluationError> {
        self.check_input_dimension(points.dimension())?;
        let size = points.len();
        self.calls_number.fetch_add(size, Ordering::Relaxed);
        if points.bitwise_eq(self.mesh.vertices()) {
            tracing::debug!(size, "evaluation at the mesh vertices returns the value table");
            return Ok(self.values.clone());
        }

        let output_dimension = self.output_dimension();
        let mut result = Sample::new(size, output_dimension);
        if output_dimension == 0 || size == 0 {
            return Ok(result);
        }
        let grain = self.executor.grain_size() * output_dimension;
        self.executor
            .map_chunks(result.as_flat_mut(), grain, |offset, chunk| {
                let mut scratch = SquareMatrix::new(0);
                let mut coordinates = Vec::with_capacity(self.input_dimension() + 1);
                let first = offset / output_dimension;
                for (k, value) in chunk.chunks_exact_mut(output_dimension).enumerate() {
                    self.evaluate_into(points.row(first + k), value, &mut scratch, &mut coordinates);
                }
            });
        Ok(result)
    }

    fn evaluate_into(
        &self,
        point: &[f64],
        value: &mut [f64],
        scratch: &mut SquareMatrix,
        coordinates: &mut Vec<f64>,
    ) {
        if let Some(index) = self.enclosing_simplex.query(point) {
            let inside = self.mesh.check_point_in_simplex_with_coordinates_with(
                SimplexDimension::of(self.mesh.dimension()),
                point,
                index,
                scratch,
                coordinates,
            );
            if matches!(inside, Ok(true)) {
                value.fill(0.0);
                for (&vertex, &weight) in self.mesh.simplex(index).iter().zip(coordinates.iter()) {
                    for (v, &x) in value.iter_mut().zip(self.values.row(vertex)) {
                        *v += weight * x;
                    }
                }
                return;
            }
            tracing::warn!(
                simplex = index,
                ?point,
                "could not recover barycentric coordinates in the located simplex; using the nearest vertex"
            );
        } else {
            tracing::trace!(?point, "no enclosing simplex; using the nearest vertex");
        }

        match self.nearest_neighbour.query(point) {
            Some(vertex) => value.copy_from_slice(self.values.row(vertex)),
            // only reachable for a mesh without vertices
            None => value.fill(f64::NAN),
        }
    }
}

fn check_value_count(mesh: &Mesh, values: &Sample) -> Result<(), EvaluationError> {
    if values.len() != mesh.vertices_number() {
        return Err(EvaluationError::ValueCountMismatch {
            values: values.len(),
            vertices: mesh.vertices_number(),
        });
    }
    Ok(())
}

fn warn_pending_vertices(mesh: &Mesh) -> Result<(), EvaluationError> {
    let pending = mesh.pending_vertices()?;
    if !pending.is_empty() {
        tracing::warn!(
            pending = pending.len(),
            first = pending[0],
            "some mesh vertices belong to no simplex and only act through nearest-vertex extrapolation"
        );
    }
    Ok(())
}
