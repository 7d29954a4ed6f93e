//! # simplicial-interp
//!
//! This is a library for piecewise-linear interpolation over unstructured
//! simplicial meshes of arbitrary dimension: segments in 1D, triangles in 2D,
//! tetrahedra in 3D and `d`-simplices beyond.
//!
//! # Features
//!
//! - A [`Mesh`](core::mesh::Mesh) of vertices and simplices, with validation,
//!   orientation repair, simplex volumes, P1 mass (Gram) matrices and
//!   vertex weights
//! - Pluggable point location through the
//!   [`EnclosingSimplexAlgorithm`](core::algorithms::enclosing_simplex::EnclosingSimplexAlgorithm)
//!   trait (linear scan and uniform bin grid)
//! - Pluggable nearest-vertex search through the
//!   [`NearestNeighbourAlgorithm`](core::algorithms::nearest_neighbour::NearestNeighbourAlgorithm)
//!   trait (linear scan and k-d tree)
//! - [`P1LagrangeEvaluation`](evaluation::p1_lagrange::P1LagrangeEvaluation):
//!   barycentric interpolation inside the mesh, nearest-vertex extrapolation
//!   outside it
//! - Batched queries on an explicit [`Executor`](core::parallel::Executor)
//!   backed by [rayon](https://docs.rs/rayon)
//! - Serialization/Deserialization with [serde](https://serde.rs)
//!
//! # Basic Usage
//!
//! ```rust
//! use simplicial_interp::prelude::*;
//!
//! // two triangles covering the unit square
//! let mesh = IntervalMesher::new(vec![1, 1]).build(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
//! assert_eq!(mesh.simplices_number(), 2);
//! assert!((mesh.volume().unwrap() - 1.0).abs() < 1e-12);
//!
//! // f(x, y) = 1 + 2x - y sampled at the vertices is reproduced exactly
//! let values = Sample::from_flat(
//!     1,
//!     mesh.vertices().rows().map(|v| 1.0 + 2.0 * v[0] - v[1]).collect(),
//! )
//! .unwrap();
//! let field = P1LagrangeEvaluation::new(mesh, values).unwrap();
//! let value = field.evaluate(&[0.25, 0.5]).unwrap();
//! assert!((value[0] - 1.0).abs() < 1e-12);
//! ```
//!
//! # Point location
//!
//! ```rust
//! use simplicial_interp::prelude::*;
//!
//! let mesh = IntervalMesher::new(vec![4]).build(&[0.0], &[1.0]).unwrap();
//! let mut naive = NaiveEnclosingSimplex::new();
//! naive
//!     .set_vertices_and_simplices(mesh.vertices(), mesh.simplices())
//!     .unwrap();
//! let grid = BinGridEnclosingSimplex::new()
//!     .rebind(mesh.vertices(), mesh.simplices())
//!     .unwrap();
//!
//! assert_eq!(naive.query(&[0.3]), Some(1));
//! assert_eq!(grid.query(&[0.3]), Some(1));
//! assert_eq!(naive.query(&[1.5]), None);
//!
//! // boundaries belong to the lowest-index simplex
//! assert_eq!(naive.query(&[0.5]), Some(1));
//! ```
//!
//! # Parallelism
//!
//! Batched operations run on an [`Executor`](core::parallel::Executor):
//! the global rayon pool by default, a dedicated pool of a fixed size, or the
//! calling thread only. Results never depend on the backend.
//!
//! ```rust
//! use simplicial_interp::prelude::*;
//!
//! let mesh = IntervalMesher::new(vec![8, 8]).build(&[0.0; 2], &[1.0; 2]).unwrap();
//! let points = Sample::from_flat(2, (0..200).map(|i| f64::from(i) / 200.0).collect()).unwrap();
//!
//! let mut locator = BinGridEnclosingSimplex::new();
//! locator
//!     .set_vertices_and_simplices(mesh.vertices(), mesh.simplices())
//!     .unwrap();
//! let parallel = locator.query_sample(&points, &Executor::with_threads(2).unwrap()).unwrap();
//! let sequential = locator.query_sample(&points, &Executor::sequential()).unwrap();
//! assert_eq!(parallel, sequential);
//! ```

// Forbid unsafe code throughout the entire crate
#![forbid(unsafe_code)]

#[macro_use]
extern crate derive_builder;

/// The `core` module contains the mesh, the point and value tables it is
/// made of, the point-location strategies and the parallel executor.
pub mod core {
    /// Point location and nearest-vertex search strategies
    pub mod algorithms {
        /// Uniform bin grid point location
        pub mod bin_grid;
        /// The point-location trait and the linear-scan strategy
        pub mod enclosing_simplex;
        /// Nearest-vertex search: linear scan and k-d tree
        pub mod nearest_neighbour;
    }
    pub mod collections;
    pub mod indices;
    pub mod mesh;
    pub mod parallel;
    pub mod sample;
}

/// Contains geometric primitives: small dense matrices, bounding boxes,
/// simplex predicates and measures, and a structured mesher.
pub mod geometry {
    pub mod bounding_box;
    pub mod matrix;
    pub mod measures;
    pub mod mesher;
    pub mod predicates;
}

/// Functions defined on meshes.
pub mod evaluation {
    pub mod p1_lagrange;
}

pub mod config;

/// A prelude module that re-exports commonly used types.
/// This makes it easier to import the most commonly used items from the crate.
pub mod prelude {
    // Re-export from core
    pub use crate::core::{
        algorithms::{bin_grid::*, enclosing_simplex::*, nearest_neighbour::*},
        indices::*,
        mesh::*,
        parallel::*,
        sample::*,
    };

    pub use crate::core::collections::{SimplexBuffer, SmallBuffer};

    // Re-export from geometry
    pub use crate::geometry::{
        bounding_box::*, matrix::*, measures::*, mesher::*, predicates::*,
    };

    pub use crate::config::*;
    pub use crate::evaluation::p1_lagrange::*;
}

/// The function `is_normal` checks that structs implement `auto` traits.
/// Traits are checked at compile time, so this function is only used for
/// testing.
#[must_use]
pub const fn is_normal<T: Sized + Send + Sync + Unpin>() -> bool {
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{
        core::{
            algorithms::{
                bin_grid::BinGridEnclosingSimplex, enclosing_simplex::NaiveEnclosingSimplex,
                nearest_neighbour::KdTree,
            },
            indices::IndicesCollection,
            mesh::Mesh,
            parallel::Executor,
            sample::Sample,
        },
        evaluation::p1_lagrange::P1LagrangeEvaluation,
        geometry::matrix::SquareMatrix,
        is_normal,
    };

    // =============================================================================
    // TYPE SAFETY TESTS
    // =============================================================================

    #[test]
    fn normal_types() {
        assert!(is_normal::<Sample>());
        assert!(is_normal::<IndicesCollection>());
        assert!(is_normal::<Mesh>());
        assert!(is_normal::<SquareMatrix>());
        assert!(is_normal::<NaiveEnclosingSimplex>());
        assert!(is_normal::<BinGridEnclosingSimplex>());
        assert!(is_normal::<KdTree>());
        assert!(is_normal::<Executor>());
        assert!(is_normal::<P1LagrangeEvaluation>());
    }

    #[test]
    fn test_prelude_exports() {
        use crate::prelude::*;

        let mut buffer: SimplexBuffer<usize> = SimplexBuffer::new();
        buffer.extend([0, 1, 2]);
        assert!(!buffer.spilled());

        let mesh = IntervalMesher::new(vec![2]).build(&[0.0], &[1.0]).unwrap();
        let config = InterpolationConfigBuilder::default()
            .threads(Some(1))
            .build()
            .unwrap();
        let executor = Executor::from_config(&config).unwrap();
        let values = Sample::from_rows(&[[0.0], [1.0], [4.0]]).unwrap();
        let field = P1LagrangeEvaluation::with_algorithms(
            mesh,
            values,
            Box::new(NaiveNearestNeighbour::default()),
            Box::new(NaiveEnclosingSimplex::new()),
            executor,
        )
        .unwrap();
        assert_eq!(field.evaluate(&[0.75]).unwrap(), vec![2.5]);
        assert_eq!(
            simplex_volume_with(
                SimplexDimension::One,
                field.mesh().vertices(),
                &[0, 2],
                &mut SquareMatrix::new(0)
            )
            .unwrap(),
            1.0
        );
    }
}
