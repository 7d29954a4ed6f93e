//! Simplicial meshes of axis-aligned boxes.
//!
//! [`IntervalMesher`] splits a box into a regular grid of cells and each cell
//! into `d!` simplices (the Freudenthal, or Kuhn, triangulation): one simplex
//! per permutation `π` of the axes, walking from the lower corner of the cell
//! to its upper corner one unit step along `π(1)`, then `π(2)`, and so on.
//! Every simplex shares the main diagonal of its cell and neighbouring cells
//! match face to face, so the mesh is conforming.

#![forbid(unsafe_code)]

use thiserror::Error;

use crate::core::collections::SimplexBuffer;
use crate::core::indices::IndicesCollection;
use crate::core::mesh::{Mesh, MeshError};
use crate::core::sample::Sample;

/// Errors raised by [`IntervalMesher::build`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MesherError {
    /// The box has no axis.
    #[error("Cannot mesh a box of dimension 0")]
    NoAxis,
    /// Bounds and cell counts disagree on the dimension.
    #[error("Dimension mismatch: {cells} cell counts, {lower} lower bounds, {upper} upper bounds")]
    DimensionMismatch {
        /// Number of cell counts.
        cells: usize,
        /// Length of the lower corner.
        lower: usize,
        /// Length of the upper corner.
        upper: usize,
    },
    /// An axis has no cell.
    #[error("Axis {axis} must be split into at least one cell")]
    ZeroCells {
        /// Offending axis.
        axis: usize,
    },
    /// An axis is empty or reversed.
    #[error("Axis {axis} has lower bound {lower} not below upper bound {upper}")]
    InvalidBounds {
        /// Offending axis.
        axis: usize,
        /// Lower bound on that axis.
        lower: f64,
        /// Upper bound on that axis.
        upper: f64,
    },
    /// The produced mesh failed validation or orientation.
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Regular simplicial mesher of boxes.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::geometry::mesher::IntervalMesher;
///
/// let mesh = IntervalMesher::new(vec![2, 3, 1]).build(&[0.0; 3], &[1.0; 3]).unwrap();
/// assert_eq!(mesh.vertices_number(), 3 * 4 * 2);
/// assert_eq!(mesh.simplices_number(), 2 * 3 * 1 * 6);
/// assert!((mesh.volume().unwrap() - 1.0).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntervalMesher {
    cells_per_axis: Vec<usize>,
}

impl IntervalMesher {
    /// A mesher splitting axis `i` into `cells_per_axis[i]` cells.
    #[must_use]
    pub const fn new(cells_per_axis: Vec<usize>) -> Self {
        Self { cells_per_axis }
    }

    /// Cells along each axis.
    #[must_use]
    pub fn cells_per_axis(&self) -> &[usize] {
        &self.cells_per_axis
    }

    /// Meshes the box `[lower, upper]`.
    ///
    /// Vertices are numbered with axis 0 varying fastest; simplices are
    /// positively oriented.
    ///
    /// # Errors
    ///
    /// Returns a [`MesherError`] for inconsistent dimensions, empty axes or
    /// reversed bounds.
    pub fn build(&self, lower: &[f64], upper: &[f64]) -> Result<Mesh, MesherError> {
        let cells = &self.cells_per_axis;
        let dimension = cells.len();
        if dimension == 0 {
            return Err(MesherError::NoAxis);
        }
        if lower.len() != dimension || upper.len() != dimension {
            return Err(MesherError::DimensionMismatch {
                cells: dimension,
                lower: lower.len(),
                upper: upper.len(),
            });
        }
        for axis in 0..dimension {
            if cells[axis] == 0 {
                return Err(MesherError::ZeroCells { axis });
            }
            if lower[axis].is_nan() || upper[axis].is_nan() || lower[axis] >= upper[axis] {
                return Err(MesherError::InvalidBounds {
                    axis,
                    lower: lower[axis],
                    upper: upper[axis],
                });
            }
        }

        let points: Vec<usize> = cells.iter().map(|&n| n + 1).collect();
        let mut data = Vec::with_capacity(points.iter().product::<usize>() * dimension);
        for_each_multi_index(&points, |multi| {
            data.extend(multi.iter().enumerate().map(|(axis, &i)| {
                let n = cells[axis];
                if i == n {
                    upper[axis]
                } else {
                    lower[axis] + (upper[axis] - lower[axis]) * i as f64 / n as f64
                }
            }));
        });
        let vertices = Sample::from_flat(dimension, data).map_err(MeshError::from)?;

        let strides: Vec<usize> = points
            .iter()
            .scan(1, |stride, &n| {
                let current = *stride;
                *stride *= n;
                Some(current)
            })
            .collect();
        let permutations = permutations(dimension);
        let mut simplices = IndicesCollection::new();
        let mut simplex: SimplexBuffer<usize> = SimplexBuffer::with_capacity(dimension + 1);
        for_each_multi_index(cells, |cell| {
            let base: usize = cell.iter().zip(&strides).map(|(&i, &s)| i * s).sum();
            for permutation in &permutations {
                simplex.clear();
                let mut vertex = base;
                simplex.push(vertex);
                for &axis in permutation {
                    vertex += strides[axis];
                    simplex.push(vertex);
                }
                simplices.push(&simplex);
            }
        });

        let mut mesh = Mesh::new(vertices, simplices)?;
        mesh.fix_orientation()?;
        Ok(mesh)
    }
}

/// Visits every multi-index below `shape`, axis 0 fastest.
fn for_each_multi_index(shape: &[usize], mut visit: impl FnMut(&[usize])) {
    if shape.contains(&0) {
        return;
    }
    let mut current = vec![0; shape.len()];
    loop {
        visit(&current);
        let mut axis = 0;
        loop {
            if axis == shape.len() {
                return;
            }
            current[axis] += 1;
            if current[axis] < shape[axis] {
                break;
            }
            current[axis] = 0;
            axis += 1;
        }
    }
}

/// All permutations of `0..n` in lexicographic order.
fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut current: Vec<usize> = (0..n).collect();
    let mut all = vec![current.clone()];
    loop {
        // next lexicographic permutation
        let Some(i) = (1..n).rev().find(|&i| current[i - 1] < current[i]) else {
            return all;
        };
        let pivot = i - 1;
        let Some(j) = (i..n).rev().find(|&j| current[j] > current[pivot]) else {
            return all;
        };
        current.swap(pivot, j);
        current[i..].reverse();
        all.push(current.clone());
    }
}
