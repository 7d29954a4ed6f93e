//! Uniform bin grid acceleration for point location.
//!
//! The global bounding box is divided into an axis-aligned grid of bins. Each
//! bin lists, in increasing order, the simplices whose (tolerance-widened)
//! bounding box overlaps it, so a query only tests the simplices of the bin
//! holding the point.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::config::InterpolationConfig;
use crate::core::algorithms::enclosing_simplex::{
    EnclosingSimplexAlgorithm, EnclosingSimplexError, SimplexLocator,
};
use crate::core::collections::SimplexBuffer;
use crate::core::indices::IndicesCollection;
use crate::core::sample::Sample;

/// Default number of bins a grid aims for.
pub const DEFAULT_TARGET_BINS: usize = 4096;

const fn default_target_bins() -> usize {
    DEFAULT_TARGET_BINS
}

#[derive(Clone, Debug, Default)]
struct BinGrid {
    lower: Vec<f64>,
    bin_size: Vec<f64>,
    shape: Vec<usize>,
    bins: IndicesCollection,
}

impl BinGrid {
    fn build(locator: &SimplexLocator, target_bins: usize) -> Self {
        let dimension = locator.dimension();
        if locator.simplices_number() == 0 || dimension == 0 {
            return Self::default();
        }
        let tolerance = locator.bounding_box_tolerance();
        let bbox = locator.bounding_box();
        let mut lower = Vec::with_capacity(dimension);
        let mut extent = Vec::with_capacity(dimension);
        for axis in 0..dimension {
            let width = bbox.extent(axis);
            lower.push(bbox.lower()[axis] - tolerance * width);
            extent.push(width * (1.0 + 2.0 * tolerance));
        }

        // never more bins than simplices
        let target = target_bins.min(locator.simplices_number()).max(1);
        let shape = grid_shape(&extent, target);
        let bin_size: Vec<f64> = extent
            .iter()
            .zip(&shape)
            .map(|(&e, &n)| e / n as f64)
            .collect();
        let mut grid = Self {
            lower,
            bin_size,
            shape,
            bins: IndicesCollection::new(),
        };

        let total: usize = grid.shape.iter().product();
        let mut bins: Vec<Vec<usize>> = vec![Vec::new(); total];
        let mut first: SimplexBuffer<usize> = SimplexBuffer::from_elem(0, dimension);
        let mut last: SimplexBuffer<usize> = SimplexBuffer::from_elem(0, dimension);
        for index in 0..locator.simplices_number() {
            let (lo, hi) = locator.simplex_bounds(index);
            for axis in 0..dimension {
                let slack = tolerance * (hi[axis] - lo[axis]);
                first[axis] = grid.axis_bin(axis, lo[axis] - slack);
                last[axis] = grid.axis_bin(axis, hi[axis] + slack);
            }
            grid.for_each_bin(&first, &last, |bin| bins[bin].push(index));
        }
        grid.bins = IndicesCollection::from(bins);
        tracing::debug!(
            shape = ?grid.shape,
            bins = total,
            simplices = locator.simplices_number(),
            "built bin grid"
        );
        grid
    }

    fn axis_bin(&self, axis: usize, x: f64) -> usize {
        let size = self.bin_size[axis];
        let n = self.shape[axis];
        if size <= 0.0 || !size.is_finite() {
            return 0;
        }
        let t = ((x - self.lower[axis]) / size).floor();
        if t.is_nan() || t <= 0.0 {
            0
        } else {
            (t as usize).min(n - 1)
        }
    }

    /// Visits every flat bin index of the box `first..=last` (per axis).
    fn for_each_bin(&self, first: &[usize], last: &[usize], mut visit: impl FnMut(usize)) {
        let mut current = SimplexBuffer::from_slice(first);
        loop {
            visit(self.flatten(&current));
            // odometer increment, axis 0 fastest
            let mut axis = 0;
            loop {
                if axis == current.len() {
                    return;
                }
                if current[axis] < last[axis] {
                    current[axis] += 1;
                    break;
                }
                current[axis] = first[axis];
                axis += 1;
            }
        }
    }

    fn flatten(&self, multi: &[usize]) -> usize {
        multi
            .iter()
            .zip(&self.shape)
            .rev()
            .fold(0, |flat, (&i, &n)| flat * n + i)
    }

    fn candidates(&self, point: &[f64]) -> &[usize] {
        if self.bins.is_empty() {
            return &[];
        }
        let flat = point
            .iter()
            .enumerate()
            .rev()
            .fold(0, |flat, (axis, &x)| {
                flat * self.shape[axis] + self.axis_bin(axis, x)
            });
        self.bins.row(flat)
    }
}

/// Bins per axis, proportional to the axis extents, with a product close to
/// `target`. Flat axes get a single bin.
fn grid_shape(extent: &[f64], target: usize) -> Vec<usize> {
    let active: Vec<f64> = extent
        .iter()
        .copied()
        .filter(|&e| e > 0.0 && e.is_finite())
        .collect();
    if active.is_empty() {
        return vec![1; extent.len()];
    }
    // log-space so that high dimensions do not overflow the volume
    let log_volume: f64 = active.iter().map(|e| e.ln()).sum();
    let log_size = (log_volume - (target as f64).ln()) / active.len() as f64;
    extent
        .iter()
        .map(|&e| {
            if e > 0.0 && e.is_finite() {
                let n = (e.ln() - log_size).exp().round();
                n.clamp(1.0, target as f64) as usize
            } else {
                1
            }
        })
        .collect()
}

/// Persisted part of a [`BinGridEnclosingSimplex`]; the grid is derived.
#[derive(Serialize, Deserialize)]
struct BinGridRecord {
    locator: SimplexLocator,
    #[serde(default = "default_target_bins")]
    target_bins: usize,
}

/// Point location through a uniform grid of bins.
///
/// Answers are identical to [`NaiveEnclosingSimplex`]: the lowest-index
/// enclosing simplex.
///
/// [`NaiveEnclosingSimplex`]: crate::core::algorithms::enclosing_simplex::NaiveEnclosingSimplex
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::core::algorithms::bin_grid::BinGridEnclosingSimplex;
/// use simplicial_interp::core::algorithms::enclosing_simplex::EnclosingSimplexAlgorithm;
/// use simplicial_interp::geometry::mesher::IntervalMesher;
///
/// let mesh = IntervalMesher::new(vec![8, 8]).build(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
/// let grid = BinGridEnclosingSimplex::from_parts(mesh.vertices(), mesh.simplices()).unwrap();
/// let index = grid.query(&[0.31, 0.72]).unwrap();
/// assert!(mesh.barycentric_coordinates(&[0.31, 0.72], index).unwrap().is_some());
/// assert_eq!(grid.query(&[1.5, 0.5]), None);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "BinGridRecord", into = "BinGridRecord")]
pub struct BinGridEnclosingSimplex {
    locator: SimplexLocator,
    target_bins: usize,
    grid: BinGrid,
}

impl Default for BinGridEnclosingSimplex {
    fn default() -> Self {
        Self::with_target_bins(DEFAULT_TARGET_BINS)
    }
}

impl From<BinGridRecord> for BinGridEnclosingSimplex {
    fn from(record: BinGridRecord) -> Self {
        let mut algorithm = Self {
            locator: record.locator,
            target_bins: record.target_bins.max(1),
            grid: BinGrid::default(),
        };
        algorithm.rebuild_index();
        algorithm
    }
}

impl From<BinGridEnclosingSimplex> for BinGridRecord {
    fn from(algorithm: BinGridEnclosingSimplex) -> Self {
        Self {
            locator: algorithm.locator,
            target_bins: algorithm.target_bins,
        }
    }
}

impl BinGridEnclosingSimplex {
    /// An unbound instance aiming for [`DEFAULT_TARGET_BINS`] bins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An unbound instance aiming for `target_bins` bins (at least one).
    #[must_use]
    pub fn with_target_bins(target_bins: usize) -> Self {
        Self {
            locator: SimplexLocator::default(),
            target_bins: target_bins.max(1),
            grid: BinGrid::default(),
        }
    }

    /// An unbound instance using the bin count and barycentric tolerance of
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EnclosingSimplexError::NegativeEpsilon`] for a negative or
    /// NaN `barycentric_epsilon`.
    pub fn from_config(config: &InterpolationConfig) -> Result<Self, EnclosingSimplexError> {
        let mut algorithm = Self::with_target_bins(config.bin_grid_target_bins);
        algorithm
            .locator
            .set_barycentric_epsilon(config.barycentric_epsilon)?;
        Ok(algorithm)
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
        let mut algorithm = Self::default();
        algorithm.set_vertices_and_simplices(vertices, simplices)?;
        Ok(algorithm)
    }

    /// Requested number of bins.
    #[must_use]
    pub const fn target_bins(&self) -> usize {
        self.target_bins
    }

    /// Bins per axis of the current grid (empty when unbound).
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.grid.shape
    }
}

impl EnclosingSimplexAlgorithm for BinGridEnclosingSimplex {
    fn locator(&self) -> &SimplexLocator {
        &self.locator
    }

    fn locator_mut(&mut self) -> &mut SimplexLocator {
        &mut self.locator
    }

    fn name(&self) -> &'static str {
        "bin-grid"
    }

    fn empty_clone(&self) -> Box<dyn EnclosingSimplexAlgorithm> {
        let mut fresh = Self::with_target_bins(self.target_bins);
        fresh.locator = SimplexLocator::with_epsilon(self.locator.barycentric_epsilon());
        Box::new(fresh)
    }

    fn rebuild_index(&mut self) {
        self.grid = BinGrid::build(&self.locator, self.target_bins);
    }

    fn set_barycentric_epsilon(&mut self, epsilon: f64) -> Result<(), EnclosingSimplexError> {
        self.locator.set_barycentric_epsilon(epsilon)?;
        // bin membership depends on the tolerance
        self.rebuild_index();
        Ok(())
    }

    fn query(&self, point: &[f64]) -> Option<usize> {
        if !self.locator.in_bounding_box(point) {
            return None;
        }
        self.locator
            .first_enclosing(point, self.grid.candidates(point).iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::algorithms::enclosing_simplex::NaiveEnclosingSimplex;
    use crate::geometry::mesher::IntervalMesher;

    #[test]
    fn grid_shape_follows_extents() {
        assert_eq!(grid_shape(&[4.0, 1.0], 64), vec![16, 4]);
        assert_eq!(grid_shape(&[1.0, 0.0, 1.0], 100), vec![10, 1, 10]);
        assert_eq!(grid_shape(&[0.0, 0.0], 100), vec![1, 1]);
    }

    #[test]
    fn flatten_is_axis_zero_fastest() {
        let grid = BinGrid {
            lower: vec![0.0; 3],
            bin_size: vec![1.0; 3],
            shape: vec![2, 3, 4],
            bins: IndicesCollection::new(),
        };
        assert_eq!(grid.flatten(&[1, 0, 0]), 1);
        assert_eq!(grid.flatten(&[0, 1, 0]), 2);
        assert_eq!(grid.flatten(&[1, 2, 3]), 23);
        let mut visited = Vec::new();
        grid.for_each_bin(&[0, 1, 2], &[1, 2, 2], |b| visited.push(b));
        assert_eq!(visited, vec![14, 15, 16, 17]);
    }

    #[test]
    fn agrees_with_naive_on_a_cube() {
        let mesh = IntervalMesher::new(vec![3, 2, 2])
            .build(&[0.0, -1.0, 2.0], &[1.5, 1.0, 3.0])
            .unwrap();
        let grid = BinGridEnclosingSimplex::from_parts(mesh.vertices(), mesh.simplices()).unwrap();
        let naive = NaiveEnclosingSimplex::from_parts(mesh.vertices(), mesh.simplices()).unwrap();
        assert_eq!(grid.shape().len(), 3);
        for i in 0..=12 {
            for j in 0..=8 {
                let point = [
                    -0.1 + 1.7 * f64::from(i) / 12.0,
                    -1.1 + 2.2 * f64::from(j) / 8.0,
                    2.0 + 0.37 * f64::from(i % 3),
                ];
                assert_eq!(grid.query(&point), naive.query(&point), "point {point:?}");
            }
        }
    }

    #[test]
    fn vertices_on_the_boundary_are_found() {
        let mesh = IntervalMesher::new(vec![4, 4]).build(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        let grid = BinGridEnclosingSimplex::from_parts(mesh.vertices(), mesh.simplices()).unwrap();
        for v in mesh.vertices().rows() {
            assert!(grid.query(v).is_some(), "vertex {v:?}");
        }
    }

    #[test]
    fn empty_clone_preserves_configuration() {
        let mut grid = BinGridEnclosingSimplex::with_target_bins(7);
        grid.set_barycentric_epsilon(1e-9).unwrap();
        let fresh = grid.empty_clone();
        assert_eq!(fresh.name(), "bin-grid");
        assert!((fresh.barycentric_epsilon() - 1e-9).abs() < f64::EPSILON);
        let json = serde_json::to_string(&grid).unwrap();
        let restored: BinGridEnclosingSimplex = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.target_bins(), 7);
    }

    #[test]
    fn from_config_applies_bins_and_tolerance() {
        let config = crate::config::InterpolationConfigBuilder::default()
            .bin_grid_target_bins(9)
            .barycentric_epsilon(1e-6)
            .build()
            .unwrap();
        let mesh = IntervalMesher::new(vec![6, 6]).build(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        let mut grid = BinGridEnclosingSimplex::from_config(&config).unwrap();
        grid.set_vertices_and_simplices(mesh.vertices(), mesh.simplices())
            .unwrap();
        assert_eq!(grid.target_bins(), 9);
        assert_eq!(grid.shape(), &[3, 3]);
        assert!((grid.barycentric_epsilon() - 1e-6).abs() < f64::EPSILON);

        let mut invalid = config;
        invalid.barycentric_epsilon = -1.0;
        assert!(matches!(
            BinGridEnclosingSimplex::from_config(&invalid),
            Err(EnclosingSimplexError::NegativeEpsilon { .. })
        ));
    }

    #[test]
    fn serde_rebuilds_the_grid() {
        let mesh = IntervalMesher::new(vec![5]).build(&[0.0], &[1.0]).unwrap();
        let grid = BinGridEnclosingSimplex::from_parts(mesh.vertices(), mesh.simplices()).unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        let restored: BinGridEnclosingSimplex = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.shape(), grid.shape());
        assert_eq!(restored.query(&[0.55]), grid.query(&[0.55]));
        assert_eq!(restored.query(&[0.55]), Some(2));
    }
}
