//! Nearest-vertex queries.
//!
//! P1 evaluation falls back to the value of the nearest mesh vertex for
//! points outside every simplex. Strategies implement
//! [`NearestNeighbourAlgorithm`]; both shipped strategies break distance ties
//! towards the smallest vertex index, so they always agree.

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::parallel::Executor;
use crate::core::sample::Sample;

/// Errors raised by nearest-neighbour queries.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NearestNeighbourError {
    /// A query point does not have the dimension of the bound sample.
    #[error("Invalid point dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the bound sample.
        expected: usize,
        /// Dimension of the query.
        actual: usize,
    },
}

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// `(distance, index)` ordering; NaN distances sort last.
#[inline]
fn closer(candidate: (f64, usize), best: (f64, usize)) -> bool {
    match candidate.0.total_cmp(&best.0) {
        Ordering::Less => true,
        Ordering::Equal => candidate.1 < best.1,
        Ordering::Greater => false,
    }
}

/// A nearest-neighbour strategy bound to one sample of points.
pub trait NearestNeighbourAlgorithm: Send + Sync + fmt::Debug {
    /// Binds `sample`; a no-op when it is bit-identical to the bound one.
    fn set_sample(&mut self, sample: &Sample);

    /// The bound points.
    fn sample(&self) -> &Sample;

    /// Short human-readable strategy name.
    fn name(&self) -> &'static str;

    /// Same strategy, bound to nothing.
    fn empty_clone(&self) -> Box<dyn NearestNeighbourAlgorithm>;

    /// Index of the bound point closest to `point`; `None` when nothing is bound.
    ///
    /// `point` must have the dimension of the bound sample.
    fn query(&self, point: &[f64]) -> Option<usize>;

    /// A new instance of this strategy bound to `sample`.
    fn rebind(&self, sample: &Sample) -> Box<dyn NearestNeighbourAlgorithm> {
        let mut fresh = self.empty_clone();
        fresh.set_sample(sample);
        fresh
    }

    /// Queries every row of `points`; slot `i` answers row `i`.
    ///
    /// # Errors
    ///
    /// Returns [`NearestNeighbourError::DimensionMismatch`].
    fn query_sample(
        &self,
        points: &Sample,
        executor: &Executor,
    ) -> Result<Vec<Option<usize>>, NearestNeighbourError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let dimension = self.sample().dimension();
        if points.dimension() != dimension {
            return Err(NearestNeighbourError::DimensionMismatch {
                expected: dimension,
                actual: points.dimension(),
            });
        }
        let mut nearest = vec![None; points.len()];
        executor.map_chunks(&mut nearest, executor.grain_size(), |offset, chunk| {
            for (k, slot) in chunk.iter_mut().enumerate() {
                *slot = self.query(points.row(offset + k));
            }
        });
        Ok(nearest)
    }
}

// =============================================================================
// NAIVE
// =============================================================================

/// Linear scan over every point.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NaiveNearestNeighbour {
    sample: Sample,
}

impl NaiveNearestNeighbour {
    /// An instance bound to `sample`.
    #[must_use]
    pub fn new(sample: &Sample) -> Self {
        Self {
            sample: sample.clone(),
        }
    }
}

impl NearestNeighbourAlgorithm for NaiveNearestNeighbour {
    fn set_sample(&mut self, sample: &Sample) {
        if !self.sample.bitwise_eq(sample) {
            self.sample = sample.clone();
        }
    }

    fn sample(&self) -> &Sample {
        &self.sample
    }

    fn name(&self) -> &'static str {
        "naive"
    }

    fn empty_clone(&self) -> Box<dyn NearestNeighbourAlgorithm> {
        Box::new(Self::default())
    }

    fn query(&self, point: &[f64]) -> Option<usize> {
        let mut best: Option<(f64, usize)> = None;
        for (index, row) in self.sample.rows().enumerate() {
            let candidate = (squared_distance(point, row), index);
            if best.is_none_or(|b| closer(candidate, b)) {
                best = Some(candidate);
            }
        }
        best.map(|(_, index)| index)
    }
}

// =============================================================================
// KD-TREE
// =============================================================================

#[derive(Clone, Copy, Debug)]
struct Node {
    point: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Median-split k-d tree stored as a flat node vector.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::core::algorithms::nearest_neighbour::{KdTree, NearestNeighbourAlgorithm};
/// use simplicial_interp::core::sample::Sample;
///
/// let points = Sample::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0]]).unwrap();
/// let tree = KdTree::new(&points);
/// assert_eq!(tree.query(&[0.9, 0.2]), Some(1));
/// assert_eq!(tree.query(&[4.0, 4.5]), Some(3));
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "NaiveNearestNeighbour", into = "NaiveNearestNeighbour")]
pub struct KdTree {
    sample: Sample,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl From<NaiveNearestNeighbour> for KdTree {
    fn from(record: NaiveNearestNeighbour) -> Self {
        Self::new(&record.sample)
    }
}

impl From<KdTree> for NaiveNearestNeighbour {
    fn from(tree: KdTree) -> Self {
        Self {
            sample: tree.sample,
        }
    }
}

impl KdTree {
    /// Builds a tree over `sample`.
    #[must_use]
    pub fn new(sample: &Sample) -> Self {
        let mut tree = Self {
            sample: sample.clone(),
            nodes: Vec::with_capacity(sample.len()),
            root: None,
        };
        tree.rebuild();
        tree
    }

    fn rebuild(&mut self) {
        self.nodes.clear();
        let mut order: Vec<usize> = (0..self.sample.len()).collect();
        self.root = if self.sample.dimension() == 0 {
            None
        } else {
            self.build(&mut order, 0)
        };
    }

    fn build(&mut self, order: &mut [usize], depth: usize) -> Option<usize> {
        if order.is_empty() {
            return None;
        }
        let axis = depth % self.sample.dimension();
        let mid = order.len() / 2;
        let sample = &self.sample;
        order.select_nth_unstable_by(mid, |&a, &b| {
            sample
                .get(a, axis)
                .total_cmp(&sample.get(b, axis))
                .then(a.cmp(&b))
        });
        let index = self.nodes.len();
        self.nodes.push(Node {
            point: order[mid],
            axis,
            left: None,
            right: None,
        });
        let (left, rest) = order.split_at_mut(mid);
        self.nodes[index].left = self.build(left, depth + 1);
        self.nodes[index].right = self.build(&mut rest[1..], depth + 1);
        Some(index)
    }

    fn search(&self, node: usize, point: &[f64], best: &mut (f64, usize)) {
        let Node {
            point: p,
            axis,
            left,
            right,
        } = self.nodes[node];
        let row = self.sample.row(p);
        let candidate = (squared_distance(point, row), p);
        if closer(candidate, *best) {
            *best = candidate;
        }

        let diff = point[axis] - row[axis];
        let (near, far) = if diff < 0.0 {
            (left, right)
        } else {
            (right, left)
        };
        if let Some(near) = near {
            self.search(near, point, best);
        }
        // `<=` keeps equidistant points on the far side reachable for the index tie-break
        if let Some(far) = far.filter(|_| diff * diff <= best.0) {
            self.search(far, point, best);
        }
    }

    /// Depth of the tree (0 when empty).
    #[must_use]
    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], node: Option<usize>) -> usize {
            node.map_or(0, |n| {
                1 + depth_of(nodes, nodes[n].left).max(depth_of(nodes, nodes[n].right))
            })
        }
        depth_of(&self.nodes, self.root)
    }
}

impl NearestNeighbourAlgorithm for KdTree {
    fn set_sample(&mut self, sample: &Sample) {
        if !self.sample.bitwise_eq(sample) {
            self.sample = sample.clone();
            self.rebuild();
            tracing::debug!(points = self.sample.len(), depth = self.depth(), "built k-d tree");
        }
    }

    fn sample(&self) -> &Sample {
        &self.sample
    }

    fn name(&self) -> &'static str {
        "kd-tree"
    }

    fn empty_clone(&self) -> Box<dyn NearestNeighbourAlgorithm> {
        Box::new(Self::default())
    }

    fn query(&self, point: &[f64]) -> Option<usize> {
        let root = self.root?;
        let mut best = (f64::INFINITY, usize::MAX);
        self.search(root, point, &mut best);
        (best.1 != usize::MAX).then_some(best.1)
    }
}
