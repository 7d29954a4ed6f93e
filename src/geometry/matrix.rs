//! Matrix operations.
//!
//! [`SquareMatrix`] is a heap-backed, runtime-sized square matrix used as the
//! scratch space of affine simplex matrices and as the storage of assembled
//! Gram matrices. Factorisations are delegated to stack-allocated
//! `la_stack::Matrix<K>` values through a runtime-to-const dispatch, and to a
//! heap-allocated `nalgebra` LU above [`MAX_STACK_MATRIX_DIM`].

#![forbid(unsafe_code)]

use la_stack::{DEFAULT_PIVOT_TOL, LaError, Matrix as LaMatrix, Vector as LaVector};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stack-matrix dispatch limit.
///
/// Affine simplex matrices are `(d+1)×(d+1)`, so meshes up to dimension 17
/// factorise on the stack. Larger matrices use a dynamically sized LU.
pub const MAX_STACK_MATRIX_DIM: usize = 18;

/// Internal linear algebra matrix type used for fixed-size factorisations.
pub type Matrix<const D: usize> = LaMatrix<D>;

/// Error type for matrix operations.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::geometry::matrix::MatrixError;
///
/// let err = MatrixError::SingularMatrix;
/// assert!(matches!(err, MatrixError::SingularMatrix));
/// ```
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MatrixError {
    /// Matrix is singular.
    #[error("Matrix is singular!")]
    SingularMatrix,
    /// A factorisation met a NaN or infinite entry.
    #[error("Matrix contains non-finite values")]
    NonFinite,
    /// The right-hand side does not match the matrix dimension.
    #[error("Right-hand side has length {actual}, expected {expected}")]
    RhsLength {
        /// Matrix dimension.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },
    /// Any other failure reported by `la-stack`.
    #[error("Linear algebra failure: {details}")]
    Other {
        /// Message from the underlying library.
        details: String,
    },
}

impl From<LaError> for MatrixError {
    fn from(err: LaError) -> Self {
        match err {
            LaError::Singular { .. } => Self::SingularMatrix,
            LaError::NonFinite { .. } => Self::NonFinite,
            #[allow(unreachable_patterns)]
            other => Self::Other {
                details: other.to_string(),
            },
        }
    }
}

/// Dispatch a runtime `k` (matrix dimension) to a stack-allocated `la_stack::Matrix<k>`.
///
/// This bridges runtime mesh dimensions and const-generic matrix sizes.
/// Callers must check `k <= MAX_STACK_MATRIX_DIM` first.
macro_rules! with_la_stack_matrix {
    ($k:expr, |$m:ident| $body:block) => {{
        match $k {
            0 => {
                let mut $m = $crate::geometry::matrix::Matrix::<0>::zero();
                $body
            }
            1 => {
                let mut $m = $crate::geometry::matrix::Matrix::<1>::zero();
                $body
            }
            2 => {
                let mut $m = $crate::geometry::matrix::Matrix::<2>::zero();
                $body
            }
            3 => {
                let mut $m = $crate::geometry::matrix::Matrix::<3>::zero();
                $body
            }
            4 => {
                let mut $m = $crate::geometry::matrix::Matrix::<4>::zero();
                $body
            }
            5 => {
                let mut $m = $crate::geometry::matrix::Matrix::<5>::zero();
                $body
            }
            6 => {
                let mut $m = $crate::geometry::matrix::Matrix::<6>::zero();
                $body
            }
            7 => {
                let mut $m = $crate::geometry::matrix::Matrix::<7>::zero();
                $body
            }
            8 => {
                let mut $m = $crate::geometry::matrix::Matrix::<8>::zero();
                $body
            }
            9 => {
                let mut $m = $crate::geometry::matrix::Matrix::<9>::zero();
                $body
            }
            10 => {
                let mut $m = $crate::geometry::matrix::Matrix::<10>::zero();
                $body
            }
            11 => {
                let mut $m = $crate::geometry::matrix::Matrix::<11>::zero();
                $body
            }
            12 => {
                let mut $m = $crate::geometry::matrix::Matrix::<12>::zero();
                $body
            }
            13 => {
                let mut $m = $crate::geometry::matrix::Matrix::<13>::zero();
                $body
            }
            14 => {
                let mut $m = $crate::geometry::matrix::Matrix::<14>::zero();
                $body
            }
            15 => {
                let mut $m = $crate::geometry::matrix::Matrix::<15>::zero();
                $body
            }
            16 => {
                let mut $m = $crate::geometry::matrix::Matrix::<16>::zero();
                $body
            }
            17 => {
                let mut $m = $crate::geometry::matrix::Matrix::<17>::zero();
                $body
            }
            18 => {
                let mut $m = $crate::geometry::matrix::Matrix::<18>::zero();
                $body
            }
            _ => unreachable!(
                "unsupported stack matrix size: {k} (max {max})",
                k = $k,
                max = $crate::geometry::matrix::MAX_STACK_MATRIX_DIM
            ),
        }
    }};
}

#[inline]
pub(crate) fn matrix_set<const D: usize>(m: &mut Matrix<D>, r: usize, c: usize, value: f64) {
    let ok = m.set(r, c, value);
    assert!(ok, "matrix index out of bounds: ({r}, {c}) for {D}x{D}");
}

/// Compute an LU-based determinant, returning 0.0 for singular matrices.
#[inline]
#[must_use]
pub fn determinant<const D: usize>(m: &Matrix<D>) -> f64 {
    match m.det(0.0) {
        Ok(det) => det,
        Err(LaError::NonFinite { .. }) => f64::NAN,
        Err(_) => 0.0,
    }
}

fn load_stack_matrix<const K: usize>(dst: &mut Matrix<K>, src: &SquareMatrix, row_scale: &[f64]) {
    for i in 0..K {
        for j in 0..K {
            matrix_set(dst, i, j, src.get(i, j) / row_scale[i]);
        }
    }
}

fn solve_stack_matrix<const K: usize>(m: &Matrix<K>, rhs: &[f64]) -> Result<Vec<f64>, MatrixError> {
    let mut b = [0.0f64; K];
    b.copy_from_slice(rhs);
    // Default pivot tolerance first; fall back to exact singular detection for
    // tiny-but-invertible simplices that trip the absolute threshold.
    let lu = match m.lu(DEFAULT_PIVOT_TOL) {
        Ok(lu) => lu,
        Err(LaError::Singular { .. }) => m.lu(0.0)?,
        Err(e) => return Err(e.into()),
    };
    Ok(lu.solve_vec(LaVector::<K>::new(b))?.into_array().to_vec())
}

fn load_heap_matrix(src: &SquareMatrix, row_scale: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(src.n, src.n, |i, j| src.get(i, j) / row_scale[i])
}

fn solve_heap_matrix(src: &SquareMatrix, rhs: &[f64]) -> Result<Vec<f64>, MatrixError> {
    if src.data.iter().chain(rhs).any(|v| !v.is_finite()) {
        return Err(MatrixError::NonFinite);
    }
    let unit = vec![1.0; src.n];
    load_heap_matrix(src, &unit)
        .lu()
        .solve(&DVector::from_column_slice(rhs))
        .map(|x| x.iter().copied().collect())
        .ok_or(MatrixError::SingularMatrix)
}

/// Heap counterpart of [`determinant`]: NaN for non-finite input.
fn heap_determinant(src: &SquareMatrix, row_scale: &[f64]) -> f64 {
    if src.data.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    load_heap_matrix(src, row_scale).lu().determinant()
}

/// Dense row-major square matrix of runtime size.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::geometry::matrix::SquareMatrix;
///
/// let mut m = SquareMatrix::new(2);
/// m.set(0, 0, 2.0);
/// m.set(0, 1, 1.0);
/// m.set(1, 0, 1.0);
/// m.set(1, 1, 3.0);
/// let x = m.solve_linear_system(&[3.0, 4.0]).unwrap();
/// assert!((x[0] - 1.0).abs() < 1e-12 && (x[1] - 1.0).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SquareMatrix {
    n: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    /// Creates an `n × n` zero matrix.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Number of rows (and columns).
    #[inline]
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.n
    }

    /// Entry `(i, j)`.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// Sets entry `(i, j)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] = value;
    }

    /// Adds `value` to entry `(i, j)`.
    #[inline]
    pub fn add_to(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] += value;
    }

    /// Row `i`.
    #[inline]
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Resizes to `n × n` (if needed) and zeroes every entry.
    pub fn reset(&mut self, n: usize) {
        self.n = n;
        self.data.clear();
        self.data.resize(n * n, 0.0);
    }

    /// Flat row-major view.
    #[must_use]
    pub fn as_flat(&self) -> &[f64] {
        &self.data
    }

    /// Solves `self * x = rhs`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::SingularMatrix`] for singular systems,
    /// [`MatrixError::NonFinite`] for NaN or infinite entries and
    /// [`MatrixError::RhsLength`] for a mismatched right-hand side.
    pub fn solve_linear_system(&self, rhs: &[f64]) -> Result<Vec<f64>, MatrixError> {
        if rhs.len() != self.n {
            return Err(MatrixError::RhsLength {
                expected: self.n,
                actual: rhs.len(),
            });
        }
        if self.n > MAX_STACK_MATRIX_DIM {
            return solve_heap_matrix(self, rhs);
        }
        let unit = vec![1.0; self.n];
        with_la_stack_matrix!(self.n, |m| {
            load_stack_matrix(&mut m, self, &unit);
            solve_stack_matrix(&m, rhs)
        })
    }

    /// Determinant (0.0 for singular matrices, NaN for non-finite entries).
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` mirrors the other factorisations.
    pub fn determinant(&self) -> Result<f64, MatrixError> {
        let unit = vec![1.0; self.n];
        if self.n > MAX_STACK_MATRIX_DIM {
            return Ok(heap_determinant(self, &unit));
        }
        with_la_stack_matrix!(self.n, |m| {
            load_stack_matrix(&mut m, self, &unit);
            Ok(determinant(&m))
        })
    }

    /// Natural log of `|det|` together with the sign of the determinant.
    ///
    /// Rows are equilibrated by their largest magnitude before factorisation,
    /// so the result stays finite for matrices whose determinant would
    /// overflow. A singular matrix yields `(f64::NEG_INFINITY, 0.0)`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::NonFinite`] when an entry is NaN or infinite.
    pub fn log_abs_determinant(&self) -> Result<(f64, f64), MatrixError> {
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err(MatrixError::NonFinite);
        }
        let scales: Vec<f64> = (0..self.n)
            .map(|i| self.row(i).iter().fold(0.0f64, |acc, v| acc.max(v.abs())))
            .collect();
        if scales.iter().any(|&s| s == 0.0) {
            return Ok((f64::NEG_INFINITY, 0.0));
        }
        let scaled_det = if self.n > MAX_STACK_MATRIX_DIM {
            heap_determinant(self, &scales)
        } else {
            with_la_stack_matrix!(self.n, |m| {
                load_stack_matrix(&mut m, self, &scales);
                determinant(&m)
            })
        };
        if scaled_det == 0.0 {
            return Ok((f64::NEG_INFINITY, 0.0));
        }
        let log_scale: f64 = scales.iter().map(|s| s.ln()).sum();
        Ok((scaled_det.abs().ln() + log_scale, scaled_det.signum()))
    }
}
