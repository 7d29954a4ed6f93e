//! Volume measures of simplices.
//!
//! Low dimensions use closed forms; higher dimensions go through the
//! log-determinant of the affine matrix, `exp(log|det M| − log Γ(d+1))`, so
//! that large or high-dimensional simplices do not overflow.

#![forbid(unsafe_code)]

use crate::core::sample::Sample;
use crate::geometry::matrix::{MatrixError, SquareMatrix};
use crate::geometry::predicates::{SimplexDimension, build_simplex_matrix, edge_determinant};

/// `log Γ(n + 1) = log n!`.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::geometry::measures::ln_factorial;
///
/// assert!((ln_factorial(4) - 24f64.ln()).abs() < 1e-14);
/// assert_eq!(ln_factorial(0), 0.0);
/// ```
#[must_use]
pub fn ln_factorial(n: usize) -> f64 {
    (2..=n).map(|k| (k as f64).ln()).sum()
}

/// Unsigned `d`-volume of `simplex`.
///
/// Degenerate simplices have volume `0.0`.
///
/// # Errors
///
/// Only the `General` path can fail: [`MatrixError::NonFinite`] for NaN or
/// infinite coordinates.
pub fn simplex_volume_with(
    variant: SimplexDimension,
    vertices: &Sample,
    simplex: &[usize],
    scratch: &mut SquareMatrix,
) -> Result<f64, MatrixError> {
    let dimension = vertices.dimension();
    match variant.or_general(dimension) {
        SimplexDimension::One => {
            Ok(edge_determinant(SimplexDimension::One, vertices, simplex).map_or(0.0, f64::abs))
        }
        SimplexDimension::Two => Ok(edge_determinant(SimplexDimension::Two, vertices, simplex)
            .map_or(0.0, |d| 0.5 * d.abs())),
        SimplexDimension::Three => Ok(edge_determinant(
            SimplexDimension::Three,
            vertices,
            simplex,
        )
        .map_or(0.0, |d| d.abs() / 6.0)),
        SimplexDimension::General => {
            build_simplex_matrix(vertices, simplex, scratch);
            let (log_abs, sign) = scratch.log_abs_determinant()?;
            if sign == 0.0 {
                return Ok(0.0);
            }
            Ok((log_abs - ln_factorial(dimension)).exp())
        }
    }
}

/// Entry scale of the elementary P1 mass matrix of a `d`-simplex of unit volume.
///
/// The local matrix is `factor · (1 + δᵢⱼ)`, i.e. `2·factor` on the diagonal.
/// Its entries sum to one, so the assembled Gram matrix sums to the mesh volume.
#[must_use]
pub fn p1_elementary_gram_factor(dimension: usize) -> f64 {
    1.0 / (((dimension + 1) * (dimension + 2)) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn unit_simplex(dimension: usize) -> Sample {
        let mut rows = vec![vec![0.0; dimension]];
        for i in 0..dimension {
            let mut row = vec![0.0; dimension];
            row[i] = 1.0;
            rows.push(row);
        }
        Sample::from_rows(&rows).unwrap()
    }

    macro_rules! gen_unit_simplex_volume_tests {
        ($d:literal) => {
            pastey::paste! {
                #[test]
                fn [<unit_simplex_volume_ $d d>]() {
                    let vertices = unit_simplex($d);
                    let simplex: Vec<usize> = (0..=$d).collect();
                    let mut scratch = SquareMatrix::new(0);
                    let expected = (-ln_factorial($d)).exp();
                    let fast = simplex_volume_with(
                        SimplexDimension::of($d), &vertices, &simplex, &mut scratch,
                    ).unwrap();
                    let general = simplex_volume_with(
                        SimplexDimension::General, &vertices, &simplex, &mut scratch,
                    ).unwrap();
                    assert_relative_eq!(fast, expected, epsilon = 1e-14);
                    assert_relative_eq!(general, expected, epsilon = 1e-14);

                    // reversing two vertices flips orientation, never the volume sign
                    let mut reversed = simplex.clone();
                    reversed.swap(0, 1);
                    let flipped = simplex_volume_with(
                        SimplexDimension::of($d), &vertices, &reversed, &mut scratch,
                    ).unwrap();
                    assert_relative_eq!(flipped, expected, epsilon = 1e-14);
                }
            }
        };
    }

    gen_unit_simplex_volume_tests!(1);
    gen_unit_simplex_volume_tests!(2);
    gen_unit_simplex_volume_tests!(3);
    gen_unit_simplex_volume_tests!(4);
    gen_unit_simplex_volume_tests!(5);

    #[test]
    fn degenerate_simplex_has_zero_volume() {
        let flat = Sample::from_rows(&[
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ])
        .unwrap();
        let mut scratch = SquareMatrix::new(0);
        let volume =
            simplex_volume_with(SimplexDimension::General, &flat, &[0, 1, 2, 3, 4], &mut scratch)
                .unwrap();
        assert_relative_eq!(volume, 0.0);
    }

    #[test]
    fn large_high_dimensional_simplex_matches_log_volume() {
        let d = 10;
        let mut rows = vec![vec![0.0; d]];
        for i in 0..d {
            let mut row = vec![0.0; d];
            row[i] = 1e30;
            rows.push(row);
        }
        let vertices = Sample::from_rows(&rows).unwrap();
        let simplex: Vec<usize> = (0..=d).collect();
        let mut scratch = SquareMatrix::new(0);
        let volume =
            simplex_volume_with(SimplexDimension::General, &vertices, &simplex, &mut scratch)
                .unwrap();
        let expected = (300.0 * 10f64.ln() - ln_factorial(d)).exp();
        assert!(volume.is_finite());
        assert_relative_eq!(volume, expected, max_relative = 1e-10);
    }

    #[test]
    fn elementary_gram_entries_sum_to_one() {
        for d in 1..=5 {
            let n = d + 1;
            let f = p1_elementary_gram_factor(d);
            let total = f * (n * n + n) as f64;
            assert_relative_eq!(total, 1.0, epsilon = 1e-14);
        }
    }
}
