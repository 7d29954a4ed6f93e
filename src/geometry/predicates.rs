//! Geometric predicates on simplices stored as (vertex table, index row) pairs.
//!
//! Every routine with a dimension-specialised closed form takes a
//! [`SimplexDimension`] selected once per call. `General` works in every
//! dimension through the affine matrix
//!
//! ```text
//! | x₀   x₁   …  x_d |
//! | y₀   y₁   …  y_d |
//! | …    …    …  …   |
//! | 1    1    …  1   |
//! ```
//!
//! whose columns are the simplex vertices. Its determinant equals
//! `(-1)^d · det[v₁ − v₀, …, v_d − v₀]`, hence the parity rule of
//! [`Orientation::from_affine_determinant`].

#![forbid(unsafe_code)]

use crate::core::sample::Sample;
use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::matrix::SquareMatrix;

/// Closed set of dimension-specialised code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimplexDimension {
    /// Segments on the real line.
    One,
    /// Triangles in the plane.
    Two,
    /// Tetrahedra in space.
    Three,
    /// Any dimension, through the affine matrix.
    General,
}

impl SimplexDimension {
    /// The fastest variant available for `dimension`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use simplicial_interp::geometry::predicates::SimplexDimension;
    ///
    /// assert_eq!(SimplexDimension::of(2), SimplexDimension::Two);
    /// assert_eq!(SimplexDimension::of(4), SimplexDimension::General);
    /// ```
    #[must_use]
    pub const fn of(dimension: usize) -> Self {
        match dimension {
            1 => Self::One,
            2 => Self::Two,
            3 => Self::Three,
            _ => Self::General,
        }
    }

    /// Returns `self` if it can serve `dimension`, otherwise `General`.
    #[must_use]
    pub const fn or_general(self, dimension: usize) -> Self {
        match (self, dimension) {
            (Self::One, 1) | (Self::Two, 2) | (Self::Three, 3) => self,
            _ => Self::General,
        }
    }
}

/// Represents the orientation of a simplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// The vertex order is clockwise-like: `det[v₁ − v₀, …, v_d − v₀] < 0`.
    NEGATIVE,
    /// The simplex is flat.
    DEGENERATE,
    /// The vertex order is counter-clockwise-like: `det[v₁ − v₀, …, v_d − v₀] > 0`.
    POSITIVE,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NEGATIVE => write!(f, "NEGATIVE"),
            Self::DEGENERATE => write!(f, "DEGENERATE"),
            Self::POSITIVE => write!(f, "POSITIVE"),
        }
    }
}

impl Orientation {
    /// Classifies the sign of an affine-matrix determinant.
    ///
    /// In odd dimension a positively oriented simplex has a **negative**
    /// affine determinant.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use simplicial_interp::geometry::predicates::Orientation;
    ///
    /// // [0, 1] in 1D: affine determinant is x₀ − x₁ = −1
    /// assert_eq!(Orientation::from_affine_determinant(-1.0, 1), Orientation::POSITIVE);
    /// // counter-clockwise unit triangle: affine determinant is +1
    /// assert_eq!(Orientation::from_affine_determinant(1.0, 2), Orientation::POSITIVE);
    /// ```
    #[must_use]
    pub fn from_affine_determinant(sign: f64, dimension: usize) -> Self {
        if sign == 0.0 || sign.is_nan() {
            Self::DEGENERATE
        } else if (sign > 0.0) == (dimension % 2 == 0) {
            Self::POSITIVE
        } else {
            Self::NEGATIVE
        }
    }
}

/// Fills `matrix` with the `(d+1)×(d+1)` affine matrix of `simplex`.
///
/// # Panics
///
/// Panics if an index of `simplex` is out of range for `vertices`.
pub fn build_simplex_matrix(vertices: &Sample, simplex: &[usize], matrix: &mut SquareMatrix) {
    let dimension = vertices.dimension();
    matrix.reset(dimension + 1);
    for (j, &v) in simplex.iter().enumerate() {
        for (i, &x) in vertices.row(v).iter().enumerate() {
            matrix.set(i, j, x);
        }
        matrix.set(dimension, j, 1.0);
    }
}

#[inline]
fn cross2(a: &[f64], b: &[f64], c: &[f64]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])
}

#[inline]
fn triple3(a: &[f64], b: &[f64], c: &[f64], d: &[f64]) -> f64 {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let w = [d[0] - a[0], d[1] - a[1], d[2] - a[2]];
    u[0] * (v[1] * w[2] - v[2] * w[1]) + u[1] * (v[2] * w[0] - v[0] * w[2])
        + u[2] * (v[0] * w[1] - v[1] * w[0])
}

/// Closed-form `det[v₁ − v₀, …, v_d − v₀]` for `d ∈ {1, 2, 3}`.
///
/// Returns `None` for [`SimplexDimension::General`].
#[must_use]
pub fn edge_determinant(
    variant: SimplexDimension,
    vertices: &Sample,
    simplex: &[usize],
) -> Option<f64> {
    let v = move |k: usize| vertices.row(simplex[k]);
    match variant.or_general(vertices.dimension()) {
        SimplexDimension::One => Some(v(1)[0] - v(0)[0]),
        SimplexDimension::Two => Some(cross2(v(0), v(1), v(2))),
        SimplexDimension::Three => Some(triple3(v(0), v(1), v(2), v(3))),
        SimplexDimension::General => None,
    }
}

/// Barycentric coordinates of `point` with respect to `simplex`.
///
/// Writes `d + 1` coordinates into `coordinates` and returns `true`, or
/// returns `false` when the simplex is degenerate (zero determinant or a
/// singular affine matrix). `scratch` is only touched by `General`.
pub fn barycentric_coordinates_with(
    variant: SimplexDimension,
    vertices: &Sample,
    simplex: &[usize],
    point: &[f64],
    scratch: &mut SquareMatrix,
    coordinates: &mut Vec<f64>,
) -> bool {
    let v = move |k: usize| vertices.row(simplex[k]);
    coordinates.clear();
    match variant.or_general(vertices.dimension()) {
        SimplexDimension::One => {
            let (x0, x1) = (v(0)[0], v(1)[0]);
            let length = x1 - x0;
            if length == 0.0 {
                return false;
            }
            let alpha = (x1 - point[0]) / length;
            coordinates.extend([alpha, 1.0 - alpha]);
            true
        }
        SimplexDimension::Two => {
            // Cramer's rule on the 2x2 edge system
            let (p0, p1, p2) = (v(0), v(1), v(2));
            let a = p1[0] - p0[0];
            let b = p2[0] - p0[0];
            let c = p1[1] - p0[1];
            let d = p2[1] - p0[1];
            let det = a * d - b * c;
            if det == 0.0 {
                return false;
            }
            let x = point[0] - p0[0];
            let y = point[1] - p0[1];
            let alpha = (d * x - b * y) / det;
            let beta = (a * y - c * x) / det;
            coordinates.extend([1.0 - alpha - beta, alpha, beta]);
            true
        }
        SimplexDimension::Three => {
            let (p0, p1, p2, p3) = (v(0), v(1), v(2), v(3));
            let total = triple3(p0, p1, p2, p3);
            if total == 0.0 {
                return false;
            }
            let l1 = triple3(p0, point, p2, p3) / total;
            let l2 = triple3(p0, p1, point, p3) / total;
            let l3 = triple3(p0, p1, p2, point) / total;
            coordinates.extend([1.0 - l1 - l2 - l3, l1, l2, l3]);
            true
        }
        SimplexDimension::General => {
            build_simplex_matrix(vertices, simplex, scratch);
            let mut rhs = Vec::with_capacity(point.len() + 1);
            rhs.extend_from_slice(point);
            rhs.push(1.0);
            match scratch.solve_linear_system(&rhs) {
                Ok(solution) => {
                    coordinates.extend(solution);
                    true
                }
                Err(_) => false,
            }
        }
    }
}

/// Returns `true` if every coordinate lies in `[-epsilon, 1 + epsilon]`.
#[inline]
#[must_use]
pub fn coordinates_within(coordinates: &[f64], epsilon: f64) -> bool {
    coordinates
        .iter()
        .all(|&c| c >= -epsilon && c <= 1.0 + epsilon)
}

/// Closed-form point-in-simplex test for `d ∈ {1, 2, 3}`.
///
/// Signed sub-volumes (the total volume with one vertex replaced by the
/// point) are compared with the total signed volume. A flat simplex falls
/// back to a bounding-box test on its own vertices, each axis widened by
/// `epsilon` times its extent.
///
/// Returns `None` for [`SimplexDimension::General`].
#[must_use]
pub fn point_in_simplex_closed_form(
    variant: SimplexDimension,
    vertices: &Sample,
    simplex: &[usize],
    point: &[f64],
    epsilon: f64,
) -> Option<bool> {
    let v = move |k: usize| vertices.row(simplex[k]);
    let (total, sub): (f64, [f64; 4]) = match variant.or_general(vertices.dimension()) {
        SimplexDimension::One => {
            let (x0, x1, x) = (v(0)[0], v(1)[0], point[0]);
            (x1 - x0, [x1 - x, x - x0, 0.0, 0.0])
        }
        SimplexDimension::Two => {
            let (p0, p1, p2) = (v(0), v(1), v(2));
            (
                cross2(p0, p1, p2),
                [
                    cross2(point, p1, p2),
                    cross2(p0, point, p2),
                    cross2(p0, p1, point),
                    0.0,
                ],
            )
        }
        SimplexDimension::Three => {
            let (p0, p1, p2, p3) = (v(0), v(1), v(2), v(3));
            (
                triple3(p0, p1, p2, p3),
                [
                    triple3(point, p1, p2, p3),
                    triple3(p0, point, p2, p3),
                    triple3(p0, p1, point, p3),
                    triple3(p0, p1, p2, point),
                ],
            )
        }
        SimplexDimension::General => return None,
    };
    if total == 0.0 {
        let bbox = BoundingBox::from_points(
            simplex.iter().map(|&i| vertices.row(i)),
            vertices.dimension(),
        );
        return Some(bbox.contains_with_tolerance(point, epsilon));
    }
    Some(sub[..simplex.len()].iter().all(|s| {
        let c = s / total;
        c >= -epsilon && c <= 1.0 + epsilon
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn triangle() -> Sample {
        Sample::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap()
    }

    fn tetrahedron() -> Sample {
        Sample::from_rows(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn or_general_keeps_matching_variant_only() {
        assert_eq!(SimplexDimension::Two.or_general(2), SimplexDimension::Two);
        assert_eq!(SimplexDimension::Two.or_general(3), SimplexDimension::General);
        assert_eq!(SimplexDimension::of(0), SimplexDimension::General);
    }

    #[test]
    fn orientation_parity_rule() {
        assert_eq!(Orientation::from_affine_determinant(1.0, 1), Orientation::NEGATIVE);
        assert_eq!(Orientation::from_affine_determinant(-1.0, 2), Orientation::NEGATIVE);
        assert_eq!(Orientation::from_affine_determinant(-1.0, 3), Orientation::POSITIVE);
        assert_eq!(Orientation::from_affine_determinant(0.0, 3), Orientation::DEGENERATE);
        assert_eq!(format!("{}", Orientation::POSITIVE), "POSITIVE");
    }

    #[test]
    fn affine_determinant_relates_to_edge_determinant() {
        let mut m = SquareMatrix::new(0);
        let tet = tetrahedron();
        build_simplex_matrix(&tet, &[0, 1, 2, 3], &mut m);
        let affine = m.determinant().unwrap();
        let edge = edge_determinant(SimplexDimension::Three, &tet, &[0, 1, 2, 3]).unwrap();
        assert_relative_eq!(affine, -edge, epsilon = 1e-14);

        let tri = triangle();
        build_simplex_matrix(&tri, &[0, 1, 2], &mut m);
        let affine = m.determinant().unwrap();
        let edge = edge_determinant(SimplexDimension::Two, &tri, &[0, 1, 2]).unwrap();
        assert_relative_eq!(affine, edge, epsilon = 1e-14);
    }

    #[test]
    fn barycentric_coordinates_agree_across_variants() {
        let mut m = SquareMatrix::new(0);
        let mut fast = Vec::new();
        let mut general = Vec::new();
        let tri = triangle();
        let p = [0.2, 0.3];
        assert!(barycentric_coordinates_with(
            SimplexDimension::Two,
            &tri,
            &[0, 1, 2],
            &p,
            &mut m,
            &mut fast
        ));
        assert!(barycentric_coordinates_with(
            SimplexDimension::General,
            &tri,
            &[0, 1, 2],
            &p,
            &mut m,
            &mut general
        ));
        for (a, b) in fast.iter().zip(&general) {
            assert_relative_eq!(*a, *b, epsilon = 1e-14);
        }
        assert_relative_eq!(fast[0], 0.5, epsilon = 1e-14);

        let tet = tetrahedron();
        let q = [0.1, 0.2, 0.3];
        assert!(barycentric_coordinates_with(
            SimplexDimension::Three,
            &tet,
            &[0, 1, 2, 3],
            &q,
            &mut m,
            &mut fast
        ));
        assert!(barycentric_coordinates_with(
            SimplexDimension::General,
            &tet,
            &[0, 1, 2, 3],
            &q,
            &mut m,
            &mut general
        ));
        for (a, b) in fast.iter().zip(&general) {
            assert_relative_eq!(*a, *b, epsilon = 1e-14);
        }
        assert_relative_eq!(fast.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn degenerate_simplices_have_no_coordinates() {
        let flat = Sample::from_rows(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).unwrap();
        let mut m = SquareMatrix::new(0);
        let mut coords = Vec::new();
        for variant in [SimplexDimension::Two, SimplexDimension::General] {
            assert!(!barycentric_coordinates_with(
                variant,
                &flat,
                &[0, 1, 2],
                &[0.5, 0.5],
                &mut m,
                &mut coords
            ));
        }
        let point_segment = Sample::from_rows(&[[1.0], [1.0]]).unwrap();
        assert!(!barycentric_coordinates_with(
            SimplexDimension::One,
            &point_segment,
            &[0, 1],
            &[1.0],
            &mut m,
            &mut coords
        ));
    }

    #[test]
    fn closed_form_containment_in_triangle() {
        let tri = triangle();
        let s = [0, 1, 2];
        let check = |p: [f64; 2]| {
            point_in_simplex_closed_form(SimplexDimension::Two, &tri, &s, &p, 1e-12).unwrap()
        };
        assert!(check([0.25, 0.25]));
        assert!(check([0.0, 0.0]));
        assert!(check([0.5, 0.5]));
        assert!(!check([0.6, 0.6]));
        assert!(!check([-0.1, 0.5]));

        // reversed orientation gives the same answers
        let r = [0, 2, 1];
        assert!(
            point_in_simplex_closed_form(SimplexDimension::Two, &tri, &r, &[0.25, 0.25], 1e-12)
                .unwrap()
        );
    }

    #[test]
    fn closed_form_degenerate_branch_uses_bounding_box() {
        let flat = Sample::from_rows(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).unwrap();
        let s = [0, 1, 2];
        // on the segment
        assert_eq!(
            point_in_simplex_closed_form(SimplexDimension::Two, &flat, &s, &[1.5, 1.5], 1e-12),
            Some(true)
        );
        // inside the box but off the segment: accepted by the coarse fallback
        assert_eq!(
            point_in_simplex_closed_form(SimplexDimension::Two, &flat, &s, &[1.5, 0.5], 1e-12),
            Some(true)
        );
        assert_eq!(
            point_in_simplex_closed_form(SimplexDimension::Two, &flat, &s, &[2.5, 2.5], 1e-12),
            Some(false)
        );
    }

    #[test]
    fn closed_form_segment_and_tetrahedron() {
        let seg = Sample::from_rows(&[[2.0], [-1.0]]).unwrap();
        let one = |x: f64| {
            point_in_simplex_closed_form(SimplexDimension::One, &seg, &[0, 1], &[x], 0.0).unwrap()
        };
        assert!(one(0.0));
        assert!(one(2.0));
        assert!(!one(2.1));

        let tet = tetrahedron();
        let three = |p: [f64; 3]| {
            point_in_simplex_closed_form(SimplexDimension::Three, &tet, &[0, 1, 2, 3], &p, 1e-12)
                .unwrap()
        };
        assert!(three([0.1, 0.1, 0.1]));
        assert!(!three([0.5, 0.5, 0.5]));
    }

    #[test]
    fn general_variant_has_no_closed_form() {
        let tri = triangle();
        assert!(
            point_in_simplex_closed_form(SimplexDimension::General, &tri, &[0, 1, 2], &[0.1, 0.1], 0.0)
                .is_none()
        );
        assert!(edge_determinant(SimplexDimension::General, &tri, &[0, 1, 2]).is_none());
    }
}
