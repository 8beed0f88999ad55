//! Half-space polytopes, interior point and distance helpers
use crate::errors::{EgoError, Result};

use cobyla::{minimize, RhoBeg, StopTols};
use log::{debug, warn};
use ndarray::{concatenate, s, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};

/// Radius under which a Chebyshev center is considered degenerate
pub const MIN_CHEBYSHEV_RADIUS: f64 = 1e-8;

/// Intersection of half-spaces `a x <= b`
#[derive(Clone, Debug, PartialEq)]
pub struct Halfspaces {
    /// (m, d) normals
    pub a: Array2<f64>,
    /// (m) offsets
    pub b: Array1<f64>,
}

impl Halfspaces {
    /// Halfspaces `a x <= b`, errors when shapes disagree
    pub fn new(a: Array2<f64>, b: Array1<f64>) -> Result<Self> {
        if a.nrows() != b.len() {
            return Err(EgoError::DimensionMismatch {
                expected: a.nrows(),
                actual: b.len(),
            });
        }
        Ok(Halfspaces { a, b })
    }

    /// Box bounds `lo <= x <= hi` as `2d` half-spaces
    pub fn from_bounds(xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Self {
        let dim = xlimits.nrows();
        let mut a = Array2::zeros((2 * dim, dim));
        let mut b = Array1::zeros(2 * dim);
        for i in 0..dim {
            a[[2 * i, i]] = -1.;
            b[2 * i] = -xlimits[[i, 0]];
            a[[2 * i + 1, i]] = 1.;
            b[2 * i + 1] = xlimits[[i, 1]];
        }
        Halfspaces { a, b }
    }

    /// Dimension of the ambient space
    pub fn dim(&self) -> usize {
        self.a.ncols()
    }

    /// Number of half-spaces
    pub fn len(&self) -> usize {
        self.a.nrows()
    }

    /// Whether there is no half-space
    pub fn is_empty(&self) -> bool {
        self.a.nrows() == 0
    }

    /// Concatenation of both half-space sets
    pub fn stack(&self, other: &Halfspaces) -> Result<Halfspaces> {
        if self.dim() != other.dim() {
            return Err(EgoError::DimensionMismatch {
                expected: self.dim(),
                actual: other.dim(),
            });
        }
        Ok(Halfspaces {
            a: concatenate![Axis(0), self.a, other.a],
            b: concatenate![Axis(0), self.b, other.b],
        })
    }

    /// `a x - b` for every half-space, positive values are violations
    pub fn violations(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> Array1<f64> {
        self.a.dot(x) - &self.b
    }

    /// Whether `x` satisfies every half-space up to `tol`
    pub fn contains(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>, tol: f64) -> bool {
        self.violations(x).iter().all(|&v| v <= tol)
    }
}

/// Result of the Chebyshev center computation
#[derive(Clone, Debug)]
pub struct InteriorPoint {
    pub point: Array1<f64>,
    pub radius: f64,
    pub feasible: bool,
}

/// Chebyshev center of `halfspaces` within the box `xlimits`.
///
/// Solves `max r s.t. a_i x + |a_i| r <= b_i, r >= 0` with COBYLA in the box
/// rescaled to the unit hypercube. The radius is recomputed from the resulting
/// point so that an approximate solve never overstates it. The point is
/// reported as infeasible when the solver fails, a half-space is violated or
/// the radius is below [MIN_CHEBYSHEV_RADIUS].
pub fn find_interior_point(
    halfspaces: &Halfspaces,
    xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> InteriorPoint {
    let dim = xlimits.nrows();
    let lower = xlimits.column(0).to_owned();
    let width = &xlimits.column(1) - &xlimits.column(0);
    let rscale = width.fold(f64::INFINITY, |a, &b| a.min(b));
    let norms = halfspaces
        .a
        .map_axis(Axis(1), |row| row.dot(&row).sqrt());

    // in unit coordinates x = lower + width * u and r = rscale * rho
    let a_unit = &halfspaces.a * &width;
    let b_unit = &halfspaces.b - &halfspaces.a.dot(&lower);
    let cstrs = (0..halfspaces.len())
        .map(|i| {
            let row = a_unit.row(i).to_owned();
            let (bi, ni) = (b_unit[i], norms[i] * rscale);
            move |x: &[f64], _u: &mut ()| -> f64 {
                let ax: f64 = row.iter().zip(x).map(|(a, v)| a * v).sum();
                bi - ax - ni * x[dim]
            }
        })
        .collect::<Vec<_>>();

    let mut x0 = vec![0.5; dim + 1];
    x0[dim] = 0.;
    let mut bounds = vec![(0., 1.); dim];
    bounds.push((0., 1.));
    let maxeval = (200 * (dim + 1)).clamp(1000, 20000);

    let solution = minimize(
        |x: &[f64], _u: &mut ()| -x[dim],
        &x0,
        &bounds,
        &cstrs,
        (),
        maxeval,
        RhoBeg::All(0.25),
        Some(StopTols {
            ftol_rel: 1e-10,
            xtol_rel: 1e-10,
            ..StopTols::default()
        }),
    );
    let (solved, u) = match solution {
        Ok((_, u, _)) => (true, u),
        Err((status, u, _)) => {
            warn!("Chebyshev center computation failed status={status:?}");
            (false, u)
        }
    };

    let point = Array1::from_iter((0..dim).map(|j| lower[j] + width[j] * u[j]));
    let slack = &halfspaces.b - &halfspaces.a.dot(&point);
    let radius = slack
        .iter()
        .zip(norms.iter())
        .filter(|(_, n)| **n > 0.)
        .map(|(s, n)| s / n)
        .fold(f64::INFINITY, f64::min)
        .min(0.5 * rscale);
    let feasible = solved && halfspaces.contains(&point, 0.) && radius >= MIN_CHEBYSHEV_RADIUS;
    debug!("Chebyshev center {point} radius={radius:e} feasible={feasible}");
    InteriorPoint {
        point,
        radius,
        feasible,
    }
}

/// Pairwise squared euclidean distances (n, m) between rows of `x` and `y`
pub fn compute_distance_matrix_squared(
    x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    y: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> Array2<f64> {
    let mut d = Array2::zeros((x.nrows(), y.nrows()));
    for (i, xi) in x.rows().into_iter().enumerate() {
        for (j, yj) in y.rows().into_iter().enumerate() {
            d[[i, j]] = xi
                .iter()
                .zip(yj.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
        }
    }
    d
}

/// Block diagonal repetition of `halfspaces` over `q` consecutive copies of its dimensions
pub(crate) fn repeat_block_diagonal(halfspaces: &Halfspaces, q: usize) -> Halfspaces {
    let (m, d) = halfspaces.a.dim();
    let mut a = Array2::zeros((m * q, d * q));
    let mut b = Array1::zeros(m * q);
    for k in 0..q {
        a.slice_mut(s![k * m..(k + 1) * m, k * d..(k + 1) * d])
            .assign(&halfspaces.a);
        b.slice_mut(s![k * m..(k + 1) * m]).assign(&halfspaces.b);
    }
    Halfspaces { a, b }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_interior_point_of_simplex() {
        // x + y <= 1 within the unit square
        let xlimits = array![[0., 1.], [0., 1.]];
        let cstr = Halfspaces::new(array![[1., 1.]], array![1.]).unwrap();
        let hs = Halfspaces::from_bounds(&xlimits).stack(&cstr).unwrap();
        let center = find_interior_point(&hs, &xlimits);
        assert!(center.feasible);
        // inscribed circle of the right triangle has radius 1 - 1/sqrt(2)
        let expected = 1. - 1. / 2f64.sqrt();
        assert_abs_diff_eq!(center.radius, expected, epsilon = 1e-3);
        assert_abs_diff_eq!(center.point[0], expected, epsilon = 1e-2);
        assert_abs_diff_eq!(center.point[1], expected, epsilon = 1e-2);
    }

    #[test]
    fn test_interior_point_of_scaled_box() {
        let xlimits = array![[-100., 100.], [2., 3.]];
        let hs = Halfspaces::from_bounds(&xlimits);
        let center = find_interior_point(&hs, &xlimits);
        assert!(center.feasible);
        assert!(center.radius > 0.4);
        assert!(hs.contains(&center.point, 0.));
    }

    #[test]
    fn test_infeasible_polytope() {
        // x >= 0.8 and x <= 0.2
        let xlimits = array![[0., 1.]];
        let cstr = Halfspaces::new(array![[-1.], [1.]], array![-0.8, 0.2]).unwrap();
        let hs = Halfspaces::from_bounds(&xlimits).stack(&cstr).unwrap();
        assert!(!find_interior_point(&hs, &xlimits).feasible);
    }

    #[test]
    fn test_degenerate_polytope() {
        // x + y = 1 exactly
        let xlimits = array![[0., 1.], [0., 1.]];
        let cstr = Halfspaces::new(array![[1., 1.], [-1., -1.]], array![1., -1.]).unwrap();
        let hs = Halfspaces::from_bounds(&xlimits).stack(&cstr).unwrap();
        assert!(!find_interior_point(&hs, &xlimits).feasible);
    }

    #[test]
    fn test_distance_matrix() {
        let x = array![[0., 0.], [1., 1.]];
        let y = array![[1., 0.], [0., 0.], [2., 2.]];
        let d = compute_distance_matrix_squared(&x, &y);
        assert_eq!(d, array![[1., 0., 8.], [1., 2., 2.]]);
    }

    #[test]
    fn test_block_diagonal_repeat() {
        let hs = Halfspaces::new(array![[1., 2.]], array![3.]).unwrap();
        let rep = repeat_block_diagonal(&hs, 2);
        assert_eq!(rep.a, array![[1., 2., 0., 0.], [0., 0., 1., 2.]]);
        assert_eq!(rep.b, array![3., 3.]);
    }
}
