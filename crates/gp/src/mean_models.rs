//! A module for the polynomial basis modelling the mean term of the GP model.
//! In practice small degree (<= 2) polynomial bases are used,
//! as the gaussian process is then fitted using the correlated error term.
//!
//! A basis is a list of monomials, each one given by its per-dimension exponents.

use crate::errors::{GpError, Result};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Polynomial basis `p(x) = [prod_k x_k^e_jk]_j` of the GP mean
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolynomialBasis {
    dim: usize,
    exponents: Vec<Vec<u32>>,
}

impl PolynomialBasis {
    /// Basis given its monomials exponents, each one of length `dim`
    pub fn new(dim: usize, exponents: Vec<Vec<u32>>) -> Result<Self> {
        if exponents.is_empty() {
            return Err(GpError::InvalidValueError(
                "polynomial basis should have at least one monomial".to_string(),
            ));
        }
        if let Some(e) = exponents.iter().find(|e| e.len() != dim) {
            return Err(GpError::DimensionMismatch {
                expected: dim,
                actual: e.len(),
            });
        }
        Ok(PolynomialBasis { dim, exponents })
    }

    /// Constant basis `[1]`
    pub fn constant(dim: usize) -> Self {
        PolynomialBasis {
            dim,
            exponents: vec![vec![0; dim]],
        }
    }

    /// Affine basis `[1, x_1, ..., x_d]`
    pub fn linear(dim: usize) -> Self {
        let mut exponents = vec![vec![0; dim]];
        for k in 0..dim {
            let mut e = vec![0; dim];
            e[k] = 1;
            exponents.push(e);
        }
        PolynomialBasis { dim, exponents }
    }

    /// Full quadratic basis `[1, x_i, x_i x_j (i <= j)]`
    pub fn quadratic(dim: usize) -> Self {
        let mut basis = Self::linear(dim);
        for i in 0..dim {
            for j in i..dim {
                let mut e = vec![0; dim];
                e[i] += 1;
                e[j] += 1;
                basis.exponents.push(e);
            }
        }
        basis
    }

    /// Dimension of points
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of monomials
    pub fn size(&self) -> usize {
        self.exponents.len()
    }

    /// Basis evaluation at the given `x` data points specified as (n, nx) matrix,
    /// returns a (n, p) matrix
    pub fn value(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        Array2::from_shape_fn((x.nrows(), self.size()), |(i, j)| {
            self.exponents[j]
                .iter()
                .zip(x.row(i).iter())
                .fold(1., |acc, (&e, &v)| acc * v.powi(e as i32))
        })
    }

    /// Basis jacobian at the given `x` data point specified as (nx,) vector,
    /// returns a (p, nx) matrix
    pub fn jacobian(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> Array2<f64> {
        Array2::from_shape_fn((self.size(), self.dim), |(j, k)| {
            let e = &self.exponents[j];
            if e[k] == 0 {
                return 0.;
            }
            let mut v = e[k] as f64 * x[k].powi(e[k] as i32 - 1);
            for (l, (&el, &xl)) in e.iter().zip(x.iter()).enumerate() {
                if l != k {
                    v *= xl.powi(el as i32);
                }
            }
            v
        })
    }

    /// Mean value at `x` given fitted coefficients
    pub fn predict(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        beta: &Array1<f64>,
    ) -> Array1<f64> {
        self.value(x).dot(beta)
    }
}

impl fmt::Display for PolynomialBasis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let max_degree = self
            .exponents
            .iter()
            .map(|e| e.iter().sum::<u32>())
            .max()
            .unwrap_or(0);
        write!(f, "Polynomial(degree={max_degree}, size={})", self.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use finitediff::FiniteDiff;
    use ndarray::array;

    #[test]
    fn test_quadratic_value() {
        let basis = PolynomialBasis::quadratic(2);
        assert_eq!(basis.size(), 6);
        let x = array![[2., 3.]];
        assert_abs_diff_eq!(
            basis.value(&x),
            array![[1., 2., 3., 4., 6., 9.]],
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_quadratic_jacobian() {
        let basis = PolynomialBasis::quadratic(3);
        let x0 = array![0.3, -1.2, 2.];
        let jac = basis.jacobian(&x0);
        for j in 0..basis.size() {
            let f = |x: &Vec<f64>| -> f64 {
                let x = Array2::from_shape_vec((1, 3), x.clone()).unwrap();
                basis.value(&x)[[0, j]]
            };
            let fd = x0.to_vec().central_diff(&f);
            for k in 0..3 {
                assert_abs_diff_eq!(jac[[j, k]], fd[k], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_invalid_basis() {
        assert!(PolynomialBasis::new(2, vec![]).is_err());
        assert!(PolynomialBasis::new(2, vec![vec![0, 1, 0]]).is_err());
    }
}
