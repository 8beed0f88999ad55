use super::{ContinuousDomain, OptimizationDomain};
use crate::errors::{EgoError, Result};

use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Data, DataMut, Ix1, Ix2};
use ndarray_rand::rand::Rng;

/// A [ContinuousDomain] with some coordinates held at fixed values.
///
/// Fixed coordinates may not appear in any linear constraint so setting them
/// never breaks feasibility.
#[derive(Clone, Debug)]
pub struct FixedIndicesOnContinuousDomain {
    domain: ContinuousDomain,
    fixed: Vec<(usize, f64)>,
    reference: Array1<f64>,
}

impl FixedIndicesOnContinuousDomain {
    pub fn new(domain: ContinuousDomain, fixed: Vec<(usize, f64)>) -> Result<Self> {
        for &(i, v) in fixed.iter() {
            if i >= domain.dim() {
                return Err(EgoError::InvalidDomain(format!(
                    "fixed index {i} out of domain dimension {}",
                    domain.dim()
                )));
            }
            let limits = domain.xlimits().row(i);
            if !(limits[0] <= v && v <= limits[1]) {
                return Err(EgoError::InvalidDomain(format!(
                    "fixed value {v} of index {i} outside of bounds {limits}"
                )));
            }
            if let Some(c) = domain.constraints() {
                if c.a.column(i).iter().any(|w| *w != 0.) {
                    return Err(EgoError::InvalidDomain(format!(
                        "index {i} is involved in linear constraints and cannot be fixed"
                    )));
                }
            }
        }
        let mut reference = domain.interior_point().clone();
        fixed.iter().for_each(|&(i, v)| reference[i] = v);
        Ok(FixedIndicesOnContinuousDomain {
            domain,
            fixed,
            reference,
        })
    }

    /// Underlying domain
    pub fn domain(&self) -> &ContinuousDomain {
        &self.domain
    }

    /// Fixed `(index, value)` pairs
    pub fn fixed(&self) -> &[(usize, f64)] {
        &self.fixed
    }

    fn set_fixed(&self, x: &mut ArrayBase<impl DataMut<Elem = f64>, Ix2>) {
        for &(i, v) in self.fixed.iter() {
            x.column_mut(i).fill(v);
        }
    }

    pub fn dim(&self) -> usize {
        self.domain.dim()
    }

    pub fn check_point_acceptable(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> bool {
        self.domain.check_point_acceptable(x)
            && self
                .fixed
                .iter()
                .all(|&(i, v)| x.get(i).map_or(false, |xi| *xi == v))
    }

    pub fn generate_quasi_random_points<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Array2<f64>> {
        let mut x = self.domain.generate_quasi_random_points(n, rng)?;
        self.set_fixed(&mut x);
        Ok(x)
    }

    pub fn restrict_points(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        let mut x = x.to_owned();
        self.set_fixed(&mut x);
        let mut restricted = self.domain.restrict_points_to_domain(&x, &self.reference);
        self.set_fixed(&mut restricted);
        restricted
    }
}

impl OptimizationDomain for FixedIndicesOnContinuousDomain {
    fn dim(&self) -> usize {
        FixedIndicesOnContinuousDomain::dim(self)
    }

    fn xlimits(&self) -> &Array2<f64> {
        self.domain.xlimits()
    }

    fn generate_quasi_random_points<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Array2<f64>> {
        FixedIndicesOnContinuousDomain::generate_quasi_random_points(self, n, rng)
    }

    fn restrict_points(&self, x: ArrayView2<f64>) -> Array2<f64> {
        FixedIndicesOnContinuousDomain::restrict_points(self, &x)
    }

    fn check_point_acceptable(&self, x: ArrayView1<f64>) -> bool {
        FixedIndicesOnContinuousDomain::check_point_acceptable(self, &x)
    }
}
