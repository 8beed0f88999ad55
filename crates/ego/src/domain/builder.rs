use super::ContinuousDomain;
use crate::errors::{EgoError, Result};
use crate::geometry::{repeat_block_diagonal, Halfspaces};
use crate::types::SamplerKind;

use ndarray::{s, Array2};

/// Builder of augmented continuous domains.
///
/// ```
/// use bayesbox_ego::{ContinuousDomain, DomainBuilder};
/// use ndarray::array;
///
/// let domain = ContinuousDomain::new(&array![[0., 1.], [-1., 1.]]).unwrap();
/// // three stacked copies of the domain followed by a task cost dimension
/// let augmented = DomainBuilder::from(&domain)
///     .repeat(3)
///     .append_dimension(0.1, 1.)
///     .build()
///     .unwrap();
/// assert_eq!(augmented.dim(), 7);
/// ```
#[derive(Clone, Debug)]
pub struct DomainBuilder {
    xlimits: Array2<f64>,
    constraints: Option<Halfspaces>,
    sampler: SamplerKind,
    invalid: Option<String>,
}

impl From<&ContinuousDomain> for DomainBuilder {
    fn from(domain: &ContinuousDomain) -> Self {
        DomainBuilder {
            xlimits: domain.xlimits().clone(),
            constraints: domain.constraints().cloned(),
            sampler: domain.sampler(),
            invalid: None,
        }
    }
}

impl DomainBuilder {
    /// `q` consecutive copies of the current dimensions, constraints apply
    /// to each copy independently
    pub fn repeat(mut self, q: usize) -> Self {
        if q == 0 {
            self.invalid = Some("domain repetition count should be positive".to_string());
            return self;
        }
        let dim = self.xlimits.nrows();
        let mut xlimits = Array2::zeros((dim * q, 2));
        for k in 0..q {
            xlimits
                .slice_mut(s![k * dim..(k + 1) * dim, ..])
                .assign(&self.xlimits);
        }
        self.xlimits = xlimits;
        self.constraints = self
            .constraints
            .map(|c| repeat_block_diagonal(&c, q));
        self
    }

    /// One more unconstrained dimension in `[lo, hi]`
    pub fn append_dimension(mut self, lo: f64, hi: f64) -> Self {
        let dim = self.xlimits.nrows();
        let mut xlimits = Array2::zeros((dim + 1, 2));
        xlimits.slice_mut(s![..dim, ..]).assign(&self.xlimits);
        xlimits[[dim, 0]] = lo;
        xlimits[[dim, 1]] = hi;
        self.xlimits = xlimits;
        self.constraints = self.constraints.map(|c| {
            let mut a = Array2::zeros((c.len(), dim + 1));
            a.slice_mut(s![.., ..dim]).assign(&c.a);
            Halfspaces { a, b: c.b }
        });
        self
    }

    /// Sampler of the built domain
    pub fn sampler(mut self, sampler: SamplerKind) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn build(self) -> Result<ContinuousDomain> {
        if let Some(msg) = self.invalid {
            return Err(EgoError::InvalidDomain(msg));
        }
        let domain = ContinuousDomain::new(&self.xlimits)?.with_sampler(self.sampler);
        match self.constraints {
            Some(c) => domain.with_constraints(c),
            None => Ok(domain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_repeat_constrained_domain() {
        let domain = ContinuousDomain::new(&array![[0., 1.], [0., 1.]])
            .unwrap()
            .with_constraints(Halfspaces::new(array![[1., 1.]], array![1.]).unwrap())
            .unwrap();
        let repeated = DomainBuilder::from(&domain).repeat(2).build().unwrap();
        assert_eq!(repeated.dim(), 4);
        assert_eq!(repeated.constraints().unwrap().len(), 2);
        assert!(repeated.check_point_acceptable(&array![0.2, 0.7, 0.9, 0.05]));
        assert!(!repeated.check_point_acceptable(&array![0.2, 0.7, 0.9, 0.2]));
        // the original domain is untouched
        assert_eq!(domain.dim(), 2);
    }

    #[test]
    fn test_append_dimension() {
        let domain = ContinuousDomain::new(&array![[0., 1.]])
            .unwrap()
            .with_constraints(Halfspaces::new(array![[1.]], array![0.5]).unwrap())
            .unwrap();
        let augmented = DomainBuilder::from(&domain)
            .append_dimension(0.2, 1.)
            .build()
            .unwrap();
        assert_eq!(augmented.xlimits(), &array![[0., 1.], [0.2, 1.]]);
        assert!(augmented.check_point_acceptable(&array![0.4, 1.]));
        assert!(!augmented.check_point_acceptable(&array![0.6, 0.5]));
        assert!(!augmented.check_point_acceptable(&array![0.4, 0.1]));
    }

    #[test]
    fn test_invalid_builds() {
        let domain = ContinuousDomain::new(&array![[0., 1.]]).unwrap();
        assert!(DomainBuilder::from(&domain).repeat(0).build().is_err());
        assert!(DomainBuilder::from(&domain)
            .append_dimension(1., 1.)
            .build()
            .is_err());
    }
}
