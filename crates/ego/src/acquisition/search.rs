use super::{check_dim, AcquisitionFunction};
use crate::domain::CategoricalDomain;
use crate::errors::{EgoError, Result};
use crate::failure::ProbabilisticFailure;
use crate::geometry::compute_distance_matrix_squared;

use ndarray::{Array1, Array2, ArrayView2, Zip};

/// Probability of success zeroed around repulsor points.
///
/// Distances are measured in the normalized hypercube of the one-hot domain
/// where categorical choices are snapped to their vertex, a candidate within
/// squared distance `threshold` of any repulsor evaluates to zero.
#[derive(Clone, Debug)]
pub struct SearchAcquisition {
    failure: Box<dyn ProbabilisticFailure>,
    domain: CategoricalDomain,
    repulsors: Array2<f64>,
    threshold: f64,
}

impl SearchAcquisition {
    /// * `repulsors`: (r, one_hot_dim) one-hot points to stay away from
    /// * `threshold`: squared distance in the normalized hypercube
    pub fn new(
        failure: &(dyn ProbabilisticFailure + 'static),
        domain: &CategoricalDomain,
        repulsors: &Array2<f64>,
        threshold: f64,
    ) -> Result<Self> {
        if failure.dim() != domain.one_hot_dim() {
            return Err(EgoError::DimensionMismatch {
                expected: domain.one_hot_dim(),
                actual: failure.dim(),
            });
        }
        if !(threshold >= 0.) {
            return Err(EgoError::InvalidValue(format!(
                "repulsion threshold should be non negative, got {threshold}"
            )));
        }
        let repulsors = if repulsors.is_empty() {
            Array2::zeros((0, domain.one_hot_dim()))
        } else {
            domain.normalize_one_hot_for_search(repulsors)?
        };
        Ok(SearchAcquisition {
            failure: dyn_clonable::dyn_clone::clone_box(failure),
            domain: domain.clone(),
            repulsors,
            threshold,
        })
    }

    pub fn num_repulsors(&self) -> usize {
        self.repulsors.nrows()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl AcquisitionFunction for SearchAcquisition {
    fn name(&self) -> &'static str {
        "Search"
    }

    fn dim(&self) -> usize {
        self.domain.one_hot_dim()
    }

    fn evaluate_at_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_dim(self.dim(), &x)?;
        let mut values = self.failure.compute_probability_of_success(x)?;
        if self.repulsors.nrows() == 0 {
            return Ok(values);
        }
        let normalized = self.domain.normalize_one_hot_for_search(&x)?;
        let distances = compute_distance_matrix_squared(&normalized, &self.repulsors);
        Zip::from(&mut values)
            .and(distances.rows())
            .for_each(|v, d| {
                if d.iter().any(|&d| d <= self.threshold) {
                    *v = 0.;
                }
            });
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::GaussianCdfFailure;
    use crate::types::DomainComponent;
    use bayesbox_gp::covariance::SquaredExponential;
    use bayesbox_gp::{GaussianProcess, HistoricalData};
    use ndarray::{array, Array};

    #[test]
    fn test_search_repulsion() {
        let domain = CategoricalDomain::new(
            vec![
                DomainComponent::double(0., 10.),
                DomainComponent::categorical(&[1., 2.]),
            ],
            vec![],
        )
        .unwrap();
        // one-hot layout is [double, category 1, category 2]
        let x = array![[1., 1., 0.], [4., 0., 1.], [8., 1., 0.]];
        let data = HistoricalData::from_arrays(&x, &array![0., 1., -1.], &Array::from_elem(3, 1e-4))
            .unwrap();
        let gp = GaussianProcess::new(
            Box::new(SquaredExponential::new(1., &[3., 1., 1.]).unwrap()),
            data,
            None,
            None,
        )
        .unwrap();
        let failure = GaussianCdfFailure::new(&gp, 0.5);

        let repulsors = array![[5., 1., 0.]];
        let af = SearchAcquisition::new(&failure, &domain, &repulsors, 0.01).unwrap();
        assert!(!af.differentiable());
        assert!(af.evaluate_grad_at_points(x.view()).is_err());

        // normalized distance 0.005^2 to the repulsor, then same double value
        // on the other category at squared distance 2
        let candidates = array![[5.05, 0.8, 0.2], [5., 0., 1.], [2., 1., 0.]];
        let values = af.evaluate_at_points(candidates.view()).unwrap();
        let p = failure.compute_probability_of_success(candidates.view()).unwrap();
        assert_eq!(values[0], 0.);
        assert_eq!(values[1], p[1]);
        assert_eq!(values[2], p[2]);
        assert!(values.iter().all(|v| *v >= 0.));

        let free = SearchAcquisition::new(&failure, &domain, &Array2::zeros((0, 3)), 0.01).unwrap();
        assert_eq!(free.num_repulsors(), 0);
        assert_eq!(free.evaluate_at_points(candidates.view()).unwrap(), p);
        assert!(SearchAcquisition::new(&failure, &domain, &repulsors, -1.).is_err());
    }
}
