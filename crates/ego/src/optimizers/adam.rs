use super::{starting_points, BestTracker, OptimizationResult, OptimizerConfig, VectorizedOptimizer};
use crate::acquisition::AcquisitionFunction;
use crate::domain::OptimizationDomain;
use crate::errors::{EgoError, Result};

use log::debug;
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand::RngCore;

/// Step size relative to the width of each coordinate range
pub const ADAM_LEARNING_RATE: f64 = 0.05;
pub const ADAM_BETA1: f64 = 0.9;
pub const ADAM_BETA2: f64 = 0.999;
pub const ADAM_EPSILON: f64 = 1e-8;

/// Gradient ascent with adaptive moments over the whole population
pub struct AdamOptimizer<'a, D: OptimizationDomain> {
    domain: &'a D,
    af: &'a dyn AcquisitionFunction,
    config: OptimizerConfig,
    learning_rate: f64,
}

impl<'a, D: OptimizationDomain> AdamOptimizer<'a, D> {
    /// Fails when the acquisition function has no gradient
    pub fn new(
        domain: &'a D,
        af: &'a dyn AcquisitionFunction,
        config: OptimizerConfig,
    ) -> Result<Self> {
        if !af.differentiable() {
            return Err(EgoError::NotDifferentiable(af.name().to_string()));
        }
        if af.dim() != domain.dim() {
            return Err(EgoError::DimensionMismatch {
                expected: domain.dim(),
                actual: af.dim(),
            });
        }
        Ok(AdamOptimizer {
            domain,
            af,
            config,
            learning_rate: ADAM_LEARNING_RATE,
        })
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }
}

impl<'a, D: OptimizationDomain> VectorizedOptimizer for AdamOptimizer<'a, D> {
    fn optimize(&self, rng: &mut dyn RngCore) -> Result<OptimizationResult> {
        let n = self.config.num_multistarts.max(1);
        let start = starting_points(self.domain, &self.config, n, rng)?;
        let xlimits = self.domain.xlimits();
        let widths: Array1<f64> = &xlimits.column(1) - &xlimits.column(0);
        let steps = (widths * self.learning_rate).insert_axis(Axis(0));

        let mut points = start.clone();
        let mut values = self.af.evaluate_in_batches(points.view())?;
        let mut tracker = BestTracker::new(&points, &values)?;
        let mut m = Array2::<f64>::zeros(points.raw_dim());
        let mut v = Array2::<f64>::zeros(points.raw_dim());

        for t in 1..=self.config.maxiter {
            let grad = self.af.evaluate_grad_at_points(points.view())?;
            m = m * ADAM_BETA1 + &grad * (1. - ADAM_BETA1);
            v = v * ADAM_BETA2 + grad.mapv(|g| g * g) * (1. - ADAM_BETA2);
            let m_hat = &m / (1. - ADAM_BETA1.powi(t as i32));
            let v_hat = &v / (1. - ADAM_BETA2.powi(t as i32));
            let update = m_hat / v_hat.mapv(|s| s.sqrt() + ADAM_EPSILON) * &steps;
            points = self.domain.restrict_points((points + update).view());
            values = self.af.evaluate_in_batches(points.view())?;
            tracker.update(&points, &values)?;
            debug!("Adam iteration {}: best {}", t, tracker.value);
        }
        Ok(tracker.finish(start, points, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::ExpectedImprovement;
    use crate::domain::ContinuousDomain;
    use crate::geometry::Halfspaces;
    use bayesbox_gp::covariance::SquaredExponential;
    use bayesbox_gp::{GaussianProcess, HistoricalData};
    use ndarray::{array, Array};
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn gp() -> GaussianProcess {
        let x = array![[0.1, 0.1], [0.9, 0.2], [0.5, 0.5], [0.2, 0.8], [0.8, 0.9]];
        let y = array![1., 0.5, -0.5, 0.8, 0.2];
        let data = HistoricalData::from_arrays(&x, &y, &Array::from_elem(5, 1e-8)).unwrap();
        GaussianProcess::new(
            Box::new(SquaredExponential::new(1., &[0.3, 0.3]).unwrap()),
            data,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_adam_improves_ei() {
        let gp = gp();
        let ei = ExpectedImprovement::new(&gp).unwrap();
        let domain = ContinuousDomain::new(&array![[0., 1.], [0., 1.]]).unwrap();
        let adam = AdamOptimizer::new(
            &domain,
            &ei,
            OptimizerConfig::default().num_multistarts(6).maxiter(40),
        )
        .unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let res = adam.optimize(&mut rng).unwrap();
        let start_best = ei
            .evaluate_at_points(res.starting_points.view())
            .unwrap()
            .fold(0f64, |a, &b| a.max(b));
        assert!(res.best_value >= start_best);
        assert_eq!(res.best_value_history.len(), 41);
        assert!(res
            .ending_points
            .rows()
            .into_iter()
            .all(|r| domain.check_point_acceptable(&r)));
    }

    #[test]
    fn test_adam_output_in_constrained_domain() {
        let gp = gp();
        let ei = ExpectedImprovement::new(&gp).unwrap();
        let domain = ContinuousDomain::new(&array![[0., 1.], [0., 1.]])
            .unwrap()
            .with_constraints(Halfspaces::new(array![[-1., 1.]], array![0.]).unwrap())
            .unwrap();
        let adam = AdamOptimizer::new(
            &domain,
            &ei,
            OptimizerConfig::default().num_multistarts(5).maxiter(25),
        )
        .unwrap()
        .learning_rate(0.2);
        let mut rng = Xoshiro256Plus::seed_from_u64(9);
        let res = adam.optimize(&mut rng).unwrap();
        assert!(domain.check_point_acceptable(&res.best_point));
        assert!(res
            .ending_points
            .rows()
            .into_iter()
            .all(|r| domain.check_point_acceptable(&r)));
    }

    #[test]
    fn test_adam_refuses_non_differentiable() {
        #[derive(Clone)]
        struct Flat;
        impl AcquisitionFunction for Flat {
            fn name(&self) -> &'static str {
                "Flat"
            }
            fn dim(&self) -> usize {
                1
            }
            fn evaluate_at_points(&self, x: ndarray::ArrayView2<f64>) -> Result<Array1<f64>> {
                Ok(Array1::zeros(x.nrows()))
            }
        }
        let domain = ContinuousDomain::new(&array![[0., 1.]]).unwrap();
        assert!(matches!(
            AdamOptimizer::new(&domain, &Flat, OptimizerConfig::default()),
            Err(EgoError::NotDifferentiable(_))
        ));
    }
}
