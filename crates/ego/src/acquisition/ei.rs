use super::{check_dim, AcquisitionFunction};
use crate::errors::{EgoError, Result};
use crate::failure::ProbabilisticFailure;
use crate::utils::{norm_cdf, norm_pdf};

use bayesbox_gp::Predictor;
use ndarray::{s, Array1, Array2, ArrayView2, Axis, Zip};
use statrs::distribution::{ContinuousCDF, Normal};

/// Quantile of the predictive distribution defining the augmented EI best point
pub const AEI_QUANTILE: f64 = 0.75;
/// Mean observation noise above which the augmented EI is used
pub const AUGMENTED_EI_NOISE_THRESHOLD: f64 = 1e-6;
/// Success probability over which a sampled point may define the best value
pub const MINIMUM_SUCCESS_PROBABILITY: f64 = 0.5;

fn check_sampled(predictor: &dyn Predictor) -> Result<()> {
    if predictor.num_sampled() == 0 {
        return Err(EgoError::InvalidValue(
            "expected improvement needs sampled points".to_string(),
        ));
    }
    Ok(())
}

/// Closed form `sigma (z Phi(z) + phi(z))` with `z = (best - mean) / sigma`
pub(crate) fn closed_form_ei(
    predictor: &dyn Predictor,
    x: ArrayView2<f64>,
    best: f64,
) -> Result<Array1<f64>> {
    let mean = predictor.compute_mean_of_points(x)?;
    let var = predictor.compute_variance_of_points(x)?;
    let ei = Zip::from(&mean).and(&var).map_collect(|&m, &v| {
        let sigma = v.sqrt();
        let z = (best - m) / sigma;
        sigma * (z * norm_cdf(z) + norm_pdf(z))
    });
    if let Some(v) = ei.iter().find(|v| !v.is_finite()) {
        return Err(EgoError::NonPsdCovariance(format!(
            "expected improvement evaluated to {v}"
        )));
    }
    Ok(ei.mapv(|v| v.max(0.)))
}

/// Gradient `phi(z) dsigma - Phi(z) dmean` of the closed form
pub(crate) fn closed_form_ei_grad(
    predictor: &dyn Predictor,
    x: ArrayView2<f64>,
    best: f64,
) -> Result<Array2<f64>> {
    let mean = predictor.compute_mean_of_points(x)?;
    let var = predictor.compute_variance_of_points(x)?;
    let grad_mean = predictor.compute_grad_mean_of_points(x)?;
    let grad_var = predictor.compute_grad_variance_of_points(x)?;
    let mut grad = Array2::zeros(grad_mean.raw_dim());
    Zip::from(grad.rows_mut())
        .and(grad_mean.rows())
        .and(grad_var.rows())
        .and(&mean)
        .and(&var)
        .for_each(|mut g, dm, dv, &m, &v| {
            let sigma = v.sqrt();
            let z = (best - m) / sigma;
            let dsigma = &dv / (2. * sigma);
            g.assign(&(dsigma * norm_pdf(z) - &dm * norm_cdf(z)));
        });
    Ok(grad)
}

/// Expected improvement over the best sampled value
#[derive(Clone, Debug)]
pub struct ExpectedImprovement {
    predictor: Box<dyn Predictor>,
    best: f64,
}

impl ExpectedImprovement {
    pub fn new(predictor: &(dyn Predictor + 'static)) -> Result<Self> {
        check_sampled(predictor)?;
        Ok(ExpectedImprovement {
            best: predictor.best_observed_value()?,
            predictor: dyn_clonable::dyn_clone::clone_box(predictor),
        })
    }

    /// Value improvements are measured against
    pub fn best(&self) -> f64 {
        self.best
    }
}

impl AcquisitionFunction for ExpectedImprovement {
    fn name(&self) -> &'static str {
        "EI"
    }

    fn dim(&self) -> usize {
        self.predictor.dim()
    }

    fn evaluate_at_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_dim(self.dim(), &x)?;
        closed_form_ei(&*self.predictor, x, self.best)
    }

    fn differentiable(&self) -> bool {
        self.predictor.translation_invariant()
    }

    fn evaluate_grad_at_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        check_dim(self.dim(), &x)?;
        closed_form_ei_grad(&*self.predictor, x, self.best)
    }
}

/// Expected improvement for noisy observations.
///
/// The best value is the predicted mean at the sampled point minimizing the
/// [AEI_QUANTILE] quantile of the predictive distribution, and the improvement
/// is damped by `1 - sqrt(noise / (var + noise))` where `noise` is the mean
/// observation noise.
#[derive(Clone, Debug)]
pub struct AugmentedExpectedImprovement {
    predictor: Box<dyn Predictor>,
    best: f64,
    noise: f64,
}

impl AugmentedExpectedImprovement {
    pub fn new(predictor: &(dyn Predictor + 'static)) -> Result<Self> {
        check_sampled(predictor)?;
        let sampled = predictor.points_sampled();
        let mean = predictor.compute_mean_of_points(sampled.view())?;
        let var = predictor.compute_variance_of_points(sampled.view())?;
        let quantile = Normal::new(0., 1.)
            .map_err(|e| EgoError::InvalidValue(e.to_string()))?
            .inverse_cdf(AEI_QUANTILE);
        let (_, best) = Zip::from(&mean).and(&var).fold(
            (f64::INFINITY, f64::INFINITY),
            |(score, best), &m, &v| {
                let s = m + quantile * v.sqrt();
                if s < score {
                    (s, m)
                } else {
                    (score, best)
                }
            },
        );
        let noise = predictor.points_sampled_noise_variance()?.mean().unwrap_or(0.);
        Ok(AugmentedExpectedImprovement {
            predictor: dyn_clonable::dyn_clone::clone_box(predictor),
            best,
            noise,
        })
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    fn penalty(&self, var: &Array1<f64>) -> Array1<f64> {
        var.mapv(|v| 1. - (self.noise / (v + self.noise)).sqrt())
    }
}

impl AcquisitionFunction for AugmentedExpectedImprovement {
    fn name(&self) -> &'static str {
        "AugmentedEI"
    }

    fn dim(&self) -> usize {
        self.predictor.dim()
    }

    fn evaluate_at_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_dim(self.dim(), &x)?;
        let ei = closed_form_ei(&*self.predictor, x, self.best)?;
        let var = self.predictor.compute_variance_of_points(x)?;
        Ok(ei * self.penalty(&var))
    }

    fn differentiable(&self) -> bool {
        self.predictor.translation_invariant()
    }

    fn evaluate_grad_at_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        check_dim(self.dim(), &x)?;
        let ei = closed_form_ei(&*self.predictor, x, self.best)?;
        let grad_ei = closed_form_ei_grad(&*self.predictor, x, self.best)?;
        let var = self.predictor.compute_variance_of_points(x)?;
        let grad_var = self.predictor.compute_grad_variance_of_points(x)?;
        let penalty = self.penalty(&var);
        // d penalty = s / (2 (var + noise)) dvar with s = sqrt(noise / (var + noise))
        let dpenalty_dvar = var.mapv(|v| {
            let s = (self.noise / (v + self.noise)).sqrt();
            s / (2. * (v + self.noise))
        });
        Ok(grad_ei * &penalty.insert_axis(Axis(1))
            + grad_var * &(ei * dpenalty_dvar).insert_axis(Axis(1)))
    }
}

/// Expected improvement weighted by a probability of success.
///
/// The best value is the smallest sampled value among points whose
/// probability of success reaches [MINIMUM_SUCCESS_PROBABILITY], the smallest
/// sampled value when none does.
#[derive(Clone, Debug)]
pub struct ExpectedImprovementWithFailures {
    predictor: Box<dyn Predictor>,
    failure: Box<dyn ProbabilisticFailure>,
    best: f64,
}

impl ExpectedImprovementWithFailures {
    pub fn new(predictor: &(dyn Predictor + 'static), failure: &(dyn ProbabilisticFailure + 'static)) -> Result<Self> {
        check_sampled(predictor)?;
        if failure.dim() != predictor.dim() {
            return Err(EgoError::DimensionMismatch {
                expected: predictor.dim(),
                actual: failure.dim(),
            });
        }
        let values = predictor.real_values()?;
        let sampled = predictor.points_sampled();
        let real = sampled.slice(s![..values.len(), ..]);
        let success = failure.compute_probability_of_success(real)?;
        let best = Zip::from(&values)
            .and(&success)
            .fold(f64::INFINITY, |best, &y, &p| {
                if p >= MINIMUM_SUCCESS_PROBABILITY {
                    best.min(y)
                } else {
                    best
                }
            });
        let best = if best.is_finite() {
            best
        } else {
            predictor.best_observed_value()?
        };
        Ok(ExpectedImprovementWithFailures {
            predictor: dyn_clonable::dyn_clone::clone_box(predictor),
            failure: dyn_clonable::dyn_clone::clone_box(failure),
            best,
        })
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

impl AcquisitionFunction for ExpectedImprovementWithFailures {
    fn name(&self) -> &'static str {
        "EIWithFailures"
    }

    fn dim(&self) -> usize {
        self.predictor.dim()
    }

    fn evaluate_at_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_dim(self.dim(), &x)?;
        let ei = closed_form_ei(&*self.predictor, x, self.best)?;
        Ok(ei * self.failure.compute_probability_of_success(x)?)
    }

    fn differentiable(&self) -> bool {
        self.predictor.translation_invariant()
    }

    fn evaluate_grad_at_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        check_dim(self.dim(), &x)?;
        let ei = closed_form_ei(&*self.predictor, x, self.best)?;
        let grad_ei = closed_form_ei_grad(&*self.predictor, x, self.best)?;
        let p = self.failure.compute_probability_of_success(x)?;
        let grad_p = self.failure.compute_grad_probability_of_success(x)?;
        Ok(grad_ei * &p.insert_axis(Axis(1)) + grad_p * &ei.insert_axis(Axis(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::expected_improvement;
    use crate::failure::LogisticFailure;
    use approx::assert_abs_diff_eq;
    use bayesbox_gp::covariance::Matern52;
    use bayesbox_gp::{GaussianProcess, HistoricalData};
    use finitediff::FiniteDiff;
    use ndarray::{array, Array};

    fn gp(noise: f64) -> GaussianProcess {
        let x = array![
            [0.1, 0.2],
            [0.5, 0.9],
            [0.8, 0.3],
            [0.3, 0.6],
            [0.9, 0.8],
            [0.6, 0.5]
        ];
        let y = array![0.4, -1.2, 0.8, 0., 1.5, -0.3];
        let data = HistoricalData::from_arrays(&x, &y, &Array::from_elem(6, noise)).unwrap();
        GaussianProcess::new(
            Box::new(Matern52::new(1., &[0.4, 0.5]).unwrap()),
            data,
            None,
            None,
        )
        .unwrap()
    }

    fn check_gradient(af: &dyn AcquisitionFunction, x: &[f64]) {
        let f = |v: &Vec<f64>| -> f64 {
            let p = Array::from_shape_vec((1, v.len()), v.clone()).unwrap();
            af.evaluate_at_points(p.view()).unwrap()[0]
        };
        let expected = x.to_vec().central_diff(&f);
        let p = Array::from_shape_vec((1, x.len()), x.to_vec()).unwrap();
        let grad = af.evaluate_grad_at_points(p.view()).unwrap();
        for (g, e) in grad.row(0).iter().zip(expected.iter()) {
            assert_abs_diff_eq!(g, e, epsilon = 1e-6 * (1. + e.abs()) * x.len() as f64);
        }
    }

    #[test]
    fn test_ei_against_reference_formula() {
        let gp = gp(1e-8);
        let ei = ExpectedImprovement::new(&gp).unwrap();
        assert_eq!(ei.best(), -1.2);
        let x = array![[0.2, 0.3], [0.7, 0.7]];
        let values = ei.evaluate_at_points(x.view()).unwrap();
        let mean = gp.compute_mean_of_points(&x).unwrap();
        let var = gp.compute_variance_of_points(&x).unwrap();
        for i in 0..2 {
            // E[max(best - Y, 0)] by integration of the gaussian tail
            let sigma = var[i].sqrt();
            let n = 20000;
            let (lo, hi) = ((mean[i] - 10. * sigma).min(-1.2), -1.2);
            let h = (hi - lo) / n as f64;
            let integral: f64 = (0..n)
                .map(|k| {
                    let y = lo + (k as f64 + 0.5) * h;
                    (-1.2 - y) * norm_pdf((y - mean[i]) / sigma) / sigma * h
                })
                .sum();
            assert_abs_diff_eq!(values[i], integral.max(0.), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_ei_vanishes_at_sampled_points() {
        let gp = gp(1e-10);
        let ei = ExpectedImprovement::new(&gp).unwrap();
        // sampled point with value 1.5 far above the best -1.2
        let v = ei.evaluate_at_points(array![[0.9, 0.8]].view()).unwrap();
        assert!(v[0] >= 0. && v[0] < 1e-8);
        let grid = Array::from_shape_fn((50, 2), |(i, j)| (i as f64 / 49.).powi(j as i32 + 1));
        let v = ei.evaluate_at_points(grid.view()).unwrap();
        assert!(v.iter().all(|e| *e >= 0.));
    }

    #[test]
    fn test_ei_gradient() {
        let ei = ExpectedImprovement::new(&gp(1e-6)).unwrap();
        assert!(ei.differentiable());
        check_gradient(&ei, &[0.35, 0.75]);
        check_gradient(&ei, &[0.05, 0.45]);
    }

    #[test]
    fn test_augmented_ei() {
        let gp = gp(0.05);
        let aei = AugmentedExpectedImprovement::new(&gp).unwrap();
        let x = array![[0.35, 0.75], [0.7, 0.1]];
        let plain = closed_form_ei(&gp, x.view(), aei.best()).unwrap();
        let values = aei.evaluate_at_points(x.view()).unwrap();
        assert!(values.iter().zip(plain.iter()).all(|(a, p)| a <= p && *a >= 0.));
        check_gradient(&aei, &[0.35, 0.75]);
        check_gradient(&aei, &[0.7, 0.1]);
    }

    #[test]
    fn test_ei_with_failures() {
        let gp = gp(1e-6);
        // success only below -1, the -1.2 observation qualifies
        let failure = LogisticFailure::new(&gp, -1.).unwrap();
        let af = ExpectedImprovementWithFailures::new(&gp, &failure).unwrap();
        assert_eq!(af.best(), -1.2);
        check_gradient(&af, &[0.45, 0.75]);

        // no observation qualifies, the plain best is used
        let failure = LogisticFailure::new(&gp, -5.).unwrap();
        let af = ExpectedImprovementWithFailures::new(&gp, &failure).unwrap();
        assert_eq!(af.best(), -1.2);
        let x = array![[0.45, 0.75]];
        let v = af.evaluate_at_points(x.view()).unwrap();
        let ei = closed_form_ei(&gp, x.view(), -1.2).unwrap();
        assert!(v[0] <= ei[0]);
    }

    #[test]
    fn test_factory_resolution() {
        let noiseless = gp(1e-8);
        assert_eq!(expected_improvement(&noiseless, None).unwrap().name(), "EI");
        let noisy = gp(1e-2);
        assert_eq!(
            expected_improvement(&noisy, None).unwrap().name(),
            "AugmentedEI"
        );
        let failure = LogisticFailure::new(&noisy, 0.).unwrap();
        assert_eq!(
            expected_improvement(&noisy, Some(&failure)).unwrap().name(),
            "EIWithFailures"
        );
        assert!(expected_improvement(&GaussianProcess::new(
            Box::new(Matern52::new(1., &[0.4]).unwrap()),
            HistoricalData::new(1),
            None,
            None
        )
        .unwrap(), None)
        .is_err());
    }
}
