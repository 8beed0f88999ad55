//! Probability of success models built on predictors.
//!
//! Success at `x` means the modeled value stays below a threshold.
use crate::errors::{EgoError, Result};
use crate::utils::{norm_cdf, norm_pdf};

use bayesbox_gp::Predictor;
use dyn_clonable::*;
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};

/// Steepness of the logistic model when the observed values have no range
pub const DEFAULT_LOGISTIC_STEEPNESS: f64 = 10.;

/// A model of the probability that evaluating a point succeeds
#[clonable]
pub trait ProbabilisticFailure: Clone + Send + Sync {
    /// Dimension of points
    fn dim(&self) -> usize;

    /// Probability of success (n) at rows of `x`
    fn compute_probability_of_success(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Gradient (n, d) of the probability of success at rows of `x`
    fn compute_grad_probability_of_success(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;
}

impl std::fmt::Debug for dyn ProbabilisticFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProbabilisticFailure(dim={})", self.dim())
    }
}

fn check_dim(expected: usize, x: &ArrayView2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(EgoError::DimensionMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    Ok(())
}

/// Logistic transform `1 / (1 + exp(k (mean - threshold)))` of the predicted mean
#[derive(Clone, Debug)]
pub struct LogisticFailure {
    predictor: Box<dyn Predictor>,
    threshold: f64,
    steepness: f64,
}

impl LogisticFailure {
    /// The steepness puts the 10% success level at 10% of the observed value
    /// range above the threshold
    pub fn new(predictor: &(dyn Predictor + 'static), threshold: f64) -> Result<Self> {
        let values = predictor.real_values()?;
        let range = values.fold(f64::NEG_INFINITY, |a, &b| a.max(b))
            - values.fold(f64::INFINITY, |a, &b| a.min(b));
        let steepness = if range.is_finite() && range > 0. {
            9f64.ln() / (0.1 * range)
        } else {
            DEFAULT_LOGISTIC_STEEPNESS
        };
        Ok(LogisticFailure {
            predictor: dyn_clonable::dyn_clone::clone_box(predictor),
            threshold,
            steepness,
        })
    }

    pub fn steepness(&self) -> f64 {
        self.steepness
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl ProbabilisticFailure for LogisticFailure {
    fn dim(&self) -> usize {
        self.predictor.dim()
    }

    fn compute_probability_of_success(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_dim(self.dim(), &x)?;
        let mean = self.predictor.compute_mean_of_points(x)?;
        Ok(mean.mapv(|m| 1. / (1. + (self.steepness * (m - self.threshold)).exp())))
    }

    fn compute_grad_probability_of_success(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let p = self.compute_probability_of_success(x)?;
        let mut grad = self.predictor.compute_grad_mean_of_points(x)?;
        Zip::from(grad.rows_mut())
            .and(&p)
            .for_each(|mut g, &p| g *= -self.steepness * p * (1. - p));
        Ok(grad)
    }
}

/// Gaussian transform `Phi((threshold - mean) / std)` of the predicted distribution
#[derive(Clone, Debug)]
pub struct GaussianCdfFailure {
    predictor: Box<dyn Predictor>,
    threshold: f64,
}

impl GaussianCdfFailure {
    pub fn new(predictor: &(dyn Predictor + 'static), threshold: f64) -> Self {
        GaussianCdfFailure {
            predictor: dyn_clonable::dyn_clone::clone_box(predictor),
            threshold,
        }
    }
}

impl ProbabilisticFailure for GaussianCdfFailure {
    fn dim(&self) -> usize {
        self.predictor.dim()
    }

    fn compute_probability_of_success(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_dim(self.dim(), &x)?;
        let mean = self.predictor.compute_mean_of_points(x)?;
        let var = self.predictor.compute_variance_of_points(x)?;
        Ok(Zip::from(&mean)
            .and(&var)
            .map_collect(|m, v| norm_cdf((self.threshold - m) / v.sqrt())))
    }

    fn compute_grad_probability_of_success(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        check_dim(self.dim(), &x)?;
        let mean = self.predictor.compute_mean_of_points(x)?;
        let var = self.predictor.compute_variance_of_points(x)?;
        let grad_mean = self.predictor.compute_grad_mean_of_points(x)?;
        let grad_var = self.predictor.compute_grad_variance_of_points(x)?;
        let mut grad = Array2::zeros(grad_mean.raw_dim());
        Zip::from(grad.rows_mut())
            .and(grad_mean.rows())
            .and(grad_var.rows())
            .and(&mean)
            .and(&var)
            .for_each(|mut g, dm, dv, &m, &v| {
                let sigma = v.sqrt();
                let z = (self.threshold - m) / sigma;
                // dz = -dmean / sigma - z dsigma / sigma with dsigma = dvar / (2 sigma)
                let dz = &dm * (-1. / sigma) - &dv * (z / (2. * v));
                g.assign(&(dz * norm_pdf(z)));
            });
        Ok(grad)
    }
}

/// Product of independent failure models
#[derive(Clone, Debug)]
pub struct ProductOfFailures {
    models: Vec<Box<dyn ProbabilisticFailure>>,
}

impl ProductOfFailures {
    pub fn new(models: Vec<Box<dyn ProbabilisticFailure>>) -> Result<Self> {
        let dim = match models.first() {
            Some(m) => m.dim(),
            None => {
                return Err(EgoError::InvalidValue(
                    "a product of failure models needs at least one model".to_string(),
                ))
            }
        };
        if let Some(m) = models.iter().find(|m| m.dim() != dim) {
            return Err(EgoError::DimensionMismatch {
                expected: dim,
                actual: m.dim(),
            });
        }
        Ok(ProductOfFailures { models })
    }
}

impl ProbabilisticFailure for ProductOfFailures {
    fn dim(&self) -> usize {
        self.models[0].dim()
    }

    fn compute_probability_of_success(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let mut p: Array1<f64> = Array1::ones(x.nrows());
        for m in self.models.iter() {
            p *= &m.compute_probability_of_success(x)?;
        }
        Ok(p)
    }

    fn compute_grad_probability_of_success(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let probs = self
            .models
            .iter()
            .map(|m| m.compute_probability_of_success(x))
            .collect::<Result<Vec<_>>>()?;
        let mut grad = Array2::zeros((x.nrows(), x.ncols()));
        for (i, m) in self.models.iter().enumerate() {
            let mut cofactor: Array1<f64> = Array1::ones(x.nrows());
            for (j, p) in probs.iter().enumerate() {
                if j != i {
                    cofactor *= p;
                }
            }
            grad += &(m.compute_grad_probability_of_success(x)? * cofactor.insert_axis(Axis(1)));
        }
        Ok(grad)
    }
}
