use super::{check_dim, AcquisitionFunction};
use crate::errors::{EgoError, Result};
use crate::utils::{norm_cdf, norm_pdf};

use bayesbox_gp::linalg::psd_factor;
use bayesbox_gp::Predictor;
use linfa_linalg::eigh::*;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;
use std::sync::Mutex;

/// Number of normal draws generated at once by the Monte-Carlo estimator
pub const MC_INNER_BATCH: usize = 1000;
/// Default number of Monte-Carlo draws per evaluated batch
pub const DEFAULT_MC_ITERATIONS: usize = 10_000;
/// Number of Gauss-Legendre nodes on each side of the incumbent used by
/// [multipoint_ei_by_conditioning]
pub const QUADRATURE_NODES: usize = 48;
/// Conditioned values are integrated over `mean +/- QUADRATURE_HALF_WIDTH * std`
const QUADRATURE_HALF_WIDTH: f64 = 8.;

/// Below this standard deviation a predicted value is taken as deterministic
const DETERMINISTIC_STD: f64 = 1e-12;

/// Expected improvement of a batch of `q` points sampled jointly.
///
/// Each evaluated row is a `q x d` batch flattened row-major. The improvement
/// `max(best - min(Y), 0)` is estimated by Monte-Carlo over the joint
/// posterior of the batch and of the points already being sampled.
#[derive(Debug)]
pub struct MultipointExpectedImprovement {
    predictor: Box<dyn Predictor>,
    q: usize,
    points_being_sampled: Array2<f64>,
    num_mc_iterations: usize,
    best: f64,
    rng: Mutex<Xoshiro256Plus>,
}

impl Clone for MultipointExpectedImprovement {
    fn clone(&self) -> Self {
        let rng = match self.rng.lock() {
            Ok(rng) => rng.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        MultipointExpectedImprovement {
            predictor: self.predictor.clone(),
            q: self.q,
            points_being_sampled: self.points_being_sampled.clone(),
            num_mc_iterations: self.num_mc_iterations,
            best: self.best,
            rng: Mutex::new(rng),
        }
    }
}

impl MultipointExpectedImprovement {
    /// * `q`: number of points of evaluated batches
    /// * `points_being_sampled`: (p, d) pending points, may be empty
    /// * `num_mc_iterations`: Monte-Carlo draws per evaluated batch
    /// * `seed`: seed of the generator owned by the estimator
    pub fn new(
        predictor: &(dyn Predictor + 'static),
        q: usize,
        points_being_sampled: &Array2<f64>,
        num_mc_iterations: usize,
        seed: u64,
    ) -> Result<Self> {
        if predictor.num_sampled() == 0 {
            return Err(EgoError::InvalidValue(
                "multipoint expected improvement needs sampled points".to_string(),
            ));
        }
        if q == 0 || num_mc_iterations == 0 {
            return Err(EgoError::InvalidValue(format!(
                "batch size and Monte-Carlo iterations should be positive, got q={q} and {num_mc_iterations} iterations"
            )));
        }
        let points_being_sampled = if points_being_sampled.is_empty() {
            Array2::zeros((0, predictor.dim()))
        } else {
            points_being_sampled.to_owned()
        };
        if points_being_sampled.ncols() != predictor.dim() {
            return Err(EgoError::DimensionMismatch {
                expected: predictor.dim(),
                actual: points_being_sampled.ncols(),
            });
        }
        Ok(MultipointExpectedImprovement {
            best: predictor.best_observed_value()?,
            predictor: dyn_clonable::dyn_clone::clone_box(predictor),
            q,
            points_being_sampled,
            num_mc_iterations,
            rng: Mutex::new(Xoshiro256Plus::seed_from_u64(seed)),
        })
    }

    pub fn q(&self) -> usize {
        self.q
    }

    pub fn num_mc_iterations(&self) -> usize {
        self.num_mc_iterations
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    /// Batch points followed by the points being sampled
    fn joint_points(&self, row: ArrayView1<f64>) -> Array2<f64> {
        let d = self.predictor.dim();
        let mut points = Array2::zeros((self.q + self.points_being_sampled.nrows(), d));
        for i in 0..self.q {
            points.row_mut(i).assign(&row.slice(s![i * d..(i + 1) * d]));
        }
        points
            .slice_mut(s![self.q.., ..])
            .assign(&self.points_being_sampled);
        points
    }

    /// Estimates and standard errors of the estimates at rows of `x`
    pub fn evaluate_with_standard_error(
        &self,
        x: ArrayView2<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        check_dim(self.dim(), &x)?;
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| EgoError::SamplingError(format!("generator lock poisoned: {e}")))?;
        let n = self.num_mc_iterations as f64;
        let mut values = Array1::zeros(x.nrows());
        let mut errors = Array1::zeros(x.nrows());
        for (i, row) in x.rows().into_iter().enumerate() {
            let points = self.joint_points(row);
            let mean = self.predictor.compute_mean_of_points(points.view())?;
            let cov = self.predictor.compute_covariance_of_points(points.view())?;
            let factor = psd_factor(&cov)?;
            let mut sum = 0.;
            let mut sum_sq = 0.;
            let mut remaining = self.num_mc_iterations;
            while remaining > 0 {
                let batch = remaining.min(MC_INNER_BATCH);
                let z: Array2<f64> =
                    Array2::random_using((points.nrows(), batch), StandardNormal, &mut *rng);
                let draws = factor.dot(&z) + &mean.view().insert_axis(Axis(1));
                for draw in draws.columns() {
                    let improvement = draw
                        .iter()
                        .fold(0f64, |acc, &y| acc.max(self.best - y));
                    sum += improvement;
                    sum_sq += improvement * improvement;
                }
                remaining -= batch;
            }
            let estimate = sum / n;
            if !estimate.is_finite() {
                return Err(EgoError::NonPsdCovariance(format!(
                    "multipoint expected improvement evaluated to {estimate}"
                )));
            }
            values[i] = estimate;
            errors[i] = ((sum_sq / n - estimate * estimate).max(0.) / n).sqrt();
        }
        Ok((values, errors))
    }
}

impl AcquisitionFunction for MultipointExpectedImprovement {
    fn name(&self) -> &'static str {
        "qEI"
    }

    fn dim(&self) -> usize {
        self.q * self.predictor.dim()
    }

    fn evaluate_at_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.evaluate_with_standard_error(x)?.0)
    }
}

/// Gauss-Legendre nodes and weights for `int_{-1}^{1} f(t) dt` (Golub-Welsch)
pub fn gauss_legendre(n: usize) -> Result<(Array1<f64>, Array1<f64>)> {
    let mut jacobi = Array2::<f64>::zeros((n, n));
    for i in 1..n {
        let k = i as f64;
        let off = k / (4. * k * k - 1.).sqrt();
        jacobi[[i - 1, i]] = off;
        jacobi[[i, i - 1]] = off;
    }
    let (nodes, vectors) = jacobi.eigh_into()?;
    let weights = vectors.row(0).mapv(|v| 2. * v * v);
    Ok((nodes, weights))
}

/// Expected improvement `E[max(best - min(Y), 0)]` of `Y ~ N(mean, cov)`
/// computed by conditioning on the first value.
///
/// The improvement has a kink where the first value crosses the incumbent, the
/// integral over the first value is split there and each side is integrated
/// with Gauss-Legendre quadrature. The cost grows as `2 * QUADRATURE_NODES` to
/// the power `len - 1`, it is meant to cross-check the Monte-Carlo estimator on
/// small batches.
pub fn multipoint_ei_by_conditioning(
    mean: &Array1<f64>,
    cov: &Array2<f64>,
    best: f64,
) -> Result<f64> {
    if cov.nrows() != mean.len() || cov.ncols() != mean.len() {
        return Err(EgoError::DimensionMismatch {
            expected: mean.len(),
            actual: cov.nrows(),
        });
    }
    let rule = gauss_legendre(QUADRATURE_NODES)?;
    Ok(conditioned_ei(mean, cov, best, &rule))
}

/// `int_lo^hi f(u) du` with the rule mapped from `[-1, 1]`
fn integrate(
    f: &impl Fn(f64) -> f64,
    lo: f64,
    hi: f64,
    (nodes, weights): &(Array1<f64>, Array1<f64>),
) -> f64 {
    if hi <= lo {
        return 0.;
    }
    let half = 0.5 * (hi - lo);
    let center = 0.5 * (hi + lo);
    half * nodes
        .iter()
        .zip(weights.iter())
        .map(|(&t, &w)| w * f(center + half * t))
        .sum::<f64>()
}

fn conditioned_ei(
    mean: &Array1<f64>,
    cov: &Array2<f64>,
    best: f64,
    rule: &(Array1<f64>, Array1<f64>),
) -> f64 {
    let m = mean.len();
    if m == 0 {
        return 0.;
    }
    let var1 = cov[[0, 0]].max(0.);
    let sigma1 = var1.sqrt();
    if m == 1 {
        if sigma1 < DETERMINISTIC_STD {
            return (best - mean[0]).max(0.);
        }
        let z = (best - mean[0]) / sigma1;
        return (sigma1 * (z * norm_cdf(z) + norm_pdf(z))).max(0.);
    }

    let mean_rest = mean.slice(s![1..]).to_owned();
    let cov_rest = cov.slice(s![1.., 1..]).to_owned();
    if sigma1 < DETERMINISTIC_STD {
        let b = best.min(mean[0]);
        return (best - b) + conditioned_ei(&mean_rest, &cov_rest, b, rule);
    }

    let cross: Array1<f64> = cov.slice(s![1.., 0]).to_owned();
    let mut cond_cov = &cov_rest
        - &(cross.view().insert_axis(Axis(1)).dot(&cross.view().insert_axis(Axis(0))) / var1);
    cond_cov.diag_mut().mapv_inplace(|v| v.max(0.));
    let regression = &cross * sigma1 / var1;

    // u is the standardized first value y1 = mean[0] + sigma1 u
    let improvement = |u: f64| {
        let y1 = mean[0] + sigma1 * u;
        let b = best.min(y1);
        let cond_mean = &mean_rest + &(&regression * u);
        norm_pdf(u) * ((best - b) + conditioned_ei(&cond_mean, &cond_cov, b, rule))
    };
    let kink = ((best - mean[0]) / sigma1).clamp(-QUADRATURE_HALF_WIDTH, QUADRATURE_HALF_WIDTH);
    integrate(&improvement, -QUADRATURE_HALF_WIDTH, kink, rule)
        + integrate(&improvement, kink, QUADRATURE_HALF_WIDTH, rule)
}
