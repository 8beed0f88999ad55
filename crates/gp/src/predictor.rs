use crate::algorithm::GaussianProcess;
use crate::data::LieStrategy;
use crate::errors::Result;

use dyn_clonable::*;
use ndarray::{s, Array1, Array2, ArrayView2};
use ndarray_rand::rand::RngCore;

/// Posterior interface consumed by acquisition functions and failure models.
///
/// Implemented by a single [GaussianProcess] and by a
/// [GaussianProcessSum](crate::GaussianProcessSum) of independent processes.
#[clonable]
pub trait Predictor: Clone + Send + Sync {
    /// Dimension of points
    fn dim(&self) -> usize;

    /// Number of sampled points, lies included
    fn num_sampled(&self) -> usize;

    /// Sampled points (n, d)
    fn points_sampled(&self) -> Array2<f64>;

    /// Sampled values (n), lies included
    fn points_sampled_value(&self) -> Result<Array1<f64>>;

    /// Noise variances of sampled values (n), lies included
    fn points_sampled_noise_variance(&self) -> Result<Array1<f64>>;

    /// Number of lie rows, stored after the real rows
    fn num_lies(&self) -> usize;

    /// Values of real observations, lies excluded
    fn real_values(&self) -> Result<Array1<f64>> {
        let values = self.points_sampled_value()?;
        let n_real = values.len().saturating_sub(self.num_lies());
        Ok(values.slice(s![..n_real]).to_owned())
    }

    /// Smallest real observed value, `+inf` without observations
    fn best_observed_value(&self) -> Result<f64> {
        Ok(self.real_values()?.fold(f64::INFINITY, |a, &b| a.min(b)))
    }

    /// Whether gradient computations are supported
    fn translation_invariant(&self) -> bool;

    /// Posterior mean (m)
    fn compute_mean_of_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Posterior variance (m)
    fn compute_variance_of_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Posterior mean gradient (m, d)
    fn compute_grad_mean_of_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Posterior variance gradient (m, d)
    fn compute_grad_variance_of_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Posterior covariance (m, m)
    fn compute_covariance_of_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Joint posterior samples (n_samples, m)
    fn draw_posterior_samples(
        &self,
        x: ArrayView2<f64>,
        n_samples: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<f64>>;

    /// Appends lies at pending points
    fn append_lies(
        &mut self,
        points: ArrayView2<f64>,
        strategy: LieStrategy,
        noise_variance: f64,
    ) -> Result<()>;

    /// Removes every lie
    fn clear_lies(&mut self) -> Result<()>;
}

impl std::fmt::Debug for dyn Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predictor(dim={}, n={})", self.dim(), self.num_sampled())
    }
}

impl Predictor for GaussianProcess {
    fn dim(&self) -> usize {
        GaussianProcess::dim(self)
    }

    fn num_sampled(&self) -> usize {
        GaussianProcess::num_sampled(self)
    }

    fn points_sampled(&self) -> Array2<f64> {
        self.historical_data().points_sampled().to_owned()
    }

    fn points_sampled_value(&self) -> Result<Array1<f64>> {
        Ok(self.historical_data().points_sampled_value().to_owned())
    }

    fn points_sampled_noise_variance(&self) -> Result<Array1<f64>> {
        Ok(self
            .historical_data()
            .points_sampled_noise_variance()
            .to_owned())
    }

    fn num_lies(&self) -> usize {
        self.historical_data().num_lies()
    }

    fn real_values(&self) -> Result<Array1<f64>> {
        Ok(self.historical_data().real_values().to_owned())
    }

    fn best_observed_value(&self) -> Result<f64> {
        Ok(GaussianProcess::best_observed_value(self))
    }

    fn translation_invariant(&self) -> bool {
        self.covariance().translation_invariant()
    }

    fn compute_mean_of_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        GaussianProcess::compute_mean_of_points(self, &x)
    }

    fn compute_variance_of_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        GaussianProcess::compute_variance_of_points(self, &x)
    }

    fn compute_grad_mean_of_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        GaussianProcess::compute_grad_mean_of_points(self, &x)
    }

    fn compute_grad_variance_of_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        GaussianProcess::compute_grad_variance_of_points(self, &x)
    }

    fn compute_covariance_of_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        GaussianProcess::compute_covariance_of_points(self, &x)
    }

    fn draw_posterior_samples(
        &self,
        x: ArrayView2<f64>,
        n_samples: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<f64>> {
        GaussianProcess::draw_posterior_samples(self, &x, n_samples, rng)
    }

    fn append_lies(
        &mut self,
        points: ArrayView2<f64>,
        strategy: LieStrategy,
        noise_variance: f64,
    ) -> Result<()> {
        GaussianProcess::append_lies(self, &points, strategy, noise_variance)
    }

    fn clear_lies(&mut self) -> Result<()> {
        GaussianProcess::clear_lies(self)
    }
}
