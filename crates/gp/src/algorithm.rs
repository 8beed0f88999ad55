use crate::covariance::Covariance;
use crate::data::{HistoricalData, LieStrategy};
use crate::errors::{GpError, Result};
use crate::linalg::{cholesky_solve, cholesky_with_jitter, psd_factor};
use crate::mean_models::PolynomialBasis;

use linfa_linalg::triangular::*;
use log::debug;
use ndarray::{Array, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use std::fmt;

/// Posterior variances are never lower than this value
pub const MINIMUM_VARIANCE: f64 = f64::EPSILON;

/// Derived state of a built gaussian process
#[derive(Clone, Debug)]
pub(crate) struct GpInner {
    /// Lower Cholesky factor of the regularized kernel matrix \[K\]
    pub(crate) k_chol: Array2<f64>,
    /// Generalized least-squares coefficients of the mean basis
    pub(crate) beta: Option<Array1<f64>>,
    /// De-meaned targets `y - P beta`
    pub(crate) residuals: Array1<f64>,
    /// `K^-1 (y - P beta)`
    pub(crate) gamma: Array1<f64>,
}

/// Gaussian process conditioned on a [HistoricalData].
///
/// The kernel matrix factorization and the mean fit are recomputed from scratch
/// after every mutation of the history, there is no incremental update.
#[derive(Clone, Debug)]
pub struct GaussianProcess {
    covariance: Box<dyn Covariance>,
    data: HistoricalData,
    mean_basis: Option<PolynomialBasis>,
    tikhonov: Option<f64>,
    inner: GpInner,
}

impl fmt::Display for GaussianProcess {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mean = self
            .mean_basis
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_else(|| "Zero".to_string());
        write!(
            f,
            "GP(mean={mean}, covariance={}, n={})",
            self.covariance,
            self.data.num_sampled()
        )
    }
}

impl GaussianProcess {
    /// Builds a gaussian process given its covariance and history.
    ///
    /// * `mean_basis`: polynomial basis of the mean, zero mean when `None`
    /// * `tikhonov`: ridge term added to the diagonal in place of noise variances
    pub fn new(
        covariance: Box<dyn Covariance>,
        data: HistoricalData,
        mean_basis: Option<PolynomialBasis>,
        tikhonov: Option<f64>,
    ) -> Result<Self> {
        if covariance.dim() != data.dim() {
            return Err(GpError::DimensionMismatch {
                expected: covariance.dim(),
                actual: data.dim(),
            });
        }
        if let Some(basis) = &mean_basis {
            if basis.dim() != data.dim() {
                return Err(GpError::DimensionMismatch {
                    expected: data.dim(),
                    actual: basis.dim(),
                });
            }
        }
        if let Some(t) = tikhonov {
            if !(t >= 0.) {
                return Err(GpError::InvalidValueError(format!(
                    "tikhonov term should be non negative, got {t}"
                )));
            }
        }
        let inner = Self::build(covariance.as_ref(), &data, mean_basis.as_ref(), tikhonov)?;
        Ok(GaussianProcess {
            covariance,
            data,
            mean_basis,
            tikhonov,
            inner,
        })
    }

    fn build(
        covariance: &dyn Covariance,
        data: &HistoricalData,
        mean_basis: Option<&PolynomialBasis>,
        tikhonov: Option<f64>,
    ) -> Result<GpInner> {
        let n = data.num_sampled();
        if n == 0 {
            return Ok(GpInner {
                k_chol: Array2::zeros((0, 0)),
                beta: mean_basis.map(|b| Array1::zeros(b.size())),
                residuals: Array1::zeros(0),
                gamma: Array1::zeros(0),
            });
        }
        let x = data.points_sampled();
        let y = data.points_sampled_value();
        let mut k = covariance.kernel_matrix(x.view(), x.view());
        match tikhonov {
            Some(ridge) => k.diag_mut().mapv_inplace(|v| v + ridge),
            None => k
                .diag_mut()
                .iter_mut()
                .zip(data.points_sampled_noise_variance().iter())
                .for_each(|(v, noise)| *v += noise),
        }
        let k_chol = cholesky_with_jitter(&k)?;

        let (beta, residuals) = match mean_basis {
            Some(basis) => {
                // beta = (P^t K^-1 P)^-1 P^t K^-1 y reusing the factor of K
                let p = basis.value(x);
                let a = k_chol.solve_triangular(&p, UPLO::Lower)?;
                let ly = k_chol.solve_triangular(&y.view().insert_axis(Axis(1)), UPLO::Lower)?;
                let pkp_chol = cholesky_with_jitter(&a.t().dot(&a))?;
                let beta = cholesky_solve(&pkp_chol, &a.t().dot(&ly))?.remove_axis(Axis(1));
                let residuals = y - &p.dot(&beta);
                (Some(beta), residuals)
            }
            None => (None, y.to_owned()),
        };
        let gamma = cholesky_solve(&k_chol, &residuals.view().insert_axis(Axis(1)))?
            .remove_axis(Axis(1));
        debug!("GP built on {n} points, beta = {beta:?}");
        Ok(GpInner {
            k_chol,
            beta,
            residuals,
            gamma,
        })
    }

    fn rebuild(&mut self) -> Result<()> {
        self.inner = Self::build(
            self.covariance.as_ref(),
            &self.data,
            self.mean_basis.as_ref(),
            self.tikhonov,
        )?;
        Ok(())
    }

    fn check_dim(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<()> {
        if x.ncols() != self.dim() {
            return Err(GpError::DimensionMismatch {
                expected: self.dim(),
                actual: x.ncols(),
            });
        }
        Ok(())
    }

    fn check_gradient_support(&self) -> Result<()> {
        if !self.covariance.translation_invariant() {
            return Err(GpError::NotTranslationInvariant(
                self.covariance.to_string(),
            ));
        }
        Ok(())
    }

    /// Dimension of points
    pub fn dim(&self) -> usize {
        self.data.dim()
    }

    /// Number of sampled points, lies included
    pub fn num_sampled(&self) -> usize {
        self.data.num_sampled()
    }

    /// History the process is conditioned on
    pub fn historical_data(&self) -> &HistoricalData {
        &self.data
    }

    /// Covariance of the prior
    pub fn covariance(&self) -> &dyn Covariance {
        self.covariance.as_ref()
    }

    /// Mean basis coefficients, if a basis is configured
    pub fn beta(&self) -> Option<&Array1<f64>> {
        self.inner.beta.as_ref()
    }

    /// Smallest real observed value, lies excluded, `+inf` without data
    pub fn best_observed_value(&self) -> f64 {
        self.data
            .real_values()
            .fold(f64::INFINITY, |a, &b| a.min(b))
    }

    fn prior_mean(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array1<f64> {
        match (&self.mean_basis, &self.inner.beta) {
            (Some(basis), Some(beta)) => basis.predict(x, beta),
            _ => Array1::zeros(x.nrows()),
        }
    }

    /// Cross kernel `k(x, X_sampled)` of shape (m, n)
    fn cross_kernel(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        self.covariance
            .kernel_matrix(x.view(), self.data.points_sampled().view())
    }

    /// Posterior mean at `x` points (m, d)
    pub fn compute_mean_of_points(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Array1<f64>> {
        self.check_dim(x)?;
        let mut mean = self.prior_mean(x);
        if self.num_sampled() > 0 {
            mean += &self.cross_kernel(x).dot(&self.inner.gamma);
        }
        Ok(mean)
    }

    /// Raw posterior variance `k(x, x) - k(x)^t K^-1 k(x)`, may be lower than the floor
    fn raw_variance(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array1<f64>> {
        let prior = self.covariance.covariance(x.view(), x.view());
        if self.num_sampled() == 0 {
            return Ok(prior);
        }
        let kx = self.cross_kernel(x);
        // (n, m) columns are L^-1 k(x_i)
        let v = self.inner.k_chol.solve_triangular(&kx.t(), UPLO::Lower)?;
        Ok(prior - v.mapv(|e| e * e).sum_axis(Axis(0)))
    }

    /// Posterior variance at `x` points (m, d), floored at [MINIMUM_VARIANCE]
    pub fn compute_variance_of_points(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Array1<f64>> {
        self.check_dim(x)?;
        Ok(self.raw_variance(x)?.mapv(|v| v.max(MINIMUM_VARIANCE)))
    }

    /// Gradient of the posterior mean at `x` points, shape (m, d)
    pub fn compute_grad_mean_of_points(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Array2<f64>> {
        self.check_dim(x)?;
        self.check_gradient_support()?;
        let mut grad = Array2::zeros((x.nrows(), self.dim()));
        if self.num_sampled() > 0 {
            let dk = self
                .covariance
                .kernel_grad_tensor(x.view(), self.data.points_sampled().view());
            for (i, mut row) in grad.rows_mut().into_iter().enumerate() {
                row.assign(&dk.index_axis(Axis(0), i).t().dot(&self.inner.gamma));
            }
        }
        if let (Some(basis), Some(beta)) = (&self.mean_basis, &self.inner.beta) {
            for (i, mut row) in grad.rows_mut().into_iter().enumerate() {
                row += &basis.jacobian(&x.row(i)).t().dot(beta);
            }
        }
        Ok(grad)
    }

    /// Gradient of the posterior variance at `x` points, shape (m, d).
    /// The gradient is zero where the variance is floored.
    pub fn compute_grad_variance_of_points(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Array2<f64>> {
        self.check_dim(x)?;
        self.check_gradient_support()?;
        let mut grad = Array2::zeros((x.nrows(), self.dim()));
        if self.num_sampled() == 0 {
            return Ok(grad);
        }
        let raw = self.raw_variance(x)?;
        let kx = self.cross_kernel(x);
        // (n, m) columns are the cardinal functions K^-1 k(x_i)
        let w = cholesky_solve(&self.inner.k_chol, &kx.t())?;
        let dk = self
            .covariance
            .kernel_grad_tensor(x.view(), self.data.points_sampled().view());
        for (i, mut row) in grad.rows_mut().into_iter().enumerate() {
            if raw[i] > MINIMUM_VARIANCE {
                row.assign(&(dk.index_axis(Axis(0), i).t().dot(&w.column(i)) * -2.));
            }
        }
        Ok(grad)
    }

    /// Posterior covariance matrix between `x` points, shape (m, m)
    pub fn compute_covariance_of_points(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Array2<f64>> {
        self.check_dim(x)?;
        let mut cov = self.covariance.kernel_matrix(x.view(), x.view());
        if self.num_sampled() > 0 {
            let kx = self.cross_kernel(x);
            let v = self.inner.k_chol.solve_triangular(&kx.t(), UPLO::Lower)?;
            cov -= &v.t().dot(&v);
        }
        cov.diag_mut().mapv_inplace(|v| v.max(MINIMUM_VARIANCE));
        Ok(cov)
    }

    /// Draws `n_samples` joint posterior samples at `x` points, returns (n_samples, m)
    pub fn draw_posterior_samples<R: Rng + ?Sized>(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        n_samples: usize,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        let mean = self.compute_mean_of_points(x)?;
        let cov = self.compute_covariance_of_points(x)?;
        let c = psd_factor(&cov)?;
        let z: Array2<f64> = Array::random_using((x.nrows(), n_samples), StandardNormal, rng);
        Ok(c.dot(&z).reversed_axes() + &mean)
    }

    /// Appends real observations then rebuilds
    pub fn add_sampled_points(
        &mut self,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        values: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        noise_variances: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> Result<()> {
        self.data.append(points, values, noise_variances)?;
        self.rebuild()
    }

    /// Appends lies at pending `points` then rebuilds
    pub fn append_lies(
        &mut self,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        strategy: LieStrategy,
        noise_variance: f64,
    ) -> Result<()> {
        self.data.append_lies(points, strategy, noise_variance)?;
        self.rebuild()
    }

    /// Removes lies then rebuilds
    pub fn clear_lies(&mut self) -> Result<()> {
        self.data.clear_lies();
        self.rebuild()
    }

    /// Replaces covariance hyperparameters then rebuilds
    pub fn set_hyperparameters(&mut self, hyperparameters: &[f64]) -> Result<()> {
        self.covariance.set_hyperparameters(hyperparameters)?;
        self.rebuild()
    }

    /// Log marginal likelihood of the sampled values given the current hyperparameters
    pub fn log_marginal_likelihood(&self) -> f64 {
        let n = self.num_sampled();
        if n == 0 {
            return 0.;
        }
        let fit = -0.5 * self.inner.residuals.dot(&self.inner.gamma);
        let log_det = self.inner.k_chol.diag().mapv(f64::ln).sum();
        fit - log_det - 0.5 * n as f64 * (2. * std::f64::consts::PI).ln()
    }

    /// Gradient of the log marginal likelihood with respect to covariance hyperparameters
    pub fn grad_log_marginal_likelihood(&self) -> Result<Array1<f64>> {
        let n = self.num_sampled();
        let h = self.covariance.num_hyperparameters();
        if n == 0 {
            return Ok(Array1::zeros(h));
        }
        let k_inv = cholesky_solve(&self.inner.k_chol, &Array2::eye(n))?;
        let gamma = &self.inner.gamma;
        let dk = self
            .covariance
            .hyperparameter_grad_tensor(self.data.points_sampled().view());
        // 1/2 tr((gamma gamma^t - K^-1) dK/dh)
        let outer = &gamma.view().insert_axis(Axis(1)) * &gamma.view().insert_axis(Axis(0));
        let w = outer - k_inv;
        Ok(Array1::from_shape_fn(h, |p| {
            0.5 * (&w * &dk.index_axis(Axis(2), p)).sum()
        }))
    }
}
