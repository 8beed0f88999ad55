//! A module for the covariance capability of the GP model.
//!
//! Every covariance is seen by the predictor through the object-safe [Covariance]
//! trait. The following stationary kernels are implemented:
//! * squared exponential,
//! * matern 5/2,
//! * matern 3/2.
//!
//! Hyperparameters are laid out as `[alpha, length_scale_1, ..., length_scale_d]`
//! where `alpha` is the signal amplitude.

use crate::errors::{GpError, Result};
use dyn_clonable::*;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Capability used by the GP predictor to evaluate a covariance `k(x, x')`
#[clonable]
pub trait Covariance: Clone + fmt::Display + Send + Sync {
    /// Dimension of points the covariance applies to
    fn dim(&self) -> usize;

    /// Current hyperparameters
    fn hyperparameters(&self) -> Array1<f64>;

    /// Number of hyperparameters
    fn num_hyperparameters(&self) -> usize {
        self.hyperparameters().len()
    }

    /// Replace hyperparameters, fails when their number is wrong or one is not positive
    fn set_hyperparameters(&mut self, hyperparameters: &[f64]) -> Result<()>;

    /// Whether `k(x, x')` only depends on `x - x'`
    fn translation_invariant(&self) -> bool;

    /// Pointwise covariance `k(x1_i, x2_i)` of two sets of points having the same size
    fn covariance(&self, x1: ArrayView2<f64>, x2: ArrayView2<f64>) -> Array1<f64>;

    /// Kernel matrix `K_ij = k(x1_i, x2_j)` of shape (n1, n2)
    fn kernel_matrix(&self, x1: ArrayView2<f64>, x2: ArrayView2<f64>) -> Array2<f64>;

    /// Gradient of `k(x1_i, x2_j)` with respect to `x1_i`, of shape (n1, n2, d)
    fn kernel_grad_tensor(&self, x1: ArrayView2<f64>, x2: ArrayView2<f64>) -> Array3<f64>;

    /// Gradient of `k(x_i, x_j)` with respect to the hyperparameters, of shape (n, n, h)
    fn hyperparameter_grad_tensor(&self, x: ArrayView2<f64>) -> Array3<f64>;
}

impl fmt::Debug for dyn Covariance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Radial profile `g(r)` of a stationary kernel `k = alpha * g(r)` where `r` is
/// the length-scaled distance. `h(r) = g'(r) / r` is finite at `r = 0`.
pub trait RadialProfile: Clone + Copy + Default + Send + Sync + 'static {
    /// Kernel name
    const NAME: &'static str;
    /// Profile value
    fn g(r: f64) -> f64;
    /// Profile derivative divided by `r`
    fn h(r: f64) -> f64;
}

/// Squared exponential profile `exp(-r^2 / 2)`
#[derive(Clone, Copy, Debug, Default)]
pub struct SquaredExponentialProfile;

impl RadialProfile for SquaredExponentialProfile {
    const NAME: &'static str = "SquaredExponential";
    fn g(r: f64) -> f64 {
        (-0.5 * r * r).exp()
    }
    fn h(r: f64) -> f64 {
        -(-0.5 * r * r).exp()
    }
}

/// Matern 5/2 profile `(1 + sqrt(5) r + 5 r^2 / 3) exp(-sqrt(5) r)`
#[derive(Clone, Copy, Debug, Default)]
pub struct Matern52Profile;

impl RadialProfile for Matern52Profile {
    const NAME: &'static str = "Matern52";
    fn g(r: f64) -> f64 {
        let s5r = 5f64.sqrt() * r;
        (1. + s5r + s5r * s5r / 3.) * (-s5r).exp()
    }
    fn h(r: f64) -> f64 {
        let s5r = 5f64.sqrt() * r;
        -5. / 3. * (1. + s5r) * (-s5r).exp()
    }
}

/// Matern 3/2 profile `(1 + sqrt(3) r) exp(-sqrt(3) r)`
#[derive(Clone, Copy, Debug, Default)]
pub struct Matern32Profile;

impl RadialProfile for Matern32Profile {
    const NAME: &'static str = "Matern32";
    fn g(r: f64) -> f64 {
        let s3r = 3f64.sqrt() * r;
        (1. + s3r) * (-s3r).exp()
    }
    fn h(r: f64) -> f64 {
        -3. * (-3f64.sqrt() * r).exp()
    }
}

/// Stationary kernel `alpha * g(|(x - x') / l|)` with one length scale per dimension
#[derive(Clone, Debug)]
pub struct Stationary<P: RadialProfile> {
    alpha: f64,
    length_scales: Array1<f64>,
    profile: PhantomData<P>,
}

/// Squared exponential covariance
pub type SquaredExponential = Stationary<SquaredExponentialProfile>;
/// Matern 5/2 covariance
pub type Matern52 = Stationary<Matern52Profile>;
/// Matern 3/2 covariance
pub type Matern32 = Stationary<Matern32Profile>;

impl<P: RadialProfile> Stationary<P> {
    /// Constructor given the amplitude and one length scale per dimension
    pub fn new(alpha: f64, length_scales: &[f64]) -> Result<Self> {
        let mut kernel = Stationary {
            alpha: 1.,
            length_scales: Array1::ones(length_scales.len()),
            profile: PhantomData,
        };
        let mut hyperparameters = vec![alpha];
        hyperparameters.extend_from_slice(length_scales);
        kernel.set_hyperparameters(&hyperparameters)?;
        Ok(kernel)
    }

    /// Signal amplitude
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Length scales
    pub fn length_scales(&self) -> &Array1<f64> {
        &self.length_scales
    }

    fn scaled_distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        Zip::from(&a)
            .and(&b)
            .and(&self.length_scales)
            .fold(0., |acc, &u, &v, &l| {
                let d = (u - v) / l;
                acc + d * d
            })
            .sqrt()
    }
}

impl<P: RadialProfile> fmt::Display for Stationary<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}(alpha={}, length_scales={})",
            P::NAME,
            self.alpha,
            self.length_scales
        )
    }
}

impl<P: RadialProfile> Covariance for Stationary<P> {
    fn dim(&self) -> usize {
        self.length_scales.len()
    }

    fn hyperparameters(&self) -> Array1<f64> {
        let mut h = Array1::zeros(self.dim() + 1);
        h[0] = self.alpha;
        h.slice_mut(ndarray::s![1..]).assign(&self.length_scales);
        h
    }

    fn set_hyperparameters(&mut self, hyperparameters: &[f64]) -> Result<()> {
        if hyperparameters.len() < 2 {
            return Err(GpError::InvalidValueError(format!(
                "{} needs an amplitude and at least one length scale, got {} values",
                P::NAME,
                hyperparameters.len()
            )));
        }
        if let Some(v) = hyperparameters.iter().find(|v| !(v.is_finite() && **v > 0.)) {
            return Err(GpError::InvalidValueError(format!(
                "{} hyperparameters should be positive, got {v}",
                P::NAME
            )));
        }
        self.alpha = hyperparameters[0];
        self.length_scales = Array1::from_vec(hyperparameters[1..].to_vec());
        Ok(())
    }

    fn translation_invariant(&self) -> bool {
        true
    }

    fn covariance(&self, x1: ArrayView2<f64>, x2: ArrayView2<f64>) -> Array1<f64> {
        Zip::from(x1.rows())
            .and(x2.rows())
            .map_collect(|a, b| self.alpha * P::g(self.scaled_distance(a, b)))
    }

    fn kernel_matrix(&self, x1: ArrayView2<f64>, x2: ArrayView2<f64>) -> Array2<f64> {
        Array2::from_shape_fn((x1.nrows(), x2.nrows()), |(i, j)| {
            self.alpha * P::g(self.scaled_distance(x1.row(i), x2.row(j)))
        })
    }

    fn kernel_grad_tensor(&self, x1: ArrayView2<f64>, x2: ArrayView2<f64>) -> Array3<f64> {
        let d = self.dim();
        let mut grad = Array3::zeros((x1.nrows(), x2.nrows(), d));
        for (i, a) in x1.rows().into_iter().enumerate() {
            for (j, b) in x2.rows().into_iter().enumerate() {
                let h = self.alpha * P::h(self.scaled_distance(a, b));
                for k in 0..d {
                    let l = self.length_scales[k];
                    grad[[i, j, k]] = h * (a[k] - b[k]) / (l * l);
                }
            }
        }
        grad
    }

    fn hyperparameter_grad_tensor(&self, x: ArrayView2<f64>) -> Array3<f64> {
        let n = x.nrows();
        let d = self.dim();
        let mut grad = Array3::zeros((n, n, d + 1));
        for i in 0..n {
            for j in 0..n {
                let (a, b) = (x.row(i), x.row(j));
                let r = self.scaled_distance(a, b);
                grad[[i, j, 0]] = P::g(r);
                let h = self.alpha * P::h(r);
                for k in 0..d {
                    let l = self.length_scales[k];
                    let diff = a[k] - b[k];
                    grad[[i, j, k + 1]] = -h * diff * diff / (l * l * l);
                }
            }
        }
        grad
    }
}

/// Available covariance families
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovarianceKind {
    /// [SquaredExponential]
    #[default]
    SquaredExponential,
    /// [Matern52]
    Matern52,
    /// [Matern32]
    Matern32,
}

/// Hyperparameter point estimate handed over by (or to) the hyperparameter optimizer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Signal amplitude
    pub alpha: f64,
    /// One length scale per physical dimension
    pub length_scales: Vec<f64>,
    /// Length scale of the task dimension in multitask problems
    pub task_length: Option<f64>,
    /// Ridge (tikhonov) term added to the kernel matrix diagonal
    pub tikhonov: Option<f64>,
}

impl Hyperparameters {
    /// Hyperparameters with unit amplitude and the given length scales
    pub fn new(length_scales: &[f64]) -> Self {
        Hyperparameters {
            alpha: 1.,
            length_scales: length_scales.to_vec(),
            task_length: None,
            tikhonov: None,
        }
    }

    /// Sets the amplitude
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the multitask task length scale
    pub fn task_length(mut self, task_length: f64) -> Self {
        self.task_length = Some(task_length);
        self
    }

    /// Sets the ridge term
    pub fn tikhonov(mut self, tikhonov: f64) -> Self {
        self.tikhonov = Some(tikhonov);
        self
    }

    /// Covariance hyperparameter vector, the task length scale comes last
    pub fn to_vec(&self) -> Vec<f64> {
        let mut h = vec![self.alpha];
        h.extend_from_slice(&self.length_scales);
        h.extend(self.task_length);
        h
    }
}

impl CovarianceKind {
    /// Builds the covariance object, the task dimension is appended as the last one
    pub fn build(&self, hyperparameters: &Hyperparameters) -> Result<Box<dyn Covariance>> {
        let h = hyperparameters.to_vec();
        self.build_from_slice(&h)
    }

    /// Builds the covariance object given `[alpha, length_scales...]`
    pub fn build_from_slice(&self, h: &[f64]) -> Result<Box<dyn Covariance>> {
        if h.len() < 2 {
            return Err(GpError::InvalidValueError(
                "covariance needs an amplitude and at least one length scale".to_string(),
            ));
        }
        let (alpha, ls) = (h[0], &h[1..]);
        Ok(match self {
            CovarianceKind::SquaredExponential => Box::new(SquaredExponential::new(alpha, ls)?),
            CovarianceKind::Matern52 => Box::new(Matern52::new(alpha, ls)?),
            CovarianceKind::Matern32 => Box::new(Matern32::new(alpha, ls)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use finitediff::FiniteDiff;
    use ndarray::{array, Array2};
    use paste::paste;

    #[test]
    fn test_squared_exponential_value() {
        let k = SquaredExponential::new(2., &[1., 0.5]).unwrap();
        let x1 = array![[0., 0.], [1., 1.]];
        let x2 = array![[0., 0.], [1., 0.5]];
        let km = k.kernel_matrix(x1.view(), x2.view());
        assert_abs_diff_eq!(km[[0, 0]], 2.);
        // r^2 = 1 + 1 = 2
        assert_abs_diff_eq!(km[[0, 1]], 2. * (-1f64).exp(), epsilon = 1e-12);
        let pointwise = k.covariance(x1.view(), x2.view());
        assert_abs_diff_eq!(pointwise[0], km[[0, 0]]);
        assert_abs_diff_eq!(pointwise[1], km[[1, 1]]);
    }

    #[test]
    fn test_invalid_hyperparameters() {
        assert!(Matern52::new(1., &[]).is_err());
        assert!(Matern52::new(-1., &[1.]).is_err());
        assert!(Matern52::new(1., &[0.]).is_err());
        let mut k = Matern32::new(1., &[1.]).unwrap();
        assert!(k.set_hyperparameters(&[1., f64::NAN]).is_err());
    }

    #[test]
    fn test_build_with_task_length() {
        let h = Hyperparameters::new(&[0.3, 0.4]).alpha(1.5).task_length(2.);
        let k = CovarianceKind::Matern52.build(&h).unwrap();
        assert_eq!(k.dim(), 3);
        assert_abs_diff_eq!(k.hyperparameters(), array![1.5, 0.3, 0.4, 2.]);
    }

    macro_rules! test_kernel_derivatives {
        ($kernel:ident) => {
            paste! {
                #[test]
                fn [<test_ $kernel:snake _grad_tensor>]() {
                    let k = $kernel::new(1.3, &[0.7, 1.9]).unwrap();
                    let x1 = array![[0.1, -0.4], [0.35, 0.8]];
                    let x2 = array![[0.2, 0.3], [-0.5, 1.], [0.1, -0.4]];
                    let grad = k.kernel_grad_tensor(x1.view(), x2.view());
                    for i in 0..x1.nrows() {
                        for j in 0..x2.nrows() {
                            let xj = x2.row(j).to_owned();
                            let f = |x: &Vec<f64>| -> f64 {
                                let a = Array2::from_shape_vec((1, 2), x.clone()).unwrap();
                                k.kernel_matrix(a.view(), xj.view().insert_axis(ndarray::Axis(0)))[[0, 0]]
                            };
                            let fd = x1.row(i).to_vec().central_diff(&f);
                            for d in 0..2 {
                                assert_abs_diff_eq!(grad[[i, j, d]], fd[d], epsilon = 1e-6);
                            }
                        }
                    }
                }

                #[test]
                fn [<test_ $kernel:snake _hyperparameter_grad_tensor>]() {
                    let k = $kernel::new(1.3, &[0.7, 1.9]).unwrap();
                    let x = array![[0.1, -0.4], [0.35, 0.8], [0.9, 0.2]];
                    let grad = k.hyperparameter_grad_tensor(x.view());
                    let h0 = k.hyperparameters().to_vec();
                    for (i, j) in [(0, 1), (1, 2), (0, 2), (1, 1)] {
                        let f = |h: &Vec<f64>| -> f64 {
                            let mut kh = k.clone();
                            kh.set_hyperparameters(h).unwrap();
                            kh.kernel_matrix(x.view(), x.view())[[i, j]]
                        };
                        let fd = h0.central_diff(&f);
                        for p in 0..h0.len() {
                            assert_abs_diff_eq!(grad[[i, j, p]], fd[p], epsilon = 1e-6);
                        }
                    }
                }
            }
        };
    }

    test_kernel_derivatives!(SquaredExponential);
    test_kernel_derivatives!(Matern52);
    test_kernel_derivatives!(Matern32);
}
