//! Search domains: continuous polytopes, coordinate fixing decorator and
//! mixed-type domains mapped to a one-hot continuous representation.
mod builder;
mod categorical;
mod continuous;
mod fixed;

pub use builder::*;
pub use categorical::*;
pub use continuous::*;
pub use fixed::*;

use crate::errors::Result;
use ndarray::{Array2, ArrayView1, ArrayView2};
use ndarray_rand::rand::Rng;

/// Absolute tolerance used when checking bounds and half-spaces
pub const DOMAIN_TOLERANCE: f64 = 1e-9;

/// Interface of the continuous domains the vectorized optimizers work on
pub trait OptimizationDomain: Clone + Send + Sync {
    /// Number of coordinates
    fn dim(&self) -> usize;

    /// (dim, 2) box bounds
    fn xlimits(&self) -> &Array2<f64>;

    /// `n` acceptable points
    fn generate_quasi_random_points<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Array2<f64>>;

    /// Projection of every row of `x` onto the domain
    fn restrict_points(&self, x: ArrayView2<f64>) -> Array2<f64>;

    /// Whether `x` lies in the domain
    fn check_point_acceptable(&self, x: ArrayView1<f64>) -> bool;
}
