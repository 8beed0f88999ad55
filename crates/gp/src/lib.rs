//! This library implements the [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process)
//! predictor at the heart of Bayesian optimization.
//!
//! A [GaussianProcess] is conditioned on a [HistoricalData] of sampled points,
//! values and noise variances. It owns an opaque [Covariance](covariance::Covariance)
//! capability and an optional [PolynomialBasis](mean_models::PolynomialBasis)
//! mean fitted by generalized least squares.
//!
//! Pending suggestions are handled with the constant liar strategy: synthetic
//! observations ("lies") are appended with [GaussianProcess::append_lies] and
//! every mutation of the history triggers a full rebuild of the factorization.
//!
//! Acquisition functions consume the posterior through the object-safe [Predictor]
//! trait which is implemented by a single process and by a [GaussianProcessSum].
//!
//! Example:
//! ```
//! use bayesbox_gp::{covariance::SquaredExponential, GaussianProcess, HistoricalData};
//! use ndarray::array;
//!
//! let data = HistoricalData::from_arrays(
//!     &array![[0.], [0.5], [1.]],
//!     &array![1., -0.2, 0.4],
//!     &array![1e-6, 1e-6, 1e-6],
//! ).unwrap();
//! let covariance = SquaredExponential::new(1., &[0.3]).unwrap();
//! let gp = GaussianProcess::new(Box::new(covariance), data, None, None).unwrap();
//! let mean = gp.compute_mean_of_points(&array![[0.25]]).unwrap();
//! let variance = gp.compute_variance_of_points(&array![[0.25]]).unwrap();
//! assert!(variance[0] > 0.);
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod covariance;
mod data;
mod errors;
pub mod linalg;
pub mod mean_models;
mod optimization;
mod predictor;
mod sum;

pub use algorithm::*;
pub use data::*;
pub use errors::*;
pub use optimization::{fit_hyperparameters, GP_OPTIM_N_START};
pub use predictor::*;
pub use sum::*;
