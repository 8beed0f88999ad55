//! This library implements the acquisition side of Bayesian optimization on top
//! of the [bayesbox_gp] predictor: mixed-type search domains, acquisition
//! functions, vectorized optimizers maximizing them and the orchestration
//! choosing the next points to evaluate.
//!
//! * [domain]: continuous polytopes ([ContinuousDomain]) sampled by rejection
//!   and hit-and-run, a coordinate fixing decorator and mixed-type domains
//!   ([CategoricalDomain]) optimized through their one-hot representation,
//! * [acquisition]: closed form expected improvement and its noisy and
//!   failure aware variants, Monte-Carlo multipoint expected improvement and
//!   a search acquisition with repulsion,
//! * [failure]: probability of success models,
//! * [optimizers]: differential evolution and Adam over whole populations,
//! * [next_points]: constant liar, joint and search selections.
//!
//! Every random operation draws from a generator passed by the caller.
//!
//! # Example
//!
//! ```
//! use bayesbox_ego::{
//!     constant_liar_next_points, expected_improvement, AcquisitionFunction, CategoricalDomain,
//!     DomainComponent, NextPointsConfig,
//! };
//! use bayesbox_gp::{covariance::SquaredExponential, GaussianProcess, HistoricalData};
//! use ndarray::{array, Array1};
//! use ndarray_rand::rand::SeedableRng;
//! use rand_xoshiro::Xoshiro256Plus;
//!
//! let domain = CategoricalDomain::new(vec![DomainComponent::double(0., 1.)], vec![]).unwrap();
//! let x = array![[0.1], [0.4], [0.6], [0.9]];
//! let y = x.column(0).mapv(|v: f64| (6. * v).sin());
//! let data = HistoricalData::from_arrays(&x, &y, &Array1::from_elem(4, 1e-6)).unwrap();
//! let covariance = SquaredExponential::new(1., &[0.2]).unwrap();
//! let gp = GaussianProcess::new(Box::new(covariance), data, None, None).unwrap();
//!
//! let ei = expected_improvement(&gp, None).unwrap();
//! let value = ei.evaluate_at_points(array![[0.75]].view()).unwrap();
//! assert!(value[0] >= 0.);
//!
//! let mut rng = Xoshiro256Plus::seed_from_u64(42);
//! let config = NextPointsConfig::default().num_multistarts(8).maxiter(10);
//! let next = constant_liar_next_points(&gp, &domain, 2, None, &config, &mut rng).unwrap();
//! assert_eq!(next.points.nrows(), 2);
//! ```
pub mod acquisition;
pub mod domain;
mod errors;
pub mod failure;
pub mod geometry;
pub mod multitask;
pub mod next_points;
pub mod optimizers;
mod types;
mod utils;

pub use acquisition::*;
pub use domain::*;
pub use errors::*;
pub use failure::*;
pub use geometry::*;
pub use multitask::*;
pub use next_points::*;
pub use optimizers::*;
pub use types::*;
pub use utils::{norm_cdf, norm_pdf};
