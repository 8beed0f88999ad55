//! Vectorized optimizers maximizing acquisition functions over a domain.
//!
//! Populations of multistarts advance in lock-step: every iteration evaluates
//! the whole population as one batch, every iterate is projected into the
//! domain and a running best over every evaluated batch is tracked.
mod adam;
mod de;

pub use adam::*;
pub use de::*;

use crate::domain::OptimizationDomain;
use crate::errors::{EgoError, Result};

use ndarray::{s, Array1, Array2, ArrayView1};
use ndarray_rand::rand::RngCore;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

/// Default number of multistarts
pub const DEFAULT_NUM_MULTISTARTS: usize = 20;
/// Default number of iterations
pub const DEFAULT_MAXITER: usize = 50;

/// Optimizer parameterization
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Population size
    pub(crate) num_multistarts: usize,
    /// Number of iterations
    pub(crate) maxiter: usize,
    /// Starting points, topped up with quasi-random points of the domain
    pub(crate) initial_points: Option<Array2<f64>>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            num_multistarts: DEFAULT_NUM_MULTISTARTS,
            maxiter: DEFAULT_MAXITER,
            initial_points: None,
        }
    }
}

impl OptimizerConfig {
    pub fn num_multistarts(mut self, num_multistarts: usize) -> Self {
        self.num_multistarts = num_multistarts;
        self
    }

    pub fn maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    pub fn initial_points(mut self, initial_points: &Array2<f64>) -> Self {
        self.initial_points = Some(initial_points.to_owned());
        self
    }

    pub fn get_num_multistarts(&self) -> usize {
        self.num_multistarts
    }

    pub fn get_maxiter(&self) -> usize {
        self.maxiter
    }
}

/// Outcome of an optimization
#[derive(Clone, Debug)]
pub struct OptimizationResult {
    /// Best point over every evaluated batch
    pub best_point: Array1<f64>,
    /// Acquisition value at `best_point`
    pub best_value: f64,
    /// Population at start
    pub starting_points: Array2<f64>,
    /// Population at the end
    pub ending_points: Array2<f64>,
    /// Acquisition values of `ending_points`
    pub function_values: Array1<f64>,
    /// Best value after the starting evaluation then after each iteration
    pub best_value_history: Vec<f64>,
}

/// A population based optimizer maximizing an acquisition function
pub trait VectorizedOptimizer {
    /// Runs the optimization
    fn optimize(&self, rng: &mut dyn RngCore) -> Result<OptimizationResult>;
}

/// Rows of the running best
pub(crate) struct BestTracker {
    point: Array1<f64>,
    value: f64,
    history: Vec<f64>,
}

impl BestTracker {
    pub(crate) fn new(points: &Array2<f64>, values: &Array1<f64>) -> Result<Self> {
        let (point, value) = argmax_row(points, values)?;
        Ok(BestTracker {
            point: point.to_owned(),
            value,
            history: vec![value],
        })
    }

    /// Considers a newly evaluated batch then records the running best
    pub(crate) fn update(&mut self, points: &Array2<f64>, values: &Array1<f64>) -> Result<()> {
        let (point, value) = argmax_row(points, values)?;
        if value > self.value {
            self.value = value;
            self.point = point.to_owned();
        }
        self.history.push(self.value);
        Ok(())
    }

    pub(crate) fn finish(
        self,
        starting_points: Array2<f64>,
        ending_points: Array2<f64>,
        function_values: Array1<f64>,
    ) -> OptimizationResult {
        OptimizationResult {
            best_point: self.point,
            best_value: self.value,
            starting_points,
            ending_points,
            function_values,
            best_value_history: self.history,
        }
    }
}

fn argmax_row<'a>(points: &'a Array2<f64>, values: &Array1<f64>) -> Result<(ArrayView1<'a, f64>, f64)> {
    let i = values
        .argmax_skipnan()
        .map_err(|e| EgoError::InvalidValue(format!("no best value among evaluations: {e}")))?;
    Ok((points.row(i), values[i]))
}

/// `n` starting points: given initial points projected into the domain first,
/// then quasi-random points of the domain
pub(crate) fn starting_points<D: OptimizationDomain>(
    domain: &D,
    config: &OptimizerConfig,
    n: usize,
    mut rng: &mut dyn RngCore,
) -> Result<Array2<f64>> {
    let given = match &config.initial_points {
        Some(points) if points.nrows() > 0 => {
            if points.ncols() != domain.dim() {
                return Err(EgoError::DimensionMismatch {
                    expected: domain.dim(),
                    actual: points.ncols(),
                });
            }
            domain.restrict_points(points.slice(s![..points.nrows().min(n), ..]))
        }
        _ => Array2::zeros((0, domain.dim())),
    };
    if given.nrows() == n {
        return Ok(given);
    }
    let extra = domain.generate_quasi_random_points(n - given.nrows(), &mut rng)?;
    let mut points = Array2::zeros((n, domain.dim()));
    points.slice_mut(s![..given.nrows(), ..]).assign(&given);
    points.slice_mut(s![given.nrows().., ..]).assign(&extra);
    Ok(points)
}

const MAXITER_DIM_BOUNDS: [usize; 4] = [2, 5, 10, 20];
const MAXITER_SAMPLED_BOUNDS: [usize; 3] = [10, 50, 200];
const MAXITER_TABLE: [[usize; 4]; 5] = [
    [50, 40, 30, 20],
    [100, 80, 60, 40],
    [150, 120, 90, 60],
    [200, 160, 120, 80],
    [250, 200, 150, 100],
];

/// Iteration budget for a domain dimension and a number of sampled points.
///
/// Larger domains get more iterations, larger histories fewer as each
/// evaluation costs more.
pub fn maxiter_for(dim: usize, num_sampled: usize) -> usize {
    let row = MAXITER_DIM_BOUNDS
        .iter()
        .position(|&b| dim <= b)
        .unwrap_or(MAXITER_DIM_BOUNDS.len());
    let col = MAXITER_SAMPLED_BOUNDS
        .iter()
        .position(|&b| num_sampled <= b)
        .unwrap_or(MAXITER_SAMPLED_BOUNDS.len());
    MAXITER_TABLE[row][col]
}
