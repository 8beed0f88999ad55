use crate::errors::{GpError, Result};
use ndarray::{concatenate, Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix1, Ix2};
use serde::{Deserialize, Serialize};

/// Noise variance given by default to lies
pub const DEFAULT_LIE_NOISE_VARIANCE: f64 = 1e-6;

/// Value given to fabricated observations ("lies") at pending locations
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum LieStrategy {
    /// minimum of observed values
    #[default]
    Min,
    /// maximum of observed values
    Max,
    /// mean of observed values
    Mean,
    /// given constant
    Constant(f64),
}

impl LieStrategy {
    /// Lie value given the real observed values, zero when nothing is observed
    pub fn value(&self, values: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> f64 {
        if values.is_empty() {
            return match self {
                LieStrategy::Constant(v) => *v,
                _ => 0.,
            };
        }
        match self {
            LieStrategy::Min => values.fold(f64::INFINITY, |a, &b| a.min(b)),
            LieStrategy::Max => values.fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
            LieStrategy::Mean => values.sum() / values.len() as f64,
            LieStrategy::Constant(v) => *v,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Lies {
    points: Array2<f64>,
    strategy: LieStrategy,
    noise_variance: f64,
}

/// Store of sampled points, values and noise variances.
///
/// Real observations are append-only. Lie rows for pending suggestions always
/// come after the real rows and their values are recomputed from the real
/// values whenever real data changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoricalData {
    dim: usize,
    real_points: Array2<f64>,
    real_values: Array1<f64>,
    real_noise: Array1<f64>,
    lies: Vec<Lies>,
    // assembled real + lies rows
    points: Array2<f64>,
    values: Array1<f64>,
    noise: Array1<f64>,
}

impl HistoricalData {
    /// Empty history of points of dimension `dim`
    pub fn new(dim: usize) -> Self {
        HistoricalData {
            dim,
            real_points: Array2::zeros((0, dim)),
            real_values: Array1::zeros(0),
            real_noise: Array1::zeros(0),
            lies: vec![],
            points: Array2::zeros((0, dim)),
            values: Array1::zeros(0),
            noise: Array1::zeros(0),
        }
    }

    /// History initialized with the given observations
    pub fn from_arrays(
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        values: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        noise_variances: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> Result<Self> {
        let mut data = Self::new(points.ncols());
        data.append(points, values, noise_variances)?;
        Ok(data)
    }

    fn check(
        &self,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        nvalues: usize,
        nnoise: usize,
    ) -> Result<()> {
        if points.ncols() != self.dim {
            return Err(GpError::DimensionMismatch {
                expected: self.dim,
                actual: points.ncols(),
            });
        }
        if nvalues != points.nrows() || nnoise != points.nrows() {
            return Err(GpError::InvalidValueError(format!(
                "{} points given with {nvalues} values and {nnoise} noise variances",
                points.nrows()
            )));
        }
        Ok(())
    }

    /// Appends real observations, lies are rebuilt after them
    pub fn append(
        &mut self,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        values: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        noise_variances: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> Result<()> {
        self.check(points, values.len(), noise_variances.len())?;
        if noise_variances.iter().any(|v| !(*v >= 0.)) {
            return Err(GpError::InvalidValueError(
                "noise variances should be non negative".to_string(),
            ));
        }
        self.real_points = concatenate![Axis(0), self.real_points, points.view()];
        self.real_values = concatenate![Axis(0), self.real_values, values.view()];
        self.real_noise = concatenate![Axis(0), self.real_noise, noise_variances.view()];
        self.rebuild();
        Ok(())
    }

    /// Appends lies at `points` whose value follows the given strategy
    pub fn append_lies(
        &mut self,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        strategy: LieStrategy,
        noise_variance: f64,
    ) -> Result<()> {
        self.check(points, points.nrows(), points.nrows())?;
        self.lies.push(Lies {
            points: points.to_owned(),
            strategy,
            noise_variance,
        });
        self.rebuild();
        Ok(())
    }

    /// Removes every lie
    pub fn clear_lies(&mut self) {
        self.lies.clear();
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let mut points = vec![self.real_points.view()];
        let mut values = self.real_values.to_vec();
        let mut noise = self.real_noise.to_vec();
        for lie in self.lies.iter() {
            points.push(lie.points.view());
            let v = lie.strategy.value(&self.real_values);
            values.extend(std::iter::repeat(v).take(lie.points.nrows()));
            noise.extend(std::iter::repeat(lie.noise_variance).take(lie.points.nrows()));
        }
        self.points = concatenate(Axis(0), &points).unwrap_or_else(|_| self.real_points.clone());
        self.values = Array1::from_vec(values);
        self.noise = Array1::from_vec(noise);
    }

    /// Dimension of points
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows, lies included
    pub fn num_sampled(&self) -> usize {
        self.points.nrows()
    }

    /// Number of lie rows
    pub fn num_lies(&self) -> usize {
        self.lies.iter().map(|l| l.points.nrows()).sum()
    }

    /// Sampled points (n, d), lies included
    pub fn points_sampled(&self) -> &Array2<f64> {
        &self.points
    }

    /// Sampled values (n), lies included
    pub fn points_sampled_value(&self) -> &Array1<f64> {
        &self.values
    }

    /// Noise variances (n), lies included
    pub fn points_sampled_noise_variance(&self) -> &Array1<f64> {
        &self.noise
    }

    /// Real observed points only
    pub fn real_points(&self) -> ArrayView2<f64> {
        self.real_points.view()
    }

    /// Real observed values only
    pub fn real_values(&self) -> &Array1<f64> {
        &self.real_values
    }

    /// Real observed noise variances only
    pub fn real_noise_variances(&self) -> &Array1<f64> {
        &self.real_noise
    }
}
