use crate::algorithm::{GaussianProcess, MINIMUM_VARIANCE};
use crate::data::{HistoricalData, LieStrategy};
use crate::errors::{GpError, Result};
use crate::linalg::psd_factor;
use crate::predictor::Predictor;

use ndarray::{Array, Array1, Array2, ArrayView2};
use ndarray_stats::QuantileExt;
use ndarray_rand::rand::RngCore;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;

/// Weighted sum `sum_i w_i f_i` of independent gaussian processes sharing the same sample locations.
///
/// Members are owned snapshots cloned at construction. Appending lies goes
/// through the sum so every member history keeps the same locations.
#[derive(Clone, Debug)]
pub struct GaussianProcessSum {
    members: Vec<GaussianProcess>,
    weights: Array1<f64>,
}

impl GaussianProcessSum {
    /// Constructor, fails when members are empty, weights count differs from
    /// members count or members are not sampled at identical locations.
    pub fn new(members: &[GaussianProcess], weights: &[f64]) -> Result<Self> {
        if members.is_empty() {
            return Err(GpError::InvalidValueError(
                "a sum of gaussian processes needs at least one member".to_string(),
            ));
        }
        if members.len() != weights.len() {
            return Err(GpError::InvalidValueError(format!(
                "{} members given with {} weights",
                members.len(),
                weights.len()
            )));
        }
        let reference = members[0].historical_data().points_sampled();
        for gp in members.iter().skip(1) {
            if gp.historical_data().points_sampled() != reference {
                return Err(GpError::InvalidValueError(
                    "members of a sum of gaussian processes should share sample locations"
                        .to_string(),
                ));
            }
        }
        Ok(GaussianProcessSum {
            members: members.to_vec(),
            weights: Array1::from_vec(weights.to_vec()),
        })
    }

    /// Member processes
    pub fn members(&self) -> &[GaussianProcess] {
        &self.members
    }

    /// Member weights
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    fn combine<T, F>(&self, mut f: F, squared: bool) -> Result<T>
    where
        T: std::ops::Add<Output = T> + std::ops::Mul<f64, Output = T>,
        F: FnMut(&GaussianProcess) -> Result<T>,
    {
        let weight = |w: f64| if squared { w * w } else { w };
        let mut acc = f(&self.members[0])? * weight(self.weights[0]);
        for (gp, &w) in self.members.iter().zip(self.weights.iter()).skip(1) {
            acc = acc + f(gp)? * weight(w);
        }
        Ok(acc)
    }

    /// Weighted sum of a per member history array, `squared` weights combine variances
    fn combine_data<F>(&self, values: F, squared: bool) -> Result<Array1<f64>>
    where
        F: Fn(&HistoricalData) -> &Array1<f64>,
    {
        let n = values(self.members[0].historical_data()).len();
        let mut acc = Array1::zeros(n);
        for (gp, &w) in self.members.iter().zip(self.weights.iter()) {
            let v = values(gp.historical_data());
            if v.len() != n {
                return Err(GpError::InvalidValueError(format!(
                    "member history holds {} values, expected {n}",
                    v.len()
                )));
            }
            acc.scaled_add(if squared { w * w } else { w }, v);
        }
        Ok(acc)
    }

    /// Constant lie of each member such that the weighted sum of member lies
    /// is the lie of the combined real values
    fn member_lies(&self, strategy: LieStrategy) -> Result<Vec<f64>> {
        let combined = self.combine_data(HistoricalData::real_values, false)?;
        let at_row = |k: usize| {
            self.members
                .iter()
                .map(|gp| gp.historical_data().real_values()[k])
                .collect::<Vec<_>>()
        };
        let lies = match strategy {
            LieStrategy::Constant(c) => {
                let norm = self.weights.dot(&self.weights);
                self.weights
                    .iter()
                    .map(|w| if norm > 0. { c * w / norm } else { 0. })
                    .collect()
            }
            _ if combined.is_empty() => vec![0.; self.members.len()],
            LieStrategy::Min => at_row(combined.argmin_skipnan().map_err(|e| {
                GpError::InvalidValueError(format!("no minimum of combined values: {e}"))
            })?),
            LieStrategy::Max => at_row(combined.argmax_skipnan().map_err(|e| {
                GpError::InvalidValueError(format!("no maximum of combined values: {e}"))
            })?),
            LieStrategy::Mean => self
                .members
                .iter()
                .map(|gp| LieStrategy::Mean.value(gp.historical_data().real_values()))
                .collect(),
        };
        Ok(lies)
    }
}

impl Predictor for GaussianProcessSum {
    fn dim(&self) -> usize {
        self.members[0].dim()
    }

    fn num_sampled(&self) -> usize {
        self.members[0].num_sampled()
    }

    fn points_sampled(&self) -> Array2<f64> {
        self.members[0].historical_data().points_sampled().to_owned()
    }

    fn points_sampled_value(&self) -> Result<Array1<f64>> {
        self.combine_data(HistoricalData::points_sampled_value, false)
    }

    fn points_sampled_noise_variance(&self) -> Result<Array1<f64>> {
        self.combine_data(HistoricalData::points_sampled_noise_variance, true)
    }

    fn num_lies(&self) -> usize {
        self.members[0].historical_data().num_lies()
    }

    fn real_values(&self) -> Result<Array1<f64>> {
        self.combine_data(HistoricalData::real_values, false)
    }

    fn translation_invariant(&self) -> bool {
        self.members
            .iter()
            .all(|gp| gp.covariance().translation_invariant())
    }

    fn compute_mean_of_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.combine(|gp| gp.compute_mean_of_points(&x), false)
    }

    fn compute_variance_of_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .combine(|gp| gp.compute_variance_of_points(&x), true)?
            .mapv(|v| v.max(MINIMUM_VARIANCE)))
    }

    fn compute_grad_mean_of_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.combine(|gp| gp.compute_grad_mean_of_points(&x), false)
    }

    fn compute_grad_variance_of_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.combine(|gp| gp.compute_grad_variance_of_points(&x), true)
    }

    fn compute_covariance_of_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.combine(|gp| gp.compute_covariance_of_points(&x), true)
    }

    fn draw_posterior_samples(
        &self,
        x: ArrayView2<f64>,
        n_samples: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<f64>> {
        let mean = self.compute_mean_of_points(x)?;
        let c = psd_factor(&self.compute_covariance_of_points(x)?)?;
        let z: Array2<f64> = Array::random_using((x.nrows(), n_samples), StandardNormal, rng);
        Ok(c.dot(&z).reversed_axes() + &mean)
    }

    fn append_lies(
        &mut self,
        points: ArrayView2<f64>,
        strategy: LieStrategy,
        noise_variance: f64,
    ) -> Result<()> {
        let lies = self.member_lies(strategy)?;
        for (gp, lie) in self.members.iter_mut().zip(lies) {
            gp.append_lies(&points, LieStrategy::Constant(lie), noise_variance)?;
        }
        Ok(())
    }

    fn clear_lies(&mut self) -> Result<()> {
        for gp in self.members.iter_mut() {
            gp.clear_lies()?;
        }
        Ok(())
    }
}
