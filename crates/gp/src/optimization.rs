use crate::algorithm::GaussianProcess;
use crate::covariance::{CovarianceKind, Hyperparameters};
use crate::data::HistoricalData;
use crate::errors::{GpError, Result};
use crate::mean_models::PolynomialBasis;

use bayesbox_doe::{Lhs, LhsKind, SamplingMethod};
use log::{debug, warn};
use ndarray::{arr1, s, Array1, Array2, Zip};
use ndarray_rand::rand::Rng;
use std::time::Instant;

/// Default number of multistart for hyperparameters optimization
pub const GP_OPTIM_N_START: usize = 10;
/// Minimum of function evaluations for COBYLA optimizer
pub const GP_COBYLA_MIN_EVAL: usize = 25;
/// Maximum of function evaluations for COBYLA optimizer
pub const GP_COBYLA_MAX_EVAL: usize = 1000;

pub(crate) struct CobylaParams {
    pub rhobeg: f64,
    pub ftol_rel: f64,
    pub maxeval: usize,
}

impl Default for CobylaParams {
    fn default() -> Self {
        CobylaParams {
            rhobeg: 0.5,
            ftol_rel: 1e-4,
            maxeval: 200,
        }
    }
}

/// Multistart seeds on log10 scale: the center of the bounds followed by
/// `n_start` maximin LHS points
pub(crate) fn prepare_multistart<R: Rng>(
    n_start: usize,
    bounds: &[(f64, f64)],
    rng: &mut R,
) -> (Array2<f64>, Vec<(f64, f64)>) {
    let bounds: Vec<(f64, f64)> = bounds
        .iter()
        .map(|(lo, up)| (lo.log10(), up.log10()))
        .collect();

    let mut theta0s = Array2::zeros((n_start + 1, bounds.len()));
    theta0s
        .row_mut(0)
        .assign(&bounds.iter().map(|(a, b)| 0.5 * (a + b)).collect::<Array1<_>>());

    if n_start > 0 {
        let mut xlimits: Array2<f64> = Array2::zeros((bounds.len(), 2));
        Zip::from(xlimits.rows_mut())
            .and(&bounds)
            .for_each(|mut row, limits| row.assign(&arr1(&[limits.0, limits.1])));
        let seeds = Lhs::new(&xlimits)
            .kind(LhsKind::Maximin)
            .sample(n_start, rng);
        theta0s.slice_mut(s![1.., ..]).assign(&seeds);
    }
    (theta0s, bounds)
}

/// Optimize hyperparameters given an initial guess and bounds with cobyla,
/// returns the reached objective value and parameters
pub(crate) fn optimize_params<ObjF>(
    objfn: ObjF,
    param0: &Array1<f64>,
    bounds: &[(f64, f64)],
    cobyla: CobylaParams,
) -> (f64, Array1<f64>)
where
    ObjF: Fn(&[f64]) -> f64,
{
    use cobyla::{minimize, Func, RhoBeg, StopTols};

    let cons: Vec<&dyn Func<()>> = vec![];
    let param0 = param0.to_vec();

    match minimize(
        |x: &[f64], _u: &mut ()| objfn(x),
        &param0,
        bounds,
        &cons,
        (),
        cobyla.maxeval,
        RhoBeg::All(cobyla.rhobeg),
        Some(StopTols {
            ftol_rel: cobyla.ftol_rel,
            ..StopTols::default()
        }),
    ) {
        Ok((_, x_opt, fval)) => {
            let fval = if f64::is_nan(fval) {
                f64::INFINITY
            } else {
                fval
            };
            (fval, arr1(&x_opt))
        }
        Err((status, x_opt, _)) => {
            warn!("ERROR Cobyla optimizer in GP status={status:?}");
            (f64::INFINITY, arr1(&x_opt))
        }
    }
}

/// Maximum likelihood estimation of covariance hyperparameters.
///
/// * `bounds`: `(lower, upper)` positive bounds of `[alpha, length_scale_1, ...]`,
///   the optimization runs on their log10
/// * `n_start`: number of LHS seeds added to the center of the bounds
///
/// Every start runs COBYLA against the negative log marginal likelihood, the
/// best reached point is returned as the hyperparameter point estimate.
pub fn fit_hyperparameters<R: Rng>(
    kind: CovarianceKind,
    data: &HistoricalData,
    mean_basis: Option<&PolynomialBasis>,
    tikhonov: Option<f64>,
    bounds: &[(f64, f64)],
    n_start: usize,
    rng: &mut R,
) -> Result<Hyperparameters> {
    if bounds.len() != data.dim() + 1 {
        return Err(GpError::DimensionMismatch {
            expected: data.dim() + 1,
            actual: bounds.len(),
        });
    }
    if let Some((lo, up)) = bounds.iter().find(|(lo, up)| !(*lo > 0. && lo <= up)) {
        return Err(GpError::InvalidValueError(format!(
            "hyperparameter bounds should be positive and ordered, got ({lo}, {up})"
        )));
    }
    if data.num_sampled() == 0 {
        return Err(GpError::LikelihoodComputationError(
            "no sampled data to estimate hyperparameters".to_string(),
        ));
    }

    let base: f64 = 10.;
    let objfn = |x: &[f64]| -> f64 {
        let h: Vec<f64> = x.iter().map(|v| base.powf(*v)).collect();
        let lml = kind.build_from_slice(&h).and_then(|cov| {
            GaussianProcess::new(cov, data.clone(), mean_basis.cloned(), tikhonov)
                .map(|gp| gp.log_marginal_likelihood())
        });
        match lml {
            Ok(v) if v.is_finite() => -v,
            _ => f64::INFINITY,
        }
    };

    let (theta_inits, log_bounds) = prepare_multistart(n_start, bounds, rng);
    debug!("Optimize with multistart theta = {theta_inits:?} and bounds = {log_bounds:?}");
    let now = Instant::now();
    let maxeval = (10 * theta_inits.ncols()).clamp(GP_COBYLA_MIN_EVAL, GP_COBYLA_MAX_EVAL);
    let (best_value, best_params) = theta_inits
        .rows()
        .into_iter()
        .map(|theta0| {
            optimize_params(
                &objfn,
                &theta0.to_owned(),
                &log_bounds,
                CobylaParams {
                    maxeval,
                    ..CobylaParams::default()
                },
            )
        })
        .fold(
            (f64::INFINITY, theta_inits.row(0).to_owned()),
            |a, b| if b.0 < a.0 { b } else { a },
        );
    debug!(
        "elapsed optim = {:?}ms, -lml = {best_value}",
        now.elapsed().as_millis()
    );
    if !best_value.is_finite() {
        return Err(GpError::LikelihoodComputationError(
            "likelihood could not be evaluated at any start point".to_string(),
        ));
    }
    let h = best_params.mapv(|v| base.powf(v));
    Ok(Hyperparameters {
        alpha: h[0],
        length_scales: h.slice(s![1..]).to_vec(),
        task_length: None,
        tikhonov,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_fit_improves_likelihood() {
        let x = Array::linspace(0_f64, 1., 15).insert_axis(ndarray::Axis(1));
        let y = x.column(0).mapv(|v| (6. * v).sin());
        let data = HistoricalData::from_arrays(&x, &y, &Array1::from_elem(15, 1e-6)).unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let bounds = [(1e-2, 1e2), (1e-2, 1e1)];
        let h = fit_hyperparameters(
            CovarianceKind::SquaredExponential,
            &data,
            None,
            None,
            &bounds,
            4,
            &mut rng,
        )
        .unwrap();
        assert!(h.alpha >= 1e-2 * 0.999 && h.alpha <= 1e2 * 1.001);
        let lml = |h: &Hyperparameters| {
            let cov = CovarianceKind::SquaredExponential.build(h).unwrap();
            GaussianProcess::new(cov, data.clone(), None, None)
                .unwrap()
                .log_marginal_likelihood()
        };
        let naive = Hyperparameters::new(&[1.]);
        assert!(lml(&h) > lml(&naive));
    }

    #[test]
    fn test_fit_bad_bounds() {
        let data = HistoricalData::from_arrays(
            &ndarray::array![[0.], [1.]],
            &ndarray::array![0., 1.],
            &ndarray::array![0., 0.],
        )
        .unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let kind = CovarianceKind::Matern32;
        assert!(fit_hyperparameters(kind, &data, None, None, &[(1., 2.)], 1, &mut rng).is_err());
        assert!(
            fit_hyperparameters(kind, &data, None, None, &[(0., 1.), (1., 2.)], 1, &mut rng)
                .is_err()
        );
    }
}
