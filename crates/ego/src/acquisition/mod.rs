//! Acquisition functions quantifying the value of sampling candidate points.
//!
//! Every function evaluates rows of a `(n, dim)` array and returns values
//! to be maximized. Gradients are only available from differentiable ones,
//! see [AcquisitionFunction::differentiable].
mod ei;
mod multipoint;
mod search;

pub use ei::*;
pub use multipoint::*;
pub use search::*;

use crate::errors::{EgoError, Result};
use crate::failure::ProbabilisticFailure;

use bayesbox_gp::Predictor;
use dyn_clonable::*;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Maximum number of rows evaluated at once by [AcquisitionFunction::evaluate_in_batches]
pub const MAX_EVALUATION_CHUNK: usize = 1000;

/// A trait for acquisition functions which maximum location determines the
/// next most promising point
#[clonable]
pub trait AcquisitionFunction: Clone + Send + Sync {
    /// Name of the acquisition function
    fn name(&self) -> &'static str;

    /// Dimension of evaluated points
    fn dim(&self) -> usize;

    /// Values (n) at rows of `x`, all non negative
    fn evaluate_at_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Whether [AcquisitionFunction::evaluate_grad_at_points] is available
    fn differentiable(&self) -> bool {
        false
    }

    /// Gradients (n, dim) at rows of `x`
    fn evaluate_grad_at_points(&self, _x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Err(EgoError::NotDifferentiable(self.name().to_string()))
    }

    /// Values at rows of `x` evaluated by chunks of at most [MAX_EVALUATION_CHUNK] rows
    fn evaluate_in_batches(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.nrows() <= MAX_EVALUATION_CHUNK {
            return self.evaluate_at_points(x);
        }
        let chunks = x
            .axis_chunks_iter(Axis(0), MAX_EVALUATION_CHUNK)
            .map(|chunk| self.evaluate_at_points(chunk))
            .collect::<Result<Vec<_>>>()?;
        Ok(chunks.into_iter().flatten().collect())
    }
}

impl std::fmt::Debug for dyn AcquisitionFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(dim={})", self.name(), self.dim())
    }
}

pub(crate) fn check_dim(expected: usize, x: &ArrayView2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(EgoError::DimensionMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    Ok(())
}

/// Expected improvement variant resolved from the modeling context:
/// with failures when a failure model is given, augmented when the mean
/// observation noise exceeds [AUGMENTED_EI_NOISE_THRESHOLD], plain otherwise
pub fn expected_improvement(
    predictor: &(dyn Predictor + 'static),
    failure: Option<&(dyn ProbabilisticFailure + 'static)>,
) -> Result<Box<dyn AcquisitionFunction>> {
    if let Some(failure) = failure {
        return Ok(Box::new(ExpectedImprovementWithFailures::new(
            predictor, failure,
        )?));
    }
    let noise = predictor.points_sampled_noise_variance()?;
    let mean_noise = noise.mean().unwrap_or(0.);
    if mean_noise > AUGMENTED_EI_NOISE_THRESHOLD {
        Ok(Box::new(AugmentedExpectedImprovement::new(predictor)?))
    } else {
        Ok(Box::new(ExpectedImprovement::new(predictor)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bayesbox_gp::covariance::SquaredExponential;
    use bayesbox_gp::{GaussianProcess, HistoricalData};
    use ndarray::{array, Array};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand_xoshiro::Xoshiro256Plus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Sums coordinates and records the largest evaluated chunk
    #[derive(Clone)]
    struct CoordinateSum {
        largest_chunk: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl AcquisitionFunction for CoordinateSum {
        fn name(&self) -> &'static str {
            "sum"
        }

        fn dim(&self) -> usize {
            2
        }

        fn evaluate_at_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
            self.largest_chunk.fetch_max(x.nrows(), Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(x.sum_axis(Axis(1)))
        }
    }

    fn candidates(n: usize) -> Array2<f64> {
        let mut rng = Xoshiro256Plus::seed_from_u64(5);
        Array2::random_using((n, 2), Uniform::new(0., 1.), &mut rng)
    }

    #[test]
    fn test_batches_are_bounded_and_ordered() {
        let af = CoordinateSum {
            largest_chunk: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let x = candidates(2 * MAX_EVALUATION_CHUNK + 501);
        let values = af.evaluate_in_batches(x.view()).unwrap();
        assert_eq!(values, x.sum_axis(Axis(1)));
        assert_eq!(af.calls.load(Ordering::SeqCst), 3);
        assert_eq!(af.largest_chunk.load(Ordering::SeqCst), MAX_EVALUATION_CHUNK);
    }

    #[test]
    fn test_expected_improvement_in_batches() {
        let x = array![[0.1, 0.2], [0.5, 0.9], [0.8, 0.3], [0.3, 0.6], [0.9, 0.8]];
        let y = array![0.4, -1.2, 0.8, 0., 1.5];
        let data = HistoricalData::from_arrays(&x, &y, &Array::from_elem(5, 1e-8)).unwrap();
        let gp = GaussianProcess::new(
            Box::new(SquaredExponential::new(1., &[0.3, 0.4]).unwrap()),
            data,
            None,
            None,
        )
        .unwrap();
        let ei = ExpectedImprovement::new(&gp).unwrap();
        let points = candidates(2501);
        let batched = ei.evaluate_in_batches(points.view()).unwrap();
        let direct = ei.evaluate_at_points(points.view()).unwrap();
        assert_eq!(batched.len(), 2501);
        assert_abs_diff_eq!(batched, direct, epsilon = 1e-12);
    }
}
