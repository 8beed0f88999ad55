use linfa::Float;
use ndarray::Array2;
use ndarray_rand::rand::Rng;

/// Sampling method allowing to generate a DoE in a given sample space
///
/// A sampling method is able to generate a set of `ns` samples in a given sample space.
/// where the sample space is defined by `[lower_bound_xi, upper_bound_xi]^nx`
/// within `R^nx` where `nx` is the dimension of the sample space.
///
/// The random generator is always supplied by the caller so that a whole
/// optimization run can be replayed from a single seed.
pub trait SamplingMethod<F: Float> {
    /// Returns the bounds of the sample space
    ///
    /// # Returns
    ///
    /// * A (nx, 2) matrix where the ith row is the interval of the ith components of a sample.
    fn sampling_space(&self) -> &Array2<F>;

    /// Generates a (ns, nx)-shaped array of samples belonging to `[0., 1.]^nx`
    fn normalized_sample<R: Rng>(&self, ns: usize, rng: &mut R) -> Array2<F>;

    /// Generates a (ns, nx)-shaped array of samples belonging to `[lower_bound_xi, upper_bound_xi]^nx`
    /// where bounds are the rows of `sampling_space`.
    fn sample<R: Rng>(&self, ns: usize, rng: &mut R) -> Array2<F> {
        let xlimits = self.sampling_space();
        let lower = xlimits.column(0);
        let scaler = &xlimits.column(1) - &lower;
        self.normalized_sample(ns, rng) * scaler + lower
    }
}
