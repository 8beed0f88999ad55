use crate::utils::check_xlimits;
use crate::SamplingMethod;
use linfa::Float;
use ndarray::{Array, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{rand::Rng, rand_distr::Uniform, RandomExt};

/// The Random design consists in drawing samples uniformly at random.
#[derive(Clone, Debug)]
pub struct Random<F: Float> {
    /// Sampling space definition as a (nx, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of xi, the ith component of x
    xlimits: Array2<F>,
}

impl<F: Float> Random<F> {
    /// Constructor given a design space given a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    ///
    /// ```
    /// use bayesbox_doe::{Random, SamplingMethod};
    /// use ndarray::arr2;
    /// use ndarray_rand::rand::SeedableRng;
    /// use rand_xoshiro::Xoshiro256Plus;
    ///
    /// let mut rng = Xoshiro256Plus::seed_from_u64(42);
    /// let doe = Random::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]])).sample(4, &mut rng);
    /// assert_eq!(doe.dim(), (4, 2));
    /// ```
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        check_xlimits(xlimits);
        Random {
            xlimits: xlimits.to_owned(),
        }
    }
}

impl<F: Float> SamplingMethod<F> for Random<F> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample<R: Rng>(&self, ns: usize, rng: &mut R) -> Array2<F> {
        let nx = self.xlimits.nrows();
        Array::random_using((ns, nx), Uniform::new(0., 1.), rng).mapv(|v| F::cast(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_random_within_bounds() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let actual = Random::new(&xlimits).sample(50, &mut rng);
        assert_eq!(actual.dim(), (50, 2));
        for row in actual.rows() {
            assert!((5. ..=10.).contains(&row[0]));
            assert!((0. ..=1.).contains(&row[1]));
        }
    }

    #[test]
    fn test_random_reproducible() {
        let xlimits = arr2(&[[0., 1.], [0., 1.], [-1., 1.]]);
        let a = Random::new(&xlimits).sample(7, &mut Xoshiro256Plus::seed_from_u64(3));
        let b = Random::new(&xlimits).sample(7, &mut Xoshiro256Plus::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
