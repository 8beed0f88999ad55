use crate::utils::check_xlimits;
use crate::SamplingMethod;
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2};
use ndarray_rand::rand::Rng;

/// Halton low-discrepancy design.
///
/// Component `j` of the `i`th sample is the radical inverse of `i + 1` in the
/// `j`th prime base, shifted modulo one by a random offset (Cranley-Patterson
/// rotation) so that successive calls do not replay the same points.
#[derive(Clone, Debug)]
pub struct Halton<F: Float> {
    xlimits: Array2<F>,
    /// Index of the first element of the sequence
    skip: usize,
}

impl<F: Float> Halton<F> {
    /// Constructor given a design space given a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        check_xlimits(xlimits);
        Halton {
            xlimits: xlimits.to_owned(),
            skip: 0,
        }
    }

    /// Start the sequence at the given index
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }
}

/// Radical inverse of `index` in the given `base`
pub fn radical_inverse(mut index: usize, base: usize) -> f64 {
    let inv_base = 1. / base as f64;
    let mut factor = inv_base;
    let mut result = 0.;
    while index > 0 {
        result += (index % base) as f64 * factor;
        index /= base;
        factor *= inv_base;
    }
    result
}

/// Returns the `n` first prime numbers
pub fn first_primes(n: usize) -> Vec<usize> {
    let mut primes: Vec<usize> = Vec::with_capacity(n);
    let mut candidate = 2;
    while primes.len() < n {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

impl<F: Float> SamplingMethod<F> for Halton<F> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample<R: Rng>(&self, ns: usize, rng: &mut R) -> Array2<F> {
        let nx = self.xlimits.nrows();
        let primes = first_primes(nx);
        let shifts: Vec<f64> = (0..nx).map(|_| rng.gen::<f64>()).collect();
        Array2::from_shape_fn((ns, nx), |(i, j)| {
            let v = radical_inverse(self.skip + i + 1, primes[j]) + shifts[j];
            F::cast(v - v.floor())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_radical_inverse() {
        assert_abs_diff_eq!(radical_inverse(1, 2), 0.5);
        assert_abs_diff_eq!(radical_inverse(3, 2), 0.75);
        assert_abs_diff_eq!(radical_inverse(5, 3), 2. / 3. + 1. / 9.);
    }

    #[test]
    fn test_first_primes() {
        assert_eq!(first_primes(6), vec![2, 3, 5, 7, 11, 13]);
    }

    #[test]
    fn test_halton_within_bounds() {
        let xlimits = arr2(&[[-1., 1.], [0., 10.], [0., 1.]]);
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let doe = Halton::new(&xlimits).sample(30, &mut rng);
        for row in doe.rows() {
            assert!((-1. ..=1.).contains(&row[0]));
            assert!((0. ..=10.).contains(&row[1]));
            assert!((0. ..=1.).contains(&row[2]));
        }
    }
}
