use crate::utils::{check_xlimits, pdist};
use crate::SamplingMethod;
use linfa::Float;
use ndarray::{s, Array, Array2, ArrayBase, Data, Ix2, ShapeBuilder};
use ndarray_rand::{rand::seq::SliceRandom, rand::Rng, rand_distr::Uniform, RandomExt};
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

/// Kinds of Latin Hypercube Design
#[derive(Clone, Debug, Default, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LhsKind {
    /// sample is choosen randomly within its latin hypercube intervals
    #[default]
    Classic,
    /// sample is the middle of its latin hypercube intervals
    Centered,
    /// best of a few classic designs with respect to the minimal pairwise distance
    Maximin,
    /// best of a few centered designs with respect to the minimal pairwise distance
    CenteredMaximin,
}

/// The LHS design is built as follows: each dimension space is divided into ns sections
/// where ns is the number of sampling points, and one point in selected in each section.
/// The selection method gives different kind of LHS (see [LhsKind])
#[derive(Clone, Debug)]
pub struct Lhs<F: Float> {
    /// Sampling space definition as a (nx, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of xi, the ith component of x
    xlimits: Array2<F>,
    /// The requested kind of LHS
    kind: LhsKind,
    /// Number of candidate designs drawn by maximin kinds
    maximin_iters: usize,
}

impl<F: Float> SamplingMethod<F> for Lhs<F> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample<R: Rng>(&self, ns: usize, rng: &mut R) -> Array2<F> {
        match &self.kind {
            LhsKind::Classic => self.classic_lhs(ns, rng),
            LhsKind::Centered => self.centered_lhs(ns, rng),
            LhsKind::Maximin => self.maximin_lhs(ns, false, rng),
            LhsKind::CenteredMaximin => self.maximin_lhs(ns, true, rng),
        }
    }
}

impl<F: Float> Lhs<F> {
    /// Constructor with given design space.
    /// * `xlimits`: (nx, 2) matrix where nx is the dimension of the samples and the ith row
    ///   is the definition interval of the ith component of x.
    ///
    /// ```
    /// use bayesbox_doe::{Lhs, LhsKind, SamplingMethod};
    /// use ndarray::arr2;
    /// use ndarray_rand::rand::SeedableRng;
    /// use rand_xoshiro::Xoshiro256Plus;
    ///
    /// let mut rng = Xoshiro256Plus::seed_from_u64(42);
    /// let doe = Lhs::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]))
    ///     .kind(LhsKind::Maximin)
    ///     .sample(5, &mut rng);
    /// assert_eq!(doe.dim(), (5, 2));
    /// ```
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        check_xlimits(xlimits);
        Lhs {
            xlimits: xlimits.to_owned(),
            kind: LhsKind::default(),
            maximin_iters: 5,
        }
    }

    /// Sets the kind of LHS
    pub fn kind(mut self, kind: LhsKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the number of candidate designs compared by maximin kinds
    pub fn maximin_iters(mut self, iters: usize) -> Self {
        self.maximin_iters = iters.max(1);
        self
    }

    fn classic_lhs<R: Rng>(&self, ns: usize, rng: &mut R) -> Array2<F> {
        let nx = self.xlimits.nrows();
        let cut = Array::linspace(0., 1., ns + 1);

        let rnd = Array::random_using((ns, nx).f(), Uniform::new(0., 1.), rng);
        let a = cut.slice(s![..ns]).to_owned();
        let b = cut.slice(s![1..(ns + 1)]);
        let c = &b - &a;
        let mut lhs = Array2::<f64>::zeros((ns, nx).f());
        for j in 0..nx {
            let mut col = (rnd.column(j).to_owned() * &c + &a).to_vec();
            col.shuffle(rng);
            lhs.column_mut(j).assign(&Array::from_vec(col));
        }
        lhs.mapv(F::cast)
    }

    fn centered_lhs<R: Rng>(&self, ns: usize, rng: &mut R) -> Array2<F> {
        let nx = self.xlimits.nrows();
        let cut = Array::linspace(0., 1., ns + 1);

        let a = cut.slice(s![..ns]).to_owned();
        let b = cut.slice(s![1..(ns + 1)]);
        let mut c = ((a + b) / 2.).to_vec();
        let mut lhs = Array2::<f64>::zeros((ns, nx).f());
        for j in 0..nx {
            c.shuffle(rng);
            lhs.column_mut(j).assign(&Array::from_vec(c.clone()));
        }
        lhs.mapv(F::cast)
    }

    fn maximin_lhs<R: Rng>(&self, ns: usize, centered: bool, rng: &mut R) -> Array2<F> {
        let draw = |rng: &mut R| {
            if centered {
                self.centered_lhs(ns, rng)
            } else {
                self.classic_lhs(ns, rng)
            }
        };
        let mut lhs_maximin = draw(rng);
        if ns < 2 {
            return lhs_maximin;
        }
        let mut max_dist = *pdist(&lhs_maximin).min().unwrap();
        for _ in 1..self.maximin_iters {
            let lhs = draw(rng);
            let d_min = *pdist(&lhs).min().unwrap();
            if max_dist < d_min {
                max_dist = d_min;
                lhs_maximin = lhs;
            }
        }
        lhs_maximin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn assert_latin(doe: &Array2<f64>) {
        let ns = doe.nrows();
        for col in doe.columns() {
            let mut bins: Vec<usize> = col
                .iter()
                .map(|v| ((v * ns as f64).floor() as usize).min(ns - 1))
                .collect();
            bins.sort_unstable();
            assert_eq!(bins, (0..ns).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_classic_lhs_is_latin() {
        let xlimits = arr2(&[[0., 1.], [0., 1.], [0., 1.]]);
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let doe = Lhs::new(&xlimits).normalized_sample(8, &mut rng);
        assert_latin(&doe);
    }

    #[test]
    fn test_centered_lhs() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let doe = Lhs::new(&xlimits)
            .kind(LhsKind::Centered)
            .sample(4, &mut rng);
        let mut firsts = doe.column(0).to_vec();
        firsts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_abs_diff_eq!(
            Array::from_vec(firsts),
            Array::from_vec(vec![5.625, 6.875, 8.125, 9.375]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_maximin_lhs() {
        let xlimits = arr2(&[[0., 1.], [0., 1.]]);
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        let doe = Lhs::new(&xlimits)
            .kind(LhsKind::CenteredMaximin)
            .maximin_iters(10)
            .normalized_sample(6, &mut rng);
        assert_latin(&doe);
        assert!(*pdist(&doe).min().unwrap() > 0.);
    }
}
