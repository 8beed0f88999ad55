use crate::{Halton, Lhs, Random, SamplingMethod, Sobol, SOBOL_MAX_DIM};
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2};
use ndarray_rand::rand::Rng;
use serde::{Deserialize, Serialize};

/// Selectable quasi-random generator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoeKind {
    /// Classic latin hypercube
    #[default]
    LatinHypercube,
    /// Randomly rotated Halton sequence
    Halton,
    /// Scrambled Sobol sequence, latin hypercube is used above [SOBOL_MAX_DIM] dimensions
    Sobol,
    /// Uniform random
    Uniform,
}

impl DoeKind {
    /// Generates `ns` samples within `xlimits` with the selected generator
    pub fn sample<F: Float, R: Rng>(
        &self,
        xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>,
        ns: usize,
        rng: &mut R,
    ) -> Array2<F> {
        match self {
            DoeKind::LatinHypercube => Lhs::new(xlimits).sample(ns, rng),
            DoeKind::Halton => Halton::new(xlimits).sample(ns, rng),
            DoeKind::Sobol if xlimits.nrows() <= SOBOL_MAX_DIM => {
                Sobol::new(xlimits).sample(ns, rng)
            }
            DoeKind::Sobol => Lhs::new(xlimits).sample(ns, rng),
            DoeKind::Uniform => Random::new(xlimits).sample(ns, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_every_kind_within_bounds() {
        let xlimits = arr2(&[[-2., 3.], [10., 11.]]);
        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        for kind in [
            DoeKind::LatinHypercube,
            DoeKind::Halton,
            DoeKind::Sobol,
            DoeKind::Uniform,
        ] {
            let doe = kind.sample(&xlimits, 20, &mut rng);
            assert_eq!(doe.dim(), (20, 2));
            for row in doe.rows() {
                assert!((-2. ..=3.).contains(&row[0]), "{kind:?}");
                assert!((10. ..=11.).contains(&row[1]), "{kind:?}");
            }
        }
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&DoeKind::Sobol).unwrap();
        assert_eq!(json, "\"Sobol\"");
        let kind: DoeKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, DoeKind::Sobol);
    }
}
