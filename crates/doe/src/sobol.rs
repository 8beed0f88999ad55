use crate::utils::check_xlimits;
use crate::SamplingMethod;
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2};
use ndarray_rand::rand::Rng;

/// Maximum dimension supported by the Sobol generator
pub const SOBOL_MAX_DIM: usize = 256;

/// Owen-scrambled Sobol design (Burley 2020), the scrambling seed is drawn
/// from the caller random generator.
#[derive(Clone, Debug)]
pub struct Sobol<F: Float> {
    xlimits: Array2<F>,
}

impl<F: Float> Sobol<F> {
    /// Constructor given a design space given a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    ///
    /// **Panics** if xlimits number of columns is different from 2
    /// or if its number of rows exceeds [SOBOL_MAX_DIM].
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        check_xlimits(xlimits);
        if xlimits.nrows() > SOBOL_MAX_DIM {
            panic!(
                "Sobol design is limited to {SOBOL_MAX_DIM} dimensions, got {}",
                xlimits.nrows()
            );
        }
        Sobol {
            xlimits: xlimits.to_owned(),
        }
    }
}

impl<F: Float> SamplingMethod<F> for Sobol<F> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample<R: Rng>(&self, ns: usize, rng: &mut R) -> Array2<F> {
        let nx = self.xlimits.nrows();
        let seed: u32 = rng.gen();
        Array2::from_shape_fn((ns, nx), |(i, j)| {
            F::cast(sobol_burley::sample(i as u32, j as u32, seed))
        })
    }
}
