/*!
This library implements the space-filling designs of experiments used to seed
and pad Bayesian optimization: [Latin Hypercube sampling](crate::Lhs),
[Halton](crate::Halton) and [Sobol](crate::Sobol) low-discrepancy sequences
and [uniform random sampling](crate::Random).

A DoE method is a way to generate a set of points (i.e. a DoE) within a design (or sample) space `xlimits`.
The design space is defined as a 2D ndarray `(nx, 2)`, specifying lower bound and upper bound
of each `nx` components of the samples `x`. Every method draws its randomness from
a generator passed by the caller.

Example:
```
use bayesbox_doe::{DoeKind, Lhs, LhsKind, SamplingMethod};
use ndarray::arr2;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

let mut rng = Xoshiro256Plus::seed_from_u64(42);
// Design space is defined as [5., 10.] x [0., 1.], samples are 2-dimensional.
let xlimits = arr2(&[[5., 10.], [0., 1.]]);
// We generate five samples using centered Latin Hypercube sampling.
let samples = Lhs::new(&xlimits).kind(LhsKind::Centered).sample(5, &mut rng);
// or else with a generator selected at runtime
let samples = DoeKind::Sobol.sample(&xlimits, 5, &mut rng);
```
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod halton;
mod kind;
mod lhs;
mod random;
mod sobol;
mod traits;
mod utils;

pub use halton::*;
pub use kind::*;
pub use lhs::*;
pub use random::*;
pub use sobol::*;
pub use traits::*;
pub use utils::{cdist, pdist};
