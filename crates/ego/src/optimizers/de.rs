use super::{starting_points, BestTracker, OptimizationResult, OptimizerConfig, VectorizedOptimizer};
use crate::acquisition::AcquisitionFunction;
use crate::domain::OptimizationDomain;
use crate::errors::{EgoError, Result};

use log::debug;
use ndarray::{Array2, Zip};
use ndarray_rand::rand::seq::index;
use ndarray_rand::rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Differential weight
pub const DE_MUTATION_FACTOR: f64 = 0.8;
/// Binomial crossover probability
pub const DE_CROSSOVER_RATE: f64 = 0.7;
/// Smallest population allowing three distinct partners per member
pub const DE_MIN_POPULATION: usize = 4;

/// Mutation strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeStrategy {
    /// `best + F (a - b)`
    #[default]
    Best1,
    /// `c + F (a - b)`
    Rand1,
}

/// Differential evolution maximizing an acquisition function
pub struct DifferentialEvolution<'a, D: OptimizationDomain> {
    domain: &'a D,
    af: &'a dyn AcquisitionFunction,
    config: OptimizerConfig,
    strategy: DeStrategy,
}

impl<'a, D: OptimizationDomain> DifferentialEvolution<'a, D> {
    pub fn new(
        domain: &'a D,
        af: &'a dyn AcquisitionFunction,
        config: OptimizerConfig,
        strategy: DeStrategy,
    ) -> Result<Self> {
        if af.dim() != domain.dim() {
            return Err(EgoError::DimensionMismatch {
                expected: domain.dim(),
                actual: af.dim(),
            });
        }
        Ok(DifferentialEvolution {
            domain,
            af,
            config,
            strategy,
        })
    }

    pub fn population_size(&self) -> usize {
        self.config.num_multistarts.max(DE_MIN_POPULATION)
    }

    /// Rows `i` of the result are three distinct members all different from `i`,
    /// obtained by rotating member indices with distinct non zero shifts
    fn rotation_matrix(&self, rng: &mut dyn RngCore) -> Array2<usize> {
        let n = self.population_size();
        let shifts: Vec<usize> = index::sample(rng, n - 1, 3)
            .into_iter()
            .map(|s| s + 1)
            .collect();
        Array2::from_shape_fn((n, 3), |(i, k)| (i + shifts[k]) % n)
    }

    fn mutants(&self, population: &Array2<f64>, best: usize, rng: &mut dyn RngCore) -> Array2<f64> {
        let rotation = self.rotation_matrix(rng);
        let mut mutants = Array2::zeros(population.raw_dim());
        Zip::from(mutants.rows_mut())
            .and(rotation.rows())
            .for_each(|mut m, r| {
                let base = match self.strategy {
                    DeStrategy::Best1 => population.row(best),
                    DeStrategy::Rand1 => population.row(r[2]),
                };
                m.assign(&(&base + &((&population.row(r[0]) - &population.row(r[1])) * DE_MUTATION_FACTOR)));
            });
        mutants
    }
}

impl<'a, D: OptimizationDomain> VectorizedOptimizer for DifferentialEvolution<'a, D> {
    fn optimize(&self, rng: &mut dyn RngCore) -> Result<OptimizationResult> {
        let n = self.population_size();
        let d = self.domain.dim();
        let start = starting_points(self.domain, &self.config, n, rng)?;
        let mut population = start.clone();
        let mut values = self.af.evaluate_in_batches(population.view())?;
        let mut tracker = BestTracker::new(&population, &values)?;

        for iter in 0..self.config.maxiter {
            let best = values
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
                    if v > bv {
                        (i, v)
                    } else {
                        (bi, bv)
                    }
                })
                .0;
            let mutants = self.mutants(&population, best, rng);

            let mut trials = population.clone();
            for (i, mut trial) in trials.rows_mut().into_iter().enumerate() {
                let forced = rng.gen_range(0..d);
                for j in 0..d {
                    if j == forced || rng.gen::<f64>() < DE_CROSSOVER_RATE {
                        trial[j] = mutants[[i, j]];
                    }
                }
            }
            let trials = self.domain.restrict_points(trials.view());
            let trial_values = self.af.evaluate_in_batches(trials.view())?;

            let mut replaced = 0;
            Zip::from(population.rows_mut())
                .and(&mut values)
                .and(trials.rows())
                .and(&trial_values)
                .for_each(|mut p, v, t, &tv| {
                    if tv >= *v {
                        p.assign(&t);
                        *v = tv;
                        replaced += 1;
                    }
                });
            tracker.update(&trials, &trial_values)?;
            debug!(
                "DE iteration {}: {} replaced, best {}",
                iter, replaced, tracker.value
            );
        }
        Ok(tracker.finish(start, population, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContinuousDomain, FixedIndicesOnContinuousDomain};
    use crate::geometry::Halfspaces;
    use ndarray::{array, Array1, ArrayView2};
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    /// Concave bump peaking at `center`
    #[derive(Clone, Debug)]
    struct Bump {
        center: Array1<f64>,
    }

    impl AcquisitionFunction for Bump {
        fn name(&self) -> &'static str {
            "Bump"
        }

        fn dim(&self) -> usize {
            self.center.len()
        }

        fn evaluate_at_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
            Ok(x.rows()
                .into_iter()
                .map(|r| {
                    let d2: f64 = (&r - &self.center).mapv(|v| v * v).sum();
                    (-d2).exp()
                })
                .collect())
        }
    }

    #[test]
    fn test_de_finds_bump() {
        let domain = ContinuousDomain::new(&array![[-2., 2.], [-2., 2.]]).unwrap();
        let af = Bump {
            center: array![0.7, -0.4],
        };
        for strategy in [DeStrategy::Best1, DeStrategy::Rand1] {
            let config = OptimizerConfig::default().num_multistarts(16).maxiter(60);
            let de = DifferentialEvolution::new(&domain, &af, config, strategy).unwrap();
            let mut rng = Xoshiro256Plus::seed_from_u64(42);
            let res = de.optimize(&mut rng).unwrap();
            assert!((&res.best_point - &af.center).mapv(f64::abs).sum() < 2e-2);
            assert_eq!(res.best_value_history.len(), 61);
            assert!(res
                .best_value_history
                .windows(2)
                .all(|w| w[1] >= w[0]));
            assert_eq!(res.starting_points.nrows(), 16);
            assert!(res
                .ending_points
                .rows()
                .into_iter()
                .all(|r| domain.check_point_acceptable(&r)));
        }
    }

    #[test]
    fn test_de_stays_in_constrained_domain() {
        // peak outside of x + y <= 0.5
        let domain = ContinuousDomain::new(&array![[0., 1.], [0., 1.]])
            .unwrap()
            .with_constraints(Halfspaces::new(array![[1., 1.]], array![0.5]).unwrap())
            .unwrap();
        let af = Bump {
            center: array![0.9, 0.9],
        };
        let de = DifferentialEvolution::new(
            &domain,
            &af,
            OptimizerConfig::default().num_multistarts(2).maxiter(30),
            DeStrategy::Best1,
        )
        .unwrap();
        assert_eq!(de.population_size(), DE_MIN_POPULATION);
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let res = de.optimize(&mut rng).unwrap();
        assert!(domain.check_point_acceptable(&res.best_point));
        assert!(res.best_point.sum() > 0.4);
    }

    #[test]
    fn test_de_with_fixed_coordinates() {
        let domain = ContinuousDomain::new(&array![[0., 1.], [0., 1.]]).unwrap();
        let fixed = FixedIndicesOnContinuousDomain::new(domain, vec![(1, 0.25)]).unwrap();
        let af = Bump {
            center: array![0.6, 0.6],
        };
        let de = DifferentialEvolution::new(
            &fixed,
            &af,
            OptimizerConfig::default().num_multistarts(8).maxiter(20),
            DeStrategy::Rand1,
        )
        .unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(5);
        let res = de.optimize(&mut rng).unwrap();
        assert_eq!(res.best_point[1], 0.25);
        assert!((res.best_point[0] - 0.6).abs() < 0.05);
    }

    #[test]
    fn test_de_dimension_mismatch() {
        let domain = ContinuousDomain::new(&array![[0., 1.]]).unwrap();
        let af = Bump {
            center: array![0.5, 0.5],
        };
        assert!(
            DifferentialEvolution::new(&domain, &af, OptimizerConfig::default(), DeStrategy::Best1)
                .is_err()
        );
    }
}
