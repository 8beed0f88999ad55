//! Selection of the next points to evaluate.
//!
//! Acquisition functions are optimized over the one-hot representation of a
//! [CategoricalDomain], optimum locations are snapped to admissible values and
//! mapped back to physical points. A proposed point duplicating a sampled or
//! already proposed point is replaced by a distinct random point.
use crate::acquisition::{
    expected_improvement, AcquisitionFunction, MultipointExpectedImprovement, SearchAcquisition,
    DEFAULT_MC_ITERATIONS,
};
use crate::domain::{CategoricalDomain, CategoricalSnapping, DomainBuilder, OptimizationDomain};
use crate::errors::{EgoError, Result};
use crate::failure::ProbabilisticFailure;
use crate::optimizers::{
    maxiter_for, AdamOptimizer, DeStrategy, DifferentialEvolution, OptimizationResult,
    OptimizerConfig, VectorizedOptimizer, DEFAULT_NUM_MULTISTARTS,
};
use crate::types::SamplerKind;

use bayesbox_gp::{LieStrategy, Predictor, DEFAULT_LIE_NOISE_VARIANCE};
use env_logger::{Builder, Env};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::rand::Rng;
use serde::{Deserialize, Serialize};

/// Environment variable holding the log filter, `info` by default
pub const BAYESBOX_LOG: &str = "BAYESBOX_LOG";
/// Default scaled distance under which two points are duplicates
pub const DEFAULT_UNIQUENESS_TOLERANCE: f64 = 1e-4;
/// Observations needed before a model based strategy is used
pub const MIN_OBSERVATIONS_FOR_MODEL: usize = 2;
/// Successful observations needed before optimizing the objective
pub const MIN_SUCCESSFUL_FOR_OPTIMIZATION: usize = 2;

/// Initializes logging to stdout filtered by [BAYESBOX_LOG], does nothing
/// when a logger is already installed
pub fn init_logging() {
    let env = Env::new().filter_or(BAYESBOX_LOG, "info");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();
}

/// Optimizer used on acquisition functions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    /// Differential evolution
    #[default]
    De,
    /// Adam, differential evolution is used for non differentiable functions
    Adam,
}

/// Strategy of the next suggestions given the observation history
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// Not enough data for a model
    QuasiRandom,
    /// Look for successful regions with [SearchAcquisition]
    Search,
    /// Optimize the expected improvement
    ExpectedImprovement,
}

/// Strategy given the number of observations and how many of them succeeded
pub fn select_search_strategy(num_observations: usize, num_successful: usize) -> SearchStrategy {
    if num_observations < MIN_OBSERVATIONS_FOR_MODEL {
        SearchStrategy::QuasiRandom
    } else if num_successful < MIN_SUCCESSFUL_FOR_OPTIMIZATION {
        SearchStrategy::Search
    } else {
        SearchStrategy::ExpectedImprovement
    }
}

/// Next points parameterization
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NextPointsConfig {
    pub(crate) optimizer: OptimizerKind,
    pub(crate) de_strategy: DeStrategy,
    pub(crate) num_multistarts: usize,
    /// Iterations of the optimizer, taken from [maxiter_for] when `None`
    pub(crate) maxiter: Option<usize>,
    pub(crate) num_mc_iterations: usize,
    pub(crate) lie_strategy: LieStrategy,
    pub(crate) lie_noise_variance: f64,
    /// Overrides the quasi-random generator of the domain
    pub(crate) sampler: Option<SamplerKind>,
    /// Seed of the multipoint estimator, drawn from the given generator when `None`
    pub(crate) seed: Option<u64>,
    pub(crate) uniqueness_tolerance: f64,
    pub(crate) snapping: CategoricalSnapping,
}

impl Default for NextPointsConfig {
    fn default() -> Self {
        NextPointsConfig {
            optimizer: OptimizerKind::De,
            de_strategy: DeStrategy::Best1,
            num_multistarts: DEFAULT_NUM_MULTISTARTS,
            maxiter: None,
            num_mc_iterations: DEFAULT_MC_ITERATIONS,
            lie_strategy: LieStrategy::Min,
            lie_noise_variance: DEFAULT_LIE_NOISE_VARIANCE,
            sampler: None,
            seed: None,
            uniqueness_tolerance: DEFAULT_UNIQUENESS_TOLERANCE,
            snapping: CategoricalSnapping::ArgMax,
        }
    }
}

impl NextPointsConfig {
    pub fn optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn de_strategy(mut self, de_strategy: DeStrategy) -> Self {
        self.de_strategy = de_strategy;
        self
    }

    pub fn num_multistarts(mut self, num_multistarts: usize) -> Self {
        self.num_multistarts = num_multistarts;
        self
    }

    pub fn maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = Some(maxiter);
        self
    }

    pub fn num_mc_iterations(mut self, num_mc_iterations: usize) -> Self {
        self.num_mc_iterations = num_mc_iterations;
        self
    }

    pub fn lie_strategy(mut self, lie_strategy: LieStrategy) -> Self {
        self.lie_strategy = lie_strategy;
        self
    }

    pub fn lie_noise_variance(mut self, lie_noise_variance: f64) -> Self {
        self.lie_noise_variance = lie_noise_variance;
        self
    }

    pub fn sampler(mut self, sampler: SamplerKind) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn uniqueness_tolerance(mut self, uniqueness_tolerance: f64) -> Self {
        self.uniqueness_tolerance = uniqueness_tolerance;
        self
    }

    pub fn snapping(mut self, snapping: CategoricalSnapping) -> Self {
        self.snapping = snapping;
        self
    }

    fn optimizer_config(&self, dim: usize, num_sampled: usize) -> OptimizerConfig {
        OptimizerConfig::default()
            .num_multistarts(self.num_multistarts)
            .maxiter(self.maxiter.unwrap_or_else(|| maxiter_for(dim, num_sampled)))
    }

    fn domain(&self, domain: &CategoricalDomain) -> CategoricalDomain {
        match self.sampler {
            Some(sampler) => domain.clone().with_sampler(sampler),
            None => domain.clone(),
        }
    }
}

/// Proposed physical points with their acceptability
#[derive(Clone, Debug)]
pub struct NextPoints {
    /// (q, dim) physical points
    pub points: Array2<f64>,
    /// Whether each point lies in the domain
    pub acceptable: Vec<bool>,
}

impl NextPoints {
    fn from_rows(domain: &CategoricalDomain, rows: &[Array1<f64>]) -> Self {
        let points = stack_rows(rows, domain.dim());
        let acceptable = domain.check_points_acceptable(&points);
        NextPoints { points, acceptable }
    }
}

fn stack_rows(rows: &[Array1<f64>], dim: usize) -> Array2<f64> {
    let mut points = Array2::zeros((rows.len(), dim));
    for (mut p, r) in points.rows_mut().into_iter().zip(rows) {
        p.assign(r);
    }
    points
}

fn check_predictor_dim(predictor_dim: usize, domain: &CategoricalDomain) -> Result<()> {
    if predictor_dim != domain.one_hot_dim() {
        return Err(EgoError::DimensionMismatch {
            expected: domain.one_hot_dim(),
            actual: predictor_dim,
        });
    }
    Ok(())
}

/// Maximizes `af` over `domain` with the configured optimizer
fn optimize_acquisition<D: OptimizationDomain, R: Rng>(
    domain: &D,
    af: &dyn AcquisitionFunction,
    config: &NextPointsConfig,
    num_sampled: usize,
    rng: &mut R,
) -> Result<OptimizationResult> {
    let optimizer_config = config.optimizer_config(domain.dim(), num_sampled);
    let result = match config.optimizer {
        OptimizerKind::Adam if af.differentiable() => {
            AdamOptimizer::new(domain, af, optimizer_config)?.optimize(rng)?
        }
        kind => {
            if kind == OptimizerKind::Adam {
                debug!("{} is not differentiable, use differential evolution", af.name());
            }
            DifferentialEvolution::new(domain, af, optimizer_config, config.de_strategy)?
                .optimize(rng)?
        }
    };
    debug!(
        "{} maximized to {} in {} iterations",
        af.name(),
        result.best_value,
        result.best_value_history.len() - 1
    );
    Ok(result)
}

/// Snaps a one-hot optimum and maps it to a physical point distinct from
/// `excluded`, returns both representations
fn select_point<R: Rng>(
    domain: &CategoricalDomain,
    one_hot: &Array1<f64>,
    excluded: &[Array1<f64>],
    config: &NextPointsConfig,
    rng: &mut R,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let excluded = stack_rows(excluded, domain.dim());
    let candidate = one_hot.view().insert_axis(ndarray::Axis(0));
    let snapped = domain.snap_feasible_one_hot_points(&candidate, rng);
    if snapped.nrows() == 1 {
        let physical = domain.map_from_one_hot(&snapped, config.snapping, rng)?;
        if domain.find_unique_points(&physical, &excluded, config.uniqueness_tolerance)[0] {
            return Ok((snapped.row(0).to_owned(), physical.row(0).to_owned()));
        }
        debug!("Optimum {} duplicates a known point", physical.row(0));
    } else {
        debug!("Optimum {} has no feasible snapping", one_hot);
    }
    let replacement =
        domain.generate_distinct_random_points(1, &excluded, config.uniqueness_tolerance, rng)?;
    if replacement.nrows() == 0 {
        return Err(EgoError::SamplingError(
            "every point of the domain has already been proposed".to_string(),
        ));
    }
    let one_hot = domain.map_to_one_hot(&replacement)?;
    Ok((one_hot.row(0).to_owned(), replacement.row(0).to_owned()))
}

/// Physical counterparts of one-hot sampled points
fn physical_rows<R: Rng>(
    domain: &CategoricalDomain,
    one_hot: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    rng: &mut R,
) -> Result<Vec<Array1<f64>>> {
    if one_hot.nrows() == 0 {
        return Ok(vec![]);
    }
    let physical = domain.map_from_one_hot(one_hot, CategoricalSnapping::ArgMax, rng)?;
    Ok(physical.rows().into_iter().map(|r| r.to_owned()).collect())
}

/// `q` points chosen one at a time by maximizing the expected improvement,
/// a lie being appended at each chosen point before choosing the next one.
///
/// The predictor works on the one-hot representation of `domain`, it is not
/// modified as lies are appended to a copy.
pub fn constant_liar_next_points<R: Rng>(
    predictor: &(dyn Predictor + 'static),
    domain: &CategoricalDomain,
    q: usize,
    failure: Option<&(dyn ProbabilisticFailure + 'static)>,
    config: &NextPointsConfig,
    rng: &mut R,
) -> Result<NextPoints> {
    check_predictor_dim(predictor.dim(), domain)?;
    let domain = config.domain(domain);
    info!("Constant liar selection of {} points", q);
    let mut liar = dyn_clonable::dyn_clone::clone_box(predictor);
    let mut excluded = physical_rows(&domain, &predictor.points_sampled(), rng)?;
    let mut chosen = Vec::with_capacity(q);
    for i in 0..q {
        let af = expected_improvement(liar.as_ref(), failure)?;
        let result = optimize_acquisition(
            domain.one_hot_domain(),
            af.as_ref(),
            config,
            liar.num_sampled(),
            rng,
        )?;
        let (one_hot, physical) = select_point(&domain, &result.best_point, &excluded, config, rng)?;
        debug!("Point {} of {}: {}", i + 1, q, physical);
        liar.append_lies(
            one_hot.view().insert_axis(ndarray::Axis(0)),
            config.lie_strategy,
            config.lie_noise_variance,
        )?;
        excluded.push(physical.clone());
        chosen.push(physical);
    }
    Ok(NextPoints::from_rows(&domain, &chosen))
}

/// `q` points chosen jointly by maximizing the multipoint expected
/// improvement over `q` copies of the one-hot domain.
///
/// `points_being_sampled` are one-hot pending points.
pub fn joint_next_points<R: Rng>(
    predictor: &(dyn Predictor + 'static),
    domain: &CategoricalDomain,
    q: usize,
    points_being_sampled: &Array2<f64>,
    config: &NextPointsConfig,
    rng: &mut R,
) -> Result<NextPoints> {
    check_predictor_dim(predictor.dim(), domain)?;
    let domain = config.domain(domain);
    info!("Joint selection of {} points", q);
    let repeated = DomainBuilder::from(domain.one_hot_domain()).repeat(q).build()?;
    let seed = config.seed.unwrap_or_else(|| rng.gen());
    let qei = MultipointExpectedImprovement::new(
        predictor,
        q,
        points_being_sampled,
        config.num_mc_iterations,
        seed,
    )?;
    let result = optimize_acquisition(&repeated, &qei, config, predictor.num_sampled(), rng)?;

    let d = domain.one_hot_dim();
    let mut excluded = physical_rows(&domain, &predictor.points_sampled(), rng)?;
    excluded.extend(physical_rows(&domain, points_being_sampled, rng)?);
    let mut chosen = Vec::with_capacity(q);
    for i in 0..q {
        let one_hot = Array1::from_iter((0..d).map(|j| result.best_point[i * d + j]));
        let (_, physical) = select_point(&domain, &one_hot, &excluded, config, rng)?;
        excluded.push(physical.clone());
        chosen.push(physical);
    }
    Ok(NextPoints::from_rows(&domain, &chosen))
}

/// `q` points chosen one at a time by maximizing a [SearchAcquisition], each
/// chosen point becoming a repulsor of the next ones.
///
/// `repulsors` are one-hot points, typically the sampled ones.
pub fn search_next_points<R: Rng>(
    failure: &(dyn ProbabilisticFailure + 'static),
    domain: &CategoricalDomain,
    q: usize,
    repulsors: &Array2<f64>,
    threshold: f64,
    config: &NextPointsConfig,
    rng: &mut R,
) -> Result<NextPoints> {
    let domain = config.domain(domain);
    info!("Search selection of {} points", q);
    let mut repulsors: Vec<Array1<f64>> = repulsors.rows().into_iter().map(|r| r.to_owned()).collect();
    let mut excluded = physical_rows(&domain, &stack_rows(&repulsors, domain.one_hot_dim()), rng)?;
    let mut chosen = Vec::with_capacity(q);
    for _ in 0..q {
        let af = SearchAcquisition::new(
            failure,
            &domain,
            &stack_rows(&repulsors, domain.one_hot_dim()),
            threshold,
        )?;
        let result =
            optimize_acquisition(domain.one_hot_domain(), &af, config, repulsors.len(), rng)?;
        if result.best_value <= 0. {
            warn!("Search acquisition vanishes everywhere explored");
        }
        let (one_hot, physical) = select_point(&domain, &result.best_point, &excluded, config, rng)?;
        repulsors.push(one_hot);
        excluded.push(physical.clone());
        chosen.push(physical);
    }
    Ok(NextPoints::from_rows(&domain, &chosen))
}

/// `q` distinct quasi-random physical points away from `excluded` ones
pub fn quasi_random_next_points<R: Rng>(
    domain: &CategoricalDomain,
    q: usize,
    excluded: &Array2<f64>,
    config: &NextPointsConfig,
    rng: &mut R,
) -> Result<NextPoints> {
    let domain = config.domain(domain);
    let excluded = if excluded.is_empty() {
        Array2::zeros((0, domain.dim()))
    } else {
        excluded.to_owned()
    };
    let points =
        domain.generate_distinct_random_points(q, &excluded, config.uniqueness_tolerance, rng)?;
    if points.nrows() < q {
        warn!("Only {} distinct points out of {} requested", points.nrows(), q);
    }
    let acceptable = domain.check_points_acceptable(&points);
    Ok(NextPoints { points, acceptable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::LogisticFailure;
    use crate::types::{DomainComponent, LinearConstraint, VarType};
    use bayesbox_gp::covariance::SquaredExponential;
    use bayesbox_gp::{GaussianProcess, HistoricalData};
    use ndarray::{array, Array};
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn mixed_domain() -> CategoricalDomain {
        CategoricalDomain::new(
            vec![
                DomainComponent::double(0., 1.),
                DomainComponent::int(0, 4),
                DomainComponent::categorical(&[10., 20.]),
            ],
            vec![LinearConstraint::new(&[1., 0., 0.], 0.8, VarType::Double)],
        )
        .unwrap()
    }

    fn mixed_gp(domain: &CategoricalDomain) -> GaussianProcess {
        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        let physical = domain.generate_quasi_random_points(8, &mut rng).unwrap();
        let x = domain.map_to_one_hot(&physical).unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| (r[0] - 0.3).powi(2) + 0.1 * r[1])
            .collect();
        let data = HistoricalData::from_arrays(&x, &y, &Array::from_elem(8, 1e-6)).unwrap();
        GaussianProcess::new(
            Box::new(SquaredExponential::new(1., &[0.4, 2., 1., 1.]).unwrap()),
            data,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_select_search_strategy() {
        assert_eq!(select_search_strategy(0, 0), SearchStrategy::QuasiRandom);
        assert_eq!(select_search_strategy(1, 1), SearchStrategy::QuasiRandom);
        assert_eq!(select_search_strategy(10, 1), SearchStrategy::Search);
        assert_eq!(select_search_strategy(10, 4), SearchStrategy::ExpectedImprovement);
    }

    #[test]
    fn test_config_serde() {
        let config = NextPointsConfig::default()
            .optimizer(OptimizerKind::Adam)
            .maxiter(7)
            .lie_strategy(LieStrategy::Constant(2.))
            .sampler(SamplerKind::Sobol)
            .seed(3);
        let json = serde_json::to_string(&config).unwrap();
        let back: NextPointsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.optimizer, OptimizerKind::Adam);
        assert_eq!(back.maxiter, Some(7));
        assert_eq!(back.lie_strategy, LieStrategy::Constant(2.));
        assert_eq!(back.sampler, Some(SamplerKind::Sobol));
        assert_eq!(back.seed, Some(3));
    }

    #[test]
    fn test_constant_liar_mixed_domain() {
        init_logging();
        let domain = mixed_domain();
        let gp = mixed_gp(&domain);
        let config = NextPointsConfig::default().num_multistarts(10).maxiter(15);
        let mut rng = Xoshiro256Plus::seed_from_u64(2);
        let next = constant_liar_next_points(&gp, &domain, 3, None, &config, &mut rng).unwrap();
        assert_eq!(next.points.dim(), (3, 3));
        assert!(next.acceptable.iter().all(|a| *a));
        let flags = domain.find_unique_points(&next.points, &Array2::zeros((0, 3)), 1e-6);
        assert!(flags.iter().all(|f| *f));
        // the predictor itself carries no lie
        assert_eq!(gp.num_sampled(), 8);
    }

    #[test]
    fn test_constant_liar_with_failures_and_adam() {
        let domain = mixed_domain();
        let gp = mixed_gp(&domain);
        let failure = LogisticFailure::new(&gp, 0.2).unwrap();
        let config = NextPointsConfig::default()
            .optimizer(OptimizerKind::Adam)
            .num_multistarts(6)
            .maxiter(10);
        let mut rng = Xoshiro256Plus::seed_from_u64(4);
        let next =
            constant_liar_next_points(&gp, &domain, 2, Some(&failure), &config, &mut rng).unwrap();
        assert_eq!(next.points.nrows(), 2);
        assert!(next.acceptable.iter().all(|a| *a));
    }

    #[test]
    fn test_joint_next_points() {
        let domain = mixed_domain();
        let gp = mixed_gp(&domain);
        let config = NextPointsConfig::default()
            .num_multistarts(8)
            .maxiter(5)
            .num_mc_iterations(200)
            .seed(9);
        let mut rng = Xoshiro256Plus::seed_from_u64(6);
        let next = joint_next_points(&gp, &domain, 2, &Array2::zeros((0, 4)), &config, &mut rng)
            .unwrap();
        assert_eq!(next.points.dim(), (2, 3));
        assert!(next.acceptable.iter().all(|a| *a));
        let flags = domain.find_unique_points(&next.points, &Array2::zeros((0, 3)), 1e-6);
        assert!(flags.iter().all(|f| *f));
    }

    #[test]
    fn test_search_and_quasi_random_next_points() {
        let domain = mixed_domain();
        let gp = mixed_gp(&domain);
        let failure = LogisticFailure::new(&gp, 0.1).unwrap();
        let config = NextPointsConfig::default().num_multistarts(8).maxiter(10);
        let mut rng = Xoshiro256Plus::seed_from_u64(8);
        let repulsors = gp.historical_data().points_sampled().to_owned();
        let next =
            search_next_points(&failure, &domain, 2, &repulsors, 0.01, &config, &mut rng).unwrap();
        assert_eq!(next.points.nrows(), 2);
        assert!(next.acceptable.iter().all(|a| *a));

        let excluded = array![[0.5, 2., 10.]];
        let next = quasi_random_next_points(&domain, 4, &excluded, &config, &mut rng).unwrap();
        assert_eq!(next.points.nrows(), 4);
        assert!(next.acceptable.iter().all(|a| *a));
    }

    #[test]
    fn test_predictor_dimension_checked() {
        let domain = mixed_domain();
        let data = HistoricalData::from_arrays(&array![[0.5]], &array![1.], &array![0.]).unwrap();
        let gp = GaussianProcess::new(
            Box::new(SquaredExponential::new(1., &[1.]).unwrap()),
            data,
            None,
            None,
        )
        .unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        assert!(constant_liar_next_points(
            &gp,
            &domain,
            1,
            None,
            &NextPointsConfig::default(),
            &mut rng
        )
        .is_err());
    }
}
