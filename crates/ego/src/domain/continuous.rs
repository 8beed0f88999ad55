use super::{OptimizationDomain, DOMAIN_TOLERANCE};
use crate::errors::{EgoError, Result};
use crate::geometry::{find_interior_point, Halfspaces, InteriorPoint};
use crate::types::SamplerKind;

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Data, Ix1, Ix2, Zip};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Acceptance ratio of rejection sampling under which a domain switches to hit-and-run
pub const REJECTION_SAMPLING_MIN_ACCEPTANCE: f64 = 0.1;
/// Number of hit-and-run steps discarded before the first sample
const HIT_AND_RUN_BURN_IN: usize = 20;
/// Number of hit-and-run steps between two returned samples
const HIT_AND_RUN_THINNING: usize = 3;
/// Extra fraction of the interpolation factor used to land strictly inside
const PROJECTION_NUDGE: f64 = 1e-10;

/// Box domain optionally restricted by linear constraints.
///
/// The Chebyshev center of the constrained polytope is computed once and
/// used as the feasible reference of projection and hit-and-run sampling.
/// Once rejection sampling shows an acceptance ratio under
/// [REJECTION_SAMPLING_MIN_ACCEPTANCE], the instance samples by hit-and-run
/// only, for the rest of its life.
#[derive(Debug)]
pub struct ContinuousDomain {
    xlimits: Array2<f64>,
    constraints: Option<Halfspaces>,
    halfspaces: Halfspaces,
    interior: InteriorPoint,
    sampler: SamplerKind,
    force_hit_and_run: AtomicBool,
}

impl Clone for ContinuousDomain {
    fn clone(&self) -> Self {
        ContinuousDomain {
            xlimits: self.xlimits.clone(),
            constraints: self.constraints.clone(),
            halfspaces: self.halfspaces.clone(),
            interior: self.interior.clone(),
            sampler: self.sampler,
            force_hit_and_run: AtomicBool::new(self.force_hit_and_run.load(Ordering::Relaxed)),
        }
    }
}

impl ContinuousDomain {
    /// Box domain, `xlimits` rows are `[lower, upper]` with `lower < upper`
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Self> {
        if xlimits.ncols() != 2 || xlimits.nrows() == 0 {
            return Err(EgoError::InvalidDomain(format!(
                "xlimits should be a non empty (dim, 2) array, got {:?}",
                xlimits.dim()
            )));
        }
        for (i, row) in xlimits.rows().into_iter().enumerate() {
            if !(row[0].is_finite() && row[1].is_finite() && row[0] < row[1]) {
                return Err(EgoError::InvalidDomain(format!(
                    "bounds of dimension {i} should be finite with lower < upper, got {row}"
                )));
            }
        }
        let xlimits = xlimits.to_owned();
        let center = (&xlimits.column(0) + &xlimits.column(1)) / 2.;
        let radius = (&xlimits.column(1) - &xlimits.column(0))
            .fold(f64::INFINITY, |a, &b| a.min(b / 2.));
        Ok(ContinuousDomain {
            halfspaces: Halfspaces::from_bounds(&xlimits),
            xlimits,
            constraints: None,
            interior: InteriorPoint {
                point: center,
                radius,
                feasible: true,
            },
            sampler: SamplerKind::default(),
            force_hit_and_run: AtomicBool::new(false),
        })
    }

    /// Restricts the box with `constraints` half-spaces, fails when the
    /// resulting polytope has no interior.
    pub fn with_constraints(mut self, constraints: Halfspaces) -> Result<Self> {
        if constraints.dim() != self.dim() {
            return Err(EgoError::DimensionMismatch {
                expected: self.dim(),
                actual: constraints.dim(),
            });
        }
        if constraints.is_empty() {
            return Ok(self);
        }
        let halfspaces = Halfspaces::from_bounds(&self.xlimits).stack(&constraints)?;
        let interior = find_interior_point(&halfspaces, &self.xlimits);
        if !interior.feasible {
            return Err(EgoError::InfeasibleDomain(format!(
                "no interior point found, best radius {:e}",
                interior.radius
            )));
        }
        self.constraints = Some(constraints);
        self.halfspaces = halfspaces;
        self.interior = interior;
        Ok(self)
    }

    /// Selects the quasi-random generator used on unconstrained domains
    pub fn with_sampler(mut self, sampler: SamplerKind) -> Self {
        self.sampler = sampler;
        self
    }

    /// Number of coordinates
    pub fn dim(&self) -> usize {
        self.xlimits.nrows()
    }

    /// (dim, 2) lower and upper bounds
    pub fn xlimits(&self) -> &Array2<f64> {
        &self.xlimits
    }

    /// Quasi-random generator used on unconstrained domains
    pub fn sampler(&self) -> SamplerKind {
        self.sampler
    }

    /// Whether linear constraints restrict the box
    pub fn is_constrained(&self) -> bool {
        self.constraints.is_some()
    }

    /// Linear constraints without the box rows
    pub fn constraints(&self) -> Option<&Halfspaces> {
        self.constraints.as_ref()
    }

    /// Box rows stacked with the linear constraints
    pub fn halfspaces(&self) -> &Halfspaces {
        &self.halfspaces
    }

    /// Chebyshev center, box center when unconstrained
    pub fn interior_point(&self) -> &Array1<f64> {
        &self.interior.point
    }

    /// Whether sampling goes through hit-and-run only
    pub fn is_hit_and_run_forced(&self) -> bool {
        self.force_hit_and_run.load(Ordering::Relaxed)
    }

    pub fn check_point_acceptable(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> bool {
        x.len() == self.dim() && self.halfspaces.contains(x, DOMAIN_TOLERANCE)
    }

    pub fn check_points_acceptable(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Vec<bool> {
        x.rows()
            .into_iter()
            .map(|row| self.check_point_acceptable(&row))
            .collect()
    }

    /// `n` uniform random points of the box, constraints ignored
    pub fn generate_random_points<R: Rng>(&self, n: usize, rng: &mut R) -> Array2<f64> {
        SamplerKind::Uniform.sample(&self.xlimits, n, rng)
    }

    /// `n` acceptable points: the selected generator when unconstrained,
    /// otherwise rejection sampling padded with hit-and-run
    pub fn generate_quasi_random_points<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Array2<f64>> {
        if n == 0 {
            return Ok(Array2::zeros((0, self.dim())));
        }
        if !self.is_constrained() {
            return Ok(self.sampler.sample(&self.xlimits, n, rng));
        }
        if self.is_hit_and_run_forced() {
            return self.hit_and_run(n, &self.interior.point, rng);
        }

        let candidates = self.sampler.sample(&self.xlimits, n, rng);
        let accepted: Vec<ArrayView1<f64>> = candidates
            .rows()
            .into_iter()
            .filter(|row| self.check_point_acceptable(row))
            .collect();
        let acceptance = accepted.len() as f64 / n as f64;
        debug!("Rejection sampling acceptance ratio {acceptance}");
        if acceptance < REJECTION_SAMPLING_MIN_ACCEPTANCE {
            info!(
                "Rejection sampling acceptance {acceptance} under {REJECTION_SAMPLING_MIN_ACCEPTANCE}, switch to hit-and-run"
            );
            self.force_hit_and_run.store(true, Ordering::Relaxed);
        }
        if accepted.len() == n {
            return Ok(candidates);
        }

        let start = accepted
            .last()
            .map(|row| row.to_owned())
            .unwrap_or_else(|| self.interior.point.clone());
        let padding = self.hit_and_run(n - accepted.len(), &start, rng)?;
        let mut points = Array2::zeros((n, self.dim()));
        for (mut row, src) in points
            .rows_mut()
            .into_iter()
            .zip(accepted.iter().cloned().chain(padding.rows()))
        {
            row.assign(&src);
        }
        Ok(points)
    }

    /// `n` points of a hit-and-run chain started at the acceptable `start` point
    pub fn hit_and_run<R: Rng>(
        &self,
        n: usize,
        start: &Array1<f64>,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        if !self.check_point_acceptable(start) {
            return Err(EgoError::InvalidValue(format!(
                "hit-and-run start point {start} is not in the domain"
            )));
        }
        let mut x = start.clone();
        let mut points = Array2::zeros((n, self.dim()));
        for _ in 0..HIT_AND_RUN_BURN_IN {
            self.hit_and_run_step(&mut x, rng);
        }
        for mut row in points.rows_mut() {
            for _ in 0..HIT_AND_RUN_THINNING {
                self.hit_and_run_step(&mut x, rng);
            }
            row.assign(&x);
        }
        Ok(points)
    }

    fn hit_and_run_step<R: Rng>(&self, x: &mut Array1<f64>, rng: &mut R) {
        let mut direction: Array1<f64> = Array1::random_using(self.dim(), StandardNormal, rng);
        let norm = direction.dot(&direction).sqrt();
        if norm == 0. {
            return;
        }
        direction /= norm;

        let slack = &self.halfspaces.b - &self.halfspaces.a.dot(&*x);
        let speed = self.halfspaces.a.dot(&direction);
        let (mut tmin, mut tmax) = (f64::NEG_INFINITY, f64::INFINITY);
        Zip::from(&slack).and(&speed).for_each(|&s, &v| {
            let s = s.max(0.);
            if v > 0. {
                tmax = tmax.min(s / v);
            } else if v < 0. {
                tmin = tmin.max(s / v);
            }
        });
        if !(tmin.is_finite() && tmax.is_finite()) || tmax - tmin <= f64::EPSILON {
            return;
        }
        let t = rng.gen_range(tmin..tmax);
        let candidate = &*x + &(direction * t);
        if self.check_point_acceptable(&candidate) {
            *x = candidate;
        }
    }

    /// Projects every row of `x` onto the domain moving toward the acceptable
    /// `reference`: box clamping first, then the largest interpolation factor
    /// among violated half-spaces so that all of them hold at once.
    pub fn restrict_points_to_domain(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        reference: &Array1<f64>,
    ) -> Array2<f64> {
        let mut restricted = x.to_owned();
        Zip::from(restricted.rows_mut()).for_each(|mut row| {
            Zip::from(&mut row)
                .and(self.xlimits.rows())
                .for_each(|v, limits| *v = v.clamp(limits[0], limits[1]));
        });
        let constraints = match &self.constraints {
            Some(c) => c,
            None => return restricted,
        };
        let aref = constraints.a.dot(reference);
        for mut row in restricted.rows_mut() {
            let ax = constraints.a.dot(&row);
            let factor = ax
                .iter()
                .zip(constraints.b.iter())
                .zip(aref.iter())
                .filter(|((ax, b), _)| *ax > *b)
                .map(|((ax, b), ar)| (ax - b) / (ax - ar))
                .fold(0., f64::max);
            if factor > 0. {
                let t = (factor + PROJECTION_NUDGE).min(1.);
                let moved = &row * (1. - t) + reference * t;
                row.assign(&moved);
            }
        }
        restricted
    }

    /// Projection toward the cached interior point
    pub fn restrict_points(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        self.restrict_points_to_domain(x, &self.interior.point)
    }
}

impl OptimizationDomain for ContinuousDomain {
    fn dim(&self) -> usize {
        ContinuousDomain::dim(self)
    }

    fn xlimits(&self) -> &Array2<f64> {
        ContinuousDomain::xlimits(self)
    }

    fn generate_quasi_random_points<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Array2<f64>> {
        ContinuousDomain::generate_quasi_random_points(self, n, rng)
    }

    fn restrict_points(&self, x: ArrayView2<f64>) -> Array2<f64> {
        ContinuousDomain::restrict_points(self, &x)
    }

    fn check_point_acceptable(&self, x: ArrayView1<f64>) -> bool {
        ContinuousDomain::check_point_acceptable(self, &x)
    }
}
