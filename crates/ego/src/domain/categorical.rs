use super::{ContinuousDomain, DOMAIN_TOLERANCE};
use crate::errors::{EgoError, Result};
use crate::geometry::{compute_distance_matrix_squared, Halfspaces};
use crate::types::{DomainComponent, LinearConstraint, OneHotMapping, SamplerKind, VarType};

use log::{debug, warn};
use ndarray::{s, Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::seq::SliceRandom;
use ndarray_rand::rand::Rng;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

/// Constrained integer coordinates count up to which every floor/ceil
/// combination is tried when snapping
pub const MAX_INT_GRID_DIMS: usize = 6;
/// Number of random floor/ceil combinations tried above [MAX_INT_GRID_DIMS]
pub const NUM_RANDOM_INT_NEIGHBORS: usize = 64;
/// Largest fully discrete domain that may be enumerated
pub const MAX_ENUMERATION_SIZE: u64 = 10_000;
/// Number of sampling batches before giving up on a point request
const MAX_SAMPLING_ROUNDS: usize = 20;
/// Temperatures under this value select the arg-max category
const ARGMAX_TEMPERATURE: f64 = 1e-6;

/// Choice of the category from the relaxed one-hot coordinates of a group
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CategoricalSnapping {
    /// Category with the largest coordinate
    #[default]
    ArgMax,
    /// Category drawn with probability proportional to `value^(1/temperature)`
    Temperature(f64),
}

/// Mixed-type domain and its continuous one-hot relaxation.
///
/// Double, int and quantized dimensions take one one-hot coordinate bounded
/// by their extreme values, a categorical dimension with k values takes k
/// coordinates in `[0, 1]`. Linear constraints are translated to half-spaces
/// of the one-hot domain.
#[derive(Clone, Debug)]
pub struct CategoricalDomain {
    components: Vec<DomainComponent>,
    constraints: Vec<LinearConstraint>,
    mappings: Vec<OneHotMapping>,
    one_hot_domain: ContinuousDomain,
    constrained_ints: Vec<usize>,
}

impl CategoricalDomain {
    pub fn new(components: Vec<DomainComponent>, constraints: Vec<LinearConstraint>) -> Result<Self> {
        if components.is_empty() {
            return Err(EgoError::InvalidDomain(
                "a domain needs at least one component".to_string(),
            ));
        }
        for c in components.iter() {
            c.validate()?;
        }
        for c in constraints.iter() {
            c.validate(&components)?;
        }

        let mut mappings = Vec::with_capacity(components.len());
        let mut limits = vec![];
        for c in components.iter() {
            let start = limits.len();
            match c.var_type {
                VarType::Categorical => {
                    limits.extend(c.elements.iter().map(|_| [0., 1.]));
                    mappings.push(OneHotMapping {
                        one_hot_indices: (start..start + c.elements.len()).collect(),
                        categories: c.elements.clone(),
                    });
                }
                _ => {
                    limits.push([c.min(), c.max()]);
                    mappings.push(OneHotMapping {
                        one_hot_indices: vec![start],
                        categories: vec![],
                    });
                }
            }
        }
        let xlimits = Array2::from(limits);
        let mut one_hot_domain = ContinuousDomain::new(&xlimits)?;
        if !constraints.is_empty() {
            let mut a = Array2::zeros((constraints.len(), xlimits.nrows()));
            let mut b = Array1::zeros(constraints.len());
            for (k, c) in constraints.iter().enumerate() {
                for (w, m) in c.weights.iter().zip(mappings.iter()) {
                    a[[k, m.one_hot_indices[0]]] = *w;
                }
                b[k] = c.rhs;
            }
            one_hot_domain = one_hot_domain.with_constraints(Halfspaces::new(a, b)?)?;
        }

        let constrained_ints = (0..components.len())
            .filter(|&i| {
                components[i].var_type == VarType::Int
                    && constraints.iter().any(|c| c.weights[i] != 0.)
            })
            .collect();

        Ok(CategoricalDomain {
            components,
            constraints,
            mappings,
            one_hot_domain,
            constrained_ints,
        })
    }

    /// Selects the quasi-random generator of the one-hot domain
    pub fn with_sampler(mut self, sampler: SamplerKind) -> Self {
        self.one_hot_domain = self.one_hot_domain.with_sampler(sampler);
        self
    }

    /// Number of physical dimensions
    pub fn dim(&self) -> usize {
        self.components.len()
    }

    /// Number of one-hot coordinates
    pub fn one_hot_dim(&self) -> usize {
        self.one_hot_domain.dim()
    }

    pub fn components(&self) -> &[DomainComponent] {
        &self.components
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn one_hot_mappings(&self) -> &[OneHotMapping] {
        &self.mappings
    }

    pub fn one_hot_domain(&self) -> &ContinuousDomain {
        &self.one_hot_domain
    }

    pub fn is_constrained(&self) -> bool {
        !self.constraints.is_empty()
    }

    pub fn has_categorical(&self) -> bool {
        self.components
            .iter()
            .any(|c| c.var_type == VarType::Categorical)
    }

    fn check_physical_dim(&self, actual: usize) -> Result<()> {
        if actual != self.dim() {
            return Err(EgoError::DimensionMismatch {
                expected: self.dim(),
                actual,
            });
        }
        Ok(())
    }

    fn check_one_hot_dim(&self, actual: usize) -> Result<()> {
        if actual != self.one_hot_dim() {
            return Err(EgoError::DimensionMismatch {
                expected: self.one_hot_dim(),
                actual,
            });
        }
        Ok(())
    }

    /// Physical points (n, dim) to one-hot points (n, one_hot_dim)
    pub fn map_to_one_hot(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array2<f64>> {
        self.check_physical_dim(x.ncols())?;
        let mut one_hot = Array2::zeros((x.nrows(), self.one_hot_dim()));
        for (mut oh, row) in one_hot.rows_mut().into_iter().zip(x.rows()) {
            for (i, m) in self.mappings.iter().enumerate() {
                match self.components[i].var_type {
                    VarType::Categorical => {
                        let k = closest_index(&m.categories, row[i]);
                        oh[m.one_hot_indices[k]] = 1.;
                    }
                    _ => oh[m.one_hot_indices[0]] = row[i],
                }
            }
        }
        Ok(one_hot)
    }

    /// One-hot points back to physical points: ints are rounded, quantized
    /// values snapped to the closest element and categories chosen with `snapping`
    pub fn map_from_one_hot<R: Rng>(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        snapping: CategoricalSnapping,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        self.check_one_hot_dim(x.ncols())?;
        let mut physical = Array2::zeros((x.nrows(), self.dim()));
        for (mut ph, row) in physical.rows_mut().into_iter().zip(x.rows()) {
            for (i, (m, c)) in self.mappings.iter().zip(self.components.iter()).enumerate() {
                let v = row[m.one_hot_indices[0]];
                ph[i] = match c.var_type {
                    VarType::Double => v.clamp(c.elements[0], c.elements[1]),
                    VarType::Int => v.round().clamp(c.elements[0], c.elements[1]),
                    VarType::Quantized => c.elements[closest_index(&c.elements, v)],
                    VarType::Categorical => {
                        let group = Array1::from_iter(m.one_hot_indices.iter().map(|&j| row[j]));
                        m.categories[choose_category(&group, snapping, rng)]
                    }
                };
            }
        }
        Ok(physical)
    }

    /// Snaps one-hot points to admissible one-hot values without leaving the
    /// one-hot space: ints rounded, quantized values to the closest element,
    /// categorical groups to the vertex of their largest coordinate
    pub fn snap_one_hot_points(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        let mut snapped = self.snap_non_integers(x);
        for (m, c) in self.mappings.iter().zip(self.components.iter()) {
            if c.var_type == VarType::Int {
                let j = m.one_hot_indices[0];
                snapped
                    .column_mut(j)
                    .mapv_inplace(|v| v.round().clamp(c.elements[0], c.elements[1]));
            }
        }
        snapped
    }

    fn snap_non_integers(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        let mut snapped = x.to_owned();
        for mut row in snapped.rows_mut() {
            for (m, c) in self.mappings.iter().zip(self.components.iter()) {
                match c.var_type {
                    VarType::Quantized => {
                        let j = m.one_hot_indices[0];
                        row[j] = c.elements[closest_index(&c.elements, row[j])];
                    }
                    VarType::Categorical => {
                        let group = Array1::from_iter(m.one_hot_indices.iter().map(|&j| row[j]));
                        let k = group.argmax().unwrap_or(0);
                        for (l, &j) in m.one_hot_indices.iter().enumerate() {
                            row[j] = if l == k { 1. } else { 0. };
                        }
                    }
                    _ => (),
                }
            }
        }
        snapped
    }

    /// Snaps one-hot points to acceptable one-hot points.
    ///
    /// Constrained integer coordinates are snapped to the closest feasible
    /// floor/ceil neighbor. A point without any feasible neighbor is dropped
    /// and replaced, in processing order, by a surplus feasible neighbor of
    /// another point of the batch when one remains, so fewer rows than
    /// requested may be returned.
    pub fn snap_feasible_one_hot_points<R: Rng>(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        rng: &mut R,
    ) -> Array2<f64> {
        let mut snapped = self.snap_non_integers(x);
        let constrained: Vec<usize> = self
            .constrained_ints
            .iter()
            .map(|&i| self.mappings[i].one_hot_indices[0])
            .collect();
        for (i, (m, c)) in self.mappings.iter().zip(self.components.iter()).enumerate() {
            if c.var_type == VarType::Int && !self.constrained_ints.contains(&i) {
                let j = m.one_hot_indices[0];
                snapped.column_mut(j).mapv_inplace(|v| v.round());
            }
        }
        if constrained.is_empty() {
            return snapped;
        }

        let mut chosen: Vec<Option<Array1<f64>>> = Vec::with_capacity(snapped.nrows());
        let mut surplus: Vec<Array1<f64>> = vec![];
        for row in snapped.rows() {
            let mut feasible: Vec<(f64, Array1<f64>)> = self
                .integer_neighbors(&row, &constrained, rng)
                .into_iter()
                .filter(|p| self.one_hot_domain.check_point_acceptable(p))
                .map(|p| {
                    let d = (&p - &row).mapv(|v| v * v).sum();
                    (d, p)
                })
                .collect();
            feasible.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut feasible = feasible.into_iter().map(|(_, p)| p);
            chosen.push(feasible.next());
            surplus.extend(feasible);
        }

        let mut surplus = surplus.into_iter();
        let dropped = chosen.iter().filter(|s| s.is_none()).count();
        if dropped > 0 {
            debug!("{dropped} points without feasible integer neighbor, backfill from surplus");
        }
        for k in 0..chosen.len() {
            if chosen[k].is_some() {
                continue;
            }
            let backfill = surplus.by_ref().find(|p| {
                chosen
                    .iter()
                    .all(|c| c.as_ref().map_or(true, |c| c != p))
            });
            chosen[k] = backfill;
        }

        let rows: Vec<Array1<f64>> = chosen.into_iter().flatten().collect();
        let mut result = Array2::zeros((rows.len(), self.one_hot_dim()));
        for (mut r, p) in result.rows_mut().into_iter().zip(rows.iter()) {
            r.assign(p);
        }
        result
    }

    /// Floor/ceil combinations of the constrained integer coordinates of `row`
    fn integer_neighbors<R: Rng>(
        &self,
        row: &ArrayView1<f64>,
        constrained: &[usize],
        rng: &mut R,
    ) -> Vec<Array1<f64>> {
        let bounds: Vec<(f64, f64)> = constrained
            .iter()
            .map(|&j| {
                let limits = self.one_hot_domain.xlimits().row(j);
                let v = row[j].clamp(limits[0], limits[1]);
                (v.floor().max(limits[0]), v.ceil().min(limits[1]))
            })
            .collect();
        let masks: Vec<Vec<bool>> = if constrained.len() <= MAX_INT_GRID_DIMS {
            (0..1usize << constrained.len())
                .map(|bits| (0..constrained.len()).map(|k| bits >> k & 1 == 1).collect())
                .collect()
        } else {
            (0..NUM_RANDOM_INT_NEIGHBORS)
                .map(|_| (0..constrained.len()).map(|_| rng.gen::<bool>()).collect())
                .collect()
        };
        let mut neighbors: Vec<Array1<f64>> = vec![];
        for mask in masks {
            let mut p = row.to_owned();
            for ((&j, &(lo, hi)), &up) in constrained.iter().zip(bounds.iter()).zip(mask.iter()) {
                p[j] = if up { hi } else { lo };
            }
            if !neighbors.contains(&p) {
                neighbors.push(p);
            }
        }
        neighbors
    }

    /// Whether the physical point `x` is admissible
    pub fn check_point_acceptable(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> bool {
        x.len() == self.dim()
            && self
                .components
                .iter()
                .zip(x.iter())
                .all(|(c, v)| c.contains(*v, DOMAIN_TOLERANCE))
            && self.constraints.iter().all(|c| {
                let lhs: f64 = c.weights.iter().zip(x.iter()).map(|(w, v)| w * v).sum();
                lhs <= c.rhs + DOMAIN_TOLERANCE
            })
    }

    pub fn check_points_acceptable(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Vec<bool> {
        x.rows()
            .into_iter()
            .map(|row| self.check_point_acceptable(&row))
            .collect()
    }

    /// `n` acceptable physical points from the one-hot domain generator
    pub fn generate_quasi_random_points<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Array2<f64>> {
        let mut points: Vec<Array1<f64>> = Vec::with_capacity(n);
        for _ in 0..MAX_SAMPLING_ROUNDS {
            if points.len() >= n {
                break;
            }
            let need = n - points.len();
            let one_hot = self.one_hot_domain.generate_quasi_random_points(need, rng)?;
            let snapped = self.snap_feasible_one_hot_points(&one_hot, rng);
            let physical = self.map_from_one_hot(&snapped, CategoricalSnapping::ArgMax, rng)?;
            points.extend(physical.rows().into_iter().take(need).map(|r| r.to_owned()));
        }
        if points.len() < n {
            return Err(EgoError::SamplingError(format!(
                "only {} feasible points out of {n} after {MAX_SAMPLING_ROUNDS} rounds",
                points.len()
            )));
        }
        Ok(rows_to_array(&points, self.dim()))
    }

    /// Points of `x` in the unit hypercube where ordinal positions are scaled
    /// by span and categorical values by category count
    fn to_ordinal(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        let mut scaled = Array2::zeros(x.raw_dim());
        for (mut s, row) in scaled.rows_mut().into_iter().zip(x.rows()) {
            for (i, c) in self.components.iter().enumerate() {
                s[i] = match c.var_type {
                    VarType::Categorical => {
                        closest_index(&c.elements, row[i]) as f64 / c.elements.len() as f64
                    }
                    _ => (row[i] - c.min()) / (c.max() - c.min()),
                };
            }
        }
        scaled
    }

    /// Uniqueness of each physical point of `points` against `compare_against`
    /// and against the previously kept points of `points`.
    ///
    /// A point is unique when its scaled distance to every compared point
    /// exceeds `tolerance * sqrt(dim)`.
    pub fn find_unique_points(
        &self,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        compare_against: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        tolerance: f64,
    ) -> Vec<bool> {
        let threshold = tolerance * (self.dim() as f64).sqrt();
        let threshold2 = threshold * threshold;
        let scaled = self.to_ordinal(points);
        let against = if compare_against.nrows() > 0 {
            compute_distance_matrix_squared(&scaled, &self.to_ordinal(compare_against))
        } else {
            Array2::zeros((scaled.nrows(), 0))
        };
        let mut kept: Vec<usize> = vec![];
        let mut unique = Vec::with_capacity(scaled.nrows());
        for i in 0..scaled.nrows() {
            let far_from_others = against.row(i).iter().all(|d| *d > threshold2);
            let far_from_kept = kept.iter().all(|&k| {
                let diff = &scaled.row(i) - &scaled.row(k);
                diff.dot(&diff) > threshold2
            });
            let is_unique = far_from_others && far_from_kept;
            if is_unique {
                kept.push(i);
            }
            unique.push(is_unique);
        }
        unique
    }

    /// Number of admissible points when every dimension is discrete
    pub fn discrete_cardinality(&self) -> Option<u64> {
        self.components
            .iter()
            .try_fold(1u64, |acc, c| c.cardinality().map(|k| acc.saturating_mul(k)))
    }

    /// Every acceptable physical point of a fully discrete domain of at most
    /// [MAX_ENUMERATION_SIZE] points
    pub fn enumerate_discrete_points(&self) -> Result<Array2<f64>> {
        match self.discrete_cardinality() {
            Some(k) if k <= MAX_ENUMERATION_SIZE => (),
            Some(k) => {
                return Err(EgoError::InvalidValue(format!(
                    "domain of {k} points is too large to enumerate"
                )))
            }
            None => {
                return Err(EgoError::InvalidValue(
                    "domain with continuous dimensions cannot be enumerated".to_string(),
                ))
            }
        }
        let values: Vec<Vec<f64>> = self
            .components
            .iter()
            .map(|c| match c.var_type {
                VarType::Int => {
                    let (lo, hi) = (c.elements[0] as i64, c.elements[1] as i64);
                    (lo..=hi).map(|v| v as f64).collect()
                }
                _ => c.elements.clone(),
            })
            .collect();
        let mut points = vec![];
        let mut odometer = vec![0usize; values.len()];
        'enumeration: loop {
            let p = Array1::from_iter(odometer.iter().zip(values.iter()).map(|(&k, v)| v[k]));
            if self.check_point_acceptable(&p) {
                points.push(p);
            }
            for (digit, v) in odometer.iter_mut().zip(values.iter()) {
                *digit += 1;
                if *digit < v.len() {
                    continue 'enumeration;
                }
                *digit = 0;
            }
            break;
        }
        Ok(rows_to_array(&points, self.dim()))
    }

    /// Up to `n` acceptable physical points unique against `excluded` and each
    /// other, see [CategoricalDomain::find_unique_points].
    ///
    /// Random sampling is tried first, a small fully discrete domain falls
    /// back to its enumeration. Fewer points are returned only when the
    /// enumeration proves they do not exist.
    pub fn generate_distinct_random_points<R: Rng>(
        &self,
        n: usize,
        excluded: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        tolerance: f64,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        self.check_physical_dim(excluded.ncols())?;
        let mut kept: Vec<Array1<f64>> = vec![];
        let compared = |kept: &[Array1<f64>]| -> Array2<f64> {
            let mut all = Array2::zeros((excluded.nrows() + kept.len(), self.dim()));
            all.slice_mut(s![..excluded.nrows(), ..]).assign(excluded);
            for (mut r, p) in all.rows_mut().into_iter().skip(excluded.nrows()).zip(kept) {
                r.assign(p);
            }
            all
        };
        for _ in 0..MAX_SAMPLING_ROUNDS {
            if kept.len() >= n {
                break;
            }
            let candidates = self.generate_quasi_random_points(n - kept.len(), rng)?;
            let flags = self.find_unique_points(&candidates, &compared(&kept), tolerance);
            kept.extend(
                candidates
                    .rows()
                    .into_iter()
                    .zip(flags)
                    .filter(|(_, unique)| *unique)
                    .map(|(row, _)| row.to_owned()),
            );
        }
        if kept.len() < n {
            match self.discrete_cardinality() {
                Some(k) if k <= MAX_ENUMERATION_SIZE => {
                    debug!("Random search found {} out of {n} points, enumerate {k} points", kept.len());
                    let all = self.enumerate_discrete_points()?;
                    let mut order: Vec<usize> = (0..all.nrows()).collect();
                    order.shuffle(rng);
                    let shuffled = all.select(Axis(0), &order);
                    let flags = self.find_unique_points(&shuffled, &compared(&kept), tolerance);
                    let missing = n - kept.len();
                    kept.extend(
                        shuffled
                            .rows()
                            .into_iter()
                            .zip(flags)
                            .filter(|(_, unique)| *unique)
                            .take(missing)
                            .map(|(row, _)| row.to_owned()),
                    );
                }
                _ => warn!("Random search found only {} out of {n} distinct points", kept.len()),
            }
        }
        Ok(rows_to_array(&kept, self.dim()))
    }

    /// One-hot points mapped to the unit hypercube with categorical groups
    /// snapped to their vertex, categorical choices are then maximally separated
    pub fn normalize_one_hot_for_search(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array2<f64>> {
        self.check_one_hot_dim(x.ncols())?;
        let mut normalized = x.to_owned();
        let xlimits = self.one_hot_domain.xlimits();
        for (m, c) in self.mappings.iter().zip(self.components.iter()) {
            if c.var_type == VarType::Categorical {
                continue;
            }
            let j = m.one_hot_indices[0];
            let (lo, hi) = (xlimits[[j, 0]], xlimits[[j, 1]]);
            normalized.column_mut(j).mapv_inplace(|v| (v - lo) / (hi - lo));
        }
        for mut row in normalized.rows_mut() {
            for (m, c) in self.mappings.iter().zip(self.components.iter()) {
                if c.var_type != VarType::Categorical {
                    continue;
                }
                let group = Array1::from_iter(m.one_hot_indices.iter().map(|&j| row[j]));
                let k = group.argmax().unwrap_or(0);
                for (l, &j) in m.one_hot_indices.iter().enumerate() {
                    row[j] = if l == k { 1. } else { 0. };
                }
            }
        }
        Ok(normalized)
    }
}

/// Index of the element of `values` closest to `v`
fn closest_index(values: &[f64], v: f64) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, dist), (k, e)| {
            let d = (e - v).abs();
            if d < dist {
                (k, d)
            } else {
                (best, dist)
            }
        })
        .0
}

/// Category index drawn from relaxed one-hot coordinates
fn choose_category<R: Rng>(group: &Array1<f64>, snapping: CategoricalSnapping, rng: &mut R) -> usize {
    let argmax = group.argmax().unwrap_or(0);
    let temperature = match snapping {
        CategoricalSnapping::Temperature(t) if t >= ARGMAX_TEMPERATURE => t,
        _ => return argmax,
    };
    let top = group[argmax];
    if !(top > 0.) {
        return rng.gen_range(0..group.len());
    }
    let weights = group.mapv(|v| (v.max(0.) / top).powf(1. / temperature));
    let total = weights.sum();
    let mut u = rng.gen::<f64>() * total;
    for (k, w) in weights.iter().enumerate() {
        if u < *w {
            return k;
        }
        u -= w;
    }
    argmax
}

fn rows_to_array(rows: &[Array1<f64>], dim: usize) -> Array2<f64> {
    let mut x = Array2::zeros((rows.len(), dim));
    for (mut r, p) in x.rows_mut().into_iter().zip(rows.iter()) {
        r.assign(p);
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn mixed() -> CategoricalDomain {
        CategoricalDomain::new(
            vec![
                DomainComponent::double(-1., 1.),
                DomainComponent::categorical(&[3., 7., 9.]),
                DomainComponent::int(0, 4),
                DomainComponent::quantized(&[0.1, 0.5, 2.]),
            ],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_one_hot_layout() {
        let domain = mixed();
        assert_eq!(domain.dim(), 4);
        assert_eq!(domain.one_hot_dim(), 6);
        assert_eq!(domain.one_hot_mappings()[1].one_hot_indices, vec![1, 2, 3]);
        assert_eq!(domain.one_hot_mappings()[2].one_hot_indices, vec![4]);
        assert_eq!(
            domain.one_hot_domain().xlimits(),
            &array![[-1., 1.], [0., 1.], [0., 1.], [0., 1.], [0., 4.], [0.1, 2.]]
        );
        assert!(domain.has_categorical());
        assert!(!domain.is_constrained());
    }

    #[test]
    fn test_one_hot_round_trip() {
        let domain = mixed();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let x = array![[0.25, 7., 3., 0.5], [-1., 9., 0., 2.]];
        let oh = domain.map_to_one_hot(&x).unwrap();
        assert_eq!(oh.row(0), array![0.25, 0., 1., 0., 3., 0.5]);
        let back = domain
            .map_from_one_hot(&oh, CategoricalSnapping::ArgMax, &mut rng)
            .unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn test_map_from_relaxed_one_hot() {
        let domain = mixed();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let oh = array![[0.3, 0.2, 0.1, 0.7, 2.6, 0.4]];
        let x = domain
            .map_from_one_hot(&oh, CategoricalSnapping::ArgMax, &mut rng)
            .unwrap();
        assert_eq!(x, array![[0.3, 9., 3., 0.5]]);
        let snapped = domain.snap_one_hot_points(&oh);
        assert_eq!(snapped, array![[0.3, 0., 0., 1., 3., 0.5]]);
        assert!(domain.map_to_one_hot(&array![[0., 3.]]).is_err());
    }

    #[test]
    fn test_temperature_snapping() {
        let domain = CategoricalDomain::new(vec![DomainComponent::categorical(&[0., 1.])], vec![])
            .unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let oh = Array2::from_shape_fn((2000, 2), |(_, j)| if j == 0 { 0.25 } else { 0.75 });
        let x = domain
            .map_from_one_hot(&oh, CategoricalSnapping::Temperature(1.), &mut rng)
            .unwrap();
        let ones = x.iter().filter(|v| **v == 1.).count() as f64 / 2000.;
        assert_abs_diff_eq!(ones, 0.75, epsilon = 0.05);
        let x = domain
            .map_from_one_hot(&oh, CategoricalSnapping::Temperature(0.), &mut rng)
            .unwrap();
        assert!(x.iter().all(|v| *v == 1.));
    }

    #[test]
    fn test_sampled_points_are_acceptable() {
        let domain = CategoricalDomain::new(
            vec![
                DomainComponent::double(0., 1.),
                DomainComponent::double(0., 1.),
                DomainComponent::int(0, 10),
                DomainComponent::int(0, 10),
                DomainComponent::categorical(&[0., 1., 2.]),
            ],
            vec![
                LinearConstraint::new(&[1., 1., 0., 0., 0.], 1., VarType::Double),
                LinearConstraint::new(&[0., 0., 1., 1., 0.], 7.5, VarType::Int),
                LinearConstraint::new(&[0., 0., -1., 2., 0.], 3.2, VarType::Int),
            ],
        )
        .unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        let x = domain.generate_quasi_random_points(50, &mut rng).unwrap();
        assert_eq!(x.nrows(), 50);
        assert!(domain.check_points_acceptable(&x).into_iter().all(|ok| ok));
    }

    #[test]
    fn test_integer_snapping_backfills_dropped_points() {
        // 2 x0 + 2 x1 <= 3 admits (0, 0), (1, 0) and (0, 1)
        let domain = CategoricalDomain::new(
            vec![DomainComponent::int(0, 3), DomainComponent::int(0, 3)],
            vec![LinearConstraint::new(&[2., 2.], 3., VarType::Int)],
        )
        .unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        // the second point has every floor/ceil neighbor infeasible
        let x = array![[0.4, 0.6], [1.4, 1.4]];
        let snapped = domain.snap_feasible_one_hot_points(&x, &mut rng);
        assert_eq!(snapped.nrows(), 2);
        assert_eq!(snapped.row(0), array![0., 1.]);
        assert!(snapped
            .rows()
            .into_iter()
            .all(|r| domain.check_point_acceptable(&r)));
        assert_ne!(snapped.row(0), snapped.row(1));
    }

    #[test]
    fn test_unique_points() {
        let domain = mixed();
        let existing = array![[0., 3., 2., 0.5]];
        let candidates = array![
            [0.001, 3., 2., 0.5],
            [0.001, 7., 2., 0.5],
            [0.0011, 7., 2., 0.5],
            [0.9, 9., 4., 2.]
        ];
        let unique = domain.find_unique_points(&candidates, &existing, 1e-2);
        assert_eq!(unique, vec![false, true, false, true]);
    }

    #[test]
    fn test_enumeration_and_distinct_points() {
        let domain = CategoricalDomain::new(
            vec![
                DomainComponent::int(0, 2),
                DomainComponent::categorical(&[0., 1.]),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(domain.discrete_cardinality(), Some(6));
        assert_eq!(domain.enumerate_discrete_points().unwrap().nrows(), 6);
        assert_eq!(mixed().discrete_cardinality(), None);
        assert!(mixed().enumerate_discrete_points().is_err());

        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        let excluded = array![[0., 0.], [1., 1.]];
        let x = domain
            .generate_distinct_random_points(10, &excluded, 1e-3, &mut rng)
            .unwrap();
        // only 4 points remain available
        assert_eq!(x.nrows(), 4);
        let unique = domain.find_unique_points(&x, &excluded, 1e-3);
        assert!(unique.into_iter().all(|u| u));
    }

    #[test]
    fn test_normalize_for_search() {
        let domain = mixed();
        let oh = array![[0., 0.2, 0.5, 0.3, 1., 2.]];
        let normalized = domain.normalize_one_hot_for_search(&oh).unwrap();
        assert_abs_diff_eq!(normalized, array![[0.5, 0., 1., 0., 0.25, 1.]], epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_domains() {
        assert!(CategoricalDomain::new(vec![], vec![]).is_err());
        assert!(CategoricalDomain::new(vec![DomainComponent::categorical(&[1.])], vec![]).is_err());
        let infeasible = CategoricalDomain::new(
            vec![DomainComponent::double(0., 1.)],
            vec![LinearConstraint::new(&[1.], -1., VarType::Double)],
        );
        assert!(matches!(infeasible, Err(EgoError::InfeasibleDomain(_))));
    }
}
