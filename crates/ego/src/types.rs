use crate::errors::{EgoError, Result};
use serde::{Deserialize, Serialize};

pub use bayesbox_doe::DoeKind as SamplerKind;

/// Variable type of a physical dimension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarType {
    /// Continuous variable in [lower bound, upper bound]
    Double,
    /// Integer variable in lower bound .. upper bound
    Int,
    /// A categorical variable in { value_1, ..., value_k }, no order assumed
    Categorical,
    /// An ordered variable in { value_1, ..., value_k }
    Quantized,
}

/// A physical dimension of a domain.
///
/// `elements` holds `[min, max]` for double and int variables, the list of
/// admissible values otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainComponent {
    pub var_type: VarType,
    pub elements: Vec<f64>,
}

impl DomainComponent {
    /// Continuous dimension in `[lo, hi]`
    pub fn double(lo: f64, hi: f64) -> Self {
        DomainComponent {
            var_type: VarType::Double,
            elements: vec![lo, hi],
        }
    }

    /// Integer dimension in `lo..=hi`
    pub fn int(lo: i64, hi: i64) -> Self {
        DomainComponent {
            var_type: VarType::Int,
            elements: vec![lo as f64, hi as f64],
        }
    }

    /// Categorical dimension taking one of `values`
    pub fn categorical(values: &[f64]) -> Self {
        DomainComponent {
            var_type: VarType::Categorical,
            elements: values.to_vec(),
        }
    }

    /// Quantized dimension taking one of `values`
    pub fn quantized(values: &[f64]) -> Self {
        DomainComponent {
            var_type: VarType::Quantized,
            elements: values.to_vec(),
        }
    }

    /// Checks component invariants
    pub fn validate(&self) -> Result<()> {
        if self.elements.iter().any(|v| !v.is_finite()) {
            return Err(EgoError::InvalidDomain(format!(
                "{:?} component has non finite elements {:?}",
                self.var_type, self.elements
            )));
        }
        match self.var_type {
            VarType::Double | VarType::Int => {
                if self.elements.len() != 2 || self.elements[0] >= self.elements[1] {
                    return Err(EgoError::InvalidDomain(format!(
                        "{:?} component expects [min, max] with min < max, got {:?}",
                        self.var_type, self.elements
                    )));
                }
                if self.var_type == VarType::Int && self.elements.iter().any(|v| v.fract() != 0.) {
                    return Err(EgoError::InvalidDomain(format!(
                        "int component bounds should be integral, got {:?}",
                        self.elements
                    )));
                }
            }
            VarType::Categorical | VarType::Quantized => {
                let mut sorted = self.elements.clone();
                sorted.sort_by(f64::total_cmp);
                sorted.dedup();
                if sorted.len() < 2 || sorted.len() != self.elements.len() {
                    return Err(EgoError::InvalidDomain(format!(
                        "{:?} component expects at least two distinct elements, got {:?}",
                        self.var_type, self.elements
                    )));
                }
            }
        }
        Ok(())
    }

    /// Smallest admissible value
    pub fn min(&self) -> f64 {
        self.elements.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    /// Largest admissible value
    pub fn max(&self) -> f64 {
        self.elements
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Number of admissible values, `None` for a continuous dimension
    pub fn cardinality(&self) -> Option<u64> {
        match self.var_type {
            VarType::Double => None,
            VarType::Int => Some((self.elements[1] - self.elements[0]) as u64 + 1),
            VarType::Categorical | VarType::Quantized => Some(self.elements.len() as u64),
        }
    }

    /// Whether `value` is admissible for this component up to `tol`
    pub fn contains(&self, value: f64, tol: f64) -> bool {
        match self.var_type {
            VarType::Double => value >= self.elements[0] - tol && value <= self.elements[1] + tol,
            VarType::Int => {
                (value - value.round()).abs() <= tol
                    && value >= self.elements[0] - tol
                    && value <= self.elements[1] + tol
            }
            VarType::Categorical | VarType::Quantized => {
                self.elements.iter().any(|e| (e - value).abs() <= tol)
            }
        }
    }
}

/// Linear inequality `sum_i weights_i * x_i <= rhs` over physical dimensions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearConstraint {
    pub weights: Vec<f64>,
    pub rhs: f64,
    /// Type of the dimensions involved in the constraint
    pub var_type: VarType,
}

impl LinearConstraint {
    pub fn new(weights: &[f64], rhs: f64, var_type: VarType) -> Self {
        LinearConstraint {
            weights: weights.to_vec(),
            rhs,
            var_type,
        }
    }

    /// Checks the constraint against the physical components
    pub fn validate(&self, components: &[DomainComponent]) -> Result<()> {
        if self.weights.len() != components.len() {
            return Err(EgoError::DimensionMismatch {
                expected: components.len(),
                actual: self.weights.len(),
            });
        }
        if !matches!(self.var_type, VarType::Double | VarType::Int) {
            return Err(EgoError::InvalidDomain(format!(
                "linear constraints apply to double or int dimensions, got {:?}",
                self.var_type
            )));
        }
        if !self.rhs.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(EgoError::InvalidDomain(
                "linear constraint with non finite terms".to_string(),
            ));
        }
        let mut terms = 0;
        for (i, (w, c)) in self.weights.iter().zip(components).enumerate() {
            if *w != 0. {
                if c.var_type != self.var_type {
                    return Err(EgoError::InvalidDomain(format!(
                        "{:?} constraint has nonzero weight on {:?} dimension {i}",
                        self.var_type, c.var_type
                    )));
                }
                terms += 1;
            }
        }
        if terms == 0 {
            return Err(EgoError::InvalidDomain(
                "linear constraint without any nonzero weight".to_string(),
            ));
        }
        Ok(())
    }
}

/// Location of a physical dimension in the one-hot representation.
///
/// `categories[k]` is the categorical value represented by `one_hot_indices[k]`,
/// empty for non categorical dimensions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OneHotMapping {
    pub one_hot_indices: Vec<usize>,
    pub categories: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_validation() {
        assert!(DomainComponent::double(0., 1.).validate().is_ok());
        assert!(DomainComponent::double(1., 1.).validate().is_err());
        assert!(DomainComponent::int(-2, 3).validate().is_ok());
        let bad_int = DomainComponent {
            var_type: VarType::Int,
            elements: vec![0., 2.5],
        };
        assert!(bad_int.validate().is_err());
        assert!(DomainComponent::categorical(&[0., 1., 2.]).validate().is_ok());
        assert!(DomainComponent::categorical(&[1., 1.]).validate().is_err());
        assert!(DomainComponent::quantized(&[0.5]).validate().is_err());
    }

    #[test]
    fn test_component_contains() {
        let q = DomainComponent::quantized(&[0.1, 0.5, 2.]);
        assert!(q.contains(0.5, 1e-9));
        assert!(!q.contains(0.3, 1e-9));
        let i = DomainComponent::int(0, 4);
        assert!(i.contains(3., 1e-9));
        assert!(!i.contains(3.5, 1e-9));
        assert!(!i.contains(5., 1e-9));
        assert_eq!(i.cardinality(), Some(5));
        assert_eq!(DomainComponent::double(0., 1.).cardinality(), None);
    }

    #[test]
    fn test_constraint_validation() {
        let comps = vec![
            DomainComponent::double(0., 1.),
            DomainComponent::int(0, 5),
            DomainComponent::categorical(&[0., 1.]),
        ];
        assert!(LinearConstraint::new(&[1., 0., 0.], 0.5, VarType::Double)
            .validate(&comps)
            .is_ok());
        assert!(LinearConstraint::new(&[1., 1., 0.], 0.5, VarType::Double)
            .validate(&comps)
            .is_err());
        assert!(LinearConstraint::new(&[0., 0., 1.], 0.5, VarType::Categorical)
            .validate(&comps)
            .is_err());
        assert!(LinearConstraint::new(&[0., 0., 0.], 0.5, VarType::Int)
            .validate(&comps)
            .is_err());
        assert!(LinearConstraint::new(&[1., 0.], 0.5, VarType::Double)
            .validate(&comps)
            .is_err());
    }
}
