//! Cost aware acquisition over a task augmented domain.
//!
//! The last coordinate of evaluated points is the task, its value in `(0, 1]`
//! is the relative cost of evaluating the objective at that fidelity.
use crate::acquisition::{check_dim, AcquisitionFunction};
use crate::errors::{EgoError, Result};

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};

/// Acquisition value per unit of cost `af(x) / cost(x)`
#[derive(Clone, Debug)]
pub struct MultitaskAcquisitionFunction {
    af: Box<dyn AcquisitionFunction>,
}

impl MultitaskAcquisitionFunction {
    /// `af` evaluates points whose last coordinate is the task cost
    pub fn new(af: Box<dyn AcquisitionFunction>) -> Result<Self> {
        if af.dim() < 2 {
            return Err(EgoError::InvalidValue(format!(
                "multitask acquisition needs a task coordinate on top of the domain, got dimension {}",
                af.dim()
            )));
        }
        Ok(MultitaskAcquisitionFunction { af })
    }

    pub fn inner(&self) -> &dyn AcquisitionFunction {
        self.af.as_ref()
    }

    fn costs(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let costs = x.column(x.ncols() - 1).to_owned();
        if let Some(c) = costs.iter().find(|&&c| !(c > 0. && c <= 1.)) {
            return Err(EgoError::InvalidValue(format!(
                "task cost should lie in (0, 1], got {c}"
            )));
        }
        Ok(costs)
    }
}

impl AcquisitionFunction for MultitaskAcquisitionFunction {
    fn name(&self) -> &'static str {
        "Multitask"
    }

    fn dim(&self) -> usize {
        self.af.dim()
    }

    fn evaluate_at_points(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_dim(self.dim(), &x)?;
        let costs = self.costs(&x)?;
        Ok(self.af.evaluate_at_points(x)? / costs)
    }

    fn differentiable(&self) -> bool {
        self.af.differentiable()
    }

    fn evaluate_grad_at_points(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        check_dim(self.dim(), &x)?;
        let costs = self.costs(&x)?;
        let values = self.af.evaluate_at_points(x)?;
        let mut grad = self.af.evaluate_grad_at_points(x)? / &costs.view().insert_axis(Axis(1));
        let last = self.dim() - 1;
        Zip::from(grad.column_mut(last))
            .and(&values)
            .and(&costs)
            .for_each(|g, &v, &c| *g -= v / (c * c));
        Ok(grad)
    }
}
