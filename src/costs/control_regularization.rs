//! `r = u - u_ref`.

use crate::residual::{Residual, ResidualJacobians};
use nalgebra::{DMatrix, DVector};

pub struct ControlRegularizationResidual {
    u_ref: DVector<f64>,
    ndx: usize,
}

impl ControlRegularizationResidual {
    pub fn new(u_ref: DVector<f64>, ndx: usize) -> Self {
        ControlRegularizationResidual { u_ref, ndx }
    }
}

impl Residual for ControlRegularizationResidual {
    fn nr(&self) -> usize {
        self.u_ref.len()
    }

    fn ndx(&self) -> usize {
        self.ndx
    }

    fn nu(&self) -> usize {
        self.u_ref.len()
    }

    fn calc(&self, _x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        u - &self.u_ref
    }

    fn calc_diff(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> ResidualJacobians {
        ResidualJacobians {
            rx: DMatrix::zeros(self.nr(), self.ndx),
            ru: DMatrix::identity(self.nr(), self.nr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn residual_is_zero_at_reference() {
        let u_ref = DVector::from_vec(vec![1.0, -1.0]);
        let cost = ControlRegularizationResidual::new(u_ref.clone(), 4);
        let r = cost.calc(&DVector::zeros(4), &u_ref);
        assert_abs_diff_eq!(r.norm(), 0.0, epsilon = 1e-12);
    }
}
