//! `r = diff(x_ref, x)`.

use crate::residual::{Residual, ResidualJacobians};
use crate::state::{State, Wrt};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

pub struct StateRegularizationResidual {
    state: Arc<dyn State + Send + Sync>,
    x_ref: DVector<f64>,
    nu: usize,
}

impl StateRegularizationResidual {
    pub fn new(state: Arc<dyn State + Send + Sync>, x_ref: DVector<f64>, nu: usize) -> Self {
        debug_assert_eq!(x_ref.len(), state.nx());
        StateRegularizationResidual { state, x_ref, nu }
    }
}

impl Residual for StateRegularizationResidual {
    fn nr(&self) -> usize {
        self.state.ndx()
    }

    fn ndx(&self) -> usize {
        self.state.ndx()
    }

    fn nu(&self) -> usize {
        self.nu
    }

    fn calc(&self, x: &DVector<f64>, _u: &DVector<f64>) -> DVector<f64> {
        self.state.diff(&self.x_ref, x)
    }

    fn calc_diff(&self, x: &DVector<f64>, _u: &DVector<f64>) -> ResidualJacobians {
        let jac = self.state.jdiff(&self.x_ref, x, Wrt::Second);
        ResidualJacobians {
            rx: jac.d_second,
            ru: DMatrix::zeros(self.state.ndx(), self.nu),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::VectorSpaceState;
    use approx::assert_abs_diff_eq;

    #[test]
    fn residual_is_zero_at_reference() {
        let state: Arc<dyn State + Send + Sync> = Arc::new(VectorSpaceState::new(3));
        let x_ref = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let cost = StateRegularizationResidual::new(state, x_ref.clone(), 2);
        let r = cost.calc(&x_ref, &DVector::zeros(2));
        assert_abs_diff_eq!(r.norm(), 0.0, epsilon = 1e-12);
    }
}
