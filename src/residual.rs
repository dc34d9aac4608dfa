//! Residual-based costs: a residual `r(x,u)` with Jacobians `Rx, Ru`,
//! composed with an [`Activation`] into a Gauss-Newton cost.

use crate::activation::Activation;
use nalgebra::{DMatrix, DVector};

/// Output of a residual's `calcDiff`.
pub struct ResidualJacobians {
    pub rx: DMatrix<f64>,
    pub ru: DMatrix<f64>,
}

/// A residual `r(x,u) in R^nr`. Implementors own no state beyond their
/// reference targets; any dynamics-library query they need must already
/// have been refreshed by the host's `forward_kinematics` call (kinematic
/// freshness policy, SPEC_FULL.md §4.3) before `calc`/`calc_diff` run.
pub trait Residual {
    fn nr(&self) -> usize;
    fn ndx(&self) -> usize;
    fn nu(&self) -> usize;

    fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64>;
    fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> ResidualJacobians;
}

/// Gauss-Newton terms produced by composing a [`Residual`] with an
/// [`Activation`].
pub struct CostTerms {
    pub l: f64,
    pub lx: DVector<f64>,
    pub lu: DVector<f64>,
    pub lxx: DMatrix<f64>,
    pub lxu: DMatrix<f64>,
    pub luu: DMatrix<f64>,
}

/// Bundles a residual with the activation applied to it; this is what a
/// named entry in the [`crate::cost::CostSum`] actually stores.
pub struct ResidualCost<R: Residual, A: Activation> {
    pub residual: R,
    pub activation: A,
}

impl<R: Residual, A: Activation> ResidualCost<R, A> {
    pub fn new(residual: R, activation: A) -> Self {
        debug_assert_eq!(residual.nr(), activation.nr());
        ResidualCost { residual, activation }
    }

    pub fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> f64 {
        self.activation.calc(&self.residual.calc(x, u))
    }

    /// `l, Lx, Lu, Lxx, Lxu, Luu` via the Gauss-Newton approximation
    /// (`Rᵀ arr R`, dropping `∂²r/∂x²`).
    pub fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> (CostTerms, DVector<f64>, ResidualJacobians) {
        let r = self.residual.calc(x, u);
        let jac = self.residual.calc_diff(x, u);
        let (ar, arr) = self.activation.calc_diff(&r);
        let l = self.activation.calc(&r);
        let lx = jac.rx.transpose() * &ar;
        let lu = jac.ru.transpose() * &ar;
        let lxx = jac.rx.transpose() * &arr * &jac.rx;
        let lxu = jac.rx.transpose() * &arr * &jac.ru;
        let luu = jac.ru.transpose() * &arr * &jac.ru;
        (
            CostTerms { l, lx, lu, lxx, lxu, luu },
            r,
            jac,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::WeightedQuadraticActivation;
    use approx::assert_abs_diff_eq;

    struct LinearResidual {
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        target: DVector<f64>,
    }

    impl Residual for LinearResidual {
        fn nr(&self) -> usize {
            self.a.nrows()
        }
        fn ndx(&self) -> usize {
            self.a.ncols()
        }
        fn nu(&self) -> usize {
            self.b.ncols()
        }
        fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
            &self.a * x + &self.b * u - &self.target
        }
        fn calc_diff(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> ResidualJacobians {
            ResidualJacobians {
                rx: self.a.clone(),
                ru: self.b.clone(),
            }
        }
    }

    #[test]
    fn gauss_newton_matches_closed_form_for_linear_residual() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[1.0, 0.0]);
        let target = DVector::from_vec(vec![0.5, -0.5]);
        let residual = LinearResidual { a, b, target };
        let activation = WeightedQuadraticActivation::unit(2);
        let cost = ResidualCost::new(residual, activation);

        let x = DVector::from_vec(vec![0.5, -0.5]);
        let u = DVector::from_vec(vec![0.0]);
        assert_abs_diff_eq!(cost.calc(&x, &u), 0.0, epsilon = 1e-12);

        let (terms, r, jac) = cost.calc_diff(&x, &u);
        assert_abs_diff_eq!(r.norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(terms.lx.norm(), 0.0, epsilon = 1e-12);
        assert_eq!(jac.rx.nrows(), 2);
    }
}
