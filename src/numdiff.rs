//! Finite-difference shims used only by tests: wrap a model (or residual)
//! so its `calcDiff` is replaced by numerical differentiation of `calc`,
//! with perturbations applied in the tangent space of the relevant state.

use crate::action::{ActionDiffOutput, ActionModel};
use crate::residual::{Residual, ResidualJacobians};
use crate::state::State;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

/// Default perturbation size, per SPEC_FULL.md §4.10.
pub const DEFAULT_STEP: f64 = 1e-5;

fn unit(n: usize, i: usize) -> DVector<f64> {
    let mut e = DVector::zeros(n);
    e[i] = 1.0;
    e
}

/// Wraps an [`ActionModel`] so `calc_diff` is entirely finite-differenced.
/// Used as a correctness oracle for analytic DAM/IAM Jacobians (testable
/// property 4), never on the solver's hot path.
pub struct NumDiffActionModel<'m> {
    model: &'m dyn ActionModel,
    state: Arc<dyn State + Send + Sync>,
    h: f64,
}

impl<'m> NumDiffActionModel<'m> {
    pub fn new(model: &'m dyn ActionModel, state: Arc<dyn State + Send + Sync>) -> Self {
        NumDiffActionModel { model, state, h: DEFAULT_STEP }
    }

    pub fn with_step(mut self, h: f64) -> Self {
        self.h = h;
        self
    }

    fn grad_l(&self, x: &DVector<f64>, u: &DVector<f64>) -> (DVector<f64>, DVector<f64>) {
        let ndx = self.model.ndx();
        let nu = self.model.nu();
        let mut lx = DVector::zeros(ndx);
        for i in 0..ndx {
            let dx = unit(ndx, i) * self.h;
            let xp = self.state.integrate(x, &dx);
            let xm = self.state.integrate(x, &(-dx));
            let lp = self.model.calc(&xp, u).l;
            let lm = self.model.calc(&xm, u).l;
            lx[i] = (lp - lm) / (2.0 * self.h);
        }
        let mut lu = DVector::zeros(nu);
        for i in 0..nu {
            let e = unit(nu, i) * self.h;
            let lp = self.model.calc(x, &(u + &e)).l;
            let lm = self.model.calc(x, &(u - &e)).l;
            lu[i] = (lp - lm) / (2.0 * self.h);
        }
        (lx, lu)
    }

    pub fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> ActionDiffOutput {
        let ndx = self.model.ndx();
        let nu = self.model.nu();
        let baseline = self.model.calc(x, u);

        let mut fx = DMatrix::<f64>::zeros(ndx, ndx);
        for i in 0..ndx {
            let dx = unit(ndx, i) * self.h;
            let xp = self.state.integrate(x, &dx);
            let xm = self.state.integrate(x, &(-dx));
            let out_p = self.model.calc(&xp, u);
            let out_m = self.model.calc(&xm, u);
            let col = self.state.diff(&out_m.xnext, &out_p.xnext) / (2.0 * self.h);
            fx.view_mut((0, i), (ndx, 1)).copy_from(&col);
        }

        let mut fu = DMatrix::<f64>::zeros(ndx, nu);
        for i in 0..nu {
            let e = unit(nu, i) * self.h;
            let out_p = self.model.calc(x, &(u + &e));
            let out_m = self.model.calc(x, &(u - &e));
            let col = self.state.diff(&out_m.xnext, &out_p.xnext) / (2.0 * self.h);
            fu.view_mut((0, i), (ndx, 1)).copy_from(&col);
        }

        let (lx, lu) = self.grad_l(x, u);

        let mut lxx = DMatrix::<f64>::zeros(ndx, ndx);
        for j in 0..ndx {
            let dx = unit(ndx, j) * self.h;
            let xp = self.state.integrate(x, &dx);
            let xm = self.state.integrate(x, &(-dx));
            let (lx_p, _) = self.grad_l(&xp, u);
            let (lx_m, _) = self.grad_l(&xm, u);
            let col = (lx_p - lx_m) / (2.0 * self.h);
            lxx.view_mut((0, j), (ndx, 1)).copy_from(&col);
        }
        lxx = 0.5 * (&lxx + lxx.transpose());

        let mut luu = DMatrix::<f64>::zeros(nu, nu);
        for j in 0..nu {
            let e = unit(nu, j) * self.h;
            let (_, lu_p) = self.grad_l(x, &(u + &e));
            let (_, lu_m) = self.grad_l(x, &(u - &e));
            let col = (lu_p - lu_m) / (2.0 * self.h);
            luu.view_mut((0, j), (nu, 1)).copy_from(&col);
        }
        luu = 0.5 * (&luu + luu.transpose());

        let mut lxu = DMatrix::<f64>::zeros(ndx, nu);
        for j in 0..nu {
            let e = unit(nu, j) * self.h;
            let (lx_p, _) = self.grad_l(x, &(u + &e));
            let (lx_m, _) = self.grad_l(x, &(u - &e));
            let col = (lx_p - lx_m) / (2.0 * self.h);
            lxu.view_mut((0, j), (ndx, 1)).copy_from(&col);
        }

        ActionDiffOutput {
            xnext: baseline.xnext,
            fx,
            fu,
            l: baseline.l,
            lx,
            lu,
            lxx,
            lxu,
            luu,
        }
    }
}

/// Wraps a [`Residual`] so `Rx, Ru` are finite-differenced, used to
/// validate analytic residual Jacobians (testable property 3).
pub struct NumDiffResidual<'r, R: Residual> {
    residual: &'r R,
    h: f64,
}

impl<'r, R: Residual> NumDiffResidual<'r, R> {
    pub fn new(residual: &'r R) -> Self {
        NumDiffResidual { residual, h: DEFAULT_STEP }
    }

    pub fn with_step(mut self, h: f64) -> Self {
        self.h = h;
        self
    }

    pub fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> ResidualJacobians {
        let ndx = self.residual.ndx();
        let nu = self.residual.nu();
        let nr = self.residual.nr();

        let mut rx = DMatrix::<f64>::zeros(nr, ndx);
        for i in 0..ndx {
            let dx = unit(ndx, i) * self.h;
            // Residuals are evaluated on a flat perturbation of x here;
            // callers with a non-Euclidean state perturb before calling.
            let xp = x + &dx;
            let xm = x - &dx;
            let rp = self.residual.calc(&xp, u);
            let rm = self.residual.calc(&xm, u);
            let col = (rp - rm) / (2.0 * self.h);
            rx.view_mut((0, i), (nr, 1)).copy_from(&col);
        }

        let mut ru = DMatrix::<f64>::zeros(nr, nu);
        for i in 0..nu {
            let e = unit(nu, i) * self.h;
            let rp = self.residual.calc(x, &(u + &e));
            let rm = self.residual.calc(x, &(u - &e));
            let col = (rp - rm) / (2.0 * self.h);
            ru.view_mut((0, i), (nr, 1)).copy_from(&col);
        }

        ResidualJacobians { rx, ru }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::ControlRegularizationResidual;
    use crate::residual::Residual;
    use approx::assert_abs_diff_eq;

    #[test]
    fn numdiff_residual_matches_analytic_control_regularization() {
        let u_ref = DVector::from_vec(vec![1.0, -2.0]);
        let residual = ControlRegularizationResidual::new(u_ref, 4);
        let x = DVector::zeros(4);
        let u = DVector::from_vec(vec![0.5, 0.5]);

        let analytic = residual.calc_diff(&x, &u);
        let numeric = NumDiffResidual::new(&residual).calc_diff(&x, &u);
        assert_abs_diff_eq!(analytic.ru, numeric.ru, epsilon = 1e-6);
        assert_abs_diff_eq!(analytic.rx, numeric.rx, epsilon = 1e-6);
    }
}
