//! DDP/FDDP solver: Riccati-style backward pass with Tassa regularization,
//! forward pass with backtracking line search, FDDP gap handling.

use crate::error::{OptimError, Result};
use crate::shooting::{KnotDiffData, ShootingProblem};
use crate::solver::{IterationInfo, SolveStatus, SolverConfig};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, instrument, warn};

struct BackwardPassResult {
    ks: Vec<DVector<f64>>,
    ks_fb: Vec<DMatrix<f64>>,
    d1: f64,
    d2: f64,
    qu_inf: f64,
}

/// Feasibility-prone DDP. Holds no long-lived per-knot buffers beyond a
/// single backward pass's worth (reallocated each iteration); the shooting
/// problem itself owns the dynamics/cost workspaces (SPEC_FULL.md §5).
pub struct DdpSolver<'p> {
    problem: &'p ShootingProblem,
    config: SolverConfig,
    callback: Option<Box<dyn FnMut(&IterationInfo)>>,
}

impl<'p> DdpSolver<'p> {
    pub fn new(problem: &'p ShootingProblem, config: SolverConfig) -> Self {
        DdpSolver { problem, config, callback: None }
    }

    pub fn with_callback(mut self, callback: Box<dyn FnMut(&IterationInfo)>) -> Self {
        self.callback = Some(callback);
        self
    }

    fn backward_pass(&self, knots: &[KnotDiffData], mu: f64, is_feasible: bool) -> Result<BackwardPassResult> {
        let n = self.problem.horizon();
        let ndx = self.problem.state().ndx();
        let terminal = &knots[n];
        let mut vx = terminal.lx.clone();
        let mut vxx = terminal.lxx.clone();

        let mut ks = vec![DVector::<f64>::zeros(0); n];
        let mut ks_fb = vec![DMatrix::<f64>::zeros(0, 0); n];
        let mut d1 = 0.0;
        let mut d2 = 0.0;
        let mut qu_inf: f64 = 0.0;

        for k in (0..n).rev() {
            let knot = &knots[k];
            let gap = if is_feasible { DVector::zeros(ndx) } else { knot.gap.clone() };
            let vx_prime = &vx + &vxx * &gap;

            let qx = &knot.lx + knot.fx.transpose() * &vx_prime;
            let qu = &knot.lu + knot.fu.transpose() * &vx_prime;
            let qxx = &knot.lxx + knot.fx.transpose() * &vxx * &knot.fx;
            let quu = &knot.luu + knot.fu.transpose() * &vxx * &knot.fu;
            let qux = knot.lxu.transpose() + knot.fu.transpose() * &vxx * &knot.fx;

            if !qu.iter().all(|v| v.is_finite()) {
                return Err(OptimError::NonFinite { where_: "Qu" });
            }

            let nu = knot.fu.ncols();
            let quu_r = &quu + mu * (knot.fu.transpose() * &knot.fu);
            let qux_r = &qux + mu * (knot.fu.transpose() * &knot.fx);

            if !quu_r.iter().all(|v| v.is_finite()) {
                return Err(OptimError::NonFinite { where_: "Quu_r" });
            }

            let chol = quu_r.clone().cholesky().ok_or(OptimError::CholeskyFailed { mu })?;
            let k_ff = -chol.solve(&qu);
            let k_fb = -chol.solve(&qux_r);

            vx = &qx + k_fb.transpose() * &quu * &k_ff + k_fb.transpose() * &qu + qux.transpose() * &k_ff;
            vxx = &qxx + k_fb.transpose() * &quu * &k_fb + k_fb.transpose() * &qux + qux.transpose() * &k_fb;
            vxx = 0.5 * (&vxx + vxx.transpose());

            d1 -= k_ff.dot(&qu);
            d2 -= k_ff.dot(&(&quu * &k_ff));
            if nu > 0 {
                qu_inf = qu_inf.max(qu.amax());
            }

            ks[k] = k_ff;
            ks_fb[k] = k_fb;
        }

        Ok(BackwardPassResult { ks, ks_fb, d1, d2, qu_inf })
    }

    #[allow(clippy::too_many_arguments)]
    fn forward_pass(
        &self,
        xs: &[DVector<f64>],
        us: &[DVector<f64>],
        knots: &[KnotDiffData],
        bp: &BackwardPassResult,
        alpha: f64,
        is_feasible: bool,
    ) -> Result<(Vec<DVector<f64>>, Vec<DVector<f64>>, f64)> {
        let n = self.problem.horizon();
        let state = self.problem.state();
        let mut xs_new = xs.to_vec();
        let mut us_new = us.to_vec();
        let mut cost_new = 0.0;

        for k in 0..n {
            let dx = state.diff(&xs[k], &xs_new[k]);
            let u_new = &us[k] + alpha * &bp.ks[k] + &bp.ks_fb[k] * &dx;
            let out = self.problem.running_calc(k, &xs_new[k], &u_new);
            cost_new += out.l;

            let scaled_gap = if is_feasible {
                DVector::zeros(state.ndx())
            } else {
                (1.0 - alpha) * &knots[k].gap
            };
            xs_new[k + 1] = state.integrate(&out.xnext, &scaled_gap);
            us_new[k] = u_new;
        }
        let terminal_l = self.problem.terminal_calc(&xs_new[n]).l;
        cost_new += terminal_l;

        if !cost_new.is_finite() {
            return Err(OptimError::NonFinite { where_: "V_new" });
        }
        Ok((xs_new, us_new, cost_new))
    }

    /// `solve(xs_init, us_init, max_iter, is_feasible, reg_init) -> (xs, us, status)`.
    /// `is_feasible` hints that the warm start's gaps may be treated as
    /// zero, enabling the classic-DDP code path through the same machinery.
    #[instrument(level = "info", skip_all)]
    pub fn solve(
        &mut self,
        xs_init: &[DVector<f64>],
        us_init: &[DVector<f64>],
        max_iter: usize,
        is_feasible: bool,
        reg_init: f64,
    ) -> Result<(Vec<DVector<f64>>, Vec<DVector<f64>>, SolveStatus)> {
        let mut xs = xs_init.to_vec();
        let mut us = us_init.to_vec();
        let mut mu = reg_init;

        for iteration in 0..max_iter {
            let (cost, knots) = self.problem.calc_diff(&xs, &us)?;

            let bp = loop {
                match self.backward_pass(&knots, mu, is_feasible) {
                    Ok(result) => break result,
                    Err(OptimError::CholeskyFailed { .. }) => {
                        mu = (mu * self.config.mu_factor).min(self.config.mu_max);
                        if mu >= self.config.mu_max {
                            warn!(mu, "regularization exceeded mu_max during backward pass");
                            return Ok((xs, us, SolveStatus::Failed));
                        }
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            };

            let gap_inf = knots[..self.problem.horizon()]
                .iter()
                .map(|k| k.gap.amax())
                .fold(0.0_f64, f64::max);
            let grad_norm = bp.qu_inf.max(if is_feasible { 0.0 } else { gap_inf });

            if let Some(cb) = &mut self.callback {
                cb(&IterationInfo { iteration, cost, grad_norm, mu, alpha: 1.0 });
            }

            if grad_norm < self.config.th_stop {
                info!(iteration, cost, grad_norm, "converged");
                return Ok((xs, us, SolveStatus::Converged));
            }

            let mut accepted = false;
            let mut alpha = 1.0;
            while alpha >= self.config.alpha_min {
                let (xs_new, us_new, cost_new) = match self.forward_pass(&xs, &us, &knots, &bp, alpha, is_feasible) {
                    Ok(v) => v,
                    Err(_) => {
                        alpha *= 0.5;
                        continue;
                    }
                };
                let dv_exp = alpha * bp.d1 + 0.5 * alpha * alpha * bp.d2;
                let dv = cost - cost_new;
                let z = if dv_exp.abs() < 1e-12 { if dv >= -1e-12 { 1.0 } else { f64::NEG_INFINITY } } else { dv / dv_exp };

                if z >= self.config.change_lb && z <= self.config.change_ub {
                    debug!(alpha, cost_new, z, "step accepted");
                    xs = xs_new;
                    us = us_new;
                    accepted = true;
                    break;
                }
                alpha *= 0.5;
            }

            if accepted {
                mu = (mu / self.config.mu_factor).max(self.config.mu_min);
            } else {
                mu = (mu * self.config.mu_factor).min(self.config.mu_max);
                if mu >= self.config.mu_max {
                    warn!(mu, "regularization exceeded mu_max after line search failure");
                    return Ok((xs, us, SolveStatus::Failed));
                }
            }
        }

        Ok((xs, us, SolveStatus::MaxIterReached))
    }
}
