//! Dense KKT reference solver: forms the full Newton system for the
//! multiple-shooting Lagrangian with equality constraints
//! `xs[k+1] - xnextₖ = 0` (in the tangent space, via `diff`). Used only as
//! a correctness oracle in tests — not on any hot path.

use crate::error::{OptimError, Result};
use crate::shooting::ShootingProblem;
use crate::solver::SolveStatus;
use nalgebra::{DMatrix, DVector};
use tracing::instrument;

pub struct KktSolver<'p> {
    problem: &'p ShootingProblem,
    th_stop: f64,
}

impl<'p> KktSolver<'p> {
    pub fn new(problem: &'p ShootingProblem, th_stop: f64) -> Self {
        KktSolver { problem, th_stop }
    }

    #[instrument(level = "info", skip_all)]
    pub fn solve(
        &self,
        xs_init: &[DVector<f64>],
        us_init: &[DVector<f64>],
        max_iter: usize,
    ) -> Result<(Vec<DVector<f64>>, Vec<DVector<f64>>, SolveStatus)> {
        let n = self.problem.horizon();
        let ndx = self.problem.state().ndx();
        let mut xs = xs_init.to_vec();
        let mut us = us_init.to_vec();

        for _ in 0..max_iter {
            let (_, knots) = self.problem.calc_diff(&xs, &us)?;
            let nus: Vec<usize> = (0..n).map(|k| knots[k].fu.ncols()).collect();
            let n_dx = n * ndx;
            let n_u: usize = nus.iter().sum();
            let n_lambda = n * ndx;
            let total = n_dx + n_u + n_lambda;

            let u_offset = |k: usize| n_dx + nus[..k].iter().sum::<usize>();
            let dx_offset = |i: usize| i * ndx; // dx_{i+1}, i in 0..n
            let lambda_offset = |k: usize| n_dx + n_u + k * ndx;

            let mut m = DMatrix::<f64>::zeros(total, total);
            let mut b = DVector::<f64>::zeros(total);

            for i in 0..n {
                let knot = &knots[i + 1];
                let row = dx_offset(i);
                m.view_mut((row, row), (ndx, ndx)).copy_from(&knot.lxx);
                if i + 1 <= n - 1 {
                    let nu = nus[i + 1];
                    m.view_mut((row, u_offset(i + 1)), (ndx, nu)).copy_from(&knot.lxu);
                    m.view_mut((row, lambda_offset(i + 1)), (ndx, ndx)).copy_from(&knot.fx.transpose());
                }
                m.view_mut((row, lambda_offset(i)), (ndx, ndx))
                    .copy_from(&(-DMatrix::<f64>::identity(ndx, ndx)));
                b.rows_mut(row, ndx).copy_from(&knot.lx);
            }

            for k in 0..n {
                let knot = &knots[k];
                let nu = nus[k];
                let row = u_offset(k);
                m.view_mut((row, row), (nu, nu)).copy_from(&knot.luu);
                if k >= 1 {
                    m.view_mut((row, dx_offset(k - 1)), (nu, ndx)).copy_from(&knot.lxu.transpose());
                }
                m.view_mut((row, lambda_offset(k)), (nu, ndx)).copy_from(&knot.fu.transpose());
                b.rows_mut(row, nu).copy_from(&knot.lu);
            }

            for k in 0..n {
                let knot = &knots[k];
                let nu = nus[k];
                let row = lambda_offset(k);
                if k >= 1 {
                    m.view_mut((row, dx_offset(k - 1)), (ndx, ndx)).copy_from(&knot.fx);
                }
                m.view_mut((row, u_offset(k)), (ndx, nu)).copy_from(&knot.fu);
                m.view_mut((row, dx_offset(k)), (ndx, ndx))
                    .copy_from(&(-DMatrix::<f64>::identity(ndx, ndx)));
                b.rows_mut(row, ndx).copy_from(&knot.gap);
            }

            let lu = m.lu();
            let z = lu
                .solve(&(-b))
                .ok_or_else(|| OptimError::External("KKT matrix is singular".to_string()))?;

            let state = self.problem.state();
            let mut xs_new = xs.clone();
            for i in 0..n {
                let dx = z.rows(dx_offset(i), ndx).into_owned();
                xs_new[i + 1] = state.integrate(&xs[i + 1], &dx);
            }
            let mut us_new = us.clone();
            for k in 0..n {
                let du = z.rows(u_offset(k), nus[k]).into_owned();
                us_new[k] = &us[k] + du;
            }

            let step_norm = z.norm();
            xs = xs_new;
            us = us_new;

            let (_, new_knots) = self.problem.calc(&xs, &us)?;
            let gap_inf = new_knots.iter().map(|k| k.gap.amax()).fold(0.0_f64, f64::max);

            if step_norm < self.th_stop && gap_inf < self.th_stop {
                return Ok((xs, us, SolveStatus::Converged));
            }
        }

        Ok((xs, us, SolveStatus::MaxIterReached))
    }
}
