//! The multiple-shooting problem: a sequence of running [`ActionModel`]s
//! plus a terminal one, an initial state, and the gap bookkeeping the
//! DDP/FDDP solver needs when a warm start is infeasible.

use crate::action::{ActionModel, ActionOutput};
use crate::error::{OptimError, Result};
use crate::state::State;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

/// Per-knot outputs from [`ShootingProblem::calc`].
pub struct KnotData {
    pub xnext: DVector<f64>,
    pub l: f64,
    /// `gₖ = diff(xs[k+1], xnextₖ)`; zero when the trajectory is feasible.
    pub gap: DVector<f64>,
}

/// Per-knot outputs from [`ShootingProblem::calc_diff`].
pub struct KnotDiffData {
    pub xnext: DVector<f64>,
    pub fx: DMatrix<f64>,
    pub fu: DMatrix<f64>,
    pub l: f64,
    pub lx: DVector<f64>,
    pub lu: DVector<f64>,
    pub lxx: DMatrix<f64>,
    pub lxu: DMatrix<f64>,
    pub luu: DMatrix<f64>,
    pub gap: DVector<f64>,
}

pub struct ShootingProblem {
    state: Arc<dyn State + Send + Sync>,
    x0: DVector<f64>,
    running: Vec<Box<dyn ActionModel>>,
    terminal: Box<dyn ActionModel>,
}

impl ShootingProblem {
    pub fn new(
        state: Arc<dyn State + Send + Sync>,
        x0: DVector<f64>,
        running: Vec<Box<dyn ActionModel>>,
        terminal: Box<dyn ActionModel>,
    ) -> Result<Self> {
        if x0.len() != state.nx() {
            return Err(OptimError::DimensionMismatch { expected: state.nx(), found: x0.len() });
        }
        Ok(ShootingProblem { state, x0, running, terminal })
    }

    pub fn horizon(&self) -> usize {
        self.running.len()
    }

    pub fn x0(&self) -> &DVector<f64> {
        &self.x0
    }

    pub fn state(&self) -> &Arc<dyn State + Send + Sync> {
        &self.state
    }

    fn check_trajectories(&self, xs: &[DVector<f64>], us: &[DVector<f64>]) -> Result<()> {
        let n = self.horizon();
        if xs.len() != n + 1 {
            return Err(OptimError::StateTrajectoryLength { expected: n + 1, found: xs.len() });
        }
        if us.len() != n {
            return Err(OptimError::ControlTrajectoryLength { expected: n, found: us.len() });
        }
        Ok(())
    }

    /// `Σ lₖ`, plus each running knot's `xnext` and multiple-shooting gap.
    pub fn calc(&self, xs: &[DVector<f64>], us: &[DVector<f64>]) -> Result<(f64, Vec<KnotData>)> {
        self.check_trajectories(xs, us)?;
        let mut total = 0.0;
        let mut knots = Vec::with_capacity(self.horizon());
        for k in 0..self.horizon() {
            let out = self.running[k].calc(&xs[k], &us[k]);
            let gap = self.state.diff(&xs[k + 1], &out.xnext);
            total += out.l;
            knots.push(KnotData { xnext: out.xnext, l: out.l, gap });
        }
        let terminal_out = self.terminal.calc(&xs[self.horizon()], &DVector::zeros(0));
        total += terminal_out.l;
        Ok((total, knots))
    }

    /// Same as [`Self::calc`] plus derivatives at every knot, including the
    /// terminal one (appended as the last entry, `nu = 0`).
    pub fn calc_diff(&self, xs: &[DVector<f64>], us: &[DVector<f64>]) -> Result<(f64, Vec<KnotDiffData>)> {
        self.check_trajectories(xs, us)?;
        let mut total = 0.0;
        let mut knots = Vec::with_capacity(self.horizon() + 1);
        for k in 0..self.horizon() {
            let d = self.running[k].calc_diff(&xs[k], &us[k]);
            let gap = self.state.diff(&xs[k + 1], &d.xnext);
            total += d.l;
            knots.push(KnotDiffData {
                xnext: d.xnext,
                fx: d.fx,
                fu: d.fu,
                l: d.l,
                lx: d.lx,
                lu: d.lu,
                lxx: d.lxx,
                lxu: d.lxu,
                luu: d.luu,
                gap,
            });
        }
        let td = self.terminal.calc_diff(&xs[self.horizon()], &DVector::zeros(0));
        total += td.l;
        knots.push(KnotDiffData {
            xnext: td.xnext,
            fx: td.fx,
            fu: td.fu,
            l: td.l,
            lx: td.lx,
            lu: td.lu,
            lxx: td.lxx,
            lxu: td.lxu,
            luu: td.luu,
            gap: DVector::zeros(self.state.ndx()),
        });
        Ok((total, knots))
    }

    /// Per-model hint for an initial control at knot `k`.
    pub fn quasi_static(&self, k: usize, x: &DVector<f64>) -> DVector<f64> {
        self.running[k].quasi_static(x)
    }

    /// Evaluates the running model at knot `k` alone, used by the solver's
    /// forward pass to avoid recomputing derivatives it already has.
    pub fn running_calc(&self, k: usize, x: &DVector<f64>, u: &DVector<f64>) -> ActionOutput {
        self.running[k].calc(x, u)
    }

    /// Evaluates the terminal model alone.
    pub fn terminal_calc(&self, x: &DVector<f64>) -> ActionOutput {
        self.terminal.calc(x, &DVector::zeros(0))
    }
}
