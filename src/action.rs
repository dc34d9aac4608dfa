//! The fixed capability set shared by every knot of a shooting problem:
//! integrated running models and the (dynamics-free) terminal model both
//! implement [`ActionModel`], so the shooting problem and solver can treat
//! a trajectory as a uniform sequence of `{calc, calcDiff, nu, nx, ndx}`.

use crate::cost::CostSum;
use crate::state::State;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

pub struct ActionOutput {
    pub xnext: DVector<f64>,
    pub l: f64,
}

pub struct ActionDiffOutput {
    pub xnext: DVector<f64>,
    pub fx: DMatrix<f64>,
    pub fu: DMatrix<f64>,
    pub l: f64,
    pub lx: DVector<f64>,
    pub lu: DVector<f64>,
    pub lxx: DMatrix<f64>,
    pub lxu: DMatrix<f64>,
    pub luu: DMatrix<f64>,
}

pub trait ActionModel {
    fn nx(&self) -> usize;
    fn ndx(&self) -> usize;
    fn nu(&self) -> usize;

    fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> ActionOutput;
    fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> ActionDiffOutput;

    /// Per-model hint for an initial control. Defaults to zero.
    fn quasi_static(&self, _x: &DVector<f64>) -> DVector<f64> {
        DVector::zeros(self.nu())
    }
}

/// A terminal knot: cost only, no dynamics. `xnext` is the identity and
/// `Fx = I`; `nu = 0` since there is no control to apply after the horizon.
pub struct TerminalActionModel {
    state: Arc<dyn State + Send + Sync>,
    cost: CostSum,
}

impl TerminalActionModel {
    pub fn new(state: Arc<dyn State + Send + Sync>, cost: CostSum) -> Self {
        TerminalActionModel { state, cost }
    }
}

impl ActionModel for TerminalActionModel {
    fn nx(&self) -> usize {
        self.state.nx()
    }

    fn ndx(&self) -> usize {
        self.state.ndx()
    }

    fn nu(&self) -> usize {
        0
    }

    fn calc(&self, x: &DVector<f64>, _u: &DVector<f64>) -> ActionOutput {
        let l = self.cost.calc(x, &DVector::zeros(0));
        ActionOutput { xnext: x.clone(), l }
    }

    fn calc_diff(&self, x: &DVector<f64>, _u: &DVector<f64>) -> ActionDiffOutput {
        let terms = self.cost.calc_diff(x, &DVector::zeros(0));
        let ndx = self.ndx();
        ActionDiffOutput {
            xnext: x.clone(),
            fx: DMatrix::<f64>::identity(ndx, ndx),
            fu: DMatrix::zeros(ndx, 0),
            l: terms.l,
            lx: terms.lx,
            lu: terms.lu,
            lxx: terms.lxx,
            lxu: DMatrix::zeros(ndx, 0),
            luu: DMatrix::zeros(0, 0),
        }
    }
}
