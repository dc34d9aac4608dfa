//! Integrated action model (IAM): discretizes a DAM over a step `dt` via
//! explicit Euler, exposing the same `(x, u) -> (xnext, l)` interface (plus
//! derivatives) that the shooting problem and solver consume.

use crate::action::{ActionDiffOutput, ActionModel, ActionOutput};
use crate::dynamics::DifferentialActionModel;
use crate::state::{State, Wrt};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

pub struct IamOutput {
    pub xnext: DVector<f64>,
    pub l: f64,
}

pub struct IamDiffOutput {
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

/// A DAM plus an explicit-Euler integration rule. Step `dt` is per-model;
/// the initial state for a rollout is the caller's responsibility.
pub struct IntegratedActionModel<M: DifferentialActionModel> {
    state: Arc<dyn State + Send + Sync>,
    dam: M,
    dt: f64,
}

impl<M: DifferentialActionModel> IntegratedActionModel<M> {
    pub fn new(state: Arc<dyn State + Send + Sync>, dam: M, dt: f64) -> Self {
        IntegratedActionModel { state, dam, dt }
    }

    pub fn nx(&self) -> usize {
        self.state.nx()
    }

    pub fn ndx(&self) -> usize {
        self.state.ndx()
    }

    pub fn nu(&self) -> usize {
        self.dam.nu()
    }

    fn tangent_step(&self, x: &DVector<f64>, a: &DVector<f64>) -> DVector<f64> {
        let nv = self.dam.nv();
        let v = x.rows(self.dam.nq(), nv);
        DVector::from_iterator(2 * nv, v.iter().map(|vi| vi * self.dt).chain(a.iter().map(|ai| ai * self.dt)))
    }

    pub fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> IamOutput {
        let out = self.dam.calc(x, u);
        let dx = self.tangent_step(x, &out.a);
        IamOutput {
            xnext: self.state.integrate(x, &dx),
            l: self.dt * out.l,
        }
    }

    pub fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> IamDiffOutput {
        let diff = self.dam.calc_diff(x, u);
        let nv = self.dam.nv();
        let nu = self.dam.nu();
        let dx = self.tangent_step(x, &diff.a);
        let xnext = self.state.integrate(x, &dx);

        let mut da = DMatrix::<f64>::zeros(2 * nv, 2 * nv);
        da.view_mut((0, nv), (nv, nv)).copy_from(&DMatrix::<f64>::identity(nv, nv));
        da.view_mut((nv, 0), (nv, 2 * nv)).copy_from(&diff.fx);

        let mut fu_block = DMatrix::<f64>::zeros(2 * nv, nu);
        fu_block.view_mut((nv, 0), (nv, nu)).copy_from(&diff.fu);

        let jint = self.state.jintegrate(x, &dx, Wrt::Both);
        let fx = &jint.d_first + &jint.d_second * self.dt * &da;
        let fu = &jint.d_second * self.dt * &fu_block;

        IamDiffOutput {
            xnext,
            fx,
            fu,
            l: self.dt * diff.l,
            lx: self.dt * diff.lx,
            lu: self.dt * diff.lu,
            lxx: self.dt * diff.lxx,
            lxu: self.dt * diff.lxu,
            luu: self.dt * diff.luu,
        }
    }
}

impl<M: DifferentialActionModel> ActionModel for IntegratedActionModel<M> {
    fn nx(&self) -> usize {
        IntegratedActionModel::nx(self)
    }

    fn ndx(&self) -> usize {
        IntegratedActionModel::ndx(self)
    }

    fn nu(&self) -> usize {
        IntegratedActionModel::nu(self)
    }

    fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> ActionOutput {
        let out = IntegratedActionModel::calc(self, x, u);
        ActionOutput { xnext: out.xnext, l: out.l }
    }

    fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> ActionDiffOutput {
        let d = IntegratedActionModel::calc_diff(self, x, u);
        ActionDiffOutput {
            xnext: d.xnext,
            fx: d.fx,
            fu: d.fu,
            l: d.l,
            lx: d.lx,
            lu: d.lu,
            lxx: d.lxx,
            lxu: d.lxu,
            luu: d.luu,
        }
    }
}
