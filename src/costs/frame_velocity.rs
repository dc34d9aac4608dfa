//! `r = v_frame(q,v)`; `Rx` split into `(dv/dq, dv/dv)` via the dynamics
//! library's kinematic-derivative routines.

use crate::external::{FrameId, RigidBodyDynamics};
use crate::residual::{Residual, ResidualJacobians};
use nalgebra::{DMatrix, DVector};
use std::cell::RefCell;
use std::rc::Rc;

pub struct FrameVelocityResidual<D: RigidBodyDynamics> {
    dynamics: Rc<RefCell<D>>,
    frame: FrameId,
    target: DVector<f64>,
    nv: usize,
    nu: usize,
}

impl<D: RigidBodyDynamics> FrameVelocityResidual<D> {
    pub fn new(dynamics: Rc<RefCell<D>>, frame: FrameId, target: DVector<f64>, nu: usize) -> Self {
        debug_assert_eq!(target.len(), 6);
        let nv = dynamics.borrow().nv();
        FrameVelocityResidual { dynamics, frame, target, nv, nu }
    }
}

impl<D: RigidBodyDynamics> Residual for FrameVelocityResidual<D> {
    fn nr(&self) -> usize {
        6
    }

    fn ndx(&self) -> usize {
        2 * self.nv
    }

    fn nu(&self) -> usize {
        self.nu
    }

    fn calc(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> DVector<f64> {
        self.dynamics.borrow().frame_velocity(self.frame) - &self.target
    }

    fn calc_diff(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> ResidualJacobians {
        let (dv_dq, dv_dv) = self.dynamics.borrow().frame_velocity_jacobians(self.frame);
        let mut rx = DMatrix::<f64>::zeros(6, self.ndx());
        rx.view_mut((0, 0), (6, self.nv)).copy_from(&dv_dq);
        rx.view_mut((0, self.nv), (6, self.nv)).copy_from(&dv_dv);
        ResidualJacobians {
            rx,
            ru: DMatrix::zeros(6, self.nu),
        }
    }
}
