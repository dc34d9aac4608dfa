//! `r = p(q) - p*`. Reads the frame position already refreshed by the host's
//! `forward_kinematics` call; never refreshes it itself (kinematic
//! freshness policy).

use crate::external::{FrameId, RigidBodyDynamics};
use crate::residual::{Residual, ResidualJacobians};
use nalgebra::{DMatrix, DVector, Vector3};
use std::cell::RefCell;
use std::rc::Rc;

pub struct FrameTranslationResidual<D: RigidBodyDynamics> {
    dynamics: Rc<RefCell<D>>,
    frame: FrameId,
    target: Vector3<f64>,
    nv: usize,
    nu: usize,
}

impl<D: RigidBodyDynamics> FrameTranslationResidual<D> {
    pub fn new(dynamics: Rc<RefCell<D>>, frame: FrameId, target: Vector3<f64>, nu: usize) -> Self {
        let nv = dynamics.borrow().nv();
        FrameTranslationResidual { dynamics, frame, target, nv, nu }
    }
}

impl<D: RigidBodyDynamics> Residual for FrameTranslationResidual<D> {
    fn nr(&self) -> usize {
        3
    }

    fn ndx(&self) -> usize {
        2 * self.nv
    }

    fn nu(&self) -> usize {
        self.nu
    }

    fn calc(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> DVector<f64> {
        let p = self.dynamics.borrow().frame_translation(self.frame);
        DVector::from_vec(vec![p.x - self.target.x, p.y - self.target.y, p.z - self.target.z])
    }

    fn calc_diff(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> ResidualJacobians {
        let dyn_ref = self.dynamics.borrow();
        let j_trans = dyn_ref.frame_translation_jacobian(self.frame);
        let mut rx = DMatrix::<f64>::zeros(3, self.ndx());
        rx.view_mut((0, 0), (3, self.nv)).copy_from(&j_trans);
        ResidualJacobians {
            rx,
            ru: DMatrix::zeros(3, self.nu),
        }
    }
}
