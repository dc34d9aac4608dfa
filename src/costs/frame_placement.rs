//! `r = log6(M(q)^{-1} M*)`; `Rx[:, :nv] = -Jlog6(r) * J_frame(q)`.

use crate::external::se3::{jlog6, log6, Se3};
use crate::external::{FrameId, RigidBodyDynamics};
use crate::residual::{Residual, ResidualJacobians};
use nalgebra::{DMatrix, DVector};
use std::cell::RefCell;
use std::rc::Rc;

pub struct FramePlacementResidual<D: RigidBodyDynamics> {
    dynamics: Rc<RefCell<D>>,
    frame: FrameId,
    target: Se3,
    nv: usize,
    nu: usize,
}

impl<D: RigidBodyDynamics> FramePlacementResidual<D> {
    pub fn new(dynamics: Rc<RefCell<D>>, frame: FrameId, target: Se3, nu: usize) -> Self {
        let nv = dynamics.borrow().nv();
        FramePlacementResidual { dynamics, frame, target, nv, nu }
    }

    fn residual_at_current(&self) -> DVector<f64> {
        let current = self.dynamics.borrow().frame_placement(self.frame);
        let r = log6(&current.inverse_compose(&self.target));
        DVector::from_iterator(6, r.iter().copied())
    }
}

impl<D: RigidBodyDynamics> Residual for FramePlacementResidual<D> {
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
        self.residual_at_current()
    }

    fn calc_diff(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> ResidualJacobians {
        let r = self.residual_at_current();
        let r6 = nalgebra::Vector6::from_iterator(r.iter().copied());
        let jlog = jlog6(&r6);
        let j_frame = self.dynamics.borrow().frame_placement_jacobian(self.frame);
        let dr_dq = -jlog * j_frame;

        let mut rx = DMatrix::<f64>::zeros(6, self.ndx());
        rx.view_mut((0, 0), (6, self.nv)).copy_from(&dr_dq);
        ResidualJacobians {
            rx,
            ru: DMatrix::zeros(6, self.nu),
        }
    }
}
