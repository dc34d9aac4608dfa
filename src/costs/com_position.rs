//! `r = com(q) - c*`; `Rx[:, :nv] = J_com(q)`.

use crate::external::RigidBodyDynamics;
use crate::residual::{Residual, ResidualJacobians};
use nalgebra::{DMatrix, DVector, Vector3};
use std::cell::RefCell;
use std::rc::Rc;

pub struct ComPositionResidual<D: RigidBodyDynamics> {
    dynamics: Rc<RefCell<D>>,
    target: Vector3<f64>,
    nq: usize,
    nv: usize,
    nu: usize,
}

impl<D: RigidBodyDynamics> ComPositionResidual<D> {
    pub fn new(dynamics: Rc<RefCell<D>>, target: Vector3<f64>, nu: usize) -> Self {
        let (nq, nv) = {
            let d = dynamics.borrow();
            (d.nq(), d.nv())
        };
        ComPositionResidual { dynamics, target, nq, nv, nu }
    }
}

impl<D: RigidBodyDynamics> Residual for ComPositionResidual<D> {
    fn nr(&self) -> usize {
        3
    }

    fn ndx(&self) -> usize {
        2 * self.nv
    }

    fn nu(&self) -> usize {
        self.nu
    }

    fn calc(&self, x: &DVector<f64>, _u: &DVector<f64>) -> DVector<f64> {
        let q = x.rows(0, self.nq).into_owned();
        let c = self.dynamics.borrow().center_of_mass(&q);
        DVector::from_vec(vec![c.x - self.target.x, c.y - self.target.y, c.z - self.target.z])
    }

    fn calc_diff(&self, x: &DVector<f64>, _u: &DVector<f64>) -> ResidualJacobians {
        let q = x.rows(0, self.nq).into_owned();
        let j_com = self.dynamics.borrow().jacobian_center_of_mass(&q);
        let mut rx = DMatrix::<f64>::zeros(3, self.ndx());
        rx.view_mut((0, 0), (3, self.nv)).copy_from(&j_com);
        ResidualJacobians {
            rx,
            ru: DMatrix::zeros(3, self.nu),
        }
    }
}
