//! Differential action models (DAM): continuous-time `(q, v, u) -> (a, l)`
//! plus their derivatives. Two concrete variants, per SPEC_FULL.md §9's
//! tagged-capability design: [`FreeForwardDynamicsDam`] (mass-matrix
//! inversion or ABA) and [`LqrDam`] (affine dynamics, quadratic cost).

use crate::cost::CostSum;
use crate::error::{OptimError, Result};
use crate::external::RigidBodyDynamics;
use nalgebra::{DMatrix, DVector};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::instrument;

/// `calc` output: continuous-time acceleration and cost rate.
pub struct DamOutput {
    pub a: DVector<f64>,
    pub l: f64,
}

/// `calcDiff` output.
pub struct DamDiffOutput {
    pub a: DVector<f64>,
    /// `nv x ndx`, i.e. `[da/dq, da/dv]`.
    pub fx: DMatrix<f64>,
    /// `nv x nu`.
    pub fu: DMatrix<f64>,
    pub l: f64,
    pub lx: DVector<f64>,
    pub lu: DVector<f64>,
    pub lxx: DMatrix<f64>,
    pub lxu: DMatrix<f64>,
    pub luu: DMatrix<f64>,
}

/// Common capability set shared by every differential action model.
pub trait DifferentialActionModel {
    fn nq(&self) -> usize;
    fn nv(&self) -> usize;
    fn nu(&self) -> usize;
    fn ndx(&self) -> usize {
        2 * self.nv()
    }

    fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> DamOutput;
    fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> DamDiffOutput;
}

/// Which path computes the forward dynamics.
pub enum DynamicsMode {
    /// `a = M^{-1}(tau - b)`, mass matrix built and inverted explicitly.
    MassMatrixInversion,
    /// Direct articulated-body algorithm.
    Aba,
}

pub struct FreeForwardDynamicsDam<D: RigidBodyDynamics> {
    dynamics: Rc<RefCell<D>>,
    mode: DynamicsMode,
    /// Diagonal added to the mass matrix before inversion. Only meaningful
    /// with [`DynamicsMode::MassMatrixInversion`]; combining it with
    /// [`DynamicsMode::Aba`] is rejected at construction (Open Question
    /// resolved per SPEC_FULL.md §9: a precondition error, not a silently
    /// ignored setting).
    armature: Option<DVector<f64>>,
    cost: CostSum,
}

impl<D: RigidBodyDynamics> FreeForwardDynamicsDam<D> {
    pub fn new(
        dynamics: Rc<RefCell<D>>,
        mode: DynamicsMode,
        armature: Option<DVector<f64>>,
        cost: CostSum,
    ) -> Result<Self> {
        if matches!(mode, DynamicsMode::Aba) && armature.is_some() {
            return Err(OptimError::ArmatureWithAba);
        }
        Ok(FreeForwardDynamicsDam { dynamics, mode, armature, cost })
    }

    fn split<'a>(&self, x: &'a DVector<f64>) -> (DVector<f64>, DVector<f64>) {
        let nq = self.dynamics.borrow().nq();
        let nv = self.dynamics.borrow().nv();
        (x.rows(0, nq).into_owned(), x.rows(nq, nv).into_owned())
    }

    fn refresh_kinematics(&self, q: &DVector<f64>, v: &DVector<f64>) {
        self.dynamics.borrow_mut().forward_kinematics(q, v);
    }
}

impl<D: RigidBodyDynamics> DifferentialActionModel for FreeForwardDynamicsDam<D> {
    fn nq(&self) -> usize {
        self.dynamics.borrow().nq()
    }
    fn nv(&self) -> usize {
        self.dynamics.borrow().nv()
    }
    fn nu(&self) -> usize {
        self.dynamics.borrow().nv()
    }

    #[instrument(level = "trace", skip_all)]
    fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> DamOutput {
        let (q, v) = self.split(x);
        let a = match &self.mode {
            DynamicsMode::Aba => self.dynamics.borrow().aba(&q, &v, u),
            DynamicsMode::MassMatrixInversion => {
                let terms = self.dynamics.borrow().compute_all_terms(&q, &v);
                let mut m = terms.mass_matrix;
                if let Some(arm) = &self.armature {
                    for i in 0..arm.len() {
                        m[(i, i)] += arm[i];
                    }
                }
                let chol = m.cholesky().expect("mass matrix must be SPD");
                chol.solve(&(u - terms.bias))
            }
        };
        self.refresh_kinematics(&q, &v);
        let l = self.cost.calc(x, u);
        DamOutput { a, l }
    }

    #[instrument(level = "trace", skip_all)]
    fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> DamDiffOutput {
        let (q, v) = self.split(x);
        let nv = self.nv();
        let (a, fx_q, fx_v, fu) = match &self.mode {
            DynamicsMode::Aba => {
                let a = self.dynamics.borrow().aba(&q, &v, u);
                let d = self.dynamics.borrow().compute_aba_derivatives(&q, &v, u);
                (a, d.da_dq, d.da_dv, d.da_dtau)
            }
            DynamicsMode::MassMatrixInversion => {
                let terms = self.dynamics.borrow().compute_all_terms(&q, &v);
                let mut m = terms.mass_matrix;
                if let Some(arm) = &self.armature {
                    for i in 0..arm.len() {
                        m[(i, i)] += arm[i];
                    }
                }
                let chol = m.clone().cholesky().expect("mass matrix must be SPD");
                let a = chol.solve(&(u - &terms.bias));
                let minv = m.try_inverse().expect("mass matrix must be invertible");
                let rnea = self.dynamics.borrow().compute_rnea_derivatives(&q, &v, &a);
                (a, -&minv * rnea.d_tau_dq, -&minv * rnea.d_tau_dv, minv)
            }
        };
        self.refresh_kinematics(&q, &v);

        let mut fx = DMatrix::<f64>::zeros(nv, 2 * nv);
        fx.view_mut((0, 0), (nv, nv)).copy_from(&fx_q);
        fx.view_mut((0, nv), (nv, nv)).copy_from(&fx_v);

        let cost = self.cost.calc_diff(x, u);
        DamDiffOutput {
            a,
            fx,
            fu,
            l: cost.l,
            lx: cost.lx,
            lu: cost.lu,
            lxx: cost.lxx,
            lxu: cost.lxu,
            luu: cost.luu,
        }
    }
}

/// `a = A v + B q + C u + d`, quadratic cost with constant Jacobians cached
/// at construction. Used for regression and for stress-testing the solver
/// (testable property 5/E3: converges to the analytical Riccati solution in
/// one DDP iteration).
pub struct LqrDam {
    n: usize,
    nu: usize,
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DMatrix<f64>,
    d: DVector<f64>,
    // Quadratic cost 1/2 xᵀQx + 1/2 uᵀUu (state/control regularization
    // around zero); Lxx/Lxu/Luu are first-class buffers (not an aliased
    // view into one larger block matrix — SPEC_FULL.md §9 Open Questions).
    q: DMatrix<f64>,
    u_weight: DMatrix<f64>,
}

impl LqrDam {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>, c: DMatrix<f64>, d: DVector<f64>, q: DMatrix<f64>, u_weight: DMatrix<f64>) -> Self {
        let n = a.nrows();
        let nu = c.ncols();
        LqrDam { n, nu, a, b, c, d, q, u_weight }
    }
}

impl DifferentialActionModel for LqrDam {
    fn nq(&self) -> usize {
        self.n
    }
    fn nv(&self) -> usize {
        self.n
    }
    fn nu(&self) -> usize {
        self.nu
    }

    fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> DamOutput {
        let q_part = x.rows(0, self.n).into_owned();
        let v_part = x.rows(self.n, self.n).into_owned();
        let a = &self.a * &v_part + &self.b * &q_part + &self.c * u + &self.d;
        let l = 0.5 * x.dot(&(&self.q * x)) + 0.5 * u.dot(&(&self.u_weight * u));
        DamOutput { a, l }
    }

    fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> DamDiffOutput {
        let out = self.calc(x, u);
        let mut fx = DMatrix::<f64>::zeros(self.n, 2 * self.n);
        fx.view_mut((0, 0), (self.n, self.n)).copy_from(&self.b);
        fx.view_mut((0, self.n), (self.n, self.n)).copy_from(&self.a);
        let lx = &self.q * x;
        let lu = &self.u_weight * u;
        DamDiffOutput {
            a: out.a,
            fx,
            fu: self.c.clone(),
            l: out.l,
            lx,
            lu,
            lxx: self.q.clone(),
            lxu: DMatrix::zeros(2 * self.n, self.nu),
            luu: self.u_weight.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lqr_dam_matches_closed_form() {
        let n = 2;
        let a = DMatrix::<f64>::identity(n, n) * 0.1;
        let b = DMatrix::<f64>::zeros(n, n);
        let c = DMatrix::<f64>::identity(n, n);
        let d = DVector::zeros(n);
        let q = DMatrix::<f64>::identity(2 * n, 2 * n);
        let u_weight = DMatrix::<f64>::identity(n, n);
        let dam = LqrDam::new(a, b, c, d, q, u_weight);

        let x = DVector::from_vec(vec![1.0, 0.0, 0.0, 1.0]);
        let u = DVector::from_vec(vec![0.5, -0.5]);
        let out = dam.calc(&x, &u);
        assert_eq!(out.a.len(), n);
        let diff = dam.calc_diff(&x, &u);
        assert_eq!(diff.fx.ncols(), 2 * n);
        assert_eq!(diff.fu.ncols(), n);
    }
}
