//! A small planar serial-chain manipulator used as the [`super::RigidBodyDynamics`]
//! collaborator in this crate's own tests, the same role `dummy::DummyBody`
//! played for [`crate::Rigid`] in the teacher crate. Joint angles are treated
//! as a flat Euclidean vector (no wraparound manifold), so `nq == nv == n`
//! and `integrate`/`difference` reduce to vector addition/subtraction — this
//! is a deliberate simplification; a real floating-base/quaternion
//! configuration is the dynamics library's job, out of scope here (spec.md
//! §1).
//!
//! Mass matrix and frame kinematics are closed-form (planar composite rigid
//! body); their `q`-derivatives (needed for RNEA/ABA derivatives and for the
//! frame-velocity Jacobians) are obtained with central finite differences
//! internally. That is an implementation shortcut appropriate for a toy
//! fixture and is *not* the numerical-differentiation shim specified in
//! spec.md §4.10 (that shim wraps an arbitrary [`crate::dynamics::DifferentialActionModel`]
//! end-to-end and is exercised directly in the property tests).

use super::{AbaDerivatives, DynamicsTerms, FrameId, RigidBodyDynamics, RneaDerivatives};
use crate::external::se3::Se3;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use rand::Rng;

const FD_STEP: f64 = 1e-6;

/// Planar `n`-link revolute chain, point mass at the tip of each link.
pub struct ToyArm {
    lengths: Vec<f64>,
    masses: Vec<f64>,
    gravity: f64,
    cached_q: DVector<f64>,
    cached_v: DVector<f64>,
}

impl ToyArm {
    pub fn new(lengths: Vec<f64>, masses: Vec<f64>, gravity: f64) -> Self {
        assert_eq!(lengths.len(), masses.len());
        let n = lengths.len();
        ToyArm {
            lengths,
            masses,
            gravity,
            cached_q: DVector::zeros(n),
            cached_v: DVector::zeros(n),
        }
    }

    fn n(&self) -> usize {
        self.lengths.len()
    }

    /// Cumulative joint angles `theta_i = sum_{k<=i} q_k`.
    fn thetas(&self, q: &DVector<f64>) -> Vec<f64> {
        let mut acc = 0.0;
        q.iter()
            .map(|qi| {
                acc += qi;
                acc
            })
            .collect()
    }

    /// Planar position of each link's point mass, `(x_i, y_i)`.
    fn positions(&self, q: &DVector<f64>) -> Vec<(f64, f64)> {
        let thetas = self.thetas(q);
        let mut x = 0.0;
        let mut y = 0.0;
        thetas
            .iter()
            .zip(&self.lengths)
            .map(|(theta, l)| {
                x += l * theta.cos();
                y += l * theta.sin();
                (x, y)
            })
            .collect()
    }

    /// `dp_i/dq_k` for every link `i`, as an `n x 2` table (row `i`, two
    /// columns `x,y`), stored per-`k` as an `2 x n` Jacobian `J[i]`.
    fn position_jacobians(&self, q: &DVector<f64>) -> Vec<DMatrix<f64>> {
        let n = self.n();
        let thetas = self.thetas(q);
        let mut jac = vec![DMatrix::<f64>::zeros(2, n); n];
        for i in 0..n {
            for k in 0..=i {
                let mut contrib = (0.0, 0.0);
                for j in k..=i {
                    contrib.0 += -self.lengths[j] * thetas[j].sin();
                    contrib.1 += self.lengths[j] * thetas[j].cos();
                }
                jac[i][(0, k)] = contrib.0;
                jac[i][(1, k)] = contrib.1;
            }
        }
        jac
    }

    fn mass_matrix_at(&self, q: &DVector<f64>) -> DMatrix<f64> {
        let n = self.n();
        let jac = self.position_jacobians(q);
        let mut m = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            m += jac[i].transpose() * self.masses[i] * &jac[i];
        }
        m
    }

    fn gravity_vector_at(&self, q: &DVector<f64>) -> DVector<f64> {
        let n = self.n();
        let jac = self.position_jacobians(q);
        let mut g = DVector::<f64>::zeros(n);
        for i in 0..n {
            for k in 0..n {
                g[k] += self.masses[i] * self.gravity * jac[i][(1, k)];
            }
        }
        g
    }

    fn d_mass_matrix_dq(&self, q: &DVector<f64>) -> Vec<DMatrix<f64>> {
        let n = self.n();
        (0..n)
            .map(|k| {
                let mut qp = q.clone();
                let mut qm = q.clone();
                qp[k] += FD_STEP;
                qm[k] -= FD_STEP;
                (self.mass_matrix_at(&qp) - self.mass_matrix_at(&qm)) / (2.0 * FD_STEP)
            })
            .collect()
    }

    fn coriolis_bias_at(&self, q: &DVector<f64>, v: &DVector<f64>) -> DVector<f64> {
        let n = self.n();
        let dm = self.d_mass_matrix_dq(q);
        let mut c = DVector::<f64>::zeros(n);
        for k in 0..n {
            let mut acc = 0.0;
            for i in 0..n {
                for j in 0..n {
                    let christoffel = 0.5 * (dm[i][(k, j)] + dm[j][(k, i)] - dm[k][(i, j)]);
                    acc += christoffel * v[i] * v[j];
                }
            }
            c[k] = acc;
        }
        c + self.gravity_vector_at(q)
    }

    fn frame_theta(&self, q: &DVector<f64>, frame: FrameId) -> f64 {
        self.thetas(q)[frame]
    }
}

impl RigidBodyDynamics for ToyArm {
    fn nq(&self) -> usize {
        self.n()
    }

    fn nv(&self) -> usize {
        self.n()
    }

    fn neutral(&self) -> DVector<f64> {
        DVector::zeros(self.n())
    }

    fn random_configuration(&self) -> DVector<f64> {
        let mut rng = rand::thread_rng();
        DVector::from_iterator(self.n(), (0..self.n()).map(|_| rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI)))
    }

    fn integrate(&self, q: &DVector<f64>, dq: &DVector<f64>) -> DVector<f64> {
        q + dq
    }

    fn difference(&self, q0: &DVector<f64>, q1: &DVector<f64>) -> DVector<f64> {
        q1 - q0
    }

    fn d_integrate(&self, q: &DVector<f64>, _dq: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        let i = DMatrix::<f64>::identity(q.len(), q.len());
        (i.clone(), i)
    }

    fn d_difference(&self, q0: &DVector<f64>, _q1: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = q0.len();
        (-DMatrix::<f64>::identity(n, n), DMatrix::<f64>::identity(n, n))
    }

    fn compute_all_terms(&self, q: &DVector<f64>, v: &DVector<f64>) -> DynamicsTerms {
        DynamicsTerms {
            mass_matrix: self.mass_matrix_at(q),
            bias: self.coriolis_bias_at(q, v),
        }
    }

    fn aba(&self, q: &DVector<f64>, v: &DVector<f64>, tau: &DVector<f64>) -> DVector<f64> {
        let terms = self.compute_all_terms(q, v);
        let chol = terms
            .mass_matrix
            .clone()
            .cholesky()
            .expect("toy arm mass matrix must be SPD");
        chol.solve(&(tau - terms.bias))
    }

    fn compute_aba_derivatives(&self, q: &DVector<f64>, v: &DVector<f64>, tau: &DVector<f64>) -> AbaDerivatives {
        let n = self.n();
        let mut da_dq = DMatrix::<f64>::zeros(n, n);
        let mut da_dv = DMatrix::<f64>::zeros(n, n);
        for k in 0..n {
            let mut qp = q.clone();
            let mut qm = q.clone();
            qp[k] += FD_STEP;
            qm[k] -= FD_STEP;
            let ap = self.aba(&qp, v, tau);
            let am = self.aba(&qm, v, tau);
            da_dq.set_column(k, &((ap - am) / (2.0 * FD_STEP)));

            let mut vp = v.clone();
            let mut vm = v.clone();
            vp[k] += FD_STEP;
            vm[k] -= FD_STEP;
            let ap = self.aba(q, &vp, tau);
            let am = self.aba(q, &vm, tau);
            da_dv.set_column(k, &((ap - am) / (2.0 * FD_STEP)));
        }
        AbaDerivatives {
            da_dq,
            da_dv,
            da_dtau: self.compute_minverse(q, v),
        }
    }

    fn compute_minverse(&self, q: &DVector<f64>, _v: &DVector<f64>) -> DMatrix<f64> {
        self.mass_matrix_at(q)
            .try_inverse()
            .expect("toy arm mass matrix must be invertible")
    }

    fn compute_rnea_derivatives(&self, q: &DVector<f64>, v: &DVector<f64>, a: &DVector<f64>) -> RneaDerivatives {
        let n = self.n();
        let tau_at = |q: &DVector<f64>, v: &DVector<f64>| -> DVector<f64> {
            &self.mass_matrix_at(q) * a + self.coriolis_bias_at(q, v)
        };
        let mut d_tau_dq = DMatrix::<f64>::zeros(n, n);
        let mut d_tau_dv = DMatrix::<f64>::zeros(n, n);
        for k in 0..n {
            let mut qp = q.clone();
            let mut qm = q.clone();
            qp[k] += FD_STEP;
            qm[k] -= FD_STEP;
            d_tau_dq.set_column(k, &((tau_at(&qp, v) - tau_at(&qm, v)) / (2.0 * FD_STEP)));

            let mut vp = v.clone();
            let mut vm = v.clone();
            vp[k] += FD_STEP;
            vm[k] -= FD_STEP;
            d_tau_dv.set_column(k, &((tau_at(q, &vp) - tau_at(q, &vm)) / (2.0 * FD_STEP)));
        }
        RneaDerivatives { d_tau_dq, d_tau_dv }
    }

    fn forward_kinematics(&mut self, q: &DVector<f64>, v: &DVector<f64>) {
        self.cached_q = q.clone();
        self.cached_v = v.clone();
    }

    fn frame_translation(&self, frame: FrameId) -> Vector3<f64> {
        let (x, y) = self.positions(&self.cached_q)[frame];
        Vector3::new(x, y, 0.0)
    }

    fn frame_translation_jacobian(&self, frame: FrameId) -> DMatrix<f64> {
        let jac2 = &self.position_jacobians(&self.cached_q)[frame];
        let mut out = DMatrix::<f64>::zeros(3, self.n());
        out.view_mut((0, 0), (2, self.n())).copy_from(jac2);
        out
    }

    fn frame_placement(&self, frame: FrameId) -> Se3 {
        let theta = self.frame_theta(&self.cached_q, frame);
        let rotation = Matrix3::new(
            theta.cos(),
            -theta.sin(),
            0.0,
            theta.sin(),
            theta.cos(),
            0.0,
            0.0,
            0.0,
            1.0,
        );
        Se3::new(rotation, self.frame_translation(frame))
    }

    fn frame_placement_jacobian(&self, frame: FrameId) -> DMatrix<f64> {
        let n = self.n();
        let mut out = DMatrix::<f64>::zeros(6, n);
        out.view_mut((0, 0), (3, n)).copy_from(&self.frame_translation_jacobian(frame));
        for k in 0..=frame {
            out[(5, k)] = 1.0;
        }
        out
    }

    fn frame_velocity(&self, frame: FrameId) -> DVector<f64> {
        let jac = self.frame_placement_jacobian(frame);
        &jac * &self.cached_v
    }

    fn frame_velocity_jacobians(&self, frame: FrameId) -> (DMatrix<f64>, DMatrix<f64>) {
        let jac = self.frame_placement_jacobian(frame);
        let dv_dv = jac.clone();
        let n = self.n();
        let mut dv_dq = DMatrix::<f64>::zeros(6, n);
        for k in 0..n {
            let mut qp = self.cached_q.clone();
            let mut qm = self.cached_q.clone();
            qp[k] += FD_STEP;
            qm[k] -= FD_STEP;
            let jac_p = {
                let mut tmp = ToyArm::new(self.lengths.clone(), self.masses.clone(), self.gravity);
                tmp.forward_kinematics(&qp, &self.cached_v);
                tmp.frame_placement_jacobian(frame)
            };
            let jac_m = {
                let mut tmp = ToyArm::new(self.lengths.clone(), self.masses.clone(), self.gravity);
                tmp.forward_kinematics(&qm, &self.cached_v);
                tmp.frame_placement_jacobian(frame)
            };
            let d = ((jac_p - jac_m) / (2.0 * FD_STEP)) * &self.cached_v;
            dv_dq.set_column(k, &d);
        }
        (dv_dq, dv_dv)
    }

    fn center_of_mass(&self, q: &DVector<f64>) -> Vector3<f64> {
        let positions = self.positions(q);
        let total_mass: f64 = self.masses.iter().sum();
        let (x, y) = positions
            .iter()
            .zip(&self.masses)
            .fold((0.0, 0.0), |(ax, ay), ((x, y), m)| (ax + m * x, ay + m * y));
        Vector3::new(x / total_mass, y / total_mass, 0.0)
    }

    fn jacobian_center_of_mass(&self, q: &DVector<f64>) -> DMatrix<f64> {
        let n = self.n();
        let jac = self.position_jacobians(q);
        let total_mass: f64 = self.masses.iter().sum();
        let mut planar = DMatrix::<f64>::zeros(2, n);
        for i in 0..n {
            planar += (self.masses[i] / total_mass) * &jac[i];
        }
        let mut out = DMatrix::<f64>::zeros(3, n);
        out.view_mut((0, 0), (2, n)).copy_from(&planar);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn two_link() -> ToyArm {
        ToyArm::new(vec![1.0, 1.0], vec![1.0, 1.0], 9.81)
    }

    #[test]
    fn mass_matrix_is_symmetric_positive_definite() {
        let arm = two_link();
        let q = DVector::from_vec(vec![0.3, -0.5]);
        let m = arm.mass_matrix_at(&q);
        assert_abs_diff_eq!(m.clone(), m.transpose(), epsilon = 1e-9);
        assert!(m.clone().cholesky().is_some());
    }

    #[test]
    fn frame_translation_matches_position() {
        let mut arm = two_link();
        let q = DVector::from_vec(vec![0.0, 0.0]);
        let v = DVector::zeros(2);
        arm.forward_kinematics(&q, &v);
        let p = arm.frame_translation(1);
        assert_abs_diff_eq!(p, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-9);
    }
}
