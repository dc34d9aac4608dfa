//! Minimal `SE(3)` rigid transform with the `log6`/`Jlog6` primitives the
//! frame-placement residual needs. Real deployments source these from the
//! dynamics library (Pinocchio exposes the same two functions); this is the
//! toy stand-in, kept separate from [`crate::external::toy::ToyArm`] because
//! `SE3`/`log6`/`Jlog6` are listed in the spec as their own external
//! primitives independent of the dynamics model.

use nalgebra::{DMatrix, Matrix3, Vector3, Vector6};

const EPS: f64 = 1e-9;

/// A rigid transform `(R, p)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Se3 {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Se3 {
    pub fn identity() -> Self {
        Se3 {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Se3 { rotation, translation }
    }

    /// `M1^{-1} * M2`.
    pub fn inverse_compose(&self, other: &Se3) -> Se3 {
        let r_inv = self.rotation.transpose();
        Se3 {
            rotation: r_inv * other.rotation,
            translation: r_inv * (other.translation - self.translation),
        }
    }

    pub fn inverse(&self) -> Se3 {
        let r_inv = self.rotation.transpose();
        Se3 {
            rotation: r_inv,
            translation: -(r_inv * self.translation),
        }
    }

    pub fn compose(&self, other: &Se3) -> Se3 {
        Se3 {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }
}

pub fn skew(w: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -w.z, w.y, w.z, 0.0, -w.x, -w.y, w.x, 0.0)
}

/// `SO(3)` exponential (Rodrigues' formula).
pub fn exp3(w: &Vector3<f64>) -> Matrix3<f64> {
    let theta = w.norm();
    if theta < EPS {
        return Matrix3::identity() + skew(w);
    }
    let axis = w / theta;
    let k = skew(&axis);
    Matrix3::identity() + theta.sin() * k + (1.0 - theta.cos()) * (k * k)
}

/// `SO(3)` logarithm: returns the axis-angle vector `w` with `exp3(w) == R`.
pub fn log3(r: &Matrix3<f64>) -> Vector3<f64> {
    let cos_theta = ((r.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    if theta < EPS {
        return Vector3::new(r[(2, 1)] - r[(1, 2)], r[(0, 2)] - r[(2, 0)], r[(1, 0)] - r[(0, 1)]) * 0.5;
    }
    let scale = theta / (2.0 * theta.sin());
    scale * Vector3::new(r[(2, 1)] - r[(1, 2)], r[(0, 2)] - r[(2, 0)], r[(1, 0)] - r[(0, 1)])
}

/// Inverse right-Jacobian of `SO(3)`: satisfies
/// `log3(R * exp3(dw)) ≈ log3(R) + jlog3(log3(R)) * dw`.
pub fn jlog3(w: &Vector3<f64>) -> Matrix3<f64> {
    let theta = w.norm();
    if theta < EPS {
        return Matrix3::identity();
    }
    let k = skew(w);
    let coeff = 1.0 / (theta * theta) - (1.0 + theta.cos()) / (2.0 * theta * theta.sin());
    Matrix3::identity() - 0.5 * k + coeff * (k * k)
}

/// `log6(M)`: returns the 6-vector `[v; w]` (linear, then angular) such that
/// `exp6([v;w]) == M`.
pub fn log6(m: &Se3) -> Vector6<f64> {
    let w = log3(&m.rotation);
    let v = jlog3(&w) * m.translation;
    Vector6::new(v.x, v.y, v.z, w.x, w.y, w.z)
}

/// Jacobian of [`log6`] at the point whose logarithm is `r = [v; w]`
/// (right-trivialized derivative, so that
/// `log6(M * exp6(dr)) ≈ r + jlog6(r) * dr`).
///
/// Block-diagonal in the two `Jlog3` blocks; drops the linear/angular
/// coupling term that the exact Pinocchio `Jlog6` carries, which is
/// accurate to first order and exact at the identity. Adequate for the
/// small-residual regime the frame-placement cost operates in near
/// convergence; a full implementation belongs to the real dynamics library.
pub fn jlog6(r: &Vector6<f64>) -> DMatrix<f64> {
    let w = Vector3::new(r[3], r[4], r[5]);
    let j = jlog3(&w);
    let mut out = DMatrix::<f64>::zeros(6, 6);
    out.view_mut((0, 0), (3, 3)).copy_from(&j);
    out.view_mut((3, 3), (3, 3)).copy_from(&j);
    out
}
