//! Traits describing the rigid-body dynamics library this crate consumes
//! but never implements: forward dynamics, mass matrix, RNEA/ABA and their
//! derivatives, manifold `integrate`/`difference`/`dIntegrate`, frame
//! kinematics. Real bindings (e.g. to Pinocchio) implement these traits;
//! [`toy`] provides a small, deterministic stand-in used only by this
//! crate's own tests, the same role [`crate::external::toy`] plays that
//! `dummy::DummyBody` played in the teacher crate.

pub mod se3;
pub mod toy;

use nalgebra::{DMatrix, DVector, Vector3};

/// Opaque handle to a frame (link/joint) known to the dynamics library.
pub type FrameId = usize;

/// Mass matrix, bias forces and Jacobians produced by one call into the
/// dynamics library, as specified by `computeAllTerms`.
pub struct DynamicsTerms {
    /// Joint-space mass (inertia) matrix `M(q)`, size `nv x nv`.
    pub mass_matrix: DMatrix<f64>,
    /// Nonlinear effects `b(q,v)` (Coriolis, centrifugal, gravity), size `nv`.
    pub bias: DVector<f64>,
}

/// Output of `computeRNEADerivatives`.
pub struct RneaDerivatives {
    pub d_tau_dq: DMatrix<f64>,
    pub d_tau_dv: DMatrix<f64>,
}

/// Output of `computeABADerivatives`.
pub struct AbaDerivatives {
    pub da_dq: DMatrix<f64>,
    pub da_dv: DMatrix<f64>,
    /// `Minv`, i.e. `da/dtau`.
    pub da_dtau: DMatrix<f64>,
}

/// The rigid-body dynamics and manifold primitives consumed by the
/// differential action model and the kinematic cost residuals. `nq` is the
/// ambient configuration size, `nv` the tangent (velocity) size; `nu == nv`
/// (fully actuated joints) in this crate, matching the spec's scope.
pub trait RigidBodyDynamics {
    fn nq(&self) -> usize;
    fn nv(&self) -> usize;

    fn neutral(&self) -> DVector<f64>;
    fn random_configuration(&self) -> DVector<f64>;

    fn integrate(&self, q: &DVector<f64>, dq: &DVector<f64>) -> DVector<f64>;
    fn difference(&self, q0: &DVector<f64>, q1: &DVector<f64>) -> DVector<f64>;
    /// `(d integrate / dq, d integrate / ddq)` at `(q, dq)`.
    fn d_integrate(&self, q: &DVector<f64>, dq: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>);
    /// `(d difference / dq0, d difference / dq1)` at `(q0, q1)`.
    fn d_difference(&self, q0: &DVector<f64>, q1: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>);

    /// `computeAllTerms`: populates the mass matrix and the nonlinear
    /// (Coriolis + gravity) bias at `(q, v)`.
    fn compute_all_terms(&self, q: &DVector<f64>, v: &DVector<f64>) -> DynamicsTerms;

    /// Articulated-body algorithm: `a = ABA(q, v, tau)`.
    fn aba(&self, q: &DVector<f64>, v: &DVector<f64>, tau: &DVector<f64>) -> DVector<f64>;
    fn compute_aba_derivatives(&self, q: &DVector<f64>, v: &DVector<f64>, tau: &DVector<f64>) -> AbaDerivatives;
    fn compute_minverse(&self, q: &DVector<f64>, v: &DVector<f64>) -> DMatrix<f64>;
    /// `computeRNEADerivatives`: `d(tau)/dq`, `d(tau)/dv` at a feasible
    /// `(q, v, a)` triple (`d(tau)/da == M` is available via
    /// [`RigidBodyDynamics::compute_all_terms`]).
    fn compute_rnea_derivatives(
        &self,
        q: &DVector<f64>,
        v: &DVector<f64>,
        a: &DVector<f64>,
    ) -> RneaDerivatives;

    /// `forwardKinematics` + `updateFramePlacements` + `computeJointJacobians`
    /// + `computeForwardKinematicsDerivatives`, bundled: refreshes whatever
    /// internal cache the frame/CoM queries below read from. Must be called
    /// before any of them; costs never call it themselves (kinematic
    /// freshness policy, see SPEC_FULL.md §4.3).
    fn forward_kinematics(&mut self, q: &DVector<f64>, v: &DVector<f64>);

    fn frame_translation(&self, frame: FrameId) -> Vector3<f64>;
    /// Translational rows of the local-world-aligned frame Jacobian, `3 x nv`.
    fn frame_translation_jacobian(&self, frame: FrameId) -> DMatrix<f64>;

    fn frame_placement(&self, frame: FrameId) -> se3::Se3;
    /// `J_frame(q)`, `6 x nv`, local-world-aligned.
    fn frame_placement_jacobian(&self, frame: FrameId) -> DMatrix<f64>;

    /// Spatial velocity of the frame, `[linear; angular]`, size 6.
    fn frame_velocity(&self, frame: FrameId) -> DVector<f64>;
    /// `(d v_frame / dq, d v_frame / dv)`, each `6 x nv`.
    fn frame_velocity_jacobians(&self, frame: FrameId) -> (DMatrix<f64>, DMatrix<f64>);

    fn center_of_mass(&self, q: &DVector<f64>) -> Vector3<f64>;
    /// `jacobianCenterOfMass`, `3 x nv`.
    fn jacobian_center_of_mass(&self, q: &DVector<f64>) -> DMatrix<f64>;
}
