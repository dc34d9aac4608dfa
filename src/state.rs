//! The state manifold: `nx`, `ndx`, `zero`, `rand`, `diff`/`integrate` and
//! their Jacobians. Two realizations are provided — [`VectorSpaceState`]
//! (flat `R^n`) and [`CompositeState`] (a configuration on a manifold,
//! delegated to an [`crate::external::RigidBodyDynamics`] collaborator,
//! times a Euclidean velocity).

use crate::external::RigidBodyDynamics;
use nalgebra::{DMatrix, DVector};
use rand::Rng;

/// Which argument(s) a Jacobian is requested with respect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrt {
    First,
    Second,
    Both,
}

/// A pair of Jacobians w.r.t. the first and second argument of a binary
/// manifold operation. Whichever side was not requested via [`Wrt`] is left
/// as an appropriately-sized zero matrix.
#[derive(Debug, Clone)]
pub struct JacobianPair {
    pub d_first: DMatrix<f64>,
    pub d_second: DMatrix<f64>,
}

/// The state manifold `S`: ambient size `nx`, tangent size `ndx`.
pub trait State {
    fn nx(&self) -> usize;
    fn ndx(&self) -> usize;

    fn zero(&self) -> DVector<f64>;
    fn rand(&self) -> DVector<f64>;

    /// `dx` such that `integrate(x0, dx) == x1`.
    fn diff(&self, x0: &DVector<f64>, x1: &DVector<f64>) -> DVector<f64>;
    /// `x'`.
    fn integrate(&self, x: &DVector<f64>, dx: &DVector<f64>) -> DVector<f64>;

    fn jdiff(&self, x0: &DVector<f64>, x1: &DVector<f64>, wrt: Wrt) -> JacobianPair;
    fn jintegrate(&self, x: &DVector<f64>, dx: &DVector<f64>, wrt: Wrt) -> JacobianPair;
}

/// Flat vector-space state: `diff`/`integrate` are addition/subtraction,
/// Jacobians are `+-I`.
pub struct VectorSpaceState {
    n: usize,
}

impl VectorSpaceState {
    pub fn new(n: usize) -> Self {
        VectorSpaceState { n }
    }
}

impl State for VectorSpaceState {
    fn nx(&self) -> usize {
        self.n
    }

    fn ndx(&self) -> usize {
        self.n
    }

    fn zero(&self) -> DVector<f64> {
        DVector::zeros(self.n)
    }

    fn rand(&self) -> DVector<f64> {
        let mut rng = rand::thread_rng();
        DVector::from_iterator(self.n, (0..self.n).map(|_| rng.gen_range(-1.0..1.0)))
    }

    fn diff(&self, x0: &DVector<f64>, x1: &DVector<f64>) -> DVector<f64> {
        x1 - x0
    }

    fn integrate(&self, x: &DVector<f64>, dx: &DVector<f64>) -> DVector<f64> {
        x + dx
    }

    fn jdiff(&self, _x0: &DVector<f64>, _x1: &DVector<f64>, wrt: Wrt) -> JacobianPair {
        let i = DMatrix::<f64>::identity(self.n, self.n);
        match wrt {
            Wrt::First => JacobianPair {
                d_first: -i,
                d_second: DMatrix::zeros(self.n, self.n),
            },
            Wrt::Second => JacobianPair {
                d_first: DMatrix::zeros(self.n, self.n),
                d_second: i,
            },
            Wrt::Both => JacobianPair {
                d_first: -i.clone(),
                d_second: i,
            },
        }
    }

    fn jintegrate(&self, _x: &DVector<f64>, _dx: &DVector<f64>, wrt: Wrt) -> JacobianPair {
        let i = DMatrix::<f64>::identity(self.n, self.n);
        match wrt {
            Wrt::First => JacobianPair {
                d_first: i,
                d_second: DMatrix::zeros(self.n, self.n),
            },
            Wrt::Second => JacobianPair {
                d_first: DMatrix::zeros(self.n, self.n),
                d_second: i,
            },
            Wrt::Both => JacobianPair {
                d_first: i.clone(),
                d_second: i,
            },
        }
    }
}

/// Composite Lie-group state: configuration `q` on a manifold delegated to
/// `G`, velocity `v` Euclidean. `nx = nq + nv`, `ndx = 2*nv`.
pub struct CompositeState<'g, G: RigidBodyDynamics> {
    group: &'g G,
}

impl<'g, G: RigidBodyDynamics> CompositeState<'g, G> {
    pub fn new(group: &'g G) -> Self {
        CompositeState { group }
    }

    fn nq(&self) -> usize {
        self.group.nq()
    }

    fn nv(&self) -> usize {
        self.group.nv()
    }

    fn split<'a>(&self, x: &'a DVector<f64>) -> (DVector<f64>, DVector<f64>) {
        (x.rows(0, self.nq()).into_owned(), x.rows(self.nq(), self.nv()).into_owned())
    }

    fn join(&self, q: &DVector<f64>, v: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.nx(), q.iter().chain(v.iter()).copied())
    }
}

impl<'g, G: RigidBodyDynamics> State for CompositeState<'g, G> {
    fn nx(&self) -> usize {
        self.nq() + self.nv()
    }

    fn ndx(&self) -> usize {
        2 * self.nv()
    }

    fn zero(&self) -> DVector<f64> {
        self.join(&self.group.neutral(), &DVector::zeros(self.nv()))
    }

    fn rand(&self) -> DVector<f64> {
        self.join(&self.group.random_configuration(), &{
            let mut rng = rand::thread_rng();
            DVector::from_iterator(self.nv(), (0..self.nv()).map(|_| rng.gen_range(-1.0..1.0)))
        })
    }

    fn diff(&self, x0: &DVector<f64>, x1: &DVector<f64>) -> DVector<f64> {
        let (q0, v0) = self.split(x0);
        let (q1, v1) = self.split(x1);
        let dq = self.group.difference(&q0, &q1);
        let dv = v1 - v0;
        DVector::from_iterator(self.ndx(), dq.iter().chain(dv.iter()).copied())
    }

    fn integrate(&self, x: &DVector<f64>, dx: &DVector<f64>) -> DVector<f64> {
        let (q, v) = self.split(x);
        let dq = dx.rows(0, self.nv()).into_owned();
        let dv = dx.rows(self.nv(), self.nv()).into_owned();
        let q1 = self.group.integrate(&q, &dq);
        let v1 = v + dv;
        self.join(&q1, &v1)
    }

    fn jdiff(&self, x0: &DVector<f64>, x1: &DVector<f64>, wrt: Wrt) -> JacobianPair {
        let (q0, _) = self.split(x0);
        let (q1, _) = self.split(x1);
        let (dq_dq0, dq_dq1) = self.group.d_difference(&q0, &q1);
        let nv = self.nv();
        let ndx = self.ndx();
        let mut d_first = DMatrix::<f64>::zeros(ndx, ndx);
        let mut d_second = DMatrix::<f64>::zeros(ndx, ndx);
        if matches!(wrt, Wrt::First | Wrt::Both) {
            d_first.view_mut((0, 0), (nv, nv)).copy_from(&dq_dq0);
            d_first.view_mut((nv, nv), (nv, nv)).copy_from(&(-DMatrix::<f64>::identity(nv, nv)));
        }
        if matches!(wrt, Wrt::Second | Wrt::Both) {
            d_second.view_mut((0, 0), (nv, nv)).copy_from(&dq_dq1);
            d_second.view_mut((nv, nv), (nv, nv)).copy_from(&DMatrix::<f64>::identity(nv, nv));
        }
        JacobianPair { d_first, d_second }
    }

    fn jintegrate(&self, x: &DVector<f64>, dx: &DVector<f64>, wrt: Wrt) -> JacobianPair {
        let (q, _) = self.split(x);
        let dq = dx.rows(0, self.nv()).into_owned();
        let (dq_dq, dq_ddq) = self.group.d_integrate(&q, &dq);
        let nv = self.nv();
        let ndx = self.ndx();
        let mut d_first = DMatrix::<f64>::zeros(ndx, ndx);
        let mut d_second = DMatrix::<f64>::zeros(ndx, ndx);
        if matches!(wrt, Wrt::First | Wrt::Both) {
            d_first.view_mut((0, 0), (nv, nv)).copy_from(&dq_dq);
            d_first.view_mut((nv, nv), (nv, nv)).copy_from(&DMatrix::<f64>::identity(nv, nv));
        }
        if matches!(wrt, Wrt::Second | Wrt::Both) {
            d_second.view_mut((0, 0), (nv, nv)).copy_from(&dq_ddq);
            d_second.view_mut((nv, nv), (nv, nv)).copy_from(&DMatrix::<f64>::identity(nv, nv));
        }
        JacobianPair { d_first, d_second }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn vector_space_roundtrip() {
        let s = VectorSpaceState::new(4);
        let x = s.rand();
        let dx = s.rand();
        let x1 = s.integrate(&x, &dx);
        let dx2 = s.diff(&x, &x1);
        assert_abs_diff_eq!(dx, dx2, epsilon = 1e-9);
    }

    #[test]
    fn vector_space_integrate_zero_is_identity() {
        let s = VectorSpaceState::new(3);
        let x = s.rand();
        let x1 = s.integrate(&x, &DVector::zeros(3));
        assert_abs_diff_eq!(x, x1, epsilon = 1e-12);
    }

    #[test]
    fn vector_space_jintegrate_at_zero_is_identity() {
        let s = VectorSpaceState::new(3);
        let x = s.rand();
        let j = s.jintegrate(&x, &DVector::zeros(3), Wrt::Second);
        assert_abs_diff_eq!(j.d_second, DMatrix::<f64>::identity(3, 3), epsilon = 1e-12);
    }
}
