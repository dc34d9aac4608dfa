//! Testable properties 1-2: manifold laws and Jacobian consistency against
//! central finite differences, for both state realizations.

use approx::assert_abs_diff_eq;
use ddp_trajopt::external::toy::ToyArm;
use ddp_trajopt::state::{CompositeState, State, VectorSpaceState, Wrt};
use nalgebra::DVector;

const H: f64 = 1e-6;

fn unit(n: usize, i: usize) -> DVector<f64> {
    let mut e = DVector::zeros(n);
    e[i] = 1.0;
    e
}

fn check_manifold_laws(s: &dyn State) {
    for _ in 0..20 {
        let x = s.rand();
        let dx = s.rand() * 0.1;
        let x1 = s.integrate(&x, &dx);
        let dx2 = s.diff(&x, &x1);
        assert_abs_diff_eq!(dx, dx2, epsilon = 1e-8);

        let x0 = s.rand();
        let x1 = s.rand();
        let dx = s.diff(&x0, &x1);
        let x1_back = s.integrate(&x0, &dx);
        assert_abs_diff_eq!(x1, x1_back, epsilon = 1e-8);

        let zero = DVector::zeros(s.ndx());
        assert_abs_diff_eq!(s.integrate(&x, &zero), x, epsilon = 1e-10);
    }
}

#[test]
fn vector_space_manifold_laws_hold() {
    check_manifold_laws(&VectorSpaceState::new(5));
}

#[test]
fn composite_manifold_laws_hold() {
    let arm = ToyArm::new(vec![1.0, 1.0, 1.0], vec![1.0, 1.0, 1.0], 9.81);
    check_manifold_laws(&CompositeState::new(&arm));
}

/// Property 2: `Jdiff`/`Jintegrate` agree with central finite differences
/// within `10*sqrt(h)`.
fn check_jintegrate_jacobian(s: &dyn State) {
    let tol = 10.0 * H.sqrt();
    let x = s.rand();
    let dx = s.rand() * 0.1;
    let ndx = s.ndx();

    let jac = s.jintegrate(&x, &dx, Wrt::Second);
    for i in 0..ndx {
        let e = unit(ndx, i) * H;
        let xp = s.integrate(&x, &(&dx + &e));
        let xm = s.integrate(&x, &(&dx - &e));
        let col = s.diff(&xm, &xp) / (2.0 * H);
        let analytic = jac.d_second.column(i).into_owned();
        assert_abs_diff_eq!(col, analytic, epsilon = tol);
    }
}

fn check_jdiff_jacobian(s: &dyn State) {
    let tol = 10.0 * H.sqrt();
    let x0 = s.rand();
    let x1 = s.rand();
    let ndx = s.ndx();

    let jac = s.jdiff(&x0, &x1, Wrt::Second);
    for i in 0..ndx {
        let e = unit(ndx, i) * H;
        let x1p = s.integrate(&x1, &e);
        let x1m = s.integrate(&x1, &(-&e));
        let col = (s.diff(&x0, &x1p) - s.diff(&x0, &x1m)) / (2.0 * H);
        let analytic = jac.d_second.column(i).into_owned();
        assert_abs_diff_eq!(col, analytic, epsilon = tol);
    }
}

#[test]
fn vector_space_jacobians_match_finite_differences() {
    let s = VectorSpaceState::new(4);
    check_jintegrate_jacobian(&s);
    check_jdiff_jacobian(&s);
}

#[test]
fn composite_jacobians_match_finite_differences() {
    let arm = ToyArm::new(vec![1.0, 1.0], vec![1.0, 1.0], 9.81);
    let s = CompositeState::new(&arm);
    check_jintegrate_jacobian(&s);
    check_jdiff_jacobian(&s);
}
