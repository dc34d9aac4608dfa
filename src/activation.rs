//! Activation functions: scalar-valued maps over a residual `r`, exposing
//! value, gradient and Hessian w.r.t. `r`.

use nalgebra::{DMatrix, DVector};

/// `calc`/`calcDiff` over a residual `r in R^nr`.
pub trait Activation {
    fn nr(&self) -> usize;
    fn calc(&self, r: &DVector<f64>) -> f64;
    /// `(ar, arr)`: gradient and (often diagonal) Hessian w.r.t. `r`.
    fn calc_diff(&self, r: &DVector<f64>) -> (DVector<f64>, DMatrix<f64>);
}

/// `a = 1/2 sum w_i r_i^2`, `ar = w ⊙ r`, `arr = diag(w)`.
#[derive(Debug, Clone)]
pub struct WeightedQuadraticActivation {
    weights: DVector<f64>,
}

impl WeightedQuadraticActivation {
    pub fn new(weights: DVector<f64>) -> Self {
        debug_assert!(weights.iter().all(|&w| w >= 0.0));
        WeightedQuadraticActivation { weights }
    }

    /// Unweighted quadratic activation (`w ≡ 1`), the common default for
    /// residuals that don't need per-component weighting.
    pub fn unit(nr: usize) -> Self {
        WeightedQuadraticActivation::new(DVector::repeat(nr, 1.0))
    }
}

impl Activation for WeightedQuadraticActivation {
    fn nr(&self) -> usize {
        self.weights.len()
    }

    fn calc(&self, r: &DVector<f64>) -> f64 {
        0.5 * self.weights.iter().zip(r.iter()).map(|(w, ri)| w * ri * ri).sum::<f64>()
    }

    fn calc_diff(&self, r: &DVector<f64>) -> (DVector<f64>, DMatrix<f64>) {
        let ar = DVector::from_iterator(r.len(), self.weights.iter().zip(r.iter()).map(|(w, ri)| w * ri));
        let arr = DMatrix::from_diagonal(&self.weights);
        (ar, arr)
    }
}

/// Smoothed box-inequality activation. Zero inside `[lower, upper]`,
/// quadratic outside. `beta` shrinks the active bounds toward their
/// midpoint before the quadratic barrier is applied (`lower <- m - beta*d`,
/// `upper <- m + beta*d`, with `m`/`d` the midpoint/half-width), matching
/// `crocoddyl.ActivationBounds`. Components with an infinite bound on
/// either side are left as-is: the midpoint/half-width isn't well-defined
/// there, and an infinite bound must keep disabling that side regardless
/// of `beta`.
#[derive(Debug, Clone)]
pub struct BoxActivation {
    lower: DVector<f64>,
    upper: DVector<f64>,
    beta: f64,
}

impl BoxActivation {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>, beta: f64) -> Self {
        debug_assert!(beta >= 0.0);
        debug_assert_eq!(lower.len(), upper.len());
        let (lower, upper) = Self::shrink(&lower, &upper, beta);
        BoxActivation { lower, upper, beta }
    }

    /// The smoothing factor passed to [`Self::new`].
    pub fn beta(&self) -> f64 {
        self.beta
    }

    fn shrink(lower: &DVector<f64>, upper: &DVector<f64>, beta: f64) -> (DVector<f64>, DVector<f64>) {
        let n = lower.len();
        let mut lo = DVector::zeros(n);
        let mut hi = DVector::zeros(n);
        for i in 0..n {
            let (l, u) = (lower[i], upper[i]);
            if l.is_finite() && u.is_finite() {
                let m = 0.5 * (l + u);
                let d = 0.5 * (u - l);
                lo[i] = m - beta * d;
                hi[i] = m + beta * d;
            } else {
                lo[i] = l;
                hi[i] = u;
            }
        }
        (lo, hi)
    }

    fn component(&self, i: usize, ri: f64) -> (f64, f64, f64) {
        let lo = self.lower[i];
        let hi = self.upper[i];
        if ri > hi && hi.is_finite() {
            let d = ri - hi;
            (0.5 * d * d, d, 1.0)
        } else if ri < lo && lo.is_finite() {
            let d = lo - ri;
            (0.5 * d * d, -d, 1.0)
        } else {
            (0.0, 0.0, 0.0)
        }
    }
}

impl Activation for BoxActivation {
    fn nr(&self) -> usize {
        self.lower.len()
    }

    fn calc(&self, r: &DVector<f64>) -> f64 {
        r.iter().enumerate().map(|(i, &ri)| self.component(i, ri).0).sum()
    }

    fn calc_diff(&self, r: &DVector<f64>) -> (DVector<f64>, DMatrix<f64>) {
        let n = r.len();
        let mut ar = DVector::zeros(n);
        let mut arr = DMatrix::zeros(n, n);
        for (i, &ri) in r.iter().enumerate() {
            let (_, g, h) = self.component(i, ri);
            ar[i] = g;
            arr[(i, i)] = h;
        }
        (ar, arr)
    }
}
