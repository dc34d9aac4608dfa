//! The cost sum `Σ`: a named, weighted aggregation of residual-based costs
//! sharing state and actuation dimensions.

use crate::activation::Activation;
use crate::error::{OptimError, Result};
use crate::residual::{Residual, ResidualCost};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Type-erased interface over a `ResidualCost<R, A>` so [`CostSum`] can hold
/// a heterogeneous collection of named costs.
trait AnyCost {
    fn nr(&self) -> usize;
    fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> f64;
    /// `(l, lx, lu, lxx, lxu, luu, r, rx, ru)`.
    #[allow(clippy::type_complexity)]
    fn calc_diff(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
    ) -> (f64, DVector<f64>, DVector<f64>, DMatrix<f64>, DMatrix<f64>, DMatrix<f64>, DVector<f64>, DMatrix<f64>, DMatrix<f64>);
}

impl<R: Residual, A: Activation> AnyCost for ResidualCost<R, A> {
    fn nr(&self) -> usize {
        self.residual.nr()
    }

    fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> f64 {
        ResidualCost::calc(self, x, u)
    }

    fn calc_diff(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
    ) -> (f64, DVector<f64>, DVector<f64>, DMatrix<f64>, DMatrix<f64>, DMatrix<f64>, DVector<f64>, DMatrix<f64>, DMatrix<f64>) {
        let (terms, r, jac) = ResidualCost::calc_diff(self, x, u);
        (terms.l, terms.lx, terms.lu, terms.lxx, terms.lxu, terms.luu, r, jac.rx, jac.ru)
    }
}

struct CostItem {
    name: String,
    weight: f64,
    cost: Box<dyn AnyCost>,
}

/// Aggregated derivatives and the stacked Gauss-Newton residual produced by
/// [`CostSum::calc_diff`].
pub struct CostSumTerms {
    pub l: f64,
    pub lx: DVector<f64>,
    pub lu: DVector<f64>,
    pub lxx: DMatrix<f64>,
    pub lxu: DMatrix<f64>,
    pub luu: DMatrix<f64>,
    /// Stacked residual `[sqrt(w_i) * r_i]`.
    pub r_stack: DVector<f64>,
    pub rx_stack: DMatrix<f64>,
    pub ru_stack: DMatrix<f64>,
}

/// A weighted sum of named residual-based costs sharing `ndx`/`nu`.
/// Costs may only be added/removed between solver invocations (SPEC_FULL.md
/// §4.4); nothing here enforces that beyond documentation, matching the
/// spec's wording that it's a usage invariant, not a runtime-checked one.
pub struct CostSum {
    ndx: usize,
    nu: usize,
    items: Vec<CostItem>,
}

impl CostSum {
    pub fn new(ndx: usize, nu: usize) -> Self {
        CostSum { ndx, nu, items: Vec::new() }
    }

    pub fn add_cost<R, A>(&mut self, name: impl Into<String>, cost: ResidualCost<R, A>, weight: f64) -> Result<()>
    where
        R: Residual + 'static,
        A: Activation + 'static,
    {
        let name = name.into();
        if weight <= 0.0 {
            return Err(OptimError::NonPositiveWeight(name, weight));
        }
        if self.items.iter().any(|c| c.name == name) {
            return Err(OptimError::DuplicateCost(name));
        }
        debug!(cost = %name, weight, "adding cost");
        self.items.push(CostItem { name, weight, cost: Box::new(cost) });
        Ok(())
    }

    pub fn remove_cost(&mut self, name: &str) -> Result<()> {
        let idx = self
            .items
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| OptimError::UnknownCost(name.to_string()))?;
        self.items.remove(idx);
        Ok(())
    }

    pub fn calc(&self, x: &DVector<f64>, u: &DVector<f64>) -> f64 {
        self.items.iter().map(|c| c.weight * c.cost.calc(x, u)).sum()
    }

    pub fn calc_diff(&self, x: &DVector<f64>, u: &DVector<f64>) -> CostSumTerms {
        let nr_total: usize = self.items.iter().map(|c| c.cost.nr()).sum();
        let mut l = 0.0;
        let mut lx = DVector::zeros(self.ndx);
        let mut lu = DVector::zeros(self.nu);
        let mut lxx = DMatrix::zeros(self.ndx, self.ndx);
        let mut lxu = DMatrix::zeros(self.ndx, self.nu);
        let mut luu = DMatrix::zeros(self.nu, self.nu);
        let mut r_stack = DVector::zeros(nr_total);
        let mut rx_stack = DMatrix::zeros(nr_total, self.ndx);
        let mut ru_stack = DMatrix::zeros(nr_total, self.nu);

        let mut row = 0;
        for item in &self.items {
            let (li, lxi, lui, lxxi, lxui, luui, ri, rxi, rui) = item.cost.calc_diff(x, u);
            let w = item.weight;
            l += w * li;
            lx += w * &lxi;
            lu += w * &lui;
            lxx += w * &lxxi;
            lxu += w * &lxui;
            luu += w * &luui;

            let nr = item.cost.nr();
            let sqrt_w = w.sqrt();
            r_stack.rows_mut(row, nr).copy_from(&(sqrt_w * ri));
            rx_stack.view_mut((row, 0), (nr, self.ndx)).copy_from(&(sqrt_w * rxi));
            ru_stack.view_mut((row, 0), (nr, self.nu)).copy_from(&(sqrt_w * rui));
            row += nr;
        }

        CostSumTerms { l, lx, lu, lxx, lxu, luu, r_stack, rx_stack, ru_stack }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::WeightedQuadraticActivation;
    use crate::costs::ControlRegularizationResidual;

    #[test]
    fn rejects_duplicate_and_nonpositive_weight() {
        let mut sum = CostSum::new(3, 2);
        let cost = ResidualCost::new(
            ControlRegularizationResidual::new(DVector::zeros(2), 3),
            WeightedQuadraticActivation::unit(2),
        );
        sum.add_cost("u_reg", cost, 1.0).unwrap();

        let cost2 = ResidualCost::new(
            ControlRegularizationResidual::new(DVector::zeros(2), 3),
            WeightedQuadraticActivation::unit(2),
        );
        assert!(matches!(sum.add_cost("u_reg", cost2, 1.0), Err(OptimError::DuplicateCost(_))));

        let cost3 = ResidualCost::new(
            ControlRegularizationResidual::new(DVector::zeros(2), 3),
            WeightedQuadraticActivation::unit(2),
        );
        assert!(matches!(sum.add_cost("bad", cost3, 0.0), Err(OptimError::NonPositiveWeight(_, _))));
    }

    #[test]
    fn remove_errors_if_absent() {
        let mut sum = CostSum::new(3, 2);
        assert!(matches!(sum.remove_cost("missing"), Err(OptimError::UnknownCost(_))));
    }

    #[test]
    fn calc_sums_weighted_costs() {
        let mut sum = CostSum::new(3, 2);
        let u_ref = DVector::from_vec(vec![1.0, 0.0]);
        let cost = ResidualCost::new(
            ControlRegularizationResidual::new(u_ref.clone(), 3),
            WeightedQuadraticActivation::unit(2),
        );
        sum.add_cost("u_reg", cost, 2.0).unwrap();

        let l = sum.calc(&DVector::zeros(3), &DVector::from_vec(vec![2.0, 0.0]));
        // r = [1, 0], activation = 0.5*1 = 0.5, weighted by 2 -> 1.0
        assert!((l - 1.0).abs() < 1e-12);
    }
}
