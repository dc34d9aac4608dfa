//! Benchmark/smoke-test CLI: builds a small planar-arm trajectory
//! optimization problem and runs FDDP on it `trials` times, checking that
//! the cost strictly decreases after the first iteration every time.
//! Exit code `0` on success, nonzero on assertion failure.

use clap::Parser;
use ddp_trajopt::action::{ActionModel, TerminalActionModel};
use ddp_trajopt::cost::CostSum;
use ddp_trajopt::costs::{ControlRegularizationResidual, FrameTranslationResidual, StateRegularizationResidual};
use ddp_trajopt::activation::WeightedQuadraticActivation;
use ddp_trajopt::dynamics::{DynamicsMode, FreeForwardDynamicsDam};
use ddp_trajopt::external::toy::ToyArm;
use ddp_trajopt::integrated::IntegratedActionModel;
use ddp_trajopt::residual::ResidualCost;
use ddp_trajopt::shooting::ShootingProblem;
use ddp_trajopt::solver::ddp::DdpSolver;
use ddp_trajopt::solver::SolverConfig;
use ddp_trajopt::state::VectorSpaceState;
use nalgebra::{DVector, Vector3};
use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of trials to run.
    #[arg(default_value_t = 5000)]
    trials: usize,
}

const N_LINKS: usize = 3;
const HORIZON: usize = 20;
const DT: f64 = 0.01;

fn build_problem() -> ShootingProblem {
    let n = N_LINKS;
    let dynamics = Rc::new(RefCell::new(ToyArm::new(vec![1.0; n], vec![1.0; n], 9.81)));
    let state: Arc<dyn ddp_trajopt::state::State + Send + Sync> = Arc::new(VectorSpaceState::new(2 * n));

    let target = Vector3::new(1.5, 0.5, 0.0);
    let x_ref = DVector::zeros(2 * n);
    let u_ref = DVector::zeros(n);

    let mut running: Vec<Box<dyn ActionModel>> = Vec::with_capacity(HORIZON);
    for _ in 0..HORIZON {
        let mut cost = CostSum::new(2 * n, n);
        let frame_cost = ResidualCost::new(
            FrameTranslationResidual::new(dynamics.clone(), n - 1, target, n),
            WeightedQuadraticActivation::unit(3),
        );
        cost.add_cost("gripper", frame_cost, 1.0).expect("cost registration");
        let x_cost = ResidualCost::new(
            StateRegularizationResidual::new(state.clone(), x_ref.clone(), n),
            WeightedQuadraticActivation::unit(2 * n),
        );
        cost.add_cost("x_reg", x_cost, 1e-4).expect("cost registration");
        let u_cost = ResidualCost::new(
            ControlRegularizationResidual::new(u_ref.clone(), 2 * n),
            WeightedQuadraticActivation::unit(n),
        );
        cost.add_cost("u_reg", u_cost, 1e-4).expect("cost registration");

        let dam = FreeForwardDynamicsDam::new(dynamics.clone(), DynamicsMode::MassMatrixInversion, None, cost)
            .expect("armature/ABA precondition");
        running.push(Box::new(IntegratedActionModel::new(state.clone(), dam, DT)));
    }

    let mut terminal_cost = CostSum::new(2 * n, 0);
    let terminal_frame_cost = ResidualCost::new(
        FrameTranslationResidual::new(dynamics.clone(), n - 1, target, 0),
        WeightedQuadraticActivation::unit(3),
    );
    terminal_cost.add_cost("gripper_terminal", terminal_frame_cost, 10.0).expect("cost registration");
    let terminal = Box::new(TerminalActionModel::new(state.clone(), terminal_cost));

    ShootingProblem::new(state, DVector::zeros(2 * n), running, terminal).expect("problem construction")
}

fn run_trial() -> bool {
    let problem = build_problem();
    let xs_init: Vec<DVector<f64>> = (0..=HORIZON).map(|_| problem.x0().clone()).collect();
    let us_init: Vec<DVector<f64>> = (0..HORIZON).map(|k| problem.quasi_static(k, &problem.x0())).collect();

    let (cost_before, _) = problem.calc(&xs_init, &us_init).expect("initial rollout");

    let mut solver = DdpSolver::new(&problem, SolverConfig::default());
    let (xs, us, _status) = solver
        .solve(&xs_init, &us_init, 1, true, 1e-3)
        .expect("solver iteration");
    let (cost_after, _) = problem.calc(&xs, &us).expect("post-iteration rollout");

    cost_after <= cost_before
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    for trial in 0..args.trials {
        if !run_trial() {
            tracing::error!(trial, "cost did not decrease after one FDDP iteration");
            return ExitCode::FAILURE;
        }
    }

    tracing::info!(trials = args.trials, "all trials passed");
    ExitCode::SUCCESS
}
