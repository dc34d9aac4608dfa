//! ## About
//!
//! A Differential Dynamic Programming (DDP/FDDP) trajectory optimizer for
//! discretized continuous-time optimal control problems. Consumes an
//! external rigid-body dynamics collaborator (see [`external`]) rather than
//! implementing one; this crate owns the state manifold, cost, dynamics
//! discretization, and solver layers only.
//!
//! ## System overview
//!
//! State manifold ([`state`]) → activation ([`activation`]) → residual-based
//! cost ([`residual`]) → named cost sum ([`cost`]) → differential action
//! model ([`dynamics`]) → integrated action model ([`integrated`]) →
//! shooting problem ([`shooting`]) → solvers ([`solver`]). [`numdiff`]
//! provides finite-difference oracles used only by tests.
//!
//! ## Naming conventions
//! * Traits – adjectives that indicate capability and behavior.
//! * Structs – substantives that indicate entities implementing a behavior.
//! * Methods – imperative forms with the exception of getters and
//!   factories, which use substantives (omit a `get_` prefix), much like the
//!   standard library.

pub mod action;
pub mod activation;
pub mod cost;
pub mod costs;
pub mod dynamics;
pub mod error;
pub mod external;
pub mod integrated;
pub mod numdiff;
pub mod residual;
pub mod shooting;
pub mod solver;
pub mod state;

pub use error::{OptimError, Result};
