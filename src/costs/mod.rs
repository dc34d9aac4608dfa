//! The minimum required residual catalog from SPEC_FULL.md §4.3: state and
//! control regularization (backend-agnostic) plus four kinematic residuals
//! that read from a [`crate::external::RigidBodyDynamics`] collaborator.

pub mod com_position;
pub mod control_regularization;
pub mod frame_placement;
pub mod frame_translation;
pub mod frame_velocity;
pub mod state_regularization;

pub use com_position::ComPositionResidual;
pub use control_regularization::ControlRegularizationResidual;
pub use frame_placement::FramePlacementResidual;
pub use frame_translation::FrameTranslationResidual;
pub use frame_velocity::FrameVelocityResidual;
pub use state_regularization::StateRegularizationResidual;
