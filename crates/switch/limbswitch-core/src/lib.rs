//! limbswitch-core: IK/FK mode switching and stretch matching for rig limbs.
//!
//! Host-agnostic: every scene read and write goes through
//! [`limbswitch_scene_core::SceneGraph`].

pub mod attrs;
pub mod config;
pub mod converge;
pub mod descriptor;
pub mod entry;
pub mod error;
pub mod geometry;
pub mod registry;
pub mod snapshot;
pub mod stretch;
pub mod switch;

// Re-exports for hosts and tooling
pub use config::SwitchConfig;
pub use converge::{converge, ConvergeParams, ConvergenceReport, StretchChannels};
pub use descriptor::{
    ClavicleRef, FootDescriptor, FootRoles, IkControls, IkRoles, Limb, LimbDescriptor, MatchChain,
};
pub use entry::{arm_switch, leg_switch, run_switch, LimbArchetype, SwitchOutcome};
pub use error::{DescriptorError, ErrorChain, SwitchError, SwitchResult};
pub use geometry::{
    dominant_axis, is_near_colinear, match_magnitude, pole_vector_from_three, pole_vector_position,
    Axis,
};
pub use registry::{Registration, SwitchRegistry};
pub use snapshot::PoseSnapshot;
pub use stretch::{SoftStretch, StretchSolve, MIN_SOFT};
pub use switch::{
    current_mode, fk_match_ik, ik_match_fk, is_settled, switch, ModeState, PoleSource, SwitchReport,
};
