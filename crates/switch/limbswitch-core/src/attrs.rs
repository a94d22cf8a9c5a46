//! Attribute names authored on a limb's param node and controls.

/// Current mode flag (0 = IK, 1 = FK) driving the blend.
pub const IKFK: &str = "ikfk";
/// Requested mode; changes to this plug fire the switch.
pub const IKFK_SWITCH: &str = "ikfk_switch";

pub const STRETCH: &str = "stretch";
pub const STRETCH_TOP: &str = "stretchTop";
pub const STRETCH_BOTTOM: &str = "stretchBottom";
pub const SOFT_STRETCH: &str = "softStretch";

pub const PV_PIN: &str = "pvPin";
pub const TWIST: &str = "twist";

// Authored list literals
pub const FK_CONTROLS: &str = "fkControls";
pub const IK_CONTROLS: &str = "ikControls";
pub const FK_MATCH_TRANSFORMS: &str = "fkMatchTransforms";
pub const IK_MATCH_TRANSFORMS: &str = "ikMatchTransforms";
pub const PV_MATCH: &str = "pvMatch";

// Clavicle
pub const AUTO_CLAV: &str = "autoClav";
pub const CLAVICLE_CTRL: &str = "clavicleCtrl";

// Foot
pub const FOOT_FK_CONTROL: &str = "footFkControl";
pub const FOOT_IK_CONTROLS: &str = "footIkControls";
