//! Tunables of the switching engine.

use serde::{Deserialize, Serialize};

use crate::converge::ConvergeParams;

/// Thresholds and iteration bounds used by every switch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    /// Angular tolerance (radians) below which the match chain counts as straight.
    pub colinear_threshold: f64,
    /// Extra distance the analytic pole is pushed beyond the elbow offset.
    pub pole_distance: f64,
    pub pole_max_doublings: u32,
    /// FK proxy vs IK mid residual above which the stretch solver runs.
    pub drift_threshold: f64,
    pub converge_threshold: f64,
    pub converge_max_attempts: u32,
    pub converge_step: f64,
    /// Fixed repeat count of the auto-clavicle correction when going to FK.
    pub clavicle_iterations: u32,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            colinear_threshold: 0.008,
            pole_distance: 10.0,
            pole_max_doublings: 20,
            drift_threshold: 0.1,
            converge_threshold: 0.1,
            converge_max_attempts: 20,
            converge_step: 0.001,
            clavicle_iterations: 20,
        }
    }
}

impl SwitchConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn converge_params(&self) -> ConvergeParams {
        ConvergeParams {
            threshold: self.converge_threshold,
            max_attempts: self.converge_max_attempts,
            step: self.converge_step,
        }
    }
}
