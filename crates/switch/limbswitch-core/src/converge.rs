//! Bounded hill-climb on the stretch channels.
//!
//! When FK is matched back onto IK with a coupled clavicle, the IK mid joint
//! position has no closed-form inverse in terms of `stretchTop`/`stretchBottom`.
//! The solver nudges both channels by a shared step, reverses on overshoot and
//! halves the step on stall, until the probe joint lands within `threshold`
//! of the target or the attempts run out.
//!
//! Running out of attempts is not an error: the best-effort channel values
//! stay in place and the returned [`ConvergenceReport`] says so.

use serde::{Deserialize, Serialize};

use limbswitch_scene_core::{NodePath, Plug, SceneGraph, SceneResult, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergeParams {
    pub threshold: f64,
    pub max_attempts: u32,
    pub step: f64,
}

impl Default for ConvergeParams {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            max_attempts: 20,
            step: 0.001,
        }
    }
}

/// Diagnostics of one solver run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub converged: bool,
    /// Iterations that moved the channels.
    pub attempts: u32,
    /// Distance between probe and target when the solver returned.
    pub magnitude: f64,
    /// Step size when the solver returned.
    pub step: f64,
}

/// The two param-node channels the solver is allowed to touch.
#[derive(Clone, Debug, PartialEq)]
pub struct StretchChannels {
    pub top: Plug,
    pub bottom: Plug,
}

struct ConvergenceState {
    step: f64,
    increase: bool,
    prev_magnitude: f64,
}

impl ConvergenceState {
    fn new(step: f64) -> Self {
        Self {
            step,
            increase: true,
            prev_magnitude: f64::INFINITY,
        }
    }

    #[inline]
    fn delta(&self) -> f64 {
        if self.increase {
            self.step
        } else {
            -self.step
        }
    }
}

fn distance_to<S: SceneGraph + ?Sized>(scene: &S, probe: &NodePath, target: &Vec3) -> SceneResult<f64> {
    Ok((target - scene.world_position(probe)?).norm())
}

fn nudge<S: SceneGraph + ?Sized>(scene: &mut S, plug: &Plug, delta: f64) -> SceneResult<()> {
    let current = scene.attribute(plug)?;
    scene.set_attribute(plug, current + delta)
}

/// Move `channels` until `probe` sits within `params.threshold` of `target`.
///
/// Only the two channels are written; nothing else is mutated and no state
/// survives the call.
pub fn converge<S: SceneGraph + ?Sized>(
    scene: &mut S,
    channels: &StretchChannels,
    target: Vec3,
    probe: &NodePath,
    params: &ConvergeParams,
) -> SceneResult<ConvergenceReport> {
    let mut state = ConvergenceState::new(params.step);
    let mut attempts = 0;

    for _ in 0..params.max_attempts {
        let magnitude = distance_to(scene, probe, &target)?;
        if magnitude <= params.threshold {
            return Ok(ConvergenceReport {
                converged: true,
                attempts,
                magnitude,
                step: state.step,
            });
        }

        let delta = state.delta();
        nudge(scene, &channels.top, delta)?;
        nudge(scene, &channels.bottom, delta)?;
        attempts += 1;

        let new_magnitude = distance_to(scene, probe, &target)?;
        if new_magnitude > magnitude {
            state.increase = !state.increase;
        }
        if new_magnitude == state.prev_magnitude {
            state.step /= 2.0;
        }
        state.prev_magnitude = magnitude;
    }

    let magnitude = distance_to(scene, probe, &target)?;
    let converged = magnitude <= params.threshold;
    if !converged {
        log::debug!(
            "stretch convergence on '{probe}' exhausted {attempts} attempts, residual {magnitude:.5}"
        );
    }
    Ok(ConvergenceReport {
        converged,
        attempts,
        magnitude,
        step: state.step,
    })
}
