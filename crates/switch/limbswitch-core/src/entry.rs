//! Outer switch entry points, one per limb archetype.
//!
//! An entry reads the requested mode off `ikfk_switch`, runs the transition
//! inside one undo chunk and never returns an error: failures are logged and
//! handed back as [`SwitchOutcome::Failed`].

use serde::{Deserialize, Serialize};

use limbswitch_scene_core::{apply_best_effort, SceneGraph, UndoChunk, WriteBatch, WriteOp};

use crate::attrs;
use crate::config::SwitchConfig;
use crate::descriptor::Limb;
use crate::error::{ErrorChain, SwitchError, SwitchResult};
use crate::switch::{is_settled, switch, ModeState, SwitchReport};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimbArchetype {
    /// Three-joint rotate-plane limb.
    Arm,
    /// Rotate-plane limb with a foot pivot hierarchy.
    Leg,
}

#[derive(Debug)]
pub enum SwitchOutcome {
    Switched(SwitchReport),
    /// Requested mode equals the current one.
    Unchanged(ModeState),
    Failed(SwitchError),
}

impl SwitchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SwitchOutcome::Failed(_))
    }

    pub fn report(&self) -> Option<&SwitchReport> {
        match self {
            SwitchOutcome::Switched(report) => Some(report),
            _ => None,
        }
    }
}

fn requested_mode<S: SceneGraph + ?Sized>(scene: &S, limb: &Limb) -> SwitchResult<ModeState> {
    let plug = limb.switch_plug();
    let value = scene.attribute(&plug)?;
    ModeState::from_request(value).ok_or_else(|| SwitchError::Data {
        plug,
        reason: format!("requested mode {value} is neither 0 (IK) nor 1 (FK)"),
    })
}

fn missing_foot(limb: &Limb) -> SwitchError {
    SwitchError::Data {
        plug: limb.param_plug(attrs::FOOT_FK_CONTROL),
        reason: "leg limb has no foot controls".into(),
    }
}

fn run<S: SceneGraph + ?Sized>(
    scene: &mut S,
    limb: &Limb,
    archetype: LimbArchetype,
    config: &SwitchConfig,
) -> SwitchResult<SwitchOutcome> {
    let target = requested_mode(scene, limb)?;
    if is_settled(scene, limb, target)? {
        return Ok(SwitchOutcome::Unchanged(target));
    }

    let report = match (archetype, target) {
        (LimbArchetype::Arm, _) => switch(scene, limb, target, config)?,
        (LimbArchetype::Leg, ModeState::Fk) => {
            let foot = limb.foot.as_ref().ok_or_else(|| missing_foot(limb))?;
            let foot_matrix = scene.world_matrix(&foot.fk_control)?;
            let report = switch(scene, limb, target, config)?;
            scene.set_world_matrix(&foot.fk_control, foot_matrix)?;
            report
        }
        (LimbArchetype::Leg, ModeState::Ik) => {
            let foot = limb.foot.as_ref().ok_or_else(|| missing_foot(limb))?;
            let mut batch = WriteBatch::new();
            for ctrl in &foot.pivot_chain {
                batch.extend(
                    scene
                        .keyable_attributes(ctrl)?
                        .into_iter()
                        .map(|attr| WriteOp::new(ctrl.plug(&attr), 0.0)),
                );
            }
            let zeroed = apply_best_effort(scene, &batch);
            let report = switch(scene, limb, target, config)?;
            report.map(|mut r| {
                r.writes.merge(zeroed);
                r
            })
        }
    };

    Ok(match report {
        Some(report) => SwitchOutcome::Switched(report),
        None => SwitchOutcome::Unchanged(target),
    })
}

fn guarded<S: SceneGraph + ?Sized>(
    scene: &mut S,
    limb: &Limb,
    archetype: LimbArchetype,
    config: &SwitchConfig,
) -> SwitchOutcome {
    let mut chunk = UndoChunk::open(scene);
    match run(&mut *chunk, limb, archetype, config) {
        Ok(outcome) => outcome,
        Err(err) => {
            log::error!("ikfk switch on '{}' failed: {}", limb.param, ErrorChain(&err));
            SwitchOutcome::Failed(err)
        }
    }
}

/// Switch an arm-type limb to the mode requested on its `ikfk_switch` plug.
pub fn arm_switch<S: SceneGraph + ?Sized>(scene: &mut S, limb: &Limb, config: &SwitchConfig) -> SwitchOutcome {
    guarded(scene, limb, LimbArchetype::Arm, config)
}

/// Switch a leg-type limb. Going to FK keeps the foot FK control where it
/// was; going to IK zeroes the foot pivot controls first.
pub fn leg_switch<S: SceneGraph + ?Sized>(scene: &mut S, limb: &Limb, config: &SwitchConfig) -> SwitchOutcome {
    guarded(scene, limb, LimbArchetype::Leg, config)
}

/// Dispatch on `archetype`.
pub fn run_switch<S: SceneGraph + ?Sized>(
    scene: &mut S,
    limb: &Limb,
    archetype: LimbArchetype,
    config: &SwitchConfig,
) -> SwitchOutcome {
    match archetype {
        LimbArchetype::Arm => arm_switch(scene, limb, config),
        LimbArchetype::Leg => leg_switch(scene, limb, config),
    }
}
