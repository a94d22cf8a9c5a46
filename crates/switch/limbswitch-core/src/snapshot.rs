//! Pose captured from the read-only match joints before a mode flip.
//!
//! The driving controls stop being trustworthy as soon as the mode flag
//! changes, so everything the other representation needs is read from the
//! match joints first and restored afterwards.

use limbswitch_scene_core::{Mat4, NodePath, SceneGraph, SceneResult, Vec3};

use crate::descriptor::Limb;
use crate::geometry::{dominant_axis, Axis};

#[derive(Debug, Clone, PartialEq)]
pub struct PoseSnapshot {
    /// World rotation of each source match joint (root, mid, end).
    pub rotations: [Vec3; 3],
    /// World matrix of the end match joint (IK-bound switches).
    pub end_matrix: Option<Mat4>,
    /// Dominant-axis scale of the root and mid IK match joints (FK-bound switches).
    pub stretch_scales: Option<[f64; 2]>,
    /// Bone axis the scales were read on.
    pub aim: Option<Axis>,
    /// World matrix of the auto clavicle, when the limb has one.
    pub clavicle: Option<Mat4>,
}

fn rotations<S: SceneGraph + ?Sized>(scene: &S, chain: &[NodePath; 3]) -> SceneResult<[Vec3; 3]> {
    Ok([
        scene.world_rotation(&chain[0])?,
        scene.world_rotation(&chain[1])?,
        scene.world_rotation(&chain[2])?,
    ])
}

fn clavicle<S: SceneGraph + ?Sized>(scene: &S, limb: &Limb) -> SceneResult<Option<Mat4>> {
    limb.clavicle
        .as_ref()
        .map(|c| scene.world_matrix(c))
        .transpose()
}

impl PoseSnapshot {
    /// Snapshot for an FK→IK switch: FK match rotations and end matrix.
    pub fn capture_for_ik<S: SceneGraph + ?Sized>(scene: &S, limb: &Limb) -> SceneResult<Self> {
        Ok(Self {
            rotations: rotations(scene, &limb.fk_match)?,
            end_matrix: Some(scene.world_matrix(&limb.fk_match[2])?),
            stretch_scales: None,
            aim: None,
            clavicle: clavicle(scene, limb)?,
        })
    }

    /// Snapshot for an IK→FK switch: IK match rotations plus how far stretch
    /// has scaled the two bones, read on the FK mid control's bone axis.
    pub fn capture_for_fk<S: SceneGraph + ?Sized>(scene: &S, limb: &Limb) -> SceneResult<Self> {
        let (aim, _) = dominant_axis(&scene.local_translation(limb.fk_mid_control())?);
        let top = aim.component(&scene.local_scale(&limb.ik_match[0])?);
        let bottom = aim.component(&scene.local_scale(&limb.ik_match[1])?);
        Ok(Self {
            rotations: rotations(scene, &limb.ik_match)?,
            end_matrix: None,
            stretch_scales: Some([top, bottom]),
            aim: Some(aim),
            clavicle: clavicle(scene, limb)?,
        })
    }

    /// Apply the captured rotations to `controls` in order (extra entries on
    /// either side are ignored).
    pub fn restore_rotations<S: SceneGraph + ?Sized>(
        &self,
        scene: &mut S,
        controls: &[NodePath],
    ) -> SceneResult<()> {
        for (rotation, ctrl) in self.rotations.iter().zip(controls) {
            scene.set_world_rotation(ctrl, *rotation)?;
        }
        Ok(())
    }

    /// Put the clavicle back where it was captured.
    pub fn restore_clavicle<S: SceneGraph + ?Sized>(&self, scene: &mut S, limb: &Limb) -> SceneResult<()> {
        if let (Some(ctrl), Some(matrix)) = (&limb.clavicle, self.clavicle) {
            scene.set_world_matrix(ctrl, matrix)?;
        }
        Ok(())
    }
}
