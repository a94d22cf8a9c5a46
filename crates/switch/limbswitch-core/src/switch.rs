//! One discrete IK↔FK transition of a resolved limb.
//!
//! A transition reads everything it needs from the match joints, commits the
//! mode flag through [`SceneGraph::commit`], then poses the newly driving
//! controls so the limb does not pop. Missing references abort before the
//! flag is touched; there is no rollback beyond the caller's undo chunk.

use serde::{Deserialize, Serialize};

use limbswitch_scene_core::{
    apply_best_effort, ApplyReport, NodePath, SceneError, SceneGraph, Vec3, WriteBatch, WriteOp,
};

use crate::attrs;
use crate::config::SwitchConfig;
use crate::converge::{converge, ConvergenceReport};
use crate::descriptor::Limb;
use crate::error::{DescriptorError, SwitchError, SwitchResult};
use crate::geometry::{is_near_colinear, pole_vector_position};
use crate::snapshot::PoseSnapshot;

/// Tolerance for reading a requested mode off a float attribute.
const MODE_EPSILON: f64 = 1e-6;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeState {
    Ik = 0,
    Fk = 1,
}

impl ModeState {
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            ModeState::Ik => 0.0,
            ModeState::Fk => 1.0,
        }
    }

    /// Exact request: `0` or `1`, anything else is rejected.
    pub fn from_request(value: f64) -> Option<Self> {
        if (value - 0.0).abs() <= MODE_EPSILON {
            Some(ModeState::Ik)
        } else if (value - 1.0).abs() <= MODE_EPSILON {
            Some(ModeState::Fk)
        } else {
            None
        }
    }

    /// Blend-tolerant reading of the persisted flag.
    #[inline]
    pub fn classify(value: f64) -> Self {
        if value >= 0.5 {
            ModeState::Fk
        } else {
            ModeState::Ik
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            ModeState::Ik => ModeState::Fk,
            ModeState::Fk => ModeState::Ik,
        }
    }
}

/// Where the IK pole position came from on an FK→IK switch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoleSource {
    Analytic,
    PoleMatch,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchReport {
    pub from: ModeState,
    pub to: ModeState,
    /// Set on FK→IK switches.
    pub pole_source: Option<PoleSource>,
    /// Set when the stretch solver ran.
    pub convergence: Option<ConvergenceReport>,
    /// Best-effort writes (channel resets, foot zeroing).
    pub writes: ApplyReport,
}

pub fn current_mode<S: SceneGraph + ?Sized>(scene: &S, limb: &Limb) -> SwitchResult<ModeState> {
    Ok(ModeState::classify(scene.attribute(&limb.mode_plug())?))
}

/// True only when the persisted flag holds exactly `target`. A blended flag
/// is never settled, whichever side of 0.5 it sits on.
pub fn is_settled<S: SceneGraph + ?Sized>(scene: &S, limb: &Limb, target: ModeState) -> SwitchResult<bool> {
    let value = scene.attribute(&limb.mode_plug())?;
    Ok((value - target.value()).abs() <= MODE_EPSILON)
}

/// Every node the transition towards `target` touches must exist.
fn check_references<S: SceneGraph + ?Sized>(scene: &S, limb: &Limb, target: ModeState) -> SwitchResult<()> {
    let mut nodes: Vec<&NodePath> = vec![&limb.param];
    match target {
        ModeState::Fk => {
            nodes.extend(limb.fk_controls.iter());
            nodes.push(&limb.fk_gimbal);
            nodes.extend(limb.ik_match.iter());
        }
        ModeState::Ik => {
            nodes.extend([
                &limb.ik.pole,
                &limb.ik.end_effector,
                &limb.ik.gimbal,
                &limb.ik.pivot,
            ]);
            nodes.extend(limb.fk_match.iter());
            nodes.push(limb.fk_mid_control());
            nodes.push(&limb.ik_match[1]);
            nodes.extend(limb.pole_match.iter());
        }
    }
    nodes.extend(limb.clavicle.iter());
    match nodes.into_iter().find(|n| !scene.exists(n)) {
        Some(missing) => Err(SceneError::NodeNotFound(missing.clone()).into()),
        None => Ok(()),
    }
}

/// Run the transition to `target`. `Ok(None)` when the limb is already there.
pub fn switch<S: SceneGraph + ?Sized>(
    scene: &mut S,
    limb: &Limb,
    target: ModeState,
    config: &SwitchConfig,
) -> SwitchResult<Option<SwitchReport>> {
    if is_settled(scene, limb, target)? {
        log::debug!("'{}' already in {target:?}", limb.param);
        return Ok(None);
    }
    if current_mode(scene, limb)? == target {
        log::debug!("'{}' flag is blended, driving it to {target:?}", limb.param);
    }
    let from = target.opposite();
    check_references(scene, limb, target)?;
    let report = match target {
        ModeState::Fk => to_fk(scene, limb, config)?,
        ModeState::Ik => to_ik(scene, limb, config)?,
    };
    log::debug!("'{}' switched {from:?} -> {target:?}", limb.param);
    Ok(Some(report))
}

fn to_fk<S: SceneGraph + ?Sized>(scene: &mut S, limb: &Limb, config: &SwitchConfig) -> SwitchResult<SwitchReport> {
    let snapshot = PoseSnapshot::capture_for_fk(scene, limb)?;
    log::debug!(
        "'{}' IK snapshot taken, bone axis {:?}, scales {:?}",
        limb.param,
        snapshot.aim,
        snapshot.stretch_scales
    );

    let writes = apply_best_effort(
        scene,
        &[attrs::PV_PIN, attrs::TWIST]
            .into_iter()
            .map(|attr| WriteOp::new(limb.param_plug(attr), 0.0))
            .collect::<WriteBatch>(),
    );

    scene.commit(&limb.mode_plug(), ModeState::Fk.value())?;
    scene.set_local_rotation(&limb.fk_gimbal, Vec3::zeros())?;
    snapshot.restore_rotations(scene, &limb.fk_controls)?;

    if let Some([top, bottom]) = snapshot.stretch_scales {
        let channels = limb.stretch_channels();
        scene.set_attribute(&channels.top, top)?;
        scene.set_attribute(&channels.bottom, bottom)?;
    }

    if limb.clavicle.is_some() {
        for _ in 0..config.clavicle_iterations {
            snapshot.restore_rotations(scene, &limb.fk_controls)?;
            snapshot.restore_clavicle(scene, limb)?;
        }
    }

    Ok(SwitchReport {
        from: ModeState::Ik,
        to: ModeState::Fk,
        pole_source: None,
        convergence: None,
        writes,
    })
}

fn pole_position<S: SceneGraph + ?Sized>(
    scene: &S,
    limb: &Limb,
    config: &SwitchConfig,
) -> SwitchResult<(Vec3, PoleSource)> {
    let [p0, p1, p2] = [
        scene.world_position(&limb.fk_match[0])?,
        scene.world_position(&limb.fk_match[1])?,
        scene.world_position(&limb.fk_match[2])?,
    ];
    let analytic = || pole_vector_position(p0, p1, p2, config.pole_distance, config.pole_max_doublings);

    if !is_near_colinear(p0, p1, p2, config.colinear_threshold) {
        return Ok((analytic(), PoleSource::Analytic));
    }
    match &limb.pole_match {
        Some(node) => Ok((scene.world_position(node)?, PoleSource::PoleMatch)),
        None => {
            log::warn!(
                "'{}' is straight and has no pole match node; using the analytic pole",
                limb.param
            );
            Ok((analytic(), PoleSource::Analytic))
        }
    }
}

fn to_ik<S: SceneGraph + ?Sized>(scene: &mut S, limb: &Limb, config: &SwitchConfig) -> SwitchResult<SwitchReport> {
    scene.set_local_rotation(&limb.ik.pivot, Vec3::zeros())?;
    scene.set_local_translation(&limb.ik.pivot, Vec3::zeros())?;

    let (pole, pole_source) = pole_position(scene, limb, config)?;
    let snapshot = PoseSnapshot::capture_for_ik(scene, limb)?;
    let end_matrix = snapshot.end_matrix.ok_or_else(|| SwitchError::Data {
        plug: limb.param_plug(attrs::FK_MATCH_TRANSFORMS),
        reason: "end match joint matrix was not captured".into(),
    })?;
    log::debug!("'{}' FK snapshot taken, pole from {pole_source:?}", limb.param);

    scene.commit(&limb.mode_plug(), ModeState::Ik.value())?;
    scene.set_world_matrix(&limb.ik.end_effector, end_matrix)?;
    scene.set_world_position(&limb.ik.pole, pole)?;
    scene.set_local_rotation(&limb.ik.gimbal, Vec3::zeros())?;
    snapshot.restore_clavicle(scene, limb)?;

    let mut convergence = None;
    if limb.clavicle.is_some() {
        let target = scene.world_position(limb.fk_mid_control())?;
        let drift = (target - scene.world_position(&limb.ik_match[1])?).norm();
        if drift > config.drift_threshold {
            log::debug!("'{}' mid joint drifted {drift:.4}, matching stretch", limb.param);
            convergence = Some(converge(
                scene,
                &limb.stretch_channels(),
                target,
                &limb.ik_match[1],
                &config.converge_params(),
            )?);
        }
    }

    Ok(SwitchReport {
        from: ModeState::Fk,
        to: ModeState::Ik,
        pole_source: Some(pole_source),
        convergence,
        writes: ApplyReport::default(),
    })
}

/// Copy the IK match joints' world matrices onto `fk_targets` (root, mid, end).
pub fn fk_match_ik<S: SceneGraph + ?Sized>(
    scene: &mut S,
    fk_targets: &[NodePath],
    ik_joints: &[NodePath],
) -> SwitchResult<()> {
    if fk_targets.len() != 3 || ik_joints.len() != 3 {
        return Err(SwitchError::Descriptor(DescriptorError::ListLength {
            field: "fk_match_ik joints",
            expected: 3,
            found: fk_targets.len().min(ik_joints.len()),
        }));
    }
    for (target, source) in fk_targets.iter().zip(ik_joints) {
        let matrix = scene.world_matrix(source)?;
        scene.set_world_matrix(target, matrix)?;
    }
    Ok(())
}

/// Place an IK driver and its pole from three FK joints. The pole comes from
/// `pole_match` when given, otherwise from the analytic formula.
pub fn ik_match_fk<S: SceneGraph + ?Sized>(
    scene: &mut S,
    fk_joints: &[NodePath; 3],
    ik_driver: &NodePath,
    pole_driver: &NodePath,
    pole_match: Option<&NodePath>,
    config: &SwitchConfig,
) -> SwitchResult<PoleSource> {
    let (pole, source) = match pole_match {
        Some(node) => (scene.world_position(node)?, PoleSource::PoleMatch),
        None => {
            let [p0, p1, p2] = [
                scene.world_position(&fk_joints[0])?,
                scene.world_position(&fk_joints[1])?,
                scene.world_position(&fk_joints[2])?,
            ];
            (
                pole_vector_position(p0, p1, p2, config.pole_distance, config.pole_max_doublings),
                PoleSource::Analytic,
            )
        }
    };
    let end = scene.world_matrix(&fk_joints[2])?;
    scene.set_world_position(pole_driver, pole)?;
    scene.set_world_matrix(ik_driver, end)?;
    log::trace!("ik driver '{ik_driver}' matched onto '{}'", fk_joints[2]);
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{IkControls, LimbDescriptor, MatchChain};
    use limbswitch_scene_core::{compose_matrix, MemoryScene, SceneGraph};

    fn descriptor() -> LimbDescriptor {
        LimbDescriptor {
            param_node: "param".into(),
            namespace: String::new(),
            fk_controls: vec!["fk0".into(), "fk1".into(), "fk2".into(), "fk_gimbal".into()],
            ik_controls: IkControls {
                pole: "pv".into(),
                end_effector: "ik".into(),
                gimbal: "ik_gimbal".into(),
                pivot: "ik_pivot".into(),
            },
            fk_match: MatchChain {
                root: "fkm0".into(),
                mid: "fkm1".into(),
                end: "fkm2".into(),
            },
            ik_match: MatchChain {
                root: "ikm0".into(),
                mid: "ikm1".into(),
                end: "ikm2".into(),
            },
            pole_match: Some("pv_match".into()),
            clavicle: None,
            foot: None,
        }
    }

    fn scene(limb: &Limb, mode: ModeState) -> MemoryScene {
        let mut scene = MemoryScene::new();
        for node in limb
            .fk_controls
            .iter()
            .chain([&limb.fk_gimbal, &limb.ik.pole, &limb.ik.end_effector, &limb.ik.gimbal, &limb.ik.pivot])
            .chain(limb.fk_match.iter())
            .chain(limb.ik_match.iter())
            .chain(limb.pole_match.iter())
        {
            scene.add_node(node.clone());
        }
        for attr in [attrs::PV_PIN, attrs::TWIST, attrs::STRETCH_TOP, attrs::STRETCH_BOTTOM] {
            scene.add_attribute(limb.param_plug(attr), 1.0, true);
        }
        scene.add_attribute(limb.mode_plug(), mode.value(), true);
        scene
    }

    fn place(scene: &mut MemoryScene, node: &NodePath, t: Vec3) {
        scene.set_world_position(node, t).unwrap();
    }

    #[test]
    fn mode_requests_must_be_exact() {
        assert_eq!(ModeState::from_request(1.0), Some(ModeState::Fk));
        assert_eq!(ModeState::from_request(0.0), Some(ModeState::Ik));
        assert_eq!(ModeState::from_request(0.5), None);
        assert_eq!(ModeState::classify(0.7), ModeState::Fk);
        assert_eq!(ModeState::Fk.opposite(), ModeState::Ik);
    }

    #[test]
    fn blended_flag_is_driven_to_the_request() {
        let limb = descriptor().resolve().unwrap();
        let mut s = scene(&limb, ModeState::Fk);
        s.set_attribute(&limb.mode_plug(), 0.3).unwrap();
        assert_eq!(current_mode(&s, &limb).unwrap(), ModeState::Ik);
        assert!(!is_settled(&s, &limb, ModeState::Ik).unwrap());

        let report = switch(&mut s, &limb, ModeState::Ik, &SwitchConfig::default())
            .unwrap()
            .expect("a blended flag is not a no-op");
        assert_eq!((report.from, report.to), (ModeState::Fk, ModeState::Ik));
        assert_eq!(s.attribute(&limb.mode_plug()).unwrap(), 0.0);
        assert!(is_settled(&s, &limb, ModeState::Ik).unwrap());
    }

    #[test]
    fn same_mode_is_a_no_op() {
        let limb = descriptor().resolve().unwrap();
        let mut s = scene(&limb, ModeState::Fk);
        let writes = s.attribute_writes;
        let out = switch(&mut s, &limb, ModeState::Fk, &SwitchConfig::default()).unwrap();
        assert!(out.is_none());
        assert_eq!(s.attribute_writes, writes);
    }

    #[test]
    fn straight_chain_uses_pole_match() {
        let limb = descriptor().resolve().unwrap();
        let mut s = scene(&limb, ModeState::Fk);
        place(&mut s, &limb.fk_match[0], Vec3::new(0.0, 0.0, 0.0));
        place(&mut s, &limb.fk_match[1], Vec3::new(5.0, 0.0, 0.0));
        place(&mut s, &limb.fk_match[2], Vec3::new(10.0, 0.0, 0.0));
        let pv_match = limb.pole_match.clone().unwrap();
        place(&mut s, &pv_match, Vec3::new(5.0, 0.0, -8.0));

        let report = switch(&mut s, &limb, ModeState::Ik, &SwitchConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(report.pole_source, Some(PoleSource::PoleMatch));
        assert_eq!(s.world_position(&limb.ik.pole).unwrap(), Vec3::new(5.0, 0.0, -8.0));
        assert_eq!(s.world_position(&limb.ik.end_effector).unwrap(), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(s.attribute(&limb.mode_plug()).unwrap(), 0.0);
        assert!(report.convergence.is_none());
    }

    #[test]
    fn bent_chain_uses_analytic_pole() {
        let limb = descriptor().resolve().unwrap();
        let mut s = scene(&limb, ModeState::Fk);
        place(&mut s, &limb.fk_match[0], Vec3::new(0.0, 0.0, 0.0));
        place(&mut s, &limb.fk_match[1], Vec3::new(5.0, 2.0, 0.0));
        place(&mut s, &limb.fk_match[2], Vec3::new(10.0, 0.0, 0.0));

        let report = switch(&mut s, &limb, ModeState::Ik, &SwitchConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(report.pole_source, Some(PoleSource::Analytic));
        let pole = s.world_position(&limb.ik.pole).unwrap();
        assert!((pole - Vec3::new(5.0, 16.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn to_fk_transfers_rotations_and_scales() {
        let limb = descriptor().resolve().unwrap();
        let mut s = scene(&limb, ModeState::Ik);
        s.set_local_translation(limb.fk_mid_control(), Vec3::new(0.0, -5.0, 0.0))
            .unwrap();
        s.set_local_scale(&limb.ik_match[0], Vec3::new(1.0, 1.25, 1.0)).unwrap();
        s.set_local_scale(&limb.ik_match[1], Vec3::new(1.0, 1.5, 1.0)).unwrap();
        let rotation = Vec3::new(0.0, 0.0, 30.0);
        for joint in &limb.ik_match {
            s.set_world_matrix(joint, compose_matrix(Vec3::zeros(), rotation))
                .unwrap();
        }
        s.set_local_rotation(&limb.fk_gimbal, Vec3::new(3.0, 4.0, 5.0)).unwrap();

        let report = switch(&mut s, &limb, ModeState::Fk, &SwitchConfig::default())
            .unwrap()
            .unwrap();
        assert!(report.writes.is_clean());
        assert_eq!(report.writes.applied, 2);
        assert_eq!(s.attribute(&limb.param_plug(attrs::STRETCH_TOP)).unwrap(), 1.25);
        assert_eq!(s.attribute(&limb.param_plug(attrs::STRETCH_BOTTOM)).unwrap(), 1.5);
        assert_eq!(s.attribute(&limb.param_plug(attrs::PV_PIN)).unwrap(), 0.0);
        assert_eq!(s.local_rotation(&limb.fk_gimbal).unwrap(), Vec3::zeros());
        for ctrl in &limb.fk_controls {
            assert!((s.world_rotation(ctrl).unwrap() - rotation).norm() < 1e-9);
        }
    }

    #[test]
    fn missing_node_aborts_before_the_flag_moves() {
        let limb = descriptor().resolve().unwrap();
        let mut s = MemoryScene::new();
        s.add_attribute(limb.mode_plug(), 1.0, true);
        let err = switch(&mut s, &limb, ModeState::Ik, &SwitchConfig::default()).unwrap_err();
        assert!(matches!(err, SwitchError::Reference(SceneError::NodeNotFound(_))));
        assert_eq!(s.attribute(&limb.mode_plug()).unwrap(), 1.0);
    }

    #[test]
    fn fk_match_ik_copies_matrices() {
        let limb = descriptor().resolve().unwrap();
        let mut s = scene(&limb, ModeState::Ik);
        let m = compose_matrix(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, 45.0));
        s.set_world_matrix(&limb.ik_match[2], m).unwrap();
        fk_match_ik(&mut s, &limb.fk_match, &limb.ik_match).unwrap();
        assert_eq!(s.world_matrix(&limb.fk_match[2]).unwrap(), m);
        assert!(fk_match_ik(&mut s, &limb.fk_match[..2], &limb.ik_match).is_err());
    }

    #[test]
    fn ik_match_fk_prefers_the_given_pole_match() {
        let limb = descriptor().resolve().unwrap();
        let mut s = scene(&limb, ModeState::Fk);
        place(&mut s, &limb.fk_match[0], Vec3::new(0.0, 0.0, 0.0));
        place(&mut s, &limb.fk_match[1], Vec3::new(5.0, 2.0, 0.0));
        place(&mut s, &limb.fk_match[2], Vec3::new(10.0, 0.0, 0.0));
        let pv_match = limb.pole_match.clone().unwrap();
        place(&mut s, &pv_match, Vec3::new(4.0, 4.0, 4.0));
        let config = SwitchConfig::default();

        let source = ik_match_fk(&mut s, &limb.fk_match, &limb.ik.end_effector, &limb.ik.pole, Some(&pv_match), &config)
            .unwrap();
        assert_eq!(source, PoleSource::PoleMatch);
        assert_eq!(s.world_position(&limb.ik.pole).unwrap(), Vec3::new(4.0, 4.0, 4.0));
        assert_eq!(s.world_position(&limb.ik.end_effector).unwrap(), Vec3::new(10.0, 0.0, 0.0));

        let source = ik_match_fk(&mut s, &limb.fk_match, &limb.ik.end_effector, &limb.ik.pole, None, &config).unwrap();
        assert_eq!(source, PoleSource::Analytic);
        assert!((s.world_position(&limb.ik.pole).unwrap() - Vec3::new(5.0, 16.0, 0.0)).norm() < 1e-9);
        // matching never touches the mode flag
        assert_eq!(s.attribute(&limb.mode_plug()).unwrap(), 1.0);
    }
}
