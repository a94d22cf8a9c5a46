use limbswitch_core::{arm_switch, Limb, LimbDescriptor, ModeState, PoleSource, SwitchConfig, SwitchOutcome};
use limbswitch_scene_core::{SceneGraph, Vec3};
use limbswitch_test_fixtures::{limbs, PlanarRig};

fn approx(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn arm() -> (PlanarRig, Limb) {
    let descriptor: LimbDescriptor = limbs::load("arm").expect("load arm fixture");
    let limb = descriptor.resolve().expect("arm fixture resolves");
    (PlanarRig::arm("charA:"), limb)
}

fn request(rig: &mut PlanarRig, mode: ModeState, limb: &Limb, config: &SwitchConfig) -> SwitchOutcome {
    rig.set_param_value("ikfk_switch", mode.value())
        .expect("ikfk_switch is authored");
    arm_switch(rig, limb, config)
}

#[test]
fn fk_to_ik_to_fk_restores_fk_pose() {
    let (mut rig, limb) = arm();
    let config = SwitchConfig::default();
    let before = rig.fk_angles();

    let outcome = request(&mut rig, ModeState::Ik, &limb, &config);
    let report = outcome.report().expect("switched to IK");
    assert_eq!((report.from, report.to), (ModeState::Fk, ModeState::Ik));
    assert_eq!(report.pole_source, Some(PoleSource::Analytic));
    assert!(report.convergence.is_none());
    approx(rig.param_value("ikfk", -1.0), 0.0, 0.0);

    let ik_mid = rig.world_position(&limb.ik_match[1]).expect("ik mid");
    let fk_mid = rig.world_position(&limb.fk_match[1]).expect("fk mid");
    assert!((ik_mid - fk_mid).norm() < 1e-6, "ik {ik_mid:?} fk {fk_mid:?}");

    // scramble the now-idle FK controls; IK→FK must rebuild them from the IK chain
    rig.set_fk_pose([0.0, 0.0, 0.0], 0.0);

    let outcome = request(&mut rig, ModeState::Fk, &limb, &config);
    assert!(matches!(outcome, SwitchOutcome::Switched(_)));
    approx(rig.param_value("ikfk", -1.0), 1.0, 0.0);
    for (want, got) in before.iter().zip(rig.fk_angles()) {
        approx(got, *want, 1e-6);
    }
    approx(rig.param_value("stretchTop", 0.0), 1.0, 1e-9);
    approx(rig.param_value("stretchBottom", 0.0), 1.0, 1e-9);
}

#[test]
fn flag_is_committed_with_a_double_write() {
    let (mut rig, limb) = arm();
    let config = SwitchConfig::default();

    let writes = rig.store().attribute_writes;
    request(&mut rig, ModeState::Ik, &limb, &config);
    // ikfk_switch itself, then ikfk twice
    assert_eq!(rig.store().attribute_writes - writes, 3);

    let writes = rig.store().attribute_writes;
    request(&mut rig, ModeState::Fk, &limb, &config);
    // ikfk_switch, pvPin, twist, ikfk twice, stretchTop, stretchBottom
    assert_eq!(rig.store().attribute_writes - writes, 7);
}

#[test]
fn blended_flag_still_switches_and_lands_on_the_request() {
    let (mut rig, limb) = arm();
    rig.set_param_value("ikfk", 0.3).expect("ikfk is authored");

    let outcome = request(&mut rig, ModeState::Ik, &limb, &SwitchConfig::default());
    let report = outcome.report().expect("a blended flag is not a no-op");
    assert_eq!((report.from, report.to), (ModeState::Fk, ModeState::Ik));
    approx(rig.param_value("ikfk", -1.0), 0.0, 0.0);
    let (hand, _, _) = rig.ik_hand();
    let wrist = rig.world_position(&limb.fk_match[2]).expect("fk wrist");
    assert!((hand - wrist).norm() < 1e-9);

    // once exact, the same request is a no-op
    let outcome = request(&mut rig, ModeState::Ik, &limb, &SwitchConfig::default());
    assert!(matches!(outcome, SwitchOutcome::Unchanged(ModeState::Ik)));
}

#[test]
fn each_switch_is_one_closed_undo_chunk() {
    let (mut rig, limb) = arm();
    let config = SwitchConfig::default();
    request(&mut rig, ModeState::Ik, &limb, &config);
    request(&mut rig, ModeState::Fk, &limb, &config);
    request(&mut rig, ModeState::Fk, &limb, &config);
    assert_eq!(rig.store().undo_depth, 0);
    assert_eq!(rig.store().undo_chunks_closed, 3);
}

#[test]
fn going_to_ik_resets_pivot_and_gimbal() {
    let (mut rig, limb) = arm();
    rig.set_ik_pivot(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, 30.0));
    rig.set_local_rotation(&limb.ik.gimbal, Vec3::new(0.0, 0.0, 12.0))
        .expect("ik gimbal rotates");

    request(&mut rig, ModeState::Ik, &limb, &SwitchConfig::default());
    assert_eq!(rig.ik_pivot(), (Vec3::zeros(), Vec3::zeros()));
    let (hand, angle, gimbal) = rig.ik_hand();
    assert_eq!(gimbal, 0.0);
    let wrist = rig.world_position(&limb.fk_match[2]).expect("fk wrist");
    assert!((hand - wrist).norm() < 1e-9);
    approx(angle, 10.0 - 40.0 + 15.0, 1e-9);
}

#[test]
fn going_to_fk_clears_pin_and_twist_and_folds_gimbal() {
    let (mut rig, limb) = arm();
    let config = SwitchConfig::default();
    rig.set_fk_pose([10.0, -40.0, 15.0], 20.0);
    request(&mut rig, ModeState::Ik, &limb, &config);

    let outcome = request(&mut rig, ModeState::Fk, &limb, &config);
    let report = outcome.report().expect("switched to FK");
    assert!(report.writes.is_clean());
    assert_eq!(report.writes.applied, 2);
    approx(rig.param_value("pvPin", -1.0), 0.0, 0.0);
    approx(rig.param_value("twist", -1.0), 0.0, 0.0);

    // the gimbal is zeroed and its rotation lands on the wrist control
    assert_eq!(rig.fk_gimbal(), 0.0);
    let [a1, a2, a3] = rig.fk_angles();
    approx(a1, 10.0, 1e-6);
    approx(a2, -40.0, 1e-6);
    approx(a3, 35.0, 1e-6);
}

#[test]
fn straight_arm_takes_the_authored_pole() {
    let (mut rig, limb) = arm();
    rig.set_fk_pose([0.0, 0.0, 0.0], 0.0);
    let pv_match = limb.pole_match.clone().expect("arm fixture has a pv match");
    rig.set_world_position(&pv_match, Vec3::new(5.0, 7.5, 0.0))
        .expect("pv match moves");

    let outcome = request(&mut rig, ModeState::Ik, &limb, &SwitchConfig::default());
    let report = outcome.report().expect("switched to IK");
    assert_eq!(report.pole_source, Some(PoleSource::PoleMatch));
    let pole = rig.world_position(&limb.ik.pole).expect("pole");
    assert_eq!(pole, Vec3::new(5.0, 7.5, 0.0));
}

#[test]
fn straight_arm_without_pole_match_falls_back_to_analytic() {
    let mut descriptor: LimbDescriptor = limbs::load("arm").expect("load arm fixture");
    descriptor.pole_match = None;
    let limb = descriptor.resolve().expect("resolves");
    let mut rig = PlanarRig::arm("charA:").without_pole_match();
    rig.set_fk_pose([0.0, 0.0, 0.0], 0.0);

    let outcome = request(&mut rig, ModeState::Ik, &limb, &SwitchConfig::default());
    let report = outcome.report().expect("switched to IK");
    assert_eq!(report.pole_source, Some(PoleSource::Analytic));
}

#[test]
fn missing_control_fails_and_keeps_mode() {
    let mut descriptor: LimbDescriptor = limbs::load("arm").expect("load arm fixture");
    descriptor.ik_controls.pole = "l_arm_pv_typo".into();
    let limb = descriptor.resolve().expect("names are well formed");
    let mut rig = PlanarRig::arm("charA:");

    let outcome = request(&mut rig, ModeState::Ik, &limb, &SwitchConfig::default());
    assert!(outcome.is_failed());
    approx(rig.param_value("ikfk", -1.0), 1.0, 0.0);
    assert_eq!(rig.store().undo_depth, 0);
}
