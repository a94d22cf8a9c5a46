use limbswitch_scene_core::{
    apply_best_effort, MemoryScene, SceneError, SceneGraph, Scope, UndoChunk, WriteBatch, WriteOp,
};

#[test]
fn authored_batch_applies_best_effort_inside_one_undo_chunk() {
    let scope = Scope::from_prefix("charB:").unwrap();
    let heel = scope.resolve("l_heel_pivot").unwrap();
    let toe = scope.resolve("l_toe_pivot").unwrap();

    let mut scene = MemoryScene::new();
    scene.add_attribute(heel.plug("heelRoll"), 7.0, true);
    scene.add_attribute(toe.plug("toeTap"), 3.0, true);
    scene.add_attribute(toe.plug("rz"), -2.0, true);
    scene.lock(&toe.plug("toeTap"));

    let batch: WriteBatch = serde_json::from_str(
        r#"[
            { "plug": "charB:l_heel_pivot.heelRoll", "value": 0.0 },
            { "plug": "charB:l_toe_pivot.toeTap", "value": 0.0 },
            { "plug": "charB:l_toe_pivot.bank", "value": 0.0 },
            { "plug": "charB:l_toe_pivot.rz", "value": 0.0 }
        ]"#,
    )
    .unwrap();
    assert_eq!(batch.len(), 4);
    assert_eq!(batch.0[0], WriteOp::new(heel.plug("heelRoll"), 0.0));

    let report = {
        let mut chunk = UndoChunk::open(&mut scene);
        apply_best_effort(&mut *chunk, &batch)
    };
    assert_eq!(scene.undo_depth, 0);
    assert_eq!(scene.undo_chunks_closed, 1);

    assert_eq!(report.applied, 2);
    let reasons: Vec<&SceneError> = report.failed.iter().map(|f| &f.error).collect();
    assert_eq!(
        reasons,
        vec![
            &SceneError::Locked(toe.plug("toeTap")),
            &SceneError::AttributeNotFound(toe.plug("bank")),
        ]
    );
    assert_eq!(scene.attribute(&heel.plug("heelRoll")).unwrap(), 0.0);
    assert_eq!(scene.attribute(&toe.plug("toeTap")).unwrap(), 3.0);
    assert_eq!(scene.attribute(&toe.plug("rz")).unwrap(), 0.0);
}

#[test]
fn batch_round_trips_through_json() {
    let scope = Scope::from_prefix("charB:").unwrap();
    let param = scope.resolve("l_arm_param").unwrap();
    let batch: WriteBatch = ["pvPin", "twist"]
        .into_iter()
        .map(|attr| WriteOp::new(param.plug(attr), 0.0))
        .collect();
    let text = serde_json::to_string(&batch).unwrap();
    assert_eq!(
        text,
        r#"[{"plug":"charB:l_arm_param.pvPin","value":0.0},{"plug":"charB:l_arm_param.twist","value":0.0}]"#
    );
    let back: WriteBatch = serde_json::from_str(&text).unwrap();
    assert_eq!(back, batch);
}
