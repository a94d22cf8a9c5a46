//! Batched scalar attribute writes and best-effort application.
//!
//! WriteOp serializes to JSON as:
//!   { "plug": "rig1:l_foot_ik_ctrl.heelRoll", "value": 0.0 }
//!
//! Some writes in a switch are allowed to fail (locked or non-settable
//! channels on foot controls, optional pin/twist attributes). Those go through
//! [`apply_best_effort`], which records every failure instead of dropping it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node_path::Plug;
use crate::scene::{SceneError, SceneGraph};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOp {
    pub plug: Plug,
    pub value: f64,
}

impl WriteOp {
    pub fn new(plug: Plug, value: f64) -> Self {
        Self { plug, value }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ plug: {}, value: {} }}", self.plug, self.value)
    }
}

/// An ordered batch of write operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch(pub Vec<WriteOp>);

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch(Vec::new())
    }

    pub fn push(&mut self, op: WriteOp) {
        self.0.push(op);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = WriteOp>) {
        self.0.extend(other);
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteOp> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        WriteBatch(iter.into_iter().collect())
    }
}

/// A write that did not land, with the reason the host gave.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedWrite {
    pub op: WriteOp,
    pub error: SceneError,
}

/// Outcome of a best-effort batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: Vec<FailedWrite>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ApplyReport) {
        self.applied += other.applied;
        self.failed.extend(other.failed);
    }
}

/// Apply every write in order; failures are recorded and never abort the batch.
pub fn apply_best_effort<S: SceneGraph + ?Sized>(scene: &mut S, batch: &WriteBatch) -> ApplyReport {
    let mut report = ApplyReport::default();
    for op in batch.iter() {
        match scene.set_attribute(&op.plug, op.value) {
            Ok(()) => report.applied += 1,
            Err(error) => {
                log::warn!("best-effort write {op} skipped: {error}");
                report.failed.push(FailedWrite {
                    op: op.clone(),
                    error,
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryScene;
    use crate::node_path::NodePath;

    #[test]
    fn writeop_json_shape() {
        let op = WriteOp::new(Plug::parse("rig1:ctrl.heelRoll").unwrap(), 0.0);
        let s = serde_json::to_string(&op).unwrap();
        assert_eq!(s, r#"{"plug":"rig1:ctrl.heelRoll","value":0.0}"#);
        let parsed: WriteOp = serde_json::from_str(&s).unwrap();
        assert_eq!(op, parsed);
    }

    #[test]
    fn best_effort_records_failures_and_keeps_going() {
        let ctrl = NodePath::parse("foot_ctrl").unwrap();
        let mut scene = MemoryScene::new();
        scene.add_node(ctrl.clone());
        scene.add_attribute(ctrl.plug("heelRoll"), 12.0, true);
        scene.add_attribute(ctrl.plug("toeRoll"), 4.0, true);
        scene.lock(&ctrl.plug("toeRoll"));

        let batch: WriteBatch = ["heelRoll", "toeRoll", "missing"]
            .into_iter()
            .map(|attr| WriteOp::new(ctrl.plug(attr), 0.0))
            .collect();
        let report = apply_best_effort(&mut scene, &batch);

        assert_eq!(report.applied, 1);
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(report.failed[0].error, SceneError::Locked(_)));
        assert!(matches!(
            report.failed[1].error,
            SceneError::AttributeNotFound(_)
        ));
        assert_eq!(scene.attribute(&ctrl.plug("heelRoll")).unwrap(), 0.0);
        assert_eq!(scene.attribute(&ctrl.plug("toeRoll")).unwrap(), 4.0);
    }
}
