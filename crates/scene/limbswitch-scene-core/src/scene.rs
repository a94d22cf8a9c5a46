//! The narrow scene-graph accessor the switching engine talks to.
//!
//! Reads may trigger host-side evaluation of upstream nodes; every write is
//! visible to the next read in the same call stack. Rotations are world-space
//! Euler angles in degrees (XYZ order), matrices are column-vector world
//! transforms.

use std::ops::{Deref, DerefMut};

use nalgebra::{Matrix4, Vector3};
use thiserror::Error;

use crate::node_path::{NodePath, Plug};

pub type Vec3 = Vector3<f64>;
pub type Mat4 = Matrix4<f64>;

/// Errors surfaced by a scene accessor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("node '{0}' does not exist")]
    NodeNotFound(NodePath),
    #[error("attribute '{0}' does not exist")]
    AttributeNotFound(Plug),
    #[error("attribute '{0}' is locked")]
    Locked(Plug),
    #[error("attribute '{plug}' holds {found}, expected {expected}")]
    WrongKind {
        plug: Plug,
        expected: &'static str,
        found: &'static str,
    },
    #[error("operation '{op}' is not supported on '{node}'")]
    Unsupported { node: NodePath, op: &'static str },
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Host scene primitives consumed by the switching engine. Implementations
/// never create or delete nodes on behalf of the engine.
pub trait SceneGraph {
    fn exists(&self, node: &NodePath) -> bool;
    fn has_attribute(&self, plug: &Plug) -> bool;

    fn world_position(&self, node: &NodePath) -> SceneResult<Vec3>;
    fn set_world_position(&mut self, node: &NodePath, position: Vec3) -> SceneResult<()>;

    /// World rotation as XYZ Euler angles in degrees.
    fn world_rotation(&self, node: &NodePath) -> SceneResult<Vec3>;
    fn set_world_rotation(&mut self, node: &NodePath, degrees: Vec3) -> SceneResult<()>;

    fn world_matrix(&self, node: &NodePath) -> SceneResult<Mat4>;
    fn set_world_matrix(&mut self, node: &NodePath, matrix: Mat4) -> SceneResult<()>;

    fn local_translation(&self, node: &NodePath) -> SceneResult<Vec3>;
    fn set_local_translation(&mut self, node: &NodePath, value: Vec3) -> SceneResult<()>;
    fn set_local_rotation(&mut self, node: &NodePath, degrees: Vec3) -> SceneResult<()>;
    fn local_scale(&self, node: &NodePath) -> SceneResult<Vec3>;

    /// Scalar attribute value.
    fn attribute(&self, plug: &Plug) -> SceneResult<f64>;
    fn set_attribute(&mut self, plug: &Plug, value: f64) -> SceneResult<()>;
    /// String attribute value (authored list literals, node names).
    fn text_attribute(&self, plug: &Plug) -> SceneResult<String>;

    /// Keyable scalar attributes declared on a node.
    fn keyable_attributes(&self, node: &NodePath) -> SceneResult<Vec<String>>;
    /// Destination nodes connected downstream of a plug.
    fn connections(&self, plug: &Plug) -> SceneResult<Vec<NodePath>>;

    fn open_undo_chunk(&mut self);
    fn close_undo_chunk(&mut self);

    /// Commit a state flag and wait for the graph to settle.
    ///
    /// Pull-based hosts only re-propagate once the flag is read back, so the
    /// default writes, reads, and writes again. Hosts that push eagerly may
    /// override this with a single write.
    fn commit(&mut self, plug: &Plug, value: f64) -> SceneResult<()> {
        self.set_attribute(plug, value)?;
        self.attribute(plug)?;
        self.set_attribute(plug, value)
    }
}

/// Scoped undo chunk: opened on construction, closed on every exit path.
pub struct UndoChunk<'a, S: SceneGraph + ?Sized> {
    scene: &'a mut S,
}

impl<'a, S: SceneGraph + ?Sized> UndoChunk<'a, S> {
    pub fn open(scene: &'a mut S) -> Self {
        scene.open_undo_chunk();
        Self { scene }
    }
}

impl<S: SceneGraph + ?Sized> Deref for UndoChunk<'_, S> {
    type Target = S;
    fn deref(&self) -> &S {
        self.scene
    }
}

impl<S: SceneGraph + ?Sized> DerefMut for UndoChunk<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.scene
    }
}

impl<S: SceneGraph + ?Sized> Drop for UndoChunk<'_, S> {
    fn drop(&mut self) {
        self.scene.close_undo_chunk();
    }
}

/// Translation column of a world matrix.
#[inline]
pub fn matrix_translation(m: &Mat4) -> Vec3 {
    Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// Build a world matrix from a translation and XYZ Euler degrees.
pub fn compose_matrix(translation: Vec3, degrees: Vec3) -> Mat4 {
    let r = degrees.map(f64::to_radians);
    let rot = nalgebra::Rotation3::from_euler_angles(r.x, r.y, r.z);
    let mut m = rot.to_homogeneous();
    m[(0, 3)] = translation.x;
    m[(1, 3)] = translation.y;
    m[(2, 3)] = translation.z;
    m
}

/// XYZ Euler degrees of the rotation part of a world matrix (scale ignored).
pub fn matrix_rotation_degrees(m: &Mat4) -> Vec3 {
    let mut basis = m.fixed_view::<3, 3>(0, 0).into_owned();
    for mut col in basis.column_iter_mut() {
        let n = col.norm();
        if n > f64::EPSILON {
            col /= n;
        }
    }
    let rot = nalgebra::Rotation3::from_matrix_unchecked(basis);
    let (x, y, z) = rot.euler_angles();
    Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
}
