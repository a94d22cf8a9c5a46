//! limbswitch-scene-core: host scene surface (node paths, accessor trait, batched writes)

pub mod literal;
pub mod memory;
pub mod node_path;
pub mod scene;
pub mod write_ops;

pub use literal::LiteralError;
pub use memory::MemoryScene;
pub use node_path::{NodePath, Plug, Scope};
pub use scene::{
    compose_matrix, matrix_rotation_degrees, matrix_translation, Mat4, SceneError, SceneGraph,
    SceneResult, UndoChunk, Vec3,
};
pub use write_ops::{apply_best_effort, ApplyReport, FailedWrite, WriteBatch, WriteOp};
