//! Flat in-memory scene.
//!
//! Every node stores its own world matrix and local channels independently:
//! there is no hierarchy and no evaluation. Useful for tooling that only
//! shuffles authored data (descriptor resolution, best-effort batches) and as
//! a base for tests that need a handful of static transforms.

use hashbrown::HashMap;

use crate::node_path::{NodePath, Plug};
use crate::scene::{
    compose_matrix, matrix_rotation_degrees, matrix_translation, Mat4, SceneError, SceneGraph,
    SceneResult, Vec3,
};

#[derive(Debug, Clone)]
struct Attr {
    value: f64,
    keyable: bool,
    locked: bool,
}

#[derive(Debug, Clone)]
struct Node {
    world: Mat4,
    translate: Vec3,
    rotate: Vec3,
    scale: Vec3,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            world: Mat4::identity(),
            translate: Vec3::zeros(),
            rotate: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryScene {
    nodes: HashMap<NodePath, Node>,
    attrs: HashMap<Plug, Attr>,
    texts: HashMap<Plug, String>,
    connections: HashMap<Plug, Vec<NodePath>>,
    /// Number of successful scalar attribute writes.
    pub attribute_writes: usize,
    /// Currently open undo chunks.
    pub undo_depth: usize,
    /// Undo chunks closed so far.
    pub undo_chunks_closed: usize,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodePath) {
        self.nodes.entry(node).or_default();
    }

    pub fn add_attribute(&mut self, plug: Plug, value: f64, keyable: bool) {
        self.add_node(plug.node.clone());
        self.attrs.insert(
            plug,
            Attr {
                value,
                keyable,
                locked: false,
            },
        );
    }

    pub fn add_text(&mut self, plug: Plug, text: impl Into<String>) {
        self.add_node(plug.node.clone());
        self.texts.insert(plug, text.into());
    }

    /// Drop a scalar or text attribute. Returns whether it existed.
    pub fn remove_attribute(&mut self, plug: &Plug) -> bool {
        let scalar = self.attrs.remove(plug).is_some();
        let text = self.texts.remove(plug).is_some();
        scalar || text
    }

    pub fn lock(&mut self, plug: &Plug) {
        if let Some(attr) = self.attrs.get_mut(plug) {
            attr.locked = true;
        }
    }

    pub fn connect(&mut self, plug: Plug, destination: NodePath) {
        self.connections.entry(plug).or_default().push(destination);
    }

    pub fn local_rotation(&self, node: &NodePath) -> SceneResult<Vec3> {
        Ok(self.node(node)?.rotate)
    }

    pub fn set_local_scale(&mut self, node: &NodePath, scale: Vec3) -> SceneResult<()> {
        self.node_mut(node)?.scale = scale;
        Ok(())
    }

    fn node(&self, node: &NodePath) -> SceneResult<&Node> {
        self.nodes
            .get(node)
            .ok_or_else(|| SceneError::NodeNotFound(node.clone()))
    }

    fn node_mut(&mut self, node: &NodePath) -> SceneResult<&mut Node> {
        self.nodes
            .get_mut(node)
            .ok_or_else(|| SceneError::NodeNotFound(node.clone()))
    }
}

impl SceneGraph for MemoryScene {
    fn exists(&self, node: &NodePath) -> bool {
        self.nodes.contains_key(node)
    }

    fn has_attribute(&self, plug: &Plug) -> bool {
        self.attrs.contains_key(plug) || self.texts.contains_key(plug)
    }

    fn world_position(&self, node: &NodePath) -> SceneResult<Vec3> {
        Ok(matrix_translation(&self.node(node)?.world))
    }

    fn set_world_position(&mut self, node: &NodePath, position: Vec3) -> SceneResult<()> {
        let n = self.node_mut(node)?;
        n.world[(0, 3)] = position.x;
        n.world[(1, 3)] = position.y;
        n.world[(2, 3)] = position.z;
        Ok(())
    }

    fn world_rotation(&self, node: &NodePath) -> SceneResult<Vec3> {
        Ok(matrix_rotation_degrees(&self.node(node)?.world))
    }

    fn set_world_rotation(&mut self, node: &NodePath, degrees: Vec3) -> SceneResult<()> {
        let n = self.node_mut(node)?;
        n.world = compose_matrix(matrix_translation(&n.world), degrees);
        Ok(())
    }

    fn world_matrix(&self, node: &NodePath) -> SceneResult<Mat4> {
        Ok(self.node(node)?.world)
    }

    fn set_world_matrix(&mut self, node: &NodePath, matrix: Mat4) -> SceneResult<()> {
        self.node_mut(node)?.world = matrix;
        Ok(())
    }

    fn local_translation(&self, node: &NodePath) -> SceneResult<Vec3> {
        Ok(self.node(node)?.translate)
    }

    fn set_local_translation(&mut self, node: &NodePath, value: Vec3) -> SceneResult<()> {
        self.node_mut(node)?.translate = value;
        Ok(())
    }

    fn set_local_rotation(&mut self, node: &NodePath, degrees: Vec3) -> SceneResult<()> {
        self.node_mut(node)?.rotate = degrees;
        Ok(())
    }

    fn local_scale(&self, node: &NodePath) -> SceneResult<Vec3> {
        Ok(self.node(node)?.scale)
    }

    fn attribute(&self, plug: &Plug) -> SceneResult<f64> {
        if let Some(attr) = self.attrs.get(plug) {
            return Ok(attr.value);
        }
        if self.texts.contains_key(plug) {
            return Err(SceneError::WrongKind {
                plug: plug.clone(),
                expected: "scalar",
                found: "text",
            });
        }
        Err(SceneError::AttributeNotFound(plug.clone()))
    }

    fn set_attribute(&mut self, plug: &Plug, value: f64) -> SceneResult<()> {
        let attr = self
            .attrs
            .get_mut(plug)
            .ok_or_else(|| SceneError::AttributeNotFound(plug.clone()))?;
        if attr.locked {
            return Err(SceneError::Locked(plug.clone()));
        }
        attr.value = value;
        self.attribute_writes += 1;
        Ok(())
    }

    fn text_attribute(&self, plug: &Plug) -> SceneResult<String> {
        if let Some(text) = self.texts.get(plug) {
            return Ok(text.clone());
        }
        if self.attrs.contains_key(plug) {
            return Err(SceneError::WrongKind {
                plug: plug.clone(),
                expected: "text",
                found: "scalar",
            });
        }
        Err(SceneError::AttributeNotFound(plug.clone()))
    }

    fn keyable_attributes(&self, node: &NodePath) -> SceneResult<Vec<String>> {
        self.node(node)?;
        let mut names: Vec<String> = self
            .attrs
            .iter()
            .filter(|(plug, attr)| &plug.node == node && attr.keyable)
            .map(|(plug, _)| plug.attr.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn connections(&self, plug: &Plug) -> SceneResult<Vec<NodePath>> {
        self.node(&plug.node)?;
        Ok(self.connections.get(plug).cloned().unwrap_or_default())
    }

    fn open_undo_chunk(&mut self) {
        self.undo_depth += 1;
    }

    fn close_undo_chunk(&mut self) {
        self.undo_depth = self.undo_depth.saturating_sub(1);
        self.undo_chunks_closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::UndoChunk;

    fn node(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    #[test]
    fn missing_nodes_and_attributes_are_typed_errors() {
        let scene = MemoryScene::new();
        assert_eq!(
            scene.world_position(&node("ghost")),
            Err(SceneError::NodeNotFound(node("ghost")))
        );
        assert!(matches!(
            scene.attribute(&node("ghost").plug("ikfk")),
            Err(SceneError::AttributeNotFound(_))
        ));
    }

    #[test]
    fn commit_writes_twice_through_default_barrier() {
        let param = node("rig:param");
        let mut scene = MemoryScene::new();
        scene.add_attribute(param.plug("ikfk"), 1.0, true);
        scene.commit(&param.plug("ikfk"), 0.0).unwrap();
        assert_eq!(scene.attribute(&param.plug("ikfk")).unwrap(), 0.0);
        assert_eq!(scene.attribute_writes, 2);
    }

    #[test]
    fn undo_chunk_closes_on_drop() {
        let mut scene = MemoryScene::new();
        {
            let mut chunk = UndoChunk::open(&mut scene);
            assert_eq!(chunk.undo_depth, 1);
            chunk.add_node(node("a"));
        }
        assert_eq!(scene.undo_depth, 0);
        assert_eq!(scene.undo_chunks_closed, 1);
        assert!(scene.exists(&node("a")));
    }

    #[test]
    fn world_rotation_keeps_translation() {
        let n = node("ctrl");
        let mut scene = MemoryScene::new();
        scene.add_node(n.clone());
        scene.set_world_position(&n, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        scene.set_world_rotation(&n, Vec3::new(0.0, 0.0, 45.0)).unwrap();
        let p = scene.world_position(&n).unwrap();
        let r = scene.world_rotation(&n).unwrap();
        assert!((p - Vec3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
        assert!((r.z - 45.0).abs() < 1e-9);
    }

    #[test]
    fn keyable_attributes_are_sorted_and_filtered() {
        let n = node("foot_ctrl");
        let mut scene = MemoryScene::new();
        scene.add_attribute(n.plug("toeRoll"), 0.0, true);
        scene.add_attribute(n.plug("heelRoll"), 0.0, true);
        scene.add_attribute(n.plug("hidden"), 0.0, false);
        assert_eq!(
            scene.keyable_attributes(&n).unwrap(),
            vec!["heelRoll".to_string(), "toeRoll".to_string()]
        );
    }
}
