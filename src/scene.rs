//! Minimal scene graph shared between fields and the render harness.
//!
//! The harness owns the [`Scene`]; a particle field attaches its nodes on
//! load and detaches them on destroy. Nodes carry only what the harness needs
//! to draw and hit-test: a kind, a scale, and a visibility flag.

use std::collections::BTreeMap;

use glam::Vec3;

/// Handle to an attached node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Instanced point quads, one per particle.
    Points { instances: u32 },
    /// Invisible plane covering the image, used for pointer intersection.
    HitArea { width: f32, height: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub scale: Vec3,
    pub visible: bool,
}

impl SceneNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            scale: Vec3::ONE,
            visible: true,
        }
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: BTreeMap<NodeId, SceneNode>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, node: SceneNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node. Returns `None` if it was not attached.
    pub fn detach(&mut self, id: NodeId) -> Option<SceneNode> {
        self.nodes.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
