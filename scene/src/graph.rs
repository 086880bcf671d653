// Arena-backed scene graph. Nodes are addressed by generational handles so
// reparenting never has to juggle cross-references; a stale handle simply
// stops resolving.

use bitflags::bitflags;
use cgmath::{Quaternion, Rotation, Vector3, Zero};
use thiserror::Error;
use tracing::warn;

bitflags! {
    pub struct InteractionFlags: u32 {
        const SELECTABLE = 1 << 0;
        const GRABBABLE = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vector3<f32> },
}

#[derive(Clone, Copy, Debug)]
pub enum NodeKind {
    Group,
    Renderable {
        shape: Shape,
        flags: InteractionFlags,
    },
}

impl NodeKind {
    /// Renderable with the full interaction surface (selectable and grabbable).
    pub fn mesh(shape: Shape) -> NodeKind {
        NodeKind::Renderable {
            shape,
            flags: InteractionFlags::SELECTABLE | InteractionFlags::GRABBABLE,
        }
    }

    pub fn flags(&self) -> InteractionFlags {
        match self {
            NodeKind::Group => InteractionFlags::empty(),
            NodeKind::Renderable { flags, .. } => *flags,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node handle {0:?} is stale or was never allocated")]
    Dangling(NodeId),
    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },
}

struct Node {
    name: Option<String>,
    kind: NodeKind,
    local_position: Vector3<f32>,
    local_rotation: Quaternion<f32>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, name: Option<String>) -> Node {
        Node {
            name,
            kind,
            local_position: Vector3::zero(),
            local_rotation: Quaternion {
                v: Vector3::zero(),
                s: 1.0,
            },
            parent: None,
            children: Vec::new(),
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> SceneGraph {
        let mut graph = SceneGraph {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        graph.root = graph.allocate(Node::new(NodeKind::Group, Some("world".to_owned())));
        graph
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Spawn a node as a child of the world root.
    pub fn spawn(&mut self, kind: NodeKind) -> NodeId {
        let id = self.allocate(Node::new(kind, None));
        self.link(self.root, id);
        id
    }

    pub fn spawn_named(&mut self, kind: NodeKind, name: &str) -> NodeId {
        let id = self.allocate(Node::new(kind, Some(name.to_owned())));
        self.link(self.root, id);
        id
    }

    /// Remove a node and its whole subtree. Stale handles are ignored.
    pub fn despawn(&mut self, id: NodeId) {
        if !self.contains(id) {
            return;
        }
        self.detach(id);
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(slot) = self.slot_mut(next) {
                if let Some(node) = slot.node.take() {
                    pending.extend(node.children);
                }
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|n| &n.kind)
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| n.name.as_deref())
    }

    pub fn local_position(&self, id: NodeId) -> Vector3<f32> {
        match self.get(id) {
            Some(node) => node.local_position,
            None => {
                warn!("local_position on stale handle {:?}", id);
                Vector3::zero()
            }
        }
    }

    pub fn local_rotation(&self, id: NodeId) -> Quaternion<f32> {
        match self.get(id) {
            Some(node) => node.local_rotation,
            None => {
                warn!("local_rotation on stale handle {:?}", id);
                Quaternion {
                    v: Vector3::zero(),
                    s: 1.0,
                }
            }
        }
    }

    pub fn set_local_position(&mut self, id: NodeId, position: Vector3<f32>) {
        match self.get_mut(id) {
            Some(node) => node.local_position = position,
            None => warn!("set_local_position on stale handle {:?}", id),
        }
    }

    pub fn set_local_rotation(&mut self, id: NodeId, rotation: Quaternion<f32>) {
        match self.get_mut(id) {
            Some(node) => node.local_rotation = rotation,
            None => warn!("set_local_rotation on stale handle {:?}", id),
        }
    }

    pub fn translate(&mut self, id: NodeId, delta: Vector3<f32>) {
        match self.get_mut(id) {
            Some(node) => node.local_position += delta,
            None => warn!("translate on stale handle {:?}", id),
        }
    }

    pub fn world_position(&self, id: NodeId) -> Vector3<f32> {
        match self.world_transform(id) {
            Some((position, _)) => position,
            None => {
                warn!("world_position on stale handle {:?}", id);
                Vector3::zero()
            }
        }
    }

    pub fn world_rotation(&self, id: NodeId) -> Quaternion<f32> {
        match self.world_transform(id) {
            Some((_, rotation)) => rotation,
            None => {
                warn!("world_rotation on stale handle {:?}", id);
                Quaternion {
                    v: Vector3::zero(),
                    s: 1.0,
                }
            }
        }
    }

    pub(crate) fn world_transform(&self, id: NodeId) -> Option<(Vector3<f32>, Quaternion<f32>)> {
        let node = self.get(id)?;
        match node.parent.and_then(|p| self.world_transform(p)) {
            Some((parent_position, parent_rotation)) => Some((
                parent_position + parent_rotation.rotate_vector(node.local_position),
                parent_rotation * node.local_rotation,
            )),
            None => Some((node.local_position, node.local_rotation)),
        }
    }

    /// Reparent `child` under `parent`, keeping the child's local transform.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        if !self.contains(child) {
            return Err(GraphError::Dangling(child));
        }
        if !self.contains(parent) {
            return Err(GraphError::Dangling(parent));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(GraphError::Cycle { child, parent });
        }
        self.link(parent, child);
        Ok(())
    }

    /// Detach `child` from `parent`, leaving it parentless. Not being a child
    /// of `parent` in the first place is not an error.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        if !self.contains(child) {
            return Err(GraphError::Dangling(child));
        }
        if !self.contains(parent) {
            return Err(GraphError::Dangling(parent));
        }
        if self.parent(child) == Some(parent) {
            self.detach(child);
        }
        Ok(())
    }

    /// Reparent `child` under `parent` while preserving the child's world
    /// position and orientation, recomputing its local transform.
    pub fn attach_preserving_world(
        &mut self,
        child: NodeId,
        parent: NodeId,
    ) -> Result<(), GraphError> {
        let (child_position, child_rotation) = self
            .world_transform(child)
            .ok_or(GraphError::Dangling(child))?;
        let (parent_position, parent_rotation) = self
            .world_transform(parent)
            .ok_or(GraphError::Dangling(parent))?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(GraphError::Cycle { child, parent });
        }

        let inverse = parent_rotation.invert();
        let local_position = inverse.rotate_vector(child_position - parent_position);
        let local_rotation = inverse * child_rotation;

        self.link(parent, child);
        if let Some(node) = self.get_mut(child) {
            node.local_position = local_position;
            node.local_rotation = local_rotation;
        }
        Ok(())
    }

    /// Walk up the parent chain to the highest node that still resolves.
    /// A stale handle resolves to the world root.
    pub fn top_level_ancestor(&self, id: NodeId) -> NodeId {
        if !self.contains(id) {
            return self.root;
        }
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, start: NodeId) -> bool {
        let mut current = Some(start);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn allocate(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(node) = self.get_mut(parent) {
            node.children.retain(|c| *c != child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = None;
        }
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(id.index as usize)?;
        (slot.generation == id.generation).then_some(slot)
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{vec3, Deg, InnerSpace, Rotation3};

    fn identity() -> Quaternion<f32> {
        Quaternion {
            v: Vector3::zero(),
            s: 1.0,
        }
    }

    #[test]
    fn test_world_position_composes_parent_chain() {
        let mut graph = SceneGraph::new();
        let parent = graph.spawn(NodeKind::Group);
        let child = graph.spawn(NodeKind::Group);
        graph.add_child(parent, child).unwrap();

        graph.set_local_position(parent, vec3(1.0, 2.0, 3.0));
        graph.set_local_rotation(parent, Quaternion::from_angle_y(Deg(90.0)));
        graph.set_local_position(child, vec3(0.0, 0.0, -1.0));

        let world = graph.world_position(child);
        // Parent's 90-degree yaw turns local -Z into -X.
        assert!((world.x - 0.0).abs() < 1e-5, "got {:?}", world);
        assert!((world.y - 2.0).abs() < 1e-5);
        assert!((world.z - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_attach_preserving_world_keeps_world_transform() {
        let mut graph = SceneGraph::new();
        let rig = graph.spawn(NodeKind::Group);
        graph.set_local_position(rig, vec3(5.0, 1.0, -2.0));
        graph.set_local_rotation(rig, Quaternion::from_angle_y(Deg(45.0)));

        let cube = graph.spawn(NodeKind::mesh(Shape::Sphere { radius: 0.5 }));
        graph.set_local_position(cube, vec3(1.0, 2.0, 3.0));

        let before = graph.world_position(cube);
        graph.attach_preserving_world(cube, rig).unwrap();
        let after = graph.world_position(cube);

        assert!((before - after).magnitude() < 1e-5);
        assert_eq!(graph.parent(cube), Some(rig));

        graph.attach_preserving_world(cube, graph.root()).unwrap();
        let restored = graph.world_position(cube);
        assert!((before - restored).magnitude() < 1e-5);
        assert!((graph.world_rotation(cube).dot(identity())).abs() > 0.999);
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(NodeKind::Group);
        let b = graph.spawn(NodeKind::Group);
        graph.add_child(a, b).unwrap();

        assert!(matches!(
            graph.add_child(b, a),
            Err(GraphError::Cycle { .. })
        ));
        assert!(matches!(
            graph.add_child(a, a),
            Err(GraphError::Cycle { .. })
        ));
    }

    #[test]
    fn test_despawn_invalidates_handles_and_subtree() {
        let mut graph = SceneGraph::new();
        let parent = graph.spawn(NodeKind::Group);
        let child = graph.spawn(NodeKind::Group);
        graph.add_child(parent, child).unwrap();

        graph.despawn(parent);
        assert!(!graph.contains(parent));
        assert!(!graph.contains(child));

        // A recycled slot must not resurrect the old handle.
        let replacement = graph.spawn(NodeKind::Group);
        assert!(graph.contains(replacement));
        assert!(!graph.contains(parent));
    }

    #[test]
    fn test_top_level_ancestor() {
        let mut graph = SceneGraph::new();
        let rig = graph.spawn(NodeKind::Group);
        let camera = graph.spawn(NodeKind::Group);
        graph.add_child(rig, camera).unwrap();

        assert_eq!(graph.top_level_ancestor(camera), graph.root());

        graph.remove_child(graph.root(), rig).unwrap();
        // Detached subtree: the rig itself is now the top of its chain.
        assert_eq!(graph.top_level_ancestor(camera), rig);

        graph.despawn(rig);
        assert_eq!(graph.top_level_ancestor(camera), graph.root());
    }

    #[test]
    fn test_remove_child_of_other_parent_is_noop() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(NodeKind::Group);
        let b = graph.spawn(NodeKind::Group);
        let c = graph.spawn(NodeKind::Group);
        graph.add_child(a, c).unwrap();

        graph.remove_child(b, c).unwrap();
        assert_eq!(graph.parent(c), Some(a));
    }
}
