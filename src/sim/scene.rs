//! Scene graph driven by the simulation
//!
//! The renderer consumes this graph; the simulation only needs to attach,
//! detach, traverse and transform nodes. GPU-side resources are tracked as
//! opaque ids so teardown can prove each one is released exactly once.

use std::collections::BTreeMap;

use glam::{Affine3A, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Stable scene node id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// Opaque handle for a geometry or material living on the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u32);

/// Collision/render shape of a mesh, in object-local space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MeshShape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
    /// Horizontal quad facing local +Y
    Plane { half_size: Vec2 },
}

impl MeshShape {
    /// Radius of a sphere enclosing the shape (before scaling)
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            MeshShape::Sphere { radius } => radius,
            MeshShape::Cuboid { half_extents } => half_extents.length(),
            MeshShape::Plane { half_size } => half_size.length(),
        }
    }
}

/// What a node is
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectKind {
    Group,
    Mesh(MeshShape),
    Light,
    Camera,
}

/// Category used for collision filtering and culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Terrain,
    Ocean,
    Actor,
    Projectile,
    Prop,
}

/// Geometry + material pair owned by a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuResources {
    pub geometry: ResourceId,
    pub material: ResourceId,
}

/// A scene node
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: ObjectKind,
    pub layer: Layer,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub visible: bool,
    pub resources: Option<GpuResources>,
}

impl Node {
    pub fn local_matrix(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, ObjectKind::Mesh(_))
    }

    pub fn shape(&self) -> Option<MeshShape> {
        match self.kind {
            ObjectKind::Mesh(shape) => Some(shape),
            _ => None,
        }
    }
}

/// Description of a node to spawn
#[derive(Debug, Clone)]
pub struct NodeDesc {
    pub name: String,
    pub kind: ObjectKind,
    pub layer: Layer,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl NodeDesc {
    pub fn new(name: impl Into<String>, kind: ObjectKind, layer: Layer) -> Self {
        Self {
            name: name.into(),
            kind,
            layer,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn mesh(name: impl Into<String>, shape: MeshShape, layer: Layer) -> Self {
        Self::new(name, ObjectKind::Mesh(shape), layer)
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scaled(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }
}

/// The scene graph (nodes sorted by id for deterministic traversal)
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<ObjectId, Node>,
    /// Top-level nodes attached directly to the scene root
    roots: Vec<ObjectId>,
    next_id: u32,
    next_resource: u32,
    released: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            next_resource: 1,
            ..Default::default()
        }
    }

    /// Create a detached node. Meshes allocate their GPU resources here.
    pub fn spawn(&mut self, desc: NodeDesc) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        let resources = if matches!(desc.kind, ObjectKind::Mesh(_)) {
            let geometry = ResourceId(self.next_resource);
            let material = ResourceId(self.next_resource + 1);
            self.next_resource += 2;
            Some(GpuResources { geometry, material })
        } else {
            None
        };

        self.nodes.insert(
            id,
            Node {
                name: desc.name,
                kind: desc.kind,
                layer: desc.layer,
                parent: None,
                children: Vec::new(),
                position: desc.position,
                rotation: desc.rotation,
                scale: desc.scale,
                visible: true,
                resources,
            },
        );
        id
    }

    /// Spawn and attach in one go
    pub fn add(&mut self, desc: NodeDesc, parent: Option<ObjectId>) -> ObjectId {
        let id = self.spawn(desc);
        self.attach(id, parent);
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach `id` under `parent` (or the scene root), detaching it first.
    /// Returns false if either node is unknown or the link would form a cycle.
    pub fn attach(&mut self, id: ObjectId, parent: Option<ObjectId>) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) || p == id || self.ancestors(p).any(|a| a == id) {
                return false;
            }
        }

        self.detach(id);
        match parent {
            Some(p) => {
                if let Some(parent_node) = self.nodes.get_mut(&p) {
                    parent_node.children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = parent;
        }
        true
    }

    /// Unlink a node from its parent (or the root). The subtree stays intact.
    pub fn detach(&mut self, id: ObjectId) -> bool {
        let Some(parent) = self.nodes.get(&id).map(|n| n.parent) else {
            return false;
        };
        match parent {
            Some(p) => {
                if let Some(parent_node) = self.nodes.get_mut(&p) {
                    parent_node.children.retain(|c| *c != id);
                }
            }
            None => {
                let before = self.roots.len();
                self.roots.retain(|r| *r != id);
                if before == self.roots.len() {
                    return false;
                }
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        true
    }

    /// True if the node is reachable from the scene root
    pub fn is_attached(&self, id: ObjectId) -> bool {
        let mut current = id;
        loop {
            match self.nodes.get(&current) {
                Some(node) => match node.parent {
                    Some(p) => current = p,
                    None => return self.roots.contains(&current),
                },
                None => return false,
            }
        }
    }

    /// Parent chain, nearest first
    pub fn ancestors(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        std::iter::successors(self.nodes.get(&id).and_then(|n| n.parent), move |p| {
            self.nodes.get(p).and_then(|n| n.parent)
        })
    }

    /// Local-to-world transform
    pub fn world_matrix(&self, id: ObjectId) -> Affine3A {
        let mut matrix = match self.nodes.get(&id) {
            Some(node) => node.local_matrix(),
            None => return Affine3A::IDENTITY,
        };
        for ancestor in self.ancestors(id) {
            if let Some(node) = self.nodes.get(&ancestor) {
                matrix = node.local_matrix() * matrix;
            }
        }
        matrix
    }

    pub fn world_position(&self, id: ObjectId) -> Vec3 {
        self.world_matrix(id).translation.into()
    }

    pub fn set_transform(&mut self, id: ObjectId, position: Vec3, rotation: Quat) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
            node.rotation = rotation;
        }
    }

    pub fn set_position(&mut self, id: ObjectId, position: Vec3) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
        }
    }

    /// Visit every node attached to the scene, depth first
    pub fn traverse(&self, mut visit: impl FnMut(ObjectId, &Node)) {
        let mut stack: Vec<ObjectId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                visit(id, node);
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }

    /// Attached mesh nodes, in traversal order
    pub fn attached_meshes(&self) -> Vec<ObjectId> {
        let mut meshes = Vec::new();
        self.traverse(|id, node| {
            if node.is_mesh() {
                meshes.push(id);
            }
        });
        meshes
    }

    /// Put `replacement` where `old` was: same parent, same transform.
    /// `old` is detached but not disposed.
    pub fn replace(&mut self, old: ObjectId, replacement: ObjectId) -> bool {
        let Some(old_node) = self.nodes.get(&old) else {
            return false;
        };
        if !self.nodes.contains_key(&replacement) {
            return false;
        }
        let attached = self.is_attached(old);
        let parent = old_node.parent;
        let (position, rotation) = (old_node.position, old_node.rotation);

        self.detach(old);
        if let Some(node) = self.nodes.get_mut(&replacement) {
            node.position = position;
            node.rotation = rotation;
        }
        if attached || parent.is_some() {
            self.attach(replacement, parent);
        }
        true
    }

    /// Detach a subtree and release its GPU resources.
    /// Returns false if the node was already disposed.
    pub fn dispose(&mut self, id: ObjectId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        self.detach(id);

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                if node.resources.is_some() {
                    // geometry + material
                    self.released += 2;
                }
                stack.extend(node.children);
            }
        }
        true
    }

    /// Dispose everything
    pub fn clear(&mut self) {
        let all: Vec<ObjectId> = self.nodes.keys().copied().collect();
        for id in all {
            self.dispose(id);
        }
        self.roots.clear();
    }

    /// Number of GPU resources released so far
    pub fn released_resources(&self) -> usize {
        self.released
    }

    /// GPU resources currently held by live nodes
    pub fn live_resources(&self) -> usize {
        self.nodes.values().filter(|n| n.resources.is_some()).count() * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(name: &str) -> NodeDesc {
        NodeDesc::mesh(name, MeshShape::Sphere { radius: 1.0 }, Layer::Prop)
    }

    #[test]
    fn test_attach_and_ancestors() {
        let mut scene = SceneGraph::new();
        let root = scene.add(NodeDesc::new("root", ObjectKind::Group, Layer::Actor), None);
        let child = scene.add(sphere("child"), Some(root));
        let leaf = scene.add(sphere("leaf"), Some(child));

        assert!(scene.is_attached(leaf));
        let chain: Vec<_> = scene.ancestors(leaf).collect();
        assert_eq!(chain, vec![child, root]);

        scene.detach(root);
        assert!(!scene.is_attached(leaf));
    }

    #[test]
    fn test_attach_rejects_cycle() {
        let mut scene = SceneGraph::new();
        let a = scene.add(sphere("a"), None);
        let b = scene.add(sphere("b"), Some(a));
        assert!(!scene.attach(a, Some(b)));
        assert!(scene.is_attached(b));
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut scene = SceneGraph::new();
        let parent = scene.add(
            NodeDesc::new("p", ObjectKind::Group, Layer::Prop).at(Vec3::new(10.0, 0.0, 0.0)),
            None,
        );
        let child = scene.add(sphere("c").at(Vec3::new(0.0, 2.0, 0.0)), Some(parent));
        let pos = scene.world_position(child);
        assert!((pos - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_dispose_releases_once() {
        let mut scene = SceneGraph::new();
        let group = scene.add(NodeDesc::new("g", ObjectKind::Group, Layer::Actor), None);
        scene.add(sphere("m1"), Some(group));
        scene.add(sphere("m2"), Some(group));

        assert!(scene.dispose(group));
        assert_eq!(scene.released_resources(), 4);
        assert!(!scene.dispose(group));
        assert_eq!(scene.released_resources(), 4);
        assert!(scene.is_empty());
    }

    #[test]
    fn test_replace_keeps_parent_and_transform() {
        let mut scene = SceneGraph::new();
        let parent = scene.add(NodeDesc::new("p", ObjectKind::Group, Layer::Prop), None);
        let old = scene.add(sphere("old").at(Vec3::new(1.0, 2.0, 3.0)), Some(parent));
        let new = scene.spawn(sphere("new"));

        assert!(scene.replace(old, new));
        assert!(!scene.is_attached(old));
        assert!(scene.is_attached(new));
        assert_eq!(scene.get(new).map(|n| n.parent), Some(Some(parent)));
        assert_eq!(scene.get(new).map(|n| n.position), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_traverse_skips_detached() {
        let mut scene = SceneGraph::new();
        let a = scene.add(sphere("a"), None);
        let _loose = scene.spawn(sphere("loose"));
        assert_eq!(scene.attached_meshes(), vec![a]);
    }
}
