//! Seagull actors
//!
//! A seagull follows its flight path every tick, banking into turns, and can
//! be hit exactly once. Lifecycle: `Spawning` (placeholder visual) ->
//! `Flying` (model loaded, or load failed) -> `Hit` -> `Disposed`.

use std::collections::HashMap;

use glam::{EulerRot, Quat, Vec3};
use rand::Rng;

use super::flight_path::{FlightBounds, FlightPath};
use super::physics::{BodyDesc, BodyHandle, BodyOwner, PhysicsWorld};
use super::scene::{Layer, MeshShape, NodeDesc, ObjectId, SceneGraph};
use crate::assets::{AssetPoll, AssetRequest, ModelData};
use crate::consts::*;
use crate::wrap_unit;

/// Stable actor id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub u32);

/// Actor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Placeholder visual, model still loading
    Spawning,
    Flying,
    Hit,
    Disposed,
}

/// Outcome of checking an actor's pending model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSwap {
    Pending,
    /// Model attached in place of the placeholder
    Swapped {
        placeholder: Option<ObjectId>,
        model: ObjectId,
    },
    /// Load failed; the placeholder stays
    Failed,
    /// Model arrived after the actor was gone
    Discarded,
}

/// A hittable seagull
pub struct Seagull {
    id: ActorId,
    state: ActorState,
    hit: bool,
    visual: Option<ObjectId>,
    path: FlightPath,
    /// Position along the path in [0, 1)
    progress: f32,
    /// Loops per second
    speed: f32,
    body: Option<BodyHandle>,
    pending_model: Option<AssetRequest<ModelData>>,
}

impl Seagull {
    pub fn new(id: ActorId, path: FlightPath, speed: f32, progress: f32) -> Self {
        Self {
            id,
            state: ActorState::Spawning,
            hit: false,
            visual: None,
            path,
            progress: wrap_unit(progress),
            speed,
            body: None,
            pending_model: None,
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Still flying (or about to)
    pub fn is_alive(&self) -> bool {
        matches!(self.state, ActorState::Spawning | ActorState::Flying)
    }

    pub fn is_hit(&self) -> bool {
        self.hit
    }

    pub fn visual(&self) -> Option<ObjectId> {
        self.visual
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn path(&self) -> &FlightPath {
        &self.path
    }

    pub fn has_pending_model(&self) -> bool {
        self.pending_model.is_some()
    }

    /// Current position on the path
    pub fn position(&self) -> Vec3 {
        self.path.position(self.progress)
    }

    /// Attach a placeholder sphere to the scene root
    pub fn spawn_placeholder(&mut self, scene: &mut SceneGraph) -> ObjectId {
        let placeholder = scene.add(
            NodeDesc::mesh(
                format!("seagull-{}-placeholder", self.id.0),
                MeshShape::Sphere {
                    radius: SEAGULL_RADIUS * 0.5,
                },
                Layer::Actor,
            )
            .at(self.position()),
            None,
        );
        self.visual = Some(placeholder);
        placeholder
    }

    /// Give the actor a kinematic collider that follows its flight
    pub fn attach_body(&mut self, physics: &mut PhysicsWorld) -> Option<BodyHandle> {
        if self.body.is_some() || !self.is_alive() {
            return self.body;
        }
        self.body = physics.add_body(
            BodyDesc::kinematic_sphere(SEAGULL_RADIUS).at(self.position()),
            BodyOwner::Actor(self.id),
        );
        self.body
    }

    pub fn set_pending_model(&mut self, request: AssetRequest<ModelData>) {
        self.pending_model = Some(request);
    }

    /// Check the pending model load, swapping it in when it has arrived
    pub fn poll_model(&mut self, scene: &mut SceneGraph) -> Option<ModelSwap> {
        let request = self.pending_model.as_mut()?;
        match request.poll() {
            AssetPoll::Pending => Some(ModelSwap::Pending),
            AssetPoll::Ready(model) => {
                self.pending_model = None;
                Some(self.attach_model(scene, &model))
            }
            AssetPoll::Failed(err) => {
                self.pending_model = None;
                log::warn!("Seagull {} keeps its placeholder: {}", self.id.0, err);
                if self.state == ActorState::Spawning {
                    self.state = ActorState::Flying;
                }
                Some(ModelSwap::Failed)
            }
        }
    }

    /// Swap the placeholder for a loaded model, keeping its place in the scene.
    /// A model that arrives after the actor is gone is never attached.
    pub fn attach_model(&mut self, scene: &mut SceneGraph, model: &ModelData) -> ModelSwap {
        if !self.is_alive() {
            log::debug!("Seagull {} model arrived after disposal, dropped", self.id.0);
            return ModelSwap::Discarded;
        }

        let root = model.instantiate(scene, Layer::Actor);
        if let Some(node) = scene.get_mut(root) {
            node.name = format!("seagull-{}", self.id.0);
        }

        let placeholder = self.visual.take();
        match placeholder {
            Some(old) => {
                scene.replace(old, root);
                scene.dispose(old);
            }
            None => {
                scene.attach(root, None);
                scene.set_position(root, self.position());
            }
        }

        self.visual = Some(root);
        self.state = ActorState::Flying;
        log::debug!("Seagull {} model attached", self.id.0);
        ModelSwap::Swapped {
            placeholder,
            model: root,
        }
    }

    /// Advance along the path and orient toward the direction of travel
    pub fn update(&mut self, dt: f32, scene: &mut SceneGraph, physics: &mut PhysicsWorld) {
        if !self.is_alive() {
            return;
        }
        let Some(visual) = self.visual else {
            return;
        };
        if !scene.contains(visual) {
            return;
        }

        self.progress = wrap_unit(self.progress + self.speed * dt);
        let current = self.path.position(self.progress);
        let ahead = self.path.position(self.progress + PATH_LOOKAHEAD);

        let rotation = orientation(ahead - current);
        if let Some(node) = scene.get_mut(visual) {
            node.position = current;
            if let Some(rotation) = rotation {
                node.rotation = rotation;
            }
        }
        if let Some(body) = self.body {
            physics.set_kinematic_position(body, current);
        }
    }

    /// Regenerate the flight path; progress is kept
    pub fn set_bounds<R: Rng + ?Sized>(&mut self, bounds: FlightBounds, rng: &mut R) {
        self.path.regenerate(bounds, rng);
    }

    /// One-way hit transition. Returns false if the actor was already hit or gone.
    pub fn hit(&mut self, scene: &mut SceneGraph, physics: &mut PhysicsWorld) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.hit = true;
        self.state = ActorState::Hit;
        log::info!("Seagull {} hit", self.id.0);
        self.dispose(scene, physics);
        true
    }

    /// Detach from the scene, release the visual and collider, cancel any load
    pub fn dispose(&mut self, scene: &mut SceneGraph, physics: &mut PhysicsWorld) -> bool {
        if self.state == ActorState::Disposed {
            return false;
        }
        if let Some(visual) = self.visual.take() {
            scene.dispose(visual);
        }
        if let Some(body) = self.body.take() {
            physics.remove_body(body);
        }
        self.pending_model = None;
        self.state = ActorState::Disposed;
        true
    }
}

/// Yaw from heading, roll against the turn, pitch with the climb.
/// None when `direction` is too short to trust.
pub fn orientation(direction: Vec3) -> Option<Quat> {
    if direction.length() < DIRECTION_EPSILON {
        return None;
    }
    let dir = direction.normalize();
    let heading = dir.x.atan2(dir.z);
    let bank = -dir.x * BANK_FACTOR;
    let pitch = -dir.y * PITCH_FACTOR;
    Some(Quat::from_euler(EulerRot::YXZ, heading, pitch, bank))
}

/// Maps scene objects to the actor that owns them
#[derive(Debug, Default)]
pub struct ActorRegistry {
    by_object: HashMap<ObjectId, ActorId>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, object: ObjectId, actor: ActorId) {
        self.by_object.insert(object, actor);
    }

    pub fn unregister(&mut self, object: ObjectId) -> Option<ActorId> {
        self.by_object.remove(&object)
    }

    /// Drop every object belonging to `actor`
    pub fn unregister_actor(&mut self, actor: ActorId) {
        self.by_object.retain(|_, a| *a != actor);
    }

    pub fn clear(&mut self) {
        self.by_object.clear();
    }

    pub fn len(&self) -> usize {
        self.by_object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_object.is_empty()
    }

    /// Find the actor owning `object` or any of its ancestors
    pub fn resolve(&self, scene: &SceneGraph, object: ObjectId) -> Option<ActorId> {
        std::iter::once(object)
            .chain(scene.ancestors(object))
            .find_map(|id| self.by_object.get(&id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::asset_channel;
    use crate::sim::physics::PhysicsConfig;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup() -> (Seagull, SceneGraph, PhysicsWorld) {
        let mut rng = Pcg32::seed_from_u64(5);
        let path = FlightPath::new(FlightBounds::default(), &mut rng);
        let mut gull = Seagull::new(ActorId(1), path, 0.05, 0.0);
        let mut scene = SceneGraph::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default());
        gull.spawn_placeholder(&mut scene);
        gull.attach_body(&mut physics);
        (gull, scene, physics)
    }

    #[test]
    fn test_update_advances_and_wraps() {
        let (mut gull, mut scene, mut physics) = setup();
        for _ in 0..30 {
            gull.update(1.0, &mut scene, &mut physics);
        }
        // 30 s at 0.05 loops/s = 1.5 loops
        assert!((gull.progress() - 0.5).abs() < 1e-3);

        let visual = gull.visual().unwrap();
        let node_pos = scene.get(visual).unwrap().position;
        assert!((node_pos - gull.position()).length() < 1e-4);
        // The collider reaches its target on the next fixed step
        physics.step(FIXED_DT);
        let body_pos = physics.body(gull.body().unwrap()).unwrap().position;
        assert!((body_pos - node_pos).length() < 1e-4);
    }

    #[test]
    fn test_orientation_faces_travel() {
        let rotation = orientation(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        let forward = rotation * Vec3::Z;
        assert!((forward - Vec3::X).length() < 1e-4);

        // Banks opposite the turn: moving toward +X rolls negative about Z
        let (_, _, roll) = rotation.to_euler(EulerRot::YXZ);
        assert!(roll < 0.0);
    }

    #[test]
    fn test_orientation_skips_degenerate() {
        assert!(orientation(Vec3::splat(1e-6)).is_none());
    }

    #[test]
    fn test_hit_is_one_way() {
        let (mut gull, mut scene, mut physics) = setup();
        let visual = gull.visual().unwrap();
        let bodies_before = physics.len();

        assert!(gull.hit(&mut scene, &mut physics));
        assert!(gull.is_hit());
        assert_eq!(gull.state(), ActorState::Disposed);
        assert!(!scene.contains(visual));
        assert_eq!(physics.len(), bodies_before - 1);

        assert!(!gull.hit(&mut scene, &mut physics));
        assert_eq!(scene.released_resources(), 2);

        // Updates after the hit do nothing
        let progress = gull.progress();
        gull.update(1.0, &mut scene, &mut physics);
        assert_eq!(gull.progress(), progress);
    }

    #[test]
    fn test_model_swap_preserves_placement() {
        let (mut gull, mut scene, mut physics) = setup();
        gull.update(0.5, &mut scene, &mut physics);
        let placeholder = gull.visual().unwrap();
        let placed_at = scene.get(placeholder).unwrap().position;

        let (request, completer) = asset_channel("gull.json");
        gull.set_pending_model(request);
        assert_eq!(gull.poll_model(&mut scene), Some(ModelSwap::Pending));
        assert_eq!(gull.state(), ActorState::Spawning);

        completer.succeed(ModelData::seagull());
        let swap = gull.poll_model(&mut scene).unwrap();
        let ModelSwap::Swapped { model, .. } = swap else {
            panic!("expected swap, got {:?}", swap);
        };
        assert_eq!(gull.state(), ActorState::Flying);
        assert!(!scene.contains(placeholder));
        assert!(scene.is_attached(model));
        assert_eq!(scene.get(model).unwrap().position, placed_at);
        assert!(!gull.has_pending_model());
    }

    #[test]
    fn test_failed_load_keeps_placeholder() {
        let (mut gull, mut scene, _physics) = setup();
        let placeholder = gull.visual().unwrap();
        let (request, completer) = asset_channel("gull.json");
        gull.set_pending_model(request);
        completer.fail("network down");

        assert_eq!(gull.poll_model(&mut scene), Some(ModelSwap::Failed));
        assert_eq!(gull.state(), ActorState::Flying);
        assert_eq!(gull.visual(), Some(placeholder));
        assert!(scene.is_attached(placeholder));
    }

    #[test]
    fn test_late_model_not_attached_after_hit() {
        let (mut gull, mut scene, mut physics) = setup();
        let (request, completer) = asset_channel("gull.json");
        gull.set_pending_model(request);
        gull.hit(&mut scene, &mut physics);

        // Request was dropped with the actor, so the completion goes nowhere
        assert!(!completer.succeed(ModelData::seagull()));
        let meshes_before = scene.len();
        assert_eq!(
            gull.attach_model(&mut scene, &ModelData::seagull()),
            ModelSwap::Discarded
        );
        assert_eq!(scene.len(), meshes_before);
    }

    #[test]
    fn test_registry_resolves_through_ancestors() {
        let mut scene = SceneGraph::new();
        let root = ModelData::seagull().instantiate(&mut scene, Layer::Actor);
        scene.attach(root, None);
        let wing = scene.get(root).unwrap().children[2];

        let mut registry = ActorRegistry::new();
        registry.register(root, ActorId(9));
        assert_eq!(registry.resolve(&scene, wing), Some(ActorId(9)));
        assert_eq!(registry.resolve(&scene, ObjectId(999)), None);

        registry.unregister_actor(ActorId(9));
        assert!(registry.is_empty());
    }
}
