//! Per-frame orchestration
//!
//! Tick order is fixed: physics, ocean, seagulls, balls, culling. The
//! coordinator also owns the round: a countdown of seagulls left, the win
//! signal when it reaches zero, and reset/teardown.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::actor::{ActorId, ActorRegistry, ModelSwap, Seagull};
use super::flight_path::{FlightBounds, FlightPath};
use super::frustum::Frustum;
use super::hit_resolver::{CollisionOutcome, HitResolver};
use super::ocean::OceanSurface;
use super::physics::{BodyDesc, BodyOwner, BodyShape, ContactEvent, PhysicsWorld};
use super::projectile::{CollisionMode, Projectile, ProjectileBackend, ProjectileId};
use super::scene::{Layer, MeshShape, NodeDesc, ObjectKind, SceneGraph};
use crate::assets::AssetLoader;
use crate::consts::MAX_FRAME_DT;
use crate::controls::PlayerControls;
use crate::settings::GameConfig;

/// Summary handed to the UI when the last seagull falls
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub seagulls: u32,
    pub throws: u32,
    pub elapsed_ms: f64,
}

/// Presentation-layer callbacks (win screen, crosshair, HUD)
pub trait UiNotifier {
    fn on_win_condition_met(&mut self, _summary: &RoundSummary) {}
    fn on_input_locked(&mut self, _locked: bool) {}
    fn on_target_hit(&mut self, _remaining: u32) {}
}

/// UI that ignores everything
#[derive(Debug, Default)]
pub struct NullUi;

impl UiNotifier for NullUi {}

/// Things that happened since the last drain
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    SeagullSpawned(ActorId),
    SeagullHit { actor: ActorId, remaining: u32 },
    ProjectileThrown(ProjectileId),
    ProjectileBounced(ProjectileId),
    ProjectileExpired(ProjectileId),
    AllTargetsEliminated { elapsed_ms: f64 },
    Reset,
}

/// Per-instance data for the renderer
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub layer: u32,
    pub object: u32,
    pub _pad: [u32; 2],
}

fn layer_index(layer: Layer) -> u32 {
    match layer {
        Layer::Terrain => 0,
        Layer::Ocean => 1,
        Layer::Actor => 2,
        Layer::Projectile => 3,
        Layer::Prop => 4,
    }
}

/// Owns the world and runs it frame by frame
pub struct SceneCoordinator {
    config: GameConfig,
    scene: SceneGraph,
    physics: PhysicsWorld,
    resolver: HitResolver,
    registry: ActorRegistry,
    seagulls: Vec<Seagull>,
    projectiles: Vec<Projectile>,
    ocean: OceanSurface,
    controls: PlayerControls,
    aspect: f32,
    loader: Box<dyn AssetLoader>,
    ui: Box<dyn UiNotifier>,
    rng: Pcg32,
    events: Vec<GameEvent>,
    /// Simulation clock, the time source for projectile lifetimes
    clock_ms: f64,
    round_started_ms: f64,
    hits: u32,
    remaining: u32,
    throws: u32,
    won: bool,
    disposed: bool,
    next_actor: u32,
    next_projectile: u32,
}

impl SceneCoordinator {
    /// Build the island, the physics world and a full flock of seagulls.
    /// An invalid config is replaced by the defaults.
    pub fn new(config: GameConfig, loader: Box<dyn AssetLoader>, ui: Box<dyn UiNotifier>) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("{}; falling back to default config", e);
                GameConfig::default()
            }
        };

        let mut scene = SceneGraph::new();
        let mut physics = PhysicsWorld::new(config.physics);
        build_island(&mut scene, &mut physics);

        let mut coordinator = Self {
            physics,
            resolver: HitResolver::new(config.collidable_refresh_ms, config.bounce),
            registry: ActorRegistry::new(),
            seagulls: Vec::new(),
            projectiles: Vec::new(),
            ocean: OceanSurface::default(),
            controls: PlayerControls::default(),
            aspect: 16.0 / 9.0,
            loader,
            ui,
            rng: Pcg32::seed_from_u64(config.seed),
            events: Vec::new(),
            clock_ms: 0.0,
            round_started_ms: 0.0,
            hits: 0,
            remaining: config.seagull_count,
            throws: 0,
            won: false,
            disposed: false,
            next_actor: 1,
            next_projectile: 1,
            scene,
            config,
        };
        coordinator.spawn_seagulls();
        log::info!(
            "Scene ready: {} seagulls, seed {:#x}",
            coordinator.config.seagull_count,
            coordinator.config.seed
        );
        coordinator
    }

    fn spawn_seagulls(&mut self) {
        let bounds = self.config.flight_bounds;
        for _ in 0..self.config.seagull_count {
            let id = ActorId(self.next_actor);
            self.next_actor += 1;

            let path = FlightPath::new(bounds, &mut self.rng);
            let speed = self
                .rng
                .random_range(self.config.seagull_min_speed..=self.config.seagull_max_speed);
            let progress = self.rng.random::<f32>();

            let mut gull = Seagull::new(id, path, speed, progress);
            let placeholder = gull.spawn_placeholder(&mut self.scene);
            self.registry.register(placeholder, id);
            gull.attach_body(&mut self.physics);
            gull.set_pending_model(self.loader.load_model(&self.config.seagull_model_url));

            self.events.push(GameEvent::SeagullSpawned(id));
            self.seagulls.push(gull);
        }
    }

    /// Advance one frame
    pub fn update(&mut self, dt: f32) {
        if self.disposed || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let dt = dt.min(MAX_FRAME_DT);
        self.clock_ms += dt as f64 * 1000.0;

        let report = self.physics.step(dt);
        self.handle_contacts(&report.contacts);

        self.ocean.advance(dt);

        self.poll_models();
        for gull in &mut self.seagulls {
            gull.update(dt, &mut self.scene, &mut self.physics);
        }

        self.update_projectiles(dt);

        self.cull();
    }

    fn handle_contacts(&mut self, contacts: &[ContactEvent]) {
        let mut targets = Vec::new();
        for contact in contacts {
            for ball in &self.projectiles {
                let Some(body) = ball.body() else {
                    continue;
                };
                if !contact.involves(body) {
                    continue;
                }
                match self.resolver.resolve_contact(body, contact, &self.physics) {
                    Some(CollisionOutcome::TargetHit { actor }) => targets.push(actor),
                    Some(CollisionOutcome::Bounce { .. }) => {
                        self.events.push(GameEvent::ProjectileBounced(ball.id));
                    }
                    Some(CollisionOutcome::PassThrough) | None => {}
                }
            }
        }
        for actor in targets {
            self.notify_hit(actor);
        }
    }

    fn poll_models(&mut self) {
        for gull in &mut self.seagulls {
            if let Some(ModelSwap::Swapped { placeholder, model }) = gull.poll_model(&mut self.scene) {
                if let Some(old) = placeholder {
                    self.registry.unregister(old);
                }
                self.registry.register(model, gull.id());
            }
        }
    }

    fn update_projectiles(&mut self, dt: f32) {
        self.resolver.collidables.refresh(&self.scene, self.clock_ms);
        let now = self.clock_ms;
        let mut survivors = Vec::with_capacity(self.projectiles.len());

        for mut ball in std::mem::take(&mut self.projectiles) {
            if !ball.is_alive(now) {
                ball.dispose(&mut self.scene, &mut self.physics);
                log::debug!("Ball {} expired", ball.id.0);
                self.events.push(GameEvent::ProjectileExpired(ball.id));
                continue;
            }

            match ball.backend {
                ProjectileBackend::Physics(_) => {
                    ball.sync_from_body(&mut self.scene, &self.physics);
                    survivors.push(ball);
                }
                ProjectileBackend::Raycast => {
                    let outcome =
                        self.resolver
                            .resolve_raycast(&mut ball, dt, &self.scene, &self.registry);
                    match outcome {
                        CollisionOutcome::TargetHit { actor } => {
                            ball.dispose(&mut self.scene, &mut self.physics);
                            self.notify_hit(actor);
                        }
                        CollisionOutcome::Bounce { .. } => {
                            ball.sync_node(&mut self.scene);
                            self.events.push(GameEvent::ProjectileBounced(ball.id));
                            survivors.push(ball);
                        }
                        CollisionOutcome::PassThrough => {
                            ball.sync_node(&mut self.scene);
                            survivors.push(ball);
                        }
                    }
                }
            }
        }

        // notify_hit never spawns balls, so nothing was added meanwhile
        self.projectiles = survivors;
    }

    fn cull(&mut self) {
        let camera = self.controls.position;
        let frustum = Frustum::from_view_projection(self.controls.view_projection(self.aspect));
        let max_distance_sq = self.config.cull_distance_sq();

        let mut visibility = Vec::new();
        for id in self.scene.attached_meshes() {
            let Some(node) = self.scene.get(id) else {
                continue;
            };
            if matches!(node.layer, Layer::Terrain | Layer::Ocean) {
                visibility.push((id, true));
                continue;
            }
            let world = self.scene.world_matrix(id);
            let center: Vec3 = world.translation.into();
            let scale = world
                .matrix3
                .x_axis
                .length()
                .max(world.matrix3.y_axis.length())
                .max(world.matrix3.z_axis.length());
            let radius = node.shape().map(|s| s.bounding_radius()).unwrap_or(0.0) * scale;

            let visible = camera.distance_squared(center) <= max_distance_sq
                && frustum.intersects_sphere(center, radius);
            visibility.push((id, visible));
        }

        for (id, visible) in visibility {
            if let Some(node) = self.scene.get_mut(id) {
                node.visible = visible;
            }
        }
    }

    /// Instance list for every visible mesh
    pub fn render(&self) -> Vec<InstanceRaw> {
        let mut instances = Vec::new();
        self.scene.traverse(|id, node| {
            if node.is_mesh() && node.visible {
                instances.push(InstanceRaw {
                    model: Mat4::from(self.scene.world_matrix(id)).to_cols_array_2d(),
                    layer: layer_index(node.layer),
                    object: id.0,
                    _pad: [0; 2],
                });
            }
        });
        instances
    }

    /// Throw with the configured collision backend
    pub fn throw_ball(&mut self, origin: Vec3, velocity: Vec3) -> Option<ProjectileId> {
        self.throw_ball_with(origin, velocity, self.config.throw_mode)
    }

    pub fn throw_ball_with(
        &mut self,
        origin: Vec3,
        velocity: Vec3,
        mode: CollisionMode,
    ) -> Option<ProjectileId> {
        if self.disposed || !origin.is_finite() || !velocity.is_finite() {
            return None;
        }
        let id = ProjectileId(self.next_projectile);
        self.next_projectile += 1;

        let ball = Projectile::spawn(
            id,
            origin,
            velocity,
            mode,
            &self.config.projectile,
            self.clock_ms,
            &mut self.scene,
            &mut self.physics,
        );
        self.projectiles.push(ball);
        self.throws += 1;
        self.events.push(GameEvent::ProjectileThrown(id));
        Some(id)
    }

    /// Throw from the camera; only while the pointer is locked
    pub fn throw_from_camera(&mut self) -> Option<ProjectileId> {
        if !self.controls.is_locked() {
            return None;
        }
        let origin = self.controls.throw_origin();
        let velocity = self.controls.throw_velocity(self.config.throw_speed);
        self.throw_ball(origin, velocity)
    }

    /// Hit notification for an actor. Duplicates and unknown actors are ignored.
    pub fn notify_hit(&mut self, actor: ActorId) -> bool {
        if self.disposed {
            return false;
        }
        let Some(gull) = self.seagulls.iter_mut().find(|g| g.id() == actor) else {
            return false;
        };
        if !gull.hit(&mut self.scene, &mut self.physics) {
            return false;
        }
        self.registry.unregister_actor(actor);

        self.hits += 1;
        self.remaining = self.remaining.saturating_sub(1);
        let remaining = self.remaining;
        self.events.push(GameEvent::SeagullHit { actor, remaining });
        self.ui.on_target_hit(remaining);

        if remaining == 0 && !self.won {
            self.won = true;
            let summary = RoundSummary {
                seagulls: self.config.seagull_count,
                throws: self.throws,
                elapsed_ms: self.clock_ms - self.round_started_ms,
            };
            log::info!(
                "All {} seagulls down in {:.1}s with {} throws",
                summary.seagulls,
                summary.elapsed_ms / 1000.0,
                summary.throws
            );
            self.events.push(GameEvent::AllTargetsEliminated {
                elapsed_ms: summary.elapsed_ms,
            });
            self.ui.on_win_condition_met(&summary);
        }
        true
    }

    /// New round: old seagulls and balls go, a fresh flock arrives
    pub fn reset(&mut self) {
        if self.disposed {
            return;
        }
        for gull in &mut self.seagulls {
            gull.dispose(&mut self.scene, &mut self.physics);
        }
        self.seagulls.clear();
        self.registry.clear();
        for ball in &mut self.projectiles {
            ball.dispose(&mut self.scene, &mut self.physics);
        }
        self.projectiles.clear();

        self.hits = 0;
        self.throws = 0;
        self.remaining = self.config.seagull_count;
        self.won = false;
        self.round_started_ms = self.clock_ms;

        self.spawn_seagulls();
        self.events.push(GameEvent::Reset);
        log::info!("Round reset with {} seagulls", self.remaining);
    }

    /// Release every body and GPU resource. Later calls (and late asset
    /// completions) are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for ball in &mut self.projectiles {
            ball.dispose(&mut self.scene, &mut self.physics);
        }
        self.projectiles.clear();
        for gull in &mut self.seagulls {
            gull.dispose(&mut self.scene, &mut self.physics);
        }
        self.seagulls.clear();
        self.registry.clear();
        self.physics.dispose();
        self.scene.clear();
        self.disposed = true;
        log::info!(
            "Scene disposed, {} GPU resources released",
            self.scene.released_resources()
        );
    }

    /// Regenerate every flight path inside `bounds`, keeping progress
    pub fn set_flight_bounds(&mut self, bounds: FlightBounds) {
        self.config.flight_bounds = bounds;
        for gull in &mut self.seagulls {
            gull.set_bounds(bounds, &mut self.rng);
        }
    }

    pub fn set_pointer_locked(&mut self, locked: bool) {
        let changed = if locked {
            self.controls.lock()
        } else {
            self.controls.unlock()
        };
        if changed {
            self.ui.on_input_locked(locked);
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn seagulls(&self) -> &[Seagull] {
        &self.seagulls
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn ocean(&self) -> &OceanSurface {
        &self.ocean
    }

    pub fn controls(&self) -> &PlayerControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut PlayerControls {
        &mut self.controls
    }

    pub fn remaining_targets(&self) -> u32 {
        self.remaining
    }

    pub fn hit_count(&self) -> u32 {
        self.hits
    }

    pub fn throws(&self) -> u32 {
        self.throws
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }
}

/// Island, rocks, ocean, sun and camera. The island top sits on the
/// ground plane; the rock and the crate get static colliders.
fn build_island(scene: &mut SceneGraph, physics: &mut PhysicsWorld) {
    scene.add(
        NodeDesc::mesh(
            "island",
            MeshShape::Cuboid {
                half_extents: Vec3::new(30.0, 2.0, 30.0),
            },
            Layer::Terrain,
        )
        .at(Vec3::new(0.0, -2.0, 0.0)),
        None,
    );
    let props = [
        NodeDesc::mesh("rock", MeshShape::Sphere { radius: 3.0 }, Layer::Terrain)
            .at(Vec3::new(-12.0, 0.5, -8.0)),
        NodeDesc::mesh(
            "crate",
            MeshShape::Cuboid {
                half_extents: Vec3::splat(0.75),
            },
            Layer::Prop,
        )
        .at(Vec3::new(6.0, 0.75, 2.0))
        .rotated(Quat::from_rotation_y(0.4)),
    ];
    for desc in props {
        let shape = match desc.kind {
            ObjectKind::Mesh(MeshShape::Sphere { radius }) => BodyShape::Sphere { radius },
            ObjectKind::Mesh(MeshShape::Cuboid { half_extents }) => BodyShape::Cuboid { half_extents },
            _ => continue,
        };
        let body = BodyDesc::fixed(shape).at(desc.position).rotated(desc.rotation);
        let id = scene.add(desc, None);
        physics.add_body(body, BodyOwner::Prop(id));
    }
    scene.add(
        NodeDesc::new("sun", ObjectKind::Light, Layer::Prop).at(Vec3::new(50.0, 100.0, 30.0)),
        None,
    );
    scene.add(NodeDesc::new("camera", ObjectKind::Camera, Layer::Prop), None);
    scene.add(
        NodeDesc::mesh(
            "ocean",
            MeshShape::Plane {
                half_size: Vec2::splat(1000.0),
            },
            Layer::Ocean,
        )
        .at(Vec3::new(0.0, -0.5, 0.0)),
        None,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{InstantLoader, ManualLoader, ModelData};
    use crate::consts::*;
    use crate::sim::actor::ActorState;
    use crate::sim::projectile::ProjectileSpec;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct UiLog {
        wins: Vec<RoundSummary>,
        locks: Vec<bool>,
        remaining: Vec<u32>,
    }

    struct RecordingUi(Rc<RefCell<UiLog>>);

    impl UiNotifier for RecordingUi {
        fn on_win_condition_met(&mut self, summary: &RoundSummary) {
            self.0.borrow_mut().wins.push(summary.clone());
        }
        fn on_input_locked(&mut self, locked: bool) {
            self.0.borrow_mut().locks.push(locked);
        }
        fn on_target_hit(&mut self, remaining: u32) {
            self.0.borrow_mut().remaining.push(remaining);
        }
    }

    fn still_config() -> GameConfig {
        GameConfig {
            seagull_min_speed: 0.0,
            seagull_max_speed: 0.0,
            ..Default::default()
        }
    }

    fn coordinator(config: GameConfig) -> (SceneCoordinator, Rc<RefCell<UiLog>>) {
        let log = Rc::new(RefCell::new(UiLog::default()));
        let c = SceneCoordinator::new(
            config,
            Box::new(InstantLoader),
            Box::new(RecordingUi(log.clone())),
        );
        (c, log)
    }

    /// Ground, rock and crate
    const STATIC_BODIES: usize = 3;

    fn ids(c: &SceneCoordinator) -> Vec<ActorId> {
        c.seagulls().iter().map(|g| g.id()).collect()
    }

    /// Let models load and the collidable set pick them up
    fn settle(c: &mut SceneCoordinator) {
        for _ in 0..40 {
            c.update(FIXED_DT);
        }
    }

    #[test]
    fn test_spawns_configured_flock() {
        let (c, _) = coordinator(GameConfig::default());
        assert_eq!(c.seagulls().len(), SEAGULL_COUNT as usize);
        assert_eq!(c.remaining_targets(), SEAGULL_COUNT);
        // Static scenery plus one collider per gull
        assert_eq!(c.physics().len(), STATIC_BODIES + SEAGULL_COUNT as usize);
        assert_eq!(c.physics().engine_len(), c.physics().len());
    }

    #[test]
    fn test_win_fires_once_after_all_hits() {
        let (mut c, log) = coordinator(GameConfig::default());
        let actors = ids(&c);

        for actor in &actors[..4] {
            assert!(c.notify_hit(*actor));
        }
        assert!(!c.is_won());
        assert!(log.borrow().wins.is_empty());

        assert!(c.notify_hit(actors[4]));
        assert!(c.is_won());
        assert_eq!(c.remaining_targets(), 0);
        assert_eq!(log.borrow().wins.len(), 1);
        assert_eq!(log.borrow().remaining, vec![4, 3, 2, 1, 0]);

        // Nothing left to hit
        assert!(!c.notify_hit(actors[4]));
        assert_eq!(log.borrow().wins.len(), 1);
    }

    #[test]
    fn test_duplicate_hits_ignored() {
        let (mut c, _) = coordinator(GameConfig::default());
        let actor = ids(&c)[0];
        assert!(c.notify_hit(actor));
        assert!(!c.notify_hit(actor));
        assert!(!c.notify_hit(actor));
        assert_eq!(c.hit_count(), 1);
        assert_eq!(c.remaining_targets(), SEAGULL_COUNT - 1);
        assert!(!c.notify_hit(ActorId(9999)));
    }

    #[test]
    fn test_reset_after_win() {
        let (mut c, _) = coordinator(GameConfig::default());
        for actor in ids(&c) {
            c.notify_hit(actor);
        }
        assert!(c.is_won());
        c.drain_events();

        c.reset();
        assert!(!c.is_won());
        assert_eq!(c.hit_count(), 0);
        assert_eq!(c.remaining_targets(), SEAGULL_COUNT);
        assert_eq!(c.seagulls().len(), SEAGULL_COUNT as usize);
        assert!(c.seagulls().iter().all(|g| g.is_alive()));
        assert_eq!(c.physics().len(), STATIC_BODIES + SEAGULL_COUNT as usize);
        assert!(c.drain_events().contains(&GameEvent::Reset));
    }

    #[test]
    fn test_reset_detaches_previous_flock() {
        let (mut c, _) = coordinator(GameConfig::default());
        settle(&mut c);
        let old_visuals: Vec<_> = c.seagulls().iter().filter_map(|g| g.visual()).collect();
        c.reset();
        for visual in old_visuals {
            assert!(!c.scene().contains(visual));
        }
    }

    #[test]
    fn test_raycast_throw_hits_seagull() {
        let (mut c, log) = coordinator(still_config());
        settle(&mut c);
        assert!(c.seagulls().iter().all(|g| g.state() == ActorState::Flying));

        let target = c.seagulls()[0].position();
        let actor = c.seagulls()[0].id();
        c.throw_ball_with(
            target + Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(0.0, 0.0, -20.0),
            CollisionMode::Raycast,
        )
        .unwrap();

        for _ in 0..20 {
            c.update(FIXED_DT);
        }
        assert!(c.seagulls()[0].is_hit());
        assert!(c.projectiles().is_empty());
        assert!(c
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::SeagullHit { actor: a, .. } if *a == actor)));
        assert_eq!(log.borrow().remaining, vec![SEAGULL_COUNT - 1]);
    }

    #[test]
    fn test_physics_throw_hits_seagull() {
        let (mut c, _) = coordinator(still_config());
        settle(&mut c);

        let target = c.seagulls()[1].position();
        c.throw_ball_with(
            target + Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(-20.0, 0.0, 0.0),
            CollisionMode::Physics,
        )
        .unwrap();

        for _ in 0..20 {
            c.update(FIXED_DT);
        }
        assert!(c.seagulls()[1].is_hit());
        assert_eq!(c.remaining_targets(), SEAGULL_COUNT - 1);
        assert!(c.seagulls()[1].body().is_none());
    }

    #[test]
    fn test_projectiles_expire_once() {
        let (mut c, _) = coordinator(GameConfig::default());
        // First frame swaps in the models
        c.update(0.1);
        let id = c
            .throw_ball(Vec3::new(0.0, 50.0, 0.0), Vec3::new(0.0, 30.0, 0.0))
            .unwrap();
        let released_before = c.scene().released_resources();

        // Just short of the lifetime the ball is still around
        for _ in 0..49 {
            c.update(0.1);
        }
        assert_eq!(c.projectiles().len(), 1);

        for _ in 0..2 {
            c.update(0.1);
        }
        assert!(c.projectiles().is_empty());
        let expired = c
            .drain_events()
            .into_iter()
            .filter(|e| *e == GameEvent::ProjectileExpired(id))
            .count();
        assert_eq!(expired, 1);
        assert_eq!(c.scene().released_resources() - released_before, 2);
    }

    #[test]
    fn test_physics_projectiles_expire_once() {
        let (mut c, _) = coordinator(GameConfig::default());
        c.update(0.1);
        let bodies = c.physics().len();
        let id = c
            .throw_ball_with(
                Vec3::new(0.0, 50.0, 0.0),
                Vec3::new(0.0, 30.0, 0.0),
                CollisionMode::Physics,
            )
            .unwrap();
        assert_eq!(c.physics().len(), bodies + 1);

        for _ in 0..49 {
            c.update(0.1);
        }
        assert_eq!(c.projectiles().len(), 1);
        assert_eq!(c.physics().len(), bodies + 1);

        for _ in 0..2 {
            c.update(0.1);
        }
        assert!(c.projectiles().is_empty());
        assert_eq!(c.physics().len(), bodies);
        assert_eq!(c.physics().engine_len(), bodies);

        for _ in 0..10 {
            c.update(0.1);
        }
        assert_eq!(c.physics().len(), bodies);
        let expired = c
            .drain_events()
            .into_iter()
            .filter(|e| *e == GameEvent::ProjectileExpired(id))
            .count();
        assert_eq!(expired, 1);
    }

    #[test]
    fn test_raycast_ball_settles_on_island() {
        let config = GameConfig {
            projectile: ProjectileSpec {
                lifetime_ms: 20_000.0,
                ..Default::default()
            },
            ..still_config()
        };
        let (mut c, _) = coordinator(config);
        let id = c
            .throw_ball_with(Vec3::new(2.0, 1.0, 2.0), Vec3::ZERO, CollisionMode::Raycast)
            .unwrap();

        for _ in 0..180 {
            c.update(FIXED_DT);
        }
        c.drain_events();
        for _ in 0..120 {
            c.update(FIXED_DT);
        }

        let bounces = c
            .drain_events()
            .into_iter()
            .filter(|e| *e == GameEvent::ProjectileBounced(id))
            .count();
        assert_eq!(bounces, 0);
        let ball = &c.projectiles()[0];
        assert!(ball.resting);
        assert_eq!(ball.velocity, Vec3::ZERO);
        assert!(ball.position.y >= 0.0 && ball.position.y < 0.05);
    }

    #[test]
    fn test_physics_ball_bounces_off_crate() {
        let (mut c, _) = coordinator(still_config());
        let id = c
            .throw_ball_with(
                Vec3::new(6.0, 0.75, 6.0),
                Vec3::new(0.0, 0.0, -15.0),
                CollisionMode::Physics,
            )
            .unwrap();

        for _ in 0..60 {
            c.update(FIXED_DT);
        }
        // Without a collider the ball would be well past z = -5 by now
        let ball = &c.projectiles()[0];
        assert!(ball.position.z > 2.5, "ball went through the crate: {:?}", ball.position);
        assert!(c.drain_events().contains(&GameEvent::ProjectileBounced(id)));
    }

    #[test]
    fn test_models_swap_in_when_loaded() {
        let loader = ManualLoader::new();
        let mut c = SceneCoordinator::new(
            GameConfig::default(),
            Box::new(loader.clone()),
            Box::new(NullUi),
        );
        c.update(FIXED_DT);
        assert!(c.seagulls().iter().all(|g| g.state() == ActorState::Spawning));

        let completers = loader.take_pending();
        assert_eq!(completers.len(), SEAGULL_COUNT as usize);
        let mut completers = completers.into_iter();
        if let Some(first) = completers.next() {
            first.fail("404");
        }
        for completer in completers {
            completer.succeed(ModelData::seagull());
        }
        c.update(FIXED_DT);
        assert!(c.seagulls().iter().all(|g| g.state() == ActorState::Flying));
        // Failed load keeps the placeholder, which is still a registered target
        let first = &c.seagulls()[0];
        let placeholder = first.visual().unwrap();
        assert!(c.scene().is_attached(placeholder));
        assert_eq!(c.registry.resolve(c.scene(), placeholder), Some(first.id()));
    }

    #[test]
    fn test_dispose_releases_everything() {
        let loader = ManualLoader::new();
        let mut c = SceneCoordinator::new(
            GameConfig::default(),
            Box::new(loader.clone()),
            Box::new(NullUi),
        );
        c.throw_ball_with(Vec3::new(0.0, 5.0, 0.0), Vec3::X, CollisionMode::Physics);
        c.throw_ball_with(Vec3::new(0.0, 5.0, 0.0), Vec3::X, CollisionMode::Raycast);
        c.update(FIXED_DT);

        c.dispose();
        assert!(c.is_disposed());
        assert!(c.physics().is_empty());
        assert!(c.scene().is_empty());
        assert_eq!(c.scene().live_resources(), 0);

        // Late completions land nowhere
        for completer in loader.take_pending() {
            assert!(!completer.succeed(ModelData::seagull()));
        }
        let released = c.scene().released_resources();
        c.dispose();
        c.update(FIXED_DT);
        assert_eq!(c.scene().released_resources(), released);
        assert!(c.throw_ball(Vec3::ZERO, Vec3::X).is_none());
    }

    #[test]
    fn test_flight_bounds_keep_progress() {
        let (mut c, _) = coordinator(GameConfig::default());
        c.update(FIXED_DT);
        let before: Vec<f32> = c.seagulls().iter().map(|g| g.progress()).collect();
        let bounds = FlightBounds::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 5.0, 10.0), 30.0);
        c.set_flight_bounds(bounds);
        let after: Vec<f32> = c.seagulls().iter().map(|g| g.progress()).collect();
        assert_eq!(before, after);
        assert!(c.seagulls().iter().all(|g| *g.path().bounds() == bounds));
    }

    #[test]
    fn test_pointer_lock_notifies_on_change() {
        let (mut c, log) = coordinator(GameConfig::default());
        assert!(c.throw_from_camera().is_none());
        c.set_pointer_locked(true);
        c.set_pointer_locked(true);
        assert!(c.throw_from_camera().is_some());
        c.set_pointer_locked(false);
        assert_eq!(log.borrow().locks, vec![true, false]);
    }

    #[test]
    fn test_cull_hides_distant_and_offscreen() {
        let (mut c, _) = coordinator(GameConfig::default());
        let far = c.scene.add(
            NodeDesc::mesh("far", MeshShape::Sphere { radius: 1.0 }, Layer::Prop)
                .at(Vec3::new(0.0, 4.0, -5000.0)),
            None,
        );
        let behind = c.scene.add(
            NodeDesc::mesh("behind", MeshShape::Sphere { radius: 1.0 }, Layer::Prop)
                .at(Vec3::new(0.0, 4.0, 40.0)),
            None,
        );
        let ahead = c.scene.add(
            NodeDesc::mesh("ahead", MeshShape::Sphere { radius: 1.0 }, Layer::Prop)
                .at(Vec3::new(0.0, 4.0, -20.0)),
            None,
        );
        c.update(FIXED_DT);

        let visible = |id| c.scene().get(id).map(|n| n.visible);
        assert_eq!(visible(far), Some(false));
        assert_eq!(visible(behind), Some(false));
        assert_eq!(visible(ahead), Some(true));

        let rendered: Vec<u32> = c.render().iter().map(|i| i.object).collect();
        assert!(rendered.contains(&ahead.0));
        assert!(!rendered.contains(&far.0));
    }

    #[test]
    fn test_huge_frame_is_bounded() {
        let (mut c, _) = coordinator(GameConfig::default());
        c.update(1000.0);
        assert!((c.clock_ms() - MAX_FRAME_DT as f64 * 1000.0).abs() < 1e-3);
        c.update(f32::NAN);
        assert!((c.clock_ms() - MAX_FRAME_DT as f64 * 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let config = GameConfig {
            seagull_count: 0,
            ..Default::default()
        };
        let (c, _) = coordinator(config);
        assert_eq!(c.seagulls().len(), SEAGULL_COUNT as usize);
    }
}
