//! Rigid-body world
//!
//! `PhysicsWorld` drives rapier with a fixed-timestep accumulator and keeps
//! its own ordered registry of live bodies and their owners. Contacts come
//! back as `ContactEvent`s in registry handles, never rapier handles.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use glam::{Quat, Vec3};
use rapier3d::crossbeam::channel::{Receiver, unbounded};
use rapier3d::prelude::{
    ActiveEvents, CCDSolver, ChannelEventCollector, CoefficientCombineRule, ColliderBuilder,
    ColliderHandle, ColliderSet, CollisionEvent, DefaultBroadPhase, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline, Real,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet, Vector,
};
use serde::{Deserialize, Serialize};

use super::actor::ActorId;
use super::projectile::ProjectileId;
use super::scene::ObjectId;
use crate::consts::*;

/// Handle to a body in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle(pub u32);

/// How a body participates in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Never moves
    Static,
    /// Moved by the game, pushes dynamic bodies but ignores forces
    Kinematic,
    /// Integrated by the solver
    Dynamic,
}

/// Collision shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
    /// Half-space below the body position, facing world up
    Plane,
}

/// What a body belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOwner {
    Ground,
    /// Static scenery mirrored from a scene node
    Prop(ObjectId),
    Actor(ActorId),
    Projectile(ProjectileId),
}

/// Everything needed to create a body
#[derive(Debug, Clone, Copy)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub shape: BodyShape,
    pub mass: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub restitution: f32,
}

impl BodyDesc {
    pub fn new(kind: BodyKind, shape: BodyShape) -> Self {
        Self {
            kind,
            shape,
            mass: 0.0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            restitution: 0.3,
        }
    }

    /// Dynamic sphere
    pub fn sphere(radius: f32, mass: f32) -> Self {
        Self {
            mass,
            ..Self::new(BodyKind::Dynamic, BodyShape::Sphere { radius })
        }
    }

    pub fn kinematic_sphere(radius: f32) -> Self {
        Self::new(BodyKind::Kinematic, BodyShape::Sphere { radius })
    }

    pub fn fixed(shape: BodyShape) -> Self {
        Self::new(BodyKind::Static, shape)
    }

    /// Static ground at y = 0
    pub fn ground() -> Self {
        Self::fixed(BodyShape::Plane)
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }
}

/// Snapshot of a live body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub kind: BodyKind,
    pub shape: BodyShape,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// A pair of bodies that started touching during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContactEvent {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

impl ContactEvent {
    pub fn involves(&self, handle: BodyHandle) -> bool {
        self.a == handle || self.b == handle
    }

    /// The body on the other side of `handle`
    pub fn other(&self, handle: BodyHandle) -> Option<BodyHandle> {
        if self.a == handle {
            Some(self.b)
        } else if self.b == handle {
            Some(self.a)
        } else {
            None
        }
    }
}

/// World tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub fixed_dt: f32,
    pub max_substeps: u32,
    pub solver_iterations: u32,
    pub gravity: Vec3,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            fixed_dt: FIXED_DT,
            max_substeps: MAX_SUBSTEPS,
            solver_iterations: SOLVER_ITERATIONS,
            gravity: Vec3::new(0.0, -GRAVITY, 0.0),
        }
    }
}

/// Result of a `PhysicsWorld::step` call
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Fixed steps actually taken
    pub steps: u32,
    /// Sorted, one entry per pair
    pub contacts: Vec<ContactEvent>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    kind: BodyKind,
    shape: BodyShape,
}

fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// Fixed-timestep rapier world with a body registry
pub struct PhysicsWorld {
    config: PhysicsConfig,
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    collector: ChannelEventCollector,
    collisions: Receiver<CollisionEvent>,
    accumulator: f32,
    /// Insertion ordered, mirrors the rapier body set
    registry: Vec<(BodyHandle, BodyOwner)>,
    entries: BTreeMap<BodyHandle, Entry>,
    ground: Option<BodyHandle>,
    next_handle: u32,
    disposed: bool,
}

impl PhysicsWorld {
    /// Build a world; the static ground is added here
    pub fn new(config: PhysicsConfig) -> Self {
        let (collision_send, collisions) = unbounded();
        // Contact force events are never enabled on our colliders
        let (force_send, _) = unbounded();

        let params = IntegrationParameters {
            dt: config.fixed_dt,
            num_solver_iterations: NonZeroUsize::new(config.solver_iterations as usize)
                .unwrap_or(NonZeroUsize::MIN),
            ..IntegrationParameters::default()
        };

        let mut world = Self {
            config,
            gravity: to_vector(config.gravity),
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            collector: ChannelEventCollector::new(collision_send, force_send),
            collisions,
            accumulator: 0.0,
            registry: Vec::new(),
            entries: BTreeMap::new(),
            ground: None,
            next_handle: 1,
            disposed: false,
        };
        world.ground = world.add_body(BodyDesc::ground(), BodyOwner::Ground);
        log::debug!(
            "Physics world ready: dt={:.4}s, max_substeps={}, iterations={}",
            config.fixed_dt,
            config.max_substeps,
            config.solver_iterations
        );
        world
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn ground(&self) -> Option<BodyHandle> {
        self.ground
    }

    /// Register a body. Returns None once the world is disposed.
    pub fn add_body(&mut self, desc: BodyDesc, owner: BodyOwner) -> Option<BodyHandle> {
        if self.disposed {
            log::warn!("add_body on a disposed physics world ignored");
            return None;
        }
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        let tag = u128::from(handle.0);

        let builder = match desc.kind {
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_position_based(),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic()
                .linvel(to_vector(desc.velocity))
                .ccd_enabled(true),
        };
        let body = builder
            .translation(to_vector(desc.position))
            .rotation(to_vector(desc.rotation.to_scaled_axis()))
            .user_data(tag)
            .build();

        let collider = match desc.shape {
            BodyShape::Sphere { radius } => ColliderBuilder::ball(radius),
            BodyShape::Cuboid { half_extents: h } => ColliderBuilder::cuboid(h.x, h.y, h.z),
            BodyShape::Plane => ColliderBuilder::halfspace(Vector::y_axis()),
        };
        let mut collider = collider
            .restitution(desc.restitution)
            .restitution_combine_rule(CoefficientCombineRule::Max)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(tag);
        if desc.kind == BodyKind::Dynamic && desc.mass > 0.0 {
            collider = collider.mass(desc.mass);
        }

        let body = self.bodies.insert(body);
        let collider = self
            .colliders
            .insert_with_parent(collider.build(), body, &mut self.bodies);

        self.entries.insert(
            handle,
            Entry {
                body,
                collider,
                kind: desc.kind,
                shape: desc.shape,
            },
        );
        self.registry.push((handle, owner));
        Some(handle)
    }

    /// Remove a body; unknown handles are a no-op returning false
    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        let Some(index) = self.registry.iter().position(|(h, _)| *h == handle) else {
            return false;
        };
        self.registry.remove(index);
        if let Some(entry) = self.entries.remove(&handle) {
            self.bodies.remove(
                entry.body,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
        if self.ground == Some(handle) {
            self.ground = None;
        }
        true
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn owner_of(&self, handle: BodyHandle) -> Option<BodyOwner> {
        self.registry
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, owner)| *owner)
    }

    /// Registered bodies in insertion order
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, BodyOwner)> + '_ {
        self.registry.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Bodies alive inside rapier; equals `len()` at all times
    pub fn engine_len(&self) -> usize {
        self.bodies.len()
    }

    pub fn body(&self, handle: BodyHandle) -> Option<BodyState> {
        let entry = self.entries.get(&handle)?;
        let body = self.bodies.get(entry.body)?;
        Some(BodyState {
            kind: entry.kind,
            shape: entry.shape,
            position: to_vec3(body.translation()),
            velocity: to_vec3(body.linvel()),
        })
    }

    /// Target for a kinematic body, reached on the next fixed step
    pub fn set_kinematic_position(&mut self, handle: BodyHandle, position: Vec3) {
        let Some(entry) = self.entries.get(&handle) else {
            return;
        };
        if entry.kind != BodyKind::Kinematic {
            return;
        }
        if let Some(body) = self.bodies.get_mut(entry.body) {
            body.set_next_kinematic_translation(to_vector(position));
        }
    }

    /// Normal pointing from `other` toward `body` while the pair is touching
    pub fn contact_normal(&self, body: BodyHandle, other: BodyHandle) -> Option<Vec3> {
        let a = self.entries.get(&body)?.collider;
        let b = self.entries.get(&other)?.collider;
        let pair = self.narrow_phase.contact_pair(a, b)?;
        let manifold = pair.manifolds.iter().find(|m| !m.points.is_empty())?;
        // Manifold normals point out of collider1
        let normal = to_vec3(&manifold.data.normal);
        Some(if pair.collider1 == a { -normal } else { normal })
    }

    fn body_of(&self, collider: ColliderHandle) -> Option<BodyHandle> {
        let handle = BodyHandle(u32::try_from(self.colliders.get(collider)?.user_data).ok()?);
        self.entries.contains_key(&handle).then_some(handle)
    }

    fn step_once(&mut self, contacts: &mut Vec<ContactEvent>) {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            None,
            &(),
            &self.collector,
        );

        while let Ok(event) = self.collisions.try_recv() {
            if !event.started() {
                continue;
            }
            let (Some(a), Some(b)) = (
                self.body_of(event.collider1()),
                self.body_of(event.collider2()),
            ) else {
                continue;
            };
            contacts.push(ContactEvent {
                a: a.min(b),
                b: a.max(b),
            });
        }
    }

    /// Advance by real elapsed time.
    ///
    /// Takes at most `max_substeps` fixed steps. Whole steps beyond the cap
    /// are dropped; the fractional remainder carries into the next call.
    pub fn step(&mut self, dt: f32) -> StepReport {
        let mut report = StepReport::default();
        if self.disposed || !dt.is_finite() || dt <= 0.0 {
            return report;
        }

        let fixed = self.config.fixed_dt;
        self.accumulator += dt;
        while self.accumulator >= fixed && report.steps < self.config.max_substeps.max(1) {
            self.step_once(&mut report.contacts);
            self.accumulator -= fixed;
            report.steps += 1;
        }
        if self.accumulator >= fixed {
            log::trace!(
                "Physics fell behind, dropping {} steps",
                (self.accumulator / fixed) as u32
            );
            self.accumulator %= fixed;
        }
        report.contacts.sort();
        report.contacts.dedup();
        report
    }

    /// How far between fixed steps the current frame lies, in [0, 1)
    pub fn interpolation_alpha(&self) -> f32 {
        (self.accumulator / self.config.fixed_dt).clamp(0.0, 1.0)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Remove every registered body (ground included) and shut the world down
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let handles: Vec<BodyHandle> = self.registry.iter().map(|(h, _)| *h).collect();
        for handle in handles {
            self.remove_body(handle);
        }
        while self.collisions.try_recv().is_ok() {}
        self.disposed = true;
        log::debug!(
            "Physics world disposed ({} bodies left in engine)",
            self.bodies.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig::default())
    }

    fn drop_ball(w: &mut PhysicsWorld, position: Vec3) -> BodyHandle {
        w.add_body(
            BodyDesc::sphere(BALL_RADIUS, BALL_MASS).at(position),
            BodyOwner::Projectile(ProjectileId(1)),
        )
        .unwrap()
    }

    #[test]
    fn test_ground_is_static_plane() {
        let w = world();
        let ground = w.ground().unwrap();
        let body = w.body(ground).unwrap();
        assert_eq!(body.kind, BodyKind::Static);
        assert_eq!(body.shape, BodyShape::Plane);
        assert_eq!(w.owner_of(ground), Some(BodyOwner::Ground));
        assert_eq!(w.engine_len(), 1);
    }

    #[test]
    fn test_step_caps_substeps() {
        let mut w = world();
        let report = w.step(10.0);
        assert_eq!(report.steps, MAX_SUBSTEPS);
        assert!(w.interpolation_alpha() < 1.0);

        // The backlog was dropped, not carried forward
        let report = w.step(0.0001);
        assert!(report.steps <= 1);
    }

    #[test]
    fn test_step_keeps_remainder() {
        let mut w = world();
        assert_eq!(w.step(FIXED_DT * 0.6).steps, 0);
        assert_eq!(w.step(FIXED_DT * 0.6).steps, 1);
        assert!((w.interpolation_alpha() - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_step_ignores_bad_dt() {
        let mut w = world();
        assert_eq!(w.step(f32::NAN).steps, 0);
        assert_eq!(w.step(-1.0).steps, 0);
        assert_eq!(w.step(f32::INFINITY).steps, 0);
    }

    #[test]
    fn test_ball_rests_on_ground() {
        let mut w = world();
        let ball = drop_ball(&mut w, Vec3::new(0.0, 2.0, 0.0));
        let ground = w.ground().unwrap();
        let mut touched = false;
        for _ in 0..600 {
            let report = w.step(FIXED_DT);
            touched |= report
                .contacts
                .iter()
                .any(|c| c.involves(ball) && c.other(ball) == Some(ground));
        }
        assert!(touched);
        let body = w.body(ball).unwrap();
        assert!(body.position.y > BALL_RADIUS - 0.05);
        assert!(body.position.y < 0.5);
        assert!(body.velocity.length() < 0.1);
    }

    #[test]
    fn test_static_prop_stops_falling_ball() {
        let mut w = world();
        w.add_body(
            BodyDesc::fixed(BodyShape::Cuboid {
                half_extents: Vec3::splat(0.75),
            })
            .at(Vec3::new(0.0, 0.75, 0.0)),
            BodyOwner::Prop(ObjectId(7)),
        );
        let ball = drop_ball(&mut w, Vec3::new(0.0, 4.0, 0.0));
        for _ in 0..300 {
            w.step(FIXED_DT);
        }
        let y = w.body(ball).unwrap().position.y;
        assert!(y > 1.5 + BALL_RADIUS - 0.05, "ball sank into the prop: {}", y);
    }

    #[test]
    fn test_kinematic_contact_reported() {
        let mut w = PhysicsWorld::new(PhysicsConfig {
            gravity: Vec3::ZERO,
            ..Default::default()
        });
        let gull = w
            .add_body(
                BodyDesc::kinematic_sphere(1.0).at(Vec3::new(0.0, 10.0, 0.0)),
                BodyOwner::Actor(ActorId(1)),
            )
            .unwrap();
        let ball = w
            .add_body(
                BodyDesc::sphere(0.2, 1.0)
                    .at(Vec3::new(-3.0, 10.0, 0.0))
                    .with_velocity(Vec3::new(30.0, 0.0, 0.0)),
                BodyOwner::Projectile(ProjectileId(1)),
            )
            .unwrap();

        let mut hit = None;
        for _ in 0..30 {
            let report = w.step(FIXED_DT);
            if let Some(c) = report.contacts.iter().find(|c| c.involves(ball)) {
                hit = c.other(ball);
                break;
            }
        }
        assert_eq!(hit, Some(gull));
        // Kinematic bodies do not get pushed
        let gull_pos = w.body(gull).unwrap().position;
        assert!((gull_pos - Vec3::new(0.0, 10.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_kinematic_target_reached_next_step() {
        let mut w = world();
        let gull = w
            .add_body(
                BodyDesc::kinematic_sphere(1.0).at(Vec3::new(0.0, 10.0, 0.0)),
                BodyOwner::Actor(ActorId(1)),
            )
            .unwrap();
        w.set_kinematic_position(gull, Vec3::new(1.0, 11.0, 2.0));
        w.step(FIXED_DT);
        let pos = w.body(gull).unwrap().position;
        assert!((pos - Vec3::new(1.0, 11.0, 2.0)).length() < 1e-4);

        // Dynamic bodies ignore kinematic targets
        let ball = drop_ball(&mut w, Vec3::new(5.0, 5.0, 5.0));
        w.set_kinematic_position(ball, Vec3::ZERO);
        w.step(FIXED_DT);
        assert!(w.body(ball).unwrap().position.y > 4.0);
    }

    #[test]
    fn test_registry_mirrors_engine() {
        let mut w = world();
        let balls: Vec<BodyHandle> = (0..4)
            .map(|i| drop_ball(&mut w, Vec3::new(i as f32, 5.0, 0.0)))
            .collect();
        assert_eq!(w.len(), 5);
        assert_eq!(w.engine_len(), 5);

        assert!(w.remove_body(balls[1]));
        assert!(!w.remove_body(balls[1]));
        assert_eq!(w.len(), 4);
        assert_eq!(w.engine_len(), 4);
        let order: Vec<BodyHandle> = w.bodies().map(|(h, _)| h).collect();
        assert_eq!(order, vec![w.ground().unwrap(), balls[0], balls[2], balls[3]]);
    }

    #[test]
    fn test_remove_unknown_body_is_noop() {
        let mut w = world();
        assert!(!w.remove_body(BodyHandle(999)));
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_dispose_removes_everything() {
        let mut w = world();
        for i in 0..4 {
            drop_ball(&mut w, Vec3::new(i as f32, 5.0, 0.0));
        }
        assert_eq!(w.len(), 5);
        w.dispose();
        assert!(w.is_empty());
        assert_eq!(w.engine_len(), 0);
        assert!(w.ground().is_none());
        assert!(w
            .add_body(BodyDesc::sphere(0.2, 1.0), BodyOwner::Ground)
            .is_none());
        assert_eq!(w.step(1.0).steps, 0);
        w.dispose();
    }
}
