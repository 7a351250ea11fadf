//! Thrown balls
//!
//! A ball is either backed by a dynamic rigid body (the engine resolves its
//! contacts) or moved by the raycast resolver. Either way it lives for a
//! fixed time and is disposed exactly once.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::physics::{BodyDesc, BodyHandle, BodyOwner, PhysicsWorld};
use super::scene::{Layer, MeshShape, NodeDesc, ObjectId, SceneGraph};
use crate::consts::*;

/// Stable projectile id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectileId(pub u32);

/// Which collision backend moves a ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollisionMode {
    /// Dynamic rigid body, engine contact events
    Physics,
    /// Per-tick raycast against the collidable set
    #[default]
    Raycast,
}

/// Backend state of a live ball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileBackend {
    Physics(BodyHandle),
    Raycast,
}

/// Ball properties shared by every throw
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpec {
    pub radius: f32,
    pub mass: f32,
    pub lifetime_ms: f64,
    /// Restitution given to physics-backed balls
    pub restitution: f32,
}

impl Default for ProjectileSpec {
    fn default() -> Self {
        Self {
            radius: BALL_RADIUS,
            mass: BALL_MASS,
            lifetime_ms: BALL_LIFETIME_MS,
            restitution: BOUNCE_FACTOR,
        }
    }
}

/// A thrown ball
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: ProjectileId,
    pub node: ObjectId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    pub mass: f32,
    pub created_at_ms: f64,
    pub lifetime_ms: f64,
    pub backend: ProjectileBackend,
    /// Raycast ball settled on a floor; it no longer moves
    pub resting: bool,
    disposed: bool,
}

impl Projectile {
    /// Create the ball's mesh (and body, for `CollisionMode::Physics`)
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        id: ProjectileId,
        origin: Vec3,
        velocity: Vec3,
        mode: CollisionMode,
        spec: &ProjectileSpec,
        now_ms: f64,
        scene: &mut SceneGraph,
        physics: &mut PhysicsWorld,
    ) -> Self {
        let node = scene.add(
            NodeDesc::mesh(
                format!("ball-{}", id.0),
                MeshShape::Sphere {
                    radius: spec.radius,
                },
                Layer::Projectile,
            )
            .at(origin),
            None,
        );

        let backend = match mode {
            CollisionMode::Physics => physics
                .add_body(
                    BodyDesc::sphere(spec.radius, spec.mass)
                        .at(origin)
                        .with_velocity(velocity)
                        .with_restitution(spec.restitution),
                    BodyOwner::Projectile(id),
                )
                .map(ProjectileBackend::Physics)
                .unwrap_or(ProjectileBackend::Raycast),
            CollisionMode::Raycast => ProjectileBackend::Raycast,
        };

        Self {
            id,
            node,
            position: origin,
            velocity,
            radius: spec.radius,
            mass: spec.mass,
            created_at_ms: now_ms,
            lifetime_ms: spec.lifetime_ms,
            backend,
            resting: false,
            disposed: false,
        }
    }

    pub fn body(&self) -> Option<BodyHandle> {
        match self.backend {
            ProjectileBackend::Physics(handle) => Some(handle),
            ProjectileBackend::Raycast => None,
        }
    }

    pub fn age_ms(&self, now_ms: f64) -> f64 {
        now_ms - self.created_at_ms
    }

    /// Alive strictly before `created_at + lifetime`
    pub fn is_alive(&self, now_ms: f64) -> bool {
        !self.disposed && self.age_ms(now_ms) < self.lifetime_ms
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Copy the body's state onto the ball and its mesh (physics backend)
    pub fn sync_from_body(&mut self, scene: &mut SceneGraph, physics: &PhysicsWorld) {
        let Some(body) = self.body().and_then(|h| physics.body(h)) else {
            return;
        };
        self.position = body.position;
        self.velocity = body.velocity;
        scene.set_position(self.node, self.position);
    }

    /// Push the ball's position to its mesh (raycast backend)
    pub fn sync_node(&self, scene: &mut SceneGraph) {
        scene.set_position(self.node, self.position);
    }

    /// Remove from scene and physics. Safe to call more than once.
    pub fn dispose(&mut self, scene: &mut SceneGraph, physics: &mut PhysicsWorld) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        scene.dispose(self.node);
        if let ProjectileBackend::Physics(handle) = self.backend {
            physics.remove_body(handle);
        }
        true
    }
}
