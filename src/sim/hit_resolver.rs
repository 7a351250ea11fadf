//! Projectile hit resolution
//!
//! Both collision backends report through `CollisionOutcome`:
//! - raycast: each tick a ray is cast from the ball along its velocity,
//!   limited to the distance travelled this tick, against the collidable set
//! - physics: engine contact events are mapped through the body registry

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::actor::{ActorId, ActorRegistry};
use super::physics::{BodyHandle, BodyOwner, BodyShape, ContactEvent, PhysicsWorld};
use super::projectile::Projectile;
use super::raycast::{Ray, cast};
use super::scene::{Layer, ObjectId, SceneGraph};
use crate::consts::*;
use crate::reflect;

/// What happened to a ball this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionOutcome {
    /// Nothing hit, ball moved freely
    PassThrough,
    /// Bounced off a surface
    Bounce { point: Vec3, normal: Vec3 },
    /// Struck a seagull
    TargetHit { actor: ActorId },
}

/// Motion and bounce tuning for raycast-backed balls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BounceParams {
    pub gravity: Vec3,
    pub bounce_factor: f32,
    pub ground_friction: f32,
    pub squelch: f32,
    pub rest_speed_sq: f32,
    pub surface_offset: f32,
}

impl Default for BounceParams {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -GRAVITY, 0.0),
            bounce_factor: BOUNCE_FACTOR,
            ground_friction: GROUND_FRICTION,
            squelch: BOUNCE_SQUELCH,
            rest_speed_sq: REST_SPEED_SQ,
            surface_offset: SURFACE_OFFSET,
        }
    }
}

/// Raycast targets, rebuilt at most once per interval
#[derive(Debug, Clone)]
pub struct CollidableSet {
    objects: Vec<ObjectId>,
    last_rebuild_ms: Option<f64>,
    interval_ms: f64,
    excluded: Vec<Layer>,
}

impl CollidableSet {
    /// Ocean and projectiles are never raycast targets
    pub fn new(interval_ms: f64) -> Self {
        Self {
            objects: Vec::new(),
            last_rebuild_ms: None,
            interval_ms,
            excluded: vec![Layer::Ocean, Layer::Projectile],
        }
    }

    pub fn objects(&self) -> &[ObjectId] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Rebuild if the interval has elapsed. Returns true when rebuilt.
    pub fn refresh(&mut self, scene: &SceneGraph, now_ms: f64) -> bool {
        if let Some(last) = self.last_rebuild_ms {
            if now_ms - last < self.interval_ms {
                return false;
            }
        }
        self.rebuild(scene, now_ms);
        true
    }

    /// Rebuild immediately (after a reset, say)
    pub fn rebuild(&mut self, scene: &SceneGraph, now_ms: f64) {
        self.objects.clear();
        let excluded = &self.excluded;
        let objects = &mut self.objects;
        scene.traverse(|id, node| {
            if node.is_mesh() && !excluded.contains(&node.layer) {
                objects.push(id);
            }
        });
        self.last_rebuild_ms = Some(now_ms);
        log::trace!("Collidable set rebuilt: {} objects", self.objects.len());
    }
}

/// Per-tick projectile resolution
#[derive(Debug, Clone)]
pub struct HitResolver {
    pub collidables: CollidableSet,
    pub params: BounceParams,
}

impl HitResolver {
    pub fn new(refresh_interval_ms: f64, params: BounceParams) -> Self {
        Self {
            collidables: CollidableSet::new(refresh_interval_ms),
            params,
        }
    }

    /// Move a raycast-backed ball by one tick.
    ///
    /// Stale scene ids in the collidable set are skipped by the caster.
    pub fn resolve_raycast(
        &self,
        ball: &mut Projectile,
        dt: f32,
        scene: &SceneGraph,
        registry: &ActorRegistry,
    ) -> CollisionOutcome {
        if ball.resting {
            return CollisionOutcome::PassThrough;
        }
        let travel = ball.velocity.length() * dt;
        let hit = Ray::new(ball.position, ball.velocity)
            .filter(|_| travel > 0.0)
            .and_then(|ray| cast(scene, &ray, travel, self.collidables.objects(), &[ball.node]));

        match hit {
            Some(hit) => {
                if let Some(actor) = registry.resolve(scene, hit.object) {
                    return CollisionOutcome::TargetHit { actor };
                }
                self.bounce(ball, hit.normal);
                ball.position = hit.point + hit.normal * self.params.surface_offset;
                CollisionOutcome::Bounce {
                    point: hit.point,
                    normal: hit.normal,
                }
            }
            None => {
                self.integrate(ball, dt);
                CollisionOutcome::PassThrough
            }
        }
    }

    /// Reflect off a surface. A weak rebound is squelched to a slide along
    /// it; a slow ball on a floor comes to rest there.
    fn bounce(&self, ball: &mut Projectile, normal: Vec3) {
        let p = &self.params;
        let mut velocity = reflect(ball.velocity, normal) * p.bounce_factor;
        let rebound = velocity.dot(normal);
        if rebound.abs() < p.squelch {
            velocity = (velocity - normal * rebound) * p.ground_friction;
        }
        if velocity.length_squared() < p.rest_speed_sq {
            velocity = Vec3::ZERO;
            ball.resting = normal.y > FLOOR_NORMAL_Y;
        }
        ball.velocity = velocity;
    }

    /// Free flight with the ground plane at y = 0
    fn integrate(&self, ball: &mut Projectile, dt: f32) {
        let p = &self.params;
        ball.position += ball.velocity * dt;
        ball.velocity += p.gravity * dt;

        if ball.position.y < 0.0 {
            ball.position.y = 0.0;
            ball.velocity.y = -ball.velocity.y * p.bounce_factor;
            ball.velocity.x *= p.ground_friction;
            ball.velocity.z *= p.ground_friction;
            if ball.velocity.y.abs() < p.squelch {
                ball.velocity.y = 0.0;
            }
            if ball.velocity.length_squared() < p.rest_speed_sq {
                ball.velocity = Vec3::ZERO;
                ball.resting = true;
            }
        }

        if ball.velocity.length_squared() < p.rest_speed_sq {
            ball.velocity = Vec3::ZERO;
        }
    }

    /// Classify an engine contact involving a physics-backed ball.
    /// The engine already applied the response; only the outcome is reported.
    pub fn resolve_contact(
        &self,
        ball_body: BodyHandle,
        contact: &ContactEvent,
        physics: &PhysicsWorld,
    ) -> Option<CollisionOutcome> {
        let other = contact.other(ball_body)?;
        match physics.owner_of(other)? {
            BodyOwner::Actor(actor) => Some(CollisionOutcome::TargetHit { actor }),
            BodyOwner::Ground | BodyOwner::Prop(_) | BodyOwner::Projectile(_) => {
                let ball = physics.body(ball_body)?;
                let surface = physics.body(other)?;
                // The pair may have separated again within the same frame
                let normal = physics.contact_normal(ball_body, other).unwrap_or_else(|| {
                    match surface.shape {
                        BodyShape::Plane => Vec3::Y,
                        BodyShape::Sphere { .. } | BodyShape::Cuboid { .. } => {
                            (ball.position - surface.position).normalize_or_zero()
                        }
                    }
                });
                Some(CollisionOutcome::Bounce {
                    point: ball.position,
                    normal,
                })
            }
        }
    }
}
