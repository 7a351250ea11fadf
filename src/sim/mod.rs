//! Simulation module
//!
//! All gameplay logic lives here. Rendering and the browser stay outside:
//! - Fixed timestep physics
//! - Seeded RNG only
//! - Stable iteration order (by id)
//! - Scene graph is a data model; GPU work happens elsewhere

pub mod actor;
pub mod coordinator;
pub mod flight_path;
pub mod frustum;
pub mod hit_resolver;
pub mod ocean;
pub mod physics;
pub mod projectile;
pub mod raycast;
pub mod scene;

pub use actor::{ActorId, ActorRegistry, ActorState, ModelSwap, Seagull, orientation};
pub use coordinator::{GameEvent, InstanceRaw, NullUi, RoundSummary, SceneCoordinator, UiNotifier};
pub use flight_path::{FlightBounds, FlightPath, PathSample};
pub use frustum::Frustum;
pub use hit_resolver::{BounceParams, CollidableSet, CollisionOutcome, HitResolver};
pub use ocean::OceanSurface;
pub use physics::{
    BodyDesc, BodyHandle, BodyKind, BodyOwner, BodyShape, BodyState, ContactEvent, PhysicsConfig,
    PhysicsWorld, StepReport,
};
pub use projectile::{CollisionMode, Projectile, ProjectileBackend, ProjectileId, ProjectileSpec};
pub use raycast::{Ray, RayHit, cast};
pub use scene::{Layer, MeshShape, Node, NodeDesc, ObjectId, ObjectKind, SceneGraph};
