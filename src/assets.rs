//! Asynchronous asset completions
//!
//! A load is a `(AssetRequest, AssetCompleter)` pair over a oneshot channel.
//! The simulation holds the request and polls it once per tick; whoever does
//! the actual loading (browser fetch, tests, the native demo) holds the
//! completer. Dropping the request cancels the load: a late completion then
//! goes nowhere.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::oneshot;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::scene::{Layer, MeshShape, NodeDesc, ObjectId, ObjectKind, SceneGraph};

/// Why an asset did not arrive
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetError {
    #[error("failed to load {url}: {reason}")]
    LoadFailed { url: String, reason: String },
    #[error("failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("load of {url} was cancelled")]
    Cancelled { url: String },
}

/// State of a pending load
#[derive(Debug)]
pub enum AssetPoll<T> {
    Pending,
    Ready(T),
    Failed(AssetError),
}

/// Requester side of a load
pub struct AssetRequest<T> {
    url: String,
    receiver: oneshot::Receiver<Result<T, AssetError>>,
    progress: Rc<Cell<f32>>,
}

impl<T> AssetRequest<T> {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Last reported progress in [0, 1]
    pub fn progress(&self) -> f32 {
        self.progress.get()
    }

    /// Non-blocking check for completion. Drop the request once this returns
    /// anything other than `Pending`.
    pub fn poll(&mut self) -> AssetPoll<T> {
        match self.receiver.try_recv() {
            Ok(None) => AssetPoll::Pending,
            Ok(Some(Ok(value))) => AssetPoll::Ready(value),
            Ok(Some(Err(err))) => AssetPoll::Failed(err),
            Err(oneshot::Canceled) => AssetPoll::Failed(AssetError::Cancelled {
                url: self.url.clone(),
            }),
        }
    }
}

/// Loader side of a load
pub struct AssetCompleter<T> {
    url: String,
    sender: oneshot::Sender<Result<T, AssetError>>,
    progress: Rc<Cell<f32>>,
}

impl<T> AssetCompleter<T> {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn report_progress(&self, loaded: u64, total: u64) {
        if total > 0 {
            self.progress.set((loaded as f32 / total as f32).clamp(0.0, 1.0));
        }
    }

    /// Deliver the result. Returns false if the requester is gone.
    pub fn complete(self, result: Result<T, AssetError>) -> bool {
        if result.is_ok() {
            self.progress.set(1.0);
        }
        let delivered = self.sender.send(result).is_ok();
        if !delivered {
            log::debug!("{} finished after its requester went away", self.url);
        }
        delivered
    }

    pub fn succeed(self, value: T) -> bool {
        self.complete(Ok(value))
    }

    pub fn fail(self, reason: impl Into<String>) -> bool {
        let url = self.url.clone();
        self.complete(Err(AssetError::LoadFailed {
            url,
            reason: reason.into(),
        }))
    }

    /// True once the requester has dropped its side
    pub fn is_cancelled(&self) -> bool {
        self.sender.is_canceled()
    }
}

/// Create a linked request/completer pair
pub fn asset_channel<T>(url: impl Into<String>) -> (AssetRequest<T>, AssetCompleter<T>) {
    let url = url.into();
    let (sender, receiver) = oneshot::channel();
    let progress = Rc::new(Cell::new(0.0));
    (
        AssetRequest {
            url: url.clone(),
            receiver,
            progress: progress.clone(),
        },
        AssetCompleter {
            url,
            sender,
            progress,
        },
    )
}

/// One mesh of a model, relative to the model root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshPart {
    pub name: String,
    pub shape: MeshShape,
    #[serde(default)]
    pub offset: Vec3,
    #[serde(default = "identity")]
    pub rotation: Quat,
}

fn identity() -> Quat {
    Quat::IDENTITY
}

fn unit_scale() -> f32 {
    1.0
}

/// A loaded 3D model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    pub name: String,
    pub parts: Vec<MeshPart>,
    #[serde(default = "unit_scale")]
    pub scale: f32,
}

impl ModelData {
    pub fn from_json(url: &str, json: &str) -> Result<Self, AssetError> {
        let model: ModelData = serde_json::from_str(json).map_err(|e| AssetError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if model.parts.is_empty() {
            return Err(AssetError::Decode {
                url: url.to_string(),
                reason: "model has no mesh parts".to_string(),
            });
        }
        Ok(model)
    }

    /// Built-in low-poly gull: body, head and two wings
    pub fn seagull() -> Self {
        let part = |name: &str, shape: MeshShape, offset: Vec3| MeshPart {
            name: name.to_string(),
            shape,
            offset,
            rotation: Quat::IDENTITY,
        };
        Self {
            name: "seagull".to_string(),
            parts: vec![
                part("body", MeshShape::Sphere { radius: 0.6 }, Vec3::ZERO),
                part("head", MeshShape::Sphere { radius: 0.3 }, Vec3::new(0.0, 0.2, 0.7)),
                part(
                    "wing_l",
                    MeshShape::Cuboid {
                        half_extents: Vec3::new(0.9, 0.05, 0.3),
                    },
                    Vec3::new(-1.2, 0.1, 0.0),
                ),
                part(
                    "wing_r",
                    MeshShape::Cuboid {
                        half_extents: Vec3::new(0.9, 0.05, 0.3),
                    },
                    Vec3::new(1.2, 0.1, 0.0),
                ),
            ],
            scale: 1.0,
        }
    }

    /// Build a detached node tree (group root + one child per part)
    pub fn instantiate(&self, scene: &mut SceneGraph, layer: Layer) -> ObjectId {
        let root = scene.spawn(
            NodeDesc::new(self.name.clone(), ObjectKind::Group, layer).scaled(Vec3::splat(self.scale)),
        );
        for part in &self.parts {
            let child = scene.spawn(
                NodeDesc::mesh(part.name.clone(), part.shape, layer)
                    .at(part.offset)
                    .rotated(part.rotation),
            );
            scene.attach(child, Some(root));
        }
        root
    }
}

/// Something that can start model loads
pub trait AssetLoader {
    fn load_model(&mut self, url: &str) -> AssetRequest<ModelData>;
}

/// Completes every load immediately with the built-in gull
#[derive(Debug, Default)]
pub struct InstantLoader;

impl AssetLoader for InstantLoader {
    fn load_model(&mut self, url: &str) -> AssetRequest<ModelData> {
        let (request, completer) = asset_channel(url);
        completer.succeed(ModelData::seagull());
        request
    }
}

/// Hands completers to whoever holds a clone of the loader
#[derive(Default, Clone)]
pub struct ManualLoader {
    pending: Rc<RefCell<Vec<AssetCompleter<ModelData>>>>,
}

impl ManualLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every completer issued so far
    pub fn take_pending(&self) -> Vec<AssetCompleter<ModelData>> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl AssetLoader for ManualLoader {
    fn load_model(&mut self, url: &str) -> AssetRequest<ModelData> {
        let (request, completer) = asset_channel(url);
        self.pending.borrow_mut().push(completer);
        request
    }
}
