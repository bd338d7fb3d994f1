use nexus_core::{KeyValueStore, KvError, NodeId, Vec2};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

pub const POSITIONS_KEY: &str = "graph.positions";
pub const CAMERA_KEY: &str = "graph.camera";

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 4.0;

pub type PositionMap = BTreeMap<NodeId, Vec2>;

/// Zoom scale plus the graph-space point at the center of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub scale: f32,
    pub position: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            scale: 1.0,
            position: Vec2::ZERO,
        }
    }
}

impl Camera {
    pub fn new(scale: f32, position: Vec2) -> Self {
        Self {
            scale: scale.clamp(MIN_SCALE, MAX_SCALE),
            position,
        }
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
    }
}

/// Persisted coordinates and camera, stored as JSON under two fixed keys.
pub struct ViewStateStore<S> {
    store: S,
}

impl<S: KeyValueStore> ViewStateStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Saved positions. A malformed entry is logged and treated as absent.
    pub fn load_positions(&self) -> Result<Option<PositionMap>, KvError> {
        self.read_json(POSITIONS_KEY)
    }

    /// Overlay `changed` onto the saved positions and write the result back.
    /// Entries not in `changed` are kept as they were.
    pub fn merge_positions<I>(&self, changed: I) -> Result<usize, KvError>
    where
        I: IntoIterator<Item = (NodeId, Vec2)>,
    {
        let mut saved = self.load_positions()?.unwrap_or_default();
        let mut written = 0;
        for (id, position) in changed {
            saved.insert(id, position);
            written += 1;
        }
        self.write_json(POSITIONS_KEY, &saved)?;
        Ok(written)
    }

    pub fn load_camera(&self) -> Result<Option<Camera>, KvError> {
        self.read_json(CAMERA_KEY)
    }

    pub fn save_camera(&self, camera: &Camera) -> Result<(), KvError> {
        self.write_json(CAMERA_KEY, camera)
    }

    /// Forget both positions and camera.
    pub fn clear(&self) -> Result<(), KvError> {
        self.store.remove(POSITIONS_KEY)?;
        self.store.remove(CAMERA_KEY)
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KvError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!("Ignoring malformed view state under '{}': {}", key, err);
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), KvError> {
        let raw = serde_json::to_string(value).map_err(|e| KvError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(key, &raw)
    }
}
