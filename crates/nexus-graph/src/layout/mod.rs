pub mod physics;
pub mod sync;
pub mod view_state;

pub use physics::{ForceSimulation, PhysicsConfig};
pub use sync::{LayoutPhase, LayoutSync, Placement};
pub use view_state::{CAMERA_KEY, Camera, POSITIONS_KEY, PositionMap, ViewStateStore};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 700.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub physics: PhysicsConfig,
    pub viewport: Viewport,
    /// Half-width of the box new nodes are dropped into around the camera center.
    pub new_node_jitter: f32,
    /// Half-width of the box used when seeding a layout from nothing.
    pub initial_spread: f32,
    /// Steps allowed before a reconcile cycle gives up waiting for the simulation.
    pub max_settle_steps: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            viewport: Viewport::default(),
            new_node_jitter: 25.0,
            initial_spread: 10.0,
            max_settle_steps: 2_000,
        }
    }
}
