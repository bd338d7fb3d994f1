use super::LayoutConfig;
use super::physics::ForceSimulation;
use super::view_state::{Camera, MAX_SCALE, MIN_SCALE, PositionMap, ViewStateStore};
use nexus_core::{GraphData, KeyValueStore, KvError, NodeId, Vec2};
use nexus_events::{Event, EventBus, EventListener};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPhase {
    /// Nothing placed yet for the current topology.
    Uninitialized,
    /// Coordinates placed and written through; the simulation may be running.
    Restoring,
    /// Simulation at rest and positions persisted.
    Settled,
}

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Nodes put back at their persisted coordinates.
    pub restored: Vec<NodeId>,
    /// Nodes given a fresh coordinate.
    pub placed: Vec<NodeId>,
    /// Whether the camera was recomputed to frame the whole graph.
    pub framed: bool,
    pub camera: Camera,
}

/// Keeps the on-screen layout stable across re-renders.
///
/// Each reconcile restores what the user arranged, drops new nodes near the current view
/// center and writes the result through before the simulation resumes, so repeated renders
/// of the same graph never jump.
pub struct LayoutSync<S> {
    config: LayoutConfig,
    view: ViewStateStore<S>,
    simulation: ForceSimulation,
    camera: Camera,
    phase: LayoutPhase,
    rng: StdRng,
    events: Option<EventBus>,
}

impl<S: KeyValueStore> LayoutSync<S> {
    pub fn new(store: S, config: LayoutConfig) -> Self {
        Self {
            simulation: ForceSimulation::new(config.physics.clone()),
            config,
            view: ViewStateStore::new(store),
            camera: Camera::default(),
            phase: LayoutPhase::Uninitialized,
            rng: StdRng::from_entropy(),
            events: None,
        }
    }

    /// Deterministic placement jitter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn phase(&self) -> LayoutPhase {
        self.phase
    }

    pub fn needs_reconcile(&self) -> bool {
        self.phase == LayoutPhase::Uninitialized
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn positions(&self) -> PositionMap {
        self.simulation.positions()
    }

    pub fn simulation(&self) -> &ForceSimulation {
        &self.simulation
    }

    pub fn view_state(&self) -> &ViewStateStore<S> {
        &self.view
    }

    /// Place every node of `graph` and persist the placement.
    ///
    /// With a saved camera, nodes with a saved coordinate go back there and the rest land
    /// around the camera center. Without one, the graph is seeded around the view center and
    /// framed. Saved coordinates of nodes no longer in the graph are left alone.
    pub fn reconcile(&mut self, graph: &GraphData) -> Result<Placement, KvError> {
        let saved_camera = self.view.load_camera()?;
        let saved = match saved_camera {
            Some(_) => self.view.load_positions()?.unwrap_or_default(),
            None => PositionMap::new(),
        };

        let mut positions: HashMap<NodeId, Vec2> = HashMap::with_capacity(graph.nodes.len());
        let mut restored = Vec::new();
        let mut placed = Vec::new();

        let (center, spread) = match saved_camera {
            Some(camera) => {
                self.camera = camera;
                (camera.position, self.config.new_node_jitter)
            }
            None => (self.camera.position, self.config.initial_spread),
        };

        for node in &graph.nodes {
            if let Some(&position) = saved.get(&node.id) {
                positions.insert(node.id.clone(), position);
                restored.push(node.id.clone());
            } else {
                let position = self.jitter_around(center, spread);
                positions.insert(node.id.clone(), position);
                placed.push(node.id.clone());
            }
        }

        self.simulation.load(graph, &positions);

        let framed = saved_camera.is_none();
        if framed {
            self.camera = fit_camera(
                positions.values().copied(),
                self.config.viewport,
                self.config.physics.node_radius,
            );
            self.save_camera()?;
        }

        self.view.merge_positions(positions)?;
        self.phase = LayoutPhase::Restoring;

        tracing::debug!(
            "Layout reconciled: {} restored, {} placed, framed={}",
            restored.len(),
            placed.len(),
            framed
        );

        Ok(Placement {
            restored,
            placed,
            framed,
            camera: self.camera,
        })
    }

    /// Let the simulation run after placement has been written through.
    pub fn resume(&mut self) {
        if self.phase == LayoutPhase::Restoring {
            self.simulation.start();
        }
    }

    /// Advance the simulation one step. Returns true once the layout is settled.
    pub fn tick(&mut self) -> Result<bool, KvError> {
        if !self.simulation.is_running() {
            return Ok(self.phase == LayoutPhase::Settled);
        }
        self.simulation.step();
        if self.simulation.is_settled() {
            self.on_simulation_settled()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Resume and step until settled, bounded by `max_settle_steps`. Positions are persisted
    /// either way. Returns the number of steps taken.
    pub fn run_to_rest(&mut self) -> Result<usize, KvError> {
        self.resume();
        for step in 1..=self.config.max_settle_steps {
            if self.tick()? {
                return Ok(step);
            }
        }
        tracing::debug!(
            "Layout still moving after {} steps, persisting current positions",
            self.config.max_settle_steps
        );
        self.on_simulation_settled()?;
        Ok(self.config.max_settle_steps)
    }

    pub fn on_simulation_settled(&mut self) -> Result<(), KvError> {
        self.simulation.stop();
        self.view.merge_positions(self.simulation.positions())?;
        self.phase = LayoutPhase::Settled;
        Ok(())
    }

    /// A drag finished. `moved` holds the dropped nodes and where they ended up.
    pub fn on_drag_end(&mut self, moved: &[(NodeId, Vec2)]) -> Result<(), KvError> {
        for (id, position) in moved {
            if self.simulation.set_position(id.as_str(), *position) {
                self.publish(Event::NodeMoved {
                    id: id.clone(),
                    x: position.x,
                    y: position.y,
                });
            }
        }
        if !moved.is_empty() {
            self.view.merge_positions(self.simulation.positions())?;
        }
        self.save_camera()
    }

    pub fn on_pan(&mut self, position: Vec2) -> Result<(), KvError> {
        self.camera.position = position;
        self.save_camera()
    }

    pub fn on_zoom(&mut self, scale: f32) -> Result<(), KvError> {
        self.camera.set_scale(scale);
        self.save_camera()
    }

    /// Frame every node and persist the resulting camera.
    pub fn fit_view(&mut self) -> Result<Camera, KvError> {
        self.camera = fit_camera(
            self.simulation.positions().into_values(),
            self.config.viewport,
            self.config.physics.node_radius,
        );
        self.save_camera()?;
        Ok(self.camera)
    }

    /// Forget all persisted view state; the next render starts from scratch.
    pub fn reset_view(&mut self) -> Result<(), KvError> {
        self.view.clear()?;
        self.simulation.clear();
        self.camera = Camera::default();
        self.phase = LayoutPhase::Uninitialized;
        self.publish(Event::ViewReset);
        tracing::info!("View state cleared");
        Ok(())
    }

    fn save_camera(&mut self) -> Result<(), KvError> {
        self.view.save_camera(&self.camera)?;
        self.publish(Event::CameraChanged {
            scale: self.camera.scale,
            x: self.camera.position.x,
            y: self.camera.position.y,
        });
        Ok(())
    }

    fn jitter_around(&mut self, center: Vec2, half_width: f32) -> Vec2 {
        if !half_width.is_finite() || half_width <= 0.0 {
            return center;
        }
        Vec2::new(
            center.x + self.rng.gen_range(-half_width..=half_width),
            center.y + self.rng.gen_range(-half_width..=half_width),
        )
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl<S: KeyValueStore> EventListener for LayoutSync<S> {
    fn handle_event(&mut self, event: &Event) {
        if event.changes_topology() && self.phase != LayoutPhase::Uninitialized {
            tracing::debug!("Topology changed, layout needs reconcile");
            self.simulation.stop();
            self.phase = LayoutPhase::Uninitialized;
        }
    }
}

fn fit_camera(
    positions: impl IntoIterator<Item = Vec2>,
    viewport: super::Viewport,
    node_radius: f32,
) -> Camera {
    let mut iter = positions.into_iter();
    let Some(first) = iter.next() else {
        return Camera::default();
    };
    let (mut min, mut max) = (first, first);
    for p in iter {
        min = Vec2::new(min.x.min(p.x), min.y.min(p.y));
        max = Vec2::new(max.x.max(p.x), max.y.max(p.y));
    }

    let width = (max.x - min.x + 2.0 * node_radius).max(1.0);
    let height = (max.y - min.y + 2.0 * node_radius).max(1.0);
    let scale = (viewport.width / width)
        .min(viewport.height / height)
        .clamp(MIN_SCALE, MAX_SCALE);
    let center = Vec2::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0);
    Camera::new(scale, center)
}
