use nexus_core::{GraphData, NodeId, Vec2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Barnes-Hut style force parameters. Field names mirror the usual network
/// renderer options so saved settings stay recognizable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Negative values repel.
    pub gravitational_constant: f32,
    pub central_gravity: f32,
    pub spring_length: f32,
    pub spring_constant: f32,
    pub damping: f32,
    /// 0 disables overlap avoidance, 1 keeps node discs fully apart.
    pub avoid_overlap: f32,
    /// The simulation counts as settled once every body moves slower than this.
    pub min_velocity: f32,
    pub max_velocity: f32,
    pub timestep: f32,
    pub node_radius: f32,
    /// Above this many bodies the repulsion pass runs on the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: -3000.0,
            central_gravity: 0.1,
            spring_length: 150.0,
            spring_constant: 0.05,
            damping: 0.9,
            avoid_overlap: 1.0,
            min_velocity: 0.55,
            max_velocity: 50.0,
            timestep: 0.5,
            node_radius: 30.0,
            parallel_threshold: 256,
        }
    }
}

#[derive(Debug, Clone)]
struct Body {
    id: NodeId,
    position: Vec2,
    velocity: Vec2,
    pinned: bool,
}

/// Force-directed simulation over the current topology.
///
/// The simulation never invents coordinates: bodies are created from the positions the
/// caller supplies, and bodies without one start at the origin.
#[derive(Debug, Clone)]
pub struct ForceSimulation {
    config: PhysicsConfig,
    bodies: Vec<Body>,
    index: HashMap<NodeId, usize>,
    springs: Vec<(usize, usize)>,
    running: bool,
    max_speed: f32,
}

impl ForceSimulation {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            bodies: Vec::new(),
            index: HashMap::new(),
            springs: Vec::new(),
            running: false,
            max_speed: 0.0,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Rebuild bodies and springs for `graph`. Stops the simulation.
    pub fn load(&mut self, graph: &GraphData, positions: &HashMap<NodeId, Vec2>) {
        self.bodies = graph
            .nodes
            .iter()
            .map(|node| Body {
                id: node.id.clone(),
                position: positions.get(&node.id).copied().unwrap_or(Vec2::ZERO),
                velocity: Vec2::ZERO,
                pinned: false,
            })
            .collect();
        self.index = self
            .bodies
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.clone(), i))
            .collect();
        self.springs = graph
            .edges
            .iter()
            .filter_map(|e| Some((*self.index.get(&e.source)?, *self.index.get(&e.target)?)))
            .collect();
        self.running = false;
        self.max_speed = 0.0;
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.index.clear();
        self.springs.clear();
        self.running = false;
        self.max_speed = 0.0;
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.index.get(id).map(|&i| self.bodies[i].position)
    }

    /// Move a body. Its velocity is reset so a drop does not fling it.
    pub fn set_position(&mut self, id: &str, position: Vec2) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.bodies[i].position = position;
                self.bodies[i].velocity = Vec2::ZERO;
                true
            }
            None => false,
        }
    }

    pub fn set_pinned(&mut self, id: &str, pinned: bool) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.bodies[i].pinned = pinned;
                true
            }
            None => false,
        }
    }

    pub fn positions(&self) -> BTreeMap<NodeId, Vec2> {
        self.bodies
            .iter()
            .map(|b| (b.id.clone(), b.position))
            .collect()
    }

    pub fn is_settled(&self) -> bool {
        self.max_speed < self.config.min_velocity
    }

    /// Advance one timestep. Returns the fastest body speed after the step.
    pub fn step(&mut self) -> f32 {
        if self.bodies.is_empty() {
            self.max_speed = 0.0;
            return 0.0;
        }

        let mut forces = self.repulsion_forces();
        self.apply_springs(&mut forces);
        self.apply_central_gravity(&mut forces);

        let cfg = &self.config;
        let mut max_speed = 0.0f32;
        for (body, force) in self.bodies.iter_mut().zip(forces) {
            if body.pinned {
                body.velocity = Vec2::ZERO;
                continue;
            }
            let accel = force + body.velocity * -cfg.damping;
            body.velocity += accel * cfg.timestep;
            let speed = body.velocity.length();
            if speed > cfg.max_velocity {
                body.velocity = body.velocity * (cfg.max_velocity / speed);
            }
            body.position += body.velocity * cfg.timestep;
            max_speed = max_speed.max(body.velocity.length());
        }

        self.max_speed = max_speed;
        max_speed
    }

    /// Step until settled or `max_steps` is reached. Returns the number of steps taken.
    pub fn run_until_settled(&mut self, max_steps: usize) -> usize {
        for taken in 1..=max_steps {
            self.step();
            if self.is_settled() {
                return taken;
            }
        }
        max_steps
    }

    fn repulsion_forces(&self) -> Vec<Vec2> {
        let bodies = &self.bodies;
        let cfg = &self.config;
        let min_gap = cfg.avoid_overlap * 2.0 * cfg.node_radius;

        let force_on = |i: usize| {
            let mut total = Vec2::ZERO;
            let a = bodies[i].position;
            for (j, other) in bodies.iter().enumerate() {
                if i == j {
                    continue;
                }
                let mut delta = other.position - a;
                let mut distance = delta.length();
                if distance < 0.01 {
                    // Coincident bodies: push apart along a deterministic axis.
                    delta = if i < j {
                        Vec2::new(0.1, 0.0)
                    } else {
                        Vec2::new(-0.1, 0.0)
                    };
                    distance = 0.1;
                }
                let effective = (distance - min_gap * 0.5).max(0.1 * cfg.node_radius);
                let strength = cfg.gravitational_constant / (effective * effective * distance);
                total += delta * strength;
            }
            total
        };

        if bodies.len() >= cfg.parallel_threshold {
            (0..bodies.len()).into_par_iter().map(force_on).collect()
        } else {
            (0..bodies.len()).map(force_on).collect()
        }
    }

    fn apply_springs(&self, forces: &mut [Vec2]) {
        let cfg = &self.config;
        for &(s, t) in &self.springs {
            let delta = self.bodies[s].position - self.bodies[t].position;
            let distance = delta.length().max(0.01);
            let strength = cfg.spring_constant * (cfg.spring_length - distance) / distance;
            let f = delta * strength;
            forces[s] += f;
            forces[t] += f * -1.0;
        }
    }

    fn apply_central_gravity(&self, forces: &mut [Vec2]) {
        let g = self.config.central_gravity;
        for (body, force) in self.bodies.iter().zip(forces.iter_mut()) {
            let distance = body.position.length();
            if distance > 0.0 {
                *force += body.position * (-g / distance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::{Edge, Node};

    fn pair(distance: f32) -> (GraphData, HashMap<NodeId, Vec2>) {
        let graph = GraphData {
            nodes: vec![Node::new("A", ""), Node::new("B", "")],
            edges: vec![Edge::new("A", "B", "friend")],
        };
        let positions = HashMap::from([
            (NodeId::from("A"), Vec2::new(-distance / 2.0, 0.0)),
            (NodeId::from("B"), Vec2::new(distance / 2.0, 0.0)),
        ]);
        (graph, positions)
    }

    #[test]
    fn test_load_keeps_supplied_positions() {
        let (graph, positions) = pair(200.0);
        let mut sim = ForceSimulation::new(PhysicsConfig::default());
        sim.load(&graph, &positions);
        assert_eq!(sim.len(), 2);
        assert_eq!(sim.position("A"), Some(Vec2::new(-100.0, 0.0)));
        assert!(!sim.is_running());
    }

    #[test]
    fn test_crowded_nodes_spread_apart() {
        let (graph, positions) = pair(10.0);
        let mut sim = ForceSimulation::new(PhysicsConfig::default());
        sim.load(&graph, &positions);
        for _ in 0..50 {
            sim.step();
        }
        let a = sim.position("A").unwrap();
        let b = sim.position("B").unwrap();
        assert!(a.distance(b) > 10.0);
    }

    #[test]
    fn test_simulation_settles() {
        let (graph, positions) = pair(150.0);
        let mut sim = ForceSimulation::new(PhysicsConfig::default());
        sim.load(&graph, &positions);
        let steps = sim.run_until_settled(5_000);
        assert!(sim.is_settled(), "not settled after {steps} steps");
        for (_, p) in sim.positions() {
            assert!(p.x.is_finite() && p.y.is_finite());
        }
    }

    #[test]
    fn test_pinned_body_stays_put() {
        let (graph, positions) = pair(20.0);
        let mut sim = ForceSimulation::new(PhysicsConfig::default());
        sim.load(&graph, &positions);
        sim.set_pinned("A", true);
        for _ in 0..20 {
            sim.step();
        }
        assert_eq!(sim.position("A"), Some(Vec2::new(-10.0, 0.0)));
    }

    #[test]
    fn test_parallel_and_serial_repulsion_agree() {
        let graph = GraphData {
            nodes: (0..12).map(|i| Node::new(format!("n{i}"), "")).collect(),
            edges: vec![],
        };
        let positions: HashMap<NodeId, Vec2> = (0..12)
            .map(|i| {
                (
                    NodeId::from(format!("n{i}")),
                    Vec2::new(i as f32 * 7.0, (i % 3) as f32 * 11.0),
                )
            })
            .collect();

        let mut serial = ForceSimulation::new(PhysicsConfig::default());
        serial.load(&graph, &positions);
        let mut parallel = ForceSimulation::new(PhysicsConfig {
            parallel_threshold: 1,
            ..PhysicsConfig::default()
        });
        parallel.load(&graph, &positions);

        serial.step();
        parallel.step();
        assert_eq!(serial.positions(), parallel.positions());
    }
}
