use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

pub mod error;
pub mod kv;
pub mod proposal;

pub use error::{GraphError, GraphResult};
pub use kv::{KeyValueStore, KvError, MemoryKvStore};
pub use proposal::{EdgeProposal, ExtractionProposal, NodeProposal};

/// Tag assigned to nodes created without an explicit kind.
pub const DEFAULT_NODE_KIND: &str = "character";
/// Clustering hint assigned to nodes created without an explicit group.
pub const DEFAULT_NODE_GROUP: i64 = 1;
/// Title given to nodes that only exist because a merged relationship referenced them.
pub const PLACEHOLDER_TITLE: &str = "(auto-created from relationship)";

/// Extra attributes carried through from imports and extraction proposals.
pub type Attributes = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Ordered (source, target) pair identifying an edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: NodeId,
    pub target: NodeId,
}

impl EdgeKey {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source.as_str() == id || self.target.as_str() == id
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_group")]
    pub group: i64,
    #[serde(flatten)]
    pub extra: Attributes,
}

fn default_kind() -> String {
    DEFAULT_NODE_KIND.to_string()
}

fn default_group() -> i64 {
    DEFAULT_NODE_GROUP
}

impl Node {
    pub fn new(id: impl Into<NodeId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: default_kind(),
            group: DEFAULT_NODE_GROUP,
            extra: Attributes::new(),
        }
    }

    pub fn placeholder(id: impl Into<NodeId>) -> Self {
        Self::new(id, PLACEHOLDER_TITLE)
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_group(mut self, group: i64) -> Self {
        self.group = group;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub label: String,
}

impl Edge {
    pub fn new(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
        }
    }
}

/// Plain node-link value of a whole graph. Used for history snapshots,
/// persistence and focus subgraphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphData {
    /// The starter graph shown to a brand new session and restored by reset.
    pub fn seed() -> Self {
        Self {
            nodes: vec![
                Node::new("Harry Potter", "The boy who lived"),
                Node::new("Ron Weasley", "Harry's best friend"),
            ],
            edges: vec![Edge::new("Harry Potter", "Ron Weasley", "best friend")],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().map(|n| &n.id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.source.as_str() == source && e.target.as_str() == target)
    }
}

/// Fine-grained notification emitted by the graph store for every applied change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphChange {
    NodeAdded { id: NodeId },
    NodeRemoved { id: NodeId, removed_edges: Vec<EdgeKey> },
    NodeUpdated { id: NodeId },
    EdgeAdded { key: EdgeKey },
    EdgeRemoved { key: EdgeKey },
    EdgeRelabeled { key: EdgeKey, label: String },
    GraphReplaced,
}

impl GraphChange {
    /// Whether the change alters which nodes/edges exist (as opposed to attributes).
    pub fn is_topological(&self) -> bool {
        !matches!(
            self,
            GraphChange::NodeUpdated { .. } | GraphChange::EdgeRelabeled { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}
