use nexus_core::{Edge, EdgeKey, GraphChange, GraphData, GraphError, GraphResult, Node, NodeId};
use std::collections::{HashMap, HashSet};

/// Result of merging a single relationship into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeUpsert {
    Added,
    Relabeled,
    Unchanged,
}

/// Canonical directed graph of one editing session.
///
/// Nodes and edges keep insertion order; lookups go through the id maps. Every applied
/// change is queued and handed out by [`GraphStore::take_changes`].
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    node_map: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
    edge_map: HashMap<EdgeKey, usize>,
    changes: Vec<GraphChange>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a graph value, rejecting anything that breaks the graph rules
    /// (duplicate ids or pairs, dangling endpoints, self-loops, blank ids).
    pub fn from_data(data: GraphData) -> GraphResult<Self> {
        let mut store = Self::new();
        for node in data.nodes {
            validate_id(&node.id)?;
            if store.node_map.contains_key(&node.id) {
                return Err(GraphError::node_exists(&node.id));
            }
            store.push_node(node);
        }
        for edge in data.edges {
            validate_endpoints(&edge.source, &edge.target)?;
            for endpoint in [&edge.source, &edge.target] {
                if !store.node_map.contains_key(endpoint) {
                    return Err(GraphError::invalid(format!(
                        "relationship {} references unknown character '{}'",
                        edge.key(),
                        endpoint
                    )));
                }
            }
            if store.edge_map.contains_key(&edge.key()) {
                return Err(GraphError::edge_exists(
                    edge.source.as_str(),
                    edge.target.as_str(),
                ));
            }
            store.push_edge(edge);
        }
        Ok(store)
    }

    /// Swap the whole graph for `data`. On error the current graph is left untouched.
    pub fn replace(&mut self, data: GraphData) -> GraphResult<()> {
        let fresh = Self::from_data(data)?;
        self.nodes = fresh.nodes;
        self.node_map = fresh.node_map;
        self.edges = fresh.edges;
        self.edge_map = fresh.edge_map;
        self.changes.push(GraphChange::GraphReplaced);
        Ok(())
    }

    pub fn snapshot(&self) -> GraphData {
        GraphData {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub fn take_changes(&mut self) -> Vec<GraphChange> {
        std::mem::take(&mut self.changes)
    }

    // ------------------------------------------------------------------------
    // Strict mutations
    // ------------------------------------------------------------------------

    pub fn add_node(&mut self, node: Node) -> GraphResult<()> {
        validate_id(&node.id)?;
        if self.node_map.contains_key(&node.id) {
            return Err(GraphError::node_exists(&node.id));
        }
        let id = node.id.clone();
        self.push_node(node);
        self.changes.push(GraphChange::NodeAdded { id });
        Ok(())
    }

    pub fn add_edge(&mut self, source: &str, target: &str, label: &str) -> GraphResult<()> {
        let key = EdgeKey::new(source, target);
        validate_endpoints(&key.source, &key.target)?;
        validate_label(label)?;
        self.require_node(source)?;
        self.require_node(target)?;
        if self.edge_map.contains_key(&key) {
            return Err(GraphError::edge_exists(source, target));
        }
        self.push_edge(Edge::new(source, target, label));
        self.changes.push(GraphChange::EdgeAdded { key });
        Ok(())
    }

    /// Remove a node and every edge touching it, in either direction.
    pub fn remove_node(&mut self, id: &str) -> GraphResult<Node> {
        let idx = self.require_node(id)?;
        let removed_edges: Vec<EdgeKey> = self
            .edges
            .iter()
            .filter(|e| e.key().touches(id))
            .map(Edge::key)
            .collect();

        if !removed_edges.is_empty() {
            self.edges.retain(|e| !e.key().touches(id));
            self.reindex_edges();
        }
        let node = self.nodes.remove(idx);
        self.reindex_nodes();

        self.changes.push(GraphChange::NodeRemoved {
            id: node.id.clone(),
            removed_edges,
        });
        Ok(node)
    }

    pub fn remove_edge(&mut self, source: &str, target: &str) -> GraphResult<Edge> {
        let key = EdgeKey::new(source, target);
        let idx = *self
            .edge_map
            .get(&key)
            .ok_or_else(|| GraphError::edge_not_found(source, target))?;
        let edge = self.edges.remove(idx);
        self.reindex_edges();
        self.changes.push(GraphChange::EdgeRemoved { key });
        Ok(edge)
    }

    pub fn update_node_title(&mut self, id: &str, title: &str) -> GraphResult<()> {
        let idx = self.require_node(id)?;
        let node = &mut self.nodes[idx];
        node.title = title.to_string();
        self.changes.push(GraphChange::NodeUpdated {
            id: node.id.clone(),
        });
        Ok(())
    }

    pub fn update_edge_label(&mut self, source: &str, target: &str, label: &str) -> GraphResult<()> {
        validate_label(label)?;
        let key = EdgeKey::new(source, target);
        let idx = *self
            .edge_map
            .get(&key)
            .ok_or_else(|| GraphError::edge_not_found(source, target))?;
        self.edges[idx].label = label.to_string();
        self.changes.push(GraphChange::EdgeRelabeled {
            key,
            label: label.to_string(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Merge mutations
    // ------------------------------------------------------------------------

    /// Insert `node` unless a node with the same id exists. Existing nodes are never
    /// overwritten. Returns whether the node was created.
    pub fn ensure_node(&mut self, node: Node) -> GraphResult<bool> {
        validate_id(&node.id)?;
        if self.node_map.contains_key(&node.id) {
            return Ok(false);
        }
        let id = node.id.clone();
        self.push_node(node);
        self.changes.push(GraphChange::NodeAdded { id });
        Ok(true)
    }

    /// Create the edge, or relabel it when the pair exists with a different label.
    /// Both endpoints must already exist.
    pub fn upsert_edge(&mut self, source: &str, target: &str, label: &str) -> GraphResult<EdgeUpsert> {
        let key = EdgeKey::new(source, target);
        validate_endpoints(&key.source, &key.target)?;
        self.require_node(source)?;
        self.require_node(target)?;

        match self.edge_map.get(&key).copied() {
            Some(idx) if self.edges[idx].label == label => Ok(EdgeUpsert::Unchanged),
            Some(idx) => {
                self.edges[idx].label = label.to_string();
                self.changes.push(GraphChange::EdgeRelabeled {
                    key,
                    label: label.to_string(),
                });
                Ok(EdgeUpsert::Relabeled)
            }
            None => {
                self.push_edge(Edge::new(source, target, label));
                self.changes.push(GraphChange::EdgeAdded { key });
                Ok(EdgeUpsert::Added)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_map.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&Edge> {
        self.edge_map
            .get(&EdgeKey::new(source, target))
            .map(|&idx| &self.edges[idx])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_map.contains_key(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Directed density E / (N * (N - 1)); zero below two nodes.
    pub fn density(&self) -> f64 {
        let n = self.nodes.len();
        if n < 2 {
            return 0.0;
        }
        self.edges.len() as f64 / (n * (n - 1)) as f64
    }

    /// Successors and predecessors of `id`, each once, in node insertion order.
    pub fn neighbors(&self, id: &str) -> GraphResult<Vec<NodeId>> {
        self.require_node(id)?;
        let adjacent: HashSet<&NodeId> = self
            .edges
            .iter()
            .filter_map(|e| {
                if e.source.as_str() == id {
                    Some(&e.target)
                } else if e.target.as_str() == id {
                    Some(&e.source)
                } else {
                    None
                }
            })
            .collect();
        Ok(self
            .nodes
            .iter()
            .filter(|n| adjacent.contains(&n.id))
            .map(|n| n.id.clone())
            .collect())
    }

    /// Induced subgraph of `id` and its direct neighbors in both directions.
    pub fn focus(&self, id: &str) -> GraphResult<GraphData> {
        let mut keep: HashSet<NodeId> = self.neighbors(id)?.into_iter().collect();
        keep.insert(NodeId::from(id));

        Ok(GraphData {
            nodes: self
                .nodes
                .iter()
                .filter(|n| keep.contains(&n.id))
                .cloned()
                .collect(),
            edges: self
                .edges
                .iter()
                .filter(|e| keep.contains(&e.source) && keep.contains(&e.target))
                .cloned()
                .collect(),
        })
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn require_node(&self, id: &str) -> GraphResult<usize> {
        self.node_map
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::node_not_found(id))
    }

    fn push_node(&mut self, node: Node) {
        self.node_map.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    fn push_edge(&mut self, edge: Edge) {
        self.edge_map.insert(edge.key(), self.edges.len());
        self.edges.push(edge);
    }

    fn reindex_nodes(&mut self) {
        self.node_map = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, n)| (n.id.clone(), idx))
            .collect();
    }

    fn reindex_edges(&mut self) {
        self.edge_map = self
            .edges
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.key(), idx))
            .collect();
    }
}

fn validate_id(id: &NodeId) -> GraphResult<()> {
    if id.is_blank() {
        return Err(GraphError::invalid("character name must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_endpoints(source: &NodeId, target: &NodeId) -> GraphResult<()> {
    if source.is_blank() || target.is_blank() {
        return Err(GraphError::invalid(
            "relationship endpoints must not be empty",
        ));
    }
    if source == target {
        return Err(GraphError::invalid(format!(
            "self-relationship on '{source}' is not allowed"
        )));
    }
    Ok(())
}

fn validate_label(label: &str) -> GraphResult<()> {
    if label.trim().is_empty() {
        return Err(GraphError::invalid("relationship label must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store_with(ids: &[&str]) -> GraphStore {
        let mut store = GraphStore::new();
        for id in ids {
            store.add_node(Node::new(*id, format!("{id} title"))).unwrap();
        }
        store
    }

    #[test]
    fn test_add_node_rejects_duplicates_and_blank_ids() {
        let mut store = store_with(&["A"]);
        assert_eq!(
            store.add_node(Node::new("A", "again")),
            Err(GraphError::node_exists(&NodeId::from("A")))
        );
        assert!(matches!(
            store.add_node(Node::new("  ", "blank")),
            Err(GraphError::ValidationFailed(_))
        ));
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.node("A").unwrap().title, "A title");
    }

    #[test]
    fn test_add_node_allows_empty_title() {
        let mut store = GraphStore::new();
        store.add_node(Node::new("Neville", "")).unwrap();
        assert_eq!(store.node("Neville").unwrap().title, "");
    }

    #[test]
    fn test_add_edge_strict_rules() {
        let mut store = store_with(&["A", "B"]);

        assert_eq!(
            store.add_edge("A", "Z", "friend"),
            Err(GraphError::node_not_found("Z"))
        );
        assert!(matches!(
            store.add_edge("A", "A", "self"),
            Err(GraphError::ValidationFailed(_))
        ));
        assert!(matches!(
            store.add_edge("A", "B", ""),
            Err(GraphError::ValidationFailed(_))
        ));

        store.add_edge("A", "B", "friend").unwrap();
        store.add_edge("B", "A", "friend").unwrap();
        assert_eq!(store.edge_count(), 2);

        assert_eq!(
            store.add_edge("A", "B", "friend"),
            Err(GraphError::edge_exists("A", "B"))
        );
        assert_eq!(store.edge_count(), 2);

        store.remove_edge("B", "A").unwrap();
        assert!(store.edge("A", "B").is_some());
        assert!(store.edge("B", "A").is_none());
    }

    #[test]
    fn test_remove_node_cascades_both_directions() {
        let mut store = store_with(&["A", "B", "C"]);
        store.add_edge("A", "B", "x").unwrap();
        store.add_edge("C", "A", "y").unwrap();
        store.add_edge("B", "C", "z").unwrap();
        store.take_changes();

        let removed = store.remove_node("A").unwrap();
        assert_eq!(removed.id.as_str(), "A");
        assert_eq!(store.edge_count(), 1);
        assert!(store.edge("B", "C").is_some());

        let changes = store.take_changes();
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            GraphChange::NodeRemoved { id, removed_edges } => {
                assert_eq!(id.as_str(), "A");
                assert_eq!(removed_edges.len(), 2);
            }
            other => panic!("unexpected change {other:?}"),
        }

        assert_eq!(store.remove_node("A"), Err(GraphError::node_not_found("A")));
    }

    #[test]
    fn test_updates_overwrite_single_field() {
        let mut store = store_with(&["A", "B"]);
        store.add_edge("A", "B", "friend").unwrap();

        store.update_node_title("A", "renamed").unwrap();
        store.update_edge_label("A", "B", "rival").unwrap();
        assert_eq!(store.node("A").unwrap().title, "renamed");
        assert_eq!(store.node("A").unwrap().kind, "character");
        assert_eq!(store.edge("A", "B").unwrap().label, "rival");

        assert_eq!(
            store.update_node_title("Q", "x"),
            Err(GraphError::node_not_found("Q"))
        );
        assert_eq!(
            store.update_edge_label("B", "A", "x"),
            Err(GraphError::edge_not_found("B", "A"))
        );
    }

    #[test]
    fn test_upsert_edge_outcomes() {
        let mut store = store_with(&["A", "B"]);
        assert_eq!(store.upsert_edge("A", "B", "friend"), Ok(EdgeUpsert::Added));
        assert_eq!(store.upsert_edge("A", "B", "friend"), Ok(EdgeUpsert::Unchanged));
        assert_eq!(store.upsert_edge("A", "B", "rival"), Ok(EdgeUpsert::Relabeled));
        assert_eq!(store.edge("A", "B").unwrap().label, "rival");
        assert!(store.upsert_edge("A", "A", "me").is_err());
    }

    #[test]
    fn test_ensure_node_never_overwrites() {
        let mut store = store_with(&["A"]);
        assert!(!store.ensure_node(Node::new("A", "other")).unwrap());
        assert_eq!(store.node("A").unwrap().title, "A title");
        assert!(store.ensure_node(Node::placeholder("B")).unwrap());
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn test_density_and_neighbors() {
        assert_eq!(GraphStore::new().density(), 0.0);
        assert_eq!(store_with(&["A"]).density(), 0.0);

        let mut store = store_with(&["A", "B", "C"]);
        store.add_edge("A", "B", "x").unwrap();
        assert_eq!(store_with(&["A", "B"]).density(), 0.0);
        store.add_edge("C", "A", "y").unwrap();

        assert_eq!(
            store.neighbors("A").unwrap(),
            vec![NodeId::from("B"), NodeId::from("C")]
        );
        assert!(store.neighbors("B").unwrap().contains(&NodeId::from("A")));
        assert_eq!(store.neighbors("Z"), Err(GraphError::node_not_found("Z")));
    }

    #[test]
    fn test_two_nodes_one_edge_density_is_half() {
        let mut store = store_with(&["A", "B"]);
        store.add_edge("A", "B", "friend").unwrap();
        assert_eq!(store.density(), 0.5);
    }

    #[test]
    fn test_focus_returns_induced_subgraph() {
        let mut store = store_with(&["A", "B", "C", "D"]);
        store.add_edge("A", "B", "x").unwrap();
        store.add_edge("C", "A", "y").unwrap();
        store.add_edge("B", "C", "z").unwrap();
        store.add_edge("C", "D", "w").unwrap();

        let focused = store.focus("A").unwrap();
        let ids: Vec<&str> = focused.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(focused.edges.len(), 3);
        assert!(focused.edge("C", "D").is_none());
    }

    #[test]
    fn test_replace_is_all_or_nothing() {
        let mut store = store_with(&["A", "B"]);
        store.add_edge("A", "B", "friend").unwrap();
        store.take_changes();

        let broken = GraphData {
            nodes: vec![Node::new("X", "")],
            edges: vec![Edge::new("X", "Y", "dangling")],
        };
        assert!(store.replace(broken).is_err());
        assert_eq!(store.node_count(), 2);
        assert!(store.take_changes().is_empty());

        store.replace(GraphData::seed()).unwrap();
        assert_eq!(store.snapshot(), GraphData::seed());
        assert_eq!(store.take_changes(), vec![GraphChange::GraphReplaced]);
    }

    #[test]
    fn test_editing_scenario() {
        let mut store = store_with(&["A", "B"]);
        store.add_edge("A", "B", "friend").unwrap();
        store.add_node(Node::new("C", "new")).unwrap();
        store.add_edge("B", "C", "rival").unwrap();
        store.remove_node("A").unwrap();

        let ids: Vec<&str> = store.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
        assert_eq!(store.edges(), &[Edge::new("B", "C", "rival")]);
        assert_eq!(store.density(), 0.5);
    }

    proptest! {
        #[test]
        fn prop_add_then_remove_node_restores_graph(
            edges in proptest::collection::vec((0usize..5, 0usize..5), 0..12)
        ) {
            let ids = ["n0", "n1", "n2", "n3", "n4"];
            let mut store = store_with(&ids);
            for (s, t) in edges {
                let _ = store.add_edge(ids[s], ids[t], "rel");
            }
            let before = store.snapshot();

            store.add_node(Node::new("fresh", "")).unwrap();
            store.add_edge("fresh", "n0", "rel").unwrap();
            store.add_edge("n1", "fresh", "rel").unwrap();
            store.remove_node("fresh").unwrap();

            prop_assert_eq!(store.snapshot(), before);
        }

        #[test]
        fn prop_edges_always_reference_nodes(
            ops in proptest::collection::vec((0u8..4, 0usize..4, 0usize..4), 0..40)
        ) {
            let ids = ["a", "b", "c", "d"];
            let mut store = GraphStore::new();
            for (op, x, y) in ops {
                let _ = match op {
                    0 => store.add_node(Node::new(ids[x], "")),
                    1 => store.add_edge(ids[x], ids[y], "rel"),
                    2 => store.remove_node(ids[x]).map(|_| ()),
                    _ => store.remove_edge(ids[x], ids[y]).map(|_| ()),
                };
            }
            for edge in store.edges() {
                prop_assert!(store.contains_node(edge.source.as_str()));
                prop_assert!(store.contains_node(edge.target.as_str()));
                prop_assert_ne!(&edge.source, &edge.target);
            }
            prop_assert!(GraphStore::from_data(store.snapshot()).is_ok());
        }
    }
}
