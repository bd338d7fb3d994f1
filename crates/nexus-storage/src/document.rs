use crate::StorageError;
use nexus_core::{Attributes, DEFAULT_NODE_GROUP, DEFAULT_NODE_KIND, Edge, GraphData, Node};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;

/// Node-link JSON layout shared by the autosave slot and named projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default = "default_directed")]
    pub directed: bool,
    #[serde(default)]
    pub multigraph: bool,
    /// Graph-level attributes such as the project name and save time.
    #[serde(default)]
    pub graph: Attributes,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default, alias = "links")]
    pub edges: Vec<EdgeRecord>,
}

fn default_directed() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(deserialize_with = "id_from_json")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub group: Option<i64>,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(deserialize_with = "id_from_json")]
    pub source: String,
    #[serde(deserialize_with = "id_from_json")]
    pub target: String,
    #[serde(default)]
    pub label: String,
}

/// Node ids written by other tools are sometimes plain numbers.
fn id_from_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, found {other}"
        ))),
    }
}

impl GraphDocument {
    pub fn from_graph(graph: &GraphData, attributes: Attributes) -> Self {
        Self {
            directed: true,
            multigraph: false,
            graph: attributes,
            nodes: graph.nodes.iter().map(NodeRecord::from).collect(),
            edges: graph.edges.iter().map(EdgeRecord::from).collect(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StorageError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Convert into a graph value. Undirected and multigraph documents are refused
    /// because they cannot be represented without losing edges or direction.
    pub fn into_graph(self) -> Result<GraphData, StorageError> {
        if !self.directed {
            return Err(StorageError::Schema(
                "document describes an undirected graph".to_string(),
            ));
        }
        if self.multigraph {
            return Err(StorageError::Schema(
                "multigraph documents are not supported".to_string(),
            ));
        }
        Ok(GraphData {
            nodes: self.nodes.into_iter().map(Node::from).collect(),
            edges: self.edges.into_iter().map(Edge::from).collect(),
        })
    }
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            title: Some(node.title.clone()),
            kind: Some(node.kind.clone()),
            group: Some(node.group),
            extra: node.extra.clone(),
        }
    }
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        let mut extra = record.extra;
        let legacy_kind = match extra.get("type") {
            Some(serde_json::Value::String(kind)) if record.kind.is_none() => {
                let kind = kind.clone();
                extra.remove("type");
                Some(kind)
            }
            _ => None,
        };
        Node {
            id: record.id.into(),
            title: record.title.unwrap_or_default(),
            kind: record
                .kind
                .or(legacy_kind)
                .unwrap_or_else(|| DEFAULT_NODE_KIND.to_string()),
            group: record.group.unwrap_or(DEFAULT_NODE_GROUP),
            extra,
        }
    }
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            source: edge.source.to_string(),
            target: edge.target.to_string(),
            label: edge.label.clone(),
        }
    }
}

impl From<EdgeRecord> for Edge {
    fn from(record: EdgeRecord) -> Self {
        Edge::new(record.source, record.target, record.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_shape() {
        let doc = GraphDocument::from_graph(&GraphData::seed(), Attributes::new());
        let value: serde_json::Value =
            serde_json::from_str(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["directed"], true);
        assert_eq!(value["nodes"][0]["id"], "Harry Potter");
        assert_eq!(value["nodes"][0]["kind"], "character");
        assert_eq!(value["nodes"][0]["group"], 1);
        assert_eq!(value["edges"][0]["label"], "best friend");
    }

    #[test]
    fn test_node_link_compat_fields() {
        let doc = GraphDocument::from_json(
            r#"{
                "directed": true,
                "multigraph": false,
                "graph": {"name": "legacy"},
                "nodes": [{"id": "A", "type": "character", "title": "a"}, {"id": 7}],
                "links": [{"source": "A", "target": 7, "label": "knows"}]
            }"#,
        )
        .unwrap();
        assert_eq!(doc.graph.get("name"), Some(&serde_json::json!("legacy")));

        let graph = doc.into_graph().unwrap();
        assert_eq!(graph.nodes[0].kind, "character");
        assert!(graph.nodes[0].extra.is_empty());
        assert_eq!(graph.nodes[1].id.as_str(), "7");
        assert_eq!(graph.nodes[1].title, "");
        assert_eq!(graph.nodes[1].group, DEFAULT_NODE_GROUP);
        assert_eq!(graph.edges[0], Edge::new("A", "7", "knows"));
    }

    #[test]
    fn test_missing_directed_defaults_to_true() {
        let doc = GraphDocument::from_json(r#"{"nodes": [], "edges": []}"#).unwrap();
        assert!(doc.directed);
        assert!(doc.into_graph().unwrap().is_empty());
    }

    #[test]
    fn test_undirected_and_multigraph_are_refused() {
        let undirected = GraphDocument::from_json(r#"{"directed": false, "nodes": []}"#).unwrap();
        assert!(matches!(
            undirected.into_graph(),
            Err(StorageError::Schema(_))
        ));
        let multi = GraphDocument::from_json(r#"{"multigraph": true, "nodes": []}"#).unwrap();
        assert!(matches!(multi.into_graph(), Err(StorageError::Schema(_))));
    }

    #[test]
    fn test_bad_shapes_fail_to_parse() {
        assert!(GraphDocument::from_json("not json").is_err());
        assert!(GraphDocument::from_json(r#"{"nodes": [{"title": "no id"}]}"#).is_err());
        assert!(GraphDocument::from_json(r#"{"nodes": {"id": "A"}}"#).is_err());
    }
}
