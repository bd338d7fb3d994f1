use crate::Attributes;
use serde::{Deserialize, Serialize};

/// A node suggested by an extraction service or bulk import. Only `id` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeProposal {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<i64>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl NodeProposal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            kind: None,
            group: None,
            extra: Attributes::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeProposal {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
}

impl EdgeProposal {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
        }
    }
}

/// Tentative nodes and edges awaiting user review. Empty means "nothing found",
/// which is a distinct outcome from a failed extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionProposal {
    #[serde(default)]
    pub nodes: Vec<NodeProposal>,
    #[serde(default)]
    pub edges: Vec<EdgeProposal>,
}

impl ExtractionProposal {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}
