use crate::graph::{EdgeUpsert, GraphStore, validate_endpoints};
use nexus_core::{
    DEFAULT_NODE_GROUP, DEFAULT_NODE_KIND, ExtractionProposal, GraphResult, Node, NodeId,
    NodeProposal,
};
use std::fmt;

/// Counts reported after a batch merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// New nodes, placeholders included.
    pub nodes_added: usize,
    /// Nodes auto-created because a relationship referenced them.
    pub nodes_materialized: usize,
    pub nodes_existing: usize,
    pub edges_added: usize,
    pub edges_updated: usize,
    pub edges_unchanged: usize,
    /// Records rejected by validation (blank ids, self-relationships).
    pub skipped: usize,
}

impl MergeSummary {
    /// Whether the merge changed anything at all.
    pub fn is_noop(&self) -> bool {
        self.nodes_added == 0 && self.edges_added == 0 && self.edges_updated == 0
    }
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch imported {} characters and {} relationships",
            self.nodes_added, self.edges_added
        )?;
        if self.edges_updated > 0 {
            write!(f, ", relabeled {}", self.edges_updated)?;
        }
        if self.skipped > 0 {
            write!(f, ", skipped {} invalid", self.skipped)?;
        }
        Ok(())
    }
}

/// Non-destructive reconciliation of bulk proposals into a [`GraphStore`].
///
/// Nodes are created only when absent. Relationships create missing endpoints as
/// placeholders and either add the edge or relabel the existing one.
pub struct BatchMerger;

impl BatchMerger {
    pub fn merge(store: &mut GraphStore, proposal: &ExtractionProposal) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for record in &proposal.nodes {
            match store.ensure_node(node_from_proposal(record)) {
                Ok(true) => summary.nodes_added += 1,
                Ok(false) => summary.nodes_existing += 1,
                Err(err) => {
                    tracing::warn!("Skipping proposed character {:?}: {}", record.id, err);
                    summary.skipped += 1;
                }
            }
        }

        for record in &proposal.edges {
            match Self::merge_edge(store, &record.source, &record.target, &record.label) {
                Ok((created, outcome)) => {
                    summary.nodes_added += created;
                    summary.nodes_materialized += created;
                    match outcome {
                        EdgeUpsert::Added => summary.edges_added += 1,
                        EdgeUpsert::Relabeled => summary.edges_updated += 1,
                        EdgeUpsert::Unchanged => summary.edges_unchanged += 1,
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "Skipping proposed relationship {:?} -> {:?}: {}",
                        record.source,
                        record.target,
                        err
                    );
                    summary.skipped += 1;
                }
            }
        }

        tracing::info!("{}", summary);
        summary
    }

    fn merge_edge(
        store: &mut GraphStore,
        source: &str,
        target: &str,
        label: &str,
    ) -> GraphResult<(usize, EdgeUpsert)> {
        // Reject blank endpoints and self-relationships before materializing anything.
        validate_endpoints(&NodeId::from(source), &NodeId::from(target))?;
        let mut created = 0;
        for endpoint in [source, target] {
            if store.ensure_node(Node::placeholder(endpoint))? {
                created += 1;
            }
        }
        let outcome = store.upsert_edge(source, target, label)?;
        Ok((created, outcome))
    }
}

fn node_from_proposal(record: &NodeProposal) -> Node {
    let mut extra = record.extra.clone();
    // Imports written by other tools carry the tag under `type`.
    let legacy_kind = match extra.remove("type") {
        Some(serde_json::Value::String(kind)) => Some(kind),
        Some(other) => {
            extra.insert("type".to_string(), other);
            None
        }
        None => None,
    };

    Node {
        id: record.id.as_str().into(),
        title: record.title.clone().unwrap_or_default(),
        kind: record
            .kind
            .clone()
            .or(legacy_kind)
            .unwrap_or_else(|| DEFAULT_NODE_KIND.to_string()),
        group: record.group.unwrap_or(DEFAULT_NODE_GROUP),
        extra,
    }
}
