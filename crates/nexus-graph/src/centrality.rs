use crate::graph::GraphStore;
use nexus_core::NodeId;
use std::collections::HashMap;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct CentralityScore {
    pub id: NodeId,
    pub in_degree: usize,
    pub out_degree: usize,
    /// (in + out) / (N - 1)
    pub score: f64,
}

pub struct CentralityAnalyzer;

impl CentralityAnalyzer {
    /// Degree centrality for every node, in node insertion order.
    pub fn degree_centrality(graph: &GraphStore) -> Vec<CentralityScore> {
        let n = graph.node_count();
        let mut degrees: HashMap<&str, (usize, usize)> = HashMap::with_capacity(n);
        for edge in graph.edges() {
            degrees.entry(edge.source.as_str()).or_default().1 += 1;
            degrees.entry(edge.target.as_str()).or_default().0 += 1;
        }

        let norm = if n > 1 { (n - 1) as f64 } else { 1.0 };
        graph
            .nodes()
            .iter()
            .map(|node| {
                let (in_degree, out_degree) =
                    degrees.get(node.id.as_str()).copied().unwrap_or_default();
                CentralityScore {
                    id: node.id.clone(),
                    in_degree,
                    out_degree,
                    score: (in_degree + out_degree) as f64 / norm,
                }
            })
            .collect()
    }

    /// Top `top_k` nodes by degree centrality, highest first. Ties keep insertion order.
    pub fn rank(graph: &GraphStore, top_k: usize) -> Vec<CentralityScore> {
        let mut scores = Self::degree_centrality(graph);
        // Stable sort keeps insertion order among equal scores.
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores.truncate(top_k);
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::Node;

    #[test]
    fn test_empty_graph_ranks_nothing() {
        assert!(CentralityAnalyzer::rank(&GraphStore::new(), DEFAULT_TOP_K).is_empty());
    }

    #[test]
    fn test_single_node_scores_zero() {
        let mut graph = GraphStore::new();
        graph.add_node(Node::new("Solo", "")).unwrap();
        let ranked = CentralityAnalyzer::rank(&graph, DEFAULT_TOP_K);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 0.0);
    }

    #[test]
    fn test_rank_orders_by_degree_then_insertion() {
        let mut graph = GraphStore::new();
        for id in ["A", "B", "C", "D"] {
            graph.add_node(Node::new(id, "")).unwrap();
        }
        graph.add_edge("A", "B", "x").unwrap();
        graph.add_edge("C", "B", "y").unwrap();
        graph.add_edge("B", "D", "z").unwrap();

        let ranked = CentralityAnalyzer::rank(&graph, 3);
        let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
        assert_eq!(ranked[0].in_degree, 2);
        assert_eq!(ranked[0].out_degree, 1);
        assert!((ranked[0].score - 1.0).abs() < f64::EPSILON);
        assert!((ranked[1].score - 1.0 / 3.0).abs() < 1e-12);
    }
}
