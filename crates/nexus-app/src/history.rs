use nexus_core::{GraphData, GraphError, GraphResult};
use nexus_events::{Event, EventBus};
use nexus_graph::GraphStore;
use nexus_storage::AutosaveSlot;
use std::sync::Arc;

/// Linear undo/redo over full-graph snapshots, with the autosave slot kept in step.
///
/// `entries[cursor]` is always the graph the session currently shows.
pub struct HistoryManager {
    entries: Vec<Arc<GraphData>>,
    cursor: usize,
    limit: usize,
    autosave: Option<AutosaveSlot>,
    event_bus: EventBus,
}

impl HistoryManager {
    pub fn new(limit: usize, autosave: Option<AutosaveSlot>, event_bus: EventBus) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
            autosave,
            event_bus,
        }
    }

    /// Produce the starting graph and seed the history with it.
    ///
    /// A readable, valid autosave becomes the single entry at cursor 0. Otherwise the
    /// default seed graph is committed like any other mutation.
    pub fn initialize(&mut self) -> GraphData {
        self.entries.clear();
        self.cursor = 0;

        if let Some(graph) = self.read_autosave() {
            tracing::info!(
                "Restored autosave with {} nodes and {} edges",
                graph.nodes.len(),
                graph.edges.len()
            );
            self.entries.push(Arc::new(graph.clone()));
            self.notify_change();
            return graph;
        }

        let seed = GraphData::seed();
        self.commit(&seed);
        seed
    }

    /// Record a durable mutation: autosave first, then push after the cursor,
    /// dropping any redo branch.
    pub fn commit(&mut self, graph: &GraphData) {
        self.write_autosave(graph);

        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(Arc::new(graph.clone()));

        while self.entries.len() > self.limit {
            self.entries.remove(0);
        }
        self.cursor = self.entries.len() - 1;
        self.notify_change();
    }

    pub fn undo(&mut self) -> GraphResult<Arc<GraphData>> {
        if !self.can_undo() {
            return Err(GraphError::AtOldest);
        }
        self.cursor -= 1;
        Ok(self.restore_current())
    }

    pub fn redo(&mut self) -> GraphResult<Arc<GraphData>> {
        if !self.can_redo() {
            return Err(GraphError::AtNewest);
        }
        self.cursor += 1;
        Ok(self.restore_current())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<Arc<GraphData>> {
        self.entries.get(self.cursor).cloned()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn autosave(&self) -> Option<&AutosaveSlot> {
        self.autosave.as_ref()
    }

    fn restore_current(&mut self) -> Arc<GraphData> {
        let graph = Arc::clone(&self.entries[self.cursor]);
        self.write_autosave(&graph);
        self.notify_change();
        graph
    }

    fn read_autosave(&self) -> Option<GraphData> {
        let slot = self.autosave.as_ref()?;
        match slot.read() {
            Ok(Some(graph)) => match GraphStore::from_data(graph.clone()) {
                Ok(_) => Some(graph),
                Err(e) => {
                    tracing::warn!("Ignoring invalid autosave {:?}: {}", slot.path(), e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable autosave {:?}: {}", slot.path(), e);
                None
            }
        }
    }

    fn write_autosave(&self, graph: &GraphData) {
        let Some(slot) = &self.autosave else {
            return;
        };
        if let Err(e) = slot.write(graph) {
            tracing::warn!("Autosave to {:?} failed: {}", slot.path(), e);
            self.event_bus.publish(Event::AutosaveFailed {
                error: e.to_string(),
            });
        }
    }

    fn notify_change(&self) {
        self.event_bus.publish(Event::HistoryChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            position: self.cursor,
            len: self.entries.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::{Edge, Node};
    use tempfile::tempdir;

    fn with_node(base: &GraphData, id: &str) -> GraphData {
        let mut graph = base.clone();
        graph.nodes.push(Node::new(id, ""));
        graph
    }

    #[test]
    fn test_fresh_start_commits_seed() {
        let dir = tempdir().unwrap();
        let slot = AutosaveSlot::new(dir.path().join("autosave.json"));
        let mut history = HistoryManager::new(10, Some(slot.clone()), EventBus::new());

        let start = history.initialize();
        assert_eq!(start, GraphData::seed());
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert_eq!(slot.read().unwrap(), Some(GraphData::seed()));
    }

    #[test]
    fn test_start_from_autosave_without_pushing() {
        let dir = tempdir().unwrap();
        let slot = AutosaveSlot::new(dir.path().join("autosave.json"));
        let saved = with_node(&GraphData::seed(), "Neville");
        slot.write(&saved).unwrap();

        let mut history = HistoryManager::new(10, Some(slot), EventBus::new());
        assert_eq!(history.initialize(), saved);
        assert_eq!(history.len(), 1);
        assert_eq!(history.position(), 0);
    }

    #[test]
    fn test_invalid_autosave_falls_back_to_seed() {
        let dir = tempdir().unwrap();
        let slot = AutosaveSlot::new(dir.path().join("autosave.json"));
        let broken = GraphData {
            nodes: vec![],
            edges: vec![Edge::new("A", "B", "dangling")],
        };
        slot.write(&broken).unwrap();

        let mut history = HistoryManager::new(10, Some(slot.clone()), EventBus::new());
        assert_eq!(history.initialize(), GraphData::seed());
        assert_eq!(slot.read().unwrap(), Some(GraphData::seed()));
    }

    #[test]
    fn test_undo_redo_walks_the_stack() {
        let dir = tempdir().unwrap();
        let slot = AutosaveSlot::new(dir.path().join("autosave.json"));
        let mut history = HistoryManager::new(10, Some(slot.clone()), EventBus::new());
        let seed = history.initialize();

        let one = with_node(&seed, "A");
        let two = with_node(&one, "B");
        history.commit(&one);
        history.commit(&two);

        assert_eq!(*history.undo().unwrap(), one);
        assert_eq!(slot.read().unwrap(), Some(one.clone()));
        assert_eq!(*history.undo().unwrap(), seed);
        assert_eq!(history.undo(), Err(GraphError::AtOldest));
        assert_eq!(history.len(), 3);

        assert_eq!(*history.redo().unwrap(), one);
        assert_eq!(*history.redo().unwrap(), two);
        assert_eq!(history.redo(), Err(GraphError::AtNewest));
        assert_eq!(slot.read().unwrap(), Some(two));
    }

    #[test]
    fn test_commit_behind_tip_drops_redo_branch() {
        let mut history = HistoryManager::new(10, None, EventBus::new());
        let seed = history.initialize();
        history.commit(&with_node(&seed, "A"));
        history.undo().unwrap();

        let other = with_node(&seed, "X");
        history.commit(&other);
        assert_eq!(history.len(), 2);
        assert_eq!(history.redo(), Err(GraphError::AtNewest));
        assert_eq!(*history.current().unwrap(), other);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = HistoryManager::new(3, None, EventBus::new());
        let mut graph = history.initialize();
        for id in ["A", "B", "C", "D"] {
            graph = with_node(&graph, id);
            history.commit(&graph);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.position(), 2);
        history.undo().unwrap();
        history.undo().unwrap();
        assert_eq!(history.undo(), Err(GraphError::AtOldest));
        assert_eq!(history.current().unwrap().nodes.len(), 4);
    }

    #[test]
    fn test_autosave_failure_is_reported_not_fatal() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let bus = EventBus::new();
        let slot = AutosaveSlot::new(blocker.join("autosave.json"));
        let mut history = HistoryManager::new(10, Some(slot), bus.clone());

        let seed = history.initialize();
        history.commit(&with_node(&seed, "A"));
        assert_eq!(history.len(), 2);
        assert!(
            bus.drain()
                .iter()
                .any(|e| matches!(e, Event::AutosaveFailed { .. }))
        );
    }

    #[test]
    fn test_history_events_track_cursor() {
        let bus = EventBus::new();
        let mut history = HistoryManager::new(10, None, bus.clone());
        let seed = history.initialize();
        history.commit(&with_node(&seed, "A"));
        history.undo().unwrap();

        let last = bus.drain().pop().unwrap();
        assert_eq!(
            last,
            Event::HistoryChanged {
                can_undo: false,
                can_redo: true,
                position: 0,
                len: 2,
            }
        );
    }
}
