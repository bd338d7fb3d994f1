use crate::extraction::ExtractionOutcome;
use crate::history::HistoryManager;
use crate::settings::EditorSettings;
use nexus_core::{ExtractionProposal, GraphData, GraphError, GraphResult, Node};
use nexus_events::{Event, EventBus};
use nexus_graph::{BatchMerger, CentralityAnalyzer, CentralityScore, GraphStore, MergeSummary};
use nexus_project::{LoadedProject, ProjectEntry, ProjectLibrary};
use nexus_storage::AutosaveSlot;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Summary numbers shown in the statistics panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub density: f64,
}

/// A proposal waiting for the user to confirm or discard it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingProposal {
    pub request_id: Uuid,
    pub proposal: ExtractionProposal,
}

/// One editing session: the live graph, its history, the project library and the
/// extraction review state.
///
/// Every successful durable edit goes through [`EditorSession::apply`], which commits one
/// history entry (and autosave) and forwards the store's change notifications to the bus.
pub struct EditorSession {
    settings: EditorSettings,
    graph: GraphStore,
    history: HistoryManager,
    library: ProjectLibrary,
    events: EventBus,
    awaiting: Option<Uuid>,
    pending: Option<PendingProposal>,
}

impl EditorSession {
    /// Start a session from the autosave slot, or from the seed graph.
    pub fn open(settings: EditorSettings, events: EventBus) -> GraphResult<Self> {
        let autosave = AutosaveSlot::new(settings.autosave_path());
        let history = HistoryManager::new(settings.history_limit, Some(autosave), events.clone());
        Self::with_history(settings, history, events)
    }

    /// Session without an autosave slot. Nothing touches the disk until a project is saved.
    pub fn in_memory(settings: EditorSettings, events: EventBus) -> GraphResult<Self> {
        let history = HistoryManager::new(settings.history_limit, None, events.clone());
        Self::with_history(settings, history, events)
    }

    fn with_history(
        settings: EditorSettings,
        mut history: HistoryManager,
        events: EventBus,
    ) -> GraphResult<Self> {
        let start = history.initialize();
        let graph = GraphStore::from_data(start)?;
        let library =
            ProjectLibrary::new(&settings.data_dir).excluding(settings.autosave_file.clone());
        tracing::info!(
            "Session opened with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        events.publish(Event::GraphChanged(nexus_core::GraphChange::GraphReplaced));
        Ok(Self {
            settings,
            graph,
            history,
            library,
            events,
            awaiting: None,
            pending: None,
        })
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn library(&self) -> &ProjectLibrary {
        &self.library
    }

    /// The bus every session event goes to. Callers drain it after each command.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run a graph mutation and, if it succeeds, record it as one durable step.
    fn apply<T>(&mut self, op: impl FnOnce(&mut GraphStore) -> GraphResult<T>) -> GraphResult<T> {
        let value = op(&mut self.graph)?;
        self.commit();
        Ok(value)
    }

    fn commit(&mut self) {
        self.history.commit(&self.graph.snapshot());
        self.flush_changes();
    }

    fn flush_changes(&mut self) {
        let changes = self.graph.take_changes();
        self.events
            .publish_all(changes.into_iter().map(Event::GraphChanged));
    }

    // ------------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------------

    pub fn add_node(&mut self, node: Node) -> GraphResult<()> {
        self.apply(|graph| graph.add_node(node))
    }

    pub fn add_edge(&mut self, source: &str, target: &str, label: &str) -> GraphResult<()> {
        self.apply(|graph| graph.add_edge(source, target, label))
    }

    pub fn remove_node(&mut self, id: &str) -> GraphResult<Node> {
        self.apply(|graph| graph.remove_node(id))
    }

    pub fn remove_edge(&mut self, source: &str, target: &str) -> GraphResult<()> {
        self.apply(|graph| graph.remove_edge(source, target).map(|_| ()))
    }

    pub fn update_node_title(&mut self, id: &str, title: &str) -> GraphResult<()> {
        self.apply(|graph| graph.update_node_title(id, title))
    }

    pub fn update_edge_label(&mut self, source: &str, target: &str, label: &str) -> GraphResult<()> {
        self.apply(|graph| graph.update_edge_label(source, target, label))
    }

    /// Replace the graph with the seed graph as a new history entry.
    pub fn reset(&mut self) -> GraphResult<()> {
        self.apply(|graph| graph.replace(GraphData::seed()))?;
        tracing::info!("Graph reset to seed");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    pub fn undo(&mut self) -> GraphResult<()> {
        let restored = self.history.undo()?;
        self.restore(&restored)
    }

    pub fn redo(&mut self) -> GraphResult<()> {
        let restored = self.history.redo()?;
        self.restore(&restored)
    }

    fn restore(&mut self, snapshot: &GraphData) -> GraphResult<()> {
        self.graph.replace(snapshot.clone())?;
        self.flush_changes();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------------

    pub fn save_as(&mut self, name: &str) -> GraphResult<PathBuf> {
        match self.library.save(name, &self.graph.snapshot()) {
            Ok(path) => {
                self.events
                    .publish(Event::ProjectSaved { path: path.clone() });
                Ok(path)
            }
            Err(err) => {
                self.events.publish(Event::ProjectSaveFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Load a project file. A failed load leaves the live graph and history untouched.
    pub fn load(&mut self, path: &Path) -> GraphResult<LoadedProject> {
        let loaded = self
            .library
            .load(path)
            .and_then(|project| {
                self.apply(|graph| graph.replace(project.graph.clone()))?;
                Ok(project)
            });
        match &loaded {
            Ok(_) => self.events.publish(Event::ProjectLoaded {
                path: path.to_path_buf(),
            }),
            Err(err) => self.events.publish(Event::ProjectLoadFailed {
                error: err.to_string(),
            }),
        }
        loaded
    }

    pub fn load_named(&mut self, name: &str) -> GraphResult<LoadedProject> {
        let path = self.library.path_for(name)?;
        self.load(&path)
    }

    pub fn list_projects(&self) -> GraphResult<Vec<ProjectEntry>> {
        self.library.list()
    }

    // ------------------------------------------------------------------------
    // Extraction review
    // ------------------------------------------------------------------------

    /// Register a new extraction run. Any earlier run still in flight becomes stale.
    pub fn begin_extraction(&mut self) -> Uuid {
        let request_id = Uuid::new_v4();
        if let Some(previous) = self.awaiting.replace(request_id) {
            tracing::debug!("Extraction {} superseded by {}", previous, request_id);
        }
        self.events.publish(Event::ExtractionStarted { request_id });
        request_id
    }

    pub fn awaiting_extraction(&self) -> Option<Uuid> {
        self.awaiting
    }

    /// Accept the outcome of run `request_id`. Outcomes of stale runs are dropped and
    /// `Ok(false)` is returned. A found proposal is staged for review, never applied.
    pub fn finish_extraction(
        &mut self,
        request_id: Uuid,
        outcome: ExtractionOutcome,
    ) -> GraphResult<bool> {
        if self.awaiting != Some(request_id) {
            tracing::debug!("Dropping stale extraction result {}", request_id);
            return Ok(false);
        }
        self.awaiting = None;

        match outcome {
            ExtractionOutcome::Found(proposal) => {
                let (nodes, edges) = (proposal.nodes.len(), proposal.edges.len());
                self.events.publish_all([
                    Event::ExtractionCompleted {
                        request_id,
                        nodes,
                        edges,
                    },
                    Event::ProposalStaged {
                        request_id,
                        nodes,
                        edges,
                    },
                ]);
                self.pending = Some(PendingProposal {
                    request_id,
                    proposal,
                });
                Ok(true)
            }
            ExtractionOutcome::NothingFound => {
                self.events.publish_all([
                    Event::ExtractionCompleted {
                        request_id,
                        nodes: 0,
                        edges: 0,
                    },
                    Event::ShowWarning {
                        message: "No characters or relationships found in the text".to_string(),
                    },
                ]);
                Ok(true)
            }
            ExtractionOutcome::Cancelled => {
                self.events
                    .publish(Event::ExtractionCancelled { request_id });
                Ok(true)
            }
            ExtractionOutcome::TimedOut(after) => {
                let err = GraphError::ExtractionFailed(format!(
                    "no response after {} seconds",
                    after.as_secs()
                ));
                self.events.publish(Event::ExtractionFailed {
                    request_id,
                    error: err.to_string(),
                });
                Err(err)
            }
            ExtractionOutcome::Failed(err) => {
                self.events.publish(Event::ExtractionFailed {
                    request_id,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    pub fn pending_proposal(&self) -> Option<&PendingProposal> {
        self.pending.as_ref()
    }

    /// Merge the staged proposal as a single history entry.
    pub fn confirm_proposal(&mut self) -> GraphResult<MergeSummary> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| GraphError::NotFound("Pending proposal".to_string()))?;
        Ok(self.import_batch(&pending.proposal))
    }

    pub fn discard_proposal(&mut self) -> bool {
        let discarded = self.pending.take().is_some();
        if discarded {
            self.events.publish(Event::ProposalDiscarded);
        }
        discarded
    }

    /// Merge a proposal directly. A merge that changes nothing records no history entry.
    pub fn import_batch(&mut self, proposal: &ExtractionProposal) -> MergeSummary {
        let summary = BatchMerger::merge(&mut self.graph, proposal);
        if !summary.is_noop() {
            self.commit();
        }
        tracing::info!("{}", summary);
        self.events.publish_all([
            Event::BatchMerged {
                nodes_added: summary.nodes_added,
                edges_added: summary.edges_added,
                edges_updated: summary.edges_updated,
                skipped: summary.skipped,
            },
            Event::ShowSuccess {
                message: summary.to_string(),
            },
        ]);
        summary
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            density: self.graph.density(),
        }
    }

    pub fn rank(&self) -> Vec<CentralityScore> {
        CentralityAnalyzer::rank(&self.graph, self.settings.centrality_top_k)
    }

    pub fn focus(&self, id: &str) -> GraphResult<GraphData> {
        self.graph.focus(id)
    }

    pub fn snapshot(&self) -> GraphData {
        self.graph.snapshot()
    }
}
