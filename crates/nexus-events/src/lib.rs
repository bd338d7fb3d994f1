use crossbeam_channel::{unbounded, Receiver, Sender};
use nexus_core::{GraphChange, NodeId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    // Graph
    GraphChanged(GraphChange),

    // History
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
        position: usize,
        len: usize,
    },
    AutosaveFailed {
        error: String,
    },

    // Project
    ProjectSaved {
        path: PathBuf,
    },
    ProjectSaveFailed {
        error: String,
    },
    ProjectLoaded {
        path: PathBuf,
    },
    ProjectLoadFailed {
        error: String,
    },

    // Extraction
    ExtractionStarted {
        request_id: Uuid,
    },
    ExtractionCompleted {
        request_id: Uuid,
        nodes: usize,
        edges: usize,
    },
    ExtractionFailed {
        request_id: Uuid,
        error: String,
    },
    ExtractionCancelled {
        request_id: Uuid,
    },

    // Proposal review
    ProposalStaged {
        request_id: Uuid,
        nodes: usize,
        edges: usize,
    },
    ProposalDiscarded,
    BatchMerged {
        nodes_added: usize,
        edges_added: usize,
        edges_updated: usize,
        skipped: usize,
    },

    // Layout / view state
    ViewReset,
    NodeMoved {
        id: NodeId,
        x: f32,
        y: f32,
    },
    CameraChanged {
        scale: f32,
        x: f32,
        y: f32,
    },

    // Notifications
    ShowInfo {
        message: String,
    },
    ShowSuccess {
        message: String,
    },
    ShowWarning {
        message: String,
    },
    ShowError {
        message: String,
    },
}

impl Event {
    /// Whether this event means the set of nodes or edges may have changed.
    pub fn changes_topology(&self) -> bool {
        match self {
            Event::GraphChanged(change) => change.is_topological(),
            Event::BatchMerged { .. } => true,
            _ => false,
        }
    }
}

/// Unbounded crossbeam channel shared by publishers and the consumer.
///
/// The bus holds its own receiver, so published events stay queued until someone calls
/// [`EventBus::drain`] or [`EventBus::dispatch_to`]. Owners of a long-lived session must
/// drain it regularly (once per command or frame) or the queue keeps growing.
#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event dropped: bus has no receivers");
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Number of events waiting to be drained.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Drain pending events without dispatching them.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    /// Dispatch all pending events to a listener.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) {
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
        }
    }
}

/// Implement this to receive events from the EventBus.
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}
