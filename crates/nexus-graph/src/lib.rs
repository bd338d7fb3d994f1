pub mod centrality;
pub mod graph;
pub mod layout;
pub mod merge;

pub use centrality::{CentralityAnalyzer, CentralityScore, DEFAULT_TOP_K};
pub use graph::{EdgeUpsert, GraphStore};
pub use layout::{
    Camera, ForceSimulation, LayoutConfig, LayoutPhase, LayoutSync, PhysicsConfig, Placement,
    ViewStateStore, Viewport,
};
pub use merge::{BatchMerger, MergeSummary};
