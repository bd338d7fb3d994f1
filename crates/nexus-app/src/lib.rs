pub mod extraction;
pub mod history;
pub mod session;
pub mod settings;

pub use extraction::{
    Credentials, ExtractionGateway, ExtractionOutcome, OpenAiCompatibleGateway,
    StaticExtractionGateway, Vendor, parse_proposal, run_extraction,
};
pub use history::HistoryManager;
pub use session::{EditorSession, GraphStats, PendingProposal};
pub use settings::{EditorSettings, ExtractionSettings};
