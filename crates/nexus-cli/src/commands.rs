use anyhow::{Context, Result, bail};
use clap::Subcommand;
use nexus_app::{
    Credentials, EditorSession, ExtractionGateway, ExtractionOutcome, OpenAiCompatibleGateway,
    StaticExtractionGateway, run_extraction,
};
use nexus_core::{DEFAULT_NODE_GROUP, DEFAULT_NODE_KIND, ExtractionProposal, GraphData, Node};
use nexus_graph::LayoutSync;
use nexus_storage::SqliteKvStore;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

pub const API_KEY_ENV: &str = "NEXUS_API_KEY";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a character
    AddNode {
        id: String,
        #[arg(default_value = "")]
        title: String,
        #[arg(long, default_value = DEFAULT_NODE_KIND)]
        kind: String,
        #[arg(long, default_value_t = DEFAULT_NODE_GROUP)]
        group: i64,
    },
    /// Add a relationship between two existing characters
    AddEdge {
        source: String,
        target: String,
        label: String,
    },
    /// Delete a character and every relationship touching it
    RemoveNode { id: String },
    RemoveEdge { source: String, target: String },
    /// Change a character's description
    EditNode { id: String, title: String },
    /// Change a relationship's label
    EditEdge {
        source: String,
        target: String,
        label: String,
    },
    Undo,
    Redo,
    /// Replace the graph with the starter graph
    Reset,

    /// Save the graph under a project name
    Save { name: String },
    /// Load a project by name, or by path with --file
    Load {
        name: Option<String>,
        #[arg(long, conflicts_with = "name")]
        file: Option<PathBuf>,
    },
    /// List saved projects
    List,
    /// Merge a proposal file ({nodes, edges}) into the graph
    Import { file: PathBuf },

    /// Print the whole graph
    Show,
    /// Node count, edge count and density
    Stats,
    /// Most connected characters
    Rank,
    /// A character and its direct neighbors
    Focus { id: String },

    /// Ask the extraction service for characters and relationships in a text
    Extract {
        /// Story text; use --file to read it from disk instead
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Use the built-in demo answer instead of calling a service
        #[arg(long)]
        mock: bool,
        /// Defaults to the NEXUS_API_KEY environment variable
        #[arg(long)]
        api_key: Option<String>,
        /// Merge the result right away instead of staging it for review
        #[arg(long)]
        yes: bool,
    },
    /// Show the staged extraction proposal
    Proposal,
    /// Merge the staged proposal into the graph
    Confirm,
    /// Drop the staged proposal
    Discard,

    /// Lay the graph out, restoring saved positions, and print the coordinates
    Layout,
    /// Re-frame the camera around the whole graph
    Fit,
    /// Forget saved positions and camera
    ResetView,
}

/// Executes commands against one session. Owns the tokio runtime used for extraction.
pub struct Runner {
    session: EditorSession,
    runtime: Runtime,
}

impl Runner {
    pub fn new(session: EditorSession) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to start async runtime")?;
        Ok(Self { session, runtime })
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    pub fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::AddNode {
                id,
                title,
                kind,
                group,
            } => {
                let node = Node::new(id.trim(), title)
                    .with_kind(kind)
                    .with_group(group);
                self.session.add_node(node)?;
                println!("Added character '{}'", id.trim());
            }
            Command::AddEdge {
                source,
                target,
                label,
            } => {
                self.session.add_edge(&source, &target, &label)?;
                println!("Added relationship '{source}' -> '{target}' ({label})");
            }
            Command::RemoveNode { id } => {
                self.session.remove_node(&id)?;
                println!("Deleted character '{id}'");
            }
            Command::RemoveEdge { source, target } => {
                self.session.remove_edge(&source, &target)?;
                println!("Deleted relationship '{source}' -> '{target}'");
            }
            Command::EditNode { id, title } => {
                self.session.update_node_title(&id, &title)?;
                println!("Updated '{id}'");
            }
            Command::EditEdge {
                source,
                target,
                label,
            } => {
                self.session.update_edge_label(&source, &target, &label)?;
                println!("Updated '{source}' -> '{target}'");
            }
            Command::Undo => {
                self.session.undo()?;
                println!("Undone");
            }
            Command::Redo => {
                self.session.redo()?;
                println!("Redone");
            }
            Command::Reset => {
                self.session.reset()?;
                println!("Graph reset");
            }

            Command::Save { name } => {
                let path = self.session.save_as(&name)?;
                println!("Saved to {}", path.display());
            }
            Command::Load { name, file } => {
                let loaded = match (name, file) {
                    (_, Some(path)) => self.session.load(&path)?,
                    (Some(name), None) => self.session.load_named(&name)?,
                    (None, None) => bail!("Give a project name or --file <path>"),
                };
                // Coordinates from the previous graph would not match the new one.
                self.layout()?.reset_view()?;
                println!(
                    "Loaded {}{}",
                    loaded.name().unwrap_or("project"),
                    loaded
                        .saved_at()
                        .map(|at| format!(" (saved {})", at.to_rfc3339()))
                        .unwrap_or_default()
                );
            }
            Command::List => {
                let projects = self.session.list_projects()?;
                if projects.is_empty() {
                    println!("No saved projects in {}", self.session.library().root().display());
                }
                for project in projects {
                    match project.modified {
                        Some(modified) => println!(
                            "{:<30} {}",
                            project.name,
                            modified.format("%Y-%m-%d %H:%M")
                        ),
                        None => println!("{}", project.name),
                    }
                }
            }
            Command::Import { file } => {
                let content = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let proposal: ExtractionProposal = serde_json::from_str(&content)
                    .with_context(|| format!("{} is not a valid proposal", file.display()))?;
                println!("{}", self.session.import_batch(&proposal));
            }

            Command::Show => print_graph(&self.session.snapshot()),
            Command::Stats => {
                let stats = self.session.stats();
                println!("Characters:    {}", stats.nodes);
                println!("Relationships: {}", stats.edges);
                println!("Density:       {:.3}", stats.density);
            }
            Command::Rank => {
                for (i, score) in self.session.rank().iter().enumerate() {
                    println!(
                        "{}. {} ({:.3}, in {}, out {})",
                        i + 1,
                        score.id,
                        score.score,
                        score.in_degree,
                        score.out_degree
                    );
                }
            }
            Command::Focus { id } => print_graph(&self.session.focus(&id)?),

            Command::Extract {
                text,
                file,
                mock,
                api_key,
                yes,
            } => {
                let text = match (text, file) {
                    (_, Some(path)) => std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                    (Some(text), None) => text,
                    (None, None) => String::new(),
                };
                let credentials = Credentials::new(
                    api_key
                        .or_else(|| std::env::var(API_KEY_ENV).ok())
                        .unwrap_or_default(),
                );
                self.extract(&text, &credentials, mock)?;
                if yes && self.session.pending_proposal().is_some() {
                    println!("{}", self.session.confirm_proposal()?);
                }
            }
            Command::Proposal => match self.session.pending_proposal() {
                Some(pending) => print_proposal(&pending.proposal),
                None => println!("No proposal waiting for review"),
            },
            Command::Confirm => println!("{}", self.session.confirm_proposal()?),
            Command::Discard => {
                if self.session.discard_proposal() {
                    println!("Proposal discarded");
                } else {
                    println!("No proposal waiting for review");
                }
            }

            Command::Layout => {
                let mut layout = self.layout()?;
                let placement = layout.reconcile(&self.session.snapshot())?;
                let steps = layout.run_to_rest()?;
                tracing::debug!(
                    "Layout: {} restored, {} placed, settled after {} steps",
                    placement.restored.len(),
                    placement.placed.len(),
                    steps
                );
                for (id, pos) in layout.positions() {
                    println!("{:<30} {:>9.1} {:>9.1}", id.as_str(), pos.x, pos.y);
                }
                let camera = layout.camera();
                println!(
                    "camera: scale {:.2} at ({:.1}, {:.1})",
                    camera.scale, camera.position.x, camera.position.y
                );
            }
            Command::Fit => {
                let mut layout = self.layout()?;
                layout.reconcile(&self.session.snapshot())?;
                let camera = layout.fit_view()?;
                println!(
                    "camera: scale {:.2} at ({:.1}, {:.1})",
                    camera.scale, camera.position.x, camera.position.y
                );
            }
            Command::ResetView => {
                self.layout()?.reset_view()?;
                println!("View reset");
            }
        }
        Ok(())
    }

    fn extract(&mut self, text: &str, credentials: &Credentials, mock: bool) -> Result<()> {
        let settings = self.session.settings().extraction.clone();
        let timeout = Duration::from_secs(settings.timeout_secs);
        let gateway: Box<dyn ExtractionGateway> = if mock {
            Box::new(StaticExtractionGateway::demo())
        } else {
            Box::new(OpenAiCompatibleGateway::new(settings)?)
        };

        let request_id = self.session.begin_extraction();
        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            self.runtime.spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        println!("Extracting... (Ctrl-C to cancel)");
        let outcome = self.runtime.block_on(run_extraction(
            gateway.as_ref(),
            text,
            credentials,
            timeout,
            &cancel,
        ));
        interrupt.abort();

        let cancelled = matches!(outcome, ExtractionOutcome::Cancelled);
        self.session.finish_extraction(request_id, outcome)?;
        if cancelled {
            println!("Extraction cancelled");
        } else if let Some(pending) = self.session.pending_proposal() {
            print_proposal(&pending.proposal);
            println!("Run `confirm` to merge or `discard` to drop it");
        }
        Ok(())
    }

    fn layout(&self) -> Result<LayoutSync<SqliteKvStore>> {
        let settings = self.session.settings();
        std::fs::create_dir_all(&settings.data_dir)
            .with_context(|| format!("Failed to create {}", settings.data_dir.display()))?;
        let store = SqliteKvStore::open(settings.view_state_path())?;
        Ok(LayoutSync::new(store, settings.layout.clone())
            .with_event_bus(self.session.events().clone()))
    }
}

fn print_graph(graph: &GraphData) {
    println!("Characters ({}):", graph.nodes.len());
    for node in &graph.nodes {
        if node.title.is_empty() {
            println!("  {}", node.id);
        } else {
            println!("  {} - {}", node.id, node.title);
        }
    }
    println!("Relationships ({}):", graph.edges.len());
    for edge in &graph.edges {
        println!("  {} -> {} [{}]", edge.source, edge.target, edge.label);
    }
}

fn print_proposal(proposal: &ExtractionProposal) {
    println!("Proposed characters ({}):", proposal.nodes.len());
    for node in &proposal.nodes {
        match &node.title {
            Some(title) => println!("  {} - {}", node.id, title),
            None => println!("  {}", node.id),
        }
    }
    println!("Proposed relationships ({}):", proposal.edges.len());
    for edge in &proposal.edges {
        println!("  {} -> {} [{}]", edge.source, edge.target, edge.label);
    }
}
