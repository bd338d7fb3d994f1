use chrono::{DateTime, Local, Utc};
use nexus_core::{Attributes, GraphData, GraphError, GraphResult};
use nexus_graph::GraphStore;
use nexus_storage::GraphDocument;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

const PROJECT_EXTENSION: &str = "json";

/// A saved project found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified: Option<DateTime<Local>>,
}

/// A graph read back from a project file, with the graph-level attributes it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProject {
    pub graph: GraphData,
    pub attributes: Attributes,
}

impl LoadedProject {
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(|v| v.as_str())
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.attributes
            .get("saved_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Named save/load of whole graphs under one data directory.
#[derive(Debug, Clone)]
pub struct ProjectLibrary {
    root: PathBuf,
    excluded: Vec<String>,
}

impl ProjectLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded: Vec::new(),
        }
    }

    /// Hide a file (such as the autosave slot) from [`ProjectLibrary::list`].
    pub fn excluding(mut self, file_name: impl Into<String>) -> Self {
        self.excluded.push(file_name.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a project name maps to. Names that land on an excluded file are refused.
    pub fn path_for(&self, name: &str) -> GraphResult<PathBuf> {
        let file_name = format!("{}.{PROJECT_EXTENSION}", sanitize_name(name)?);
        if self
            .excluded
            .iter()
            .any(|x| x.eq_ignore_ascii_case(&file_name))
        {
            return Err(GraphError::invalid(format!(
                "project name '{}' is reserved",
                name.trim()
            )));
        }
        Ok(self.root.join(file_name))
    }

    /// Write `graph` as `<root>/<name>.json`, replacing any previous save of that name.
    pub fn save(&self, name: &str, graph: &GraphData) -> GraphResult<PathBuf> {
        let path = self.path_for(name)?;

        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), name.trim().into());
        attributes.insert("saved_at".to_string(), Utc::now().to_rfc3339().into());

        let json = GraphDocument::from_graph(graph, attributes)
            .to_json_pretty()
            .map_err(|e| GraphError::SaveFailed(e.to_string()))?;
        fs::create_dir_all(&self.root)
            .and_then(|()| fs::write(&path, json))
            .map_err(|e| GraphError::SaveFailed(format!("{}: {e}", path.display())))?;

        tracing::info!("Project saved to {:?}", path);
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> GraphResult<LoadedProject> {
        let file = fs::File::open(path)
            .map_err(|e| GraphError::LoadFailed(format!("{}: {e}", path.display())))?;
        let project = Self::load_reader(file)?;
        tracing::info!(
            "Loaded {} nodes and {} edges from {:?}",
            project.graph.nodes.len(),
            project.graph.edges.len(),
            path
        );
        Ok(project)
    }

    pub fn load_named(&self, name: &str) -> GraphResult<LoadedProject> {
        self.load(&self.path_for(name)?)
    }

    /// Parse and validate a project document. Nothing is applied anywhere; a failure
    /// leaves every caller's state as it was.
    pub fn load_reader<R: Read>(reader: R) -> GraphResult<LoadedProject> {
        let document =
            GraphDocument::from_reader(reader).map_err(|e| GraphError::LoadFailed(e.to_string()))?;
        let attributes = document.graph.clone();
        let graph = document
            .into_graph()
            .map_err(|e| GraphError::LoadFailed(e.to_string()))?;

        // Reject documents that break the graph rules before anyone adopts them.
        GraphStore::from_data(graph.clone()).map_err(|e| GraphError::LoadFailed(e.to_string()))?;

        Ok(LoadedProject { graph, attributes })
    }

    /// Saved projects, sorted by name. A missing directory lists as empty.
    pub fn list(&self) -> GraphResult<Vec<ProjectEntry>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GraphError::LoadFailed(e.to_string())),
        };

        let mut projects: Vec<ProjectEntry> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(PROJECT_EXTENSION))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_none_or(|n| !self.excluded.iter().any(|x| x == n))
            })
            .filter_map(|path| {
                let name = path.file_stem()?.to_str()?.to_string();
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Local>::from);
                Some(ProjectEntry {
                    name,
                    path,
                    modified,
                })
            })
            .collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }
}

/// Project names become file stems: trimmed, separators and reserved characters
/// replaced, and a trailing `.json` dropped.
fn sanitize_name(name: &str) -> GraphResult<String> {
    let trimmed = name.trim();
    let trimmed = trimmed.strip_suffix(".json").unwrap_or(trimmed);
    let cleaned: String = trimmed
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.trim().is_empty() {
        return Err(GraphError::invalid("project name must not be empty"));
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use nexus_core::{Edge, Node};
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let library = ProjectLibrary::new(dir.path().join("data"));

        let mut graph = GraphData::seed();
        let mut node = Node::new("Luna Lovegood", "Ravenclaw").with_group(4);
        node.extra
            .insert("patronus".to_string(), serde_json::json!("hare"));
        graph.nodes.push(node);
        graph
            .edges
            .push(Edge::new("Luna Lovegood", "Harry Potter", "friend"));

        let path = library.save("hogwarts", &graph)?;
        assert_eq!(path, dir.path().join("data").join("hogwarts.json"));

        let loaded = library.load(&path)?;
        assert_eq!(loaded.graph, graph);
        assert_eq!(loaded.name(), Some("hogwarts"));
        assert!(loaded.saved_at().is_some());
        Ok(())
    }

    #[test]
    fn test_load_failures_are_typed() -> Result<()> {
        let dir = tempdir()?;
        let library = ProjectLibrary::new(dir.path());

        let missing = library.load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(GraphError::LoadFailed(_))));

        let cases = [
            "not json at all",
            r#"{"nodes": [{"id": "A"}], "edges": [{"source": "A", "target": "B"}]}"#,
            r#"{"directed": false, "nodes": [], "edges": []}"#,
            r#"{"nodes": [{"id": "A"}, {"id": "A"}], "edges": []}"#,
        ];
        for raw in cases {
            let result = ProjectLibrary::load_reader(raw.as_bytes());
            assert!(
                matches!(result, Err(GraphError::LoadFailed(_))),
                "expected LoadFailed for {raw}"
            );
        }
        Ok(())
    }

    #[test]
    fn test_save_into_unwritable_location_fails() -> Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x")?;
        let library = ProjectLibrary::new(blocker.join("data"));
        let result = library.save("p", &GraphData::seed());
        assert!(matches!(result, Err(GraphError::SaveFailed(_))));
        Ok(())
    }

    #[test]
    fn test_list_skips_excluded_and_foreign_files() -> Result<()> {
        let dir = tempdir()?;
        let library = ProjectLibrary::new(dir.path()).excluding("autosave.json");
        library.save("zeta", &GraphData::seed())?;
        library.save("alpha", &GraphData::seed())?;
        fs::write(dir.path().join("autosave.json"), "{}")?;
        fs::write(dir.path().join("notes.txt"), "hi")?;

        let names: Vec<String> = library.list()?.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        let empty = ProjectLibrary::new(dir.path().join("missing"));
        assert!(empty.list()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_reserved_name_cannot_replace_autosave() -> Result<()> {
        let dir = tempdir()?;
        let library = ProjectLibrary::new(dir.path()).excluding("autosave.json");
        let autosave = dir.path().join("autosave.json");
        fs::write(&autosave, "{}")?;

        for name in ["autosave", "autosave.json", " AutoSave "] {
            assert!(
                matches!(
                    library.save(name, &GraphData::seed()),
                    Err(GraphError::ValidationFailed(_))
                ),
                "expected {name:?} to be refused"
            );
        }
        assert_eq!(fs::read_to_string(&autosave)?, "{}");
        assert!(matches!(
            library.load_named("autosave"),
            Err(GraphError::ValidationFailed(_))
        ));
        assert!(library.save("autosave-copy", &GraphData::seed()).is_ok());
        Ok(())
    }

    #[test]
    fn test_names_are_sanitized() {
        assert_eq!(sanitize_name(" my/project.json ").unwrap(), "my_project");
        assert_eq!(sanitize_name("..\\evil").unwrap(), "_evil");
        assert!(matches!(
            sanitize_name("   "),
            Err(GraphError::ValidationFailed(_))
        ));
    }
}
