use crate::StorageError;
use crate::document::GraphDocument;
use nexus_core::{Attributes, GraphData};
use std::fs;
use std::path::{Path, PathBuf};

/// The single always-current copy of the live graph.
///
/// Writes go to a sibling temp file first and are renamed into place, so a crash
/// mid-write leaves the previous autosave intact.
#[derive(Debug, Clone)]
pub struct AutosaveSlot {
    path: PathBuf,
}

impl AutosaveSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn write(&self, graph: &GraphData) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = GraphDocument::from_graph(graph, Attributes::new()).to_json_pretty()?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!("Autosaved {} nodes to {:?}", graph.nodes.len(), self.path);
        Ok(())
    }

    /// `Ok(None)` when nothing has been autosaved yet.
    pub fn read(&self) -> Result<Option<GraphData>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let graph = GraphDocument::from_json(&raw)?.into_graph()?;
        Ok(Some(graph))
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
