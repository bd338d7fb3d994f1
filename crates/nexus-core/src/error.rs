use crate::NodeId;
use thiserror::Error;

/// Every business-level failure the editor can report. None of these are fatal;
/// callers surface the message and keep the previous state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    ValidationFailed(String),
    #[error("Save failed: {0}")]
    SaveFailed(String),
    #[error("Load failed: {0}")]
    LoadFailed(String),
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("Nothing to undo")]
    AtOldest,
    #[error("Nothing to redo")]
    AtNewest,
}

pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    pub fn node_exists(id: &NodeId) -> Self {
        Self::AlreadyExists(format!("Character '{id}'"))
    }

    pub fn node_not_found(id: &str) -> Self {
        Self::NotFound(format!("Character '{id}'"))
    }

    pub fn edge_exists(source: &str, target: &str) -> Self {
        Self::AlreadyExists(format!("Relationship '{source}' -> '{target}'"))
    }

    pub fn edge_not_found(source: &str, target: &str) -> Self {
        Self::NotFound(format!("Relationship '{source}' -> '{target}'"))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Stable short code, handy for logs and machine-readable output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "already_exists",
            Self::NotFound(_) => "not_found",
            Self::ValidationFailed(_) => "validation_failed",
            Self::SaveFailed(_) => "save_failed",
            Self::LoadFailed(_) => "load_failed",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::AtOldest => "at_oldest",
            Self::AtNewest => "at_newest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_entity() {
        let err = GraphError::node_exists(&NodeId::from("Harry"));
        assert_eq!(err.to_string(), "Character 'Harry' already exists");

        let err = GraphError::edge_not_found("A", "B");
        assert_eq!(err.to_string(), "Relationship 'A' -> 'B' not found");
        assert_eq!(err.code(), "not_found");
    }
}
