use nexus_graph::LayoutConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "nexus-graph";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Where named projects and the autosave slot live.
    pub data_dir: PathBuf,
    pub autosave_file: String,
    pub view_state_file: String,
    pub history_limit: usize,
    pub centrality_top_k: usize,
    pub extraction: ExtractionSettings,
    pub layout: LayoutConfig,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            autosave_file: "autosave.json".to_string(),
            view_state_file: "view_state.db".to_string(),
            history_limit: 100,
            centrality_top_k: nexus_graph::DEFAULT_TOP_K,
            extraction: ExtractionSettings::default(),
            layout: LayoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub openai_endpoint: String,
    pub openai_model: String,
    pub groq_endpoint: String,
    pub groq_model: String,
    /// Overrides the vendor default model when set.
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            openai_endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            groq_endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            groq_model: "llama-3.3-70b-versatile".to_string(),
            model: None,
            timeout_secs: 60,
            temperature: 0.0,
        }
    }
}

impl EditorSettings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Settings from the user config directory, or defaults.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::info!("No config directory available, using default settings");
                Self::default()
            }
        }
    }

    /// Settings from `path`. Missing or unreadable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        tracing::info!("Loading settings from {:?}", path);
        if !path.exists() {
            tracing::info!("Settings file not found, using defaults");
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("Settings loaded successfully");
                    settings
                }
                Err(e) => {
                    tracing::error!("Failed to parse settings: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!("Failed to read settings file: {}", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }

    pub fn autosave_path(&self) -> PathBuf {
        self.data_dir.join(&self.autosave_file)
    }

    pub fn view_state_path(&self) -> PathBuf {
        self.data_dir.join(&self.view_state_file)
    }
}
