use crate::settings::ExtractionSettings;
use async_trait::async_trait;
use nexus_core::{EdgeProposal, ExtractionProposal, GraphError, GraphResult, NodeProposal};
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SYSTEM_PROMPT: &str = "You extract characters and their relationships from story text. \
Reply with a single JSON object of the form \
{\"nodes\":[{\"id\":\"<character name>\",\"title\":\"<short description>\"}],\
\"edges\":[{\"source\":\"<character name>\",\"target\":\"<character name>\",\"label\":\"<relationship>\"}]}. \
Use each character's name as its id and reuse the same id everywhere. \
Return empty lists when the text mentions no characters.";

/// API key for the extraction service. The vendor is picked from its prefix.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_empty()
    }

    pub fn vendor(&self) -> Vendor {
        if self.api_key.starts_with("gsk_") {
            Vendor::Groq
        } else {
            Vendor::OpenAi
        }
    }

    fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("vendor", &self.vendor())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    OpenAi,
    Groq,
}

/// Text to graph-delta service. Implementations never touch the graph.
#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    async fn extract(&self, text: &str, credentials: &Credentials)
    -> GraphResult<ExtractionProposal>;
}

/// Chat-completions client for OpenAI and Groq.
pub struct OpenAiCompatibleGateway {
    client: reqwest::Client,
    settings: ExtractionSettings,
}

impl OpenAiCompatibleGateway {
    pub fn new(settings: ExtractionSettings) -> GraphResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| GraphError::ExtractionFailed(format!("HTTP client setup: {e}")))?;
        Ok(Self { client, settings })
    }

    fn endpoint_and_model(&self, vendor: Vendor) -> (&str, &str) {
        let (endpoint, default_model) = match vendor {
            Vendor::Groq => (&self.settings.groq_endpoint, &self.settings.groq_model),
            Vendor::OpenAi => (&self.settings.openai_endpoint, &self.settings.openai_model),
        };
        let model = self.settings.model.as_deref().unwrap_or(default_model);
        (endpoint, model)
    }
}

#[async_trait]
impl ExtractionGateway for OpenAiCompatibleGateway {
    async fn extract(
        &self,
        text: &str,
        credentials: &Credentials,
    ) -> GraphResult<ExtractionProposal> {
        if credentials.is_empty() {
            return Err(GraphError::invalid("an API key is required for extraction"));
        }
        let vendor = credentials.vendor();
        let (endpoint, model) = self.endpoint_and_model(vendor);
        tracing::info!("Requesting extraction from {:?} using {}", vendor, model);

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(credentials.api_key())
            .json(&request_body(model, self.settings.temperature, text))
            .send()
            .await
            .map_err(|e| GraphError::ExtractionFailed(format!("request to {vendor:?} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(GraphError::ExtractionFailed(format!(
                "{vendor:?} returned HTTP {}: {snippet}",
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| GraphError::ExtractionFailed(format!("unreadable response: {e}")))?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GraphError::ExtractionFailed("response has no message content".to_string())
            })?;
        parse_proposal(content)
    }
}

pub(crate) fn request_body(model: &str, temperature: f32, text: &str) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "response_format": {"type": "json_object"},
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": text},
        ],
    })
}

/// Parse the model's reply. Code fences around the JSON are tolerated.
pub fn parse_proposal(content: &str) -> GraphResult<ExtractionProposal> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
        .map_err(|e| GraphError::ExtractionFailed(format!("model returned malformed JSON: {e}")))
}

/// Returns a fixed answer, optionally after a delay. Used for demos and tests.
pub struct StaticExtractionGateway {
    result: GraphResult<ExtractionProposal>,
    delay: Duration,
}

impl StaticExtractionGateway {
    pub fn new(proposal: ExtractionProposal) -> Self {
        Self {
            result: Ok(proposal),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(error: GraphError) -> Self {
        Self {
            result: Err(error),
            delay: Duration::ZERO,
        }
    }

    /// A small Hogwarts cast that links back into the seed graph.
    pub fn demo() -> Self {
        Self::new(ExtractionProposal {
            nodes: vec![
                NodeProposal::new("Draco Malfoy").with_title("Slytherin student"),
                NodeProposal::new("Severus Snape").with_title("Potions professor"),
            ],
            edges: vec![
                EdgeProposal::new("Severus Snape", "Draco Malfoy", "favours"),
                EdgeProposal::new("Draco Malfoy", "Harry Potter", "arch-rival"),
            ],
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ExtractionGateway for StaticExtractionGateway {
    async fn extract(
        &self,
        _text: &str,
        _credentials: &Credentials,
    ) -> GraphResult<ExtractionProposal> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Found(ExtractionProposal),
    /// The service answered but proposed nothing.
    NothingFound,
    Failed(GraphError),
    Cancelled,
    TimedOut(Duration),
}

/// Run one extraction with a timeout, abandoning it if `cancel` fires first.
pub async fn run_extraction(
    gateway: &dyn ExtractionGateway,
    text: &str,
    credentials: &Credentials,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ExtractionOutcome {
    if text.trim().is_empty() {
        return ExtractionOutcome::Failed(GraphError::invalid("paste some story text first"));
    }

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("Extraction cancelled");
            ExtractionOutcome::Cancelled
        }
        result = tokio::time::timeout(timeout, gateway.extract(text, credentials)) => match result {
            Err(_) => {
                tracing::warn!("Extraction timed out after {:?}", timeout);
                ExtractionOutcome::TimedOut(timeout)
            }
            Ok(Ok(proposal)) if proposal.is_empty() => ExtractionOutcome::NothingFound,
            Ok(Ok(proposal)) => ExtractionOutcome::Found(proposal),
            Ok(Err(err)) => {
                tracing::warn!("Extraction failed: {}", err);
                ExtractionOutcome::Failed(err)
            }
        },
    }
}
