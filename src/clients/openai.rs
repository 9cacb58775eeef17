pub mod models;

use crate::config::KeyFromEnv;
use crate::core::{ChatMessage, LowLevelClient, ToolCall, ToolChoice, ToolRequest};
use crate::error::{AIError, OpenAIError};
use async_trait::async_trait;
pub use models::OpenAIModel;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    tools: Vec<ToolEnvelope<'a>>,
    tool_choice: ToolChoice,
}

#[derive(Debug, Serialize)]
struct ToolEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDef<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: OpenAIModel,
    /// Root of an OpenAI-compatible API, without the trailing
    /// `/chat/completions`.
    pub base_url: String,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: OpenAIClient::find_key().unwrap_or_default(),
            model: OpenAIModel::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpenAIClient {
    config: OpenAIConfig,
    http: Client,
}

impl KeyFromEnv for OpenAIClient {
    const KEY_NAME: &'static str = "OPENAI_API_KEY";
}

impl OpenAIClient {
    pub fn new(config: OpenAIConfig) -> Self {
        info!(model = %config.model.id(), base_url = %config.base_url, "Creating new OpenAI client");
        Self { config, http: Client::new() }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body<'a>(&'a self, request: &'a ToolRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: self.config.model.id(),
            messages: &request.messages,
            tools: request
                .tools
                .iter()
                .map(|t| ToolEnvelope {
                    kind: "function",
                    function: FunctionDef {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect(),
            tool_choice: request.tool_choice,
        }
    }
}

#[async_trait]
impl LowLevelClient for OpenAIClient {
    #[instrument(skip(self, request), fields(model = %self.config.model.id(), messages = request.messages.len()))]
    async fn ask_with_tools(&self, request: ToolRequest) -> Result<Vec<ToolCall>, AIError> {
        let body = self.request_body(&request);

        debug!("Sending request to chat completions API");
        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                AIError::OpenAI(OpenAIError::Http(e.to_string()))
            })?;

        debug!(status = %resp.status(), "Received response from chat completions API");

        if resp.status() == 401 {
            error!("OpenAI API authentication failed");
            return Err(AIError::OpenAI(OpenAIError::Authentication));
        }
        if resp.status() == 429 {
            warn!("OpenAI API rate limit exceeded");
            return Err(AIError::OpenAI(OpenAIError::RateLimit));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %txt, "OpenAI API error");
            return Err(AIError::OpenAI(OpenAIError::Api(txt)));
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse chat completion JSON");
            AIError::OpenAI(OpenAIError::Http(e.to_string()))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AIError::OpenAI(OpenAIError::Api("No choices".into())))?;

        let calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall { name: c.function.name, arguments: c.function.arguments })
            .collect();

        info!(tool_calls = calls.len(), "Received chat completion");
        Ok(calls)
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}
