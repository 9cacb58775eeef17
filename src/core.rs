//! Core generation API: wraps a low-level model client with the quiz tool
//! contract.
//!
//! - `LowLevelClient` is the provider seam: one structured chat request in,
//!   zero or more tool calls out.
//! - `QuizGenerator` builds the fixed two-message conversation and the
//!   `generate_five_quizzes` tool, makes exactly one call, and hands back the
//!   raw tool arguments for validation.

use crate::error::{AIError, GenerationError};
use crate::interceptors::{Exchange, Interceptor, Outcome};
use crate::schema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const TOOL_NAME: &str = "generate_five_quizzes";

const SYSTEM_PROMPT: &str = "You are a helpful assistant to generate quizzes in JSON format. \
Summarize the text presented by the user and make five 4-option quizzes based on it. \
Please provide an explanation of the correct answer as a supplement to each quiz.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A function the model may call, described by a JSON Schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
}

/// One structured-output request: a conversation plus the tools on offer.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
}

/// A tool invocation as returned by the provider. `arguments` is the raw
/// JSON-encoded string, untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: String,
}

/// Low-level model client abstraction.
///
/// Implementors execute a single structured chat request and return
/// whatever tool calls the model made (possibly none). Validation of the
/// arguments is not their concern.
#[async_trait]
pub trait LowLevelClient: Send + Sync + Debug {
    async fn ask_with_tools(&self, request: ToolRequest) -> Result<Vec<ToolCall>, AIError>;

    /// Clone this client into a boxed trait object
    fn clone_box(&self) -> Box<dyn LowLevelClient>;
}

impl Clone for Box<dyn LowLevelClient> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[async_trait]
impl LowLevelClient for Box<dyn LowLevelClient> {
    async fn ask_with_tools(&self, request: ToolRequest) -> Result<Vec<ToolCall>, AIError> {
        self.as_ref().ask_with_tools(request).await
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        self.as_ref().clone_box()
    }
}

/// Builds quiz requests and runs them against a client, once.
///
/// There is no retry: each user-triggered submission costs at most one
/// model call.
#[derive(Clone)]
pub struct QuizGenerator<C: LowLevelClient> {
    client: C,
    interceptor: Option<Arc<dyn Interceptor>>,
}

impl<C: LowLevelClient> Debug for QuizGenerator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizGenerator")
            .field("client", &self.client)
            .field("interceptor", &self.interceptor.is_some())
            .finish()
    }
}

impl<C: LowLevelClient> QuizGenerator<C> {
    pub fn new(client: C) -> Self {
        info!("Creating new QuizGenerator");
        Self { client, interceptor: None }
    }

    /// Record every exchange through `interceptor`.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// The two-message conversation and the single quiz tool for `corpus`.
    /// The corpus is embedded verbatim; nothing is truncated.
    pub fn build_request(corpus: &str) -> ToolRequest {
        let user = format!(
            "Please make five 4-option quizzes from the following text:\n\"\"\"\n{}\n\"\"\"\n",
            corpus
        );

        ToolRequest {
            messages: vec![
                ChatMessage { role: Role::System, content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: Role::User, content: user },
            ],
            tools: vec![ToolSpec {
                name: TOOL_NAME.to_string(),
                description: "Generate five 4-option quizzes from the given text".to_string(),
                parameters: schema::tool_parameters(),
            }],
            tool_choice: ToolChoice::Auto,
        }
    }

    /// Ask the model for quizzes and return the raw arguments of its first
    /// tool call.
    #[instrument(target = "doc_quiz::generator", skip(self, corpus), fields(corpus_len = corpus.len()))]
    pub async fn generate_raw(&self, corpus: &str) -> Result<String, GenerationError> {
        let request = Self::build_request(corpus);
        debug!(tools = request.tools.len(), "Sending quiz tool request");

        let calls = match self.client.ask_with_tools(request.clone()).await {
            Ok(calls) => calls,
            Err(e) => {
                warn!(error = %e, "Model call failed");
                let message = e.to_string();
                self.record(&request, Outcome::ProviderError(&message)).await;
                return Err(GenerationError::Provider(e));
            }
        };

        let count = calls.len();
        info!(tool_calls = count, "Model responded");
        if count > 1 {
            debug!(extra = count - 1, "Ignoring additional tool calls");
        }

        let Some(call) = calls.into_iter().next() else {
            warn!("Model response contained no tool call");
            self.record(&request, Outcome::NoToolCall).await;
            return Err(GenerationError::NoToolCall);
        };

        if call.name != TOOL_NAME {
            debug!(name = %call.name, "Tool call name differs from offered tool");
        }
        self.record(&request, Outcome::Arguments { calls: count, arguments: &call.arguments }).await;
        Ok(call.arguments)
    }

    async fn record(&self, request: &ToolRequest, outcome: Outcome<'_>) {
        let Some(interceptor) = &self.interceptor else { return };
        let exchange = Exchange { tool: TOOL_NAME, messages: &request.messages, outcome };
        if let Err(e) = interceptor.save(&exchange).await {
            warn!(error = %e, "Interceptor failed to save exchange");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::{MockClient, MockResponse};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Interceptor for Recorder {
        async fn save(&self, exchange: &Exchange<'_>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let entry = match exchange.outcome {
                Outcome::Arguments { calls, arguments } => format!("{} {} {}", exchange.tool, calls, arguments),
                other => format!("{} {}", exchange.tool, other.label()),
            };
            self.seen.lock().unwrap().push(entry);
            Ok(())
        }
    }

    #[test]
    fn test_request_shape() {
        let request = QuizGenerator::<MockClient>::build_request("Hooks let you use state.");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("five 4-option quizzes"));
        assert_eq!(
            request.messages[1].content,
            "Please make five 4-option quizzes from the following text:\n\"\"\"\nHooks let you use state.\n\"\"\"\n"
        );
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].name, TOOL_NAME);
        assert_eq!(request.tool_choice, ToolChoice::Auto);
    }

    #[tokio::test]
    async fn test_returns_first_tool_arguments_unparsed() {
        let (client, handle) = MockClient::new();
        handle.add_response(MockResponse::ToolCalls(vec![
            ToolCall { name: TOOL_NAME.into(), arguments: "{not json".into() },
            ToolCall { name: TOOL_NAME.into(), arguments: "{}".into() },
        ]));
        let generator = QuizGenerator::new(client);

        let raw = generator.generate_raw("text").await.unwrap();
        assert_eq!(raw, "{not json");
        assert_eq!(handle.call_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_tool_calls_is_generation_error() {
        let (client, handle) = MockClient::new();
        handle.add_response(MockResponse::ToolCalls(vec![]));
        let generator = QuizGenerator::new(client);

        let err = generator.generate_raw("text").await.unwrap_err();
        assert!(matches!(err, GenerationError::NoToolCall));
        assert_eq!(handle.call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_is_not_retried() {
        let (client, handle) = MockClient::new();
        handle.add_response(MockResponse::Error("upstream down".into()));
        handle.add_response(MockResponse::ToolCalls(vec![]));
        let generator = QuizGenerator::new(client);

        let err = generator.generate_raw("text").await.unwrap_err();
        assert!(matches!(err, GenerationError::Provider(AIError::Mock(_))));
        assert_eq!(handle.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_corpus_still_calls_model() {
        let (client, handle) = MockClient::new();
        handle.add_response(MockResponse::ToolCalls(vec![]));
        let generator = QuizGenerator::new(client);

        let _ = generator.generate_raw("").await;
        let seen = handle.requests();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].messages[1].content.contains("\"\"\"\n\n\"\"\""));
    }

    #[tokio::test]
    async fn test_interceptor_sees_each_outcome() {
        let (client, handle) = MockClient::new();
        handle.add_response(MockResponse::ToolCalls(vec![
            ToolCall { name: TOOL_NAME.into(), arguments: "{}".into() },
            ToolCall { name: TOOL_NAME.into(), arguments: "[]".into() },
        ]));
        handle.add_response(MockResponse::ToolCalls(vec![]));
        handle.add_response(MockResponse::Error("down".into()));
        let recorder = Arc::new(Recorder::default());
        let generator = QuizGenerator::new(client).with_interceptor(recorder.clone());

        let _ = generator.generate_raw("a").await;
        let _ = generator.generate_raw("b").await;
        let _ = generator.generate_raw("c").await;

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "generate_five_quizzes 2 {}".to_string(),
                "generate_five_quizzes no-tool-call".to_string(),
                "generate_five_quizzes provider-error".to_string(),
            ]
        );
    }
}
