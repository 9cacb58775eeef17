use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core::{LowLevelClient, ToolCall, ToolRequest};
use crate::error::AIError;

/// Scripted outcome of one model call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    ToolCalls(Vec<ToolCall>),
    Error(String),
}

/// Shared control surface for a [`MockClient`]: queue responses, inspect
/// what was asked.
#[derive(Debug, Default)]
pub struct MockHandle {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<ToolRequest>>,
}

impl MockHandle {
    pub fn add_response(&self, response: MockResponse) {
        self.responses.lock().unwrap_or_else(|e| e.into_inner()).push_back(response);
    }

    /// Queue a single successful call carrying `arguments`.
    pub fn add_arguments(&self, arguments: impl Into<String>) {
        self.add_response(MockResponse::ToolCalls(vec![ToolCall {
            name: crate::core::TOOL_NAME.to_string(),
            arguments: arguments.into(),
        }]));
    }

    pub fn requests(&self) -> Vec<ToolRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Mock client for testing. An empty queue behaves like a model that
/// declined to call the tool.
#[derive(Debug, Clone)]
pub struct MockClient {
    handle: Arc<MockHandle>,
}

impl MockClient {
    pub fn new() -> (Self, Arc<MockHandle>) {
        let handle = Arc::new(MockHandle::default());
        (Self { handle: handle.clone() }, handle)
    }
}

#[async_trait]
impl LowLevelClient for MockClient {
    async fn ask_with_tools(&self, request: ToolRequest) -> Result<Vec<ToolCall>, AIError> {
        self.handle.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request);
        let next = self.handle.responses.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(MockResponse::ToolCalls(calls)) => Ok(calls),
            Some(MockResponse::Error(message)) => Err(AIError::Mock(message)),
            None => Ok(Vec::new()),
        }
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}
