use async_trait::async_trait;
use std::fmt::Debug;

use crate::core::ChatMessage;

/// One quiz-tool round trip as the generator saw it.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    /// Name of the tool that was offered.
    pub tool: &'a str,
    pub messages: &'a [ChatMessage],
    pub outcome: Outcome<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<'a> {
    /// The model made `calls` tool calls; `arguments` are the first call's.
    Arguments { calls: usize, arguments: &'a str },
    NoToolCall,
    ProviderError(&'a str),
}

impl Outcome<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Arguments { .. } => "arguments",
            Self::NoToolCall => "no-tool-call",
            Self::ProviderError(_) => "provider-error",
        }
    }
}

/// Observer of model exchanges. Failures are logged by the caller and never
/// abort a generation.
#[async_trait]
pub trait Interceptor: Send + Sync + Debug {
    async fn save(&self, exchange: &Exchange<'_>) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub mod file;
pub use file::FileInterceptor;
