use super::{Exchange, Interceptor, Outcome};
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Write as _;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Writes each quiz exchange to `{base_path}/quiz_{timestamp}_{outcome}.md`.
#[derive(Debug)]
pub struct FileInterceptor {
    base_path: PathBuf,
}

impl FileInterceptor {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }
}

/// Markdown transcript: a summary header, the conversation, then either the
/// pretty-printed tool arguments or what went wrong.
pub fn render(exchange: &Exchange<'_>) -> String {
    let mut out = String::from("# Quiz exchange\n\n");
    let _ = writeln!(out, "- tool: `{}`", exchange.tool);
    let _ = writeln!(out, "- outcome: {}", exchange.outcome.label());
    if let Outcome::Arguments { calls, .. } = exchange.outcome {
        let _ = writeln!(out, "- tool calls: {}", calls);
    }

    for message in exchange.messages {
        let _ = write!(out, "\n## {:?}\n\n{}\n", message.role, message.content);
    }

    match exchange.outcome {
        Outcome::Arguments { arguments, .. } => {
            // Unparseable arguments are kept as sent.
            let shown = serde_json::from_str::<serde_json::Value>(arguments)
                .and_then(|v| serde_json::to_string_pretty(&v))
                .unwrap_or_else(|_| arguments.to_string());
            let _ = write!(out, "\n# Tool arguments\n\n```json\n{}\n```\n", shown);
        }
        Outcome::NoToolCall => out.push_str("\n# Result\n\nThe model did not call the tool.\n"),
        Outcome::ProviderError(message) => {
            let _ = write!(out, "\n# Result\n\nProvider error: {}\n", message);
        }
    }
    out
}

#[async_trait]
impl Interceptor for FileInterceptor {
    async fn save(&self, exchange: &Exchange<'_>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filename = format!(
            "quiz_{}_{}.md",
            Utc::now().format("%Y%m%d_%H%M%S_%6f"),
            exchange.outcome.label()
        );
        let file_path = self.base_path.join(filename);

        fs::create_dir_all(&self.base_path).await?;
        fs::write(&file_path, render(exchange)).await?;
        debug!(path = %file_path.display(), "Wrote quiz transcript");
        Ok(())
    }
}
