use serde::Serialize;
use thiserror::Error;

/// Failure of a single submission. Every stage of the pipeline maps onto
/// exactly one of these variants.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("URL is not syntactically valid")]
    InvalidUrl,
    #[error("URL does not use the https scheme")]
    InsecureUrl,
    #[error("Quota exceeded: {count} quiz sets exist, ceiling is {ceiling}")]
    QuotaExceeded { count: u64, ceiling: u64 },
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    /// The detached run panicked or was aborted; what it wrote is unknown.
    #[error("Submission task ended abnormally: {0}")]
    Interrupted(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl => ErrorKind::InvalidUrl,
            Self::InsecureUrl => ErrorKind::InsecureUrl,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::Fetch(_) => ErrorKind::FetchError,
            Self::Generation(_) => ErrorKind::GenerationError,
            Self::Persistence(_) | Self::Interrupted(_) => ErrorKind::PersistenceError,
        }
    }
}

/// The discriminant that crosses the caller boundary. Internal detail
/// (provider messages, SQL errors) stays on this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidUrl,
    InsecureUrl,
    QuotaExceeded,
    FetchError,
    GenerationError,
    PersistenceError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid-url",
            Self::InsecureUrl => "insecure-url",
            Self::QuotaExceeded => "quota-exceeded",
            Self::FetchError => "fetch-error",
            Self::GenerationError => "generation-error",
            Self::PersistenceError => "persistence-error",
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "The URL is not valid.",
            Self::InsecureUrl => "Only https URLs are accepted.",
            Self::QuotaExceeded => "The quiz limit has been reached. Please try again later.",
            Self::FetchError => "The document could not be fetched. Please try again later.",
            Self::GenerationError => "The quiz could not be generated. Please try again later.",
            Self::PersistenceError => "The quiz could not be saved. Please try again later.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP transport error: {0}")]
    Transport(String),
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Model provider error: {0}")]
    Provider(#[from] AIError),
    #[error("Model response contained no tool call")]
    NoToolCall,
    #[error("Tool arguments are not valid JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),
    #[error("Tool arguments do not match the quiz schema: {0}")]
    SchemaViolation(String),
}

#[derive(Error, Debug)]
pub enum AIError {
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Mock error: {0}")]
    Mock(String),
}

#[derive(Error, Debug)]
pub enum OpenAIError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limit exceeded")]
    RateLimit,
    #[error("Authentication failed")]
    Authentication,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Injected failure at stage {0}")]
    Injected(&'static str),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_render_as_kebab_case() {
        let err = PipelineError::QuotaExceeded { count: 3, ceiling: 3 };
        assert_eq!(err.kind().as_str(), "quota-exceeded");
        assert_eq!(
            serde_json::to_value(ErrorKind::GenerationError).unwrap(),
            serde_json::json!("generation-error")
        );
    }

    #[test]
    fn public_message_hides_provider_detail() {
        let err = PipelineError::from(GenerationError::Provider(AIError::OpenAI(
            OpenAIError::Api("secret upstream body".into()),
        )));
        assert_eq!(err.kind(), ErrorKind::GenerationError);
        assert!(!err.kind().public_message().contains("secret"));
    }
}
