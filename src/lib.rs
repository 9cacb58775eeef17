pub mod clients;
pub mod config;
pub mod core;
pub mod document;
pub mod error;
pub mod ids;
pub mod interceptors;
pub mod persist;
pub mod pipeline;
pub mod quota;
pub mod schema;
pub mod server;
pub mod store;
pub mod url_check;

// Convenient re-exports
pub use crate::core::{LowLevelClient, QuizGenerator};
pub use error::{ErrorKind, PipelineError};
pub use pipeline::{GeneratedQuizSet, QuizSetCreated, Stage, Submission, SubmissionPipeline};
pub use url_check::{classify_url, UrlVerdict};
