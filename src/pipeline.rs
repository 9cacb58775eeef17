//! Submission pipeline: one caller-initiated run from URL to stored quiz set.
//!
//! ```text
//! validating -> quota-checking -> fetching -> generating
//!            -> validating-result -> persisting -> done
//! ```
//! Any stage may end the run in `failed(kind)`. Nothing is retried, and a
//! started run cannot be cancelled: it executes on its own task, so a caller
//! that drops the returned future only stops waiting.

use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, instrument, warn};

use crate::core::{LowLevelClient, QuizGenerator};
use crate::document::{fetch_document, DocumentSource};
use crate::error::{ErrorKind, PipelineError};
use crate::persist::persist_quiz_set;
use crate::quota::QuotaPolicy;
use crate::schema::{validate_payload, GeneratedQuiz};
use crate::store::QuizStore;
use crate::url_check::classify_url;

/// Inbound request: the document URL and, if known, who asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub url: String,
    pub owner: Option<String>,
}

impl Submission {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), owner: None }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "stage", content = "reason")]
pub enum Stage {
    Validating,
    QuotaChecking,
    Fetching,
    Generating,
    ValidatingResult,
    Persisting,
    Done,
    Failed(ErrorKind),
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => f.write_str("validating"),
            Self::QuotaChecking => f.write_str("quota-checking"),
            Self::Fetching => f.write_str("fetching"),
            Self::Generating => f.write_str("generating"),
            Self::ValidatingResult => f.write_str("validating-result"),
            Self::Persisting => f.write_str("persisting"),
            Self::Done => f.write_str("done"),
            Self::Failed(kind) => write!(f, "failed({})", kind),
        }
    }
}

/// Buffering-mode result: the stored identity plus the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuizSet {
    pub quiz_set_id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub quizzes: Vec<GeneratedQuiz>,
}

/// Streaming-mode event, emitted once on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSetCreated {
    pub quiz_set_id: String,
    pub title: String,
}

impl From<&GeneratedQuizSet> for QuizSetCreated {
    fn from(set: &GeneratedQuizSet) -> Self {
        Self { quiz_set_id: set.quiz_set_id.clone(), title: set.title.clone() }
    }
}

#[derive(Clone)]
struct Progress {
    observer: Option<UnboundedSender<Stage>>,
}

impl Progress {
    fn enter(&self, stage: Stage) {
        debug!(target: "doc_quiz::pipeline", %stage, "Entering stage");
        if let Some(tx) = &self.observer {
            // A caller that stopped listening does not stop the run.
            let _ = tx.send(stage);
        }
    }
}

/// Orchestrates one submission. All collaborators are explicit handles so
/// tests can swap in fakes.
pub struct SubmissionPipeline<C: LowLevelClient> {
    generator: QuizGenerator<C>,
    documents: Arc<dyn DocumentSource>,
    store: Arc<dyn QuizStore>,
    quota: QuotaPolicy,
}

impl<C: LowLevelClient + Clone> Clone for SubmissionPipeline<C> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            documents: self.documents.clone(),
            store: self.store.clone(),
            quota: self.quota,
        }
    }
}

impl<C: LowLevelClient> fmt::Debug for SubmissionPipeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionPipeline")
            .field("generator", &self.generator)
            .field("documents", &self.documents)
            .field("store", &self.store)
            .field("quota", &self.quota)
            .finish()
    }
}

impl<C: LowLevelClient> SubmissionPipeline<C> {
    pub fn new(
        generator: QuizGenerator<C>,
        documents: Arc<dyn DocumentSource>,
        store: Arc<dyn QuizStore>,
        quota: QuotaPolicy,
    ) -> Self {
        info!(ceiling = quota.ceiling, scope = ?quota.scope, "Creating submission pipeline");
        Self { generator, documents, store, quota }
    }

    pub fn store(&self) -> &Arc<dyn QuizStore> {
        &self.store
    }
}

impl<C: LowLevelClient + Clone + 'static> SubmissionPipeline<C> {
    /// Buffering mode: run to completion and return the full quiz set.
    pub async fn run(&self, submission: Submission) -> Result<GeneratedQuizSet, PipelineError> {
        self.detach(submission, Progress { observer: None }).await
    }

    /// As [`run`](Self::run), reporting every stage transition to `observer`.
    pub async fn run_with_progress(
        &self,
        submission: Submission,
        observer: UnboundedSender<Stage>,
    ) -> Result<GeneratedQuizSet, PipelineError> {
        self.detach(submission, Progress { observer: Some(observer) }).await
    }

    /// Streaming mode: a stream that yields a single [`QuizSetCreated`] on
    /// success and ends without yielding anything on failure.
    pub fn run_streaming(&self, submission: Submission) -> impl Stream<Item = QuizSetCreated> + Send + 'static {
        let pipeline = self.clone();
        async_stream::stream! {
            match pipeline.run(submission).await {
                Ok(set) => {
                    yield QuizSetCreated::from(&set);
                }
                Err(e) => {
                    debug!(target: "doc_quiz::pipeline", kind = %e.kind(), "Closing stream without event");
                }
            }
        }
    }

    /// Spawn the run on its own task and wait for it.
    async fn detach(&self, submission: Submission, progress: Progress) -> Result<GeneratedQuizSet, PipelineError> {
        let pipeline = self.clone();
        let fallback = progress.clone();
        let task = tokio::spawn(async move { pipeline.execute(submission, progress).await });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(target: "doc_quiz::pipeline", error = %e, "Submission task ended abnormally");
                let err = PipelineError::Interrupted(e.to_string());
                fallback.enter(Stage::Failed(err.kind()));
                Err(err)
            }
        }
    }

    #[instrument(target = "doc_quiz::pipeline", skip(self, progress), fields(url = %submission.url))]
    async fn execute(&self, submission: Submission, progress: Progress) -> Result<GeneratedQuizSet, PipelineError> {
        match self.steps(&submission, &progress).await {
            Ok(set) => {
                progress.enter(Stage::Done);
                info!(quiz_set_id = %set.quiz_set_id, "Submission completed");
                Ok(set)
            }
            Err(e) => {
                progress.enter(Stage::Failed(e.kind()));
                warn!(kind = %e.kind(), error = %e, "Submission failed");
                Err(e)
            }
        }
    }

    async fn steps(&self, submission: &Submission, progress: &Progress) -> Result<GeneratedQuizSet, PipelineError> {
        let owner = submission.owner.as_deref();

        progress.enter(Stage::Validating);
        let url = classify_url(&submission.url).into_result()?;

        progress.enter(Stage::QuotaChecking);
        self.quota.check(self.store.as_ref(), owner).await?;

        progress.enter(Stage::Fetching);
        let document = fetch_document(self.documents.as_ref(), &url).await?;

        progress.enter(Stage::Generating);
        let raw = self.generator.generate_raw(&document.corpus).await?;

        progress.enter(Stage::ValidatingResult);
        let payload = validate_payload(&raw)?;

        progress.enter(Stage::Persisting);
        let quiz_set = persist_quiz_set(self.store.as_ref(), &payload, &document, &url, owner).await?;

        Ok(GeneratedQuizSet {
            quiz_set_id: quiz_set.id,
            title: quiz_set.title,
            url: quiz_set.url,
            created_at: quiz_set.created_at,
            quizzes: payload.quizzes,
        })
    }
}
