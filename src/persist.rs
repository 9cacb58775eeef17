//! Writes a validated payload as one quiz set plus its child rows.

use chrono::Utc;
use reqwest::Url;
use tracing::{error, info, instrument};

use crate::document::Document;
use crate::error::{PipelineError, StoreError};
use crate::ids::{new_id, EntityKind};
use crate::schema::QuizSetPayload;
use crate::store::{QuizOptionRow, QuizRow, QuizSetRow, QuizStore};

/// Rows for one quiz set, built before anything is written.
#[derive(Debug, Clone)]
pub struct QuizSetRows {
    pub quiz_set: QuizSetRow,
    pub quizzes: Vec<QuizRow>,
    pub options: Vec<QuizOptionRow>,
}

/// Allocate fresh identities and lay out the rows. Option rows keep the
/// order and `index` values the model produced.
pub fn build_rows(payload: &QuizSetPayload, document: &Document, url: &Url, owner: Option<&str>) -> QuizSetRows {
    let created_at = Utc::now();
    let quiz_set = QuizSetRow {
        id: new_id(EntityKind::QuizSet),
        title: document.title.clone(),
        url: url.to_string(),
        user_id: owner.map(String::from),
        created_at,
    };

    let mut quizzes = Vec::with_capacity(payload.quizzes.len());
    let mut options = Vec::new();
    for quiz in &payload.quizzes {
        let quiz_id = new_id(EntityKind::Quiz);
        options.extend(quiz.options.iter().map(|option| QuizOptionRow {
            id: new_id(EntityKind::QuizOption),
            quiz_id: quiz_id.clone(),
            index: option.index,
            text: option.text.clone(),
            created_at,
        }));
        quizzes.push(QuizRow {
            id: quiz_id,
            quizset_id: quiz_set.id.clone(),
            question: quiz.question.clone(),
            answer_index: quiz.answer_index,
            explanation: quiz.explanation.clone(),
            created_at,
        });
    }

    QuizSetRows { quiz_set, quizzes, options }
}

/// Write the quiz set, then all quizzes, then all options.
///
/// A failure at a later stage leaves the earlier rows in place; nothing is
/// rolled back. Readers treat such sets as incomplete.
#[instrument(target = "doc_quiz::persist", skip_all, fields(url = %url, quizzes = payload.quizzes.len()))]
pub async fn persist_quiz_set(
    store: &dyn QuizStore,
    payload: &QuizSetPayload,
    document: &Document,
    url: &Url,
    owner: Option<&str>,
) -> Result<QuizSetRow, PipelineError> {
    let rows = build_rows(payload, document, url, owner);
    let id = rows.quiz_set.id.clone();

    let stage = |stage: &'static str| {
        let id = id.clone();
        move |e: StoreError| {
            error!(quiz_set_id = %id, stage, error = %e, "Persisting quiz set failed");
            PipelineError::Persistence(e)
        }
    };

    store.insert_quiz_set(&rows.quiz_set).await.map_err(stage("quiz_set"))?;
    store.insert_quizzes(&rows.quizzes).await.map_err(stage("quiz"))?;
    store.insert_options(&rows.options).await.map_err(stage("quiz_option"))?;

    info!(
        quiz_set_id = %id,
        quizzes = rows.quizzes.len(),
        options = rows.options.len(),
        "Persisted quiz set"
    );
    Ok(rows.quiz_set)
}
