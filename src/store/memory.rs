use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{OptionView, OwnerFilter, QuizOptionRow, QuizRow, QuizSetRow, QuizSetView, QuizStore, QuizView};
use crate::error::StoreError;

/// One of the three write stages of a quiz set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    QuizSet,
    Quizzes,
    Options,
}

impl WriteStage {
    fn name(&self) -> &'static str {
        match self {
            Self::QuizSet => "quiz_set",
            Self::Quizzes => "quiz",
            Self::Options => "quiz_option",
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    quiz_sets: Vec<QuizSetRow>,
    quizzes: Vec<QuizRow>,
    options: Vec<QuizOptionRow>,
    fail_at: Option<WriteStage>,
}

/// In-process store. Clones share the same tables.
///
/// `fail_at` makes the given write stage return an error, leaving rows of
/// earlier stages in place the way a real partial write would.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_at(&self, stage: Option<WriteStage>) {
        self.tables().fail_at = stage;
    }

    pub fn quiz_sets(&self) -> Vec<QuizSetRow> {
        self.tables().quiz_sets.clone()
    }

    pub fn quizzes(&self) -> Vec<QuizRow> {
        self.tables().quizzes.clone()
    }

    pub fn options(&self) -> Vec<QuizOptionRow> {
        self.tables().options.clone()
    }

    /// Total rows across all three tables.
    pub fn row_count(&self) -> usize {
        let t = self.tables();
        t.quiz_sets.len() + t.quizzes.len() + t.options.len()
    }

    fn check(tables: &Tables, stage: WriteStage) -> Result<(), StoreError> {
        if tables.fail_at == Some(stage) {
            debug!(stage = stage.name(), "Injected write failure");
            return Err(StoreError::Injected(stage.name()));
        }
        Ok(())
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn count_quiz_sets(&self, filter: OwnerFilter<'_>) -> Result<u64, StoreError> {
        let t = self.tables();
        Ok(t.quiz_sets.iter().filter(|s| filter.matches(s.user_id.as_deref())).count() as u64)
    }

    async fn insert_quiz_set(&self, row: &QuizSetRow) -> Result<(), StoreError> {
        let mut t = self.tables();
        Self::check(&t, WriteStage::QuizSet)?;
        t.quiz_sets.push(row.clone());
        Ok(())
    }

    async fn insert_quizzes(&self, rows: &[QuizRow]) -> Result<(), StoreError> {
        let mut t = self.tables();
        Self::check(&t, WriteStage::Quizzes)?;
        t.quizzes.extend_from_slice(rows);
        Ok(())
    }

    async fn insert_options(&self, rows: &[QuizOptionRow]) -> Result<(), StoreError> {
        let mut t = self.tables();
        Self::check(&t, WriteStage::Options)?;
        t.options.extend_from_slice(rows);
        Ok(())
    }

    async fn fetch_quiz_set(&self, id: &str) -> Result<Option<QuizSetView>, StoreError> {
        let t = self.tables();
        let Some(set) = t.quiz_sets.iter().find(|s| s.id == id) else {
            return Ok(None);
        };

        let quizzes = t
            .quizzes
            .iter()
            .filter(|q| q.quizset_id == set.id)
            .map(|q| {
                let mut options: Vec<OptionView> = t
                    .options
                    .iter()
                    .filter(|o| o.quiz_id == q.id)
                    .map(|o| OptionView { index: o.index, text: o.text.clone() })
                    .collect();
                options.sort_by_key(|o| o.index);
                QuizView {
                    id: q.id.clone(),
                    question: q.question.clone(),
                    answer_index: q.answer_index,
                    explanation: q.explanation.clone(),
                    options,
                }
            })
            .collect();

        Ok(Some(QuizSetView {
            id: set.id.clone(),
            url: set.url.clone(),
            title: set.title.clone(),
            created_at: set.created_at,
            quizzes,
        }))
    }
}
