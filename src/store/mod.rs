//! Append-only storage of quiz sets and their children.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryStore, WriteStage};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;

use crate::error::StoreError;
use crate::schema::{OPTION_COUNT, QUIZ_COUNT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSetRow {
    pub id: String,
    pub title: String,
    pub url: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRow {
    pub id: String,
    pub quizset_id: String,
    pub question: String,
    pub answer_index: i64,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOptionRow {
    pub id: String,
    pub quiz_id: String,
    pub index: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A quiz set joined with its children, options ordered by `index`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSetView {
    pub id: String,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub quizzes: Vec<QuizView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub id: String,
    pub question: String,
    pub answer_index: i64,
    pub explanation: String,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionView {
    pub index: i64,
    pub text: String,
}

impl QuizSetView {
    /// A partial write can leave a set with missing children; such a set
    /// cannot be taken and is treated as absent by readers.
    pub fn is_complete(&self) -> bool {
        self.quizzes.len() == QUIZ_COUNT
            && self.quizzes.iter().all(|q| {
                q.options.len() == OPTION_COUNT && q.options.iter().any(|o| o.index == q.answer_index)
            })
    }
}

/// Which quiz sets a count covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerFilter<'a> {
    Any,
    Owner(&'a str),
    /// Sets created without an owner.
    Anonymous,
}

impl<'a> OwnerFilter<'a> {
    pub fn matches(&self, user_id: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Owner(owner) => user_id == Some(*owner),
            Self::Anonymous => user_id.is_none(),
        }
    }
}

/// Storage handle threaded into the pipeline. Only inserts and reads; rows
/// are never updated or deleted.
#[async_trait]
pub trait QuizStore: Send + Sync + Debug {
    async fn count_quiz_sets(&self, filter: OwnerFilter<'_>) -> Result<u64, StoreError>;

    async fn insert_quiz_set(&self, row: &QuizSetRow) -> Result<(), StoreError>;

    async fn insert_quizzes(&self, rows: &[QuizRow]) -> Result<(), StoreError>;

    async fn insert_options(&self, rows: &[QuizOptionRow]) -> Result<(), StoreError>;

    async fn fetch_quiz_set(&self, id: &str) -> Result<Option<QuizSetView>, StoreError>;
}
