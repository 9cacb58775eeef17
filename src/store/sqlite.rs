use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use tracing::{debug, info, instrument};

use super::{OptionView, OwnerFilter, QuizOptionRow, QuizRow, QuizSetRow, QuizSetView, QuizStore, QuizView};
use crate::error::StoreError;

const SCHEMA: [&str; 5] = [
    r#"CREATE TABLE IF NOT EXISTS quiz_set (
        id TEXT PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        user_id TEXT,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS quiz (
        id TEXT PRIMARY KEY NOT NULL,
        quizset_id TEXT NOT NULL REFERENCES quiz_set(id),
        question TEXT NOT NULL,
        answer_index INTEGER NOT NULL,
        explanation TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS quiz_option (
        id TEXT PRIMARY KEY NOT NULL,
        quiz_id TEXT NOT NULL REFERENCES quiz(id),
        "index" INTEGER NOT NULL,
        text TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS quiz_quizset_id_idx ON quiz(quizset_id)",
    "CREATE INDEX IF NOT EXISTS quiz_option_quiz_id_idx ON quiz_option(quiz_id)",
];

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url = %url, "Opened SQLite quiz store");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl QuizStore for SqliteStore {
    #[instrument(target = "doc_quiz::store", skip(self))]
    async fn count_quiz_sets(&self, filter: OwnerFilter<'_>) -> Result<u64, StoreError> {
        let count: i64 = match filter {
            OwnerFilter::Any => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quiz_set").fetch_one(&self.pool).await?
            }
            OwnerFilter::Owner(owner) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quiz_set WHERE user_id = ?")
                    .bind(owner)
                    .fetch_one(&self.pool)
                    .await?
            }
            OwnerFilter::Anonymous => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quiz_set WHERE user_id IS NULL")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count.max(0) as u64)
    }

    #[instrument(target = "doc_quiz::store", skip(self, row), fields(id = %row.id))]
    async fn insert_quiz_set(&self, row: &QuizSetRow) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO quiz_set (id, title, url, user_id, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&row.id)
            .bind(&row.title)
            .bind(&row.url)
            .bind(&row.user_id)
            .bind(row.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(target = "doc_quiz::store", skip(self, rows), fields(rows = rows.len()))]
    async fn insert_quizzes(&self, rows: &[QuizRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO quiz (id, quizset_id, question, answer_index, explanation, created_at) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(&row.id)
                .push_bind(&row.quizset_id)
                .push_bind(&row.question)
                .push_bind(row.answer_index)
                .push_bind(&row.explanation)
                .push_bind(row.created_at);
        });
        builder.build().execute(&self.pool).await?;
        debug!("Inserted quiz rows");
        Ok(())
    }

    #[instrument(target = "doc_quiz::store", skip(self, rows), fields(rows = rows.len()))]
    async fn insert_options(&self, rows: &[QuizOptionRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(r#"INSERT INTO quiz_option (id, quiz_id, "index", text, created_at) "#);
        builder.push_values(rows, |mut b, row| {
            b.push_bind(&row.id)
                .push_bind(&row.quiz_id)
                .push_bind(row.index)
                .push_bind(&row.text)
                .push_bind(row.created_at);
        });
        builder.build().execute(&self.pool).await?;
        debug!("Inserted quiz option rows");
        Ok(())
    }

    #[instrument(target = "doc_quiz::store", skip(self))]
    async fn fetch_quiz_set(&self, id: &str) -> Result<Option<QuizSetView>, StoreError> {
        let Some(set) = sqlx::query("SELECT id, url, title, created_at FROM quiz_set WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let quiz_rows = sqlx::query(
            "SELECT id, question, answer_index, explanation FROM quiz WHERE quizset_id = ? ORDER BY rowid",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let option_rows = sqlx::query(
            r#"SELECT o.quiz_id, o."index", o.text
               FROM quiz_option o JOIN quiz q ON q.id = o.quiz_id
               WHERE q.quizset_id = ?
               ORDER BY o.quiz_id, o."index""#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut quizzes = Vec::with_capacity(quiz_rows.len());
        for row in quiz_rows {
            let quiz_id: String = row.try_get("id")?;
            let options = option_rows
                .iter()
                .filter(|o| o.try_get::<String, _>("quiz_id").map_or(false, |q| q == quiz_id))
                .map(|o| {
                    Ok(OptionView { index: o.try_get("index")?, text: o.try_get("text")? })
                })
                .collect::<Result<Vec<_>, sqlx::Error>>()?;
            quizzes.push(QuizView {
                id: quiz_id,
                question: row.try_get("question")?,
                answer_index: row.try_get("answer_index")?,
                explanation: row.try_get("explanation")?,
                options,
            });
        }

        let created_at: DateTime<Utc> = set.try_get("created_at")?;
        Ok(Some(QuizSetView {
            id: set.try_get("id")?,
            url: set.try_get("url")?,
            title: set.try_get("title")?,
            created_at,
            quizzes,
        }))
    }
}
