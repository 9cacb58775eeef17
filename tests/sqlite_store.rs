
use std::sync::Arc;
use test_utils::*;

use doc_quiz::clients::MockClient;
use doc_quiz::core::QuizGenerator;
use doc_quiz::quota::{QuotaPolicy, QuotaScope};
use doc_quiz::store::{OwnerFilter, QuizOptionRow, QuizRow, QuizSetRow, QuizStore, SqliteStore};
use doc_quiz::{ErrorKind, Submission, SubmissionPipeline};

async fn memory_store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
}

fn quiz_set(id: &str, owner: Option<&str>) -> QuizSetRow {
    QuizSetRow {
        id: id.into(),
        title: "Title".into(),
        url: "https://example.com/doc".into(),
        user_id: owner.map(String::from),
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn counts_respect_owner_filter() {
    let store = memory_store().await;
    store.insert_quiz_set(&quiz_set("qs_a", Some("alice"))).await.unwrap();
    store.insert_quiz_set(&quiz_set("qs_b", Some("alice"))).await.unwrap();
    store.insert_quiz_set(&quiz_set("qs_c", None)).await.unwrap();

    assert_eq!(store.count_quiz_sets(OwnerFilter::Any).await.unwrap(), 3);
    assert_eq!(store.count_quiz_sets(OwnerFilter::Owner("alice")).await.unwrap(), 2);
    assert_eq!(store.count_quiz_sets(OwnerFilter::Owner("bob")).await.unwrap(), 0);
    assert_eq!(store.count_quiz_sets(OwnerFilter::Anonymous).await.unwrap(), 1);
}

#[tokio::test]
async fn fetch_orders_options_by_index() {
    let store = memory_store().await;
    let now = chrono::Utc::now();
    store.insert_quiz_set(&quiz_set("qs_1", None)).await.unwrap();
    store
        .insert_quizzes(&[QuizRow {
            id: "q_1".into(),
            quizset_id: "qs_1".into(),
            question: "Which?".into(),
            answer_index: 3,
            explanation: "Because.".into(),
            created_at: now,
        }])
        .await
        .unwrap();
    let options: Vec<QuizOptionRow> = [4, 2, 1, 3]
        .into_iter()
        .map(|index| QuizOptionRow {
            id: format!("qo_{}", index),
            quiz_id: "q_1".into(),
            index,
            text: format!("option {}", index),
            created_at: now,
        })
        .collect();
    store.insert_options(&options).await.unwrap();

    let view = store.fetch_quiz_set("qs_1").await.unwrap().unwrap();
    assert_eq!(view.quizzes.len(), 1);
    let indices: Vec<i64> = view.quizzes[0].options.iter().map(|o| o.index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4]);
    assert_eq!(view.quizzes[0].answer_index, 3);
    // One quiz is not a full set.
    assert!(!view.is_complete());
}

#[tokio::test]
async fn fetch_unknown_id_is_none() {
    let store = memory_store().await;
    assert!(store.fetch_quiz_set("qs_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_id_is_a_store_error() {
    let store = memory_store().await;
    store.insert_quiz_set(&quiz_set("qs_dup", None)).await.unwrap();
    assert!(store.insert_quiz_set(&quiz_set("qs_dup", None)).await.is_err());
}

#[tokio::test]
async fn empty_batches_are_no_ops() {
    let store = memory_store().await;
    store.insert_quizzes(&[]).await.unwrap();
    store.insert_options(&[]).await.unwrap();
}

#[tokio::test]
async fn pipeline_round_trips_through_sqlite() {
    let store = Arc::new(memory_store().await);
    let (client, model) = MockClient::new();
    model.add_arguments(quiz_arguments());
    let page = StaticPage::new(PAGE_HTML);
    let pipeline = SubmissionPipeline::new(
        QuizGenerator::new(client),
        page.clone(),
        store.clone(),
        QuotaPolicy { ceiling: 1, scope: QuotaScope::Global },
    );

    let set = pipeline.run(Submission::new("https://example.com/guide")).await.unwrap();

    let view = store.fetch_quiz_set(&set.quiz_set_id).await.unwrap().unwrap();
    assert!(view.is_complete());
    assert_eq!(view.title, set.title);
    assert_eq!(view.url, "https://example.com/guide");
    let questions: Vec<&str> = view.quizzes.iter().map(|q| q.question.as_str()).collect();
    let expected: Vec<&str> = set.quizzes.iter().map(|q| q.question.as_str()).collect();
    assert_eq!(questions, expected);

    // The ceiling of one is now reached.
    let err = pipeline.run(Submission::new("https://example.com/guide")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    assert_eq!(page.calls(), 1);
}
