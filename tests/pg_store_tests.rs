// tests/pg_store_tests.rs
//
// Runs against a real Postgres when DATABASE_URL is set; skipped otherwise.

use chrono::{Duration, Utc};
use exam_portal::{
    models::{admit_card::NewAdmitCard, profile::ProfileFields},
    store::{AnswerWrite, ExamStore, Issuance, PgStore, SubmitOutcome},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

async fn connect() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres store tests");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    Some(pool)
}

/// Inserts a championship, one started examination and two questions.
/// Returns (championship_id, examination_id, [question ids]).
async fn seed(pool: &PgPool) -> (i64, i64, [i64; 2]) {
    let (championship_id,): (i64,) = sqlx::query_as(
        "INSERT INTO championships (name, primary_price, secondary_price, max_exams) \
         VALUES ('Test Olympiad', 50000, 30000, 3) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    let start = Utc::now() - Duration::hours(1);
    let (examination_id,): (i64,) = sqlx::query_as(
        "INSERT INTO examinations (championship_id, code, name, start_time, end_time) \
         VALUES ($1, $2, 'Test paper', $3, $4) RETURNING id",
    )
    .bind(championship_id)
    .bind(format!("T-{}", Uuid::new_v4().simple()))
    .bind(start)
    .bind(start + Duration::hours(3))
    .fetch_one(pool)
    .await
    .unwrap();

    let mut questions = [0i64; 2];
    for (slot, title) in questions.iter_mut().zip(["First", "Second"]) {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO questions (examination_id, type, title, choices) \
             VALUES ($1, 'text', $2, '[]'::jsonb) RETURNING id",
        )
        .bind(examination_id)
        .bind(title)
        .fetch_one(pool)
        .await
        .unwrap();
        *slot = id;
    }

    (championship_id, examination_id, questions)
}

fn profile() -> ProfileFields {
    ProfileFields {
        name: "Asha Rao".to_string(),
        email: "asha@example.com".to_string(),
        phone: "+919876543210".to_string(),
    }
}

fn new_card(order_id: &str, championship_id: i64, examination_id: i64) -> NewAdmitCard {
    NewAdmitCard {
        order_id: order_id.to_string(),
        examination_ids: vec![examination_id],
        secret_digest: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA".to_string(),
        championship_id,
    }
}

#[tokio::test]
async fn attempt_answer_and_submit_round() {
    let Some(pool) = connect().await else { return };
    let store = PgStore::new(pool.clone());
    let (championship_id, examination_id, [q1, q2]) = seed(&pool).await;

    let listed = store.list_questions(examination_id).await.unwrap();
    assert_eq!(listed.iter().map(|q| q.id).collect::<Vec<_>>(), vec![q1, q2]);

    let order_id = format!("order_{}", Uuid::new_v4().simple());
    let card = match store
        .issue_admit_card(new_card(&order_id, championship_id, examination_id), &profile())
        .await
        .unwrap()
    {
        Issuance::Issued(card) => card,
        Issuance::Existing(_) => panic!("fresh order already issued"),
    };
    assert_eq!(card.examination_ids, vec![examination_id]);

    let closed = store
        .upsert_answer(card.id, examination_id, q1, "early", Utc::now())
        .await
        .unwrap();
    assert_eq!(closed, AnswerWrite::AttemptClosed);

    let attempt = store
        .insert_attempt(card.id, examination_id, Utc::now())
        .await
        .unwrap()
        .expect("first insert creates the attempt");
    assert!(!attempt.is_submitted);
    assert!(
        store
            .insert_attempt(card.id, examination_id, Utc::now())
            .await
            .unwrap()
            .is_none()
    );

    store.upsert_answer(card.id, examination_id, q1, "a", Utc::now()).await.unwrap();
    let second = store.upsert_answer(card.id, examination_id, q1, "b", Utc::now()).await.unwrap();
    match second {
        AnswerWrite::Written(answer) => assert_eq!(answer.value, "b"),
        AnswerWrite::AttemptClosed => panic!("attempt should be open"),
    }
    let answers = store.list_answers(card.id, examination_id).await.unwrap();
    assert_eq!(answers.len(), 1);

    assert!(matches!(
        store.submit_attempt(card.id, examination_id, Utc::now()).await.unwrap(),
        SubmitOutcome::Submitted(_)
    ));
    assert!(matches!(
        store.submit_attempt(card.id, examination_id, Utc::now()).await.unwrap(),
        SubmitOutcome::AlreadySubmitted(_)
    ));
    assert_eq!(
        store.upsert_answer(card.id, examination_id, q2, "late", Utc::now()).await.unwrap(),
        AnswerWrite::AttemptClosed
    );
}

#[tokio::test]
async fn one_admit_card_per_order() {
    let Some(pool) = connect().await else { return };
    let store = PgStore::new(pool.clone());
    let (championship_id, examination_id, _) = seed(&pool).await;
    let order_id = format!("order_{}", Uuid::new_v4().simple());

    let first = store
        .issue_admit_card(new_card(&order_id, championship_id, examination_id), &profile())
        .await
        .unwrap();
    let second = store
        .issue_admit_card(new_card(&order_id, championship_id, examination_id), &profile())
        .await
        .unwrap();

    let (Issuance::Issued(issued), Issuance::Existing(existing)) = (first, second) else {
        panic!("expected one issuance followed by a replay");
    };
    assert_eq!(issued.id, existing.id);

    let found = store.find_admit_card_by_order(&order_id).await.unwrap().unwrap();
    assert_eq!(found.id, issued.id);
    assert_eq!(found.secret_digest, issued.secret_digest);
}

#[tokio::test]
async fn submit_without_attempt_is_missing() {
    let Some(pool) = connect().await else { return };
    let store = PgStore::new(pool.clone());
    let (championship_id, examination_id, _) = seed(&pool).await;
    let order_id = format!("order_{}", Uuid::new_v4().simple());

    let Issuance::Issued(card) = store
        .issue_admit_card(new_card(&order_id, championship_id, examination_id), &profile())
        .await
        .unwrap()
    else {
        panic!("fresh order already issued");
    };

    assert_eq!(
        store.submit_attempt(card.id, examination_id, Utc::now()).await.unwrap(),
        SubmitOutcome::Missing
    );
}
