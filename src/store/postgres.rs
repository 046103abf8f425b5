// src/store/postgres.rs

// Postgres-backed `ExamStore`.
//
// Uniqueness lives in the schema (see `migrations/`); conflicting inserts use
// `ON CONFLICT` so a lost race is observed as "no row returned".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{AnswerWrite, ExamStore, Issuance, StoreError, StoreResult, SubmitOutcome};
use crate::models::{
    admit_card::{AdmitCard, NewAdmitCard},
    answer::Answer,
    attempt::Attempt,
    championship::Championship,
    examination::Examination,
    profile::ProfileFields,
    question::Question,
};

const ATTEMPT_COLUMNS: &str =
    "id, credential_id, examination_id, is_submitted, started_at, ended_at";
const ANSWER_COLUMNS: &str = "id, credential_id, question_id, value, created_at, updated_at";
const ADMIT_CARD_COLUMNS: &str =
    "id, order_id, examination_ids, secret_digest, profile_id, championship_id, created_at";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::Corrupt(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn find_examination(&self, id: i64) -> StoreResult<Option<Examination>> {
        let examination = sqlx::query_as::<_, Examination>(
            r#"
            SELECT id, championship_id, code, name, description, start_time, end_time
            FROM examinations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(examination)
    }

    async fn find_question(&self, id: i64) -> StoreResult<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, examination_id, type, title, description, choices
            FROM questions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(question)
    }

    async fn list_questions(&self, examination_id: i64) -> StoreResult<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, examination_id, type, title, description, choices
            FROM questions
            WHERE examination_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(examination_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn find_championship(&self, id: i64) -> StoreResult<Option<Championship>> {
        let championship = sqlx::query_as::<_, Championship>(
            r#"
            SELECT id, name, primary_price, secondary_price, max_exams, active
            FROM championships
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(championship)
    }

    async fn find_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
    ) -> StoreResult<Option<Attempt>> {
        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts \
             WHERE credential_id = $1 AND examination_id = $2"
        ))
        .bind(credential_id)
        .bind(examination_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn insert_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
        started_at: DateTime<Utc>,
    ) -> StoreResult<Option<Attempt>> {
        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            "INSERT INTO exam_attempts (credential_id, examination_id, is_submitted, started_at) \
             VALUES ($1, $2, FALSE, $3) \
             ON CONFLICT (credential_id, examination_id) DO NOTHING \
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(credential_id)
        .bind(examination_id)
        .bind(started_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn submit_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<SubmitOutcome> {
        // The `is_submitted = FALSE` guard makes the transition happen at most once.
        let submitted = sqlx::query_as::<_, Attempt>(&format!(
            "UPDATE exam_attempts SET is_submitted = TRUE, ended_at = $3 \
             WHERE credential_id = $1 AND examination_id = $2 AND is_submitted = FALSE \
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(credential_id)
        .bind(examination_id)
        .bind(ended_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(attempt) = submitted {
            return Ok(SubmitOutcome::Submitted(attempt));
        }

        Ok(match self.find_attempt(credential_id, examination_id).await? {
            Some(attempt) => SubmitOutcome::AlreadySubmitted(attempt),
            None => SubmitOutcome::Missing,
        })
    }

    async fn upsert_answer(
        &self,
        credential_id: i64,
        examination_id: i64,
        question_id: i64,
        value: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<AnswerWrite> {
        let mut tx = self.pool.begin().await?;

        // FOR SHARE blocks a concurrent submit until this transaction ends,
        // and waits for one already in flight before reading.
        let open: Option<(bool,)> = sqlx::query_as(
            r#"
            SELECT is_submitted
            FROM exam_attempts
            WHERE credential_id = $1 AND examination_id = $2
            FOR SHARE
            "#,
        )
        .bind(credential_id)
        .bind(examination_id)
        .fetch_optional(&mut *tx)
        .await?;

        if !matches!(open, Some((false,))) {
            tx.rollback().await?;
            return Ok(AnswerWrite::AttemptClosed);
        }

        let answer = sqlx::query_as::<_, Answer>(&format!(
            "INSERT INTO answers (credential_id, question_id, value, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (credential_id, question_id) \
             DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at \
             RETURNING {ANSWER_COLUMNS}"
        ))
        .bind(credential_id)
        .bind(question_id)
        .bind(value)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(AnswerWrite::Written(answer))
    }

    async fn find_answer(
        &self,
        credential_id: i64,
        question_id: i64,
    ) -> StoreResult<Option<Answer>> {
        let answer = sqlx::query_as::<_, Answer>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers WHERE credential_id = $1 AND question_id = $2"
        ))
        .bind(credential_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(answer)
    }

    async fn list_answers(
        &self,
        credential_id: i64,
        examination_id: i64,
    ) -> StoreResult<Vec<Answer>> {
        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT a.id, a.credential_id, a.question_id, a.value, a.created_at, a.updated_at
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.credential_id = $1 AND q.examination_id = $2
            ORDER BY a.question_id ASC
            "#,
        )
        .bind(credential_id)
        .bind(examination_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(answers)
    }

    async fn find_admit_card(&self, id: i64) -> StoreResult<Option<AdmitCard>> {
        let card = sqlx::query_as::<_, AdmitCard>(&format!(
            "SELECT {ADMIT_CARD_COLUMNS} FROM admit_cards WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn find_admit_card_by_order(&self, order_id: &str) -> StoreResult<Option<AdmitCard>> {
        let card = sqlx::query_as::<_, AdmitCard>(&format!(
            "SELECT {ADMIT_CARD_COLUMNS} FROM admit_cards WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn issue_admit_card(
        &self,
        card: NewAdmitCard,
        profile: &ProfileFields,
    ) -> StoreResult<Issuance> {
        let mut tx = self.pool.begin().await?;

        let (profile_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO profiles (name, email, phone)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.phone)
        .fetch_one(&mut *tx)
        .await?;

        // A concurrent capture of the same order waits here for the other
        // transaction, then inserts nothing.
        let issued = sqlx::query_as::<_, AdmitCard>(&format!(
            "INSERT INTO admit_cards (order_id, examination_ids, secret_digest, profile_id, championship_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (order_id) DO NOTHING \
             RETURNING {ADMIT_CARD_COLUMNS}"
        ))
        .bind(&card.order_id)
        .bind(&card.examination_ids)
        .bind(&card.secret_digest)
        .bind(profile_id)
        .bind(card.championship_id)
        .fetch_optional(&mut *tx)
        .await?;

        match issued {
            Some(issued) => {
                tx.commit().await?;
                Ok(Issuance::Issued(issued))
            }
            None => {
                // Discard the profile created above; the winner has its own.
                tx.rollback().await?;
                let existing = self
                    .find_admit_card_by_order(&card.order_id)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!(
                            "admit card for order {} conflicted but is missing",
                            card.order_id
                        ))
                    })?;
                Ok(Issuance::Existing(existing))
            }
        }
    }
}
