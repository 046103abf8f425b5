// src/store/mod.rs

// Durable storage for examinations, attempts, answers and admission credentials.
//
// The store is the only source of truth and the only place uniqueness is
// enforced: one attempt per (credential, examination), one answer per
// (credential, question), one credential per order. Unique conflicts are
// resolved inside the store and reported as outcomes, never as errors.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    admit_card::{AdmitCard, NewAdmitCard},
    answer::Answer,
    attempt::Attempt,
    championship::Championship,
    examination::Examination,
    profile::ProfileFields,
    question::Question,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection, pool or timeout failure. Safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A row could not be decoded into its model.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of closing an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// This call moved the attempt from in-progress to submitted.
    Submitted(Attempt),
    /// The attempt was already submitted; nothing changed.
    AlreadySubmitted(Attempt),
    /// No attempt exists for the pair.
    Missing,
}

/// Outcome of an answer upsert guarded by the attempt state.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerWrite {
    Written(Answer),
    /// The attempt is missing or submitted; nothing was written.
    AttemptClosed,
}

/// Outcome of provisioning a credential for an order.
#[derive(Debug, Clone)]
pub enum Issuance {
    /// This call created the profile and the credential.
    Issued(AdmitCard),
    /// The order already had a credential; it is returned unchanged.
    Existing(AdmitCard),
}

#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn find_examination(&self, id: i64) -> StoreResult<Option<Examination>>;

    async fn find_question(&self, id: i64) -> StoreResult<Option<Question>>;

    /// Questions of an examination, ascending by ID.
    async fn list_questions(&self, examination_id: i64) -> StoreResult<Vec<Question>>;

    async fn find_championship(&self, id: i64) -> StoreResult<Option<Championship>>;

    async fn find_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
    ) -> StoreResult<Option<Attempt>>;

    /// Inserts an in-progress attempt.
    /// Returns `None` when the pair already has one (a concurrent insert won).
    async fn insert_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
        started_at: DateTime<Utc>,
    ) -> StoreResult<Option<Attempt>>;

    /// Moves the attempt to submitted if it is still in progress.
    async fn submit_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<SubmitOutcome>;

    /// In one transaction: checks the attempt is in progress, then inserts or
    /// overwrites the answer keyed by (credential, question).
    async fn upsert_answer(
        &self,
        credential_id: i64,
        examination_id: i64,
        question_id: i64,
        value: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<AnswerWrite>;

    async fn find_answer(&self, credential_id: i64, question_id: i64)
    -> StoreResult<Option<Answer>>;

    /// Answers of a credential to questions of one examination.
    async fn list_answers(&self, credential_id: i64, examination_id: i64)
    -> StoreResult<Vec<Answer>>;

    async fn find_admit_card(&self, id: i64) -> StoreResult<Option<AdmitCard>>;

    async fn find_admit_card_by_order(&self, order_id: &str) -> StoreResult<Option<AdmitCard>>;

    /// In one transaction: creates the candidate profile and the credential
    /// for `card.order_id`, unless that order already has a credential.
    async fn issue_admit_card(
        &self,
        card: NewAdmitCard,
        profile: &ProfileFields,
    ) -> StoreResult<Issuance>;
}
