// src/store/memory.rs

// In-process `ExamStore`.
//
// Each operation runs under one write lock, which gives the same atomicity
// the Postgres store gets from constraints and transactions. Used by tests
// and for running the service without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;

use super::{AnswerWrite, ExamStore, Issuance, StoreResult, SubmitOutcome};
use crate::models::{
    admit_card::{AdmitCard, NewAdmitCard},
    answer::Answer,
    attempt::{Attempt, AttemptState},
    championship::Championship,
    examination::Examination,
    profile::{Profile, ProfileFields},
    question::{Question, QuestionChoice},
};

#[derive(Default)]
struct Tables {
    championships: HashMap<i64, Championship>,
    examinations: HashMap<i64, Examination>,
    questions: BTreeMap<i64, Question>,
    profiles: HashMap<i64, Profile>,
    admit_cards: HashMap<i64, AdmitCard>,
    /// Unique index on admit_cards.order_id.
    admit_cards_by_order: HashMap<String, i64>,
    /// Keyed by (credential_id, examination_id).
    attempts: HashMap<(i64, i64), Attempt>,
    /// Keyed by (credential_id, question_id).
    answers: HashMap<(i64, i64), Answer>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    catalog_reads: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of examination/question reads served so far.
    pub fn catalog_reads(&self) -> u64 {
        self.catalog_reads.load(Ordering::SeqCst)
    }

    pub async fn add_championship(&self, championship: Championship) {
        self.tables
            .write()
            .await
            .championships
            .insert(championship.id, championship);
    }

    pub async fn add_examination(&self, examination: Examination) {
        self.tables
            .write()
            .await
            .examinations
            .insert(examination.id, examination);
    }

    /// Adds a question with the given ID to an examination.
    pub async fn add_question(
        &self,
        id: i64,
        examination_id: i64,
        question_type: &str,
        title: &str,
        description: &str,
        choices: Vec<QuestionChoice>,
    ) {
        let question = Question {
            id,
            examination_id,
            question_type: question_type.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            choices: Json(choices),
        };
        self.tables.write().await.questions.insert(id, question);
    }

    /// Replaces a question in place, bypassing any cache in front of the store.
    pub async fn replace_question(&self, question: Question) {
        self.tables
            .write()
            .await
            .questions
            .insert(question.id, question);
    }

    pub async fn attempt_count(&self, credential_id: i64, examination_id: i64) -> usize {
        let tables = self.tables.read().await;
        tables
            .attempts
            .values()
            .filter(|a| a.credential_id == credential_id && a.examination_id == examination_id)
            .count()
    }

    pub async fn answer_count(&self, credential_id: i64, question_id: i64) -> usize {
        let tables = self.tables.read().await;
        tables
            .answers
            .values()
            .filter(|a| a.credential_id == credential_id && a.question_id == question_id)
            .count()
    }

    pub async fn admit_card_count(&self, order_id: &str) -> usize {
        let tables = self.tables.read().await;
        tables
            .admit_cards
            .values()
            .filter(|card| card.order_id == order_id)
            .count()
    }

    pub async fn profile_count(&self) -> usize {
        self.tables.read().await.profiles.len()
    }

    fn count_catalog_read(&self) {
        self.catalog_reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn find_examination(&self, id: i64) -> StoreResult<Option<Examination>> {
        self.count_catalog_read();
        Ok(self.tables.read().await.examinations.get(&id).cloned())
    }

    async fn find_question(&self, id: i64) -> StoreResult<Option<Question>> {
        self.count_catalog_read();
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn list_questions(&self, examination_id: i64) -> StoreResult<Vec<Question>> {
        self.count_catalog_read();
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .values()
            .filter(|q| q.examination_id == examination_id)
            .cloned()
            .collect())
    }

    async fn find_championship(&self, id: i64) -> StoreResult<Option<Championship>> {
        Ok(self.tables.read().await.championships.get(&id).cloned())
    }

    async fn find_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
    ) -> StoreResult<Option<Attempt>> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .get(&(credential_id, examination_id))
            .cloned())
    }

    async fn insert_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
        started_at: DateTime<Utc>,
    ) -> StoreResult<Option<Attempt>> {
        let mut tables = self.tables.write().await;
        if tables.attempts.contains_key(&(credential_id, examination_id)) {
            return Ok(None);
        }

        let attempt = Attempt {
            id: tables.next_id(),
            credential_id,
            examination_id,
            is_submitted: false,
            started_at,
            ended_at: None,
        };
        tables
            .attempts
            .insert((credential_id, examination_id), attempt.clone());
        Ok(Some(attempt))
    }

    async fn submit_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<SubmitOutcome> {
        let mut tables = self.tables.write().await;
        let Some(attempt) = tables.attempts.get_mut(&(credential_id, examination_id)) else {
            return Ok(SubmitOutcome::Missing);
        };

        if attempt.is_submitted {
            return Ok(SubmitOutcome::AlreadySubmitted(attempt.clone()));
        }

        attempt.is_submitted = true;
        attempt.ended_at = Some(ended_at);
        Ok(SubmitOutcome::Submitted(attempt.clone()))
    }

    async fn upsert_answer(
        &self,
        credential_id: i64,
        examination_id: i64,
        question_id: i64,
        value: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<AnswerWrite> {
        let mut tables = self.tables.write().await;

        let state = AttemptState::of(tables.attempts.get(&(credential_id, examination_id)));
        if !state.accepts_answers() {
            return Ok(AnswerWrite::AttemptClosed);
        }

        let id = tables.next_id();
        let answer = tables
            .answers
            .entry((credential_id, question_id))
            .and_modify(|existing| {
                existing.value = value.to_string();
                existing.updated_at = at;
            })
            .or_insert_with(|| Answer {
                id,
                credential_id,
                question_id,
                value: value.to_string(),
                created_at: at,
                updated_at: at,
            })
            .clone();

        Ok(AnswerWrite::Written(answer))
    }

    async fn find_answer(
        &self,
        credential_id: i64,
        question_id: i64,
    ) -> StoreResult<Option<Answer>> {
        let tables = self.tables.read().await;
        Ok(tables.answers.get(&(credential_id, question_id)).cloned())
    }

    async fn list_answers(
        &self,
        credential_id: i64,
        examination_id: i64,
    ) -> StoreResult<Vec<Answer>> {
        let tables = self.tables.read().await;
        let mut answers: Vec<Answer> = tables
            .answers
            .values()
            .filter(|a| a.credential_id == credential_id)
            .filter(|a| {
                tables
                    .questions
                    .get(&a.question_id)
                    .is_some_and(|q| q.examination_id == examination_id)
            })
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.question_id);
        Ok(answers)
    }

    async fn find_admit_card(&self, id: i64) -> StoreResult<Option<AdmitCard>> {
        Ok(self.tables.read().await.admit_cards.get(&id).cloned())
    }

    async fn find_admit_card_by_order(&self, order_id: &str) -> StoreResult<Option<AdmitCard>> {
        let tables = self.tables.read().await;
        Ok(tables
            .admit_cards_by_order
            .get(order_id)
            .and_then(|id| tables.admit_cards.get(id))
            .cloned())
    }

    async fn issue_admit_card(
        &self,
        card: NewAdmitCard,
        profile: &ProfileFields,
    ) -> StoreResult<Issuance> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .admit_cards_by_order
            .get(&card.order_id)
            .and_then(|id| tables.admit_cards.get(id))
        {
            return Ok(Issuance::Existing(existing.clone()));
        }

        let now = Utc::now();
        let profile_id = tables.next_id();
        tables.profiles.insert(
            profile_id,
            Profile {
                id: profile_id,
                name: profile.name.clone(),
                email: profile.email.clone(),
                phone: profile.phone.clone(),
                created_at: now,
            },
        );

        let issued = AdmitCard {
            id: tables.next_id(),
            order_id: card.order_id,
            examination_ids: card.examination_ids,
            secret_digest: card.secret_digest,
            profile_id,
            championship_id: card.championship_id,
            created_at: now,
        };
        tables
            .admit_cards_by_order
            .insert(issued.order_id.clone(), issued.id);
        tables.admit_cards.insert(issued.id, issued.clone());
        Ok(Issuance::Issued(issued))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_attempt_insert_loses() {
        let store = MemoryStore::new();
        let now = Utc::now();

        assert!(store.insert_attempt(1, 10, now).await.unwrap().is_some());
        assert!(store.insert_attempt(1, 10, now).await.unwrap().is_none());
        assert_eq!(store.attempt_count(1, 10).await, 1);
    }

    #[tokio::test]
    async fn submit_is_one_way() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_attempt(1, 10, now).await.unwrap();

        assert!(matches!(
            store.submit_attempt(1, 10, now).await.unwrap(),
            SubmitOutcome::Submitted(_)
        ));
        assert!(matches!(
            store.submit_attempt(1, 10, now).await.unwrap(),
            SubmitOutcome::AlreadySubmitted(a) if a.is_submitted
        ));
        assert_eq!(
            store.submit_attempt(2, 10, now).await.unwrap(),
            SubmitOutcome::Missing
        );
    }

    #[tokio::test]
    async fn upsert_overwrites_in_place() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_attempt(1, 10, now).await.unwrap();

        store.upsert_answer(1, 10, 5, "A", now).await.unwrap();
        let second = store.upsert_answer(1, 10, 5, "B", now).await.unwrap();

        let AnswerWrite::Written(answer) = second else {
            panic!("attempt should be open");
        };
        assert_eq!(answer.value, "B");
        assert_eq!(store.answer_count(1, 5).await, 1);
    }

    #[tokio::test]
    async fn upsert_requires_open_attempt() {
        let store = MemoryStore::new();
        let now = Utc::now();

        assert_eq!(
            store.upsert_answer(1, 10, 5, "A", now).await.unwrap(),
            AnswerWrite::AttemptClosed
        );

        store.insert_attempt(1, 10, now).await.unwrap();
        store.submit_attempt(1, 10, now).await.unwrap();
        assert_eq!(
            store.upsert_answer(1, 10, 5, "A", now).await.unwrap(),
            AnswerWrite::AttemptClosed
        );
        assert_eq!(store.answer_count(1, 5).await, 0);
    }

    #[tokio::test]
    async fn one_admit_card_per_order() {
        let store = MemoryStore::new();
        let profile = ProfileFields {
            name: "A".into(),
            email: "a@x.com".into(),
            phone: "9000000000".into(),
        };
        let card = NewAdmitCard {
            order_id: "order_1".into(),
            examination_ids: vec![10, 11],
            secret_digest: "digest".into(),
            championship_id: 7,
        };

        let Issuance::Issued(first) = store.issue_admit_card(card.clone(), &profile).await.unwrap()
        else {
            panic!("first issuance should create the card");
        };
        let Issuance::Existing(second) = store.issue_admit_card(card, &profile).await.unwrap()
        else {
            panic!("second issuance should return the existing card");
        };

        assert_eq!(first.id, second.id);
        assert_eq!(store.admit_card_count("order_1").await, 1);
        assert_eq!(store.profile_count().await, 1);
    }
}
