// src/session.rs

// Exam session engine.
//
// Every question-facing operation re-verifies the admission token and the
// examination start time; nothing about a request's authorization is cached.
// Reads of examination content go through the `Catalog`; attempts and
// answers are written to the store first and only then reflected in the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::{
    cache::{Cache, CacheAside, keys},
    catalog::Catalog,
    config::{Config, DEFAULT_JWT_EXPIRATION_SECS, DEFAULT_STORE_TIMEOUT_MS},
    error::{AppError, AuthError, AuthorizationError},
    models::{
        admit_card::AdmitCardAuthResponse,
        attempt::{Attempt, SubmitAttemptResponse},
        examination::{Examination, ExaminationDetail},
        question::{Question, QuestionView},
    },
    store::{AnswerWrite, ExamStore, SubmitOutcome},
    utils::{
        deadline::bounded,
        hash::verify_secret,
        jwt::{Claims, TokenCodec},
    },
};

/// Tunables of the session engine.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Bound on each store and cache call.
    pub store_timeout: Duration,
    /// Lifetime of tokens issued at login.
    pub token_ttl: chrono::Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            token_ttl: chrono::Duration::seconds(DEFAULT_JWT_EXPIRATION_SECS as i64),
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            store_timeout: config.store_timeout,
            token_ttl: chrono::Duration::seconds(config.jwt_expiration as i64),
        }
    }
}

/// Bounds how long an attempt snapshot can outlive a missed eviction.
const ATTEMPT_CACHE_TTL: Duration = Duration::from_secs(60);

/// A verified token that may touch one started examination.
struct Admission {
    credential_id: i64,
    examination: Examination,
}

pub struct SessionEngine {
    store: Arc<dyn ExamStore>,
    cache: CacheAside,
    catalog: Catalog,
    codec: TokenCodec,
    settings: SessionSettings,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn ExamStore>,
        cache: Arc<dyn Cache>,
        codec: TokenCodec,
        settings: SessionSettings,
    ) -> Self {
        let cache = CacheAside::new(cache, settings.store_timeout);
        let catalog = Catalog::new(store.clone(), cache.clone(), settings.store_timeout);
        Self {
            store,
            cache,
            catalog,
            codec,
            settings,
        }
    }

    /// Exchanges a credential ID and secret for an admission token.
    /// An unknown credential and a wrong secret are indistinguishable.
    pub async fn authenticate(
        &self,
        credential_id: i64,
        secret: &str,
    ) -> Result<AdmitCardAuthResponse, AppError> {
        let card = bounded(
            self.settings.store_timeout,
            "find admit card",
            self.store.find_admit_card(credential_id),
        )
        .await?;

        let Some(card) = card else {
            tracing::info!("Login for unknown admit card {}", credential_id);
            return Err(AuthError::Invalid.into());
        };

        if !verify_secret(secret, &card.secret_digest)? {
            tracing::info!("Wrong secret for admit card {}", credential_id);
            return Err(AuthError::Invalid.into());
        }

        let token = self.codec.issue(
            &card.id.to_string(),
            &card.examination_ids,
            self.settings.token_ttl,
        )?;

        Ok(AdmitCardAuthResponse {
            token,
            token_type: "Bearer".to_string(),
            examination_ids: card.examination_ids,
        })
    }

    /// Examination details plus whether this credential already submitted it.
    pub async fn get_examination(
        &self,
        token: &str,
        examination_id: i64,
    ) -> Result<ExaminationDetail, AppError> {
        let claims = self.verify(token)?;
        let admission = self.admit(&claims, examination_id).await?;

        let attempt = bounded(
            self.settings.store_timeout,
            "find attempt",
            self.store
                .find_attempt(admission.credential_id, examination_id),
        )
        .await?;

        Ok(ExaminationDetail::new(
            admission.examination,
            attempt.is_some_and(|a| a.is_submitted),
        ))
    }

    /// ListQuestions: every question of the examination with this
    /// credential's current answer. Starts the attempt on first access.
    pub async fn list_questions(
        &self,
        token: &str,
        examination_id: i64,
    ) -> Result<Vec<QuestionView>, AppError> {
        let claims = self.verify(token)?;
        let admission = self.admit(&claims, examination_id).await?;
        self.get_or_create_attempt(admission.credential_id, examination_id)
            .await?;

        let questions = self.catalog.questions(examination_id).await?;
        let answers = bounded(
            self.settings.store_timeout,
            "list answers",
            self.store
                .list_answers(admission.credential_id, examination_id),
        )
        .await?;

        let mut answers: HashMap<i64, String> = answers
            .into_iter()
            .map(|a| (a.question_id, a.value))
            .collect();

        Ok(questions
            .into_iter()
            .map(|q| {
                let answer = answers.remove(&q.id);
                QuestionView::assemble(q, answer)
            })
            .collect())
    }

    /// GetQuestion: one question with this credential's current answer.
    /// The question's examination must be covered by the token.
    pub async fn get_question(
        &self,
        token: &str,
        question_id: i64,
    ) -> Result<QuestionView, AppError> {
        let claims = self.verify(token)?;
        let question = self.scoped_question(question_id).await?;
        let admission = self.admit(&claims, question.examination_id).await?;
        self.get_or_create_attempt(admission.credential_id, question.examination_id)
            .await?;

        let answer = bounded(
            self.settings.store_timeout,
            "find answer",
            self.store.find_answer(admission.credential_id, question_id),
        )
        .await?;

        Ok(QuestionView::assemble(question, answer.map(|a| a.value)))
    }

    /// SubmitAnswer: records `value` as this credential's answer, replacing any
    /// earlier one, and returns the question with the value just written.
    ///
    /// Fails with `AttemptClosed` when the attempt was never started or has
    /// been submitted. The check and the write commit together in the store.
    pub async fn submit_answer(
        &self,
        token: &str,
        question_id: i64,
        value: &str,
    ) -> Result<QuestionView, AppError> {
        let claims = self.verify(token)?;
        let question = self.scoped_question(question_id).await?;
        let admission = self.admit(&claims, question.examination_id).await?;

        let write = bounded(
            self.settings.store_timeout,
            "upsert answer",
            self.store.upsert_answer(
                admission.credential_id,
                question.examination_id,
                question_id,
                value,
                Utc::now(),
            ),
        )
        .await?;

        match write {
            AnswerWrite::Written(answer) => {
                tracing::debug!(
                    "Answer recorded for admit card {} question {}",
                    admission.credential_id,
                    question_id
                );
                Ok(QuestionView::assemble(question, Some(answer.value)))
            }
            AnswerWrite::AttemptClosed => {
                tracing::info!(
                    "Rejected answer for admit card {} question {}: attempt closed",
                    admission.credential_id,
                    question_id
                );
                Err(AppError::AttemptClosed)
            }
        }
    }

    /// SubmitAttempt: closes the attempt. Repeating it is not an error; the
    /// response reports whether it had already been submitted.
    pub async fn submit_attempt(
        &self,
        token: &str,
        examination_id: i64,
    ) -> Result<SubmitAttemptResponse, AppError> {
        let claims = self.verify(token)?;
        let admission = self.admit(&claims, examination_id).await?;
        self.submit(admission.credential_id, examination_id).await
    }

    /// Returns the attempt for the pair, creating it on first access.
    ///
    /// Served from the cache when possible. On a miss the store decides: if
    /// two callers both insert, the loser re-reads the winner's row.
    pub async fn get_or_create_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
    ) -> Result<Attempt, AppError> {
        let key = keys::attempt(credential_id, examination_id);
        if let Some(attempt) = self.cache.get::<Attempt>(&key).await? {
            return Ok(attempt);
        }

        let timeout = self.settings.store_timeout;
        let existing = bounded(
            timeout,
            "find attempt",
            self.store.find_attempt(credential_id, examination_id),
        )
        .await?;

        let attempt = match existing {
            Some(attempt) => attempt,
            None => {
                let inserted = bounded(
                    timeout,
                    "insert attempt",
                    self.store
                        .insert_attempt(credential_id, examination_id, Utc::now()),
                )
                .await?;

                match inserted {
                    Some(attempt) => {
                        tracing::info!(
                            "Attempt {} started for admit card {} examination {}",
                            attempt.id,
                            credential_id,
                            examination_id
                        );
                        attempt
                    }
                    None => {
                        tracing::warn!(
                            "Concurrent attempt start for admit card {} examination {}, re-reading",
                            credential_id,
                            examination_id
                        );
                        bounded(
                            timeout,
                            "find attempt",
                            self.store.find_attempt(credential_id, examination_id),
                        )
                        .await?
                        .ok_or_else(|| {
                            AppError::Internal(format!(
                                "attempt for admit card {} examination {} conflicted but is missing",
                                credential_id, examination_id
                            ))
                        })?
                    }
                }
            }
        };

        self.cache.put(&key, &attempt, Some(ATTEMPT_CACHE_TTL)).await?;
        if attempt.is_submitted {
            return Ok(attempt);
        }

        // A submit may have committed and evicted between our read and the put.
        let durable = bounded(
            timeout,
            "find attempt",
            self.store.find_attempt(credential_id, examination_id),
        )
        .await?;
        match durable {
            Some(current) if current.is_submitted => {
                tracing::debug!(
                    "Attempt {} submitted while caching, evicting snapshot",
                    current.id
                );
                self.cache.evict(&key).await?;
                Ok(current)
            }
            _ => Ok(attempt),
        }
    }

    /// Terminal transition of the attempt, read and written against the store.
    /// Evicts the cached snapshot so later reads see the submitted state.
    pub async fn submit(
        &self,
        credential_id: i64,
        examination_id: i64,
    ) -> Result<SubmitAttemptResponse, AppError> {
        let outcome = bounded(
            self.settings.store_timeout,
            "submit attempt",
            self.store
                .submit_attempt(credential_id, examination_id, Utc::now()),
        )
        .await?;

        let already_submitted = match outcome {
            SubmitOutcome::Submitted(attempt) => {
                tracing::info!(
                    "Attempt {} submitted by admit card {} for examination {}",
                    attempt.id,
                    credential_id,
                    examination_id
                );
                false
            }
            SubmitOutcome::AlreadySubmitted(_) => true,
            SubmitOutcome::Missing => {
                return Err(AppError::NotFound(format!(
                    "Attempt for examination {}",
                    examination_id
                )));
            }
        };

        self.cache
            .evict(&keys::attempt(credential_id, examination_id))
            .await?;

        Ok(SubmitAttemptResponse { already_submitted })
    }

    /// Loads a question the token may see. An unknown question is refused
    /// like a question of another examination.
    async fn scoped_question(&self, question_id: i64) -> Result<Question, AppError> {
        match self.catalog.question(question_id).await {
            Ok(question) => Ok(question),
            Err(AppError::NotFound(_)) => {
                tracing::info!("Refused unknown question {}", question_id);
                Err(AuthorizationError::ExaminationMismatch.into())
            }
            Err(e) => Err(e),
        }
    }

    fn verify(&self, token: &str) -> Result<Claims, AppError> {
        Ok(self.codec.verify(token)?)
    }

    /// Checks the token covers the examination and that it has started.
    /// The end time is not enforced so in-flight attempts can finish.
    async fn admit(&self, claims: &Claims, examination_id: i64) -> Result<Admission, AppError> {
        let credential_id = claims.credential_id()?;

        if !claims.authorizes(examination_id) {
            return Err(AuthorizationError::ExaminationMismatch.into());
        }

        let examination = self.catalog.examination(examination_id).await?;
        if !examination.has_started(Utc::now()) {
            return Err(AuthorizationError::NotStarted.into());
        }

        Ok(Admission {
            credential_id,
            examination,
        })
    }
}
