// src/catalog.rs

// Cache-aside reads of examination content.
//
// Examinations and questions are frozen before an examination opens, so
// entries carry no TTL and are never invalidated. An edit made after
// candidates started may be served stale until the cache is cleared.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    cache::{CacheAside, keys},
    error::AppError,
    models::{examination::Examination, question::Question},
    store::ExamStore,
    utils::deadline::bounded,
};

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn ExamStore>,
    cache: CacheAside,
    timeout: Duration,
}

impl Catalog {
    pub fn new(store: Arc<dyn ExamStore>, cache: CacheAside, timeout: Duration) -> Self {
        Self {
            store,
            cache,
            timeout,
        }
    }

    pub async fn examination(&self, examination_id: i64) -> Result<Examination, AppError> {
        self.cache
            .read_through(&keys::examination(examination_id), || {
                bounded(
                    self.timeout,
                    "find examination",
                    self.store.find_examination(examination_id),
                )
            })
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Examination {}", examination_id)))
    }

    pub async fn question(&self, question_id: i64) -> Result<Question, AppError> {
        self.cache
            .read_through(&keys::question(question_id), || {
                bounded(
                    self.timeout,
                    "find question",
                    self.store.find_question(question_id),
                )
            })
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {}", question_id)))
    }

    /// Questions of an examination, ascending by ID.
    /// An empty list is not cached, so questions authored later still show up.
    pub async fn questions(&self, examination_id: i64) -> Result<Vec<Question>, AppError> {
        let questions = self
            .cache
            .read_through(&keys::examination_questions(examination_id), || async {
                bounded(
                    self.timeout,
                    "list questions",
                    self.store.list_questions(examination_id),
                )
                .await
                .map(|questions| (!questions.is_empty()).then_some(questions))
            })
            .await?;

        Ok(questions.unwrap_or_default())
    }
}
