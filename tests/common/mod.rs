// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use exam_portal::{
    cache::MemoryCache,
    models::{
        admit_card::{AdmitCard, NewAdmitCard},
        answer::Answer,
        attempt::Attempt,
        championship::Championship,
        examination::Examination,
        profile::ProfileFields,
        question::{Question, QuestionChoice},
    },
    payments::{
        GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway, Transaction,
        TransactionStatus,
    },
    provisioning::{ProvisioningEngine, ProvisioningSettings},
    session::{SessionEngine, SessionSettings},
    store::{AnswerWrite, ExamStore, Issuance, MemoryStore, StoreResult, SubmitOutcome},
    utils::{hash::hash_secret, jwt::TokenCodec},
};

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Championship with two open examinations (10, 11), one opening tomorrow (12)
/// and one more open examination (13).
pub const CHAMPIONSHIP: i64 = 7;
/// Open examination belonging to championship 8.
pub const FOREIGN_EXAM: i64 = 20;
/// Inactive championship with examination 30.
pub const CLOSED_CHAMPIONSHIP: i64 = 9;

/// Payment gateway whose transaction history is set by the test.
#[derive(Default)]
pub struct ScriptedGateway {
    pub opened: Mutex<Vec<GatewayOrderRequest>>,
    payments: Mutex<HashMap<String, Vec<Transaction>>>,
    pub refuse_orders: AtomicBool,
    pub fetches: AtomicUsize,
}

impl ScriptedGateway {
    pub fn set_payments(&self, order_id: &str, history: Vec<Transaction>) {
        self.payments
            .lock()
            .unwrap()
            .insert(order_id.to_string(), history);
    }

    pub fn opened_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        if self.refuse_orders.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                body: "gateway down".to_string(),
            });
        }
        self.opened.lock().unwrap().push(request.clone());
        Ok(GatewayOrder {
            order_id: request.order_id.clone(),
            payment_session_id: format!("session_{}", request.order_id),
        })
    }

    async fn fetch_payments(&self, order_id: &str) -> Result<Vec<Transaction>, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .payments
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// A transaction with the given gateway status, `minute` minutes past 10:00.
pub fn txn(raw_status: &str, minute: u32) -> Transaction {
    Transaction {
        payment_id: format!("pay_{}_{}", raw_status, minute),
        status: TransactionStatus::from_gateway(raw_status),
        raw_status: raw_status.to_string(),
        timestamp: Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, minute, 0).unwrap()),
    }
}

pub fn profile() -> ProfileFields {
    ProfileFields {
        name: "Asha Rao".to_string(),
        email: "asha@example.com".to_string(),
        phone: "+919876543210".to_string(),
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub gateway: Arc<ScriptedGateway>,
    pub codec: TokenCodec,
    pub session: Arc<SessionEngine>,
    pub provisioning: Arc<ProvisioningEngine>,
}

impl Harness {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        seed_catalog(&store).await;

        let cache = Arc::new(MemoryCache::new());
        let gateway = Arc::new(ScriptedGateway::default());
        let codec = TokenCodec::new(JWT_SECRET);

        let session = SessionEngine::new(
            store.clone(),
            cache.clone(),
            codec.clone(),
            SessionSettings::default(),
        );
        let provisioning = ProvisioningEngine::new(
            store.clone(),
            cache.clone(),
            gateway.clone(),
            ProvisioningSettings::default(),
        );

        Self {
            store,
            cache,
            gateway,
            codec,
            session: Arc::new(session),
            provisioning: Arc::new(provisioning),
        }
    }

    /// Issues an admit card straight into the store. Returns (id, secret).
    pub async fn admit_card(&self, order_id: &str, examination_ids: &[i64]) -> (i64, String) {
        let secret = "482913".to_string();
        let card = NewAdmitCard {
            order_id: order_id.to_string(),
            examination_ids: examination_ids.to_vec(),
            secret_digest: hash_secret(&secret).unwrap(),
            championship_id: CHAMPIONSHIP,
        };
        match self.store.issue_admit_card(card, &profile()).await.unwrap() {
            Issuance::Issued(card) => (card.id, secret),
            Issuance::Existing(_) => panic!("order {} already has an admit card", order_id),
        }
    }

    /// Logs in with a fresh admit card and returns (credential_id, token).
    pub async fn login(&self, order_id: &str, examination_ids: &[i64]) -> (i64, String) {
        let (id, secret) = self.admit_card(order_id, examination_ids).await;
        let auth = self.session.authenticate(id, &secret).await.unwrap();
        (id, auth.token)
    }
}

pub async fn seed_catalog(store: &MemoryStore) {
    let now = Utc::now();

    store
        .add_championship(Championship {
            id: CHAMPIONSHIP,
            name: "National Olympiad".to_string(),
            primary_price: 50_000,
            secondary_price: 30_000,
            max_exams: 3,
            active: true,
        })
        .await;
    store
        .add_championship(Championship {
            id: 8,
            name: "Regional Olympiad".to_string(),
            primary_price: 20_000,
            secondary_price: 10_000,
            max_exams: 2,
            active: true,
        })
        .await;
    store
        .add_championship(Championship {
            id: CLOSED_CHAMPIONSHIP,
            name: "Archived Olympiad".to_string(),
            primary_price: 10_000,
            secondary_price: 10_000,
            max_exams: 2,
            active: false,
        })
        .await;

    let exams = [
        (10, CHAMPIONSHIP, "MATH-L1", now - Duration::hours(1)),
        (11, CHAMPIONSHIP, "SCI-L1", now - Duration::hours(1)),
        (12, CHAMPIONSHIP, "ENG-L1", now + Duration::days(1)),
        (13, CHAMPIONSHIP, "GK-L1", now - Duration::hours(1)),
        (FOREIGN_EXAM, 8, "MATH-R1", now - Duration::hours(1)),
        (30, CLOSED_CHAMPIONSHIP, "MATH-A1", now - Duration::days(400)),
    ];
    for (id, championship_id, code, start_time) in exams {
        store
            .add_examination(Examination {
                id,
                championship_id,
                code: code.to_string(),
                name: format!("{} paper", code),
                description: String::new(),
                start_time,
                end_time: start_time + Duration::hours(3),
            })
            .await;
    }

    let choices = || {
        vec![
            QuestionChoice { label: "A".into(), value: "2".into() },
            QuestionChoice { label: "B".into(), value: "4".into() },
        ]
    };
    // Inserted out of order on purpose; listings come back by ascending ID.
    store.add_question(103, 10, "text", "Proof", "Show that 2 + 2 = 4.", vec![]).await;
    store.add_question(101, 10, "single", "Sum", "2 + 2 = ?", choices()).await;
    store.add_question(102, 10, "single", "Product", "2 x 2 = ?", choices()).await;
    store.add_question(111, 11, "text", "Photosynthesis", "Describe it.", vec![]).await;
    store.add_question(121, 12, "text", "Essay", "Write about spring.", vec![]).await;
    store.add_question(201, FOREIGN_EXAM, "single", "Sum", "1 + 1 = ?", choices()).await;
}

/// `MemoryStore` with hooks on `find_attempt`.
///
/// * `hide_next_attempt`: the next lookup reports no attempt even if one exists.
/// * `hold_next_attempt`: the next lookup reads the row, notifies `reached`,
///   then waits for `release` before returning what it read.
pub struct GatedStore {
    pub inner: Arc<MemoryStore>,
    pub hide_next_attempt: AtomicBool,
    pub hold_next_attempt: AtomicBool,
    pub reached: Notify,
    pub release: Notify,
    pub attempt_lookups: AtomicUsize,
}

impl GatedStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            hide_next_attempt: AtomicBool::new(false),
            hold_next_attempt: AtomicBool::new(false),
            reached: Notify::new(),
            release: Notify::new(),
            attempt_lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExamStore for GatedStore {
    async fn find_examination(&self, id: i64) -> StoreResult<Option<Examination>> {
        self.inner.find_examination(id).await
    }

    async fn find_question(&self, id: i64) -> StoreResult<Option<Question>> {
        self.inner.find_question(id).await
    }

    async fn list_questions(&self, examination_id: i64) -> StoreResult<Vec<Question>> {
        self.inner.list_questions(examination_id).await
    }

    async fn find_championship(&self, id: i64) -> StoreResult<Option<Championship>> {
        self.inner.find_championship(id).await
    }

    async fn find_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
    ) -> StoreResult<Option<Attempt>> {
        self.attempt_lookups.fetch_add(1, Ordering::SeqCst);
        if self.hide_next_attempt.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let found = self.inner.find_attempt(credential_id, examination_id).await?;
        if self.hold_next_attempt.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        Ok(found)
    }

    async fn insert_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
        started_at: DateTime<Utc>,
    ) -> StoreResult<Option<Attempt>> {
        self.inner
            .insert_attempt(credential_id, examination_id, started_at)
            .await
    }

    async fn submit_attempt(
        &self,
        credential_id: i64,
        examination_id: i64,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<SubmitOutcome> {
        self.inner
            .submit_attempt(credential_id, examination_id, ended_at)
            .await
    }

    async fn upsert_answer(
        &self,
        credential_id: i64,
        examination_id: i64,
        question_id: i64,
        value: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<AnswerWrite> {
        self.inner
            .upsert_answer(credential_id, examination_id, question_id, value, at)
            .await
    }

    async fn find_answer(
        &self,
        credential_id: i64,
        question_id: i64,
    ) -> StoreResult<Option<Answer>> {
        self.inner.find_answer(credential_id, question_id).await
    }

    async fn list_answers(
        &self,
        credential_id: i64,
        examination_id: i64,
    ) -> StoreResult<Vec<Answer>> {
        self.inner.list_answers(credential_id, examination_id).await
    }

    async fn find_admit_card(&self, id: i64) -> StoreResult<Option<AdmitCard>> {
        self.inner.find_admit_card(id).await
    }

    async fn find_admit_card_by_order(&self, order_id: &str) -> StoreResult<Option<AdmitCard>> {
        self.inner.find_admit_card_by_order(order_id).await
    }

    async fn issue_admit_card(
        &self,
        card: NewAdmitCard,
        profile: &ProfileFields,
    ) -> StoreResult<Issuance> {
        self.inner.issue_admit_card(card, profile).await
    }
}

/// A session engine over a `GatedStore` seeded like `Harness`.
pub async fn gated_session() -> (Arc<GatedStore>, Arc<MemoryCache>, Arc<SessionEngine>) {
    let inner = Arc::new(MemoryStore::new());
    seed_catalog(&inner).await;
    let store = Arc::new(GatedStore::new(inner));
    let cache = Arc::new(MemoryCache::new());
    let session = SessionEngine::new(
        store.clone(),
        cache.clone(),
        TokenCodec::new(JWT_SECRET),
        SessionSettings::default(),
    );
    (store, cache, Arc::new(session))
}
