// src/provisioning.rs

// Turns a paid order into an admission credential.
//
// An order is staged in the cache with its candidate details, opened with
// the payment gateway, and captured once the gateway reports payment. The
// store guarantees at most one credential per order; capturing again
// returns that credential without its secret.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::{Cache, CacheAside, keys},
    config::{Config, DEFAULT_ORDER_TTL_SECS, DEFAULT_STORE_TIMEOUT_MS},
    error::AppError,
    models::{
        admit_card::{AdmitCard, NewAdmitCard},
        championship::Championship,
        order::{CaptureResponse, CreateOrderRequest, OrderAmount, StagedOrder, StagedOrderResponse},
    },
    payments::{GatewayOrderRequest, PaymentGateway, Settlement, settle},
    store::{ExamStore, Issuance},
    utils::{
        deadline::bounded,
        hash::{generate_secret, hash_secret},
    },
};

const ORDER_CURRENCY: &str = "INR";

#[derive(Debug, Clone, Copy)]
pub struct ProvisioningSettings {
    pub store_timeout: Duration,
    /// How long a staged order waits for capture.
    pub order_ttl: Duration,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            order_ttl: Duration::from_secs(DEFAULT_ORDER_TTL_SECS),
        }
    }
}

impl From<&Config> for ProvisioningSettings {
    fn from(config: &Config) -> Self {
        Self {
            store_timeout: config.store_timeout,
            order_ttl: config.order_ttl,
        }
    }
}

pub struct ProvisioningEngine {
    store: Arc<dyn ExamStore>,
    cache: CacheAside,
    gateway: Arc<dyn PaymentGateway>,
    settings: ProvisioningSettings,
}

impl ProvisioningEngine {
    pub fn new(
        store: Arc<dyn ExamStore>,
        cache: Arc<dyn Cache>,
        gateway: Arc<dyn PaymentGateway>,
        settings: ProvisioningSettings,
    ) -> Self {
        Self {
            store,
            cache: CacheAside::new(cache, settings.store_timeout),
            gateway,
            settings,
        }
    }

    /// Prices a selection of examinations without placing an order.
    pub async fn calculate_order(
        &self,
        championship_id: i64,
        examination_ids: &[i64],
    ) -> Result<OrderAmount, AppError> {
        let championship = self.check_selection(championship_id, examination_ids).await?;

        Ok(OrderAmount {
            amount: championship.price_for(examination_ids.len()),
            notes: format!(
                "Order for championship {} with {} examinations.",
                championship.id,
                examination_ids.len()
            ),
        })
    }

    /// Stages the order in the cache, then opens it with the gateway.
    pub async fn stage_order(&self, req: CreateOrderRequest) -> Result<StagedOrderResponse, AppError> {
        req.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let championship = self
            .check_selection(req.championship_id, &req.examination_ids)
            .await?;

        let staged = StagedOrder {
            order_id: format!("order_{}", Uuid::new_v4().simple()),
            championship_id: championship.id,
            amount: championship.price_for(req.examination_ids.len()),
            examination_ids: req.examination_ids,
            profile: req.profile,
            staged_at: Utc::now(),
        };

        let key = keys::order(&staged.order_id);
        self.cache
            .put(&key, &staged, Some(self.settings.order_ttl))
            .await?;

        let request = GatewayOrderRequest {
            order_id: staged.order_id.clone(),
            amount: staged.amount,
            currency: ORDER_CURRENCY.to_string(),
            customer_id: customer_id(&staged.profile.phone),
            customer_name: staged.profile.name.clone(),
            customer_email: staged.profile.email.clone(),
            customer_phone: staged.profile.phone.clone(),
            championship_id: staged.championship_id,
            examination_ids: staged.examination_ids.clone(),
        };

        let opened = match bounded(
            self.settings.store_timeout,
            "open payment order",
            self.gateway.create_order(&request),
        )
        .await
        {
            Ok(opened) => opened,
            Err(e) => {
                tracing::error!("Could not open payment for {}: {}", staged.order_id, e);
                if let Err(evict_err) = self.cache.evict(&key).await {
                    tracing::warn!("Staged order {} left in cache: {}", staged.order_id, evict_err);
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Order {} staged for championship {} ({} examinations, amount {})",
            staged.order_id,
            staged.championship_id,
            staged.examination_ids.len(),
            staged.amount
        );

        Ok(StagedOrderResponse {
            order_id: staged.order_id,
            payment_session_id: opened.payment_session_id,
            amount: staged.amount,
        })
    }

    /// Captures a staged order.
    ///
    /// Replays return the existing credential with `credential_secret: None`.
    /// Pending payments may be captured again later; failed ones may not.
    pub async fn capture(&self, order_id: &str) -> Result<CaptureResponse, AppError> {
        let staged: StagedOrder = self
            .cache
            .get(&keys::order(order_id))
            .await?
            .ok_or_else(|| AppError::OrderNotFound(order_id.to_string()))?;

        let timeout = self.settings.store_timeout;
        let existing = bounded(
            timeout,
            "find admit card by order",
            self.store.find_admit_card_by_order(order_id),
        )
        .await?;
        if let Some(card) = existing {
            tracing::info!("Order {} already captured as admit card {}", order_id, card.id);
            return Ok(capture_response(card, None));
        }

        let payments = bounded(
            timeout,
            "fetch payments",
            self.gateway.fetch_payments(order_id),
        )
        .await?;

        match settle(&payments) {
            Settlement::Succeeded => self.issue(staged).await,
            Settlement::Pending => {
                tracing::warn!("Payment pending for {}", order_id);
                Err(AppError::PaymentPending(order_id.to_string()))
            }
            Settlement::Failed(status) => {
                tracing::warn!("Payment failed for {} with status {}", order_id, status);
                Err(AppError::PaymentFailed(status))
            }
        }
    }

    async fn issue(&self, staged: StagedOrder) -> Result<CaptureResponse, AppError> {
        let secret = generate_secret();
        let card = NewAdmitCard {
            order_id: staged.order_id.clone(),
            examination_ids: staged.examination_ids,
            secret_digest: hash_secret(&secret)?,
            championship_id: staged.championship_id,
        };

        let issuance = bounded(
            self.settings.store_timeout,
            "issue admit card",
            self.store.issue_admit_card(card, &staged.profile),
        )
        .await?;

        Ok(match issuance {
            Issuance::Issued(card) => {
                tracing::info!("Admit card {} issued for order {}", card.id, staged.order_id);
                capture_response(card, Some(secret))
            }
            Issuance::Existing(card) => {
                tracing::info!(
                    "Concurrent capture of {} resolved to admit card {}",
                    staged.order_id,
                    card.id
                );
                capture_response(card, None)
            }
        })
    }

    /// Rules shared by pricing and staging.
    async fn check_selection(
        &self,
        championship_id: i64,
        examination_ids: &[i64],
    ) -> Result<Championship, AppError> {
        if examination_ids.is_empty() {
            return Err(AppError::BadRequest("Select at least one examination".into()));
        }

        let mut seen = HashSet::with_capacity(examination_ids.len());
        if let Some(dup) = examination_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(AppError::BadRequest(format!("Examination {} selected twice", dup)));
        }

        let timeout = self.settings.store_timeout;
        let championship = bounded(
            timeout,
            "find championship",
            self.store.find_championship(championship_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Championship {}", championship_id)))?;

        if !championship.active {
            return Err(AppError::BadRequest(format!(
                "Championship {} is not open for orders",
                championship_id
            )));
        }

        if examination_ids.len() > championship.max_exams.max(0) as usize {
            return Err(AppError::BadRequest(format!(
                "You can only select {} examination(s)",
                championship.max_exams
            )));
        }

        for &examination_id in examination_ids {
            let examination = bounded(
                timeout,
                "find examination",
                self.store.find_examination(examination_id),
            )
            .await?;

            match examination {
                Some(e) if e.championship_id == championship.id => {}
                Some(_) => {
                    return Err(AppError::BadRequest(format!(
                        "Examination {} is not part of championship {}",
                        examination_id, championship.id
                    )));
                }
                None => {
                    return Err(AppError::NotFound(format!("Examination {}", examination_id)));
                }
            }
        }

        Ok(championship)
    }
}

/// Gateway customer reference derived from the phone number.
fn customer_id(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("cust_{}", digits)
}

fn capture_response(card: AdmitCard, secret: Option<String>) -> CaptureResponse {
    CaptureResponse {
        credential_id: card.id,
        credential_secret: secret,
        championship_id: card.championship_id,
        examination_ids: card.examination_ids,
        profile_id: card.profile_id,
    }
}
