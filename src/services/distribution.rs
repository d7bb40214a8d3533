//! Distribution request review and distribution records.
//!
//! Requests move through committee review; approved amounts and new
//! distributions are checked against the participant's vested balance.
//! Distributions marked OK-to-pay become the payee list of a check run.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::info;

use super::audit_trail::{AuditTrail, DISTRIBUTION_TABLE};
use crate::domain::distribution::AGE_OVERRIDE_MEMO;
use crate::domain::{
    Actor, AuditOperation, CheckPayee, Distribution, DistributionFrequency, DistributionPayee,
    DistributionRequest, DistributionRequestReason, DistributionRequestStatus, DistributionRequestType,
    DistributionStatus, NewDistribution, Ssn, TaxCode,
};
use crate::interfaces::StorageError;

const OVERRIDE_AGE: u32 = 64;

/// Result type for distribution operations.
pub type Result<T> = std::result::Result<T, DistributionError>;

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("Invalid distribution: {0}")]
    Validation(String),

    #[error("Distribution request {0} not found")]
    RequestNotFound(i64),

    #[error("Distribution {ssn}/{payment_sequence} not found")]
    NotFound { ssn: Ssn, payment_sequence: i32 },

    #[error("Request cannot move from {from} to {to}")]
    InvalidTransition {
        from: DistributionRequestStatus,
        to: DistributionRequestStatus,
    },

    #[error("Distribution {ssn}/{payment_sequence} has status {status:?}")]
    InvalidStatus {
        ssn: Ssn,
        payment_sequence: i32,
        status: DistributionStatus,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A request as entered, before it has an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSubmission {
    pub ssn: Ssn,
    pub request_type: DistributionRequestType,
    pub reason: DistributionRequestReason,
    pub amount_requested: Decimal,
    pub tax_code: TaxCode,
    pub payee: Option<DistributionPayee>,
    pub date_requested: NaiveDate,
}

#[derive(Default)]
struct ProcessorState {
    requests: BTreeMap<i64, DistributionRequest>,
    distributions: BTreeMap<(Ssn, i32), Distribution>,
    last_request_id: i64,
}

pub struct DistributionProcessor {
    state: RwLock<ProcessorState>,
    audit: AuditTrail,
}

fn check_cents(field: &str, amount: Decimal) -> Result<()> {
    if amount.normalize().scale() > 2 {
        return Err(DistributionError::Validation(format!(
            "{field} {amount} has more than two fractional digits"
        )));
    }
    Ok(())
}

impl DistributionProcessor {
    pub fn new(audit: AuditTrail) -> Self {
        Self {
            state: RwLock::new(ProcessorState::default()),
            audit,
        }
    }

    pub async fn submit(&self, submission: RequestSubmission, actor: &Actor) -> Result<DistributionRequest> {
        if submission.amount_requested <= Decimal::ZERO {
            return Err(DistributionError::Validation(
                "amount requested must be positive".to_string(),
            ));
        }
        check_cents("amount requested", submission.amount_requested)?;

        let request = {
            let mut state = self.state.write().await;
            state.last_request_id += 1;
            let request = DistributionRequest {
                id: state.last_request_id,
                ssn: submission.ssn,
                request_type: submission.request_type,
                reason: submission.reason,
                status: DistributionRequestStatus::New,
                amount_requested: submission.amount_requested,
                amount_authorized: None,
                tax_code: submission.tax_code,
                payee: submission.payee,
                date_requested: submission.date_requested,
                date_decided: None,
            };
            state.requests.insert(request.id, request.clone());
            request
        };

        self.audit_request(&request, AuditOperation::Insert, actor).await?;
        info!(request_id = request.id, ssn = %request.ssn, "Submitted distribution request");
        Ok(request)
    }

    pub async fn request(&self, id: i64) -> Option<DistributionRequest> {
        self.state.read().await.requests.get(&id).cloned()
    }

    /// Move a request one review stage. Approval goes through [`Self::approve`].
    pub async fn advance(
        &self,
        id: i64,
        next: DistributionRequestStatus,
        on: NaiveDate,
        actor: &Actor,
    ) -> Result<DistributionRequest> {
        let request = {
            let mut state = self.state.write().await;
            let request = state
                .requests
                .get_mut(&id)
                .ok_or(DistributionError::RequestNotFound(id))?;
            if next == DistributionRequestStatus::Approved || !request.status.can_move_to(next) {
                return Err(DistributionError::InvalidTransition {
                    from: request.status,
                    to: next,
                });
            }
            request.status = next;
            if next == DistributionRequestStatus::Declined {
                request.date_decided = Some(on);
            }
            request.clone()
        };

        self.audit_request(&request, AuditOperation::Update, actor).await?;
        info!(request_id = id, status = %next, "Advanced distribution request");
        Ok(request)
    }

    /// Approve `authorized` of the request, bounded by what was asked for and
    /// by the participant's `vested` balance.
    pub async fn approve(
        &self,
        id: i64,
        authorized: Decimal,
        vested: Decimal,
        on: NaiveDate,
        actor: &Actor,
    ) -> Result<DistributionRequest> {
        check_cents("authorized amount", authorized)?;
        let request = {
            let mut state = self.state.write().await;
            let request = state
                .requests
                .get_mut(&id)
                .ok_or(DistributionError::RequestNotFound(id))?;
            if !request.status.can_move_to(DistributionRequestStatus::Approved) {
                return Err(DistributionError::InvalidTransition {
                    from: request.status,
                    to: DistributionRequestStatus::Approved,
                });
            }
            if authorized <= Decimal::ZERO {
                return Err(DistributionError::Validation(
                    "authorized amount must be positive".to_string(),
                ));
            }
            if authorized > vested {
                return Err(DistributionError::Validation(format!(
                    "authorized {authorized} exceeds vested balance {vested}"
                )));
            }
            if authorized > request.amount_requested {
                return Err(DistributionError::Validation(format!(
                    "authorized {authorized} exceeds requested {}",
                    request.amount_requested
                )));
            }
            request.status = DistributionRequestStatus::Approved;
            request.amount_authorized = Some(authorized);
            request.date_decided = Some(on);
            request.clone()
        };

        self.audit_request(&request, AuditOperation::Update, actor).await?;
        info!(request_id = id, authorized = %authorized, "Approved distribution request");
        Ok(request)
    }

    /// Record a distribution paying at most `vested`.
    pub async fn create_distribution(
        &self,
        input: NewDistribution,
        vested: Decimal,
        actor: &Actor,
    ) -> Result<Distribution> {
        for (field, amount) in [
            ("gross amount", input.gross_amount),
            ("federal tax", input.federal_tax_amount),
            ("state tax", input.state_tax_amount),
        ] {
            check_cents(field, amount)?;
            if amount < Decimal::ZERO {
                return Err(DistributionError::Validation(format!("{field} is negative")));
            }
        }
        if input.gross_amount.is_zero() {
            return Err(DistributionError::Validation("gross amount is zero".to_string()));
        }
        if input.gross_amount > vested {
            return Err(DistributionError::Validation(format!(
                "gross {} exceeds vested balance {vested}",
                input.gross_amount
            )));
        }

        let (federal_tax_amount, state_tax_amount) = match input.frequency {
            DistributionFrequency::RolloverDirect => (Decimal::ZERO, Decimal::ZERO),
            _ => (input.federal_tax_amount, input.state_tax_amount),
        };
        if federal_tax_amount + state_tax_amount > input.gross_amount {
            return Err(DistributionError::Validation(
                "taxes exceed gross amount".to_string(),
            ));
        }

        let memo = match input.memo {
            Some(memo) => Some(memo),
            None if input.tax_code == TaxCode::NORMAL_DISTRIBUTION
                && input.participant_age > OVERRIDE_AGE
                && input.gross_amount != vested =>
            {
                Some(AGE_OVERRIDE_MEMO.to_string())
            }
            None => None,
        };

        let distribution = {
            let mut state = self.state.write().await;
            let payment_sequence = state
                .distributions
                .range((input.ssn, i32::MIN)..=(input.ssn, i32::MAX))
                .map(|((_, seq), _)| *seq)
                .max()
                .unwrap_or(0)
                + 1;
            let distribution = Distribution {
                ssn: input.ssn,
                payment_sequence,
                demographic_id: input.demographic_id,
                employee_name: input.employee_name,
                frequency: input.frequency,
                status: input.status,
                payee: input.payee,
                gross_amount: input.gross_amount,
                federal_tax_amount,
                state_tax_amount,
                tax_code: input.tax_code,
                is_deceased: input.is_deceased,
                is_qdro: input.is_qdro,
                is_roth_ira: input.is_roth_ira,
                memo,
                created_by: actor.user_name().to_string(),
                created_at: Utc::now(),
            };
            state
                .distributions
                .insert((distribution.ssn, payment_sequence), distribution.clone());
            distribution
        };

        self.audit_distribution(&distribution, AuditOperation::Insert, actor).await?;
        info!(
            ssn = %distribution.ssn,
            payment_sequence = distribution.payment_sequence,
            gross = %distribution.gross_amount,
            "Created distribution"
        );
        Ok(distribution)
    }

    pub async fn distribution(&self, ssn: Ssn, payment_sequence: i32) -> Option<Distribution> {
        self.state
            .read()
            .await
            .distributions
            .get(&(ssn, payment_sequence))
            .cloned()
    }

    pub async fn purge(&self, ssn: Ssn, payment_sequence: i32, actor: &Actor) -> Result<Distribution> {
        self.set_status(ssn, payment_sequence, DistributionStatus::PurgeRecord, actor, |status| {
            status != DistributionStatus::PaymentMade
        })
        .await
    }

    /// Status `Y` distributions as check payees, in (SSN, sequence) order.
    pub async fn payables(&self) -> Vec<CheckPayee> {
        self.state
            .read()
            .await
            .distributions
            .values()
            .filter(|d| d.status == DistributionStatus::OkToPay)
            .map(|d| CheckPayee {
                ssn: d.ssn,
                demographic_id: d.demographic_id,
                payable_name: d.payable_name().to_string(),
                amount: d.net_amount(),
                tax_code: d.tax_code,
                payment_sequence: Some(d.payment_sequence),
            })
            .collect()
    }

    pub async fn mark_paid(&self, ssn: Ssn, payment_sequence: i32, actor: &Actor) -> Result<Distribution> {
        self.set_status(ssn, payment_sequence, DistributionStatus::PaymentMade, actor, |status| {
            matches!(status, DistributionStatus::OkToPay | DistributionStatus::ManualCheck)
        })
        .await
    }

    async fn set_status(
        &self,
        ssn: Ssn,
        payment_sequence: i32,
        status: DistributionStatus,
        actor: &Actor,
        allowed_from: impl Fn(DistributionStatus) -> bool,
    ) -> Result<Distribution> {
        let distribution = {
            let mut state = self.state.write().await;
            let distribution = state
                .distributions
                .get_mut(&(ssn, payment_sequence))
                .ok_or(DistributionError::NotFound { ssn, payment_sequence })?;
            if distribution.status.is_purged() || !allowed_from(distribution.status) {
                return Err(DistributionError::InvalidStatus {
                    ssn,
                    payment_sequence,
                    status: distribution.status,
                });
            }
            distribution.status = status;
            distribution.clone()
        };

        self.audit_distribution(&distribution, AuditOperation::Update, actor).await?;
        info!(ssn = %ssn, payment_sequence, status = ?status, "Updated distribution status");
        Ok(distribution)
    }

    async fn audit_request(&self, request: &DistributionRequest, operation: AuditOperation, actor: &Actor) -> Result<()> {
        let changes = json!({
            "status": request.status,
            "amount_requested": request.amount_requested,
            "amount_authorized": request.amount_authorized,
        });
        self.audit
            .record(DISTRIBUTION_TABLE, operation, &format!("request/{}", request.id), &changes, actor)
            .await?;
        Ok(())
    }

    async fn audit_distribution(&self, distribution: &Distribution, operation: AuditOperation, actor: &Actor) -> Result<()> {
        let changes = json!({
            "ssn": distribution.ssn.masked(),
            "status": distribution.status,
            "gross_amount": distribution.gross_amount,
            "federal_tax_amount": distribution.federal_tax_amount,
            "state_tax_amount": distribution.state_tax_amount,
            "memo": distribution.memo,
        });
        let key = format!("{}/{}", distribution.ssn.value(), distribution.payment_sequence);
        self.audit
            .record(DISTRIBUTION_TABLE, operation, &key, &changes, actor)
            .await?;
        Ok(())
    }
}
