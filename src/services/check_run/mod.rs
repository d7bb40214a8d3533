//! Check-run orchestration.
//!
//! Drives a [`CheckRunWorkflow`] through its six steps. Transitions of one
//! run are serialized by a per-run async mutex; across processes the
//! workflow row's optimistic version rejects a stale writer. Every
//! transition writes a `CHECK_RUN_WORKFLOW` audit event before the row is
//! updated.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{CheckRunConfig, TransferRetryConfig};
use crate::domain::{
    Actor, AuditOperation, CheckPayee, CheckRunStep, CheckRunWorkflow, PayeeLine, ProfitShareCheck, ProfitYear,
    RunContext, Transition, TransitionError,
};
use crate::interfaces::{StorageError, WorkflowStore};
use crate::services::audit_trail::{AuditTrail, CHECK_RUN_WORKFLOW_TABLE};
use crate::services::check_issuance::{CheckIssuer, IssuanceError};
use crate::services::file_transfer::{
    FileTransferAuditor, FileTransferService, PaymentFile, PaymentFileTransport, TransferError, TransferOutcome,
};
use crate::storage::Storage;

/// Result type for check-run operations.
pub type Result<T> = std::result::Result<T, CheckRunError>;

#[derive(Debug, thiserror::Error)]
pub enum CheckRunError {
    #[error("Run not found: {0}")]
    NotFound(Uuid),

    #[error("Validation failed for {context}: {reason}")]
    Validation { context: RunContext, reason: String },

    #[error("A run for {profit_year} on {check_run_date} is already active: {existing}")]
    Duplicate {
        profit_year: ProfitYear,
        check_run_date: NaiveDate,
        existing: RunContext,
    },

    #[error("{operation} not allowed for {context}")]
    NotAllowed {
        context: RunContext,
        operation: &'static str,
    },

    #[error("Run is terminal, {context}")]
    IrreversibleState { context: RunContext },

    #[error("Reprint limit of {max} exceeded, {context}")]
    ReprintLimitExceeded { context: RunContext, max: u32 },

    #[error("Transfer failed for {context}: {reason}")]
    RetryableTransfer { context: RunContext, reason: String },

    #[error("Transfer not confirmed for {context}")]
    Pending { context: RunContext },

    #[error("Check issuance failed for {context}: {source}")]
    Issuance {
        context: RunContext,
        #[source]
        source: IssuanceError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CheckRunError {
    fn transition(context: RunContext, err: TransitionError) -> Self {
        match err {
            TransitionError::Terminal { .. } => Self::IrreversibleState { context },
            TransitionError::NotAllowed { transition, .. } => Self::NotAllowed {
                context,
                operation: transition,
            },
            TransitionError::ReprintLimit { max, .. } => Self::ReprintLimitExceeded { context, max },
        }
    }

    fn issuance(context: RunContext, err: IssuanceError) -> Self {
        match err {
            IssuanceError::Storage(e) => Self::Storage(e),
            source => Self::Issuance { context, source },
        }
    }

    /// Whether the run may still make progress after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RetryableTransfer { .. } | Self::Pending { .. } | Self::Storage(StorageError::VersionConflict { .. })
        )
    }
}

pub struct CheckRunService {
    workflows: Arc<dyn WorkflowStore>,
    issuer: CheckIssuer,
    transfers: FileTransferService,
    audit: AuditTrail,
    config: CheckRunConfig,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CheckRunService {
    pub fn new(storage: &Storage, config: CheckRunConfig, retry: TransferRetryConfig) -> Self {
        let audit = AuditTrail::new(storage.audit.clone());
        let issuer = CheckIssuer::new(storage.checks.clone(), storage.sequences.clone(), audit.clone());
        let transfers = FileTransferService::new(
            FileTransferAuditor::new(storage.transfers.clone()),
            retry,
            config.payment_destination.clone(),
        );
        Self {
            workflows: storage.workflows.clone(),
            issuer,
            transfers,
            audit,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CheckRunConfig {
        &self.config
    }

    pub fn transfers(&self) -> &FileTransferService {
        &self.transfers
    }

    pub fn issuer(&self) -> &CheckIssuer {
        &self.issuer
    }

    /// Open a run for (`profit_year`, `check_run_date`).
    pub async fn start_run(
        &self,
        profit_year: ProfitYear,
        check_run_date: NaiveDate,
        actor: &Actor,
    ) -> Result<CheckRunWorkflow> {
        if let Some(existing) = self.workflows.find_active(profit_year, check_run_date).await? {
            return Err(CheckRunError::Duplicate {
                profit_year,
                check_run_date,
                existing: existing.context(),
            });
        }

        let run = CheckRunWorkflow::new(profit_year, check_run_date, self.config.max_reprint_count, actor);
        match self.workflows.create(&run).await {
            Ok(()) => {}
            Err(StorageError::Duplicate { .. }) => {
                // Lost a race with another starter.
                let existing = self
                    .workflows
                    .find_active(profit_year, check_run_date)
                    .await?
                    .map_or(run.context(), |r| r.context());
                return Err(CheckRunError::Duplicate {
                    profit_year,
                    check_run_date,
                    existing,
                });
            }
            Err(e) => return Err(e.into()),
        }

        self.audit
            .record(
                CHECK_RUN_WORKFLOW_TABLE,
                AuditOperation::Insert,
                &run.id.to_string(),
                &json!({
                    "profit_year": run.profit_year,
                    "check_run_date": run.check_run_date,
                    "step": run.step,
                    "status": run.status,
                    "max_reprint_count": run.max_reprint_count,
                }),
                actor,
            )
            .await?;

        info!(run_id = %run.id, profit_year, check_run_date = %check_run_date, "Started check run");
        Ok(run)
    }

    /// Validate and store the payee list, then move to `BalancesCalculated`.
    ///
    /// An empty list is rejected without touching the run. Any invalid
    /// payee fails the run.
    pub async fn calculate_balances(
        &self,
        run_id: Uuid,
        lines: Vec<PayeeLine>,
        actor: &Actor,
    ) -> Result<CheckRunWorkflow> {
        let _guard = self.lock_run(run_id).await;
        let mut run = self.load_live(run_id).await?;
        self.expect_step(&run, &[CheckRunStep::Created], "calculate_balances")?;

        if lines.is_empty() {
            return Err(CheckRunError::Validation {
                context: run.context(),
                reason: "no payees supplied".to_string(),
            });
        }

        let mut payees = Vec::with_capacity(lines.len());
        for (index, line) in lines.into_iter().enumerate() {
            match line.validate(index) {
                Ok(payee) => payees.push(payee),
                Err(defect) => {
                    let reason = defect.to_string();
                    let context = run.context();
                    self.fail_locked(&mut run, &reason, actor).await?;
                    return Err(CheckRunError::Validation { context, reason });
                }
            }
        }

        self.workflows.replace_payees(run.id, &payees).await?;
        let expected = run.version;
        self.apply(&mut run, Transition::Advance, actor)?;
        self.save(&run, expected, "calculate_balances", json!({ "payees": payees.len() }), actor)
            .await?;
        info!(run_id = %run.id, payees = payees.len(), step = %run.step, "Calculated balances");
        Ok(run)
    }

    /// Issue one numbered check per payee.
    ///
    /// Accepted from `BalancesCalculated`, or from `ChecksNumbered` while a
    /// reprint is still waiting for its replacement block.
    pub async fn number_checks(&self, run_id: Uuid, actor: &Actor) -> Result<Vec<ProfitShareCheck>> {
        let _guard = self.lock_run(run_id).await;
        let mut run = self.load_live(run_id).await?;
        self.expect_step(
            &run,
            &[CheckRunStep::BalancesCalculated, CheckRunStep::ChecksNumbered],
            "number_checks",
        )?;
        if !run.awaiting_check_block() {
            return Err(CheckRunError::NotAllowed {
                context: run.context(),
                operation: "number_checks",
            });
        }
        let (checks, _) = self.renumber_locked(&mut run, Local::now().date_naive(), actor).await?;
        Ok(checks)
    }

    pub async fn mark_printed(&self, run_id: Uuid, actor: &Actor) -> Result<CheckRunWorkflow> {
        let _guard = self.lock_run(run_id).await;
        let mut run = self.load_live(run_id).await?;
        self.expect_step(&run, &[CheckRunStep::ChecksNumbered], "mark_printed")?;
        if run.awaiting_check_block() {
            return Err(CheckRunError::Validation {
                context: run.context(),
                reason: "checks must be renumbered before printing".to_string(),
            });
        }

        let live = self.checks_locked(&run).await?.into_iter().filter(ProfitShareCheck::is_live).count();
        if live == 0 {
            return Err(CheckRunError::Validation {
                context: run.context(),
                reason: "run has no live checks to print".to_string(),
            });
        }

        let expected = run.version;
        self.apply(&mut run, Transition::Advance, actor)?;
        self.save(&run, expected, "mark_printed", json!({ "checks": live }), actor)
            .await?;
        info!(run_id = %run.id, checks = live, "Checks printed");
        Ok(run)
    }

    /// Send the payment file and move to `Transferred`.
    ///
    /// The run lock is held across the send. When the transport gives up the
    /// run stays `Printed`.
    pub async fn transfer(
        &self,
        run_id: Uuid,
        transport: &dyn PaymentFileTransport,
        actor: &Actor,
    ) -> Result<TransferOutcome> {
        let _guard = self.lock_run(run_id).await;
        let mut run = self.load_live(run_id).await?;
        self.expect_step(&run, &[CheckRunStep::Printed], "transfer")?;

        let file = self.live_payment_file(&run).await?;
        let outcome = match self.transfers.send(run.id, &file, transport, actor).await {
            Ok(outcome) => outcome,
            Err(TransferError::Exhausted {
                attempts, last_error, ..
            }) => {
                warn!(run_id = %run.id, attempts, error = %last_error, "Run stays printed after failed transfer");
                return Err(CheckRunError::RetryableTransfer {
                    context: run.context(),
                    reason: last_error,
                });
            }
            Err(TransferError::Storage(e)) => return Err(e.into()),
        };

        let expected = run.version;
        self.apply(&mut run, Transition::Advance, actor)?;
        self.save(
            &run,
            expected,
            "transfer",
            json!({
                "file_name": outcome.file_name,
                "digest": outcome.digest,
                "attempts": outcome.attempts,
            }),
            actor,
        )
        .await?;
        Ok(outcome)
    }

    /// Void the run's live checks, number replacements and return to
    /// `ChecksNumbered`.
    ///
    /// Fails the run once `max_reprint_count` reprints have been used.
    pub async fn reprint(&self, run_id: Uuid, reason: &str, actor: &Actor) -> Result<Vec<ProfitShareCheck>> {
        let _guard = self.lock_run(run_id).await;
        let mut run = self.load_live(run_id).await?;
        self.expect_step(&run, &[CheckRunStep::Printed, CheckRunStep::Transferred], "reprint")?;

        let today = Local::now().date_naive();
        if self.config.same_day_reprint_only && today != run.check_run_date {
            return Err(CheckRunError::Validation {
                context: run.context(),
                reason: format!("reprints are only allowed on the run date {}", run.check_run_date),
            });
        }

        let expected = run.version;
        match run.apply(Transition::Reprint, actor) {
            Ok(()) => {}
            Err(TransitionError::ReprintLimit { count, max }) => {
                let context = run.context();
                error!(run_id = %run.id, count, max, "Reprint limit exceeded, failing run");
                self.fail_locked(&mut run, &format!("reprint limit of {max} exceeded"), actor)
                    .await?;
                return Err(CheckRunError::ReprintLimitExceeded { context, max });
            }
            Err(e) => return Err(CheckRunError::transition(run.context(), e)),
        }

        // Saved before voiding; `number_checks` finishes an interrupted reprint.
        self.save(
            &run,
            expected,
            "reprint",
            json!({ "reason": reason, "reprint_count": run.reprint_count }),
            actor,
        )
        .await?;

        let (checks, voided) = self.renumber_locked(&mut run, today, actor).await?;
        info!(
            run_id = %run.id,
            reprint_count = run.reprint_count,
            voided,
            reason,
            "Reprinted checks"
        );
        Ok(checks)
    }

    /// Move to `Confirmed` once a successful transfer of the current
    /// payment file is on record. Otherwise `Pending`.
    pub async fn confirm(&self, run_id: Uuid, actor: &Actor) -> Result<CheckRunWorkflow> {
        let _guard = self.lock_run(run_id).await;
        let mut run = self.load_live(run_id).await?;
        self.expect_step(&run, &[CheckRunStep::Transferred], "confirm")?;

        let file = self.live_payment_file(&run).await?;
        if !self
            .transfers
            .auditor()
            .has_successful_transfer(run.id, &file.digest)
            .await?
        {
            return Err(CheckRunError::Pending { context: run.context() });
        }

        let expected = run.version;
        self.apply(&mut run, Transition::Advance, actor)?;
        self.save(&run, expected, "confirm", json!({ "digest": file.digest }), actor)
            .await?;
        info!(run_id = %run.id, reprint_count = run.reprint_count, "Check run confirmed");
        Ok(run)
    }

    /// Poll [`confirm`](Self::confirm) until it succeeds or `timeout` elapses.
    pub async fn await_confirmation(&self, run_id: Uuid, timeout: Duration, actor: &Actor) -> Result<CheckRunWorkflow> {
        let deadline = tokio::time::Instant::now() + timeout;
        let poll = self.config.confirmation_poll_interval();
        loop {
            match self.confirm(run_id, actor).await {
                Err(CheckRunError::Pending { context }) => {
                    let now = tokio::time::Instant::now();
                    if now >= deadline {
                        warn!(run_id = %run_id, timeout = ?timeout, "Confirmation timed out");
                        return Err(CheckRunError::Pending { context });
                    }
                    tokio::time::sleep(poll.min(deadline - now)).await;
                }
                other => return other,
            }
        }
    }

    pub async fn fail(&self, run_id: Uuid, reason: &str, actor: &Actor) -> Result<CheckRunWorkflow> {
        let _guard = self.lock_run(run_id).await;
        let mut run = self.load_live(run_id).await?;
        self.fail_locked(&mut run, reason, actor).await?;
        Ok(run)
    }

    pub async fn get(&self, run_id: Uuid) -> Result<CheckRunWorkflow> {
        self.workflows
            .get(run_id)
            .await?
            .ok_or(CheckRunError::NotFound(run_id))
    }

    pub async fn active_run(
        &self,
        profit_year: ProfitYear,
        check_run_date: NaiveDate,
    ) -> Result<Option<CheckRunWorkflow>> {
        Ok(self.workflows.find_active(profit_year, check_run_date).await?)
    }

    pub async fn list_for_year(&self, profit_year: ProfitYear) -> Result<Vec<CheckRunWorkflow>> {
        Ok(self.workflows.list_for_year(profit_year).await?)
    }

    /// Every check issued for the run, voided ones included.
    pub async fn checks(&self, run_id: Uuid) -> Result<Vec<ProfitShareCheck>> {
        let run = self.get(run_id).await?;
        self.checks_locked(&run).await
    }

    pub async fn payees(&self, run_id: Uuid) -> Result<Vec<CheckPayee>> {
        Ok(self.workflows.payees(run_id).await?)
    }

    /// The payment file for the run's current live checks.
    pub async fn payment_file(&self, run_id: Uuid) -> Result<PaymentFile> {
        let run = self.get(run_id).await?;
        Ok(PaymentFile::build(&run, &self.checks_locked(&run).await?))
    }

    async fn lock_run(&self, run_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(run_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    async fn load_live(&self, run_id: Uuid) -> Result<CheckRunWorkflow> {
        let run = self.get(run_id).await?;
        if run.is_terminal() {
            self.locks.lock().await.remove(&run_id);
            return Err(CheckRunError::IrreversibleState { context: run.context() });
        }
        Ok(run)
    }

    fn expect_step(&self, run: &CheckRunWorkflow, allowed: &[CheckRunStep], operation: &'static str) -> Result<()> {
        if allowed.contains(&run.step) {
            Ok(())
        } else {
            Err(CheckRunError::NotAllowed {
                context: run.context(),
                operation,
            })
        }
    }

    fn apply(&self, run: &mut CheckRunWorkflow, transition: Transition, actor: &Actor) -> Result<()> {
        run.apply(transition, actor)
            .map_err(|e| CheckRunError::transition(run.context(), e))
    }

    async fn checks_locked(&self, run: &CheckRunWorkflow) -> Result<Vec<ProfitShareCheck>> {
        self.issuer
            .list_for_run(run.id)
            .await
            .map_err(|e| CheckRunError::issuance(run.context(), e))
    }

    /// Void whatever is still live, issue a block for the run's payees and
    /// save. Voided checks nothing replaces yet get linked replacements.
    async fn renumber_locked(
        &self,
        run: &mut CheckRunWorkflow,
        on: NaiveDate,
        actor: &Actor,
    ) -> Result<(Vec<ProfitShareCheck>, usize)> {
        let voided = self
            .issuer
            .void_live_for_run(run.id, on, actor)
            .await
            .map_err(|e| CheckRunError::issuance(run.context(), e))?
            .len();

        let existing = self.checks_locked(run).await?;
        let replaced: HashSet<i64> = existing.iter().filter_map(|c| c.replace_check).collect();
        let replacing: Vec<ProfitShareCheck> = existing
            .into_iter()
            .filter(|c| c.void_flag && !replaced.contains(&c.check_number))
            .collect();

        let payees = self.workflows.payees(run.id).await?;
        let expected = run.version;
        let checks = self.issue_locked(run, &payees, &replacing, actor).await?;
        if run.step == CheckRunStep::BalancesCalculated {
            self.apply(run, Transition::Advance, actor)?;
        }
        self.save(
            run,
            expected,
            "number_checks",
            json!({
                "first_check_number": run.check_number,
                "checks": checks.len(),
                "voided": voided,
            }),
            actor,
        )
        .await?;
        Ok((checks, voided))
    }

    /// The run's payment file, refusing one without live checks.
    async fn live_payment_file(&self, run: &CheckRunWorkflow) -> Result<PaymentFile> {
        let file = PaymentFile::build(run, &self.checks_locked(run).await?);
        if file.checks == 0 {
            return Err(CheckRunError::Validation {
                context: run.context(),
                reason: "payment file has no live checks".to_string(),
            });
        }
        Ok(file)
    }

    async fn issue_locked(
        &self,
        run: &mut CheckRunWorkflow,
        payees: &[CheckPayee],
        replacing: &[ProfitShareCheck],
        actor: &Actor,
    ) -> Result<Vec<ProfitShareCheck>> {
        let checks = self
            .issuer
            .issue(run, payees, replacing, actor)
            .await
            .map_err(|e| CheckRunError::issuance(run.context(), e))?;
        let first = checks.iter().map(|c| c.check_number).min().ok_or_else(|| {
            CheckRunError::issuance(run.context(), IssuanceError::NoPayees)
        })?;
        run.record_check_block(first, actor)
            .map_err(|e| CheckRunError::transition(run.context(), e))?;
        Ok(checks)
    }

    async fn fail_locked(&self, run: &mut CheckRunWorkflow, reason: &str, actor: &Actor) -> Result<()> {
        let expected = run.version;
        run.apply(
            Transition::Fail {
                reason: reason.to_string(),
            },
            actor,
        )
        .map_err(|e| CheckRunError::transition(run.context(), e))?;
        self.save(run, expected, "fail", json!({ "reason": reason }), actor)
            .await?;
        warn!(run_id = %run.id, step = %run.step, reason, "Check run failed");
        Ok(())
    }

    async fn save(
        &self,
        run: &CheckRunWorkflow,
        expected_version: u32,
        operation: &str,
        details: serde_json::Value,
        actor: &Actor,
    ) -> Result<()> {
        self.audit
            .record(
                CHECK_RUN_WORKFLOW_TABLE,
                AuditOperation::Update,
                &run.id.to_string(),
                &json!({
                    "operation": operation,
                    "step": run.step,
                    "status": run.status,
                    "reprint_count": run.reprint_count,
                    "check_number": run.check_number,
                    "version": run.version,
                    "failure_reason": run.failure_reason,
                    "details": details,
                }),
                actor,
            )
            .await?;
        self.workflows.update(run, expected_version).await?;
        if run.is_terminal() {
            self.locks.lock().await.remove(&run.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
