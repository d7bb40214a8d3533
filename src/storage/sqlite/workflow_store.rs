//! SQLite WorkflowStore implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_query::{Expr, Order, Query, SelectStatement, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{CheckPayee, CheckRunStep, CheckRunWorkflow, ProfitYear, Ssn, StepStatus, TaxCode};
use crate::interfaces::ledger_store::{Result, StorageError};
use crate::interfaces::WorkflowStore;
use crate::storage::helpers::{
    date_to_text, is_unique_violation, narrow, parse_date, parse_decimal, parse_timestamp, parse_uuid,
    timestamp_to_text,
};
use crate::storage::schema::{CheckRunPayee as Payee, CheckRunWorkflow as Wf, CREATE_CHECK_RUN_WORKFLOW_TABLE};

const TABLE: &str = "check_run_workflow";
const PAYEE_TABLE: &str = "check_run_payee";

pub struct SqliteWorkflowStore {
    pool: SqlitePool,
}

impl SqliteWorkflowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_CHECK_RUN_WORKFLOW_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    fn select() -> SelectStatement {
        Query::select()
            .columns([
                Wf::Id,
                Wf::ProfitYear,
                Wf::CheckRunDate,
                Wf::StepNumber,
                Wf::StepStatus,
                Wf::CheckNumber,
                Wf::ReprintCount,
                Wf::MaxReprintCount,
                Wf::Version,
                Wf::FailureReason,
                Wf::CreatedAt,
                Wf::CreatedBy,
                Wf::ModifiedAt,
                Wf::ModifiedBy,
            ])
            .from(Wf::Table)
            .to_owned()
    }

    fn decode(row: &SqliteRow) -> Result<CheckRunWorkflow> {
        let step: u8 = narrow(TABLE, "step_number", row.try_get::<i64, _>("step_number")?)?;
        let status: u8 = narrow(TABLE, "step_status", row.try_get::<i64, _>("step_status")?)?;
        let modified_at: Option<String> = row.try_get("modified_at")?;

        Ok(CheckRunWorkflow {
            id: parse_uuid(TABLE, &row.try_get::<String, _>("id")?)?,
            profit_year: narrow(TABLE, "profit_year", row.try_get::<i64, _>("profit_year")?)?,
            check_run_date: parse_date(TABLE, &row.try_get::<String, _>("check_run_date")?)?,
            step: CheckRunStep::from_number(step)
                .ok_or_else(|| StorageError::corrupt(TABLE, format!("step_number {step}")))?,
            status: StepStatus::from_id(status)
                .ok_or_else(|| StorageError::corrupt(TABLE, format!("step_status {status}")))?,
            check_number: row.try_get("check_number")?,
            reprint_count: narrow(TABLE, "reprint_count", row.try_get::<i64, _>("reprint_count")?)?,
            max_reprint_count: narrow(TABLE, "max_reprint_count", row.try_get::<i64, _>("max_reprint_count")?)?,
            version: narrow(TABLE, "version", row.try_get::<i64, _>("version")?)?,
            failure_reason: row.try_get("failure_reason")?,
            created_at: parse_timestamp(TABLE, &row.try_get::<String, _>("created_at")?)?,
            created_by: row.try_get("created_by")?,
            modified_at: modified_at.map(|t| parse_timestamp(TABLE, &t)).transpose()?,
            modified_by: row.try_get("modified_by")?,
        })
    }

    fn decode_payee(row: &SqliteRow) -> Result<CheckPayee> {
        let ssn: i64 = row.try_get("ssn")?;
        let tax_code: String = row.try_get("tax_code_id")?;
        Ok(CheckPayee {
            ssn: Ssn::try_from(ssn).map_err(|e| StorageError::corrupt(PAYEE_TABLE, e))?,
            demographic_id: row.try_get("demographic_id")?,
            payable_name: row.try_get("payable_name")?,
            amount: parse_decimal(PAYEE_TABLE, &row.try_get::<String, _>("amount")?)?,
            tax_code: tax_code
                .parse::<TaxCode>()
                .map_err(|e| StorageError::corrupt(PAYEE_TABLE, e))?,
            payment_sequence: row.try_get("payment_sequence")?,
        })
    }

    async fn update_in_tx(conn: &mut SqliteConnection, run: &CheckRunWorkflow, expected_version: u32) -> Result<()> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Wf::Id).eq(run.id.to_string()))
            .build_sqlx(SqliteQueryBuilder);
        let stored = match sqlx::query_with(&sql, values).fetch_optional(&mut *conn).await? {
            Some(row) => Self::decode(&row)?,
            None => {
                return Err(StorageError::NotFound {
                    entity: TABLE,
                    key: run.id.to_string(),
                })
            }
        };
        if stored.is_terminal() {
            return Err(StorageError::InvalidState {
                entity: TABLE,
                key: run.id.to_string(),
                reason: format!("run is {}", stored.status),
            });
        }
        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                entity: TABLE,
                key: run.id.to_string(),
                expected: expected_version,
                actual: stored.version,
            });
        }

        let (sql, values) = Query::update()
            .table(Wf::Table)
            .values([
                (Wf::StepNumber, i32::from(run.step.number()).into()),
                (Wf::StepStatus, i32::from(run.status.id()).into()),
                (Wf::CheckNumber, run.check_number.into()),
                (Wf::ReprintCount, i64::from(run.reprint_count).into()),
                (Wf::MaxReprintCount, i64::from(run.max_reprint_count).into()),
                (Wf::Version, i64::from(run.version).into()),
                (Wf::FailureReason, run.failure_reason.clone().into()),
                (Wf::ModifiedAt, run.modified_at.map(timestamp_to_text).into()),
                (Wf::ModifiedBy, run.modified_by.clone().into()),
            ])
            .and_where(Expr::col(Wf::Id).eq(run.id.to_string()))
            .and_where(Expr::col(Wf::Version).eq(i64::from(expected_version)))
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        Ok(())
    }

    async fn replace_payees_in_tx(conn: &mut SqliteConnection, run_id: Uuid, payees: &[CheckPayee]) -> Result<()> {
        let (sql, values) = Query::select()
            .expr(Expr::col(Wf::Id).count())
            .from(Wf::Table)
            .and_where(Expr::col(Wf::Id).eq(run_id.to_string()))
            .build_sqlx(SqliteQueryBuilder);
        let found: i64 = sqlx::query_with(&sql, values).fetch_one(&mut *conn).await?.try_get(0)?;
        if found == 0 {
            return Err(StorageError::NotFound {
                entity: TABLE,
                key: run_id.to_string(),
            });
        }

        let (sql, values) = Query::delete()
            .from_table(Payee::Table)
            .and_where(Expr::col(Payee::CheckRunWorkflowId).eq(run_id.to_string()))
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;

        for (line, payee) in payees.iter().enumerate() {
            let (sql, values) = Query::insert()
                .into_table(Payee::Table)
                .columns([
                    Payee::CheckRunWorkflowId,
                    Payee::LineNumber,
                    Payee::Ssn,
                    Payee::DemographicId,
                    Payee::PayableName,
                    Payee::Amount,
                    Payee::TaxCodeId,
                    Payee::PaymentSequence,
                ])
                .values_panic([
                    run_id.to_string().into(),
                    (line as i64).into(),
                    i64::from(payee.ssn).into(),
                    payee.demographic_id.into(),
                    payee.payable_name.clone().into(),
                    payee.amount.to_string().into(),
                    payee.tax_code.to_string().into(),
                    payee.payment_sequence.into(),
                ])
                .build_sqlx(SqliteQueryBuilder);
            sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for SqliteWorkflowStore {
    async fn create(&self, run: &CheckRunWorkflow) -> Result<()> {
        let (sql, values) = Query::insert()
            .into_table(Wf::Table)
            .columns([
                Wf::Id,
                Wf::ProfitYear,
                Wf::CheckRunDate,
                Wf::StepNumber,
                Wf::StepStatus,
                Wf::CheckNumber,
                Wf::ReprintCount,
                Wf::MaxReprintCount,
                Wf::Version,
                Wf::FailureReason,
                Wf::CreatedAt,
                Wf::CreatedBy,
                Wf::ModifiedAt,
                Wf::ModifiedBy,
            ])
            .values_panic([
                run.id.to_string().into(),
                i32::from(run.profit_year).into(),
                date_to_text(run.check_run_date).into(),
                i32::from(run.step.number()).into(),
                i32::from(run.status.id()).into(),
                run.check_number.into(),
                i64::from(run.reprint_count).into(),
                i64::from(run.max_reprint_count).into(),
                i64::from(run.version).into(),
                run.failure_reason.clone().into(),
                timestamp_to_text(run.created_at).into(),
                run.created_by.clone().into(),
                run.modified_at.map(timestamp_to_text).into(),
                run.modified_by.clone().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&sql, values)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::Duplicate {
                        entity: TABLE,
                        key: format!("{}/{}", run.profit_year, run.check_run_date),
                    }
                } else {
                    StorageError::Database(e)
                }
            })?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<CheckRunWorkflow>> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Wf::Id).eq(id.to_string()))
            .build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_with(&sql, values).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn find_active(&self, profit_year: ProfitYear, check_run_date: NaiveDate) -> Result<Option<CheckRunWorkflow>> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Wf::ProfitYear).eq(i32::from(profit_year)))
            .and_where(Expr::col(Wf::CheckRunDate).eq(date_to_text(check_run_date)))
            .and_where(Expr::col(Wf::StepStatus).ne(i32::from(StepStatus::Failed.id())))
            .build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_with(&sql, values).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn list_for_year(&self, profit_year: ProfitYear) -> Result<Vec<CheckRunWorkflow>> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Wf::ProfitYear).eq(i32::from(profit_year)))
            .order_by(Wf::CheckRunDate, Order::Asc)
            .order_by(Wf::CreatedAt, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode).collect()
    }

    async fn update(&self, run: &CheckRunWorkflow, expected_version: u32) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::update_in_tx(&mut conn, run, expected_version).await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(())
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn replace_payees(&self, run_id: Uuid, payees: &[CheckPayee]) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::replace_payees_in_tx(&mut conn, run_id, payees).await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(())
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn payees(&self, run_id: Uuid) -> Result<Vec<CheckPayee>> {
        let (sql, values) = Query::select()
            .columns([
                Payee::Ssn,
                Payee::DemographicId,
                Payee::PayableName,
                Payee::Amount,
                Payee::TaxCodeId,
                Payee::PaymentSequence,
            ])
            .from(Payee::Table)
            .and_where(Expr::col(Payee::CheckRunWorkflowId).eq(run_id.to_string()))
            .order_by(Payee::LineNumber, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode_payee).collect()
    }
}
