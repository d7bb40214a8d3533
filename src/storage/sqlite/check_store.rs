//! SQLite CheckStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SelectStatement, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{CheckAction, NewCheck, ProfitShareCheck, Ssn, TaxCode};
use crate::interfaces::ledger_store::{Result, StorageError};
use crate::interfaces::CheckStore;
use crate::storage::helpers::{
    date_to_text, is_unique_violation, parse_date, parse_decimal, parse_optional_date, parse_uuid,
};
use crate::storage::schema::{ProfitShareCheck as Psc, CREATE_PROFIT_SHARE_CHECK_TABLE};

const TABLE: &str = "profit_share_check";

pub struct SqliteCheckStore {
    pool: SqlitePool,
}

impl SqliteCheckStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_PROFIT_SHARE_CHECK_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    fn select() -> SelectStatement {
        Query::select()
            .columns([
                Psc::Id,
                Psc::CheckNumber,
                Psc::PscCheckId,
                Psc::CheckRunWorkflowId,
                Psc::Ssn,
                Psc::DemographicId,
                Psc::PayableName,
                Psc::CheckAmount,
                Psc::TaxCodeId,
                Psc::CheckDate,
                Psc::CheckRunDate,
                Psc::VoidFlag,
                Psc::VoidCheckDate,
                Psc::VoidReconDate,
                Psc::ClearDate,
                Psc::ClearDateLoaded,
                Psc::ManualCheck,
                Psc::ReplaceCheck,
                Psc::OtherBeneficiary,
                Psc::UserName,
            ])
            .from(Psc::Table)
            .to_owned()
    }

    fn decode(row: &SqliteRow) -> Result<ProfitShareCheck> {
        let ssn: i64 = row.try_get("ssn")?;
        let run_id: Option<String> = row.try_get("check_run_workflow_id")?;
        let tax_code: String = row.try_get("tax_code_id")?;

        Ok(ProfitShareCheck {
            id: row.try_get("id")?,
            check_number: row.try_get("check_number")?,
            psc_check_id: row.try_get("psc_check_id")?,
            check_run_workflow_id: run_id.map(|id| parse_uuid(TABLE, &id)).transpose()?,
            ssn: Ssn::try_from(ssn).map_err(|e| StorageError::corrupt(TABLE, e))?,
            demographic_id: row.try_get("demographic_id")?,
            payable_name: row.try_get("payable_name")?,
            check_amount: parse_decimal(TABLE, &row.try_get::<String, _>("check_amount")?)?,
            tax_code: tax_code.parse::<TaxCode>().map_err(|e| StorageError::corrupt(TABLE, e))?,
            check_date: parse_date(TABLE, &row.try_get::<String, _>("check_date")?)?,
            check_run_date: parse_date(TABLE, &row.try_get::<String, _>("check_run_date")?)?,
            void_flag: row.try_get("void_flag")?,
            void_check_date: parse_optional_date(TABLE, row.try_get("void_check_date")?)?,
            void_recon_date: parse_optional_date(TABLE, row.try_get("void_recon_date")?)?,
            clear_date: parse_optional_date(TABLE, row.try_get("clear_date")?)?,
            clear_date_loaded: parse_optional_date(TABLE, row.try_get("clear_date_loaded")?)?,
            manual_check: row.try_get("manual_check")?,
            replace_check: row.try_get("replace_check")?,
            other_beneficiary: row.try_get("other_beneficiary")?,
            user_name: row.try_get("user_name")?,
        })
    }

    async fn insert_in_tx(conn: &mut SqliteConnection, checks: Vec<NewCheck>) -> Result<Vec<ProfitShareCheck>> {
        let mut inserted = Vec::with_capacity(checks.len());
        for check in checks {
            let (sql, values) = Query::insert()
                .into_table(Psc::Table)
                .columns([
                    Psc::CheckNumber,
                    Psc::PscCheckId,
                    Psc::CheckRunWorkflowId,
                    Psc::Ssn,
                    Psc::DemographicId,
                    Psc::PayableName,
                    Psc::CheckAmount,
                    Psc::TaxCodeId,
                    Psc::CheckDate,
                    Psc::CheckRunDate,
                    Psc::VoidFlag,
                    Psc::ManualCheck,
                    Psc::ReplaceCheck,
                    Psc::OtherBeneficiary,
                    Psc::UserName,
                ])
                .values_panic([
                    check.check_number.into(),
                    check.psc_check_id.into(),
                    check.check_run_workflow_id.map(|id| id.to_string()).into(),
                    i64::from(check.ssn).into(),
                    check.demographic_id.into(),
                    check.payable_name.clone().into(),
                    check.check_amount.to_string().into(),
                    check.tax_code.to_string().into(),
                    date_to_text(check.check_date).into(),
                    date_to_text(check.check_run_date).into(),
                    false.into(),
                    check.manual_check.into(),
                    check.replace_check.into(),
                    check.other_beneficiary.into(),
                    check.user_name.clone().into(),
                ])
                .build_sqlx(SqliteQueryBuilder);

            let number = check.check_number;
            let result = sqlx::query_with(&sql, values)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StorageError::Duplicate {
                            entity: TABLE,
                            key: format!("check_number {number}"),
                        }
                    } else {
                        StorageError::Database(e)
                    }
                })?;
            inserted.push(ProfitShareCheck::from_new(result.last_insert_rowid(), check));
        }
        Ok(inserted)
    }

    async fn apply_in_tx(conn: &mut SqliteConnection, id: i64, action: CheckAction) -> Result<ProfitShareCheck> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Psc::Id).eq(id))
            .build_sqlx(SqliteQueryBuilder);
        let mut check = match sqlx::query_with(&sql, values).fetch_optional(&mut *conn).await? {
            Some(row) => Self::decode(&row)?,
            None => {
                return Err(StorageError::NotFound {
                    entity: TABLE,
                    key: id.to_string(),
                })
            }
        };
        check.apply(action).map_err(|e| StorageError::InvalidState {
            entity: TABLE,
            key: id.to_string(),
            reason: e.to_string(),
        })?;

        let (sql, values) = Query::update()
            .table(Psc::Table)
            .values([
                (Psc::VoidFlag, check.void_flag.into()),
                (Psc::VoidCheckDate, check.void_check_date.map(date_to_text).into()),
                (Psc::VoidReconDate, check.void_recon_date.map(date_to_text).into()),
                (Psc::ClearDate, check.clear_date.map(date_to_text).into()),
                (Psc::ClearDateLoaded, check.clear_date_loaded.map(date_to_text).into()),
            ])
            .and_where(Expr::col(Psc::Id).eq(id))
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        Ok(check)
    }
}

#[async_trait]
impl CheckStore for SqliteCheckStore {
    async fn insert_batch(&self, checks: Vec<NewCheck>) -> Result<Vec<ProfitShareCheck>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::insert_in_tx(&mut conn, checks).await;

        match result {
            Ok(inserted) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(inserted)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn get(&self, id: i64) -> Result<Option<ProfitShareCheck>> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Psc::Id).eq(id))
            .build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_with(&sql, values).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn by_check_number(&self, check_number: i64) -> Result<Option<ProfitShareCheck>> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Psc::CheckNumber).eq(check_number))
            .build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_with(&sql, values).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn list_for_run(&self, run_id: Uuid) -> Result<Vec<ProfitShareCheck>> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Psc::CheckRunWorkflowId).eq(run_id.to_string()))
            .order_by(Psc::CheckNumber, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode).collect()
    }

    async fn apply(&self, id: i64, action: CheckAction) -> Result<ProfitShareCheck> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::apply_in_tx(&mut conn, id, action).await;

        match result {
            Ok(check) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(check)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }
}
