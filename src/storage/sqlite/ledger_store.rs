//! SQLite LedgerStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, Order, Query, SelectStatement, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::domain::{Actor, PostingEntry, PostingKind, ProfitCode, ProfitDetail, ProfitYear, Ssn, TaxCode};
use crate::interfaces::ledger_store::{LedgerStore, Result, StorageError};
use crate::storage::helpers::{is_unique_violation, narrow, parse_decimal, parse_timestamp, timestamp_to_text};
use crate::storage::schema::{ProfitDetail as Pd, CREATE_PROFIT_DETAIL_TABLE};

const TABLE: &str = "profit_detail";

/// SQLite implementation of LedgerStore.
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new SQLite ledger store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_PROFIT_DETAIL_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    fn select() -> SelectStatement {
        Query::select()
            .columns([
                Pd::Id,
                Pd::Ssn,
                Pd::ProfitYear,
                Pd::ProfitYearIteration,
                Pd::ProfitCodeId,
                Pd::DistributionSequence,
                Pd::Contribution,
                Pd::Earnings,
                Pd::Forfeiture,
                Pd::FederalTaxes,
                Pd::StateTaxes,
                Pd::MonthToDate,
                Pd::YearToDate,
                Pd::Remark,
                Pd::ZeroContributionReasonId,
                Pd::TaxCodeId,
                Pd::YearsOfServiceCredit,
                Pd::ReversedFromProfitDetailId,
                Pd::ReversalReason,
                Pd::CreatedAt,
                Pd::UserName,
            ])
            .from(Pd::Table)
            .to_owned()
    }

    fn decode(row: &SqliteRow) -> Result<ProfitDetail> {
        let ssn: i64 = row.try_get("ssn")?;
        let code: i64 = row.try_get("profit_code_id")?;
        let tax_code: Option<String> = row.try_get("tax_code_id")?;
        let zero_reason: Option<i64> = row.try_get("zero_contribution_reason_id")?;

        let entry = PostingEntry {
            ssn: Ssn::try_from(ssn).map_err(|e| StorageError::corrupt(TABLE, e))?,
            profit_year: narrow(TABLE, "profit_year", row.try_get::<i64, _>("profit_year")?)?,
            profit_year_iteration: narrow(TABLE, "profit_year_iteration", row.try_get::<i64, _>("profit_year_iteration")?)?,
            profit_code: ProfitCode::try_from(narrow::<i64, u8>(TABLE, "profit_code_id", code)?)
                .map_err(|e| StorageError::corrupt(TABLE, e))?,
            distribution_sequence: narrow(TABLE, "distribution_sequence", row.try_get::<i64, _>("distribution_sequence")?)?,
            contribution: parse_decimal(TABLE, &row.try_get::<String, _>("contribution")?)?,
            earnings: parse_decimal(TABLE, &row.try_get::<String, _>("earnings")?)?,
            forfeiture: parse_decimal(TABLE, &row.try_get::<String, _>("forfeiture")?)?,
            federal_taxes: parse_decimal(TABLE, &row.try_get::<String, _>("federal_taxes")?)?,
            state_taxes: parse_decimal(TABLE, &row.try_get::<String, _>("state_taxes")?)?,
            month_to_date: narrow(TABLE, "month_to_date", row.try_get::<i64, _>("month_to_date")?)?,
            year_to_date: narrow(TABLE, "year_to_date", row.try_get::<i64, _>("year_to_date")?)?,
            remark: row.try_get("remark")?,
            zero_contribution_reason: zero_reason
                .map(|r| narrow(TABLE, "zero_contribution_reason_id", r))
                .transpose()?,
            tax_code: tax_code
                .map(|t| t.parse::<TaxCode>())
                .transpose()
                .map_err(|e| StorageError::corrupt(TABLE, e))?,
            years_of_service_credit: narrow(TABLE, "years_of_service_credit", row.try_get::<i64, _>("years_of_service_credit")?)?,
        };

        let kind = match row.try_get::<Option<i64>, _>("reversed_from_profit_detail_id")? {
            Some(of) => PostingKind::Reversal {
                of,
                reason: row
                    .try_get::<Option<String>, _>("reversal_reason")?
                    .unwrap_or_default(),
            },
            None => PostingKind::Original,
        };

        Ok(ProfitDetail {
            id: row.try_get("id")?,
            entry,
            kind,
            created_at: parse_timestamp(TABLE, &row.try_get::<String, _>("created_at")?)?,
            user_name: row.try_get("user_name")?,
        })
    }

    async fn insert(
        conn: &mut SqliteConnection,
        entry: PostingEntry,
        kind: PostingKind,
        actor: &Actor,
    ) -> Result<ProfitDetail> {
        let created_at = Utc::now();
        let (reversed_from, reversal_reason) = match &kind {
            PostingKind::Reversal { of, reason } => (Some(*of), Some(reason.clone())),
            PostingKind::Original => (None, None),
        };

        let (sql, values) = Query::insert()
            .into_table(Pd::Table)
            .columns([
                Pd::Ssn,
                Pd::ProfitYear,
                Pd::ProfitYearIteration,
                Pd::ProfitCodeId,
                Pd::DistributionSequence,
                Pd::Contribution,
                Pd::Earnings,
                Pd::Forfeiture,
                Pd::FederalTaxes,
                Pd::StateTaxes,
                Pd::MonthToDate,
                Pd::YearToDate,
                Pd::Remark,
                Pd::ZeroContributionReasonId,
                Pd::TaxCodeId,
                Pd::YearsOfServiceCredit,
                Pd::ReversedFromProfitDetailId,
                Pd::ReversalReason,
                Pd::CreatedAt,
                Pd::UserName,
            ])
            .values_panic([
                i64::from(entry.ssn).into(),
                i32::from(entry.profit_year).into(),
                i32::from(entry.profit_year_iteration).into(),
                i32::from(entry.profit_code.id()).into(),
                entry.distribution_sequence.into(),
                entry.contribution.to_string().into(),
                entry.earnings.to_string().into(),
                entry.forfeiture.to_string().into(),
                entry.federal_taxes.to_string().into(),
                entry.state_taxes.to_string().into(),
                i32::from(entry.month_to_date).into(),
                i32::from(entry.year_to_date).into(),
                entry.remark.clone().into(),
                entry.zero_contribution_reason.map(i32::from).into(),
                entry.tax_code.map(|t| t.to_string()).into(),
                i32::from(entry.years_of_service_credit).into(),
                reversed_from.into(),
                reversal_reason.into(),
                timestamp_to_text(created_at).into(),
                actor.user_name().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);

        let key = entry.key();
        let result = sqlx::query_with(&sql, values)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    match reversed_from {
                        Some(of) => StorageError::AlreadyReversed(of),
                        None => StorageError::Duplicate {
                            entity: TABLE,
                            key: key.to_string(),
                        },
                    }
                } else {
                    StorageError::Database(e)
                }
            })?;

        Ok(ProfitDetail {
            id: result.last_insert_rowid(),
            entry,
            kind,
            created_at,
            user_name: actor.user_name().to_string(),
        })
    }

    async fn reverse_in_tx(
        conn: &mut SqliteConnection,
        original_id: i64,
        reason: &str,
        actor: &Actor,
    ) -> Result<ProfitDetail> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Pd::Id).eq(original_id))
            .build_sqlx(SqliteQueryBuilder);
        let original = match sqlx::query_with(&sql, values).fetch_optional(&mut *conn).await? {
            Some(row) => Self::decode(&row)?,
            None => {
                return Err(StorageError::NotFound {
                    entity: TABLE,
                    key: original_id.to_string(),
                })
            }
        };
        if original.reversal_of().is_some() {
            return Err(StorageError::ReversalOfReversal(original_id));
        }

        let (sql, values) = Query::select()
            .expr(Expr::col(Pd::Id).count())
            .from(Pd::Table)
            .and_where(Expr::col(Pd::ReversedFromProfitDetailId).eq(original_id))
            .build_sqlx(SqliteQueryBuilder);
        let reversals: i64 = sqlx::query_with(&sql, values)
            .fetch_one(&mut *conn)
            .await?
            .try_get(0)?;
        if reversals > 0 {
            return Err(StorageError::AlreadyReversed(original_id));
        }

        let (sql, values) = Query::select()
            .expr(Expr::col(Pd::DistributionSequence).max())
            .from(Pd::Table)
            .and_where(Expr::col(Pd::Ssn).eq(i64::from(original.entry.ssn)))
            .and_where(Expr::col(Pd::ProfitYear).eq(i32::from(original.entry.profit_year)))
            .and_where(Expr::col(Pd::ProfitCodeId).eq(i32::from(original.entry.profit_code.id())))
            .build_sqlx(SqliteQueryBuilder);
        let max_sequence: Option<i64> = sqlx::query_with(&sql, values)
            .fetch_one(&mut *conn)
            .await?
            .try_get(0)?;
        let next_sequence = i32::try_from(max_sequence.unwrap_or(0) + 1)
            .map_err(|_| StorageError::SequenceExhausted("distribution_sequence"))?;

        let entry = original.entry.negated(next_sequence);
        let kind = PostingKind::Reversal {
            of: original_id,
            reason: reason.to_string(),
        };
        Self::insert(conn, entry, kind, actor).await
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn append(&self, entry: PostingEntry, actor: &Actor) -> Result<ProfitDetail> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, entry, PostingKind::Original, actor).await
    }

    async fn append_reversal(&self, original_id: i64, reason: &str, actor: &Actor) -> Result<ProfitDetail> {
        // BEGIN IMMEDIATE takes the write lock before the reads, so the
        // already-reversed check and the insert see the same state.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::reverse_in_tx(&mut conn, original_id, reason, actor).await;

        match result {
            Ok(detail) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(detail)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn get(&self, id: i64) -> Result<Option<ProfitDetail>> {
        let (sql, values) = Self::select()
            .and_where(Expr::col(Pd::Id).eq(id))
            .build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_with(&sql, values).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn postings(&self, ssn: Ssn, through_year: Option<ProfitYear>) -> Result<Vec<ProfitDetail>> {
        let mut query = Self::select();
        query.and_where(Expr::col(Pd::Ssn).eq(i64::from(ssn)));
        if let Some(year) = through_year {
            query.and_where(Expr::col(Pd::ProfitYear).lte(i32::from(year)));
        }
        let (sql, values) = query.order_by(Pd::Id, Order::Asc).build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode).collect()
    }
}
