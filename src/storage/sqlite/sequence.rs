//! SQLite SequenceAllocator backed by a counter table.

use std::ops::Range;

use async_trait::async_trait;
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::interfaces::ledger_store::Result;
use crate::interfaces::{Sequence, SequenceAllocator};
use crate::storage::schema::{SequenceCounter, CREATE_SEQUENCE_COUNTER_TABLE};

pub struct SqliteSequenceAllocator {
    pool: SqlitePool,
}

impl SqliteSequenceAllocator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the counter table and seed every sequence at its start.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_SEQUENCE_COUNTER_TABLE).execute(&self.pool).await?;
        for sequence in Sequence::ALL {
            let (sql, values) = Query::insert()
                .into_table(SequenceCounter::Table)
                .columns([SequenceCounter::Name, SequenceCounter::NextValue])
                .values_panic([sequence.name().into(), sequence.start().into()])
                .on_conflict(OnConflict::column(SequenceCounter::Name).do_nothing().to_owned())
                .build_sqlx(SqliteQueryBuilder);
            sqlx::query_with(&sql, values).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn reserve(conn: &mut SqliteConnection, sequence: Sequence, count: u32) -> Result<Range<i64>> {
        let (sql, values) = Query::select()
            .column(SequenceCounter::NextValue)
            .from(SequenceCounter::Table)
            .and_where(Expr::col(SequenceCounter::Name).eq(sequence.name()))
            .build_sqlx(SqliteQueryBuilder);
        let next: i64 = match sqlx::query_with(&sql, values).fetch_optional(&mut *conn).await? {
            Some(row) => row.try_get(0)?,
            None => sequence.start(),
        };

        let block = sequence.block_from(next, count)?;

        let (sql, values) = Query::insert()
            .into_table(SequenceCounter::Table)
            .columns([SequenceCounter::Name, SequenceCounter::NextValue])
            .values_panic([sequence.name().into(), block.end.into()])
            .on_conflict(
                OnConflict::column(SequenceCounter::Name)
                    .update_column(SequenceCounter::NextValue)
                    .to_owned(),
            )
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        Ok(block)
    }
}

#[async_trait]
impl SequenceAllocator for SqliteSequenceAllocator {
    async fn next_block(&self, sequence: Sequence, count: u32) -> Result<Range<i64>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::reserve(&mut conn, sequence, count).await;

        match result {
            Ok(block) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(block)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }
}
