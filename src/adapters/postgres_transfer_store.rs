//! Postgres implementation of TransferStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{TransferFilter, TransferRecord};
use crate::ports::{StoreError, StoreResult, TransferLock, TransferStore};

/// Postgres-backed transfer store.
#[derive(Clone)]
pub struct PostgresTransferStore {
    pool: PgPool,
}

impl PostgresTransferStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TransferStore for PostgresTransferStore {
    async fn insert(&self, record: &TransferRecord) -> StoreResult<TransferRecord> {
        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            INSERT INTO transfers (
                id, source_address, destination_address, amount, kind,
                credential_reference, lifecycle_status, network_signature, confirmation_state,
                block_reference, network_fee, network_name, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(&record.source_address)
        .bind(&record.destination_address)
        .bind(&record.amount)
        .bind(&record.kind)
        .bind(&record.credential_reference)
        .bind(record.lifecycle_status.as_str())
        .bind(&record.network_signature)
        .bind(record.confirmation_state.map(|s| s.as_str()))
        .bind(record.block_reference)
        .bind(&record.network_fee)
        .bind(&record.network_name)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain()?)
    }

    async fn get(&self, id: Uuid) -> StoreResult<TransferRecord> {
        let row = sqlx::query_as::<_, TransferRow>("SELECT * FROM transfers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.into_domain()?),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn list(&self, filter: &TransferFilter) -> StoreResult<Vec<TransferRecord>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT * FROM transfers
            WHERE ($1::text IS NULL OR source_address = $1)
              AND ($2::text IS NULL OR destination_address = $2)
              AND ($3::text IS NULL OR lifecycle_status = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(&filter.source_address)
        .bind(&filter.destination_address)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_domain().map_err(StoreError::from))
            .collect()
    }

    async fn lock(&self, id: Uuid) -> StoreResult<Box<dyn TransferLock>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransferRow>(
            "SELECT * FROM transfers WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(id));
        };

        Ok(Box::new(PostgresTransferLock {
            tx: Some(tx),
            record: row.into_domain()?,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Row lock held by an open transaction. Dropping the transaction rolls back.
struct PostgresTransferLock {
    tx: Option<Transaction<'static, Postgres>>,
    record: TransferRecord,
}

#[async_trait]
impl TransferLock for PostgresTransferLock {
    fn record(&self) -> &TransferRecord {
        &self.record
    }

    async fn commit(&mut self, mut next: TransferRecord) -> StoreResult<TransferRecord> {
        self.record
            .check_frozen_fields(&next)
            .map_err(StoreError::Frozen)?;
        let mut tx = self.tx.take().ok_or(StoreError::Released)?;
        next.updated_at = Utc::now();

        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            UPDATE transfers SET
                source_address = $2,
                destination_address = $3,
                amount = $4,
                lifecycle_status = $5,
                network_signature = $6,
                confirmation_state = $7,
                block_reference = $8,
                network_fee = $9,
                updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(self.record.id)
        .bind(&next.source_address)
        .bind(&next.destination_address)
        .bind(&next.amount)
        .bind(next.lifecycle_status.as_str())
        .bind(&next.network_signature)
        .bind(next.confirmation_state.map(|s| s.as_str()))
        .bind(next.block_reference)
        .bind(&next.network_fee)
        .bind(next.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.record = row.into_domain()?;
        Ok(self.record.clone())
    }

    async fn delete(&mut self) -> StoreResult<()> {
        let mut tx = self.tx.take().ok_or(StoreError::Released)?;

        sqlx::query("DELETE FROM transfers WHERE id = $1")
            .bind(self.record.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransferRow {
    id: Uuid,
    source_address: String,
    destination_address: String,
    amount: BigDecimal,
    kind: String,
    credential_reference: String,
    lifecycle_status: String,
    network_signature: Option<String>,
    confirmation_state: Option<String>,
    block_reference: Option<i64>,
    network_fee: Option<BigDecimal>,
    network_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransferRow {
    fn into_domain(self) -> Result<TransferRecord, sqlx::Error> {
        let lifecycle_status = self
            .lifecycle_status
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?;
        let confirmation_state = self
            .confirmation_state
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?;

        Ok(TransferRecord {
            id: self.id,
            source_address: self.source_address,
            destination_address: self.destination_address,
            amount: self.amount,
            kind: self.kind,
            credential_reference: self.credential_reference,
            lifecycle_status,
            network_signature: self.network_signature,
            confirmation_state,
            block_reference: self.block_reference,
            network_fee: self.network_fee,
            network_name: self.network_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
