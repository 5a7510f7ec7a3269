//! PostgreSQL storage backend.
//!
//! Persists event records, token balances, processed-block markers, and
//! running stats. Uses `sqlx` with connection pooling.
//!
//! # Schema
//! Tables are created automatically on first connect:
//! - `eventindex_events` — normalized event records
//! - `eventindex_nft_balances` / `eventindex_erc20_balances` — token
//!   balances (NUMERIC, mutated by paired in-transaction updates)
//! - `eventindex_erc20_metadata` — token symbol/decimals rows
//! - `eventindex_processed_blocks` — live-subscriber markers
//! - `eventindex_stats` — running averages

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use eventindex_core::error::IndexerError;
use eventindex_core::repo::{
    BlockRepository, Erc20BalanceRepository, EventRepository, NftBalanceRepository, StatRepository,
};
use eventindex_core::stat::{Stat, StatKind};
use eventindex_core::types::{BalanceChange, Erc20Metadata, EventKind, NewEvent, StoredEvent};

// ─── Connection options ──────────────────────────────────────────────────────

/// Pool options for the Postgres backend.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: u32,
    /// Minimum number of idle connections to keep open (default: 1)
    pub min_connections: u32,
    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self { max_connections: 10, min_connections: 1, connect_timeout_secs: 30 }
    }
}

// ─── PostgresStorage ─────────────────────────────────────────────────────────

/// PostgreSQL-backed implementation of every repository trait.
///
/// Thread-safe and cheaply cloneable — wraps a connection pool.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect and initialize the schema.
    pub async fn connect(database_url: &str) -> Result<Self, IndexerError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| IndexerError::Storage(format!("postgres connect: {e}")))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        info!("PostgresStorage connected and schema initialized");
        Ok(storage)
    }

    /// Connect with custom pool options.
    pub async fn connect_with_options(
        database_url: &str,
        opts: PostgresOptions,
    ) -> Result<Self, IndexerError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .min_connections(opts.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(opts.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| IndexerError::Storage(format!("postgres connect: {e}")))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Get the underlying connection pool (for custom queries).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), IndexerError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS eventindex_events (
                id               BIGSERIAL PRIMARY KEY,
                kind             TEXT        NOT NULL,
                chain_id         BIGINT      NOT NULL,
                block_id         BIGINT      NOT NULL,
                address          TEXT        NOT NULL,
                data             JSONB       NOT NULL,
                related_block_id BIGINT,
                batch_id         BIGINT,
                token_id         TEXT,
                amount           TEXT,
                assigned_prover  TEXT,
                tier             INTEGER,
                transacted_at    TIMESTAMPTZ,
                indexed_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE INDEX IF NOT EXISTS idx_eventindex_events_chain_block
             ON eventindex_events(chain_id, block_id DESC)",
            "CREATE INDEX IF NOT EXISTS idx_eventindex_events_kind_related
             ON eventindex_events(chain_id, kind, related_block_id)",
            "CREATE INDEX IF NOT EXISTS idx_eventindex_events_kind_batch
             ON eventindex_events(chain_id, kind, batch_id DESC)",
            "CREATE TABLE IF NOT EXISTS eventindex_nft_balances (
                chain_id         BIGINT        NOT NULL,
                address          TEXT          NOT NULL,
                contract_address TEXT          NOT NULL,
                token_id         TEXT          NOT NULL,
                standard         TEXT          NOT NULL,
                amount           NUMERIC(78,0) NOT NULL DEFAULT 0,
                PRIMARY KEY (chain_id, address, contract_address, token_id)
            )",
            "CREATE TABLE IF NOT EXISTS eventindex_erc20_balances (
                chain_id         BIGINT        NOT NULL,
                address          TEXT          NOT NULL,
                contract_address TEXT          NOT NULL,
                amount           NUMERIC(78,0) NOT NULL DEFAULT 0,
                PRIMARY KEY (chain_id, address, contract_address)
            )",
            "CREATE TABLE IF NOT EXISTS eventindex_erc20_metadata (
                id               BIGSERIAL PRIMARY KEY,
                chain_id         BIGINT  NOT NULL,
                contract_address TEXT    NOT NULL,
                symbol           TEXT    NOT NULL,
                decimals         INTEGER NOT NULL,
                UNIQUE (chain_id, contract_address)
            )",
            "CREATE TABLE IF NOT EXISTS eventindex_processed_blocks (
                chain_id     BIGINT NOT NULL,
                event_kind   TEXT   NOT NULL,
                block_height BIGINT NOT NULL,
                PRIMARY KEY (chain_id, event_kind)
            )",
            "CREATE TABLE IF NOT EXISTS eventindex_stats (
                chain_id BIGINT NOT NULL,
                kind     TEXT   NOT NULL,
                average  TEXT   NOT NULL,
                count    BIGINT NOT NULL,
                PRIMARY KEY (chain_id, kind)
            )",
        ];
        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| IndexerError::Storage(e.to_string()))?;
        }
        debug!("PostgresStorage schema initialized");
        Ok(())
    }

    fn row_to_event(row: &sqlx::postgres::PgRow) -> Result<StoredEvent, IndexerError> {
        let storage_err = |e: sqlx::Error| IndexerError::Storage(e.to_string());

        let kind: String = row.try_get("kind").map_err(storage_err)?;
        let kind: EventKind = kind
            .parse()
            .map_err(|e: String| IndexerError::Storage(e))?;

        let event = NewEvent {
            kind,
            chain_id: row.try_get::<i64, _>("chain_id").map_err(storage_err)? as u64,
            block_id: row.try_get::<i64, _>("block_id").map_err(storage_err)? as u64,
            address: row.try_get("address").map_err(storage_err)?,
            data: row.try_get("data").map_err(storage_err)?,
            related_block_id: row
                .try_get::<Option<i64>, _>("related_block_id")
                .map_err(storage_err)?
                .map(|v| v as u64),
            batch_id: row
                .try_get::<Option<i64>, _>("batch_id")
                .map_err(storage_err)?
                .map(|v| v as u64),
            token_id: row.try_get("token_id").map_err(storage_err)?,
            amount: row.try_get("amount").map_err(storage_err)?,
            assigned_prover: row.try_get("assigned_prover").map_err(storage_err)?,
            tier: row
                .try_get::<Option<i32>, _>("tier")
                .map_err(storage_err)?
                .map(|v| v as u16),
            transacted_at: row
                .try_get::<Option<DateTime<Utc>>, _>("transacted_at")
                .map_err(storage_err)?,
        };
        Ok(StoredEvent { id: row.try_get("id").map_err(storage_err)?, event })
    }

    /// Apply one side of a balance pair inside the given transaction.
    /// `sign` is `""` for an increase and `"-"` for a decrease.
    async fn apply_balance(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        change: &BalanceChange,
        sign: &str,
    ) -> Result<(), IndexerError> {
        let delta = format!("{sign}{}", change.amount);
        match change.token_id.as_deref() {
            Some(token_id) => {
                sqlx::query(
                    "INSERT INTO eventindex_nft_balances
                        (chain_id, address, contract_address, token_id, standard, amount)
                     VALUES ($1, $2, $3, $4, $5, $6::numeric)
                     ON CONFLICT (chain_id, address, contract_address, token_id)
                     DO UPDATE SET amount = eventindex_nft_balances.amount + EXCLUDED.amount",
                )
                .bind(change.chain_id as i64)
                .bind(&change.address)
                .bind(&change.contract_address)
                .bind(token_id)
                .bind(format!("{:?}", change.standard).to_lowercase())
                .bind(delta)
                .execute(&mut **tx)
                .await
                .map_err(|e| IndexerError::Storage(e.to_string()))?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO eventindex_erc20_balances
                        (chain_id, address, contract_address, amount)
                     VALUES ($1, $2, $3, $4::numeric)
                     ON CONFLICT (chain_id, address, contract_address)
                     DO UPDATE SET amount = eventindex_erc20_balances.amount + EXCLUDED.amount",
                )
                .bind(change.chain_id as i64)
                .bind(&change.address)
                .bind(&change.contract_address)
                .bind(delta)
                .execute(&mut **tx)
                .await
                .map_err(|e| IndexerError::Storage(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn balance_pair(
        &self,
        increase: Option<BalanceChange>,
        decrease: Option<BalanceChange>,
    ) -> Result<(), IndexerError> {
        if increase.is_none() && decrease.is_none() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        if let Some(change) = &increase {
            Self::apply_balance(&mut tx, change, "").await?;
        }
        if let Some(change) = &decrease {
            Self::apply_balance(&mut tx, change, "-").await?;
        }
        tx.commit()
            .await
            .map_err(|e| IndexerError::Storage(format!("commit balance pair: {e}")))
    }
}

// ─── EventRepository ─────────────────────────────────────────────────────────

#[async_trait]
impl EventRepository for PostgresStorage {
    async fn save(&self, event: NewEvent) -> Result<StoredEvent, IndexerError> {
        let row = sqlx::query(
            "INSERT INTO eventindex_events
                (kind, chain_id, block_id, address, data, related_block_id, batch_id,
                 token_id, amount, assigned_prover, tier, transacted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING id",
        )
        .bind(event.kind.as_str())
        .bind(event.chain_id as i64)
        .bind(event.block_id as i64)
        .bind(&event.address)
        .bind(&event.data)
        .bind(event.related_block_id.map(|v| v as i64))
        .bind(event.batch_id.map(|v| v as i64))
        .bind(&event.token_id)
        .bind(&event.amount)
        .bind(&event.assigned_prover)
        .bind(event.tier.map(i32::from))
        .bind(event.transacted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let id: i64 = row.try_get("id").map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(StoredEvent { id, event })
    }

    async fn find_latest_block_id(&self, chain_id: u64) -> Result<u64, IndexerError> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(block_id), 0) AS latest
             FROM eventindex_events WHERE chain_id = $1",
        )
        .bind(chain_id as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(row.try_get::<i64, _>("latest").map_err(|e| IndexerError::Storage(e.to_string()))?
            as u64)
    }

    async fn find_latest_block_id_by_kind(
        &self,
        chain_id: u64,
        kind: EventKind,
    ) -> Result<u64, IndexerError> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(block_id), 0) AS latest
             FROM eventindex_events WHERE chain_id = $1 AND kind = $2",
        )
        .bind(chain_id as i64)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(row.try_get::<i64, _>("latest").map_err(|e| IndexerError::Storage(e.to_string()))?
            as u64)
    }

    async fn delete_all_after_block_id(
        &self,
        chain_id: u64,
        block_id: u64,
    ) -> Result<u64, IndexerError> {
        let result = sqlx::query(
            "DELETE FROM eventindex_events
             WHERE chain_id = $1 AND block_id >= $2",
        )
        .bind(chain_id as i64)
        .bind(block_id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        debug!(
            chain_id,
            from_block = block_id,
            deleted = result.rows_affected(),
            "rolled back events"
        );
        Ok(result.rows_affected())
    }

    async fn find_by_kind_and_block_id(
        &self,
        chain_id: u64,
        kind: EventKind,
        block_id: u64,
    ) -> Result<Option<StoredEvent>, IndexerError> {
        let row = sqlx::query(
            "SELECT * FROM eventindex_events
             WHERE chain_id = $1 AND kind = $2 AND related_block_id = $3
             LIMIT 1",
        )
        .bind(chain_id as i64)
        .bind(kind.as_str())
        .bind(block_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        row.as_ref().map(Self::row_to_event).transpose()
    }

    async fn find_by_kind_and_batch_id(
        &self,
        chain_id: u64,
        kind: EventKind,
        batch_id: u64,
    ) -> Result<Option<StoredEvent>, IndexerError> {
        let row = sqlx::query(
            "SELECT * FROM eventindex_events
             WHERE chain_id = $1 AND kind = $2 AND batch_id = $3
             LIMIT 1",
        )
        .bind(chain_id as i64)
        .bind(kind.as_str())
        .bind(batch_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        row.as_ref().map(Self::row_to_event).transpose()
    }

    async fn find_latest_by_kind(
        &self,
        chain_id: u64,
        kind: EventKind,
    ) -> Result<Option<StoredEvent>, IndexerError> {
        let row = sqlx::query(
            "SELECT * FROM eventindex_events
             WHERE chain_id = $1 AND kind = $2
             ORDER BY batch_id DESC NULLS LAST, id DESC
             LIMIT 1",
        )
        .bind(chain_id as i64)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        row.as_ref().map(Self::row_to_event).transpose()
    }

    async fn delete(&self, id: i64) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM eventindex_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }
}

// ─── Balance repositories ────────────────────────────────────────────────────

#[async_trait]
impl NftBalanceRepository for PostgresStorage {
    async fn increase_and_decrease_balances_in_tx(
        &self,
        increase: Option<BalanceChange>,
        decrease: Option<BalanceChange>,
    ) -> Result<(), IndexerError> {
        self.balance_pair(increase, decrease).await
    }
}

#[async_trait]
impl Erc20BalanceRepository for PostgresStorage {
    async fn find_metadata(
        &self,
        chain_id: u64,
        contract_address: &str,
    ) -> Result<Option<Erc20Metadata>, IndexerError> {
        let row = sqlx::query(
            "SELECT id, symbol, decimals FROM eventindex_erc20_metadata
             WHERE chain_id = $1 AND contract_address = $2",
        )
        .bind(chain_id as i64)
        .bind(contract_address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        row.map(|r| -> Result<Erc20Metadata, IndexerError> {
            let storage_err = |e: sqlx::Error| IndexerError::Storage(e.to_string());
            Ok(Erc20Metadata {
                id: r.try_get("id").map_err(storage_err)?,
                chain_id,
                contract_address: contract_address.to_string(),
                symbol: r.try_get("symbol").map_err(storage_err)?,
                decimals: r.try_get::<i32, _>("decimals").map_err(storage_err)? as u8,
            })
        })
        .transpose()
    }

    async fn create_metadata(
        &self,
        chain_id: u64,
        contract_address: &str,
        symbol: &str,
        decimals: u8,
    ) -> Result<Erc20Metadata, IndexerError> {
        let row = sqlx::query(
            "INSERT INTO eventindex_erc20_metadata (chain_id, contract_address, symbol, decimals)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (chain_id, contract_address)
             DO UPDATE SET symbol = EXCLUDED.symbol, decimals = EXCLUDED.decimals
             RETURNING id",
        )
        .bind(chain_id as i64)
        .bind(contract_address)
        .bind(symbol)
        .bind(i32::from(decimals))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(Erc20Metadata {
            id: row.try_get("id").map_err(|e| IndexerError::Storage(e.to_string()))?,
            chain_id,
            contract_address: contract_address.to_string(),
            symbol: symbol.to_string(),
            decimals,
        })
    }

    async fn increase_and_decrease_balances_in_tx(
        &self,
        increase: Option<BalanceChange>,
        decrease: Option<BalanceChange>,
    ) -> Result<(), IndexerError> {
        self.balance_pair(increase, decrease).await
    }
}

// ─── Marker / stats ──────────────────────────────────────────────────────────

#[async_trait]
impl BlockRepository for PostgresStorage {
    async fn get_latest_block_processed(
        &self,
        chain_id: u64,
        kind: &str,
    ) -> Result<u64, IndexerError> {
        let row = sqlx::query(
            "SELECT block_height FROM eventindex_processed_blocks
             WHERE chain_id = $1 AND event_kind = $2",
        )
        .bind(chain_id as i64)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(row
            .map(|r| r.try_get::<i64, _>("block_height"))
            .transpose()
            .map_err(|e| IndexerError::Storage(e.to_string()))?
            .unwrap_or(0) as u64)
    }

    async fn save(&self, chain_id: u64, kind: &str, height: u64) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO eventindex_processed_blocks (chain_id, event_kind, block_height)
             VALUES ($1, $2, $3)
             ON CONFLICT (chain_id, event_kind)
             DO UPDATE SET block_height = EXCLUDED.block_height",
        )
        .bind(chain_id as i64)
        .bind(kind)
        .bind(height as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl StatRepository for PostgresStorage {
    async fn find(&self, chain_id: u64, kind: StatKind) -> Result<Option<Stat>, IndexerError> {
        let row = sqlx::query(
            "SELECT average, count FROM eventindex_stats
             WHERE chain_id = $1 AND kind = $2",
        )
        .bind(chain_id as i64)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        row.map(|r| -> Result<Stat, IndexerError> {
            let storage_err = |e: sqlx::Error| IndexerError::Storage(e.to_string());
            Ok(Stat {
                chain_id,
                kind,
                average: r.try_get("average").map_err(storage_err)?,
                count: r.try_get::<i64, _>("count").map_err(storage_err)? as u64,
            })
        })
        .transpose()
    }

    async fn save(&self, stat: Stat) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO eventindex_stats (chain_id, kind, average, count)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (chain_id, kind)
             DO UPDATE SET average = EXCLUDED.average, count = EXCLUDED.count",
        )
        .bind(stat.chain_id as i64)
        .bind(stat.kind.as_str())
        .bind(&stat.average)
        .bind(stat.count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Integration tests require a running PostgreSQL instance.
    // Set DATABASE_URL to enable, e.g.:
    // DATABASE_URL=postgresql://localhost/eventindex_test cargo test -- --ignored

    use super::*;
    use eventindex_core::types::TokenStandard;

    fn test_event(chain_id: u64, block_id: u64) -> NewEvent {
        NewEvent::new(
            EventKind::BlockProposed,
            chain_id,
            block_id,
            "0xabc",
            serde_json::json!({"blockId": block_id}),
        )
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL (set DATABASE_URL to enable)"]
    async fn event_roundtrip_and_rollback() {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for integration tests");
        let storage = PostgresStorage::connect(&url).await.unwrap();

        let chain_id = 990_001;
        for block in 100..=105 {
            EventRepository::save(&storage, test_event(chain_id, block)).await.unwrap();
        }
        assert_eq!(storage.find_latest_block_id(chain_id).await.unwrap(), 105);

        let deleted = storage.delete_all_after_block_id(chain_id, 100).await.unwrap();
        assert_eq!(deleted, 6);
        assert_eq!(storage.find_latest_block_id(chain_id).await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL (set DATABASE_URL to enable)"]
    async fn paired_balance_updates_commit_together() {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for integration tests");
        let storage = PostgresStorage::connect(&url).await.unwrap();

        let chain_id = 990_002;
        let change = |address: &str| BalanceChange {
            chain_id,
            address: address.to_string(),
            contract_address: "0xtoken".to_string(),
            standard: TokenStandard::Erc721,
            token_id: Some("1".to_string()),
            amount: "1".to_string(),
        };

        NftBalanceRepository::increase_and_decrease_balances_in_tx(
            &storage,
            Some(change("0xb0b")),
            Some(change("0xa11ce")),
        )
        .await
        .unwrap();

        let row = sqlx::query(
            "SELECT SUM(amount)::TEXT AS total FROM eventindex_nft_balances WHERE chain_id = $1",
        )
        .bind(chain_id as i64)
        .fetch_one(storage.pool())
        .await
        .unwrap();
        let total: String = row.try_get("total").unwrap();
        assert_eq!(total, "0"); // symmetric pair nets to zero

        sqlx::query("DELETE FROM eventindex_nft_balances WHERE chain_id = $1")
            .bind(chain_id as i64)
            .execute(storage.pool())
            .await
            .unwrap();
    }
}
