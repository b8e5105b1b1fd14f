//! PostgreSQL adapter for the journey store.
//!
//! Instances live in a single `journey_instances` table keyed by the
//! identity's canonical storage key. Inserts rely on the primary key for the
//! insert-if-absent guarantee; terminal transitions and state replacement lock
//! the row for the duration of the check-then-write.

use crate::traits::JourneyInstanceStore;
use async_trait::async_trait;
use chrono::Utc;
use journey_types::{
    InstanceProperties, InstanceStatus, JourneyError, JourneyInstanceId, JourneyResult,
    StateShape, StoredInstance,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

const SELECT_COLUMNS: &str = r#"
    instance_id, shape, state, properties, completed, deleted,
    created_at, updated_at, completed_at, deleted_at
"#;

/// PostgreSQL-backed journey store.
#[derive(Clone)]
pub struct PostgresJourneyStore {
    pool: PgPool,
}

impl PostgresJourneyStore {
    /// Connect to PostgreSQL and initialize the schema.
    pub async fn connect(database_url: &str) -> JourneyResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> JourneyResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| JourneyError::Backend(format!("failed to connect postgres: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> JourneyResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> JourneyResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS journey_instances (
                storage_key TEXT PRIMARY KEY,
                journey_name TEXT NOT NULL,
                instance_id TEXT NOT NULL,
                shape TEXT NOT NULL,
                state JSONB NOT NULL,
                properties JSONB NOT NULL,
                completed BOOLEAN NOT NULL DEFAULT FALSE,
                deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ,
                deleted_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        tracing::debug!("journey_instances schema ready");
        Ok(())
    }

    /// Lock the row for `id` and check its shape.
    async fn lock_record(
        tx: &mut Transaction<'_, Postgres>,
        id: &JourneyInstanceId,
        shape: &StateShape,
    ) -> JourneyResult<StoredInstance> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM journey_instances WHERE storage_key = $1 FOR UPDATE"
        ))
        .bind(id.storage_key())
        .fetch_optional(&mut **tx)
        .await
        .map_err(backend)?
        .ok_or_else(|| JourneyError::InstanceNotFound(id.clone()))?;

        let record = row_to_record(row)?;
        record.ensure_shape(shape)?;
        Ok(record)
    }

    async fn begin(&self) -> JourneyResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(backend)
    }
}

#[async_trait]
impl JourneyInstanceStore for PostgresJourneyStore {
    async fn get(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
    ) -> JourneyResult<Option<StoredInstance>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM journey_instances WHERE storage_key = $1"
        ))
        .bind(id.storage_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => {
                let record = row_to_record(row)?;
                record.ensure_shape(shape)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
        state: serde_json::Value,
        properties: InstanceProperties,
    ) -> JourneyResult<StoredInstance> {
        let record = StoredInstance::new(id.clone(), shape.clone(), state, properties);
        let properties_json = serde_json::to_value(&record.properties)?;

        let result = sqlx::query(
            r#"
            INSERT INTO journey_instances
                (storage_key, journey_name, instance_id, shape, state, properties,
                 completed, deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, FALSE, $7, $7)
            ON CONFLICT (storage_key) DO NOTHING
            "#,
        )
        .bind(id.storage_key())
        .bind(id.journey().as_str())
        .bind(id.to_token())
        .bind(shape.as_str())
        .bind(&record.state)
        .bind(properties_json)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(JourneyError::InstanceAlreadyExists(id.clone()));
        }
        Ok(record)
    }

    async fn replace_state(
        &self,
        id: &JourneyInstanceId,
        shape: &StateShape,
        state: serde_json::Value,
    ) -> JourneyResult<()> {
        let mut tx = self.begin().await?;
        let record = Self::lock_record(&mut tx, id, shape).await?;
        record.ensure_active()?;

        sqlx::query(
            "UPDATE journey_instances SET state = $1, updated_at = $2 WHERE storage_key = $3",
        )
        .bind(state)
        .bind(Utc::now())
        .bind(id.storage_key())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }

    async fn complete(&self, id: &JourneyInstanceId, shape: &StateShape) -> JourneyResult<()> {
        let mut tx = self.begin().await?;
        let record = Self::lock_record(&mut tx, id, shape).await?;
        match record.status() {
            InstanceStatus::Completed => return Ok(()),
            InstanceStatus::Deleted => return record.ensure_active(),
            InstanceStatus::Active => {}
        }

        sqlx::query(
            r#"
            UPDATE journey_instances
               SET completed = TRUE, completed_at = $1, updated_at = $1
             WHERE storage_key = $2
            "#,
        )
        .bind(Utc::now())
        .bind(id.storage_key())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }

    async fn delete(&self, id: &JourneyInstanceId, shape: &StateShape) -> JourneyResult<()> {
        let mut tx = self.begin().await?;
        let record = Self::lock_record(&mut tx, id, shape).await?;
        match record.status() {
            InstanceStatus::Deleted => return Ok(()),
            InstanceStatus::Completed => return record.ensure_active(),
            InstanceStatus::Active => {}
        }

        sqlx::query(
            r#"
            UPDATE journey_instances
               SET deleted = TRUE, deleted_at = $1, updated_at = $1
             WHERE storage_key = $2
            "#,
        )
        .bind(Utc::now())
        .bind(id.storage_key())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }
}

fn row_to_record(row: PgRow) -> JourneyResult<StoredInstance> {
    let token: String = row.try_get("instance_id").map_err(backend)?;
    let shape: String = row.try_get("shape").map_err(backend)?;
    let properties: serde_json::Value = row.try_get("properties").map_err(backend)?;

    Ok(StoredInstance {
        id: JourneyInstanceId::parse(&token)?,
        shape: StateShape::new(shape),
        state: row.try_get("state").map_err(backend)?,
        properties: serde_json::from_value(properties)?,
        completed: row.try_get("completed").map_err(backend)?,
        deleted: row.try_get("deleted").map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
        completed_at: row.try_get("completed_at").map_err(backend)?,
        deleted_at: row.try_get("deleted_at").map_err(backend)?,
    })
}

fn backend(err: sqlx::Error) -> JourneyError {
    JourneyError::Backend(err.to_string())
}
