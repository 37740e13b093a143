//! PostgreSQL connector
//!
//! Every statement runs inside its own read-only transaction with a
//! transaction-local statement timeout and a search path pinned to the
//! dataset namespace. The transaction is rolled back afterwards; dropping the
//! future mid-flight rolls back as well and returns the connection.

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Row, TypeInfo};
use std::time::Duration;

use super::{Connector, ExecutionOutcome};
use crate::data::{Dataset, ResultSet, Value};

/// Pool sizing, passed explicitly to `connect_pool`
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 15,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Build the shared connection pool and check it answers
pub async fn connect_pool(
    database_url: &str,
    settings: &PoolSettings,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(database_url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct PgConnector {
    pool: PgPool,
}

impl PgConnector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn run(&self, sql: &str, dataset: &Dataset, timeout: Duration) -> ExecutionOutcome {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;

        sqlx::query("SELECT set_config('statement_timeout', $1, true)")
            .bind(format!("{}ms", timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        sqlx::query("SELECT set_config('search_path', $1, true)")
            .bind(quote_ident(&dataset.namespace))
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query(sql).fetch_all(&mut *tx).await?;

        let columns = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            // No rows means no row metadata; ask the server for the projection
            None => match (&mut *tx).describe(sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(e) => {
                    tracing::debug!("Could not describe empty result: {}", e);
                    Vec::new()
                }
            },
        };

        let rows = rows.iter().map(decode_row).collect();

        tx.rollback().await?;

        Ok(ResultSet::new(columns, rows))
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn decode_row(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .map(|column| decode_cell(row, column.ordinal(), column.type_info().name()))
        .collect()
}

/// Decode by PostgreSQL type name; unknown types fall back to text
fn decode_cell(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .map(|v| v.map(Value::Bool)),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .map(|v| v.map(|n| Value::Int64(n.into()))),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .map(|v| v.map(|n| Value::Int64(n.into()))),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(|v| v.map(Value::Int64)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map(|v| v.map(|n| Value::Float64(n.into()))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)
            .map(|v| v.map(Value::Float64)),
        "NUMERIC" => row
            .try_get::<Option<BigDecimal>, _>(idx)
            .map(|v| v.and_then(|d| d.to_f64()).map(Value::Float64)),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .map(|v| v.map(|ts| Value::Timestamp(ts.and_utc().timestamp_millis()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)
            .map(|v| v.map(|ts| Value::Timestamp(ts.timestamp_millis()))),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(idx)
            .map(|v| v.map(Value::Json)),
        _ => row
            .try_get::<Option<String>, _>(idx)
            .map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(e) => {
            tracing::debug!(column = idx, type_name, "Undecodable cell: {}", e);
            Value::Null
        }
    }
}
