//! `PostgreSQL`-backed token store.
//!
//! Rows live in `handoff_tokens`; a row whose `expires_at` has passed is treated
//! as absent by every read and every conditional write. The conditional
//! primitives are single `UPDATE`/`DELETE` statements filtered on the expected
//! value, so the row lock taken by Postgres makes them linearizable. Expired
//! rows stay in the table until `purge_expired` deletes them.

use sqlx::{Connection, PgPool, Row};
use tracing::{info_span, Instrument};

use super::{clamp_ttl, CadOutcome, CasOutcome, StoreError, StoreFuture, TokenStore};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Clone, Debug)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the token table and its expiry index if they do not exist.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA_SQL
            .split(';')
            .map(str::trim)
            .filter(|statement| !statement.is_empty())
        {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DDL",
                db.statement = statement
            );
            sqlx::query(statement)
                .execute(&self.pool)
                .instrument(span)
                .await?;
        }
        Ok(())
    }

    /// Whether `key` currently holds a live value. Only used to classify a
    /// conditional write that did not apply; the write itself already happened
    /// (or not) atomically.
    async fn is_live(&self, key: &str) -> Result<bool, StoreError> {
        let query = "SELECT 1 FROM handoff_tokens WHERE key = $1 AND expires_at > NOW()";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.is_some())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let query = "DELETE FROM handoff_tokens WHERE key = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(key)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}

fn ttl_param(ttl_seconds: u64) -> i64 {
    i64::try_from(clamp_ttl(ttl_seconds)).unwrap_or(i64::MAX)
}

impl TokenStore for PgTokenStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let query = "SELECT value FROM handoff_tokens WHERE key = $1 AND expires_at > NOW()";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = query
            );
            let row = sqlx::query(query)
                .bind(key)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?;
            Ok(row.map(|row| row.get("value")))
        })
    }

    fn set_with_ttl<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl_seconds: u64,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if ttl_seconds == 0 {
                return self.remove(key).await;
            }
            let query = r"
                INSERT INTO handoff_tokens (key, value, expires_at)
                VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
                ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPSERT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(key)
                .bind(value)
                .bind(ttl_param(ttl_seconds))
                .execute(&self.pool)
                .instrument(span)
                .await?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(self.remove(key))
    }

    fn compare_and_set<'a>(
        &'a self,
        key: &'a str,
        expected: &'a str,
        value: &'a str,
        ttl_seconds: u64,
    ) -> StoreFuture<'a, CasOutcome> {
        Box::pin(async move {
            let query = r"
                UPDATE handoff_tokens
                SET value = $3, expires_at = NOW() + ($4 * INTERVAL '1 second')
                WHERE key = $1
                  AND value = $2
                  AND expires_at > NOW()
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            let result = sqlx::query(query)
                .bind(key)
                .bind(expected)
                .bind(value)
                .bind(ttl_param(ttl_seconds))
                .execute(&self.pool)
                .instrument(span)
                .await?;

            if result.rows_affected() == 1 {
                return Ok(CasOutcome::Applied);
            }
            if self.is_live(key).await? {
                Ok(CasOutcome::Mismatch)
            } else {
                Ok(CasOutcome::NotFound)
            }
        })
    }

    fn compare_and_delete<'a>(
        &'a self,
        key: &'a str,
        expected: &'a str,
    ) -> StoreFuture<'a, CadOutcome> {
        Box::pin(async move {
            let query = r"
                DELETE FROM handoff_tokens
                WHERE key = $1
                  AND value = $2
                  AND expires_at > NOW()
                RETURNING value
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            let row = sqlx::query(query)
                .bind(key)
                .bind(expected)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?;

            if let Some(row) = row {
                return Ok(CadOutcome::Deleted(row.get("value")));
            }
            if self.is_live(key).await? {
                Ok(CadOutcome::Mismatch)
            } else {
                Ok(CadOutcome::NotFound)
            }
        })
    }

    fn purge_expired(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let query = "DELETE FROM handoff_tokens WHERE expires_at <= NOW()";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            let result = sqlx::query(query)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            Ok(result.rows_affected())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let acquire_span = info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            );
            let mut conn = self.pool.acquire().instrument(acquire_span).await?;
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            conn.ping().instrument(ping_span).await?;
            Ok(())
        })
    }
}
