use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::Dataset;
use crate::error::{RecsysError, Result};
use crate::models::InteractionRow;

/// Dataset adapter over a caller-managed Postgres pool.
///
/// Identifiers cannot be bound as parameters, so table and column names are
/// validated and quoted before they reach query text; every value is bound.
pub struct PgDataset {
    pool: PgPool,
}

impl PgDataset {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*` up to the Postgres 63-byte identifier
/// limit, optionally schema-qualified with a single dot.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    for part in name.split('.') {
        let mut chars = part.chars();
        let valid_head = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_head || !valid_tail || part.len() > 63 {
            return Err(RecsysError::Dataset(format!(
                "invalid identifier: {}",
                name
            )));
        }
    }
    if name.matches('.').count() > 1 {
        return Err(RecsysError::Dataset(format!("invalid identifier: {}", name)));
    }
    Ok(())
}

pub(crate) fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(name
        .split('.')
        .map(|part| format!("\"{}\"", part))
        .collect::<Vec<_>>()
        .join("."))
}

#[async_trait]
impl Dataset for PgDataset {
    async fn select_distinct(&self, table: &str, column: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {col}::text FROM {tbl} WHERE {col} IS NOT NULL ORDER BY 1",
            col = quote_identifier(column)?,
            tbl = quote_identifier(table)?,
        );

        sqlx::query_scalar(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                RecsysError::Dataset(format!("select distinct {} from {}: {}", column, table, e))
            })
    }

    async fn select_rows(
        &self,
        table: &str,
        user_column: &str,
        item_column: &str,
        user_filter: Option<&str>,
    ) -> Result<Vec<InteractionRow>> {
        let user_col = quote_identifier(user_column)?;
        let item_col = quote_identifier(item_column)?;
        let tbl = quote_identifier(table)?;

        let sql = match user_filter {
            Some(_) => format!(
                "SELECT {user}::text, {item}::text FROM {tbl} WHERE {user}::text = $1",
                user = user_col,
                item = item_col,
                tbl = tbl,
            ),
            None => format!(
                "SELECT {user}::text, {item}::text FROM {tbl}",
                user = user_col,
                item = item_col,
                tbl = tbl,
            ),
        };

        let mut query = sqlx::query(&sql);
        if let Some(user_id) = user_filter {
            query = query.bind(user_id);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            RecsysError::Dataset(format!("select rows from {}: {}", table, e))
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(InteractionRow {
                    user_id: row
                        .try_get(0)
                        .map_err(|e| RecsysError::Dataset(format!("decode {}: {}", user_column, e)))?,
                    item_id: row
                        .try_get(1)
                        .map_err(|e| RecsysError::Dataset(format!("decode {}: {}", item_column, e)))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for name in ["events", "user_id", "_private", "recsys.interactions", "T1"] {
            assert!(validate_identifier(name).is_ok(), "{} should pass", name);
        }
    }

    #[test]
    fn test_rejects_injection_shaped_identifiers() {
        for name in [
            "events; DROP TABLE users",
            "item_id FROM other --",
            "a.b.c",
            "1starts_with_digit",
            "has space",
            "",
            "\"quoted\"",
        ] {
            assert!(validate_identifier(name).is_err(), "{} should fail", name);
        }
    }

    #[test]
    fn test_rejects_oversized_identifier() {
        let name = "x".repeat(64);
        assert!(validate_identifier(&name).is_err());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_identifier("events").unwrap(), "\"events\"");
        assert_eq!(
            quote_identifier("recsys.events").unwrap(),
            "\"recsys\".\"events\""
        );
    }
}
