mod postgres;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::error::{RecsysError, Result};
use crate::models::InteractionRow;

pub use postgres::PgDataset;

/// Abstract queryable interaction dataset.
///
/// Implementations own query construction; callers never hand them executable
/// query text. Table and column names are validated identifiers, values are
/// always bound parameters.
#[async_trait]
pub trait Dataset: Send + Sync {
    /// Distinct values of `column` in `table`, in a deterministic order for a
    /// fixed dataset state.
    async fn select_distinct(&self, table: &str, column: &str) -> Result<Vec<String>>;

    /// Interaction rows from `table`, optionally restricted to one user.
    async fn select_rows(
        &self,
        table: &str,
        user_column: &str,
        item_column: &str,
        user_filter: Option<&str>,
    ) -> Result<Vec<InteractionRow>>;
}

/// In-memory dataset for tests and hosts without a relational backend.
#[derive(Debug, Default)]
pub struct MemoryDataset {
    tables: HashMap<String, Vec<HashMap<String, String>>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, table: &str, columns: &[(&str, &str)]) {
        let row = columns
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    fn table(&self, table: &str) -> Result<&Vec<HashMap<String, String>>> {
        self.tables
            .get(table)
            .ok_or_else(|| RecsysError::Dataset(format!("unknown table {}", table)))
    }

    fn cell<'a>(row: &'a HashMap<String, String>, table: &str, column: &str) -> Result<&'a str> {
        row.get(column)
            .map(String::as_str)
            .ok_or_else(|| RecsysError::Dataset(format!("unknown column {} in {}", column, table)))
    }
}

#[async_trait]
impl Dataset for MemoryDataset {
    async fn select_distinct(&self, table: &str, column: &str) -> Result<Vec<String>> {
        let rows = self.table(table)?;
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for row in rows {
            let value = Self::cell(row, table, column)?;
            if seen.insert(value.to_string()) {
                values.push(value.to_string());
            }
        }
        Ok(values)
    }

    async fn select_rows(
        &self,
        table: &str,
        user_column: &str,
        item_column: &str,
        user_filter: Option<&str>,
    ) -> Result<Vec<InteractionRow>> {
        let rows = self.table(table)?;
        let mut out = Vec::new();
        for row in rows {
            let user_id = Self::cell(row, table, user_column)?;
            let item_id = Self::cell(row, table, item_column)?;
            if user_filter.is_some_and(|filter| filter != user_id) {
                continue;
            }
            out.push(InteractionRow {
                user_id: user_id.to_string(),
                item_id: item_id.to_string(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryDataset {
        let mut ds = MemoryDataset::new();
        ds.push_row("events", &[("user_id", "u1"), ("item_id", "a")]);
        ds.push_row("events", &[("user_id", "u1"), ("item_id", "b")]);
        ds.push_row("events", &[("user_id", "u2"), ("item_id", "a")]);
        ds
    }

    #[tokio::test]
    async fn test_select_distinct_preserves_first_seen_order() {
        let ds = sample();
        let items = ds.select_distinct("events", "item_id").await.unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_select_rows_filters_by_user() {
        let ds = sample();
        let rows = ds
            .select_rows("events", "user_id", "item_id", Some("u1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.user_id == "u1"));

        let all = ds
            .select_rows("events", "user_id", "item_id", None)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_table_and_column_are_dataset_errors() {
        let ds = sample();
        assert!(matches!(
            ds.select_distinct("nope", "item_id").await,
            Err(RecsysError::Dataset(_))
        ));
        assert!(matches!(
            ds.select_distinct("events", "nope").await,
            Err(RecsysError::Dataset(_))
        ));
    }
}
