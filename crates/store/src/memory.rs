//! In-memory [`SheetsApi`] backend with thread-safe access, used for tests
//! and local development runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Row, SheetsApi, StoreError};

/// Thread-safe in-memory worksheet storage: worksheet name -> ordered rows.
#[derive(Debug, Default)]
pub struct MemorySheets {
    inner: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemorySheets {
    /// Create a new, empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no worksheet holds any rows.
    pub async fn is_empty(&self) -> bool {
        let map = self.inner.read().await;
        map.values().all(Vec::is_empty)
    }
}

#[async_trait]
impl SheetsApi for MemorySheets {
    async fn list_rows(&self, worksheet: &str) -> Result<Vec<Row>, StoreError> {
        let map = self.inner.read().await;
        Ok(map.get(worksheet).cloned().unwrap_or_default())
    }

    async fn append_row(&self, worksheet: &str, row: Row) -> Result<(), StoreError> {
        let mut map = self.inner.write().await;
        map.entry(worksheet.to_string()).or_default().push(row);
        Ok(())
    }

    async fn rewrite_row(&self, worksheet: &str, index: usize, row: Row) -> Result<(), StoreError> {
        let mut map = self.inner.write().await;
        let rows = map.get_mut(worksheet).ok_or(StoreError::NotFound)?;
        let slot = rows.get_mut(index).ok_or(StoreError::NotFound)?;
        *slot = row;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_backend() {
        let sheets = MemorySheets::new();
        assert!(sheets.is_empty().await);
        assert!(sheets.list_rows("orders").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_and_rewrite() {
        let sheets = MemorySheets::new();
        sheets
            .append_row("orders", vec!["a".to_string()])
            .await
            .unwrap();
        sheets
            .append_row("orders", vec!["b".to_string()])
            .await
            .unwrap();

        sheets
            .rewrite_row("orders", 1, vec!["b2".to_string()])
            .await
            .unwrap();

        let rows = sheets.list_rows("orders").await.unwrap();
        assert_eq!(rows, vec![vec!["a".to_string()], vec!["b2".to_string()]]);
    }

    #[tokio::test]
    async fn test_rewrite_out_of_bounds() {
        let sheets = MemorySheets::new();
        let err = sheets
            .rewrite_row("orders", 0, vec!["x".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
