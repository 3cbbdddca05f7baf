use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use sheetcrm_core::row::{FIRST_DATA_ROW, row_handle};

use super::r#trait::{AppendOutcome, RowRange, SheetStore};
use crate::error::StoreError;

/// Store operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Read,
    Append,
    Update,
    Delete,
}

/// In-memory workbook.
///
/// Intended for tests/dev. Tables hold data rows only (no header), so the row
/// at position `i` has handle `i + 2`, like the remote store. Counts range
/// reads per table, can delay every call, and can fail the next call of a
/// given kind on a given table.
#[derive(Debug, Default)]
pub struct InMemorySheetStore {
    tables: RwLock<HashMap<String, Vec<Vec<String>>>>,
    reads: Mutex<HashMap<String, usize>>,
    failures: Mutex<Vec<(StoreOp, String)>>,
    latency: Option<Duration>,
}

fn poisoned(_: impl std::fmt::Debug) -> StoreError {
    StoreError::Poisoned("in-memory sheet store".to_string())
}

impl InMemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replace the data rows of `table`.
    pub fn seed(&self, table: &str, rows: Vec<Vec<String>>) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(table.to_string(), rows);
        }
    }

    /// Snapshot of the data rows of `table`.
    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(table).cloned())
            .unwrap_or_default()
    }

    /// Number of range reads served for `table`.
    pub fn read_count(&self, table: &str) -> usize {
        self.reads
            .lock()
            .ok()
            .and_then(|reads| reads.get(table).copied())
            .unwrap_or(0)
    }

    /// Make the next `op` on `table` fail with [`StoreError::Unreachable`].
    pub fn fail_next(&self, op: StoreOp, table: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push((op, table.to_string()));
        }
    }

    async fn enter(&self, op: StoreOp, table: &str) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut failures = self.failures.lock().map_err(poisoned)?;
        if let Some(pos) = failures.iter().position(|(o, t)| *o == op && t == table) {
            failures.remove(pos);
            return Err(StoreError::Unreachable(format!("injected {op:?} failure on {table}")));
        }
        Ok(())
    }

    fn position(rows: &[Vec<String>], table: &str, row_index: u32) -> Result<usize, StoreError> {
        let not_found = || StoreError::RowNotFound {
            table: table.to_string(),
            row_index,
        };
        let pos = row_index.checked_sub(FIRST_DATA_ROW).ok_or_else(not_found)? as usize;
        if pos < rows.len() { Ok(pos) } else { Err(not_found()) }
    }
}

/// Drop trailing empty cells, as the remote store does.
fn trim_row(mut row: Vec<String>) -> Vec<String> {
    while row.last().is_some_and(|c| c.is_empty()) {
        row.pop();
    }
    row
}

#[async_trait::async_trait]
impl SheetStore for InMemorySheetStore {
    async fn read_range(&self, range: &RowRange) -> Result<Vec<Vec<String>>, StoreError> {
        self.enter(StoreOp::Read, &range.table).await?;
        *self
            .reads
            .lock()
            .map_err(poisoned)?
            .entry(range.table.clone())
            .or_default() += 1;

        let tables = self.tables.read().map_err(poisoned)?;
        let width = range.width();
        Ok(tables
            .get(&range.table)
            .map(|rows| {
                rows.iter()
                    .map(|row| trim_row(row.iter().take(width).cloned().collect()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<AppendOutcome, StoreError> {
        self.enter(StoreOp::Append, table).await?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let rows = tables.entry(table.to_string()).or_default();
        rows.push(row);
        Ok(AppendOutcome {
            row_index: row_handle(rows.len() - 1),
        })
    }

    async fn update_row(&self, table: &str, row_index: u32, row: Vec<String>) -> Result<(), StoreError> {
        self.enter(StoreOp::Update, table).await?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let rows = tables.entry(table.to_string()).or_default();
        let pos = Self::position(rows, table, row_index)?;
        let target = &mut rows[pos];
        if target.len() < row.len() {
            target.resize(row.len(), String::new());
        }
        for (i, value) in row.into_iter().enumerate() {
            target[i] = value;
        }
        Ok(())
    }

    async fn delete_row(&self, table: &str, row_index: u32) -> Result<(), StoreError> {
        self.enter(StoreOp::Delete, table).await?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let rows = tables.entry(table.to_string()).or_default();
        let pos = Self::position(rows, table, row_index)?;
        rows.remove(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn appended_rows_get_sheet_row_handles() {
        let store = InMemorySheetStore::new();
        let first = store.append_row("T", row(&["a"])).await.unwrap();
        let second = store.append_row("T", row(&["b"])).await.unwrap();
        assert_eq!(first.row_index, 2);
        assert_eq!(second.row_index, 3);
    }

    #[tokio::test]
    async fn reads_trim_and_clip_rows() {
        let store = InMemorySheetStore::new();
        store.seed("T", vec![row(&["a", "b", "", ""]), row(&["c", "d", "e"])]);
        let rows = store.read_range(&RowRange::new("T", 'B')).await.unwrap();
        assert_eq!(rows, vec![row(&["a", "b"]), row(&["c", "d"])]);
        assert_eq!(store.read_count("T"), 1);
    }

    #[tokio::test]
    async fn delete_shifts_following_rows() {
        let store = InMemorySheetStore::new();
        store.seed("T", vec![row(&["a"]), row(&["b"]), row(&["c"])]);
        store.delete_row("T", 3).await.unwrap();
        assert_eq!(store.rows("T"), vec![row(&["a"]), row(&["c"])]);
        assert!(matches!(
            store.delete_row("T", 9).await,
            Err(StoreError::RowNotFound { row_index: 9, .. })
        ));
        assert!(store.update_row("T", 1, row(&["header"])).await.is_err());
    }

    #[tokio::test]
    async fn update_keeps_cells_beyond_the_written_prefix() {
        let store = InMemorySheetStore::new();
        store.seed("T", vec![row(&["a", "b", "c"])]);
        store.update_row("T", 2, row(&["x"])).await.unwrap();
        assert_eq!(store.rows("T"), vec![row(&["x", "b", "c"])]);
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let store = InMemorySheetStore::new();
        store.fail_next(StoreOp::Append, "T");
        assert!(store.append_row("T", row(&["a"])).await.is_err());
        assert!(store.append_row("T", row(&["a"])).await.is_ok());
        assert_eq!(store.rows("T").len(), 1);
    }
}
