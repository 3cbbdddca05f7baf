use std::sync::Arc;

use sheetcrm_core::row::FIRST_DATA_ROW;

use crate::error::StoreError;

/// Data rows of one table, from the first data row down, columns `A..=last_column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub table: String,
    pub last_column: char,
}

impl RowRange {
    pub fn new(table: impl Into<String>, last_column: char) -> Self {
        Self {
            table: table.into(),
            last_column,
        }
    }

    /// A1 notation, e.g. `Opportunities!A2:X`.
    pub fn a1(&self) -> String {
        format!("{}!A{}:{}", self.table, FIRST_DATA_ROW, self.last_column)
    }

    /// Number of columns covered.
    pub fn width(&self) -> usize {
        (self.last_column as u8).saturating_sub(b'A') as usize + 1
    }
}

/// Column letter of a 0-based column index (`0 -> A`, `23 -> X`, `26 -> AA`).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Result of appending one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// 1-based row number the store placed the row at.
    pub row_index: u32,
}

/// Positional row store.
///
/// Row handles are 1-based sheet row numbers; the header occupies row 1, so
/// the `i`-th data row returned by [`read_range`](SheetStore::read_range)
/// has handle `i + 2`. Deleting a row shifts the handles of every row below it.
///
/// Implementations may trim trailing empty cells from returned rows.
#[async_trait::async_trait]
pub trait SheetStore: Send + Sync {
    async fn read_range(&self, range: &RowRange) -> Result<Vec<Vec<String>>, StoreError>;

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<AppendOutcome, StoreError>;

    /// Overwrite the row at `row_index`, starting at column A.
    async fn update_row(&self, table: &str, row_index: u32, row: Vec<String>) -> Result<(), StoreError>;

    async fn delete_row(&self, table: &str, row_index: u32) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> SheetStore for Arc<S>
where
    S: SheetStore + ?Sized,
{
    async fn read_range(&self, range: &RowRange) -> Result<Vec<Vec<String>>, StoreError> {
        (**self).read_range(range).await
    }

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<AppendOutcome, StoreError> {
        (**self).append_row(table, row).await
    }

    async fn update_row(&self, table: &str, row_index: u32, row: Vec<String>) -> Result<(), StoreError> {
        (**self).update_row(table, row_index, row).await
    }

    async fn delete_row(&self, table: &str, row_index: u32) -> Result<(), StoreError> {
        (**self).delete_row(table, row_index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_ranges_start_below_the_header() {
        let range = RowRange::new("Opportunities", 'X');
        assert_eq!(range.a1(), "Opportunities!A2:X");
        assert_eq!(range.width(), 24);
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(23), "X");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
    }
}
