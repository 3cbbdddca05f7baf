//! Row-range store boundary.
//!
//! The backing store is a spreadsheet-style workbook: named tables addressed
//! by position, with no transactions, no indexes and no referential integrity.
//! Readers and writers only see the [`SheetStore`] port.

pub mod http;
pub mod in_memory;
pub mod r#trait;

pub use http::{HttpSheetStore, HttpStoreConfig};
pub use in_memory::{InMemorySheetStore, StoreOp};
pub use r#trait::{AppendOutcome, RowRange, SheetStore, column_letter};
