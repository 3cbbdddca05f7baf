//! Positional row helpers.
//!
//! The store trims trailing empty cells, so every accessor tolerates short rows.

/// Cell at `index`, or `""` when the row is shorter.
pub fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

/// Owned copy of the cell at `index`.
pub fn cell_string(row: &[String], index: usize) -> String {
    cell(row, index).to_string()
}

/// Parse a numeric-as-text amount (`"1,250,000"`, `" 42.5 "`).
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Data rows start below the header row.
pub const FIRST_DATA_ROW: u32 = 2;

/// Row handle of the `index`-th data row.
pub fn row_handle(index: usize) -> u32 {
    FIRST_DATA_ROW + index as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_yield_empty_cells() {
        let row = vec!["a".to_string()];
        assert_eq!(cell(&row, 0), "a");
        assert_eq!(cell(&row, 5), "");
    }

    #[test]
    fn amounts_ignore_thousands_separators() {
        assert_eq!(parse_amount("1,250,000"), Some(1_250_000.0));
        assert_eq!(parse_amount(" 42.5 "), Some(42.5));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn first_data_row_is_two() {
        assert_eq!(row_handle(0), 2);
        assert_eq!(row_handle(9), 11);
    }
}
