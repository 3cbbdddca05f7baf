//! Spreadsheet values API adapter.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::r#trait::{AppendOutcome, RowRange, SheetStore, column_letter};
use crate::error::StoreError;

const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`HttpSheetStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStoreConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    pub access_token: String,
    pub timeout: Duration,
}

impl HttpStoreConfig {
    pub fn new(spreadsheet_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `SHEETCRM_SPREADSHEET_ID`, `SHEETCRM_ACCESS_TOKEN` and the optional
    /// `SHEETCRM_API_BASE`. Returns `None` when a required variable is unset.
    pub fn from_env() -> Option<Self> {
        let spreadsheet_id = std::env::var("SHEETCRM_SPREADSHEET_ID").ok()?;
        let access_token = std::env::var("SHEETCRM_ACCESS_TOKEN").ok()?;
        let mut config = Self::new(spreadsheet_id, access_token);
        if let Ok(base) = std::env::var("SHEETCRM_API_BASE") {
            config.api_base = base;
        }
        Some(config)
    }
}

/// [`SheetStore`] over the remote spreadsheet values API.
///
/// Appends use `USER_ENTERED` so the store parses dates and numbers the same
/// way it does for typed input. Row deletion needs the numeric sheet id of a
/// table, which is looked up once from the spreadsheet metadata.
pub struct HttpSheetStore {
    client: Client,
    config: HttpStoreConfig,
    sheet_ids: RwLock<HashMap<String, i64>>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

fn unreachable(err: reqwest::Error) -> StoreError {
    StoreError::Unreachable(err.to_string())
}

fn malformed(err: impl std::fmt::Display) -> StoreError {
    StoreError::Malformed(err.to_string())
}

/// Cell text as the store displays it.
fn cell_text(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Row number of the first row in an A1 range (`Table!A15:X15` -> 15).
pub(crate) fn first_row_of(range: &str) -> Option<u32> {
    let cells = range.rsplit_once('!').map_or(range, |(_, cells)| cells);
    let start = cells.split(':').next()?;
    let digits: String = start
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

impl HttpSheetStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(unreachable)?;
        Ok(Self {
            client,
            config,
            sheet_ids: RwLock::new(HashMap::new()),
        })
    }

    fn spreadsheet_url(&self, tail: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.config.api_base).map_err(malformed)?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Malformed(format!("api base {} cannot hold a path", self.config.api_base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(tail);
        Ok(url)
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, StoreError> {
        let id_segment = self.config.spreadsheet_id.as_str();
        let range_segment = format!("{range}{suffix}");
        self.spreadsheet_url(&[id_segment, "values", range_segment.as_str()])
    }

    async fn send(&self, method: Method, url: Url, body: Option<JsonValue>) -> Result<JsonValue, StoreError> {
        debug!(%method, url = %url, "store request");
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.access_token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(unreachable)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %message, "store rejected request");
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        response.json::<JsonValue>().await.map_err(malformed)
    }

    async fn sheet_id(&self, table: &str) -> Result<i64, StoreError> {
        if let Some(id) = self.sheet_ids.read().await.get(table) {
            return Ok(*id);
        }

        let mut url = self.spreadsheet_url(&[self.config.spreadsheet_id.as_str()])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties(sheetId,title)");
        let meta: SpreadsheetMeta =
            serde_json::from_value(self.send(Method::GET, url, None).await?).map_err(malformed)?;

        let mut ids = self.sheet_ids.write().await;
        for sheet in meta.sheets {
            ids.insert(sheet.properties.title, sheet.properties.sheet_id);
        }
        ids.get(table)
            .copied()
            .ok_or_else(|| StoreError::Malformed(format!("no sheet named {table}")))
    }
}

#[async_trait::async_trait]
impl SheetStore for HttpSheetStore {
    async fn read_range(&self, range: &RowRange) -> Result<Vec<Vec<String>>, StoreError> {
        let mut url = self.values_url(&range.a1(), "")?;
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");
        let body: ValueRange =
            serde_json::from_value(self.send(Method::GET, url, None).await?).map_err(malformed)?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<AppendOutcome, StoreError> {
        let last = column_letter(row.len().saturating_sub(1));
        let mut url = self.values_url(&format!("{table}!A:{last}"), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = json!({ "values": [row] });
        let response: AppendResponse =
            serde_json::from_value(self.send(Method::POST, url, Some(body)).await?).map_err(malformed)?;

        let row_index = first_row_of(&response.updates.updated_range).ok_or_else(|| {
            StoreError::Malformed(format!("unexpected updatedRange {}", response.updates.updated_range))
        })?;
        Ok(AppendOutcome { row_index })
    }

    async fn update_row(&self, table: &str, row_index: u32, row: Vec<String>) -> Result<(), StoreError> {
        let last = column_letter(row.len().saturating_sub(1));
        let range = format!("{table}!A{row_index}:{last}{row_index}");
        let mut url = self.values_url(&range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "USER_ENTERED");
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": [row] });
        self.send(Method::PUT, url, Some(body)).await?;
        Ok(())
    }

    async fn delete_row(&self, table: &str, row_index: u32) -> Result<(), StoreError> {
        let sheet_id = self.sheet_id(table).await?;
        let target = format!("{}:batchUpdate", self.config.spreadsheet_id);
        let url = self.spreadsheet_url(&[target.as_str()])?;
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": row_index.saturating_sub(1),
                        "endIndex": row_index,
                    }
                }
            }]
        });
        self.send(Method::POST, url, Some(body)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpSheetStore {
        HttpSheetStore::new(HttpStoreConfig::new("sheet-123", "token")).unwrap()
    }

    #[test]
    fn parses_the_appended_row_number() {
        assert_eq!(first_row_of("Opportunities!A15:X15"), Some(15));
        assert_eq!(first_row_of("'Raw Leads'!A7:J7"), Some(7));
        assert_eq!(first_row_of("B3"), Some(3));
        assert_eq!(first_row_of("Opportunities!A:X"), None);
    }

    #[test]
    fn range_segments_are_escaped() {
        let url = store().values_url("Raw Leads!A2:J", ":append").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values/Raw%20Leads!A2:J:append"
        );
    }

    #[test]
    fn non_string_cells_render_as_text() {
        assert_eq!(cell_text(json!("x")), "x");
        assert_eq!(cell_text(json!(42)), "42");
        assert_eq!(cell_text(JsonValue::Null), "");
    }
}
