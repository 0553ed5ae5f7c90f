//! Tabular store backing the pipeline: the shared spreadsheet.
//!
//! The spreadsheet is the source of truth: the dedup baseline is rebuilt
//! from it at the start of every run, so nothing else is persisted locally.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached at all. Fatal for the run: without a
    /// readable baseline no dedup guarantee can be made.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("sheets API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

/// How the store should interpret appended values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInputOption {
    /// Store values as literal text.
    Raw,
    /// Let the store detect numbers and dates, as if typed by a user. The
    /// pipeline always appends in this mode so downstream sheet formulas see
    /// real numerics.
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::UserEntered => "USER_ENTERED",
        }
    }
}

/// Minimal contract the pipeline needs from a tabular store.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Every row of the worksheet, header first. Cells come back as display
    /// strings.
    async fn read_all_rows(&self, worksheet: &str) -> Result<Vec<Vec<String>>>;

    /// Append one row after the current last row.
    async fn append_row(&self, worksheet: &str, cells: &[Value], mode: ValueInputOption)
    -> Result<()>;
}

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Google Sheets values-API client.
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    token: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: &str, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: SHEETS_API_URL.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, worksheet: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(worksheet),
            suffix
        )
    }
}

#[async_trait]
impl TabularStore for SheetsClient {
    async fn read_all_rows(&self, worksheet: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(worksheet, "");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let range: ValueRange = response.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    async fn append_row(
        &self,
        worksheet: &str,
        cells: &[Value],
        mode: ValueInputOption,
    ) -> Result<()> {
        let url = self.values_url(
            worksheet,
            &format!(
                ":append?valueInputOption={}&insertDataOption=INSERT_ROWS",
                mode.as_str()
            ),
        );

        let body = serde_json::json!({ "values": [cells] });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Render a cell the way the sheet would display it.
pub fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// In-memory store used for dry runs and tests.
///
/// `fail_appends(n)` makes the next `n` append calls fail, which is how the
/// retry/index-ordering behavior of the append gate gets exercised.
#[derive(Default)]
pub struct MemoryStore {
    worksheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    failures_left: Mutex<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn seed(&self, worksheet: &str, rows: Vec<Vec<String>>) {
        self.worksheets
            .lock()
            .unwrap()
            .insert(worksheet.to_string(), rows);
    }

    pub fn rows(&self, worksheet: &str) -> Vec<Vec<String>> {
        self.worksheets
            .lock()
            .unwrap()
            .get(worksheet)
            .cloned()
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn fail_appends(&self, count: u32) {
        *self.failures_left.lock().unwrap() = count;
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read_all_rows(&self, worksheet: &str) -> Result<Vec<Vec<String>>> {
        Ok(self.rows(worksheet))
    }

    async fn append_row(
        &self,
        worksheet: &str,
        cells: &[Value],
        mode: ValueInputOption,
    ) -> Result<()> {
        {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(StoreError::Api {
                    status: 503,
                    message: "injected append failure".to_string(),
                });
            }
        }

        let row: Vec<String> = cells.iter().map(cell_to_string).collect();
        info!(worksheet, mode = mode.as_str(), "memory store append: {row:?}");
        self.worksheets
            .lock()
            .unwrap()
            .entry(worksheet.to_string())
            .or_default()
            .push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store.seed("Sheet1", vec![vec!["Header".to_string()]]);

        store
            .append_row(
                "Sheet1",
                &[Value::from("a"), Value::from(42)],
                ValueInputOption::UserEntered,
            )
            .await
            .unwrap();

        let rows = store.read_all_rows("Sheet1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["a".to_string(), "42".to_string()]);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_appends(1);

        let cells = [Value::from("x")];
        assert!(
            store
                .append_row("S", &cells, ValueInputOption::UserEntered)
                .await
                .is_err()
        );
        assert!(
            store
                .append_row("S", &cells, ValueInputOption::UserEntered)
                .await
                .is_ok()
        );
        assert_eq!(store.rows("S").len(), 1);
    }

    #[test]
    fn worksheet_names_are_encoded_into_the_range() {
        let client = SheetsClient::new("sheet-id", "token").with_base_url("http://localhost:9999/");
        assert_eq!(
            client.values_url("Swiggy Live", ""),
            "http://localhost:9999/sheet-id/values/Swiggy%20Live"
        );
        assert!(
            client
                .values_url("Zomato Live", ":append?valueInputOption=USER_ENTERED")
                .ends_with("Zomato%20Live:append?valueInputOption=USER_ENTERED")
        );
    }

    #[test]
    fn value_input_option_wire_names() {
        assert_eq!(ValueInputOption::Raw.as_str(), "RAW");
        assert_eq!(ValueInputOption::UserEntered.as_str(), "USER_ENTERED");
    }

    #[test]
    fn cells_render_like_the_sheet() {
        assert_eq!(cell_to_string(&Value::from("text")), "text");
        assert_eq!(cell_to_string(&Value::from(9600)), "9600");
        assert_eq!(cell_to_string(&Value::from(12.5)), "12.5");
        assert_eq!(cell_to_string(&Value::Null), "");
    }
}
