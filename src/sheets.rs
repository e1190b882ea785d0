use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::SheetsConfig;
use crate::extractor::ExtractionResult;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const HEADER_ROW: [&str; 4] = ["Timestamp", "Full Name", "Phone Number", "ID Document"];

/// One row of the target sheet: timestamp plus the three extraction fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRecord {
    pub timestamp: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub id_document: Option<String>,
}

impl SheetRecord {
    pub fn from_result(result: &ExtractionResult) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            full_name: result.full_name.clone(),
            phone_number: result.phone_number.clone(),
            id_document: result.id_document.clone(),
        }
    }

    /// Cell values in column order; nulls become empty cells.
    fn row(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.full_name.clone().unwrap_or_default(),
            self.phone_number.clone().unwrap_or_default(),
            self.id_document.clone().unwrap_or_default(),
        ]
    }

    fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.phone_number.is_none() && self.id_document.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Append-only client for the target spreadsheet.
pub struct SheetsClient {
    client: reqwest::Client,
    config: SheetsConfig,
    token: String,
    api_base: String,
    /// Set once the header row has been verified or written; the cell
    /// serializes concurrent first appends so only one header is created.
    headers_checked: OnceCell<()>,
}

impl SheetsClient {
    /// Reads the bearer token from the configured credentials file.
    pub fn new(config: SheetsConfig) -> Result<Self> {
        let token = std::fs::read_to_string(&config.credentials_path)
            .with_context(|| {
                format!(
                    "Failed to read sheets credentials file: {}",
                    config.credentials_path.display()
                )
            })?
            .trim()
            .to_string();

        if token.is_empty() {
            anyhow::bail!(
                "Sheets credentials file is empty: {}",
                config.credentials_path.display()
            );
        }

        Ok(Self {
            client: reqwest::Client::new(),
            config,
            token,
            api_base: SHEETS_API_BASE.to_string(),
            headers_checked: OnceCell::new(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_api_base(config: SheetsConfig, token: &str, api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            token: token.to_string(),
            api_base: api_base.to_string(),
            headers_checked: OnceCell::new(),
        }
    }

    /// Append one record to the sheet. Returns Ok(false) without touching
    /// the sheet when every extraction field is null.
    pub async fn append(&self, record: &SheetRecord) -> Result<bool> {
        if record.is_empty() {
            info!("All extracted fields are null, skipping sheet append");
            return Ok(false);
        }

        self.headers_checked
            .get_or_try_init(|| self.ensure_headers())
            .await?;

        self.append_row(&record.row()).await?;
        info!("Appended record to sheet '{}'", self.config.worksheet);
        Ok(true)
    }

    /// Write the fixed header row if the sheet's first row is empty.
    async fn ensure_headers(&self) -> Result<()> {
        let url = format!(
            "{}/{}/values/{}!1:1",
            self.api_base, self.config.spreadsheet_id, self.config.worksheet
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .context("Failed to read sheet header row")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Sheets API error ({}): {}", status, error_body);
        }

        let range: ValueRange = response
            .json()
            .await
            .context("Failed to parse sheet header response")?;

        if !range.values.is_empty() {
            debug!("Sheet headers already present");
            return Ok(());
        }

        let headers: Vec<String> = HEADER_ROW.iter().map(|h| h.to_string()).collect();
        self.append_row(&headers).await?;
        info!("Wrote header row to sheet '{}'", self.config.worksheet);
        Ok(())
    }

    async fn append_row(&self, row: &[String]) -> Result<()> {
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.api_base, self.config.spreadsheet_id, self.config.worksheet
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .context("Failed to append row to sheet")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Sheets API error ({}): {}", status, error_body);
        }

        Ok(())
    }
}
