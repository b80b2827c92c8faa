use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};

use super::ExtractionService;

pub static EXTRACTION_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .build()
        .expect("creating EXTRACTION_CLIENT")
});

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    pub content: String,
    pub metadata: ExtractionMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionMetadata {
    pub batch_index: usize,
    pub total_batches: usize,
    pub file_name: String,
    pub file_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractionResponse {
    pub success: bool,
    #[serde(default)]
    pub transactions: Vec<ExtractedRow>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One parsed statement row as the service returns it. Offsets are local
/// to the batch; the worker rewrites them to global indices.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedRow {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub counter_party: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

pub struct ExtractionClient {
    base_url: String,
    api_key: Option<String>,
}

impl ExtractionClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        }
    }
}

impl ExtractionService for ExtractionClient {
    async fn extract(&self, request: ExtractionRequest) -> Result<ExtractionResponse> {
        let mut req = EXTRACTION_CLIENT
            .post(format!("{base}/extract", base = self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let res = req.send().await.context("error making extraction req")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("extraction req error {text} {status}"));
        }

        let res = res
            .json::<ExtractionResponse>()
            .await
            .context("error parsing extraction res")?;

        Ok(res)
    }
}
