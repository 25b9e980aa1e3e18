//! Lead retrieval.
//!
//! This module fetches lead batches from the lead API with reqwest, or reads
//! them from a JSON export on disk, and normalizes the two payload shapes the
//! API is known to return.

use crate::analysis::{LeadFilter, SortDirection};
use crate::error::LoadError;
use crate::models::UNSPECIFIED_LABEL;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// Upper bound on records requested in one call.
pub const DEFAULT_FETCH_LIMIT: usize = 1000;

/// Query parameters understood by `GET /leads` and `GET /export/pdf`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl LeadQuery {
    /// First page of up to `limit` records, filtered like the table.
    pub fn first_page(limit: usize, filter: &LeadFilter, sort: SortDirection) -> Self {
        Self {
            page: Some(1),
            limit: Some(limit),
            sort: Some(sort.as_str().to_string()),
            ..Self::filters_only(filter)
        }
    }

    /// Only the filter parameters, as used by the PDF export.
    pub fn filters_only(filter: &LeadFilter) -> Self {
        Self {
            search: non_empty(&filter.search),
            car: non_empty(&filter.product),
            lead_quality: filter.quality.map(|q| q.wire_label().to_string()),
            // Leads without a source are only matched locally.
            source: non_empty(&filter.source).filter(|s| s != UNSPECIFIED_LABEL),
            ..Self::default()
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Payload shapes returned by the lead API.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LeadsPayload {
    Bare(Vec<Value>),
    Wrapped {
        #[serde(default, alias = "records")]
        leads: Option<Vec<Value>>,
        #[serde(default)]
        total: Option<Value>,
    },
}

/// Raw lead entries plus the total the API reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadBatch {
    /// Undecoded lead objects, in payload order.
    pub entries: Vec<Value>,
    /// Total reported by the API, or the entry count when it reported none.
    pub total: usize,
}

impl LeadBatch {
    fn from_payload(payload: LeadsPayload) -> Self {
        match payload {
            LeadsPayload::Bare(entries) => Self {
                total: entries.len(),
                entries,
            },
            LeadsPayload::Wrapped { leads, total } => {
                let entries = leads.unwrap_or_default();
                let total = total
                    .as_ref()
                    .and_then(Value::as_u64)
                    .map(|t| t as usize)
                    .filter(|&t| t > 0)
                    .unwrap_or(entries.len());
                Self { entries, total }
            }
        }
    }
}

/// Decode a `/leads` response body or a JSON export.
pub fn decode_payload(bytes: &[u8]) -> Result<LeadBatch, LoadError> {
    let payload: LeadsPayload = serde_json::from_slice(bytes)?;
    Ok(LeadBatch::from_payload(payload))
}

/// Read a JSON export from disk.
pub async fn load_from_file(path: &Path) -> Result<LeadBatch, LoadError> {
    info!("Reading leads from: {}", path.display());
    let content = tokio::fs::read(path).await?;
    decode_payload(&content)
}

/// HTTP client for the lead API.
pub struct LeadClient {
    http: reqwest::Client,
    base_url: String,
    show_progress: bool,
}

impl LeadClient {
    /// Create a client for `base_url` (e.g. `https://host/api`).
    pub fn new(base_url: &str, timeout_seconds: u64, show_progress: bool) -> Result<Self, LoadError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            show_progress,
        })
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one batch of leads.
    pub async fn fetch(&self, query: &LeadQuery) -> Result<LeadBatch, LoadError> {
        let url = format!("{}/leads", self.base_url);
        debug!("GET {} {:?}", url, query);

        let spinner = self.spinner("Fetching leads...");
        let body = self.get_bytes(&url, query).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        let batch = decode_payload(&body?)?;
        info!(
            "Fetched {} leads (API reports {} total)",
            batch.entries.len(),
            batch.total
        );
        Ok(batch)
    }

    /// Download the server-rendered PDF export for the given filters.
    pub async fn export_pdf(&self, query: &LeadQuery) -> Result<Vec<u8>, LoadError> {
        let url = format!("{}/export/pdf", self.base_url);
        debug!("GET {} {:?}", url, query);

        let spinner = self.spinner("Downloading PDF export...");
        let body = self.get_bytes(&url, query).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        body
    }

    async fn get_bytes(&self, url: &str, query: &LeadQuery) -> Result<Vec<u8>, LoadError> {
        let response = self.http.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                status,
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

/// Where leads come from.
pub enum Origin {
    /// The lead API.
    Api(LeadClient),
    /// A JSON export on disk.
    File(PathBuf),
}

impl Origin {
    /// Human-readable description for logs and report metadata.
    pub fn describe(&self) -> String {
        match self {
            Origin::Api(client) => client.base_url().to_string(),
            Origin::File(path) => path.display().to_string(),
        }
    }

    /// Load a batch from this origin.
    pub async fn load(&self, query: &LeadQuery) -> Result<LeadBatch, LoadError> {
        match self {
            Origin::Api(client) => client.fetch(query).await,
            Origin::File(path) => load_from_file(path).await,
        }
    }

    /// Load a batch, or log the failure and return an empty batch.
    pub async fn load_or_empty(&self, query: &LeadQuery) -> LeadBatch {
        match self.load(query).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to load leads from {}: {}", self.describe(), e);
                LeadBatch::default()
            }
        }
    }
}
