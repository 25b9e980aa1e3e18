//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.leadlens.toml` files.

use crate::analysis::{SortDirection, DEFAULT_PAGE_SIZE, DEFAULT_TOP_PRODUCTS};
use crate::loader::DEFAULT_FETCH_LIMIT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".leadlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Lead API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Leads table settings.
    #[serde(default)]
    pub table: TableConfig,

    /// Analytics settings.
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report output file; stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Lead API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, e.g. `https://example.com/api`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of leads fetched for one report.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: default_timeout(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_fetch_limit() -> usize {
    DEFAULT_FETCH_LIMIT
}

/// Leads table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Rows per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Default sort direction for the product column.
    #[serde(default)]
    pub sort: SortDirection,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            sort: SortDirection::Asc,
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Analytics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Number of products listed in the top products table.
    #[serde(default = "default_top_products")]
    pub top_products: usize,

    /// IANA time zone for local dates and hours; system zone when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_products: default_top_products(),
            timezone: None,
        }
    }
}

fn default_top_products() -> usize {
    DEFAULT_TOP_PRODUCTS
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = Some(url.clone());
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(limit) = args.limit {
            self.api.fetch_limit = limit;
        }

        if let Some(page_size) = args.page_size {
            self.table.page_size = page_size;
        }
        if let Some(sort) = args.sort {
            self.table.sort = sort;
        }

        if let Some(top) = args.top {
            self.analytics.top_products = top;
        }
        if let Some(ref tz) = args.timezone {
            self.analytics.timezone = Some(tz.clone());
        }

        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
