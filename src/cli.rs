//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::SortDirection;
use crate::models::QualityTier;
use chrono::{DateTime, FixedOffset};
use clap::Parser;
use std::path::PathBuf;

/// LeadLens - lead tables and analytics from your lead API
///
/// Loads leads from the lead API (or a JSON export) and renders the
/// filtered leads table, the dashboard, or the analytics report as
/// Markdown or JSON.
///
/// Examples:
///   leadlens --api-url https://crm.example.com/api
///   leadlens --api-url https://crm.example.com/api --quality high --source AmoLine
///   leadlens --input leads.json --view analytics --timezone Europe/Moscow
///   leadlens --input leads.json --view dashboard --format json -o dashboard.json
///   leadlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Lead API root URL
    ///
    /// Leads are fetched from `<URL>/leads`. Can also be set via
    /// LEADLENS_API_URL or the [api] section of .leadlens.toml.
    #[arg(long, value_name = "URL", env = "LEADLENS_API_URL", conflicts_with = "input")]
    pub api_url: Option<String>,

    /// Read leads from a JSON export instead of the API
    ///
    /// Accepts a bare array of leads or an object with a `leads` array.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Which report to render
    #[arg(long, default_value = "leads", value_name = "VIEW")]
    pub view: View,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .leadlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    // === Table ===
    /// Search client name or phone (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Only leads of this quality (high, good, medium, low)
    #[arg(long, value_name = "TIER")]
    pub quality: Option<QualityTier>,

    /// Only leads from this source (exact match)
    #[arg(long, value_name = "SOURCE")]
    pub source: Option<String>,

    /// Only leads whose product contains this text (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub product: Option<String>,

    /// Sort direction for the product column
    #[arg(long, value_name = "DIR")]
    pub sort: Option<SortDirection>,

    /// Page of the leads table to show (1-based)
    #[arg(long, default_value = "1", value_name = "N")]
    pub page: usize,

    /// Rows per page of the leads table
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    // === Analytics ===
    /// Number of products in the top products table
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Reference time for "today" and the 7-day windows (RFC 3339)
    ///
    /// Defaults to the current time.
    #[arg(long, value_name = "TIME")]
    pub reference_time: Option<String>,

    /// IANA time zone for local dates and hours (e.g. Europe/Moscow)
    ///
    /// Defaults to the system time zone.
    #[arg(long, value_name = "TZ")]
    pub timezone: Option<String>,

    // === Loader ===
    /// Maximum number of leads to fetch
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Also download the server-rendered PDF export to this file
    #[arg(long, value_name = "FILE")]
    pub export_pdf: Option<PathBuf>,

    /// Dry run: load and normalize leads, print counts, render nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .leadlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Report to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum View {
    /// Filtered, sorted, paginated leads table (default)
    #[default]
    Leads,
    /// Totals, source shares, daily timeline and top products
    Dashboard,
    /// Conversion, recency windows, hourly and source breakdowns
    Analytics,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            if self.export_pdf.is_some() {
                return Err("--export-pdf needs the lead API, not --input".to_string());
            }
        }

        if self.page == 0 {
            return Err("Page must be at least 1".to_string());
        }

        if self.page_size == Some(0) {
            return Err("Page size must be at least 1".to_string());
        }

        if self.limit == Some(0) {
            return Err("Limit must be at least 1".to_string());
        }

        if self.top == Some(0) {
            return Err("Top must be at least 1".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.reference_time.is_some() {
            self.parsed_reference_time()?;
        }

        if let Some(ref tz) = self.timezone {
            tz.parse::<chrono_tz::Tz>()
                .map_err(|_| format!("Unknown time zone: {}", tz))?;
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// The explicit reference time, if one was given.
    pub fn parsed_reference_time(&self) -> Result<Option<DateTime<FixedOffset>>, String> {
        self.reference_time
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw.trim())
                    .map_err(|e| format!("Invalid --reference-time '{}': {}", raw, e))
            })
            .transpose()
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `[general] verbose` from the config file;
    /// `--quiet` still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
