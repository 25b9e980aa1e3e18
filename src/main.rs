//! LeadLens - lead tables and analytics for a lead-management API
//!
//! A CLI tool that loads lead records from the lead API (or a JSON export),
//! and renders the filtered leads table, the dashboard, or the analytics
//! report as Markdown or JSON.
//!
//! Exit codes:
//!   0 - Success (including an empty report after a failed fetch)
//!   1 - Runtime error (invalid arguments, config, output, PDF export)

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod loader;
mod models;
mod report;

use analysis::{aggregate_with_limit, view, LeadFilter, ViewRequest};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use cli::{Args, OutputFormat, View};
use config::{Config, CONFIG_FILE_NAME};
use loader::{LeadClient, LeadQuery, Origin};
use report::{
    generate_analytics_markdown, generate_dashboard_markdown, generate_json_report,
    generate_leads_markdown, AnalyticsReport, LeadsReport, ReportMetadata,
};
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so [general] verbose can set the log level
    let loaded = load_config(&args);
    let config_verbose = loaded
        .as_ref()
        .is_ok_and(|loaded| loaded.config.general.verbose);

    // Initialize logging
    init_logging(args.log_level(config_verbose));

    info!("LeadLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = match loaded {
        Ok(loaded) => {
            if let Some(ref warning) = loaded.warning {
                warn!("{}", warning);
            }
            info!("Configuration: {}", loaded.source);
            run(args, loaded.config).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .leadlens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Set [api].base_url and adjust page size, top products and time zone.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so a report written to stdout stays clean.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Resolve configuration, reference time and time zone, then build the report.
async fn run(args: Args, mut config: Config) -> Result<i32> {
    config.merge_with_args(&args);

    let reference = match args.parsed_reference_time().map_err(|e| anyhow!(e))? {
        Some(explicit) => explicit,
        None => Utc::now().fixed_offset(),
    };

    match config.analytics.timezone.clone() {
        Some(name) => {
            let tz: chrono_tz::Tz = name
                .parse()
                .map_err(|_| anyhow!("Unknown time zone in configuration: {}", name))?;
            execute(&args, &config, tz, name, reference).await
        }
        None => execute(&args, &config, Local, "local".to_string(), reference).await,
    }
}

/// Load, normalize and render leads in the given reporting zone.
async fn execute<Tz>(
    args: &Args,
    config: &Config,
    tz: Tz,
    tz_name: String,
    reference: DateTime<FixedOffset>,
) -> Result<i32>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let origin = build_origin(args, config)?;
    let filter = LeadFilter {
        search: args.search.clone(),
        quality: args.quality,
        source: args.source.clone(),
        product: args.product.clone(),
    };
    let sort = config.table.sort;

    if let Some(ref pdf_path) = args.export_pdf {
        export_pdf(&origin, &filter, pdf_path).await?;
    }

    // Step 1: Load leads; a failed fetch yields an empty report
    let query = LeadQuery::first_page(config.api.fetch_limit, &filter, sort);
    let batch = origin.load_or_empty(&query).await;

    // Step 2: Normalize once
    let ingested = ingest::normalize_batch(batch.entries, &tz);
    let mut records = ingested.records;
    if records.len() > config.api.fetch_limit {
        info!(
            "Keeping the first {} of {} leads",
            config.api.fetch_limit,
            records.len()
        );
        records.truncate(config.api.fetch_limit);
    }

    if args.dry_run {
        return handle_dry_run(&origin, records.len(), ingested.skipped.len(), batch.total);
    }

    let reference_local = reference.with_timezone(&tz);
    let metadata = ReportMetadata {
        origin: origin.describe(),
        generated_at: Utc::now(),
        reference_time: reference_local.to_rfc3339(),
        timezone: tz_name,
        records_loaded: records.len(),
        records_skipped: ingested.skipped.len(),
    };

    // Step 3: Build and render the requested view
    let output = match args.view {
        View::Leads => {
            let request = ViewRequest {
                filter: filter.clone(),
                sort,
                page: args.page,
                page_size: config.table.page_size,
            };
            let page = view(&records, &request);
            if page.page > page.total_pages {
                warn!(
                    "Page {} requested but there are only {} pages",
                    page.page, page.total_pages
                );
            }

            let report = LeadsReport {
                metadata,
                filter,
                sort,
                page,
            };
            match args.format {
                OutputFormat::Json => generate_json_report(&report)?,
                OutputFormat::Markdown => generate_leads_markdown(&report, &tz),
            }
        }
        View::Dashboard | View::Analytics => {
            records.retain(|lead| filter.matches(lead));
            let summary =
                aggregate_with_limit(&records, &reference_local, config.analytics.top_products);
            let report = AnalyticsReport { metadata, summary };
            match (args.format, args.view) {
                (OutputFormat::Json, _) => generate_json_report(&report)?,
                (OutputFormat::Markdown, View::Dashboard) => generate_dashboard_markdown(&report),
                (OutputFormat::Markdown, _) => generate_analytics_markdown(&report),
            }
        }
    };

    // Step 4: Write the report
    match config.general.output.as_deref() {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path))?;
            if !args.quiet {
                eprintln!("✅ Report saved to: {}", path);
            }
        }
        None => print!("{}", output),
    }

    Ok(0)
}

/// Build the lead origin from --input or the API settings.
fn build_origin(args: &Args, config: &Config) -> Result<Origin> {
    if let Some(ref input) = args.input {
        return Ok(Origin::File(input.clone()));
    }

    let Some(ref base_url) = config.api.base_url else {
        bail!(
            "No lead source: pass --api-url or --input, set LEADLENS_API_URL, or set [api].base_url in {}",
            CONFIG_FILE_NAME
        );
    };

    let client = LeadClient::new(base_url, config.api.timeout_seconds, !args.quiet)
        .context("Failed to create HTTP client")?;
    Ok(Origin::Api(client))
}

/// Download the PDF export for the current filters.
async fn export_pdf(origin: &Origin, filter: &LeadFilter, path: &Path) -> Result<()> {
    let Origin::Api(client) = origin else {
        bail!("--export-pdf needs the lead API");
    };

    let bytes = client
        .export_pdf(&LeadQuery::filters_only(filter))
        .await
        .context("Failed to download PDF export")?;

    std::fs::write(path, &bytes)
        .with_context(|| format!("Failed to write PDF to {}", path.display()))?;

    info!("Saved PDF export ({} bytes) to {}", bytes.len(), path.display());
    Ok(())
}

/// Handle --dry-run: print what was loaded, exit.
fn handle_dry_run(origin: &Origin, loaded: usize, skipped: usize, api_total: usize) -> Result<i32> {
    println!("\n🔍 Dry run: loaded leads from {}\n", origin.describe());
    println!("   Normalized: {}", loaded);
    println!("   Skipped:    {}", skipped);
    println!("   Reported total: {}", api_total);
    println!("\n✅ Dry run complete. No report was rendered.");
    Ok(0)
}

/// Configuration plus where it came from, logged once logging is up.
struct LoadedConfig {
    config: Config,
    source: String,
    warning: Option<String>,
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialized, so nothing here logs.
fn load_config(args: &Args) -> Result<LoadedConfig> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok(LoadedConfig {
            config: Config::load(config_path)?,
            source: config_path.display().to_string(),
            warning: None,
        });
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(LoadedConfig {
            config,
            source: CONFIG_FILE_NAME.to_string(),
            warning: None,
        }),
        Ok(None) => Ok(LoadedConfig {
            config: Config::default(),
            source: "defaults".to_string(),
            warning: None,
        }),
        Err(e) => Ok(LoadedConfig {
            config: Config::default(),
            source: "defaults".to_string(),
            warning: Some(format!("Failed to load config: {:#}", e)),
        }),
    }
}
