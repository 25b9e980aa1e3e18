//! Report generation.
//!
//! This module renders the leads table, the dashboard and the analytics
//! report as Markdown or JSON.

use crate::analysis::{LeadFilter, LeadPage, SortDirection};
use crate::ingest::display_value;
use crate::models::{AnalyticsSummary, LeadRecord};
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt::Display;

/// Metadata shared by every report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// API URL or file the leads came from.
    pub origin: String,
    /// Wall-clock time the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Reference time used for "today" and the 7-day windows (RFC 3339).
    pub reference_time: String,
    /// Zone used for local dates and hours.
    pub timezone: String,
    /// Leads that passed normalization.
    pub records_loaded: usize,
    /// Leads rejected during normalization.
    pub records_skipped: usize,
}

/// Dashboard or analytics report.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub metadata: ReportMetadata,
    pub summary: AnalyticsSummary,
}

/// One page of the leads table.
#[derive(Debug, Clone, Serialize)]
pub struct LeadsReport {
    pub metadata: ReportMetadata,
    pub filter: LeadFilter,
    pub sort: SortDirection,
    pub page: LeadPage,
}

/// Serialize any report as pretty JSON.
pub fn generate_json_report<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate the leads table page.
pub fn generate_leads_markdown<Tz>(report: &LeadsReport, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut output = String::new();

    output.push_str("# Leads\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_filter_section(&report.filter, report.sort));

    let page = &report.page;
    output.push_str(&format!(
        "*{} matching leads | Page {} of {}*\n\n",
        page.total_matches, page.page, page.total_pages
    ));

    if page.records.is_empty() {
        output.push_str("No data.\n\n");
    } else {
        output.push_str("| Client | Phone | Product | Summary | Quality | Received | Source |\n");
        output.push_str("|:---|:---|:---|:---|:---:|:---|:---|\n");
        for lead in &page.records {
            output.push_str(&generate_lead_row(lead, tz));
        }
        output.push('\n');
    }

    if page.page > page.total_pages {
        output.push_str(&format!(
            "> Page {} is past the end; the last page is {}.\n\n",
            page.page, page.total_pages
        ));
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the dashboard: totals, source shares, daily timeline, top products.
pub fn generate_dashboard_markdown(report: &AnalyticsReport) -> String {
    let summary = &report.summary;
    let mut output = String::new();

    output.push_str("# Dashboard\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    if summary.total == 0 {
        output.push_str("No data.\n\n");
        output.push_str(&generate_footer());
        return output;
    }

    output.push_str("## Overview\n\n");
    output.push_str("| Total leads | Quality conversion |\n");
    output.push_str("|:---:|:---:|\n");
    output.push_str(&format!(
        "| {} | {:.1}% ({} of {}) |\n\n",
        summary.total, summary.conversion_rate, summary.converted_count, summary.total
    ));

    output.push_str(&generate_sources_section(summary, "Sources"));

    output.push_str("## Leads Over Time\n\n");
    if summary.daily_distribution.is_empty() {
        output.push_str("No dated leads.\n\n");
    } else {
        output.push_str("| Date | Leads |\n");
        output.push_str("|:---|:---:|\n");
        for day in &summary.daily_distribution {
            output.push_str(&format!("| {} | {} |\n", day.date.format("%Y-%m-%d"), day.count));
        }
        output.push('\n');
    }

    output.push_str(&format!("## Top {} Products\n\n", summary.top_products.len()));
    if summary.top_products.is_empty() {
        output.push_str("No product data.\n\n");
    } else {
        output.push_str("| # | Product | Leads |\n");
        output.push_str("|:---:|:---|:---:|\n");
        for (i, product) in summary.top_products.iter().enumerate() {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                i + 1,
                escape_cell(&product.product),
                product.count
            ));
        }
        output.push('\n');
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the analytics report: conversion, recency, hours and sources.
pub fn generate_analytics_markdown(report: &AnalyticsReport) -> String {
    let summary = &report.summary;
    let mut output = String::new();

    output.push_str("# Lead Analytics\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    // Conversion by quality
    output.push_str("## Conversion by Quality\n\n");
    output.push_str("| Quality | Leads | Share |\n");
    output.push_str("|:---|:---:|:---:|\n");
    for q in &summary.quality_distribution {
        output.push_str(&format!(
            "| {} {} | {} | {:.1}% |\n",
            q.tier.emoji(),
            q.tier,
            q.count,
            q.percentage
        ));
    }
    output.push_str(&format!(
        "\n**Converted (High):** {} of {} ({:.1}%)\n\n",
        summary.converted_count, summary.total, summary.conversion_rate
    ));

    // Recency
    output.push_str("## Recency\n\n");
    output.push_str("| Today | This week | New (last 7 × 24h) | Undated |\n");
    output.push_str("|:---:|:---:|:---:|:---:|\n");
    output.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        summary.leads_today, summary.leads_this_week, summary.new_leads, summary.undated
    ));

    // Hourly distribution
    output.push_str("## Leads by Hour of Day\n\n");
    output.push_str("| Hour | Leads |\n");
    output.push_str("|:---:|:---:|\n");
    for (hour, count) in summary.hourly_distribution.iter().enumerate() {
        output.push_str(&format!("| {}:00 | {} |\n", hour, count));
    }
    output.push('\n');

    output.push_str(&generate_sources_section(summary, "Source Effectiveness"));

    output.push_str(&generate_footer());
    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Origin:** {}\n", metadata.origin));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Reference Time:** {}\n", metadata.reference_time));
    section.push_str(&format!("- **Time Zone:** {}\n", metadata.timezone));
    section.push_str(&format!("- **Leads Loaded:** {}\n", metadata.records_loaded));
    if metadata.records_skipped > 0 {
        section.push_str(&format!("- **Leads Skipped:** {}\n", metadata.records_skipped));
    }
    section.push('\n');

    section
}

/// Generate the active filter line, if any filter is set.
fn generate_filter_section(filter: &LeadFilter, sort: SortDirection) -> String {
    let mut parts = Vec::new();

    if let Some(ref search) = filter.search {
        parts.push(format!("search `{}`", search));
    }
    if let Some(quality) = filter.quality {
        parts.push(format!("quality {}", quality));
    }
    if let Some(ref source) = filter.source {
        parts.push(format!("source `{}`", source));
    }
    if let Some(ref product) = filter.product {
        parts.push(format!("product `{}`", product));
    }

    let filters = if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    };

    format!(
        "**Filters:** {} | **Sort:** product {}\n\n",
        filters,
        sort.as_str()
    )
}

/// Generate a sources table, ranked by count.
fn generate_sources_section(summary: &AnalyticsSummary, title: &str) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));
    if summary.source_distribution.is_empty() {
        section.push_str("No source data.\n\n");
        return section;
    }

    section.push_str("| Source | Leads | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for source in summary.ranked_sources() {
        section.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            escape_cell(&source.source),
            source.count,
            source.percentage
        ));
    }
    section.push('\n');

    section
}

/// Generate a single table row.
fn generate_lead_row<Tz>(lead: &LeadRecord, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let received = lead
        .timestamp
        .map(|ts| ts.with_timezone(tz).format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_default();

    format!(
        "| {} | {} | {} | {} | {} | {} | {} |\n",
        escape_cell(display_value(&lead.client_name)),
        escape_cell(display_value(&lead.phone)),
        escape_cell(display_value(&lead.selected_product)),
        escape_cell(display_value(&lead.summary)),
        lead.quality,
        display_value(&received),
        escape_cell(display_value(&lead.source)),
    )
}

/// Keep free text from breaking the Markdown table.
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by LeadLens*\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, view, ViewRequest};
    use crate::models::QualityTier;
    use chrono::FixedOffset;

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            origin: "https://crm.example.com/api".to_string(),
            generated_at: Utc::now(),
            reference_time: "2024-01-02T12:00:00+00:00".to_string(),
            timezone: "UTC".to_string(),
            records_loaded: 3,
            records_skipped: 1,
        }
    }

    fn create_test_leads() -> Vec<LeadRecord> {
        let ts = |s: &str| Some(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc));
        vec![
            LeadRecord {
                client_name: "Anna".to_string(),
                phone: "+7 900".to_string(),
                selected_product: "Camry".to_string(),
                summary: "Asked | about credit".to_string(),
                timestamp: ts("2024-01-01T10:00:00Z"),
                source: "AmoLine".to_string(),
                ..LeadRecord::new(QualityTier::High)
            },
            LeadRecord {
                client_name: "Boris".to_string(),
                selected_product: "Rav4".to_string(),
                timestamp: ts("2024-01-02T09:00:00Z"),
                source: "telegramm".to_string(),
                ..LeadRecord::new(QualityTier::Low)
            },
            LeadRecord {
                selected_product: "Camry".to_string(),
                source: "telegramm".to_string(),
                ..LeadRecord::new(QualityTier::High)
            },
        ]
    }

    fn analytics_report() -> AnalyticsReport {
        let reference = DateTime::parse_from_rfc3339("2024-01-02T12:00:00Z").unwrap();
        AnalyticsReport {
            metadata: metadata(),
            summary: aggregate(&create_test_leads(), &reference),
        }
    }

    #[test]
    fn test_generate_leads_markdown() {
        let leads = create_test_leads();
        let report = LeadsReport {
            metadata: metadata(),
            filter: LeadFilter::default(),
            sort: SortDirection::Asc,
            page: view(&leads, &ViewRequest::default()),
        };

        let markdown = generate_leads_markdown(&report, &Utc);

        assert!(markdown.contains("# Leads"));
        assert!(markdown.contains("Page 1 of 1"));
        assert!(markdown.contains("| Anna | +7 900 | Camry | Asked \\| about credit | High | 01.01.2024 10:00 | AmoLine |"));
        // empty name, phone, summary and timestamp use the placeholder
        assert!(markdown.contains("| - | - | Camry | - | High | - | telegramm |"));
        assert!(markdown.contains("**Leads Skipped:** 1"));
    }

    #[test]
    fn test_leads_markdown_uses_reporting_zone() {
        let leads = create_test_leads();
        let report = LeadsReport {
            metadata: metadata(),
            filter: LeadFilter::default(),
            sort: SortDirection::Asc,
            page: view(&leads, &ViewRequest::default()),
        };

        let plus3 = FixedOffset::east_opt(3 * 3600).unwrap();
        let markdown = generate_leads_markdown(&report, &plus3);
        assert!(markdown.contains("01.01.2024 13:00"));
    }

    #[test]
    fn test_leads_markdown_past_last_page() {
        let report = LeadsReport {
            metadata: metadata(),
            filter: LeadFilter {
                quality: Some(QualityTier::Good),
                ..LeadFilter::default()
            },
            sort: SortDirection::Desc,
            page: view(
                &create_test_leads(),
                &ViewRequest {
                    page: 2,
                    ..ViewRequest::default()
                },
            ),
        };

        let markdown = generate_leads_markdown(&report, &Utc);
        assert!(markdown.contains("No data."));
        assert!(markdown.contains("the last page is 1"));
        assert!(markdown.contains("quality Good"));
        assert!(markdown.contains("product desc"));
    }

    #[test]
    fn test_generate_dashboard_markdown() {
        let markdown = generate_dashboard_markdown(&analytics_report());

        assert!(markdown.contains("# Dashboard"));
        assert!(markdown.contains("| 3 | 66.7% (2 of 3) |"));
        assert!(markdown.contains("| 2024-01-01 | 1 |"));
        assert!(markdown.contains("| 1 | Camry | 2 |"));

        // telegramm outranks AmoLine
        let telegramm = markdown.find("| telegramm |").unwrap();
        let amoline = markdown.find("| AmoLine |").unwrap();
        assert!(telegramm < amoline);
    }

    #[test]
    fn test_dashboard_without_data() {
        let reference = DateTime::parse_from_rfc3339("2024-01-02T12:00:00Z").unwrap();
        let report = AnalyticsReport {
            metadata: metadata(),
            summary: aggregate(&[], &reference),
        };

        let markdown = generate_dashboard_markdown(&report);
        assert!(markdown.contains("No data."));
        assert!(!markdown.contains("## Sources"));
    }

    #[test]
    fn test_generate_analytics_markdown() {
        let markdown = generate_analytics_markdown(&analytics_report());

        assert!(markdown.contains("# Lead Analytics"));
        assert!(markdown.contains("| 🟢 High | 2 | 66.7% |"));
        assert!(markdown.contains("| ⚪ Low | 1 | 33.3% |"));
        assert!(markdown.contains("| 10:00 | 1 |"));
        assert!(markdown.contains("| 23:00 | 0 |"));
        assert!(markdown.contains("| 1 | 2 | 2 | 1 |"));
        assert!(markdown.contains("## Source Effectiveness"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&analytics_report()).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"conversion_rate\""));
        assert!(json.contains("\"hourly_distribution\""));
        assert!(json.contains("\"top_products\""));
    }
}
