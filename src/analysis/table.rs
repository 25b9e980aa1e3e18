//! Filter, sort and paginate pipeline for the leads table.

use crate::models::{LeadRecord, QualityTier};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Rows per page when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Sort direction for the product column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// A to Z (default)
    #[default]
    Asc,
    /// Z to A
    Desc,
}

impl SortDirection {
    /// Query-string value understood by the lead API.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Conjunctive row filter. Empty fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadFilter {
    /// Case-insensitive substring of client name or phone.
    pub search: Option<String>,
    /// Exact quality tier.
    pub quality: Option<QualityTier>,
    /// Exact source, as labelled in reports (`unspecified` for none).
    pub source: Option<String>,
    /// Case-insensitive substring of the product.
    pub product: Option<String>,
}

impl LeadFilter {
    /// Whether `lead` passes every active filter.
    pub fn matches(&self, lead: &LeadRecord) -> bool {
        if let Some(needle) = active(&self.search) {
            let needle = needle.to_lowercase();
            if !contains_ci(&lead.client_name, &needle) && !contains_ci(&lead.phone, &needle) {
                return false;
            }
        }

        if let Some(quality) = self.quality {
            if lead.quality != quality {
                return false;
            }
        }

        if let Some(source) = active(&self.source) {
            if lead.source_label() != source.trim() {
                return false;
            }
        }

        if let Some(needle) = active(&self.product) {
            if !contains_ci(&lead.selected_product, &needle.to_lowercase()) {
                return false;
            }
        }

        true
    }
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn contains_ci(haystack: &str, lowercase_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowercase_needle.trim())
}

/// One table request.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
    pub filter: LeadFilter,
    pub sort: SortDirection,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ViewRequest {
    fn default() -> Self {
        Self {
            filter: LeadFilter::default(),
            sort: SortDirection::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of the leads table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadPage {
    /// Rows on this page; empty when `page` is past the end.
    pub records: Vec<LeadRecord>,
    /// Page that was requested (1-based).
    pub page: usize,
    pub page_size: usize,
    /// At least 1, even when nothing matched.
    pub total_pages: usize,
    /// Rows that passed the filter, across all pages.
    pub total_matches: usize,
}

/// Filter, sort and paginate a snapshot of leads.
pub fn view(records: &[LeadRecord], request: &ViewRequest) -> LeadPage {
    let page_size = request.page_size.max(1);
    let page = request.page.max(1);

    let mut rows: Vec<&LeadRecord> = records
        .iter()
        .filter(|lead| request.filter.matches(lead))
        .collect();

    // sort_by is stable: equal products keep input order in both directions
    rows.sort_by(|a, b| compare_products(a, b, request.sort));

    let total_matches = rows.len();
    let total_pages = total_matches.div_ceil(page_size).max(1);

    let records = rows
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect();

    LeadPage {
        records,
        page,
        page_size,
        total_pages,
        total_matches,
    }
}

fn compare_products(a: &LeadRecord, b: &LeadRecord, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => a.selected_product.cmp(&b.selected_product),
        SortDirection::Desc => b.selected_product.cmp(&a.selected_product),
    }
}
