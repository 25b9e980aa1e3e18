//! Data models for lead reporting.
//!
//! This module contains the core data structures used throughout
//! the application for representing leads and the analytics derived
//! from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Label used for leads whose source or product is empty.
pub const UNSPECIFIED_LABEL: &str = "unspecified";

/// Quality rating of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    /// Cold inquiry, unlikely to convert
    Low,
    /// Some interest, needs nurturing
    Medium,
    /// Warm inquiry with clear intent
    Good,
    /// Ready to buy, counted as converted
    High,
}

impl QualityTier {
    /// All tiers in presentation order (best first).
    pub const ALL: [QualityTier; 4] = [
        QualityTier::High,
        QualityTier::Good,
        QualityTier::Medium,
        QualityTier::Low,
    ];

    /// Parse a quality label as it appears on the wire or on the command line.
    ///
    /// Accepts English names in any case and the Russian labels emitted by
    /// the lead API.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Высокий" => return Some(QualityTier::High),
            "Хороший" => return Some(QualityTier::Good),
            "Средний" => return Some(QualityTier::Medium),
            "Низкий" => return Some(QualityTier::Low),
            _ => {}
        }

        match raw.trim().to_lowercase().as_str() {
            "high" => Some(QualityTier::High),
            "good" => Some(QualityTier::Good),
            "medium" => Some(QualityTier::Medium),
            "low" => Some(QualityTier::Low),
            _ => None,
        }
    }

    /// The label the lead API uses for this tier.
    pub fn wire_label(&self) -> &'static str {
        match self {
            QualityTier::High => "Высокий",
            QualityTier::Good => "Хороший",
            QualityTier::Medium => "Средний",
            QualityTier::Low => "Низкий",
        }
    }

    /// Returns an emoji representation of the tier.
    pub fn emoji(&self) -> &'static str {
        match self {
            QualityTier::High => "🟢",
            QualityTier::Good => "🔵",
            QualityTier::Medium => "🟡",
            QualityTier::Low => "⚪",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityTier::High => write!(f, "High"),
            QualityTier::Good => write!(f, "Good"),
            QualityTier::Medium => write!(f, "Medium"),
            QualityTier::Low => write!(f, "Low"),
        }
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualityTier::parse(s).ok_or_else(|| {
            format!(
                "unknown quality tier '{}' (expected high, good, medium or low)",
                s
            )
        })
    }
}

/// A single inbound sales inquiry, normalized at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    /// Opaque identifier assigned by the lead API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Client name (may be empty).
    pub client_name: String,
    /// Contact phone.
    pub phone: String,
    /// Product the client asked about.
    pub selected_product: String,
    /// Free-text summary of the interaction.
    pub summary: String,
    /// Quality rating.
    pub quality: QualityTier,
    /// Arrival time; `None` when unknown or unparseable.
    pub timestamp: Option<DateTime<Utc>>,
    /// Acquisition channel (empty when unspecified).
    pub source: String,
}

impl LeadRecord {
    /// Creates a record with the given quality and everything else empty.
    pub fn new(quality: QualityTier) -> Self {
        Self {
            id: None,
            client_name: String::new(),
            phone: String::new(),
            selected_product: String::new(),
            summary: String::new(),
            quality,
            timestamp: None,
            source: String::new(),
        }
    }

    /// Source label used for grouping.
    pub fn source_label(&self) -> &str {
        label_or_unspecified(&self.source)
    }

    /// Product label used for grouping.
    pub fn product_label(&self) -> &str {
        label_or_unspecified(&self.selected_product)
    }
}

fn label_or_unspecified(value: &str) -> &str {
    if value.trim().is_empty() {
        UNSPECIFIED_LABEL
    } else {
        value
    }
}

/// Count and share of one quality tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCount {
    pub tier: QualityTier,
    pub count: usize,
    pub percentage: f64,
}

/// Count and share of one acquisition source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStat {
    pub source: String,
    pub count: usize,
    pub percentage: f64,
}

/// Occurrences of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStat {
    pub product: String,
    pub count: usize,
}

/// Leads received on one local calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

/// Analytics derived from a snapshot of lead records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    /// Total number of records.
    pub total: usize,
    /// One entry per tier, in `QualityTier::ALL` order, zeros included.
    pub quality_distribution: Vec<QualityCount>,
    /// Number of `High` quality records.
    pub converted_count: usize,
    /// `converted_count / total * 100`, or 0 for an empty snapshot.
    pub conversion_rate: f64,
    /// Records at most seven days (exact elapsed time) before the reference.
    pub new_leads: usize,
    /// Records on the reference's local calendar date.
    pub leads_today: usize,
    /// Records since the same wall-clock time seven calendar days ago.
    pub leads_this_week: usize,
    /// Records per local hour of day.
    pub hourly_distribution: [usize; 24],
    /// Records per source, in first-occurrence order.
    pub source_distribution: Vec<SourceStat>,
    /// Most frequent products, most frequent first.
    pub top_products: Vec<ProductStat>,
    /// Records per local calendar date, oldest first.
    pub daily_distribution: Vec<DailyCount>,
    /// Records without a usable timestamp.
    pub undated: usize,
}

impl AnalyticsSummary {
    /// Count for a single tier.
    pub fn quality_count(&self, tier: QualityTier) -> usize {
        self.quality_distribution
            .iter()
            .find(|q| q.tier == tier)
            .map(|q| q.count)
            .unwrap_or(0)
    }

    /// Sources ranked by count (highest first), ties in first-occurrence order.
    pub fn ranked_sources(&self) -> Vec<&SourceStat> {
        let mut ranked: Vec<&SourceStat> = self.source_distribution.iter().collect();
        ranked.sort_by_key(|s| std::cmp::Reverse(s.count));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_parse_english_and_wire_labels() {
        assert_eq!(QualityTier::parse("High"), Some(QualityTier::High));
        assert_eq!(QualityTier::parse("  medium "), Some(QualityTier::Medium));
        assert_eq!(QualityTier::parse("Высокий"), Some(QualityTier::High));
        assert_eq!(QualityTier::parse("Хороший"), Some(QualityTier::Good));
        assert_eq!(QualityTier::parse("Средний"), Some(QualityTier::Medium));
        assert_eq!(QualityTier::parse("Низкий"), Some(QualityTier::Low));
        assert_eq!(QualityTier::parse("excellent"), None);
        assert_eq!(QualityTier::parse(""), None);
    }

    #[test]
    fn test_quality_from_str_error() {
        assert_eq!("low".parse::<QualityTier>(), Ok(QualityTier::Low));
        assert!("urgent".parse::<QualityTier>().is_err());
    }

    #[test]
    fn test_quality_wire_label_round_trip() {
        for tier in QualityTier::ALL {
            assert_eq!(QualityTier::parse(tier.wire_label()), Some(tier));
            assert_eq!(QualityTier::parse(&tier.to_string()), Some(tier));
        }
    }

    #[test]
    fn test_labels_fall_back_to_unspecified() {
        let mut lead = LeadRecord::new(QualityTier::Low);
        assert_eq!(lead.source_label(), UNSPECIFIED_LABEL);
        assert_eq!(lead.product_label(), UNSPECIFIED_LABEL);

        lead.source = "telegramm".to_string();
        lead.selected_product = "Camry".to_string();
        assert_eq!(lead.source_label(), "telegramm");
        assert_eq!(lead.product_label(), "Camry");
    }

    #[test]
    fn test_ranked_sources_is_stable() {
        let summary = AnalyticsSummary {
            total: 4,
            quality_distribution: Vec::new(),
            converted_count: 0,
            conversion_rate: 0.0,
            new_leads: 0,
            leads_today: 0,
            leads_this_week: 0,
            hourly_distribution: [0; 24],
            source_distribution: vec![
                SourceStat {
                    source: "A".to_string(),
                    count: 1,
                    percentage: 25.0,
                },
                SourceStat {
                    source: "B".to_string(),
                    count: 2,
                    percentage: 50.0,
                },
                SourceStat {
                    source: "C".to_string(),
                    count: 1,
                    percentage: 25.0,
                },
            ],
            top_products: Vec::new(),
            daily_distribution: Vec::new(),
            undated: 0,
        };

        let ranked: Vec<&str> = summary
            .ranked_sources()
            .iter()
            .map(|s| s.source.as_str())
            .collect();
        assert_eq!(ranked, vec!["B", "A", "C"]);
        assert_eq!(summary.quality_count(QualityTier::High), 0);
    }
}
