//! Lead aggregation and statistics.
//!
//! This module derives an `AnalyticsSummary` from a snapshot of lead
//! records. Aggregation is a pure function of the records and an explicit
//! reference time; "local" always means the zone carried by that reference.

use crate::models::{
    AnalyticsSummary, DailyCount, LeadRecord, ProductStat, QualityCount, QualityTier, SourceStat,
};
use chrono::{DateTime, Days, Duration, NaiveDate, TimeZone, Timelike, Utc};
use std::collections::{BTreeMap, HashMap};

/// Number of products kept in `top_products` by default.
pub const DEFAULT_TOP_PRODUCTS: usize = 5;

/// Length of both recency windows, in days.
const WINDOW_DAYS: u64 = 7;

/// Aggregate records against `reference`, keeping the default top products.
pub fn aggregate<Tz: TimeZone>(records: &[LeadRecord], reference: &DateTime<Tz>) -> AnalyticsSummary {
    aggregate_with_limit(records, reference, DEFAULT_TOP_PRODUCTS)
}

/// Aggregate records against `reference`, keeping at most `top_n` products.
pub fn aggregate_with_limit<Tz: TimeZone>(
    records: &[LeadRecord],
    reference: &DateTime<Tz>,
    top_n: usize,
) -> AnalyticsSummary {
    let tz = reference.timezone();
    let total = records.len();
    let today = reference.date_naive();
    let reference_utc = reference.with_timezone(&Utc);
    let new_window = Duration::days(WINDOW_DAYS as i64);
    let week_cutoff = calendar_week_cutoff(reference);

    let mut tier_counts: HashMap<QualityTier, usize> = HashMap::new();
    let mut sources = Tally::default();
    let mut products = Tally::default();
    let mut hourly = [0usize; 24];
    let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut new_leads = 0;
    let mut leads_today = 0;
    let mut leads_this_week = 0;
    let mut undated = 0;

    for record in records {
        *tier_counts.entry(record.quality).or_default() += 1;
        sources.add(record.source_label());
        products.add(record.product_label());

        let Some(ts) = record.timestamp else {
            undated += 1;
            continue;
        };

        let local = ts.with_timezone(&tz);
        let local_date = local.date_naive();

        if local_date == today {
            leads_today += 1;
        }
        if reference_utc.signed_duration_since(ts) <= new_window {
            new_leads += 1;
        }
        if ts >= week_cutoff {
            leads_this_week += 1;
        }

        hourly[local.hour() as usize] += 1;
        *daily.entry(local_date).or_default() += 1;
    }

    let quality_distribution: Vec<QualityCount> = QualityTier::ALL
        .iter()
        .map(|&tier| {
            let count = tier_counts.get(&tier).copied().unwrap_or(0);
            QualityCount {
                tier,
                count,
                percentage: percentage(count, total),
            }
        })
        .collect();

    let converted_count = tier_counts.get(&QualityTier::High).copied().unwrap_or(0);

    let source_distribution = sources
        .entries
        .iter()
        .map(|&(source, count)| SourceStat {
            source: source.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect();

    AnalyticsSummary {
        total,
        quality_distribution,
        converted_count,
        conversion_rate: percentage(converted_count, total),
        new_leads,
        leads_today,
        leads_this_week,
        hourly_distribution: hourly,
        source_distribution,
        top_products: top_products(products, top_n),
        daily_distribution: daily
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect(),
        undated,
    }
}

/// Share of `count` in `total` as a percentage, 0 for an empty total.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Same local wall-clock time seven calendar days before `reference`.
///
/// Falls back to exactly seven days of elapsed time when that wall-clock
/// time does not exist in the zone.
pub fn calendar_week_cutoff<Tz: TimeZone>(reference: &DateTime<Tz>) -> DateTime<Utc> {
    reference
        .naive_local()
        .checked_sub_days(Days::new(WINDOW_DAYS))
        .and_then(|naive| reference.timezone().from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| reference.with_timezone(&Utc) - Duration::days(WINDOW_DAYS as i64))
}

/// Counts keyed by label, in first-occurrence order.
#[derive(Default)]
struct Tally<'a> {
    index: HashMap<&'a str, usize>,
    entries: Vec<(&'a str, usize)>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, key: &'a str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, 1));
            }
        }
    }
}

/// Most frequent labels first; the stable sort keeps first-occurrence order on ties.
fn top_products(tally: Tally<'_>, n: usize) -> Vec<ProductStat> {
    let mut ranked = tally.entries;
    ranked.sort_by_key(|&(_, count)| std::cmp::Reverse(count));
    ranked.truncate(n);

    ranked
        .into_iter()
        .map(|(product, count)| ProductStat {
            product: product.to_string(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNSPECIFIED_LABEL;
    use chrono::FixedOffset;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn create_test_lead(quality: QualityTier, source: &str, timestamp: Option<&str>) -> LeadRecord {
        LeadRecord {
            source: source.to_string(),
            timestamp: timestamp.map(at),
            ..LeadRecord::new(quality)
        }
    }

    fn with_product(product: &str) -> LeadRecord {
        LeadRecord {
            selected_product: product.to_string(),
            ..LeadRecord::new(QualityTier::Medium)
        }
    }

    fn sample_leads() -> Vec<LeadRecord> {
        vec![
            create_test_lead(QualityTier::High, "A", Some("2024-01-01T10:00:00Z")),
            create_test_lead(QualityTier::High, "A", Some("2024-01-01T14:00:00Z")),
            create_test_lead(QualityTier::Low, "B", Some("2024-01-02T09:00:00Z")),
        ]
    }

    #[test]
    fn test_empty_snapshot() {
        let summary = aggregate(&[], &at("2024-01-02T12:00:00Z"));

        assert_eq!(summary.total, 0);
        assert_eq!(summary.converted_count, 0);
        assert_eq!(summary.conversion_rate, 0.0);
        assert_eq!(summary.hourly_distribution, [0; 24]);
        assert!(summary.source_distribution.is_empty());
        assert!(summary.top_products.is_empty());
        assert!(summary.daily_distribution.is_empty());
        assert_eq!(summary.quality_distribution.len(), 4);
        assert!(summary
            .quality_distribution
            .iter()
            .all(|q| q.count == 0 && q.percentage == 0.0));
    }

    #[test]
    fn test_end_to_end_example() {
        let summary = aggregate(&sample_leads(), &at("2024-01-02T12:00:00Z"));

        assert_eq!(summary.total, 3);
        assert_eq!(summary.quality_count(QualityTier::High), 2);
        assert_eq!(summary.quality_count(QualityTier::Good), 0);
        assert_eq!(summary.quality_count(QualityTier::Medium), 0);
        assert_eq!(summary.quality_count(QualityTier::Low), 1);
        assert_eq!(summary.converted_count, 2);
        assert!((summary.conversion_rate - 66.67).abs() < 0.01);

        assert_eq!(summary.source_distribution.len(), 2);
        assert_eq!(summary.source_distribution[0].source, "A");
        assert_eq!(summary.source_distribution[0].count, 2);
        assert!((summary.source_distribution[0].percentage - 66.67).abs() < 0.01);
        assert_eq!(summary.source_distribution[1].source, "B");
        assert_eq!(summary.source_distribution[1].count, 1);
        assert!((summary.source_distribution[1].percentage - 33.33).abs() < 0.01);

        assert_eq!(summary.hourly_distribution[10], 1);
        assert_eq!(summary.hourly_distribution[14], 1);
        assert_eq!(summary.hourly_distribution[9], 1);
        assert_eq!(summary.hourly_distribution.iter().sum::<usize>(), 3);

        assert_eq!(summary.leads_today, 1);
        assert_eq!(summary.leads_this_week, 3);
        assert_eq!(summary.new_leads, 3);

        let daily: Vec<(String, usize)> = summary
            .daily_distribution
            .iter()
            .map(|d| (d.date.to_string(), d.count))
            .collect();
        assert_eq!(
            daily,
            vec![("2024-01-01".to_string(), 2), ("2024-01-02".to_string(), 1)]
        );
    }

    #[test]
    fn test_quality_counts_sum_to_total() {
        let mut leads = sample_leads();
        leads.push(create_test_lead(QualityTier::Good, "", None));
        leads.push(create_test_lead(QualityTier::Medium, "C", None));

        let summary = aggregate(&leads, &at("2024-01-02T12:00:00Z"));
        let sum: usize = summary.quality_distribution.iter().map(|q| q.count).sum();
        assert_eq!(sum, summary.total);

        let pct: f64 = summary.source_distribution.iter().map(|s| s.percentage).sum();
        assert!((pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_undated_lead_counts_only_in_untimed_derivations() {
        let leads = vec![
            create_test_lead(QualityTier::High, "", None),
            create_test_lead(QualityTier::Low, "A", Some("2024-01-02T11:00:00Z")),
        ];

        let summary = aggregate(&leads, &at("2024-01-02T12:00:00Z"));

        assert_eq!(summary.total, 2);
        assert_eq!(summary.undated, 1);
        assert_eq!(summary.converted_count, 1);
        assert_eq!(summary.leads_today, 1);
        assert_eq!(summary.leads_this_week, 1);
        assert_eq!(summary.new_leads, 1);
        assert_eq!(summary.hourly_distribution.iter().sum::<usize>(), 1);
        assert_eq!(summary.source_distribution[0].source, UNSPECIFIED_LABEL);
        assert_eq!(summary.source_distribution[0].count, 1);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let leads = sample_leads();
        let reference = at("2024-01-02T12:00:00Z");

        assert_eq!(aggregate(&leads, &reference), aggregate(&leads, &reference));
    }

    #[test]
    fn test_new_leads_window_is_inclusive() {
        let leads = vec![
            create_test_lead(QualityTier::Low, "A", Some("2024-01-01T12:00:00Z")),
            create_test_lead(QualityTier::Low, "A", Some("2024-01-01T11:59:59Z")),
            create_test_lead(QualityTier::Low, "A", Some("2024-01-09T08:00:00Z")),
        ];

        let summary = aggregate(&leads, &at("2024-01-08T12:00:00Z"));

        // exactly seven days old, too old, and one ahead of the reference
        assert_eq!(summary.new_leads, 2);
        assert_eq!(summary.leads_this_week, 2);
    }

    #[test]
    fn test_week_windows_diverge_across_dst() {
        let reference = chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 3, 31, 12, 0, 0)
            .unwrap();
        let leads = vec![create_test_lead(
            QualityTier::Good,
            "A",
            Some("2024-03-24T10:30:00Z"),
        )];

        let summary = aggregate(&leads, &reference);

        assert_eq!(calendar_week_cutoff(&reference), at("2024-03-24T11:00:00Z"));
        assert_eq!(summary.new_leads, 1);
        assert_eq!(summary.leads_this_week, 0);
    }

    #[test]
    fn test_today_and_hours_follow_reference_zone() {
        let plus3 = FixedOffset::east_opt(3 * 3600).unwrap();
        let reference = plus3.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let leads = vec![create_test_lead(
            QualityTier::Low,
            "A",
            Some("2024-01-01T22:00:00Z"),
        )];

        let local = aggregate(&leads, &reference);
        assert_eq!(local.leads_today, 1);
        assert_eq!(local.hourly_distribution[1], 1);

        let utc = aggregate(&leads, &reference.with_timezone(&Utc));
        assert_eq!(utc.leads_today, 0);
        assert_eq!(utc.hourly_distribution[22], 1);
    }

    #[test]
    fn test_top_products_ranking() {
        let leads: Vec<LeadRecord> = [
            "Camry", "Rav4", "Camry", "Prado", "Rav4", "Corolla", "", "Supra", "Land Cruiser",
        ]
        .iter()
        .map(|p| with_product(p))
        .collect();

        let summary = aggregate(&leads, &at("2024-01-02T12:00:00Z"));
        let top: Vec<(&str, usize)> = summary
            .top_products
            .iter()
            .map(|p| (p.product.as_str(), p.count))
            .collect();

        assert_eq!(
            top,
            vec![
                ("Camry", 2),
                ("Rav4", 2),
                ("Prado", 1),
                ("Corolla", 1),
                (UNSPECIFIED_LABEL, 1),
            ]
        );
    }

    #[test]
    fn test_top_products_custom_limit() {
        let leads = vec![with_product("Camry"), with_product("Rav4")];
        let summary = aggregate_with_limit(&leads, &at("2024-01-02T12:00:00Z"), 1);
        assert_eq!(summary.top_products.len(), 1);
        assert_eq!(summary.top_products[0].product, "Camry");
    }

    #[test]
    fn test_percentage_zero_total() {
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }
}
