//! Sales metric aggregation.
//!
//! This module computes column sums for a single representative or the
//! whole team, and time-bucketed statistics for trend analysis.

use crate::analysis::stats::describe;
use crate::data::DatasetStore;
use crate::models::{AggregateSummary, Period, PeriodBucket, SalesRecord, TrendReport, TrendStats};
use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors raised while aggregating sales metrics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    /// No records exist for the requested employee.
    #[error("Sales representative not found")]
    NotFound(i64),

    /// The requested period is not one of the supported values.
    #[error("Invalid time period. Choose 'monthly' or 'quarterly'.")]
    InvalidPeriod(String),

    /// A `created` value could not be parsed. `row` is 1-based.
    #[error("Malformed timestamp in row {row}: '{value}'")]
    MalformedTimestamp { row: usize, value: String },
}

/// Sum the metrics of one sales representative.
pub fn aggregate_by_employee(
    store: &DatasetStore,
    employee_id: i64,
) -> Result<AggregateSummary, AggregateError> {
    let records = store.filter_by_employee(employee_id);
    if records.is_empty() {
        return Err(AggregateError::NotFound(employee_id));
    }

    debug!(
        "Aggregating {} records for employee {}",
        records.len(),
        employee_id
    );
    Ok(AggregateSummary::from_records(records))
}

/// Sum the metrics of the whole team. An empty dataset yields zero sums.
pub fn aggregate_all(records: &[SalesRecord]) -> AggregateSummary {
    AggregateSummary::from_records(records)
}

/// Group records into calendar buckets and describe each bucket.
///
/// Buckets run contiguously from the earliest to the latest populated
/// bucket; empty buckets in between carry zero totals and undefined stats.
pub fn aggregate_by_period(
    records: &[SalesRecord],
    period: Period,
) -> Result<TrendReport, AggregateError> {
    let mut grouped: BTreeMap<NaiveDate, (NaiveDate, Vec<&SalesRecord>)> = BTreeMap::new();

    for (index, record) in records.iter().enumerate() {
        let malformed = || AggregateError::MalformedTimestamp {
            row: index + 1,
            value: record.created.clone(),
        };

        let created = parse_timestamp(&record.created).ok_or_else(malformed)?;
        let (start, end) = bucket_bounds(created.date(), period).ok_or_else(malformed)?;

        grouped
            .entry(start)
            .or_insert_with(|| (end, Vec::new()))
            .1
            .push(record);
    }

    let (Some(first), Some(last)) = (
        grouped.keys().next().copied(),
        grouped.keys().next_back().copied(),
    ) else {
        return Ok(TrendReport {
            period,
            buckets: Vec::new(),
            across_periods: TrendStats::default(),
        });
    };

    let mut buckets = Vec::new();
    let mut start = first;
    while start <= last {
        let (end, members) = match grouped.get(&start) {
            Some((end, members)) => (*end, members.as_slice()),
            None => match start.checked_add_months(Months::new(period_months(period))) {
                Some(end) => (end, &[][..]),
                None => break,
            },
        };

        buckets.push(build_bucket(start, end, period, members));
        start = end;
    }

    debug!(
        "Built {} {} buckets from {} records",
        buckets.len(),
        period,
        records.len()
    );

    let across_periods = describe_totals(&buckets);
    Ok(TrendReport {
        period,
        buckets,
        across_periods,
    })
}

/// Parse a `created` value in any of the supported layouts.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    const DATETIME_FORMATS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn period_months(period: Period) -> u32 {
    match period {
        Period::Monthly => 1,
        Period::Quarterly => 3,
    }
}

/// First day of the bucket containing `date`, and the first day after it.
fn bucket_bounds(date: NaiveDate, period: Period) -> Option<(NaiveDate, NaiveDate)> {
    let first_month = match period {
        Period::Monthly => date.month(),
        Period::Quarterly => date.month0() / 3 * 3 + 1,
    };

    let start = NaiveDate::from_ymd_opt(date.year(), first_month, 1)?;
    let end = start.checked_add_months(Months::new(period_months(period)))?;
    Some((start, end))
}

fn bucket_label(start: NaiveDate, period: Period) -> String {
    match period {
        Period::Monthly => start.format("%Y-%m").to_string(),
        Period::Quarterly => format!("{}-Q{}", start.year(), start.month0() / 3 + 1),
    }
}

fn build_bucket(
    start: NaiveDate,
    end: NaiveDate,
    period: Period,
    members: &[&SalesRecord],
) -> PeriodBucket {
    let column = |f: fn(&SalesRecord) -> Option<f64>| {
        members.iter().filter_map(|r| f(r)).collect::<Vec<_>>()
    };

    PeriodBucket {
        label: bucket_label(start, period),
        start,
        end,
        totals: AggregateSummary::from_records(members.iter().copied()),
        stats: TrendStats {
            lead_taken: describe(&column(|r| r.lead_taken.map(|v| v as f64))),
            tours_booked: describe(&column(|r| r.tours_booked.map(|v| v as f64))),
            applications: describe(&column(|r| r.applications.map(|v| v as f64))),
            revenue_confirmed: describe(&column(|r| r.revenue_confirmed)),
        },
    }
}

/// Statistics of bucket totals across the whole report.
fn describe_totals(buckets: &[PeriodBucket]) -> TrendStats {
    let column = |f: fn(&AggregateSummary) -> f64| {
        buckets.iter().map(|b| f(&b.totals)).collect::<Vec<_>>()
    };

    TrendStats {
        lead_taken: describe(&column(|t| t.total_leads as f64)),
        tours_booked: describe(&column(|t| t.total_tours as f64)),
        applications: describe(&column(|t| t.total_applications as f64)),
        revenue_confirmed: describe(&column(|t| t.total_revenue_confirmed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(employee_id: i64, created: &str, lead_taken: i64, revenue: f64) -> SalesRecord {
        SalesRecord {
            employee_id,
            created: created.to_string(),
            lead_taken: Some(lead_taken),
            tours_booked: Some(1),
            applications: Some(1),
            revenue_confirmed: Some(revenue),
            revenue_pending: Some(0.0),
        }
    }

    #[test]
    fn test_aggregate_by_employee_sums_all_rows() {
        let store = DatasetStore::from_records(vec![
            record(1, "2024-01-01", 5, 100.0),
            record(2, "2024-01-02", 11, 999.0),
            record(1, "2024-02-01", 3, 50.0),
        ]);

        let summary = aggregate_by_employee(&store, 1).unwrap();
        assert_eq!(summary.total_leads, 8);
        assert_eq!(summary.total_tours, 2);
        assert_eq!(summary.total_revenue_confirmed, 150.0);
        assert_eq!(summary.record_count, 2);
    }

    #[test]
    fn test_aggregate_by_employee_not_found() {
        let store = DatasetStore::from_records(vec![record(1, "2024-01-01", 5, 100.0)]);
        assert_eq!(
            aggregate_by_employee(&store, 42),
            Err(AggregateError::NotFound(42))
        );
    }

    #[test]
    fn test_aggregate_all() {
        let records = vec![
            record(1, "2024-01-01", 5, 100.0),
            record(2, "2024-01-02", 7, 25.5),
        ];
        let summary = aggregate_all(&records);
        assert_eq!(summary.total_leads, 12);
        assert_eq!(summary.total_revenue_confirmed, 125.5);

        // Same input, same sums.
        assert_eq!(aggregate_all(&records), summary);
    }

    #[test]
    fn test_aggregate_all_empty() {
        assert_eq!(aggregate_all(&[]), AggregateSummary::default());
    }

    #[test]
    fn test_monthly_buckets_are_separate() {
        let records = vec![
            record(1, "2024-01-05 09:00:00", 5, 100.0),
            record(2, "2024-01-28 17:45:00", 3, 300.0),
            record(1, "2024-02-02 08:00:00", 10, 50.0),
        ];

        let report = aggregate_by_period(&records, Period::Monthly).unwrap();
        assert_eq!(report.buckets.len(), 2);

        let jan = &report.buckets[0];
        assert_eq!(jan.label, "2024-01");
        assert_eq!(jan.stats.lead_taken.count, 2);
        assert_eq!(jan.stats.lead_taken.mean, Some(4.0));
        assert_eq!(jan.stats.lead_taken.max, Some(5.0));
        assert_eq!(jan.totals.total_leads, 8);

        let feb = &report.buckets[1];
        assert_eq!(feb.label, "2024-02");
        assert_eq!(feb.stats.lead_taken.count, 1);
        assert_eq!(feb.stats.lead_taken.min, Some(10.0));
        assert_eq!(feb.totals.total_revenue_confirmed, 50.0);

        assert_eq!(jan.end, feb.start);
    }

    #[test]
    fn test_empty_intermediate_months_are_kept() {
        let records = vec![
            record(1, "2024-01-10", 1, 1.0),
            record(1, "2024-04-10", 2, 2.0),
        ];

        let report = aggregate_by_period(&records, Period::Monthly).unwrap();
        let labels: Vec<_> = report.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03", "2024-04"]);

        let feb = &report.buckets[1];
        assert_eq!(feb.stats.lead_taken.count, 0);
        assert!(feb.stats.lead_taken.mean.is_none());
        assert_eq!(feb.totals, AggregateSummary::default());

        // Totals across buckets include the empty months as zeros.
        assert_eq!(report.across_periods.lead_taken.count, 4);
        assert_eq!(report.across_periods.lead_taken.mean, Some(0.75));
    }

    #[test]
    fn test_quarterly_buckets_cross_year() {
        let records = vec![
            record(1, "2023-11-30", 4, 10.0),
            record(1, "2023-12-31 23:59:59", 6, 20.0),
            record(1, "2024-01-01", 1, 5.0),
            record(1, "2024-03-31", 1, 5.0),
        ];

        let report = aggregate_by_period(&records, Period::Quarterly).unwrap();
        assert_eq!(report.buckets.len(), 2);
        assert_eq!(report.buckets[0].label, "2023-Q4");
        assert_eq!(report.buckets[0].totals.total_leads, 10);
        assert_eq!(report.buckets[1].label, "2024-Q1");
        assert_eq!(report.buckets[1].totals.total_leads, 2);
        assert_eq!(
            report.buckets[1].end,
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
        );
    }

    #[test]
    fn test_period_of_empty_dataset() {
        let report = aggregate_by_period(&[], Period::Monthly).unwrap();
        assert!(report.buckets.is_empty());
        assert_eq!(report.across_periods.lead_taken.count, 0);
    }

    #[test]
    fn test_malformed_timestamp() {
        let records = vec![
            record(1, "2024-01-10", 1, 1.0),
            record(1, "last tuesday", 2, 2.0),
        ];

        let err = aggregate_by_period(&records, Period::Quarterly).unwrap_err();
        assert_eq!(
            err,
            AggregateError::MalformedTimestamp {
                row: 2,
                value: "last tuesday".to_string()
            }
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();

        for value in [
            "2024-03-07",
            "2024-03-07 10:20:30",
            "2024-03-07 10:20:30.123",
            "2024-03-07T10:20:30",
            "2024-03-07 10:20",
            "03/07/2024",
            "03/07/2024 10:20",
            " 2024-03-07T10:20:30+00:00 ",
        ] {
            let parsed = parse_timestamp(value);
            assert_eq!(parsed.map(|dt| dt.date()), Some(expected), "{value}");
        }

        assert!(parse_timestamp("2024-13-01").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_rfc3339_offset_keeps_local_wall_clock() {
        let parsed = parse_timestamp("2024-01-31T23:30:00-02:00").unwrap();
        assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());

        let records = vec![record(1, "2024-01-31T23:30:00-02:00", 4, 10.0)];
        let report = aggregate_by_period(&records, Period::Monthly).unwrap();
        assert_eq!(report.buckets.len(), 1);
        assert_eq!(report.buckets[0].label, "2024-01");
    }

    #[test]
    fn test_bucket_stats_skip_missing_values() {
        let mut gap = record(2, "2024-01-20", 0, 0.0);
        gap.lead_taken = None;
        gap.revenue_confirmed = None;
        let records = vec![record(1, "2024-01-05", 6, 100.0), gap];

        let report = aggregate_by_period(&records, Period::Monthly).unwrap();
        let jan = &report.buckets[0];
        assert_eq!(jan.totals.record_count, 2);
        assert_eq!(jan.totals.total_leads, 6);
        assert_eq!(jan.stats.lead_taken.count, 1);
        assert_eq!(jan.stats.lead_taken.mean, Some(6.0));
        assert_eq!(jan.stats.revenue_confirmed.max, Some(100.0));
        assert_eq!(jan.stats.tours_booked.count, 2);
    }
}
