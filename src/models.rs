//! Data models for the sales insights service.
//!
//! This module contains the core data structures used throughout
//! the application for representing sales rows, aggregates, and trends.

use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row of the sales dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    /// Identifier of the sales representative who owns the row.
    pub employee_id: i64,
    /// Creation timestamp, kept as written in the file.
    pub created: String,
    /// Number of leads taken.
    #[serde(deserialize_with = "deserialize_count")]
    pub lead_taken: Option<i64>,
    /// Number of tours booked.
    #[serde(deserialize_with = "deserialize_count")]
    pub tours_booked: Option<i64>,
    /// Number of applications received.
    #[serde(deserialize_with = "deserialize_count")]
    pub applications: Option<i64>,
    /// Revenue already confirmed.
    #[serde(deserialize_with = "deserialize_amount")]
    pub revenue_confirmed: Option<f64>,
    /// Revenue still pending.
    #[serde(deserialize_with = "deserialize_amount")]
    pub revenue_pending: Option<f64>,
}

/// Blank cells and `NaN` are missing values. Integral floats such as `5.0`
/// are accepted, since exporters write counts that way once a column has gaps.
fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(Some(value));
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_nan() => Ok(None),
        Ok(value) if value.fract() == 0.0 && value.abs() <= i64::MAX as f64 => {
            Ok(Some(value as i64))
        }
        _ => Err(de::Error::custom(format!("invalid count '{raw}'"))),
    }
}

fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_nan() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(de::Error::custom(format!("invalid amount '{raw}'"))),
    }
}

/// Column sums over a subset of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    /// Number of records that contributed to the sums.
    pub record_count: usize,
    pub total_leads: i64,
    pub total_tours: i64,
    pub total_applications: i64,
    pub total_revenue_confirmed: f64,
    pub total_revenue_pending: f64,
}

impl AggregateSummary {
    /// Sum every numeric column over the given records. Missing values are
    /// skipped and integer sums saturate instead of overflowing.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a SalesRecord>,
    {
        let mut summary = Self::default();

        for record in records {
            summary.record_count += 1;
            summary.total_leads = summary
                .total_leads
                .saturating_add(record.lead_taken.unwrap_or(0));
            summary.total_tours = summary
                .total_tours
                .saturating_add(record.tours_booked.unwrap_or(0));
            summary.total_applications = summary
                .total_applications
                .saturating_add(record.applications.unwrap_or(0));
            summary.total_revenue_confirmed += record.revenue_confirmed.unwrap_or(0.0);
            summary.total_revenue_pending += record.revenue_pending.unwrap_or(0.0);
        }

        summary
    }
}

/// Time bucket granularity for trend analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Calendar months.
    Monthly,
    /// Calendar quarters (Jan-Mar, Apr-Jun, Jul-Sep, Oct-Dec).
    Quarterly,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Monthly => write!(f, "monthly"),
            Period::Quarterly => write!(f, "quarterly"),
        }
    }
}

impl FromStr for Period {
    type Err = crate::analysis::AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Period::Monthly),
            "quarterly" => Ok(Period::Quarterly),
            other => Err(crate::analysis::AggregateError::InvalidPeriod(
                other.to_string(),
            )),
        }
    }
}

/// Descriptive statistics for one numeric column.
///
/// Values that are undefined for the input (everything on an empty
/// column, `std` with fewer than two values) are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub p25: Option<f64>,
    #[serde(rename = "50%")]
    pub p50: Option<f64>,
    #[serde(rename = "75%")]
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

impl fmt::Display for ColumnStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={}, mean={}, std={}, min={}, 25%={}, 50%={}, 75%={}, max={}",
            self.count,
            fmt_stat(self.mean),
            fmt_stat(self.std),
            fmt_stat(self.min),
            fmt_stat(self.p25),
            fmt_stat(self.p50),
            fmt_stat(self.p75),
            fmt_stat(self.max),
        )
    }
}

/// Render an optional statistic, using `NaN` for undefined values.
fn fmt_stat(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v),
        Some(v) => format!("{:.2}", v),
        None => "NaN".to_string(),
    }
}

/// Statistics for the columns tracked by trend analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub lead_taken: ColumnStats,
    pub tours_booked: ColumnStats,
    pub applications: ColumnStats,
    pub revenue_confirmed: ColumnStats,
}

impl fmt::Display for TrendStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lead_taken({}), tours_booked({}), applications({}), revenue_confirmed({})",
            self.lead_taken, self.tours_booked, self.applications, self.revenue_confirmed
        )
    }
}

/// A single time bucket of a trend report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBucket {
    /// Human-readable label (`2024-01` or `2024-Q1`).
    pub label: String,
    /// First day of the bucket.
    pub start: NaiveDate,
    /// First day after the bucket.
    pub end: NaiveDate,
    /// Column sums over the bucket.
    pub totals: AggregateSummary,
    /// Per-column statistics over the bucket's records.
    pub stats: TrendStats,
}

/// Time-bucketed view of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub period: Period,
    /// Contiguous, non-overlapping buckets in chronological order.
    pub buckets: Vec<PeriodBucket>,
    /// Statistics of the bucket totals, one value per bucket.
    pub across_periods: TrendStats,
}

impl TrendReport {
    /// Render the report as the metrics summary embedded in trend prompts.
    pub fn summary_text(&self) -> String {
        let mut parts: Vec<String> = self
            .buckets
            .iter()
            .map(|bucket| format!("{}: {}", bucket.label, bucket.stats))
            .collect();

        if parts.is_empty() {
            parts.push("no records".to_string());
        }

        parts.push(format!("across periods: {}", self.across_periods));
        parts.join("; ")
    }
}
