//! Prompt templates for the insight endpoints.

use crate::models::{AggregateSummary, Period, TrendReport};

/// Prompt for a single sales representative.
pub fn rep_prompt(rep_id: i64, summary: &AggregateSummary) -> String {
    format!(
        "Analyze the performance of sales representative with ID {}. \
         They took {} leads, booked {} tours, and confirmed {} revenue. \
         Provide detailed performance feedback and suggestions.",
        rep_id, summary.total_leads, summary.total_tours, summary.total_revenue_confirmed
    )
}

/// Prompt for the whole team.
pub fn team_prompt(summary: &AggregateSummary) -> String {
    format!(
        "Analyze the overall team performance. \
         The team took {} leads, booked {} tours, and confirmed {} revenue. \
         Provide a summary and feedback on the team's performance.",
        summary.total_leads, summary.total_tours, summary.total_revenue_confirmed
    )
}

/// Prompt for time-bucketed trends.
pub fn trend_prompt(period: Period, report: &TrendReport) -> String {
    format!(
        "Analyze sales performance trends based on {} data. \
         The data shows these metrics: {}. \
         Forecast future performance and provide insights.",
        period,
        report.summary_text()
    )
}
