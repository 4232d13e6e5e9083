use chrono::{Days, NaiveDate};
use serde::Serialize;

use super::grouping::{
    category_performance, top_categories, ward_count, ward_ranking, CategoryCount, CategoryStats,
    WardStats,
};
use super::stats::{mean_resolution_time, percentage, round1, status_tally, StatusTally, TimeUnit};
use super::trend::{trend_series, TrendBucket, TrendWindow};
use crate::models::{Issue, MetricSnapshot};

/// Cutoffs shared by the composite views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub category_top_n: usize,
    pub ward_top_n: usize,
    pub window_days: u32,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            category_top_n: 8,
            ward_top_n: 10,
            window_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricWindow {
    pub days: u32,
    pub snapshots: Vec<MetricSnapshot>,
    pub new_issues: i64,
    pub resolved_issues: i64,
    pub latest_total: Option<i64>,
}

/// First day of the `days`-day window ending `today`.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// Snapshots dated within the `days` days ending `today`, oldest first.
pub fn metric_window(snapshots: &[MetricSnapshot], today: NaiveDate, days: u32) -> MetricWindow {
    let start = window_start(today, days);

    let mut kept: Vec<MetricSnapshot> = snapshots
        .iter()
        .filter(|s| days > 0 && s.date >= start && s.date <= today)
        .cloned()
        .collect();
    kept.sort_by_key(|s| s.date);

    MetricWindow {
        days,
        new_issues: kept.iter().map(|s| s.new_issues).sum(),
        resolved_issues: kept.iter().map(|s| s.resolved_issues).sum(),
        latest_total: kept.last().map(|s| s.total_issues),
        snapshots: kept,
    }
}

/// Staff overview: headline numbers, category breakdown and the last week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total: usize,
    pub status: StatusTally,
    pub resolution_rate: f64,
    pub avg_resolution_hours: f64,
    pub top_categories: Vec<CategoryCount>,
    pub daily_trend: Vec<TrendBucket>,
    pub metrics: MetricWindow,
}

impl DashboardSummary {
    pub fn build(
        issues: &[Issue],
        snapshots: &[MetricSnapshot],
        today: NaiveDate,
        opts: &ReportOptions,
    ) -> Self {
        let status = status_tally(issues);
        DashboardSummary {
            total: issues.len(),
            resolution_rate: percentage(status.resolved, issues.len()),
            status,
            avg_resolution_hours: round1(mean_resolution_time(issues, TimeUnit::Hours)),
            top_categories: top_categories(issues, opts.category_top_n),
            daily_trend: trend_series(issues, TrendWindow::WEEK, today),
            metrics: metric_window(snapshots, today, opts.window_days),
        }
    }
}

/// Admin analytics: ward and category performance plus the half-year trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub total: usize,
    pub resolved: usize,
    pub resolution_rate: f64,
    pub avg_resolution_hours: f64,
    pub avg_resolution_days: f64,
    pub active_wards: usize,
    pub wards: Vec<WardStats>,
    pub categories: Vec<CategoryStats>,
    pub monthly_trend: Vec<TrendBucket>,
    pub metrics: MetricWindow,
}

impl AnalyticsReport {
    pub fn build(
        issues: &[Issue],
        snapshots: &[MetricSnapshot],
        today: NaiveDate,
        opts: &ReportOptions,
    ) -> Self {
        let status = status_tally(issues);
        AnalyticsReport {
            total: issues.len(),
            resolved: status.resolved,
            resolution_rate: percentage(status.resolved, issues.len()),
            avg_resolution_hours: round1(mean_resolution_time(issues, TimeUnit::Hours)),
            avg_resolution_days: round1(mean_resolution_time(issues, TimeUnit::Days)),
            active_wards: ward_count(issues),
            wards: ward_ranking(issues, opts.ward_top_n),
            categories: category_performance(issues),
            monthly_trend: trend_series(issues, TrendWindow::HALF_YEAR, today),
            metrics: metric_window(snapshots, today, opts.window_days),
        }
    }
}
