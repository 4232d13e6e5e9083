//! Reporting views derived from issue records.
//!
//! Everything here is a pure function of its inputs: no I/O, no clock reads (callers pass
//! `today`), no state kept between calls. Zero denominators yield `0`, never NaN.

mod grouping;
mod report;
mod stats;
mod trend;

pub use grouping::{
    category_histogram, category_performance, top_categories, top_n, ward_count, ward_key,
    ward_ranking, CategoryCount, CategoryStats, WardStats, UNKNOWN_WARD,
};
pub use report::{
    metric_window, window_start, AnalyticsReport, DashboardSummary, MetricWindow, ReportOptions,
};
pub use stats::{
    mean_resolution_time, percentage, resolution_duration, resolution_rate, round1, status_tally,
    StatusTally, TimeUnit,
};
pub use trend::{trend_series, TrendBucket, TrendWindow};
