#![no_main]

//! Fuzz target for the reporting views.
//!
//! Arbitrary issue sets, including resolution timestamps before creation and blank wards,
//! must never panic and must never produce NaN.

use arbitrary::Arbitrary;
use chrono::{DateTime, Duration, Utc};
use libfuzzer_sys::fuzz_target;

use citypulse::analytics::{AnalyticsReport, DashboardSummary, ReportOptions};
use citypulse::models::{Category, Issue, MetricSnapshot, Status};

#[derive(Arbitrary, Debug)]
struct FuzzIssue {
    status: u8,
    category: u8,
    ward: Option<String>,
    created_offset_hours: i16,
    resolved_after_hours: Option<i16>,
}

#[derive(Arbitrary, Debug)]
struct FuzzSnapshot {
    offset_days: i8,
    total: i32,
    new: i32,
    resolved: i32,
}

#[derive(Arbitrary, Debug)]
struct AggregationInput {
    issues: Vec<FuzzIssue>,
    snapshots: Vec<FuzzSnapshot>,
    category_top_n: u8,
    ward_top_n: u8,
    window_days: u8,
}

fn base() -> DateTime<Utc> {
    DateTime::from_timestamp(1_711_843_200, 0).unwrap_or_default()
}

fn to_issue(id: i64, f: &FuzzIssue) -> Issue {
    let created_at = base() + Duration::hours(i64::from(f.created_offset_hours));
    let status = Status::ALL[f.status as usize % Status::ALL.len()];
    Issue {
        id,
        user_id: 1,
        title: String::new(),
        description: String::new(),
        category: Category::ALL[f.category as usize % Category::ALL.len()],
        status,
        latitude: 0.0,
        longitude: 0.0,
        address: None,
        ward: f.ward.clone(),
        photo_url: None,
        before_photo_url: None,
        after_photo_url: None,
        upvotes: 0,
        created_at,
        updated_at: created_at,
        resolved_at: f
            .resolved_after_hours
            .map(|h| created_at + Duration::hours(i64::from(h))),
    }
}

fuzz_target!(|input: AggregationInput| {
    let today = base().date_naive();
    let issues: Vec<Issue> = input
        .issues
        .iter()
        .take(500)
        .enumerate()
        .map(|(i, f)| to_issue(i as i64, f))
        .collect();
    let snapshots: Vec<MetricSnapshot> = input
        .snapshots
        .iter()
        .take(200)
        .filter_map(|s| {
            let date = today.checked_add_signed(Duration::days(i64::from(s.offset_days)))?;
            Some(MetricSnapshot {
                date,
                total_issues: i64::from(s.total),
                new_issues: i64::from(s.new),
                resolved_issues: i64::from(s.resolved),
                avg_resolution_hours: None,
            })
        })
        .collect();
    let opts = ReportOptions {
        category_top_n: input.category_top_n as usize,
        ward_top_n: input.ward_top_n as usize,
        window_days: u32::from(input.window_days),
    };

    let summary = DashboardSummary::build(&issues, &snapshots, today, &opts);
    assert!(!summary.resolution_rate.is_nan());
    assert!(!summary.avg_resolution_hours.is_nan());
    assert!(summary.top_categories.len() <= opts.category_top_n);
    assert_eq!(summary.daily_trend.len(), 7);
    assert_eq!(summary.status.total(), issues.len());

    let report = AnalyticsReport::build(&issues, &snapshots, today, &opts);
    assert!(report.wards.len() <= opts.ward_top_n);
    assert_eq!(report.monthly_trend.len(), 6);
    for w in &report.wards {
        assert!(!w.resolution_rate.is_nan());
        assert!(!w.avg_resolution_hours.is_nan());
    }
});
