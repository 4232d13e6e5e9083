use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

use crate::models::{Issue, Status};

/// Trailing window ending at (and including) the reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendWindow {
    Days(u32),
    Months(u32),
}

impl TrendWindow {
    pub const WEEK: TrendWindow = TrendWindow::Days(7);
    pub const HALF_YEAR: TrendWindow = TrendWindow::Months(6);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendBucket {
    /// `YYYY-MM-DD` or `YYYY-MM`; matched as a prefix of the creation timestamp.
    pub key: String,
    pub label: String,
    pub reported: usize,
    pub unresolved: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

impl TrendBucket {
    fn empty(key: String, label: String) -> Self {
        TrendBucket {
            key,
            label,
            reported: 0,
            unresolved: 0,
            in_progress: 0,
            resolved: 0,
        }
    }
}

fn window_keys(window: TrendWindow, today: NaiveDate) -> Vec<(String, String)> {
    match window {
        TrendWindow::Days(n) => (0..n)
            .rev()
            .map(|back| {
                let day = today
                    .checked_sub_days(Days::new(u64::from(back)))
                    .unwrap_or(NaiveDate::MIN);
                (day.format("%Y-%m-%d").to_string(), day.format("%b %-d").to_string())
            })
            .collect(),
        TrendWindow::Months(n) => {
            let first = today.with_day(1).unwrap_or(today);
            (0..n)
                .rev()
                .map(|back| {
                    let month = first
                        .checked_sub_months(Months::new(back))
                        .unwrap_or(NaiveDate::MIN);
                    (month.format("%Y-%m").to_string(), month.format("%b %Y").to_string())
                })
                .collect()
        }
    }
}

/// One bucket per day or month of the window, oldest first. Empty buckets are kept so the
/// series always has the window's length.
///
/// Bucketing compares the UTC creation timestamp's text against the bucket key, so an issue
/// lands in the UTC calendar day it was created on.
pub fn trend_series(issues: &[Issue], window: TrendWindow, today: NaiveDate) -> Vec<TrendBucket> {
    let stamps: Vec<(String, Status)> = issues
        .iter()
        .map(|i| (i.created_at.to_rfc3339(), i.status))
        .collect();

    window_keys(window, today)
        .into_iter()
        .map(|(key, label)| {
            let mut bucket = TrendBucket::empty(key, label);
            for (stamp, status) in &stamps {
                if !stamp.starts_with(&bucket.key) {
                    continue;
                }
                bucket.reported += 1;
                match status {
                    Status::Unresolved => bucket.unresolved += 1,
                    Status::InProgress => bucket.in_progress += 1,
                    Status::Resolved => bucket.resolved += 1,
                }
            }
            bucket
        })
        .collect()
}
