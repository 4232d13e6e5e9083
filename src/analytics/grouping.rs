use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

use super::stats::{mean, percentage, resolution_duration, round1, TimeUnit};
use crate::models::{Category, Issue, Status};

/// Bucket name for issues without a ward.
pub const UNKNOWN_WARD: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: Category,
    pub count: usize,
    pub resolved: usize,
    pub resolution_rate: f64,
    pub avg_resolution_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WardStats {
    pub ward: String,
    pub count: usize,
    pub resolved: usize,
    pub resolution_rate: f64,
    pub avg_resolution_hours: f64,
}

#[derive(Debug, Default)]
struct Bucket {
    count: usize,
    resolved: usize,
    hours: Vec<f64>,
}

impl Bucket {
    fn add(&mut self, issue: &Issue) {
        self.count += 1;
        if issue.status == Status::Resolved {
            self.resolved += 1;
        }
        if let Some(h) = resolution_duration(issue, TimeUnit::Hours) {
            self.hours.push(h);
        }
    }

    fn resolution_rate(&self) -> f64 {
        percentage(self.resolved, self.count)
    }

    fn avg_hours(&self) -> f64 {
        round1(mean(&self.hours))
    }
}

/// Groups issues by `key`, keeping buckets in first-seen order.
fn group_by<K, F>(issues: &[Issue], key: F) -> Vec<(K, Bucket)>
where
    K: Eq + Hash + Clone,
    F: Fn(&Issue) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<(K, Bucket)> = Vec::new();

    for issue in issues {
        let k = key(issue);
        let slot = match index.get(&k) {
            Some(&slot) => slot,
            None => {
                index.insert(k.clone(), buckets.len());
                buckets.push((k, Bucket::default()));
                buckets.len() - 1
            }
        };
        buckets[slot].1.add(issue);
    }

    buckets
}

/// Sorts by `count` descending and keeps the first `n`. The sort is stable, so ties keep
/// input order.
pub fn top_n<T, F>(mut items: Vec<T>, n: usize, count: F) -> Vec<T>
where
    F: Fn(&T) -> usize,
{
    items.sort_by(|a, b| count(b).cmp(&count(a)));
    items.truncate(n);
    items
}

pub fn ward_key(issue: &Issue) -> String {
    match issue.ward.as_deref().map(str::trim) {
        Some(w) if !w.is_empty() => w.to_string(),
        _ => UNKNOWN_WARD.to_string(),
    }
}

/// Occurrences per category in first-seen order. Unknown and blank categories were already
/// folded into `other` when the record was read.
pub fn category_histogram(issues: &[Issue]) -> Vec<CategoryCount> {
    group_by(issues, |i| i.category)
        .into_iter()
        .map(|(category, bucket)| CategoryCount {
            category,
            count: bucket.count,
        })
        .collect()
}

pub fn top_categories(issues: &[Issue], n: usize) -> Vec<CategoryCount> {
    top_n(category_histogram(issues), n, |c| c.count)
}

/// Per-category totals and resolution figures, largest first.
pub fn category_performance(issues: &[Issue]) -> Vec<CategoryStats> {
    let stats = group_by(issues, |i| i.category)
        .into_iter()
        .map(|(category, bucket)| CategoryStats {
            category,
            count: bucket.count,
            resolved: bucket.resolved,
            resolution_rate: bucket.resolution_rate(),
            avg_resolution_hours: bucket.avg_hours(),
        })
        .collect::<Vec<_>>();
    let len = stats.len();
    top_n(stats, len, |c| c.count)
}

pub fn ward_ranking(issues: &[Issue], n: usize) -> Vec<WardStats> {
    let stats = group_by(issues, ward_key)
        .into_iter()
        .map(|(ward, bucket)| WardStats {
            ward,
            count: bucket.count,
            resolved: bucket.resolved,
            resolution_rate: bucket.resolution_rate(),
            avg_resolution_hours: bucket.avg_hours(),
        })
        .collect();
    top_n(stats, n, |w| w.count)
}

/// Number of distinct wards, counting the `Unknown` bucket.
pub fn ward_count(issues: &[Issue]) -> usize {
    group_by(issues, ward_key).len()
}
