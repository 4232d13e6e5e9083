use serde::Serialize;

use crate::models::{Issue, Status};

/// Count of issues per status. All three statuses are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    pub unresolved: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

impl StatusTally {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Unresolved => self.unresolved,
            Status::InProgress => self.in_progress,
            Status::Resolved => self.resolved,
        }
    }

    pub fn total(&self) -> usize {
        self.unresolved + self.in_progress + self.resolved
    }

    fn add(&mut self, status: Status) {
        match status {
            Status::Unresolved => self.unresolved += 1,
            Status::InProgress => self.in_progress += 1,
            Status::Resolved => self.resolved += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    Days,
}

impl TimeUnit {
    fn millis(&self) -> f64 {
        match self {
            TimeUnit::Hours => 1000.0 * 60.0 * 60.0,
            TimeUnit::Days => 1000.0 * 60.0 * 60.0 * 24.0,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

pub fn status_tally<'a, I>(issues: I) -> StatusTally
where
    I: IntoIterator<Item = &'a Issue>,
{
    let mut tally = StatusTally::default();
    for issue in issues {
        tally.add(issue.status);
    }
    tally
}

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / total * 100`, one decimal. Zero when `total` is zero.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(part as f64 / total as f64 * 100.0)
}

pub fn resolution_rate(issues: &[Issue]) -> f64 {
    let resolved = issues.iter().filter(|i| i.status == Status::Resolved).count();
    percentage(resolved, issues.len())
}

/// Elapsed creation-to-resolution time, for resolved issues that carry a resolution timestamp.
pub fn resolution_duration(issue: &Issue, unit: TimeUnit) -> Option<f64> {
    if issue.status != Status::Resolved {
        return None;
    }
    let resolved_at = issue.resolved_at?;
    let millis = resolved_at
        .signed_duration_since(issue.created_at)
        .num_milliseconds();
    Some(millis as f64 / unit.millis())
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean resolution time. Resolved issues without a resolution timestamp are skipped; zero when
/// nothing qualifies.
pub fn mean_resolution_time(issues: &[Issue], unit: TimeUnit) -> f64 {
    let durations: Vec<f64> = issues
        .iter()
        .filter_map(|i| resolution_duration(i, unit))
        .collect();
    mean(&durations)
}
