use anyhow::Result;
use chrono::NaiveDate;
use std::fmt::Write;

use crate::analytics::{window_start, DashboardSummary, ReportOptions, TrendBucket};
use crate::auth::{require_staff, Route, Session};
use crate::db::Database;
use crate::models::{IssueFilter, Status};

pub fn build(
    db: &Database,
    session: Option<&Session>,
    today: NaiveDate,
    opts: &ReportOptions,
) -> Result<DashboardSummary> {
    require_staff(session, Route::Login)?;
    let issues = db.list_issues(&IssueFilter::default())?;
    let snapshots = db.metrics_between(window_start(today, opts.window_days), today)?;
    Ok(DashboardSummary::build(&issues, &snapshots, today, opts))
}

pub fn run(
    db: &Database,
    session: Option<&Session>,
    opts: &ReportOptions,
    json: bool,
) -> Result<()> {
    let today = chrono::Utc::now().date_naive();
    let summary = build(db, session, today, opts)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render(&summary));
    }
    Ok(())
}

pub(crate) fn trend_table(out: &mut String, buckets: &[TrendBucket]) {
    for b in buckets {
        let _ = writeln!(
            out,
            "  {:<10} {:>4} reported  {:>4} open  {:>4} working  {:>4} done",
            b.label, b.reported, b.unresolved, b.in_progress, b.resolved
        );
    }
}

pub fn render(summary: &DashboardSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Dashboard");
    let _ = writeln!(out, "=========");
    let _ = writeln!(out, "Total issues:     {}", summary.total);
    for status in Status::ALL {
        let _ = writeln!(
            out,
            "{:<17} {}",
            format!("{}:", status.label()),
            summary.status.get(status)
        );
    }
    let _ = writeln!(out, "Resolution rate:  {:.1}%", summary.resolution_rate);
    let _ = writeln!(out, "Avg resolution:   {:.1}h", summary.avg_resolution_hours);

    if !summary.top_categories.is_empty() {
        let _ = writeln!(out, "\nTop categories:");
        for c in &summary.top_categories {
            let _ = writeln!(out, "  {:<22} {}", c.category.label(), c.count);
        }
    }

    let _ = writeln!(out, "\nLast 7 days:");
    trend_table(&mut out, &summary.daily_trend);

    let metrics = &summary.metrics;
    if !metrics.snapshots.is_empty() {
        let _ = writeln!(
            out,
            "\nDaily metrics (last {} days): {} new, {} resolved",
            metrics.days, metrics.new_issues, metrics.resolved_issues
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_issue, setup_test_db};
    use crate::models::Role;

    fn today() -> NaiveDate {
        chrono::Utc::now().date_naive()
    }

    #[test]
    fn test_dashboard_requires_staff() {
        let (db, _dir) = setup_test_db();
        db.create_profile("ana@example.com", None, None).unwrap();
        let citizen = Session::resolve(&db, Some("ana@example.com")).unwrap();
        let opts = ReportOptions::default();

        let err = build(&db, None, today(), &opts).unwrap_err();
        assert_eq!(
            err.downcast_ref::<crate::auth::Redirect>().map(|r| r.target()),
            Some(Route::Login)
        );
        let err = build(&db, citizen.as_ref(), today(), &opts).unwrap_err();
        assert_eq!(
            err.downcast_ref::<crate::auth::Redirect>().map(|r| r.target()),
            Some(Route::Home)
        );
    }

    #[test]
    fn test_dashboard_counts_store() {
        let (db, _dir) = setup_test_db();
        let user = db.create_profile("mod@example.com", None, None).unwrap();
        db.set_role("mod@example.com", Role::Admin).unwrap();
        let a = db.create_issue(user, &new_issue("Pothole")).unwrap();
        db.create_issue(user, &new_issue("Streetlight")).unwrap();
        db.change_status(a, user, Status::Resolved, None, None).unwrap();
        let staff = Session::resolve(&db, Some("mod@example.com")).unwrap();

        let summary = build(&db, staff.as_ref(), today(), &ReportOptions::default()).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.status.resolved, 1);
        assert_eq!(summary.resolution_rate, 50.0);
        assert_eq!(summary.daily_trend.last().map(|b| b.reported), Some(2));

        let text = render(&summary);
        assert!(text.contains("Resolution rate:  50.0%"));
        assert!(text.contains("road maintenance"));
    }
}
