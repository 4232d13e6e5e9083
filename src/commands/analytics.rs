use anyhow::Result;
use chrono::NaiveDate;
use std::fmt::Write;

use super::dashboard::trend_table;
use crate::analytics::{window_start, AnalyticsReport, ReportOptions, TimeUnit};
use crate::auth::{require_staff, Route, Session};
use crate::db::Database;
use crate::models::IssueFilter;

pub fn build(
    db: &Database,
    session: Option<&Session>,
    today: NaiveDate,
    opts: &ReportOptions,
) -> Result<AnalyticsReport> {
    require_staff(session, Route::AdminLogin)?;
    let issues = db.list_issues(&IssueFilter::default())?;
    let snapshots = db.metrics_between(window_start(today, opts.window_days), today)?;
    Ok(AnalyticsReport::build(&issues, &snapshots, today, opts))
}

pub fn run(
    db: &Database,
    session: Option<&Session>,
    opts: &ReportOptions,
    json: bool,
) -> Result<()> {
    let today = chrono::Utc::now().date_naive();
    let report = build(db, session, today, opts)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}

pub fn render(report: &AnalyticsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Analytics");
    let _ = writeln!(out, "=========");
    let _ = writeln!(
        out,
        "{} issues, {} resolved ({:.1}%), avg {:.1}{} to resolve, {} active wards",
        report.total,
        report.resolved,
        report.resolution_rate,
        report.avg_resolution_days,
        TimeUnit::Days.suffix(),
        report.active_wards
    );

    if !report.wards.is_empty() {
        let _ = writeln!(out, "\nWards by volume:");
        for w in &report.wards {
            let _ = writeln!(
                out,
                "  {:<20} {:>4} issues  {:>5.1}% resolved  {:>6.1}{} avg",
                w.ward,
                w.count,
                w.resolution_rate,
                w.avg_resolution_hours,
                TimeUnit::Hours.suffix()
            );
        }
    }

    if !report.categories.is_empty() {
        let _ = writeln!(out, "\nCategories:");
        for c in &report.categories {
            let _ = writeln!(
                out,
                "  {:<22} {:>4} issues  {:>5.1}% resolved  {:>6.1}{} avg",
                c.category.label(),
                c.count,
                c.resolution_rate,
                c.avg_resolution_hours,
                TimeUnit::Hours.suffix()
            );
        }
    }

    let _ = writeln!(out, "\nLast 6 months:");
    trend_table(&mut out, &report.monthly_trend);

    let metrics = &report.metrics;
    if let Some(total) = metrics.latest_total {
        let _ = writeln!(
            out,
            "\nDaily metrics (last {} days): {} new, {} resolved, {} total at last snapshot",
            metrics.days, metrics.new_issues, metrics.resolved_issues, total
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Redirect;
    use crate::db::test_support::{new_issue, setup_test_db};
    use crate::models::{MetricSnapshot, Role, Status};

    fn today() -> NaiveDate {
        chrono::Utc::now().date_naive()
    }

    #[test]
    fn test_analytics_redirects() {
        let (db, _dir) = setup_test_db();
        db.create_profile("ana@example.com", None, None).unwrap();
        let citizen = Session::resolve(&db, Some("ana@example.com")).unwrap();
        let opts = ReportOptions::default();

        let err = build(&db, None, today(), &opts).unwrap_err();
        assert_eq!(err.downcast_ref::<Redirect>(), Some(&Redirect::SignIn(Route::AdminLogin)));
        let err = build(&db, citizen.as_ref(), today(), &opts).unwrap_err();
        assert_eq!(err.downcast_ref::<Redirect>(), Some(&Redirect::NotStaff(Route::Home)));
    }

    #[test]
    fn test_analytics_report() {
        let (db, _dir) = setup_test_db();
        let user = db.create_profile("admin@example.com", None, None).unwrap();
        db.set_role("admin@example.com", Role::Admin).unwrap();
        let mut elsewhere = new_issue("Streetlight");
        elsewhere.ward = None;
        let a = db.create_issue(user, &new_issue("Pothole")).unwrap();
        db.create_issue(user, &elsewhere).unwrap();
        db.change_status(a, user, Status::Resolved, None, None).unwrap();
        db.upsert_metric_snapshot(&MetricSnapshot {
            date: today(),
            total_issues: 2,
            new_issues: 2,
            resolved_issues: 1,
            avg_resolution_hours: None,
        })
        .unwrap();
        let staff = Session::resolve(&db, Some("admin@example.com")).unwrap();

        let report = build(&db, staff.as_ref(), today(), &ReportOptions::default()).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.active_wards, 2);
        assert_eq!(report.monthly_trend.len(), 6);
        assert_eq!(report.metrics.latest_total, Some(2));

        let text = render(&report);
        assert!(text.contains("Unknown"));
        assert!(text.contains("2 total at last snapshot"));
        assert!(text.contains("avg 0.0d to resolve"));
    }

    #[test]
    fn test_analytics_metrics_cover_whole_window() {
        let (db, _dir) = setup_test_db();
        db.create_profile("admin@example.com", None, None).unwrap();
        db.set_role("admin@example.com", Role::Admin).unwrap();
        let end = today();
        for back in 0..60u64 {
            db.upsert_metric_snapshot(&MetricSnapshot {
                date: end - chrono::Days::new(back),
                total_issues: 100,
                new_issues: 1,
                resolved_issues: 0,
                avg_resolution_hours: None,
            })
            .unwrap();
        }
        for ahead in 1..=5u64 {
            db.upsert_metric_snapshot(&MetricSnapshot {
                date: end + chrono::Days::new(ahead),
                total_issues: 999,
                new_issues: 50,
                resolved_issues: 0,
                avg_resolution_hours: None,
            })
            .unwrap();
        }
        let staff = Session::resolve(&db, Some("admin@example.com")).unwrap();
        let opts = crate::config::Config::default().analytics_options();

        let report = build(&db, staff.as_ref(), end, &opts).unwrap();
        assert_eq!(report.metrics.snapshots.len(), 60);
        assert_eq!(report.metrics.new_issues, 60);
        assert_eq!(report.metrics.latest_total, Some(100));
    }
}
