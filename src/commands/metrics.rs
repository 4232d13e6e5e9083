use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;

use crate::analytics::{metric_window, window_start, MetricWindow};
use crate::db::Database;
use crate::models::MetricSnapshot;

/// Loads a JSON array of daily snapshots. A date already present is overwritten.
pub fn import(db: &Database, path: &Path) -> Result<usize> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshots: Vec<MetricSnapshot> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid metrics file {}", path.display()))?;

    for snapshot in &snapshots {
        db.upsert_metric_snapshot(snapshot)?;
    }
    tracing::info!(count = snapshots.len(), "metric snapshots imported");
    println!("Imported {} metric snapshots", snapshots.len());
    Ok(snapshots.len())
}

/// The stored snapshots for the `days` days ending `today`.
pub fn window(db: &Database, today: NaiveDate, days: u32) -> Result<MetricWindow> {
    let snapshots = db.metrics_between(window_start(today, days), today)?;
    Ok(metric_window(&snapshots, today, days))
}

pub fn show(db: &Database, days: u32, json: bool) -> Result<()> {
    let today = chrono::Utc::now().date_naive();
    let window = window(db, today, days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&window)?);
        return Ok(());
    }

    if window.snapshots.is_empty() {
        println!("No metric snapshots in the last {} days.", days);
        return Ok(());
    }

    println!("{:<12} {:>7} {:>5} {:>9} {:>10}", "Date", "Total", "New", "Resolved", "Avg hours");
    for s in &window.snapshots {
        let avg = s
            .avg_resolution_hours
            .map(|h| format!("{:.1}", h))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:>7} {:>5} {:>9} {:>10}",
            s.date, s.total_issues, s.new_issues, s.resolved_issues, avg
        );
    }
    println!(
        "\n{} new, {} resolved over {} days",
        window.new_issues, window.resolved_issues, window.days
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    #[test]
    fn test_import_upserts() {
        let (db, dir) = setup_test_db();
        let path = dir.path().join("metrics.json");
        fs::write(
            &path,
            r#"[
                {"date": "2024-03-01", "total_issues": 10, "new_issues": 2, "resolved_issues": 1},
                {"date": "2024-03-02", "total_issues": 12, "new_issues": 2, "resolved_issues": 0, "avg_resolution_hours": 30.5}
            ]"#,
        )
        .unwrap();
        assert_eq!(import(&db, &path).unwrap(), 2);

        fs::write(
            &path,
            r#"[{"date": "2024-03-02", "total_issues": 13, "new_issues": 3, "resolved_issues": 0}]"#,
        )
        .unwrap();
        import(&db, &path).unwrap();

        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let stored = db.metrics_between(day(1), day(2)).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].total_issues, 13);
        assert_eq!(stored[1].avg_resolution_hours, None);
    }

    #[test]
    fn test_import_rejects_bad_file() {
        let (db, dir) = setup_test_db();
        let path = dir.path().join("metrics.json");
        fs::write(&path, r#"{"date": "2024-03-01"}"#).unwrap();
        assert!(import(&db, &path).is_err());
        assert!(import(&db, &dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_show_empty() {
        let (db, _dir) = setup_test_db();
        assert!(show(&db, 30, false).is_ok());
        assert!(show(&db, 30, true).is_ok());
    }

    #[test]
    fn test_window_longer_than_thirty_days() {
        let (db, _dir) = setup_test_db();
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        for back in 0..45u64 {
            db.upsert_metric_snapshot(&MetricSnapshot {
                date: today - chrono::Days::new(back),
                total_issues: 200 - back as i64,
                new_issues: 2,
                resolved_issues: 1,
                avg_resolution_hours: None,
            })
            .unwrap();
        }

        let w = window(&db, today, 40).unwrap();
        assert_eq!(w.snapshots.len(), 40);
        assert_eq!(w.new_issues, 80);
        assert_eq!(w.resolved_issues, 40);
        assert_eq!(w.snapshots.first().map(|s| s.date), NaiveDate::from_ymd_opt(2024, 5, 22));
        assert_eq!(w.latest_total, Some(200));
    }
}
