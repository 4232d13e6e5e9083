use anyhow::Result;

use crate::db::Database;
use crate::models::{Issue, IssueFilter};

pub fn run(db: &Database, filter: &IssueFilter, json: bool) -> Result<()> {
    let issues = db.list_issues(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
        return Ok(());
    }

    if issues.is_empty() {
        println!("No issues found.");
        return Ok(());
    }

    for issue in &issues {
        println!("{}", format_row(issue));
    }

    Ok(())
}

pub fn format_row(issue: &Issue) -> String {
    let status_display = format!("[{}]", issue.status);
    let date = issue.created_at.format("%Y-%m-%d");
    format!(
        "#{:<4} {:13} {:<40} {:<20} {:>4}▲ {}",
        issue.id,
        status_display,
        truncate(&issue.title, 40),
        truncate(&issue.category.label(), 20),
        issue.upvotes,
        date
    )
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_issue, setup_test_db};
    use crate::models::Status;
    use proptest::prelude::*;

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate("Pothole", 40), "Pothole");
    }

    #[test]
    fn test_truncate_long_multibyte() {
        let title = "ñ".repeat(50);
        let out = truncate(&title, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_run_empty_and_filtered() {
        let (db, _dir) = setup_test_db();
        assert!(run(&db, &IssueFilter::default(), false).is_ok());

        let user = db.create_profile("ana@example.com", None, None).unwrap();
        db.create_issue(user, &new_issue("Pothole")).unwrap();
        let filter = IssueFilter {
            status: Some(Status::Resolved),
            ..Default::default()
        };
        assert!(run(&db, &filter, true).is_ok());
    }

    #[test]
    fn test_row_contains_fields() {
        let (db, _dir) = setup_test_db();
        let user = db.create_profile("ana@example.com", None, None).unwrap();
        let id = db.create_issue(user, &new_issue("Pothole")).unwrap();
        let issue = db.get_issue(id).unwrap().unwrap();
        let row = format_row(&issue);
        assert!(row.contains("[unresolved]"));
        assert!(row.contains("road maintenance"));
    }

    proptest! {
        #[test]
        fn prop_truncate_never_exceeds(s in "\\PC{0,80}", max in 3usize..50) {
            prop_assert!(truncate(&s, max).chars().count() <= max);
        }
    }
}
