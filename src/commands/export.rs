use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};

use crate::db::Database;
use crate::models::{Issue, IssueFilter, Status};

#[derive(Serialize, Deserialize)]
pub struct ExportedIssue {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub ward: Option<String>,
    pub upvotes: i64,
    pub comments: Vec<ExportedComment>,
    pub updates: Vec<ExportedUpdate>,
    pub created_at: String,
    pub updated_at: String,
    pub resolved_at: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ExportedComment {
    pub author: Option<String>,
    pub content: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
pub struct ExportedUpdate {
    pub old_status: Option<String>,
    pub new_status: String,
    pub comment: Option<String>,
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
pub struct ExportData {
    pub version: i32,
    pub exported_at: String,
    pub issues: Vec<ExportedIssue>,
}

fn export_issue(db: &Database, issue: &Issue) -> Result<ExportedIssue> {
    let comments = db.get_comments(issue.id)?;
    let updates = db.get_status_updates(issue.id)?;

    Ok(ExportedIssue {
        id: issue.id,
        title: issue.title.clone(),
        description: issue.description.clone(),
        category: issue.category.to_string(),
        status: issue.status.to_string(),
        latitude: issue.latitude,
        longitude: issue.longitude,
        address: issue.address.clone(),
        ward: issue.ward.clone(),
        upvotes: issue.upvotes,
        comments: comments
            .into_iter()
            .map(|c| ExportedComment {
                author: c.author,
                content: c.content,
                created_at: c.created_at.to_rfc3339(),
            })
            .collect(),
        updates: updates
            .into_iter()
            .map(|u| ExportedUpdate {
                old_status: u.old_status.map(|s| s.to_string()),
                new_status: u.new_status.to_string(),
                comment: u.comment,
                created_at: u.created_at.to_rfc3339(),
            })
            .collect(),
        created_at: issue.created_at.to_rfc3339(),
        updated_at: issue.updated_at.to_rfc3339(),
        resolved_at: issue.resolved_at.map(|dt| dt.to_rfc3339()),
    })
}

fn write_output(content: &str, output_path: Option<&str>, count: usize) -> Result<()> {
    match output_path {
        Some(path) => {
            fs::write(path, content).context("Failed to write export file")?;
            eprintln!("Exported {} issues to {}", count, path);
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", content)?;
        }
    }
    Ok(())
}

pub fn run_json(db: &Database, output_path: Option<&str>) -> Result<()> {
    let issues = db.list_issues(&IssueFilter::default())?;

    let exported: Vec<ExportedIssue> = issues
        .iter()
        .map(|i| export_issue(db, i))
        .collect::<Result<Vec<_>>>()?;

    let data = ExportData {
        version: 1,
        exported_at: chrono::Utc::now().to_rfc3339(),
        issues: exported,
    };

    let json = serde_json::to_string_pretty(&data)?;
    write_output(&json, output_path, data.issues.len())
}

pub fn run_markdown(db: &Database, output_path: Option<&str>) -> Result<()> {
    let issues = db.list_issues(&IssueFilter::default())?;
    let mut md = String::new();

    md.push_str("# CityPulse Issues Export\n\n");
    md.push_str(&format!(
        "Exported: {}\n\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));

    for status in Status::ALL {
        let group: Vec<_> = issues.iter().filter(|i| i.status == status).collect();
        if group.is_empty() {
            continue;
        }
        md.push_str(&format!("## {}\n\n", status.label()));
        for issue in group {
            write_issue_md(&mut md, db, issue)?;
        }
    }

    write_output(&md, output_path, issues.len())
}

fn write_issue_md(md: &mut String, db: &Database, issue: &Issue) -> Result<()> {
    let checkbox = if issue.status == Status::Resolved {
        "[x]"
    } else {
        "[ ]"
    };

    md.push_str(&format!(
        "### {} #{}: {}\n\n",
        checkbox, issue.id, issue.title
    ));
    md.push_str(&format!("- **Category:** {}\n", issue.category.label()));
    md.push_str(&format!("- **Upvotes:** {}\n", issue.upvotes));
    if let Some(ref ward) = issue.ward {
        md.push_str(&format!("- **Ward:** {}\n", ward));
    }
    if let Some(ref address) = issue.address {
        md.push_str(&format!("- **Address:** {}\n", address));
    }
    md.push_str(&format!(
        "- **Created:** {}\n",
        issue.created_at.format("%Y-%m-%d")
    ));
    if let Some(resolved) = issue.resolved_at {
        md.push_str(&format!("- **Resolved:** {}\n", resolved.format("%Y-%m-%d")));
    }

    if !issue.description.is_empty() {
        md.push_str(&format!("\n{}\n", issue.description));
    }

    let comments = db.get_comments(issue.id)?;
    if !comments.is_empty() {
        md.push_str("\n**Comments:**\n");
        for comment in comments {
            md.push_str(&format!(
                "- [{}] {}: {}\n",
                comment.created_at.format("%Y-%m-%d %H:%M"),
                comment.author.as_deref().unwrap_or("anonymous"),
                comment.content
            ));
        }
    }

    md.push_str("\n---\n\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_issue, setup_test_db};
    use proptest::prelude::*;

    fn reporter(db: &Database) -> i64 {
        db.create_profile("ana@example.com", Some("Ana"), None).unwrap()
    }

    #[test]
    fn test_export_issue_basic() {
        let (db, _dir) = setup_test_db();
        let user = reporter(&db);
        let id = db.create_issue(user, &new_issue("Test issue")).unwrap();
        let issue = db.get_issue(id).unwrap().unwrap();
        let exported = export_issue(&db, &issue).unwrap();
        assert_eq!(exported.id, id);
        assert_eq!(exported.title, "Test issue");
        assert_eq!(exported.category, "road_maintenance");
        assert_eq!(exported.status, "unresolved");
    }

    #[test]
    fn test_export_issue_with_comments_and_history() {
        let (db, _dir) = setup_test_db();
        let user = reporter(&db);
        let id = db.create_issue(user, &new_issue("Test issue")).unwrap();
        db.add_comment(id, user, "First comment").unwrap();
        db.add_comment(id, user, "Second comment").unwrap();
        db.change_status(id, user, Status::InProgress, Some("Crew assigned"), None)
            .unwrap();
        let issue = db.get_issue(id).unwrap().unwrap();
        let exported = export_issue(&db, &issue).unwrap();
        assert_eq!(exported.comments.len(), 2);
        assert_eq!(exported.comments[0].author.as_deref(), Some("Ana"));
        assert_eq!(exported.updates.len(), 1);
        assert_eq!(exported.updates[0].new_status, "in_progress");
    }

    #[test]
    fn test_export_resolved_issue() {
        let (db, _dir) = setup_test_db();
        let user = reporter(&db);
        let id = db.create_issue(user, &new_issue("Test issue")).unwrap();
        db.change_status(id, user, Status::Resolved, None, None).unwrap();
        let issue = db.get_issue(id).unwrap().unwrap();
        let exported = export_issue(&db, &issue).unwrap();
        assert_eq!(exported.status, "resolved");
        assert!(exported.resolved_at.is_some());
    }

    #[test]
    fn test_run_json_to_file() {
        let (db, dir) = setup_test_db();
        let user = reporter(&db);
        db.create_issue(user, &new_issue("Issue 1")).unwrap();
        db.create_issue(user, &new_issue("Issue 2")).unwrap();
        let output_path = dir.path().join("export.json");
        run_json(&db, Some(output_path.to_str().unwrap())).unwrap();
        let content = fs::read_to_string(&output_path).unwrap();
        let data: ExportData = serde_json::from_str(&content).unwrap();
        assert_eq!(data.version, 1);
        assert_eq!(data.issues.len(), 2);
    }

    #[test]
    fn test_run_json_empty_database() {
        let (db, dir) = setup_test_db();
        let output_path = dir.path().join("export.json");
        run_json(&db, Some(output_path.to_str().unwrap())).unwrap();
        let content = fs::read_to_string(&output_path).unwrap();
        let data: ExportData = serde_json::from_str(&content).unwrap();
        assert_eq!(data.issues.len(), 0);
    }

    #[test]
    fn test_markdown_groups_by_status() {
        let (db, dir) = setup_test_db();
        let user = reporter(&db);
        db.create_issue(user, &new_issue("Open issue")).unwrap();
        let working = db.create_issue(user, &new_issue("Working issue")).unwrap();
        db.change_status(working, user, Status::InProgress, None, None).unwrap();
        let output_path = dir.path().join("export.md");
        run_markdown(&db, Some(output_path.to_str().unwrap())).unwrap();
        let content = fs::read_to_string(&output_path).unwrap();
        assert!(content.contains("# CityPulse Issues Export"));
        assert!(content.contains("## Unresolved"));
        assert!(content.contains("## In Progress"));
        assert!(!content.contains("## Resolved"));
    }

    #[test]
    fn test_export_unicode_content() {
        let (db, dir) = setup_test_db();
        let user = reporter(&db);
        db.create_issue(user, &new_issue("Ямa на дороге 🚧")).unwrap();
        let output_path = dir.path().join("export.json");
        run_json(&db, Some(output_path.to_str().unwrap())).unwrap();
        let content = fs::read_to_string(&output_path).unwrap();
        let data: ExportData = serde_json::from_str(&content).unwrap();
        assert_eq!(data.issues[0].title, "Ямa на дороге 🚧");
    }

    proptest! {
        #[test]
        fn prop_json_is_valid(title in "[a-zA-Z0-9 ]{1,30}") {
            let (db, dir) = setup_test_db();
            let user = reporter(&db);
            db.create_issue(user, &new_issue(&title)).unwrap();
            let output_path = dir.path().join("export.json");
            run_json(&db, Some(output_path.to_str().unwrap())).unwrap();
            let content = fs::read_to_string(&output_path).unwrap();
            let result: Result<ExportData, _> = serde_json::from_str(&content);
            prop_assert!(result.is_ok());
        }
    }
}
