use anyhow::{bail, Result};
use serde::Serialize;

use crate::auth::Session;
use crate::db::Database;
use crate::models::{Comment, Issue, StatusUpdate};

#[derive(Debug, Serialize)]
pub struct IssueDetail {
    pub issue: Issue,
    pub reporter: Option<String>,
    pub has_voted: bool,
    pub comments: Vec<Comment>,
    pub updates: Vec<StatusUpdate>,
}

pub fn load(db: &Database, session: Option<&Session>, id: i64) -> Result<IssueDetail> {
    let issue = match db.get_issue(id)? {
        Some(i) => i,
        None => bail!("Issue #{} not found", id),
    };
    let reporter = db
        .get_profile(issue.user_id)?
        .map(|p| p.display_name().to_string());
    let has_voted = match session {
        Some(s) => db.has_voted(id, s.user_id)?,
        None => false,
    };

    Ok(IssueDetail {
        reporter,
        has_voted,
        comments: db.get_comments(id)?,
        updates: db.get_status_updates(id)?,
        issue,
    })
}

pub fn run(db: &Database, session: Option<&Session>, id: i64, json: bool) -> Result<()> {
    let detail = load(db, session, id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let issue = &detail.issue;
    println!("Issue #{}: {}", issue.id, issue.title);
    println!("Status: {}", issue.status.label());
    println!("Category: {}", issue.category.label());
    println!(
        "Upvotes: {}{}",
        issue.upvotes,
        if detail.has_voted { " (you voted)" } else { "" }
    );
    if let Some(reporter) = &detail.reporter {
        println!("Reported by: {}", reporter);
    }
    println!("Location: {:.5}, {:.5}", issue.latitude, issue.longitude);
    if let Some(address) = &issue.address {
        println!("Address: {}", address);
    }
    if let Some(ward) = &issue.ward {
        println!("Ward: {}", ward);
    }
    println!("Created: {}", issue.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Updated: {}", issue.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(resolved) = issue.resolved_at {
        println!("Resolved: {}", resolved.format("%Y-%m-%d %H:%M:%S"));
    }
    for (label, url) in [
        ("Photo", &issue.photo_url),
        ("After photo", &issue.after_photo_url),
    ] {
        if let Some(url) = url {
            println!("{}: {}", label, url);
        }
    }

    if !issue.description.is_empty() {
        println!("\nDescription:");
        for line in issue.description.lines() {
            println!("  {}", line);
        }
    }

    if !detail.updates.is_empty() {
        println!("\nStatus history:");
        for update in &detail.updates {
            let from = update
                .old_status
                .map(|s| s.as_str())
                .unwrap_or("(new)");
            println!(
                "  [{}] {} -> {} by {}",
                update.created_at.format("%Y-%m-%d %H:%M"),
                from,
                update.new_status,
                update.actor.as_deref().unwrap_or("unknown")
            );
            if let Some(comment) = &update.comment {
                println!("      {}", comment);
            }
        }
    }

    if !detail.comments.is_empty() {
        println!("\nComments:");
        for comment in &detail.comments {
            println!(
                "  [{}] {}: {}",
                comment.created_at.format("%Y-%m-%d %H:%M"),
                comment.author.as_deref().unwrap_or("anonymous"),
                comment.content
            );
        }
    }

    Ok(())
}
