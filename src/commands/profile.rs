use anyhow::{bail, Result};

use crate::api::{self, ProfileUpdateRequest};
use crate::auth::{require_user, Route, Session};
use crate::db::Database;
use crate::models::{Issue, IssueFilter, Role, Status};

pub fn signup(db: &Database, email: &str, name: Option<&str>, phone: Option<&str>) -> Result<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        bail!("Invalid email '{}'", email);
    }
    if db.get_profile_by_email(email)?.is_some() {
        bail!("A profile for {} already exists", email);
    }

    let id = db.create_profile(email, name, phone)?;
    println!("Created profile #{} for {}", id, email);
    println!("Use --as {} (or CITYPULSE_USER) to act as this user.", email);
    Ok(())
}

/// Issues the user has upvoted, most recent vote first.
pub fn voted_issues(db: &Database, user_id: i64) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    for vote in db.votes_by_user(user_id)? {
        if let Some(issue) = db.get_issue(vote.issue_id)? {
            issues.push(issue);
        }
    }
    Ok(issues)
}

pub fn show(db: &Database, session: Option<&Session>) -> Result<()> {
    let session = require_user(session, Route::Login)?;
    let profile = match db.get_profile(session.user_id)? {
        Some(p) => p,
        None => bail!("Profile not found"),
    };

    let issues = db.list_issues(&IssueFilter {
        user_id: Some(profile.id),
        ..Default::default()
    })?;
    let resolved = issues.iter().filter(|i| i.status == Status::Resolved).count();
    let voted = voted_issues(db, profile.id)?;

    println!("{} <{}>", profile.display_name(), profile.email);
    println!("Role: {}", profile.role);
    if let Some(phone) = &profile.phone {
        println!("Phone: {}", phone);
    }
    println!("Member since: {}", profile.created_at.format("%Y-%m-%d"));
    println!();
    println!("Issues reported: {}", issues.len());
    println!("Resolved: {}", resolved);
    println!("Votes cast: {}", voted.len());

    if !issues.is_empty() {
        println!("\nYour issues:");
        for issue in issues.iter().take(10) {
            println!("  #{} [{}] {}", issue.id, issue.status, issue.title);
        }
    }

    if !voted.is_empty() {
        println!("\nIssues you upvoted:");
        for issue in voted.iter().take(10) {
            println!("  #{} [{}] {}", issue.id, issue.status, issue.title);
        }
    }

    Ok(())
}

pub fn edit(db: &Database, session: Option<&Session>, name: &str, phone: Option<&str>) -> Result<()> {
    let req = ProfileUpdateRequest {
        full_name: Some(name.to_string()),
        phone: phone.map(str::to_string),
    };
    let profile = api::update_profile(db, session, req)?;
    println!("Updated profile for {}", profile.email);
    Ok(())
}

/// Privileged role assignment. Not gated by the session: this stands in for the backend's
/// service-role access.
pub fn set_role(db: &Database, email: &str, role: &str) -> Result<()> {
    let role: Role = role.parse().map_err(anyhow::Error::msg)?;
    if db.set_role(email, role)? {
        println!("{} is now {}", email, role);
    } else {
        bail!("No profile for {}", email);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_issue, setup_test_db};

    #[test]
    fn test_signup_creates_citizen() {
        let (db, _dir) = setup_test_db();
        signup(&db, "ana@example.com", Some("Ana"), None).unwrap();
        let profile = db.get_profile_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(profile.role, Role::Citizen);
    }

    #[test]
    fn test_signup_rejects_duplicates_and_bad_email() {
        let (db, _dir) = setup_test_db();
        signup(&db, "ana@example.com", None, None).unwrap();
        assert!(signup(&db, "ana@example.com", None, None).is_err());
        assert!(signup(&db, "not-an-email", None, None).is_err());
    }

    #[test]
    fn test_show_requires_session() {
        let (db, _dir) = setup_test_db();
        let err = show(&db, None).unwrap_err();
        assert!(err.to_string().contains("/auth/login"));
    }

    #[test]
    fn test_voted_issues() {
        let (db, _dir) = setup_test_db();
        let ana = db.create_profile("ana@example.com", None, None).unwrap();
        let bo = db.create_profile("bo@example.com", None, None).unwrap();
        let pothole = db.create_issue(ana, &new_issue("Pothole")).unwrap();
        let light = db.create_issue(ana, &new_issue("Streetlight")).unwrap();
        db.create_issue(ana, &new_issue("Graffiti")).unwrap();
        db.toggle_vote(pothole, bo).unwrap();
        db.toggle_vote(light, bo).unwrap();

        let mut titles: Vec<String> = voted_issues(&db, bo)
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["Pothole", "Streetlight"]);
        assert!(voted_issues(&db, ana).unwrap().is_empty());

        let session = Session::resolve(&db, Some("bo@example.com")).unwrap();
        assert!(show(&db, session.as_ref()).is_ok());
    }

    #[test]
    fn test_edit_profile() {
        let (db, _dir) = setup_test_db();
        signup(&db, "ana@example.com", None, None).unwrap();
        let session = Session::resolve(&db, Some("ana@example.com")).unwrap();
        edit(&db, session.as_ref(), "Ana", Some("555-0100")).unwrap();
        let profile = db.get_profile_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ana"));
        assert_eq!(profile.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn test_set_role() {
        let (db, _dir) = setup_test_db();
        signup(&db, "mod@example.com", None, None).unwrap();
        set_role(&db, "mod@example.com", "moderator").unwrap();
        assert!(set_role(&db, "mod@example.com", "mayor").is_err());
        assert!(set_role(&db, "ghost@example.com", "admin").is_err());
        let profile = db.get_profile_by_email("mod@example.com").unwrap().unwrap();
        assert_eq!(profile.role, Role::Moderator);
    }
}
