use anyhow::Result;

use crate::auth::{require_staff, Route, Session};
use crate::db::{Database, UpvoteDrift};
use crate::models::Issue;

pub struct ReconcileReport {
    pub drift: Vec<UpvoteDrift>,
    pub audit_gaps: Vec<Issue>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty() && self.audit_gaps.is_empty()
    }
}

pub fn check(db: &Database, session: Option<&Session>, fix: bool) -> Result<ReconcileReport> {
    require_staff(session, Route::AdminLogin)?;
    Ok(ReconcileReport {
        drift: db.reconcile_upvotes(fix)?,
        audit_gaps: db.audit_gaps()?,
    })
}

pub fn run(db: &Database, session: Option<&Session>, fix: bool) -> Result<()> {
    let report = check(db, session, fix)?;

    if report.is_clean() {
        println!("Everything is consistent.");
        return Ok(());
    }

    if !report.drift.is_empty() {
        let verb = if fix { "Fixed" } else { "Found" };
        println!("{} {} upvote counter(s) out of step:", verb, report.drift.len());
        for d in &report.drift {
            println!("  #{:<5} stored {:>4}  counted {:>4}", d.issue_id, d.stored, d.counted);
        }
        if !fix {
            println!("Run with --fix to recount.");
        }
    }

    if !report.audit_gaps.is_empty() {
        println!(
            "{} issue(s) have a status with no history entry:",
            report.audit_gaps.len()
        );
        for issue in &report.audit_gaps {
            println!("  #{:<5} [{}] {}", issue.id, issue.status, issue.title);
        }
    }
    Ok(())
}
