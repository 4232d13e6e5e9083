use anyhow::Result;

use crate::api::{self, StatusChangeRequest};
use crate::auth::{require_staff, Route, Session};
use crate::db::Database;

pub fn run(
    db: &Database,
    session: Option<&Session>,
    id: i64,
    status: &str,
    comment: Option<&str>,
    after_photo: Option<&str>,
) -> Result<()> {
    require_staff(session, Route::Login)?;
    let update = api::change_status(
        db,
        session,
        StatusChangeRequest {
            issue_id: Some(id),
            status: Some(status.to_string()),
            comment: comment.map(str::to_string),
            after_photo_url: after_photo.map(str::to_string),
        },
    )?;

    match update.old_status {
        Some(old) if old == update.new_status => {
            println!("Issue #{} is already {}", id, update.new_status.label())
        }
        Some(old) => println!(
            "Issue #{}: {} -> {}",
            id,
            old.label(),
            update.new_status.label()
        ),
        None => println!("Issue #{} is now {}", id, update.new_status.label()),
    }
    Ok(())
}
