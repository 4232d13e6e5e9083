use anyhow::Result;

use crate::api::{self, VoteRequest};
use crate::auth::Session;
use crate::db::Database;

pub fn run(db: &Database, session: Option<&Session>, id: i64) -> Result<()> {
    let outcome = api::toggle_vote(db, session, VoteRequest { issue_id: Some(id) })?;
    if outcome.voted {
        println!("Upvoted issue #{} ({} votes)", id, outcome.upvotes);
    } else {
        println!("Removed your vote from issue #{} ({} votes)", id, outcome.upvotes);
    }
    Ok(())
}
