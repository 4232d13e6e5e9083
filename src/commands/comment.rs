use anyhow::Result;

use crate::api::{self, CommentRequest};
use crate::auth::Session;
use crate::db::Database;

pub fn run(db: &Database, session: Option<&Session>, id: i64, text: &str) -> Result<()> {
    let created = api::post_comment(
        db,
        session,
        CommentRequest {
            issue_id: Some(id),
            content: Some(text.to_string()),
        },
    )?;
    println!("Added comment to issue #{}", created.issue_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_issue, setup_test_db};

    #[test]
    fn test_comment_added() {
        let (db, _dir) = setup_test_db();
        let user = db.create_profile("ana@example.com", None, None).unwrap();
        let id = db.create_issue(user, &new_issue("Pothole")).unwrap();
        let session = Session::resolve(&db, Some("ana@example.com")).unwrap();
        run(&db, session.as_ref(), id, "Getting worse").unwrap();
        let comments = db.get_comments(id).unwrap();
        assert_eq!(comments[0].content, "Getting worse");
        assert_eq!(comments[0].user_id, user);
    }

    #[test]
    fn test_blank_comment_rejected() {
        let (db, _dir) = setup_test_db();
        let user = db.create_profile("ana@example.com", None, None).unwrap();
        let id = db.create_issue(user, &new_issue("Pothole")).unwrap();
        let session = Session::resolve(&db, Some("ana@example.com")).unwrap();
        assert!(run(&db, session.as_ref(), id, "   ").is_err());
        assert!(db.get_comments(id).unwrap().is_empty());
    }
}
