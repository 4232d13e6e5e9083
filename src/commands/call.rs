use anyhow::{bail, Context, Result};
use std::io::{self, Read};

use crate::api;
use crate::auth::Session;
use crate::db::Database;

/// Sends a raw JSON body to a write endpoint and prints the status line and response.
/// The body comes from `--body`, or from stdin when absent.
pub fn run(db: &Database, session: Option<&Session>, endpoint: &str, body: Option<&str>) -> Result<()> {
    let body = match body {
        Some(b) => b.to_string(),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request body from stdin")?;
            buf
        }
    };

    let (status, response) = api::dispatch(db, session, endpoint, &body);
    println!("{}", status);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if status != 200 {
        bail!("{} returned {}", endpoint, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_issue, setup_test_db};

    #[test]
    fn test_call_success_and_failure() {
        let (db, _dir) = setup_test_db();
        let user = db.create_profile("ana@example.com", None, None).unwrap();
        let id = db.create_issue(user, &new_issue("Pothole")).unwrap();
        let session = Session::resolve(&db, Some("ana@example.com")).unwrap();

        let body = format!(r#"{{"issue_id": {}}}"#, id);
        assert!(run(&db, session.as_ref(), "toggle-vote", Some(&body)).is_ok());
        assert_eq!(db.get_issue(id).unwrap().unwrap().upvotes, 1);

        let err = run(&db, None, "toggle-vote", Some(&body)).unwrap_err();
        assert!(err.to_string().contains("401"));
        let err = run(&db, session.as_ref(), "delete-issue", Some("{}")).unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
