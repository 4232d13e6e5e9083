#![no_main]

//! Fuzz target for the JSON write endpoints.
//!
//! Any endpoint name and body must come back as a status code and an envelope; a rejected
//! request must leave the vote counter equal to the number of vote rows.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tempfile::tempdir;

use citypulse::api;
use citypulse::auth::Session;
use citypulse::db::Database;
use citypulse::models::{Category, NewIssue, Role};

#[derive(Arbitrary, Debug)]
struct DispatchInput {
    endpoint: u8,
    raw_endpoint: Option<String>,
    body: String,
    signed_in: bool,
    staff: bool,
}

const ENDPOINTS: [&str; 5] = [
    "create-issue",
    "toggle-vote",
    "change-status",
    "post-comment",
    "update-profile",
];

fuzz_target!(|input: DispatchInput| {
    let dir = match tempdir() {
        Ok(d) => d,
        Err(_) => return,
    };
    let db = match Database::open(&dir.path().join("issues.db")) {
        Ok(d) => d,
        Err(_) => return,
    };
    let user = match db.create_profile("fuzz@example.com", None, None) {
        Ok(id) => id,
        Err(_) => return,
    };
    if input.staff {
        let _ = db.set_role("fuzz@example.com", Role::Moderator);
    }
    let issue = NewIssue {
        title: "Seed".to_string(),
        description: "Seed issue".to_string(),
        category: Category::Other,
        latitude: 0.0,
        longitude: 0.0,
        address: None,
        ward: None,
        photo_url: None,
    };
    if db.create_issue(user, &issue).is_err() {
        return;
    }

    let session = if input.signed_in {
        Session::resolve(&db, Some("fuzz@example.com")).ok().flatten()
    } else {
        None
    };
    let endpoint = input
        .raw_endpoint
        .clone()
        .unwrap_or_else(|| ENDPOINTS[input.endpoint as usize % ENDPOINTS.len()].to_string());

    let (status, response) = api::dispatch(&db, session.as_ref(), &endpoint, &input.body);
    assert_eq!(status == 200, response.success);
    assert!(serde_json::to_string(&response).is_ok());

    if let Ok(drift) = db.reconcile_upvotes(false) {
        assert!(drift.is_empty());
    }
});
