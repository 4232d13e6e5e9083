#![no_main]

//! Fuzz target for CLI output functions.
//!
//! Titles, wards and comments can hold any Unicode. Row formatting, truncation and the
//! markdown/GeoJSON writers must never slice inside a multi-byte character.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tempfile::tempdir;

use citypulse::commands::{list, map};
use citypulse::db::Database;
use citypulse::models::{Category, IssueFilter, NewIssue};

#[derive(Arbitrary, Debug)]
struct CliOutputInput {
    title: String,
    description: String,
    ward: Option<String>,
    comment: Option<String>,
    category_index: u8,
    num_issues: u8,
    truncate_to: u8,
}

fuzz_target!(|input: CliOutputInput| {
    let num_issues = (input.num_issues % 20).max(1);

    let dir = match tempdir() {
        Ok(d) => d,
        Err(_) => return,
    };
    let db = match Database::open(&dir.path().join("issues.db")) {
        Ok(d) => d,
        Err(_) => return,
    };
    let user = match db.create_profile("fuzz@example.com", Some(&input.title), None) {
        Ok(id) => id,
        Err(_) => return,
    };

    let category = Category::ALL[input.category_index as usize % Category::ALL.len()];
    let mut created_ids = Vec::new();
    for i in 0..num_issues {
        let issue = NewIssue {
            title: format!("{} #{}", input.title, i),
            description: input.description.clone(),
            category,
            latitude: 12.97,
            longitude: 77.59,
            address: None,
            ward: input.ward.clone(),
            photo_url: None,
        };
        if let Ok(id) = db.create_issue(user, &issue) {
            created_ids.push(id);
        }
    }

    if let Ok(issues) = db.list_issues(&IssueFilter::default()) {
        for issue in &issues {
            let _ = list::format_row(issue);
        }
        let _ = map::feature_collection(&issues);
    }

    let search: String = input.title.chars().take(10).collect();
    let _ = db.list_issues(&IssueFilter {
        search: Some(search),
        ward: input.ward.clone(),
        ..Default::default()
    });

    let _ = list::truncate(&input.title, input.truncate_to as usize);

    if let (Some(id), Some(comment)) = (created_ids.first(), &input.comment) {
        let _ = db.add_comment(*id, user, comment);
        let _ = db.get_comments(*id);
    }
});
