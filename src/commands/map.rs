use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::fs;

use crate::db::Database;
use crate::models::{Issue, IssueFilter};

/// GeoJSON coordinates are `[longitude, latitude]`.
fn feature(issue: &Issue) -> Value {
    json!({
        "type": "Feature",
        "id": issue.id,
        "geometry": {
            "type": "Point",
            "coordinates": [issue.longitude, issue.latitude],
        },
        "properties": {
            "title": issue.title,
            "category": issue.category,
            "status": issue.status,
            "upvotes": issue.upvotes,
            "address": issue.address,
            "ward": issue.ward,
            "created_at": issue.created_at.to_rfc3339(),
        },
    })
}

pub fn feature_collection(issues: &[Issue]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": issues.iter().map(feature).collect::<Vec<_>>(),
    })
}

pub fn run(db: &Database, filter: &IssueFilter, output_path: Option<&str>) -> Result<()> {
    let issues = db.list_issues(filter)?;
    let geojson = serde_json::to_string_pretty(&feature_collection(&issues))?;

    match output_path {
        Some(path) => {
            fs::write(path, geojson).context("Failed to write map file")?;
            eprintln!("Wrote {} markers to {}", issues.len(), path);
        }
        None => println!("{}", geojson),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_issue, setup_test_db};
    use crate::models::Category;

    #[test]
    fn test_feature_collection_shape() {
        let (db, _dir) = setup_test_db();
        let user = db.create_profile("ana@example.com", None, None).unwrap();
        let id = db.create_issue(user, &new_issue("Pothole")).unwrap();
        let issues = db.list_issues(&IssueFilter::default()).unwrap();

        let fc = feature_collection(&issues);
        assert_eq!(fc["type"], "FeatureCollection");
        let f = &fc["features"][0];
        assert_eq!(f["id"], id);
        assert_eq!(f["geometry"]["coordinates"][0], 77.59);
        assert_eq!(f["geometry"]["coordinates"][1], 12.97);
        assert_eq!(f["properties"]["status"], "unresolved");
        assert_eq!(f["properties"]["category"], "road_maintenance");
    }

    #[test]
    fn test_map_respects_filter() {
        let (db, dir) = setup_test_db();
        let user = db.create_profile("ana@example.com", None, None).unwrap();
        db.create_issue(user, &new_issue("Pothole")).unwrap();
        let filter = IssueFilter {
            category: Some(Category::Drainage),
            ..Default::default()
        };
        let path = dir.path().join("map.geojson");
        run(&db, &filter, Some(path.to_str().unwrap())).unwrap();
        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["features"].as_array().map(Vec::len), Some(0));
    }
}
