use anyhow::Result;

use crate::api::{self, CreateIssueRequest};
use crate::auth::Session;
use crate::db::Database;
use crate::geocode::{Coordinates, ReverseGeocoder};

pub struct ReportArgs<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<&'a str>,
    pub ward: Option<&'a str>,
    pub photo_url: Option<&'a str>,
}

/// Submits a new issue. When a geocoder is given and no address was typed, the address is
/// looked up first; a lookup failure only costs the address.
pub fn run(
    db: &Database,
    session: Option<&Session>,
    args: ReportArgs<'_>,
    geocoder: Option<&dyn ReverseGeocoder>,
) -> Result<()> {
    let mut address = args.address.map(str::to_string);

    if address.is_none() {
        if let Some(geocoder) = geocoder {
            match Coordinates::new(args.latitude, args.longitude).and_then(|at| geocoder.reverse(at)) {
                Ok(Some(found)) => {
                    println!("Address: {}", found);
                    address = Some(found);
                }
                Ok(None) => println!("No address found for this location."),
                Err(e) => {
                    tracing::warn!(error = %e, "reverse geocoding failed");
                    eprintln!("Warning: Could not look up the address: {}", e);
                }
            }
        }
    }

    let req = CreateIssueRequest {
        title: Some(args.title.to_string()),
        description: Some(args.description.to_string()),
        category: Some(args.category.to_string()),
        latitude: Some(args.latitude),
        longitude: Some(args.longitude),
        address,
        ward: args.ward.map(str::to_string),
        photo_url: args.photo_url.map(str::to_string),
    };

    let issue = api::create_issue(db, session, req)?;
    println!("Reported issue #{}", issue.id);
    Ok(())
}

pub fn locate(geocoder: &dyn ReverseGeocoder, latitude: f64, longitude: f64) -> Result<()> {
    let at = Coordinates::new(latitude, longitude)?;
    match geocoder.reverse(at)? {
        Some(address) => println!("{}", address),
        None => println!("No address found for {:.5}, {:.5}", at.latitude, at.longitude),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use anyhow::bail;

    struct FixedGeocoder(Option<&'static str>);

    impl ReverseGeocoder for FixedGeocoder {
        fn reverse(&self, _at: Coordinates) -> Result<Option<String>> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct DownGeocoder;

    impl ReverseGeocoder for DownGeocoder {
        fn reverse(&self, _at: Coordinates) -> Result<Option<String>> {
            bail!("connection refused")
        }
    }

    fn args<'a>(address: Option<&'a str>) -> ReportArgs<'a> {
        ReportArgs {
            title: "Streetlight out",
            description: "Dark for a week",
            category: "street_lighting",
            latitude: 12.97,
            longitude: 77.59,
            address,
            ward: Some("Ward 3"),
            photo_url: None,
        }
    }

    fn session(db: &Database) -> Option<Session> {
        db.create_profile("ana@example.com", None, None).unwrap();
        Session::resolve(db, Some("ana@example.com")).unwrap()
    }

    #[test]
    fn test_report_fills_address_from_geocoder() {
        let (db, _dir) = setup_test_db();
        let s = session(&db);
        let geocoder = FixedGeocoder(Some("MG Road"));
        run(&db, s.as_ref(), args(None), Some(&geocoder)).unwrap();
        let issues = db.list_issues(&Default::default()).unwrap();
        assert_eq!(issues[0].address.as_deref(), Some("MG Road"));
    }

    #[test]
    fn test_typed_address_wins() {
        let (db, _dir) = setup_test_db();
        let s = session(&db);
        let geocoder = FixedGeocoder(Some("MG Road"));
        run(&db, s.as_ref(), args(Some("Near the park")), Some(&geocoder)).unwrap();
        let issues = db.list_issues(&Default::default()).unwrap();
        assert_eq!(issues[0].address.as_deref(), Some("Near the park"));
    }

    #[test]
    fn test_geocoder_failure_still_reports() {
        let (db, _dir) = setup_test_db();
        let s = session(&db);
        run(&db, s.as_ref(), args(None), Some(&DownGeocoder)).unwrap();
        let issues = db.list_issues(&Default::default()).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].address.is_none());
    }

    #[test]
    fn test_report_requires_session() {
        let (db, _dir) = setup_test_db();
        assert!(run(&db, None, args(None), None).is_err());
        assert!(db.list_issues(&Default::default()).unwrap().is_empty());
    }

    #[test]
    fn test_locate() {
        assert!(locate(&FixedGeocoder(Some("MG Road")), 12.97, 77.59).is_ok());
        assert!(locate(&DownGeocoder, 12.97, 77.59).is_err());
        assert!(locate(&FixedGeocoder(None), 95.0, 77.59).is_err());
    }
}
