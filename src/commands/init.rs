use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::{CONFIG_FILE, DATA_DIR, DB_FILE};
use crate::db::Database;

// Path: src/commands/init.rs -> ../../resources/
const DEFAULT_CONFIG: &str = include_str!("../../resources/default-config.json");

const NEXT_STEPS: &[&str] = &[
    "citypulse signup you@example.com --name \"Your Name\"",
    "citypulse --as you@example.com report \"Title\" -d \"What is wrong\" -c road_maintenance --lat 12.97 --lng 77.59",
];

pub fn run(path: &Path, force: bool) -> Result<()> {
    let data_dir = path.join(DATA_DIR);
    let config_path = data_dir.join(CONFIG_FILE);

    let data_exists = data_dir.exists();
    let config_exists = config_path.exists();

    if data_exists && config_exists && !force {
        println!("Already initialized at {}", path.display());
        println!("Use --force to reset config.json to the defaults.");
        return Ok(());
    }

    if !data_exists {
        fs::create_dir_all(&data_dir).context("Failed to create .citypulse directory")?;
    }

    // Opening creates the schema
    Database::open(&data_dir.join(DB_FILE))?;

    if !config_exists || force {
        fs::write(&config_path, DEFAULT_CONFIG).context("Failed to write config.json")?;
        if force && config_exists {
            println!("Reset {}", config_path.display());
        } else {
            println!("Created {}", config_path.display());
        }
    }

    tracing::info!(dir = %data_dir.display(), "initialized");
    println!("CityPulse initialized successfully!");
    println!("\nNext steps:");
    for step in NEXT_STEPS {
        println!("  {}", step);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Category;
    use tempfile::tempdir;

    #[test]
    fn test_run_fresh_init() {
        let dir = tempdir().unwrap();
        let result = run(dir.path(), false);
        assert!(result.is_ok());

        assert!(dir.path().join(".citypulse").is_dir());
        assert!(dir.path().join(".citypulse/issues.db").exists());
        assert!(dir.path().join(".citypulse/config.json").exists());
    }

    #[test]
    fn test_embedded_config_matches_defaults() {
        let parsed: Config = serde_json::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.geocoder_url, defaults.geocoder_url);
        assert_eq!(parsed.category_top_n, defaults.category_top_n);
        assert_eq!(parsed.ward_top_n, defaults.ward_top_n);
        assert_eq!(parsed.analytics_window_days, defaults.analytics_window_days);
    }

    #[test]
    fn test_report_hint_names_a_category() {
        let report = NEXT_STEPS
            .iter()
            .find(|s| s.contains(" report "))
            .unwrap();
        let args: Vec<&str> = report.split_whitespace().collect();
        let flag = args.iter().position(|a| *a == "-c").unwrap();
        assert_eq!(args[flag + 1].parse::<Category>(), Ok(Category::RoadMaintenance));
    }

    #[test]
    fn test_run_already_initialized_no_force() {
        let dir = tempdir().unwrap();
        run(dir.path(), false).unwrap();

        let config_path = dir.path().join(".citypulse/config.json");
        fs::write(&config_path, r#"{"ward_top_n": 3}"#).unwrap();

        run(dir.path(), false).unwrap();
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("\"ward_top_n\": 3"));
    }

    #[test]
    fn test_run_force_resets_config() {
        let dir = tempdir().unwrap();
        run(dir.path(), false).unwrap();

        let config_path = dir.path().join(".citypulse/config.json");
        fs::write(&config_path, "{}").unwrap();

        run(dir.path(), true).unwrap();
        let content = fs::read_to_string(&config_path).unwrap();
        assert_eq!(content, DEFAULT_CONFIG);
    }

    #[test]
    fn test_run_database_usable() {
        let dir = tempdir().unwrap();
        run(dir.path(), false).unwrap();

        let db = Database::open(&dir.path().join(".citypulse/issues.db")).unwrap();
        let id = db.create_profile("ana@example.com", None, None).unwrap();
        assert!(id > 0);
    }

    #[test]
    fn test_run_keeps_existing_database() {
        let dir = tempdir().unwrap();
        run(dir.path(), false).unwrap();
        let db_path = dir.path().join(".citypulse/issues.db");
        {
            let db = Database::open(&db_path).unwrap();
            db.create_profile("ana@example.com", None, None).unwrap();
        }

        run(dir.path(), true).unwrap();
        let db = Database::open(&db_path).unwrap();
        assert!(db.get_profile_by_email("ana@example.com").unwrap().is_some());
    }
}
