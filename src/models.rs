use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Issue lifecycle. Ordered, but transitions are not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Unresolved,
    InProgress,
    Resolved,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Unresolved, Status::InProgress, Status::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unresolved => "unresolved",
            Status::InProgress => "in_progress",
            Status::Resolved => "resolved",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Unresolved => "Unresolved",
            Status::InProgress => "In Progress",
            Status::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid status '{}'. Must be one of: unresolved, in_progress, resolved",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    RoadMaintenance,
    StreetLighting,
    WasteManagement,
    WaterSupply,
    Drainage,
    PublicTransport,
    ParksRecreation,
    BuildingViolations,
    NoisePollution,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::RoadMaintenance,
        Category::StreetLighting,
        Category::WasteManagement,
        Category::WaterSupply,
        Category::Drainage,
        Category::PublicTransport,
        Category::ParksRecreation,
        Category::BuildingViolations,
        Category::NoisePollution,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::RoadMaintenance => "road_maintenance",
            Category::StreetLighting => "street_lighting",
            Category::WasteManagement => "waste_management",
            Category::WaterSupply => "water_supply",
            Category::Drainage => "drainage",
            Category::PublicTransport => "public_transport",
            Category::ParksRecreation => "parks_recreation",
            Category::BuildingViolations => "building_violations",
            Category::NoisePollution => "noise_pollution",
            Category::Other => "other",
        }
    }

    /// Display name: underscores become spaces.
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Parse a stored value, collapsing anything unknown or blank into `Other`.
    pub fn from_stored(s: &str) -> Category {
        s.trim().parse().unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
                format!("Invalid category '{}'. Must be one of: {}", s, names.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Moderators and admins may triage issues and see the dashboards.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "citizen" => Ok(Role::Citizen),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            _ => Err(format!(
                "Invalid role '{}'. Must be one of: citizen, moderator, admin",
                s
            )),
        }
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Category::Other),
            _ => Ok(Category::from_stored(value.as_str()?)),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: Status,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub ward: Option<String>,
    pub photo_url: Option<String>,
    pub before_photo_url: Option<String>,
    pub after_photo_url: Option<String>,
    pub upvotes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A citizen submission before it is stored.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub ward: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub old_status: Option<Status>,
    pub new_status: Status,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub actor: Option<String>,
}

/// Daily aggregate row produced outside the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub date: NaiveDate,
    #[serde(default)]
    pub total_issues: i64,
    #[serde(default)]
    pub new_issues: i64,
    #[serde(default)]
    pub resolved_issues: i64,
    #[serde(default)]
    pub avg_resolution_hours: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueSort {
    #[default]
    Newest,
    MostVoted,
}

#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<Status>,
    pub category: Option<Category>,
    pub ward: Option<String>,
    pub user_id: Option<i64>,
    pub search: Option<String>,
    pub sort: IssueSort,
    pub limit: Option<usize>,
}

/// Result of a vote toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub voted: bool,
    pub upvotes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("open".parse::<Status>().is_err());
    }

    #[test]
    fn test_category_has_ten_values() {
        assert_eq!(Category::ALL.len(), 10);
        assert_eq!(Category::RoadMaintenance.label(), "road maintenance");
    }

    #[test]
    fn test_unknown_category_collapses_to_other() {
        assert_eq!(Category::from_stored("potholes"), Category::Other);
        assert_eq!(Category::from_stored(""), Category::Other);
        assert_eq!(Category::from_stored("   "), Category::Other);
        assert_eq!(Category::from_stored("drainage"), Category::Drainage);
    }

    #[test]
    fn test_staff_roles() {
        assert!(!Role::Citizen.is_staff());
        assert!(Role::Moderator.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let now = Utc::now();
        let mut profile = Profile {
            id: 1,
            email: "ana@example.com".to_string(),
            full_name: None,
            phone: None,
            role: Role::Citizen,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(profile.display_name(), "ana@example.com");
        profile.full_name = Some("Ana".to_string());
        assert_eq!(profile.display_name(), "Ana");
    }
}
