use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::models::{
    Comment, Issue, IssueFilter, IssueSort, MetricSnapshot, NewIssue, Profile, Role, Status,
    StatusUpdate, Vote, VoteOutcome,
};

const SCHEMA_VERSION: i32 = 1;

const ISSUE_COLUMNS: &str = "i.id, i.user_id, i.title, i.description, i.category, i.status, \
     i.latitude, i.longitude, i.address, i.ward, i.photo_url, i.before_photo_url, \
     i.after_photo_url, i.upvotes, i.created_at, i.updated_at, i.resolved_at";

const PROFILE_COLUMNS: &str = "id, email, full_name, phone, role, created_at, updated_at";

pub struct Database {
    conn: Connection,
}

/// An issue whose denormalized counter disagreed with its vote rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpvoteDrift {
    pub issue_id: i64,
    pub stored: i64,
    pub counted: i64,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database")?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap_or(0);

        if version < SCHEMA_VERSION {
            self.conn.execute_batch(
                r#"
                -- One profile per identity
                CREATE TABLE IF NOT EXISTS profiles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    full_name TEXT,
                    phone TEXT,
                    role TEXT NOT NULL DEFAULT 'citizen',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS issues (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    category TEXT NOT NULL DEFAULT 'other',
                    status TEXT NOT NULL DEFAULT 'unresolved',
                    latitude REAL NOT NULL,
                    longitude REAL NOT NULL,
                    address TEXT,
                    ward TEXT,
                    photo_url TEXT,
                    before_photo_url TEXT,
                    after_photo_url TEXT,
                    upvotes INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    resolved_at TEXT,
                    FOREIGN KEY (user_id) REFERENCES profiles(id)
                );

                CREATE TABLE IF NOT EXISTS issue_votes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    issue_id INTEGER NOT NULL,
                    user_id INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (issue_id, user_id),
                    FOREIGN KEY (issue_id) REFERENCES issues(id) ON DELETE CASCADE,
                    FOREIGN KEY (user_id) REFERENCES profiles(id)
                );

                CREATE TABLE IF NOT EXISTS issue_comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    issue_id INTEGER NOT NULL,
                    user_id INTEGER NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (issue_id) REFERENCES issues(id) ON DELETE CASCADE,
                    FOREIGN KEY (user_id) REFERENCES profiles(id)
                );

                -- Audit trail of status transitions
                CREATE TABLE IF NOT EXISTS issue_updates (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    issue_id INTEGER NOT NULL,
                    user_id INTEGER NOT NULL,
                    old_status TEXT,
                    new_status TEXT NOT NULL,
                    comment TEXT,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (issue_id) REFERENCES issues(id) ON DELETE CASCADE,
                    FOREIGN KEY (user_id) REFERENCES profiles(id)
                );

                -- Daily snapshots, written by an external job
                CREATE TABLE IF NOT EXISTS issue_metrics (
                    date TEXT PRIMARY KEY,
                    total_issues INTEGER NOT NULL DEFAULT 0,
                    new_issues INTEGER NOT NULL DEFAULT 0,
                    resolved_issues INTEGER NOT NULL DEFAULT 0,
                    avg_resolution_hours REAL
                );

                CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
                CREATE INDEX IF NOT EXISTS idx_issues_category ON issues(category);
                CREATE INDEX IF NOT EXISTS idx_issues_user ON issues(user_id);
                CREATE INDEX IF NOT EXISTS idx_votes_issue ON issue_votes(issue_id);
                CREATE INDEX IF NOT EXISTS idx_comments_issue ON issue_comments(issue_id);
                CREATE INDEX IF NOT EXISTS idx_updates_issue ON issue_updates(issue_id);
                "#,
            )?;

            self.conn
                .execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
        }

        self.conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(())
    }

    // Profiles
    pub fn create_profile(&self, email: &str, full_name: Option<&str>, phone: Option<&str>) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO profiles (email, full_name, phone, role, created_at, updated_at) VALUES (?1, ?2, ?3, 'citizen', ?4, ?4)",
                params![email, full_name, phone, now],
            )
            .with_context(|| format!("Failed to create profile for {}", email))?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(profile_id = id, "profile created");
        Ok(id)
    }

    pub fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        let sql = format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS);
        let profile = self
            .conn
            .query_row(&sql, [id], profile_from_row)
            .optional()?;
        Ok(profile)
    }

    pub fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let sql = format!("SELECT {} FROM profiles WHERE email = ?1", PROFILE_COLUMNS);
        let profile = self
            .conn
            .query_row(&sql, [email], profile_from_row)
            .optional()?;
        Ok(profile)
    }

    /// Privileged: only backend operators change roles.
    pub fn set_role(&self, email: &str, role: Role) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE profiles SET role = ?1, updated_at = ?2 WHERE email = ?3",
            params![role, now, email],
        )?;
        if rows > 0 {
            tracing::info!(%role, "role assigned");
        }
        Ok(rows > 0)
    }

    pub fn update_profile(&self, id: i64, full_name: &str, phone: Option<&str>) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE profiles SET full_name = ?1, phone = ?2, updated_at = ?3 WHERE id = ?4",
            params![full_name, phone, now, id],
        )?;
        Ok(rows > 0)
    }

    // Issues
    pub fn create_issue(&self, user_id: i64, issue: &NewIssue) -> Result<i64> {
        self.create_issue_at(user_id, issue, Utc::now())
    }

    pub fn create_issue_at(&self, user_id: i64, issue: &NewIssue, created_at: DateTime<Utc>) -> Result<i64> {
        let ts = created_at.to_rfc3339();
        self.conn.execute(
            "INSERT INTO issues (user_id, title, description, category, status, latitude, longitude, address, ward, photo_url, before_photo_url, upvotes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 'unresolved', ?5, ?6, ?7, ?8, ?9, ?9, 0, ?10, ?10)",
            params![
                user_id,
                issue.title,
                issue.description,
                issue.category,
                issue.latitude,
                issue.longitude,
                issue.address,
                issue.ward,
                issue.photo_url,
                ts
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(issue_id = id, category = %issue.category, "issue created");
        Ok(id)
    }

    pub fn get_issue(&self, id: i64) -> Result<Option<Issue>> {
        let sql = format!("SELECT {} FROM issues i WHERE i.id = ?1", ISSUE_COLUMNS);
        let issue = self.conn.query_row(&sql, [id], issue_from_row).optional()?;
        Ok(issue)
    }

    pub fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let mut sql = format!("SELECT {} FROM issues i", ISSUE_COLUMNS);
        let mut conditions = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("i.status = ?".to_string());
            params_vec.push(Box::new(status));
        }

        if let Some(category) = filter.category {
            conditions.push("i.category = ?".to_string());
            params_vec.push(Box::new(category));
        }

        if let Some(ward) = &filter.ward {
            conditions.push("i.ward = ?".to_string());
            params_vec.push(Box::new(ward.clone()));
        }

        if let Some(user_id) = filter.user_id {
            conditions.push("i.user_id = ?".to_string());
            params_vec.push(Box::new(user_id));
        }

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push("(lower(i.title) LIKE ? OR lower(i.description) LIKE ?)".to_string());
            let pattern = format!("%{}%", search.to_lowercase());
            params_vec.push(Box::new(pattern.clone()));
            params_vec.push(Box::new(pattern));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        match filter.sort {
            IssueSort::Newest => sql.push_str(" ORDER BY i.created_at DESC, i.id DESC"),
            IssueSort::MostVoted => sql.push_str(" ORDER BY i.upvotes DESC, i.created_at DESC, i.id DESC"),
        }

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params_vec.push(Box::new(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let issues = stmt
            .query_map(params_refs.as_slice(), issue_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(issues)
    }

    /// Sets the status and, when resolving, the resolution timestamp; the audit row is written in
    /// the same transaction. Returns `None` when the issue does not exist.
    pub fn change_status(
        &self,
        issue_id: i64,
        actor_id: i64,
        new_status: Status,
        comment: Option<&str>,
        after_photo_url: Option<&str>,
    ) -> Result<Option<StatusUpdate>> {
        let tx = self.conn.unchecked_transaction()?;

        let old_status: Option<Status> = tx
            .query_row("SELECT status FROM issues WHERE id = ?1", [issue_id], |row| row.get(0))
            .optional()?;
        let Some(old_status) = old_status else {
            return Ok(None);
        };

        let now = Utc::now().to_rfc3339();
        let resolved_at = (new_status == Status::Resolved).then(|| now.clone());
        tx.execute(
            "UPDATE issues SET status = ?1, resolved_at = ?2, after_photo_url = COALESCE(?3, after_photo_url), updated_at = ?4 WHERE id = ?5",
            params![new_status, resolved_at, after_photo_url, now, issue_id],
        )?;
        tx.execute(
            "INSERT INTO issue_updates (issue_id, user_id, old_status, new_status, comment, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![issue_id, actor_id, old_status, new_status, comment, now],
        )?;
        let update_id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(issue_id, from = %old_status, to = %new_status, "status changed");

        Ok(Some(StatusUpdate {
            id: update_id,
            issue_id,
            user_id: actor_id,
            old_status: Some(old_status),
            new_status,
            comment: comment.map(str::to_string),
            created_at: parse_datetime(now),
            actor: None,
        }))
    }

    pub fn get_status_updates(&self, issue_id: i64) -> Result<Vec<StatusUpdate>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.issue_id, u.user_id, u.old_status, u.new_status, u.comment, u.created_at, COALESCE(p.full_name, p.email) \
             FROM issue_updates u LEFT JOIN profiles p ON p.id = u.user_id \
             WHERE u.issue_id = ?1 ORDER BY u.created_at DESC, u.id DESC",
        )?;
        let updates = stmt
            .query_map([issue_id], |row| {
                Ok(StatusUpdate {
                    id: row.get(0)?,
                    issue_id: row.get(1)?,
                    user_id: row.get(2)?,
                    old_status: row.get(3)?,
                    new_status: row.get(4)?,
                    comment: row.get(5)?,
                    created_at: parse_datetime(row.get::<_, String>(6)?),
                    actor: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(updates)
    }

    // Votes
    pub fn has_voted(&self, issue_id: i64, user_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM issue_votes WHERE issue_id = ?1 AND user_id = ?2",
            params![issue_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Adds the vote if absent, removes it if present, and moves the counter with it inside
    /// one transaction. Returns `None` when the issue does not exist.
    pub fn toggle_vote(&self, issue_id: i64, user_id: i64) -> Result<Option<VoteOutcome>> {
        let tx = self.conn.unchecked_transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM issues WHERE id = ?1", [issue_id], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let removed = tx.execute(
            "DELETE FROM issue_votes WHERE issue_id = ?1 AND user_id = ?2",
            params![issue_id, user_id],
        )?;
        let voted = if removed > 0 {
            tx.execute(
                "UPDATE issues SET upvotes = MAX(upvotes - 1, 0) WHERE id = ?1",
                [issue_id],
            )?;
            false
        } else {
            let now = Utc::now().to_rfc3339();
            tx.execute(
                "INSERT INTO issue_votes (issue_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![issue_id, user_id, now],
            )?;
            tx.execute("UPDATE issues SET upvotes = upvotes + 1 WHERE id = ?1", [issue_id])?;
            true
        };

        let upvotes: i64 = tx.query_row("SELECT upvotes FROM issues WHERE id = ?1", [issue_id], |row| row.get(0))?;
        tx.commit()?;

        tracing::info!(issue_id, voted, upvotes, "vote toggled");
        Ok(Some(VoteOutcome { voted, upvotes }))
    }

    /// The user's votes, most recent first.
    pub fn votes_by_user(&self, user_id: i64) -> Result<Vec<Vote>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, issue_id, user_id, created_at FROM issue_votes WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let votes = stmt
            .query_map([user_id], |row| {
                Ok(Vote {
                    id: row.get(0)?,
                    issue_id: row.get(1)?,
                    user_id: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(votes)
    }

    // Comments
    pub fn add_comment(&self, issue_id: i64, user_id: i64, content: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO issue_comments (issue_id, user_id, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
            params![issue_id, user_id, content, now],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(issue_id, comment_id = id, "comment posted");
        Ok(id)
    }

    pub fn get_comments(&self, issue_id: i64) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.issue_id, c.user_id, c.content, c.created_at, c.updated_at, COALESCE(p.full_name, p.email) \
             FROM issue_comments c LEFT JOIN profiles p ON p.id = c.user_id \
             WHERE c.issue_id = ?1 ORDER BY c.created_at, c.id",
        )?;
        let comments = stmt
            .query_map([issue_id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    issue_id: row.get(1)?,
                    user_id: row.get(2)?,
                    content: row.get(3)?,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                    updated_at: parse_datetime(row.get::<_, String>(5)?),
                    author: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    // Metrics
    pub fn upsert_metric_snapshot(&self, snapshot: &MetricSnapshot) -> Result<()> {
        self.conn.execute(
            "INSERT INTO issue_metrics (date, total_issues, new_issues, resolved_issues, avg_resolution_hours) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(date) DO UPDATE SET total_issues = excluded.total_issues, new_issues = excluded.new_issues, \
             resolved_issues = excluded.resolved_issues, avg_resolution_hours = excluded.avg_resolution_hours",
            params![
                snapshot.date.format("%Y-%m-%d").to_string(),
                snapshot.total_issues,
                snapshot.new_issues,
                snapshot.resolved_issues,
                snapshot.avg_resolution_hours
            ],
        )?;
        Ok(())
    }

    /// Snapshots dated `start..=end`, oldest first.
    pub fn metrics_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<MetricSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, total_issues, new_issues, resolved_issues, avg_resolution_hours FROM issue_metrics \
             WHERE date >= ?1 AND date <= ?2 ORDER BY date",
        )?;
        let rows = stmt
            .query_map(
                params![start.format("%Y-%m-%d").to_string(), end.format("%Y-%m-%d").to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(date, total_issues, new_issues, resolved_issues, avg_resolution_hours)| {
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .with_context(|| format!("Bad metric date '{}'", date))?;
                Ok(MetricSnapshot {
                    date,
                    total_issues,
                    new_issues,
                    resolved_issues,
                    avg_resolution_hours,
                })
            })
            .collect()
    }

    // Consistency checks
    pub fn reconcile_upvotes(&self, apply: bool) -> Result<Vec<UpvoteDrift>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, upvotes, counted FROM ( \
                SELECT i.id, i.upvotes, (SELECT COUNT(*) FROM issue_votes v WHERE v.issue_id = i.id) AS counted FROM issues i \
             ) WHERE upvotes != counted ORDER BY id",
        )?;
        let drift = stmt
            .query_map([], |row| {
                Ok(UpvoteDrift {
                    issue_id: row.get(0)?,
                    stored: row.get(1)?,
                    counted: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if apply && !drift.is_empty() {
            let tx = self.conn.unchecked_transaction()?;
            for d in &drift {
                tx.execute(
                    "UPDATE issues SET upvotes = ?1 WHERE id = ?2",
                    params![d.counted, d.issue_id],
                )?;
            }
            tx.commit()?;
            tracing::warn!(fixed = drift.len(), "upvote counters recounted");
        }

        Ok(drift)
    }

    /// Issues whose current status was never recorded in the audit trail.
    pub fn audit_gaps(&self) -> Result<Vec<Issue>> {
        let sql = format!(
            "SELECT {} FROM issues i WHERE i.status != 'unresolved' AND NOT EXISTS ( \
                SELECT 1 FROM issue_updates u WHERE u.issue_id = i.id AND u.new_status = i.status \
             ) ORDER BY i.id",
            ISSUE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let issues = stmt
            .query_map([], issue_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(issues)
    }
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        status: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        address: row.get(8)?,
        ward: row.get(9)?,
        photo_url: row.get(10)?,
        before_photo_url: row.get(11)?,
        after_photo_url: row.get(12)?,
        upvotes: row.get(13)?,
        created_at: parse_datetime(row.get::<_, String>(14)?),
        updated_at: parse_datetime(row.get::<_, String>(15)?),
        resolved_at: row.get::<_, Option<String>>(16)?.map(parse_datetime),
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        phone: row.get(3)?,
        role: row.get(4)?,
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::Category;

    pub fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        (db, dir)
    }

    pub fn new_issue(title: &str) -> NewIssue {
        NewIssue {
            title: title.to_string(),
            description: format!("{} description", title),
            category: Category::RoadMaintenance,
            latitude: 12.97,
            longitude: 77.59,
            address: None,
            ward: Some("Ward 1".to_string()),
            photo_url: None,
        }
    }
}
