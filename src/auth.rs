use anyhow::Result;
use serde::Serialize;
use std::fmt;

use crate::db::Database;
use crate::models::Role;

/// The authenticated caller, passed explicitly into every handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
}

impl Session {
    /// Looks up the profile behind `email`. `None` means an anonymous caller.
    pub fn resolve(db: &Database, email: Option<&str>) -> Result<Option<Session>> {
        let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
            return Ok(None);
        };
        let session = db.get_profile_by_email(email)?.map(|p| Session {
            user_id: p.id,
            email: p.email,
            full_name: p.full_name,
            role: p.role,
        });
        if session.is_none() {
            tracing::warn!("no profile for session identity; continuing anonymously");
        }
        Ok(session)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    AdminLogin,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/auth/login",
            Route::AdminLogin => "/auth/admin",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A guard rejected the caller; nothing past the guard runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Redirect {
    #[error("Sign in required (redirect to {0})")]
    SignIn(Route),
    #[error("Staff access required (redirect to {0})")]
    NotStaff(Route),
}

impl Redirect {
    pub fn target(&self) -> Route {
        match self {
            Redirect::SignIn(route) | Redirect::NotStaff(route) => *route,
        }
    }
}

pub fn require_user(session: Option<&Session>, login: Route) -> Result<&Session, Redirect> {
    session.ok_or(Redirect::SignIn(login))
}

/// Moderators and admins pass; citizens go home, anonymous callers go to `login`.
pub fn require_staff(session: Option<&Session>, login: Route) -> Result<&Session, Redirect> {
    let session = require_user(session, login)?;
    if !session.is_staff() {
        tracing::warn!(role = %session.role, "staff page refused");
        return Err(Redirect::NotStaff(Route::Home));
    }
    Ok(session)
}
