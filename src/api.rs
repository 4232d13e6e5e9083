//! JSON write endpoints.
//!
//! Each endpoint takes a JSON body and the caller's [`Session`], validates required fields
//! before touching the store, and answers with `{success, error?, data?}` plus a status code:
//! 400 for bad input, 401/403 for auth, 404 for a missing issue, 500 for store failures.
//! Failures are terminal; nothing is retried.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::auth::Session;
use crate::db::Database;
use crate::geocode::Coordinates;
use crate::models::{Category, Issue, NewIssue, Profile, Status, StatusUpdate, VoteOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid JSON body: {0}")]
    MalformedBody(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Unknown endpoint '{0}'")]
    UnknownEndpoint(String),
    #[error("You must be signed in")]
    Unauthenticated,
    #[error("Only moderators and admins can do this")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Backend request failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::MalformedBody(_)
            | ApiError::MissingField(_)
            | ApiError::InvalidField { .. } => 400,
            ApiError::Unauthenticated => 401,
            ApiError::Forbidden => 403,
            ApiError::NotFound(_) | ApiError::UnknownEndpoint(_) => 404,
            ApiError::Backend(_) => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn ok<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => ApiResponse {
                success: true,
                error: None,
                data: Some(value),
            },
            Err(e) => ApiResponse::failure(&ApiError::Backend(e.into())),
        }
    }

    pub fn failure(err: &ApiError) -> Self {
        ApiResponse {
            success: false,
            error: Some(err.to_string()),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    CreateIssue,
    ToggleVote,
    ChangeStatus,
    PostComment,
    UpdateProfile,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::CreateIssue,
        Endpoint::ToggleVote,
        Endpoint::ChangeStatus,
        Endpoint::PostComment,
        Endpoint::UpdateProfile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::CreateIssue => "create-issue",
            Endpoint::ToggleVote => "toggle-vote",
            Endpoint::ChangeStatus => "change-status",
            Endpoint::PostComment => "post-comment",
            Endpoint::UpdateProfile => "update-profile",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| ApiError::UnknownEndpoint(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub ward: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteRequest {
    pub issue_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub issue_id: Option<i64>,
    pub status: Option<String>,
    pub comment: Option<String>,
    pub after_photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentRequest {
    pub issue_id: Option<i64>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdateRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentCreated {
    pub id: i64,
    pub issue_id: i64,
    pub content: String,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ApiError> {
    value.ok_or(ApiError::MissingField(field))
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, ApiError> {
    let text = required(value, field)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApiError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_field<T: FromStr<Err = String>>(raw: &str, field: &'static str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|reason| ApiError::InvalidField { field, reason })
}

fn signed_in(session: Option<&Session>) -> Result<&Session, ApiError> {
    session.ok_or(ApiError::Unauthenticated)
}

fn staff(session: Option<&Session>) -> Result<&Session, ApiError> {
    let session = signed_in(session)?;
    if !session.is_staff() {
        return Err(ApiError::Forbidden);
    }
    Ok(session)
}

fn issue_exists(db: &Database, issue_id: i64) -> Result<(), ApiError> {
    match db.get_issue(issue_id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("Issue #{}", issue_id))),
    }
}

/// Citizen submission. Status always starts as unresolved.
pub fn create_issue(
    db: &Database,
    session: Option<&Session>,
    req: CreateIssueRequest,
) -> Result<Issue, ApiError> {
    let session = signed_in(session)?;
    let title = required_text(req.title, "title")?;
    let description = required_text(req.description, "description")?;
    let category: Category = parse_field(&required_text(req.category, "category")?, "category")?;
    let latitude = required(req.latitude, "latitude")?;
    let longitude = required(req.longitude, "longitude")?;
    let at = Coordinates::new(latitude, longitude).map_err(|e| ApiError::InvalidField {
        field: "location",
        reason: e.to_string(),
    })?;

    let new_issue = NewIssue {
        title,
        description,
        category,
        latitude: at.latitude,
        longitude: at.longitude,
        address: optional_text(req.address),
        ward: optional_text(req.ward),
        photo_url: optional_text(req.photo_url),
    };

    let id = db.create_issue(session.user_id, &new_issue)?;
    db.get_issue(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Issue #{}", id)))
}

pub fn toggle_vote(
    db: &Database,
    session: Option<&Session>,
    req: VoteRequest,
) -> Result<VoteOutcome, ApiError> {
    let session = signed_in(session)?;
    let issue_id = required(req.issue_id, "issue_id")?;
    db.toggle_vote(issue_id, session.user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Issue #{}", issue_id)))
}

/// Staff only. Status and audit row are written together.
pub fn change_status(
    db: &Database,
    session: Option<&Session>,
    req: StatusChangeRequest,
) -> Result<StatusUpdate, ApiError> {
    let session = staff(session)?;
    let issue_id = required(req.issue_id, "issue_id")?;
    let status: Status = parse_field(&required_text(req.status, "status")?, "status")?;
    let comment = optional_text(req.comment);
    let after_photo = optional_text(req.after_photo_url);

    db.change_status(
        issue_id,
        session.user_id,
        status,
        comment.as_deref(),
        after_photo.as_deref(),
    )?
    .ok_or_else(|| ApiError::NotFound(format!("Issue #{}", issue_id)))
}

pub fn post_comment(
    db: &Database,
    session: Option<&Session>,
    req: CommentRequest,
) -> Result<CommentCreated, ApiError> {
    let session = signed_in(session)?;
    let issue_id = required(req.issue_id, "issue_id")?;
    let content = required_text(req.content, "content")?;
    issue_exists(db, issue_id)?;

    let id = db.add_comment(issue_id, session.user_id, &content)?;
    Ok(CommentCreated {
        id,
        issue_id,
        content,
    })
}

/// Updates name and phone on the caller's own profile; nothing else is writable.
pub fn update_profile(
    db: &Database,
    session: Option<&Session>,
    req: ProfileUpdateRequest,
) -> Result<Profile, ApiError> {
    let session = signed_in(session)?;
    let full_name = required_text(req.full_name, "full_name")?;
    let phone = optional_text(req.phone);

    if !db.update_profile(session.user_id, &full_name, phone.as_deref())? {
        return Err(ApiError::NotFound("Profile".to_string()));
    }
    db.get_profile(session.user_id)?
        .ok_or_else(|| ApiError::NotFound("Profile".to_string()))
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let body = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

fn run_endpoint(
    db: &Database,
    session: Option<&Session>,
    endpoint: Endpoint,
    body: &str,
) -> Result<Value, ApiError> {
    fn json<T: Serialize>(v: T) -> Result<Value, ApiError> {
        serde_json::to_value(v).map_err(|e| ApiError::Backend(e.into()))
    }

    match endpoint {
        Endpoint::CreateIssue => json(create_issue(db, session, parse_body(body)?)?),
        Endpoint::ToggleVote => json(toggle_vote(db, session, parse_body(body)?)?),
        Endpoint::ChangeStatus => json(change_status(db, session, parse_body(body)?)?),
        Endpoint::PostComment => json(post_comment(db, session, parse_body(body)?)?),
        Endpoint::UpdateProfile => json(update_profile(db, session, parse_body(body)?)?),
    }
}

/// Routes a raw JSON body to `endpoint` and returns the status code with the response body.
pub fn dispatch(
    db: &Database,
    session: Option<&Session>,
    endpoint: &str,
    body: &str,
) -> (u16, ApiResponse) {
    let result = endpoint
        .parse::<Endpoint>()
        .and_then(|ep| run_endpoint(db, session, ep, body));

    match result {
        Ok(data) => {
            tracing::info!(endpoint, "request succeeded");
            (
                200,
                ApiResponse {
                    success: true,
                    error: None,
                    data: Some(data),
                },
            )
        }
        Err(err) => {
            let status = err.status();
            if status >= 500 {
                tracing::error!(endpoint, status, error = %err, "request failed");
            } else {
                tracing::warn!(endpoint, status, error = %err, "request rejected");
            }
            (status, ApiResponse::failure(&err))
        }
    }
}
