//! Comment submission.
//!
//! Input is validated in full before the store is touched, so a rejected
//! submission lists every offending field at once. The post and parent
//! checks and the `INSERT ... RETURNING` run under one write lock, so a
//! parent cannot vanish between the check and the insert.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Deserialize;
use tracing::info;

use crate::db::query;
use crate::error::{Error, FieldError, Resource, Result};
use crate::identity::Identity;
use crate::model::comment::{Comment, CommentId, CommentState, NewComment};
use crate::posts;

pub const MAX_AUTHOR_NAME_LEN: usize = 100;
pub const MAX_CONTENT_LEN: usize = 8192;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_URL_LEN: usize = 2048;

/// A comment or reply as submitted by a reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubmitRequest {
    /// Post id or slug.
    pub post: String,
    pub parent_id: Option<CommentId>,
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_url: Option<String>,
    pub content: String,
}

/// Normalized, validated submission fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFields {
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_url: Option<String>,
    pub content: String,
}

/// Check every field of `req`, collecting all problems.
///
/// # Errors
///
/// [`Error::Validation`] naming each offending field.
pub fn validate(req: &SubmitRequest) -> Result<ValidFields> {
    let mut problems = Vec::new();

    if req.post.trim().is_empty() {
        problems.push(FieldError::new("post", "must not be empty"));
    }

    let author_name = req.author_name.trim();
    if author_name.is_empty() {
        problems.push(FieldError::new("author_name", "must not be empty"));
    } else if author_name.chars().count() > MAX_AUTHOR_NAME_LEN {
        problems.push(too_long("author_name", MAX_AUTHOR_NAME_LEN));
    } else if author_name.chars().any(char::is_control) {
        problems.push(FieldError::new(
            "author_name",
            "must not contain control characters",
        ));
    }

    let content = req.content.replace("\r\n", "\n");
    let content = content.trim();
    if content.is_empty() {
        problems.push(FieldError::new("content", "must not be empty"));
    } else if content.chars().count() > MAX_CONTENT_LEN {
        problems.push(too_long("content", MAX_CONTENT_LEN));
    } else if content
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\t')
    {
        problems.push(FieldError::new(
            "content",
            "must not contain control characters other than newline and tab",
        ));
    }

    let author_email = optional(req.author_email.as_deref());
    if let Some(email) = author_email {
        if email.chars().count() > MAX_EMAIL_LEN {
            problems.push(too_long("author_email", MAX_EMAIL_LEN));
        } else if !is_valid_email(email) {
            problems.push(FieldError::new(
                "author_email",
                "must be a valid email address",
            ));
        }
    }

    let author_url = optional(req.author_url.as_deref());
    if let Some(url) = author_url {
        if url.chars().count() > MAX_URL_LEN {
            problems.push(too_long("author_url", MAX_URL_LEN));
        } else if url.chars().any(|c| c.is_control() || c.is_whitespace()) {
            problems.push(FieldError::new(
                "author_url",
                "must not contain whitespace or control characters",
            ));
        }
    }

    if !problems.is_empty() {
        return Err(Error::Validation(problems));
    }

    Ok(ValidFields {
        author_name: author_name.to_string(),
        author_email: author_email.map(str::to_string),
        author_url: author_url.map(str::to_string),
        content: content.to_string(),
    })
}

fn optional(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

fn too_long(field: &'static str, max: usize) -> FieldError {
    FieldError::new(field, format!("must be at most {max} characters"))
}

/// Syntactic check: `local@domain.tld`, no whitespace, no empty labels.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || local.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

/// Accept a new comment or reply.
///
/// Authenticated submitters are approved immediately; anonymous ones wait in
/// the moderation queue.
///
/// # Errors
///
/// - [`Error::Validation`] for bad input (checked before any lookup)
/// - [`Error::NotFound`] for an unknown or draft post, or unknown parent
/// - [`Error::CommentsClosed`] when the post is archived
/// - [`Error::InvalidReference`] when the parent is on another post or is
///   spam or deleted
/// - [`Error::Storage`] if the store fails
pub fn submit(
    conn: &Connection,
    req: &SubmitRequest,
    identity: &Identity,
    now: DateTime<Utc>,
) -> Result<Comment> {
    let fields = validate(req)?;

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .context("begin submit transaction")?;
    let post = posts::resolve_open(&tx, &req.post)?;

    if let Some(parent_id) = req.parent_id {
        let parent = query::get_comment(&tx, parent_id)?
            .ok_or_else(|| Error::not_found(Resource::ParentComment, parent_id))?;
        if parent.post_id != post.id {
            return Err(Error::InvalidReference(format!(
                "parent comment {parent_id} belongs to a different post"
            )));
        }
        if !parent.state.accepts_replies() {
            return Err(Error::InvalidReference(format!(
                "parent comment {parent_id} is {}",
                parent.state
            )));
        }
    }

    let new = NewComment {
        post_id: post.id,
        parent_id: req.parent_id,
        author_name: fields.author_name,
        author_email: fields.author_email,
        author_url: fields.author_url,
        content: fields.content,
        state: CommentState::initial_for(identity),
        submitter: identity.account().cloned(),
        created_at: now,
    };
    let comment = query::insert_comment(&tx, &new)?;
    tx.commit().context("commit submit transaction")?;

    info!(
        comment = %comment.id,
        post = %comment.post_id,
        parent = ?comment.parent_id.map(|p| p.0),
        state = %comment.state,
        "comment submitted"
    );
    Ok(comment)
}
