//! Post directory: the minimal post records comments hang off.
//!
//! Callers may reference a post by opaque id or by slug; every resolver
//! returns the full [`Post`] so the stored `post_id` is always the opaque id.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::db::query;
use crate::error::{Error, FieldError, Resource, Result};
use crate::model::post::{Post, PostId, PostStatus};

const MAX_SLUG_LEN: usize = 100;
const MAX_TITLE_LEN: usize = 300;

/// Register a new post.
///
/// # Errors
///
/// [`Error::Validation`] for a malformed or already-taken slug or an empty
/// title; [`Error::Storage`] if the insert fails.
pub fn create_post(
    conn: &Connection,
    slug: &str,
    title: &str,
    status: PostStatus,
    now: DateTime<Utc>,
) -> Result<Post> {
    let slug = slug.trim();
    let title = title.trim();

    let mut problems = Vec::new();
    if let Err(reason) = check_slug(slug) {
        problems.push(FieldError::new("slug", reason));
    }
    if title.is_empty() {
        problems.push(FieldError::new("title", "must not be empty"));
    } else if title.chars().count() > MAX_TITLE_LEN {
        problems.push(FieldError::new(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    if problems.is_empty() && query::get_post_by_slug(conn, slug)?.is_some() {
        problems.push(FieldError::new("slug", "is already taken"));
    }
    if !problems.is_empty() {
        return Err(Error::Validation(problems));
    }

    let post = Post {
        id: PostId::derive(slug, now),
        slug: slug.to_string(),
        title: title.to_string(),
        status,
        created_at: now,
        updated_at: now,
    };
    query::insert_post(conn, &post)?;
    info!(post = %post.id, slug = %post.slug, status = %post.status, "post created");
    Ok(post)
}

fn check_slug(slug: &str) -> std::result::Result<(), String> {
    if slug.is_empty() {
        return Err("must not be empty".to_string());
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(format!("must be at most {MAX_SLUG_LEN} characters"));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("may only contain lowercase letters, digits, and '-'".to_string());
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err("must not start or end with '-'".to_string());
    }
    if PostId::looks_like_id(slug) {
        return Err("must not look like a post id (p-<12 hex>)".to_string());
    }
    Ok(())
}

/// Resolve an id or slug to a post in any status.
///
/// # Errors
///
/// [`Error::NotFound`] when nothing matches.
pub fn resolve_post(conn: &Connection, reference: &str) -> Result<Post> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(Error::invalid("post", "must not be empty"));
    }

    let by_id = if PostId::looks_like_id(reference) {
        query::get_post_by_id(conn, reference)?
    } else {
        None
    };
    let found = match by_id {
        Some(post) => Some(post),
        None => query::get_post_by_slug(conn, reference)?,
    };
    found.ok_or_else(|| Error::not_found(Resource::Post, reference))
}

/// Fetch a post by its opaque id.
///
/// # Errors
///
/// [`Error::NotFound`] when the id is unknown.
pub fn get_post(conn: &Connection, id: &PostId) -> Result<Post> {
    query::get_post_by_id(conn, id.as_str())?.ok_or_else(|| Error::not_found(Resource::Post, id))
}

/// Resolve a post whose comments the public may read. Drafts do not exist
/// as far as readers are concerned.
///
/// # Errors
///
/// [`Error::NotFound`] for unknown and draft posts.
pub fn resolve_public(conn: &Connection, reference: &str) -> Result<Post> {
    let post = resolve_post(conn, reference)?;
    if post.status.is_public() {
        Ok(post)
    } else {
        Err(Error::not_found(Resource::Post, reference.trim()))
    }
}

/// Resolve a post that currently accepts new comments.
///
/// # Errors
///
/// [`Error::NotFound`] for unknown and draft posts, [`Error::CommentsClosed`]
/// for archived ones.
pub fn resolve_open(conn: &Connection, reference: &str) -> Result<Post> {
    let post = resolve_public(conn, reference)?;
    if post.status.accepts_comments() {
        Ok(post)
    } else {
        Err(Error::CommentsClosed(post.slug))
    }
}

/// List every post, newest first.
///
/// # Errors
///
/// [`Error::Storage`] if the query fails.
pub fn list_posts(conn: &Connection) -> Result<Vec<Post>> {
    Ok(query::list_posts(conn)?)
}

/// Change a post's publication status.
///
/// # Errors
///
/// [`Error::NotFound`] for an unknown reference, [`Error::Storage`] if the
/// update fails.
pub fn set_post_status(
    conn: &Connection,
    reference: &str,
    status: PostStatus,
    now: DateTime<Utc>,
) -> Result<Post> {
    let mut post = resolve_post(conn, reference)?;
    if post.status == status {
        return Ok(post);
    }
    if !query::set_post_status(conn, &post.id, status, now)? {
        return Err(Error::not_found(Resource::Post, &post.id));
    }
    info!(post = %post.id, from = %post.status, to = %status, "post status changed");
    post.status = status;
    post.updated_at = now;
    Ok(post)
}
