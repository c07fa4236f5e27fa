//! `SQLite` query helpers for the comment store.
//!
//! Every function takes a shared `&Connection` and returns
//! `anyhow::Result<T>` with typed records (never raw rows). Domain rules
//! (resolution, validation, lifecycle) live one layer up.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter, types::Type};
use std::str::FromStr;

use crate::identity::AccountId;
use crate::model::comment::{Comment, CommentId, CommentState, NewComment};
use crate::model::post::{Post, PostId, PostStatus};

// ---------------------------------------------------------------------------
// Column conversions
// ---------------------------------------------------------------------------

const COMMENT_COLUMNS: &str = "comment_id, post_id, parent_id, author_name, author_email, \
     author_url, content, state, submitter, created_at_us, updated_at_us";

const POST_COLUMNS: &str = "post_id, slug, title, status, created_at_us, updated_at_us";

pub(crate) const fn micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let us: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp_micros(us)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, us))
}

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: CommentId(row.get(0)?),
        post_id: PostId::new(row.get::<_, String>(1)?),
        parent_id: row.get::<_, Option<i64>>(2)?.map(CommentId),
        author_name: row.get(3)?,
        author_email: row.get(4)?,
        author_url: row.get(5)?,
        content: row.get(6)?,
        state: parsed(row, 7)?,
        submitter: row.get::<_, Option<String>>(8)?.map(AccountId::new),
        created_at: timestamp(row, 9)?,
        updated_at: timestamp(row, 10)?,
    })
}

fn row_to_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId::new(row.get::<_, String>(0)?),
        slug: row.get(1)?,
        title: row.get(2)?,
        status: parsed(row, 3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
    })
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Filter criteria for comment listings, combined with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub post_id: Option<PostId>,
    pub state: Option<CommentState>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Fetch a single comment by id, in any state.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_comment(conn: &Connection, id: CommentId) -> Result<Option<Comment>> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE comment_id = ?1");
    conn.query_row(&sql, params![id.0], row_to_comment)
        .optional()
        .with_context(|| format!("get_comment {id}"))
}

/// Insert a validated comment and return the stored record.
///
/// # Errors
///
/// Returns an error if the insert violates a constraint or the database
/// query fails.
pub fn insert_comment(conn: &Connection, new: &NewComment) -> Result<Comment> {
    let sql = format!(
        "INSERT INTO comments (post_id, parent_id, author_name, author_email, author_url, \
         content, state, submitter, created_at_us, updated_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
         RETURNING {COMMENT_COLUMNS}"
    );
    conn.query_row(
        &sql,
        params![
            new.post_id.as_str(),
            new.parent_id.map(|p| p.0),
            new.author_name,
            new.author_email,
            new.author_url,
            new.content,
            new.state.as_str(),
            new.submitter.as_ref().map(AccountId::as_str),
            micros(new.created_at),
        ],
        row_to_comment,
    )
    .with_context(|| format!("insert comment on post {}", new.post_id))
}

/// List comments matching `filter`, oldest first (`created_at`, then id).
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_comments(conn: &Connection, filter: &CommentFilter) -> Result<Vec<Comment>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<String> = Vec::new();

    if let Some(post_id) = &filter.post_id {
        param_values.push(post_id.as_str().to_string());
        conditions.push(format!("post_id = ?{}", param_values.len()));
    }

    if let Some(state) = filter.state {
        param_values.push(state.as_str().to_string());
        conditions.push(format!("state = ?{}", param_values.len()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let limit_clause = match (filter.limit, filter.offset) {
        (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
        (Some(limit), None) => format!(" LIMIT {limit}"),
        (None, Some(offset)) => format!(" LIMIT -1 OFFSET {offset}"),
        (None, None) => String::new(),
    };

    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments{where_clause} \
         ORDER BY created_at_us ASC, comment_id ASC{limit_clause}"
    );

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare list_comments query: {sql}"))?;

    let rows = stmt
        .query_map(params_from_iter(param_values.iter()), row_to_comment)
        .context("execute list_comments query")?;

    let mut comments = Vec::new();
    for row in rows {
        comments.push(row.context("read list_comments row")?);
    }
    Ok(comments)
}

/// Ids of the direct replies to `parent`, oldest first, in any state.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn child_ids(conn: &Connection, parent: CommentId) -> Result<Vec<CommentId>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT comment_id FROM comments WHERE parent_id = ?1 \
             ORDER BY created_at_us ASC, comment_id ASC",
        )
        .context("prepare child_ids query")?;

    let rows = stmt
        .query_map(params![parent.0], |row| row.get::<_, i64>(0))
        .with_context(|| format!("execute child_ids for {parent}"))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(CommentId(row.context("read child_ids row")?));
    }
    Ok(ids)
}

/// Move a comment from `from` to `to` and refresh `updated_at`.
///
/// The write only lands while the stored state still equals `from`.
/// Returns `false` when the row is gone or another writer moved it first.
///
/// # Errors
///
/// Returns an error if the database update fails.
pub fn set_comment_state(
    conn: &Connection,
    id: CommentId,
    from: CommentState,
    to: CommentState,
    now: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE comments SET state = ?1, updated_at_us = ?2 \
             WHERE comment_id = ?3 AND state = ?4",
            params![to.as_str(), micros(now), id.0, from.as_str()],
        )
        .with_context(|| format!("set state of comment {id} from {from} to {to}"))?;
    Ok(changed > 0)
}

/// Delete the given comment rows. Returns the number of rows removed.
///
/// # Errors
///
/// Returns an error if any delete fails.
pub fn delete_comment_rows(conn: &Connection, ids: &[CommentId]) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached("DELETE FROM comments WHERE comment_id = ?1")
        .context("prepare delete_comment_rows")?;

    let mut removed = 0;
    for id in ids {
        removed += stmt
            .execute(params![id.0])
            .with_context(|| format!("delete comment {id}"))?;
    }
    Ok(removed)
}

/// Count comments on a post in the given state.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_comments(conn: &Connection, post_id: &PostId, state: CommentState) -> Result<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1 AND state = ?2",
            params![post_id.as_str(), state.as_str()],
            |row| row.get(0),
        )
        .with_context(|| format!("count {state} comments on {post_id}"))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// Fetch a post by exact opaque id.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_post_by_id(conn: &Connection, id: &str) -> Result<Option<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE post_id = ?1");
    conn.query_row(&sql, params![id], row_to_post)
        .optional()
        .with_context(|| format!("get_post_by_id '{id}'"))
}

/// Fetch a post by slug.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_post_by_slug(conn: &Connection, slug: &str) -> Result<Option<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = ?1");
    conn.query_row(&sql, params![slug], row_to_post)
        .optional()
        .with_context(|| format!("get_post_by_slug '{slug}'"))
}

/// Insert a post row.
///
/// # Errors
///
/// Returns an error if the insert violates a constraint (duplicate id or
/// slug) or the database query fails.
pub fn insert_post(conn: &Connection, post: &Post) -> Result<()> {
    conn.execute(
        "INSERT INTO posts (post_id, slug, title, status, created_at_us, updated_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            post.id.as_str(),
            post.slug,
            post.title,
            post.status.as_str(),
            micros(post.created_at),
            micros(post.updated_at),
        ],
    )
    .with_context(|| format!("insert post '{}'", post.slug))?;
    Ok(())
}

/// List every post, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_posts(conn: &Connection) -> Result<Vec<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at_us DESC, post_id ASC");
    let mut stmt = conn.prepare(&sql).context("prepare list_posts query")?;
    let rows = stmt
        .query_map([], row_to_post)
        .context("execute list_posts query")?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row.context("read list_posts row")?);
    }
    Ok(posts)
}

/// Set a post's status. Returns `false` when no row matched.
///
/// # Errors
///
/// Returns an error if the database update fails.
pub fn set_post_status(
    conn: &Connection,
    id: &PostId,
    status: PostStatus,
    now: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE posts SET status = ?1, updated_at_us = ?2 WHERE post_id = ?3",
            params![status.as_str(), micros(now), id.as_str()],
        )
        .with_context(|| format!("set status of post {id} to {status}"))?;
    Ok(changed > 0)
}
