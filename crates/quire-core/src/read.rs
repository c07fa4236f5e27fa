//! Public read path.

use rusqlite::Connection;
use tracing::debug;

use crate::db::query::{self, CommentFilter};
use crate::error::Result;
use crate::model::comment::{Comment, CommentState};
use crate::model::post::PostId;
use crate::posts;
use crate::tree::{Forest, assemble};

/// Approved comments of a post, assembled into a reply tree.
///
/// Contact emails are stripped. A post with no approved comments yields an
/// empty forest rather than an error.
///
/// # Errors
///
/// [`crate::Error::NotFound`] when the reference does not resolve or the post
/// is a draft; [`crate::Error::Storage`] if the query fails.
pub fn read_comments(conn: &Connection, post_ref: &str) -> Result<Forest> {
    let post = posts::resolve_public(conn, post_ref)?;
    let approved: Vec<Comment> = query::list_comments(
        conn,
        &CommentFilter {
            post_id: Some(post.id.clone()),
            state: Some(CommentState::Approved),
            ..CommentFilter::default()
        },
    )?
    .into_iter()
    .map(Comment::public_view)
    .collect();

    let forest = assemble(&approved);
    debug!(
        post = %post.id,
        approved = approved.len(),
        roots = forest.roots.len(),
        orphans = forest.orphans.len(),
        "comments read"
    );
    Ok(forest)
}

/// Number of approved comments on a post.
///
/// # Errors
///
/// [`crate::Error::Storage`] if the query fails.
pub fn count_approved(conn: &Connection, post_id: &PostId) -> Result<usize> {
    Ok(query::count_comments(conn, post_id, CommentState::Approved)?)
}
