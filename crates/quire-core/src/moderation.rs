//! Moderator operations on stored comments.
//!
//! Every entry point takes a [`Moderator`], which can only be obtained from
//! [`crate::identity::Identity::require_moderator`]. State changes go
//! through [`CommentState::transition`]; reply cascades walk the
//! `parent_id` chain explicitly instead of relying on the schema.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};

use crate::db::query::{self, CommentFilter};
use crate::error::{Error, Resource, Result};
use crate::identity::Moderator;
use crate::model::comment::{Comment, CommentId, CommentState, ModerationAction, Transition};
use crate::posts;
use crate::tree::assemble;

/// Page size used when a queue request names none.
pub const DEFAULT_QUEUE_LIMIT: u32 = 50;
/// Largest page a queue request may ask for.
pub const MAX_QUEUE_LIMIT: u32 = 500;

/// Result of a cascading operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub root: CommentId,
    /// Rows the operation changed, root first, then breadth-first.
    pub affected: Vec<CommentId>,
}

/// Moderation queue selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueFilter {
    /// Defaults to [`CommentState::Pending`].
    pub state: Option<CommentState>,
    /// Post id or slug.
    pub post: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

fn load(conn: &Connection, id: CommentId) -> Result<Comment> {
    query::get_comment(conn, id)?.ok_or_else(|| Error::not_found(Resource::Comment, id))
}

fn apply(
    conn: &Connection,
    moderator: &Moderator,
    id: CommentId,
    action: ModerationAction,
    now: DateTime<Utc>,
) -> Result<Comment> {
    let comment = load(conn, id)?;
    settle(conn, moderator, comment, action, now)
}

/// Apply `action` starting from a loaded snapshot. When another writer
/// moved the row since it was read, reload and decide again from the
/// stored state. States only move forward, so the loop ends.
fn settle(
    conn: &Connection,
    moderator: &Moderator,
    mut comment: Comment,
    action: ModerationAction,
    now: DateTime<Utc>,
) -> Result<Comment> {
    loop {
        let to = match comment.state.transition(action)? {
            Transition::Unchanged => {
                debug!(comment = %comment.id, state = %comment.state, %action, "moderation no-op");
                return Ok(comment);
            }
            Transition::Changed(to) => to,
        };

        if query::set_comment_state(conn, comment.id, comment.state, to, now)? {
            info!(
                comment = %comment.id,
                moderator = %moderator.account(),
                from = %comment.state,
                %to,
                "comment moderated"
            );
            comment.state = to;
            comment.updated_at = now;
            return Ok(comment);
        }

        debug!(comment = %comment.id, %action, "state changed concurrently, re-evaluating");
        comment = load(conn, comment.id)?;
    }
}

/// Approve a pending comment. Approving an approved comment succeeds
/// without change.
///
/// # Errors
///
/// [`Error::NotFound`] for an unknown id, [`Error::InvalidTransition`] for
/// spam or deleted comments.
pub fn approve(
    conn: &Connection,
    moderator: &Moderator,
    id: CommentId,
    now: DateTime<Utc>,
) -> Result<Comment> {
    apply(conn, moderator, id, ModerationAction::Approve, now)
}

/// Mark a comment as spam.
///
/// # Errors
///
/// [`Error::NotFound`] for an unknown id, [`Error::InvalidTransition`] for
/// deleted comments.
pub fn mark_spam(
    conn: &Connection,
    moderator: &Moderator,
    id: CommentId,
    now: DateTime<Utc>,
) -> Result<Comment> {
    apply(conn, moderator, id, ModerationAction::MarkSpam, now)
}

/// Ids of a comment and all of its descendants, breadth-first, root first.
///
/// Replies in any state are followed. A visited set guards against
/// corrupted `parent_id` cycles.
///
/// # Errors
///
/// [`Error::NotFound`] if the root does not exist.
pub fn subtree_ids(conn: &Connection, root: CommentId) -> Result<Vec<CommentId>> {
    load(conn, root)?;

    let mut visited: HashSet<CommentId> = HashSet::new();
    let mut queue: VecDeque<CommentId> = VecDeque::new();
    let mut result = Vec::new();

    queue.push_back(root);
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        result.push(current);
        for child in query::child_ids(conn, current)? {
            if !visited.contains(&child) {
                queue.push_back(child);
            }
        }
    }

    Ok(result)
}

/// Soft delete: mark a comment and every descendant `deleted`, in one
/// write-locked transaction. Rows stay in the store.
///
/// # Errors
///
/// [`Error::NotFound`] for an unknown id, [`Error::Storage`] if the
/// transaction fails.
pub fn trash(
    conn: &Connection,
    moderator: &Moderator,
    id: CommentId,
    now: DateTime<Utc>,
) -> Result<CascadeReport> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .context("begin trash transaction")?;

    let mut affected = Vec::new();
    for member in subtree_ids(&tx, id)? {
        let comment = load(&tx, member)?;
        let to = match comment.state.transition(ModerationAction::Trash)? {
            Transition::Changed(to) => to,
            Transition::Unchanged => continue,
        };
        if query::set_comment_state(&tx, member, comment.state, to, now)? {
            affected.push(member);
        }
    }

    tx.commit().context("commit trash transaction")?;
    info!(
        comment = %id,
        moderator = %moderator.account(),
        affected = affected.len(),
        "comment subtree trashed"
    );
    Ok(CascadeReport { root: id, affected })
}

/// Hard delete: remove a comment and every descendant from the store, in
/// one write-locked transaction. A comment with N descendants removes
/// N + 1 rows.
///
/// # Errors
///
/// [`Error::NotFound`] for an unknown id, [`Error::Storage`] if the
/// transaction fails or removes a different number of rows than collected.
pub fn delete(conn: &Connection, moderator: &Moderator, id: CommentId) -> Result<CascadeReport> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .context("begin delete transaction")?;

    let affected = subtree_ids(&tx, id)?;
    let leaves_first: Vec<CommentId> = affected.iter().rev().copied().collect();
    let removed = query::delete_comment_rows(&tx, &leaves_first)?;
    if removed != affected.len() {
        return Err(Error::Storage(anyhow::anyhow!(
            "delete of comment {id} removed {removed} rows, expected {}",
            affected.len()
        )));
    }

    tx.commit().context("commit delete transaction")?;
    info!(
        comment = %id,
        moderator = %moderator.account(),
        removed,
        "comment subtree deleted"
    );
    Ok(CascadeReport { root: id, affected })
}

/// Comments awaiting (or filtered by) a moderation state, oldest first.
///
/// # Errors
///
/// [`Error::NotFound`] when `filter.post` does not resolve,
/// [`Error::Storage`] if the query fails.
pub fn queue(
    conn: &Connection,
    moderator: &Moderator,
    filter: &QueueFilter,
) -> Result<Vec<Comment>> {
    let post_id = match filter.post.as_deref() {
        Some(reference) => Some(posts::resolve_post(conn, reference)?.id),
        None => None,
    };
    let state = filter.state.unwrap_or(CommentState::Pending);
    let limit = filter
        .limit
        .unwrap_or(DEFAULT_QUEUE_LIMIT)
        .clamp(1, MAX_QUEUE_LIMIT);

    let comments = query::list_comments(
        conn,
        &CommentFilter {
            post_id,
            state: Some(state),
            limit: Some(limit),
            offset: filter.offset,
        },
    )?;
    debug!(
        moderator = %moderator.account(),
        %state,
        returned = comments.len(),
        "moderation queue listed"
    );
    Ok(comments)
}

/// Approved comments of a post that cannot be placed in its reply tree,
/// in creation order.
///
/// # Errors
///
/// [`Error::NotFound`] when the post does not resolve, [`Error::Storage`]
/// if the query fails.
pub fn orphans(conn: &Connection, moderator: &Moderator, post_ref: &str) -> Result<Vec<Comment>> {
    let post = posts::resolve_post(conn, post_ref)?;
    let approved = query::list_comments(
        conn,
        &CommentFilter {
            post_id: Some(post.id.clone()),
            state: Some(CommentState::Approved),
            ..CommentFilter::default()
        },
    )?;

    let orphaned: HashSet<CommentId> = assemble(&approved).orphans.into_iter().collect();
    let found: Vec<Comment> = approved
        .into_iter()
        .filter(|comment| orphaned.contains(&comment.id))
        .collect();
    debug!(
        post = %post.id,
        moderator = %moderator.account(),
        orphans = found.len(),
        "orphan diagnostic"
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::error::ErrorCode;
    use crate::identity::Identity;
    use crate::model::post::PostStatus;
    use crate::submit::{SubmitRequest, submit};
    use rusqlite::params;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).expect("valid timestamp")
    }

    fn moderator() -> Moderator {
        Identity::operator().require_moderator().expect("operator moderates")
    }

    fn setup() -> Connection {
        let conn = open_in_memory().expect("store");
        posts::create_post(&conn, "hello", "Hello", PostStatus::Published, at(0)).expect("post");
        conn
    }

    fn add(conn: &Connection, parent: Option<CommentId>, secs: i64) -> CommentId {
        let req = SubmitRequest {
            post: "hello".to_string(),
            parent_id: parent,
            author_name: "Anon".to_string(),
            content: format!("comment at {secs}"),
            ..SubmitRequest::default()
        };
        submit(conn, &req, &Identity::Anonymous, at(secs))
            .expect("submit")
            .id
    }

    fn state_of(conn: &Connection, id: CommentId) -> CommentState {
        query::get_comment(conn, id)
            .expect("query")
            .expect("exists")
            .state
    }

    #[test]
    fn approve_is_idempotent() {
        let conn = setup();
        let id = add(&conn, None, 1);
        let first = approve(&conn, &moderator(), id, at(10)).expect("approve");
        let second = approve(&conn, &moderator(), id, at(20)).expect("approve again");
        assert_eq!(first.state, CommentState::Approved);
        assert_eq!(second.state, CommentState::Approved);
        assert_eq!(second.updated_at, at(10), "no-op must not touch updated_at");
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let conn = setup();
        let m = moderator();
        let ghost = CommentId(404);
        for err in [
            approve(&conn, &m, ghost, at(1)).expect_err("approve"),
            mark_spam(&conn, &m, ghost, at(1)).expect_err("spam"),
        ] {
            assert_eq!(err.code(), ErrorCode::CommentNotFound);
        }
        assert_eq!(
            trash(&conn, &m, ghost, at(1)).expect_err("trash").code(),
            ErrorCode::CommentNotFound
        );
        assert_eq!(
            delete(&conn, &m, ghost).expect_err("delete").code(),
            ErrorCode::CommentNotFound
        );
    }

    #[test]
    fn spam_cannot_be_approved() {
        let conn = setup();
        let id = add(&conn, None, 1);
        mark_spam(&conn, &moderator(), id, at(2)).expect("spam");
        let err = approve(&conn, &moderator(), id, at(3)).expect_err("rejected");
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        assert_eq!(state_of(&conn, id), CommentState::Spam);
    }

    fn file_store(dir: &tempfile::TempDir) -> (std::path::PathBuf, Connection) {
        let path = dir.path().join("quire.db");
        let conn = crate::db::open_store(&path).expect("store");
        posts::create_post(&conn, "hello", "Hello", PostStatus::Published, at(0)).expect("post");
        (path, conn)
    }

    #[test]
    fn stale_approve_cannot_revive_trashed_comment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (path, conn) = file_store(&dir);
        let id = add(&conn, None, 1);
        let snapshot = load(&conn, id).expect("snapshot");
        assert_eq!(snapshot.state, CommentState::Pending);

        let other = crate::db::connect(&path).expect("second connection");
        trash(&other, &moderator(), id, at(2)).expect("trash");

        let err = settle(&conn, &moderator(), snapshot, ModerationAction::Approve, at(3))
            .expect_err("approve from a stale snapshot");
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        assert_eq!(state_of(&conn, id), CommentState::Deleted);
        assert_eq!(state_of(&other, id), CommentState::Deleted);
    }

    #[test]
    fn stale_spam_re_evaluates_against_stored_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (path, conn) = file_store(&dir);
        let approved = add(&conn, None, 1);
        let removed = add(&conn, None, 2);
        let approved_snapshot = load(&conn, approved).expect("snapshot");
        let removed_snapshot = load(&conn, removed).expect("snapshot");

        let other = crate::db::connect(&path).expect("second connection");
        approve(&other, &moderator(), approved, at(3)).expect("approve");
        delete(&other, &moderator(), removed).expect("delete");

        let spam = settle(&conn, &moderator(), approved_snapshot, ModerationAction::MarkSpam, at(4))
            .expect("approved -> spam");
        assert_eq!(spam.state, CommentState::Spam);
        assert_eq!(spam.updated_at, at(4));
        assert_eq!(state_of(&other, approved), CommentState::Spam);

        let err = settle(&conn, &moderator(), removed_snapshot, ModerationAction::MarkSpam, at(5))
            .expect_err("row is gone");
        assert_eq!(err.code(), ErrorCode::CommentNotFound);
    }

    #[test]
    fn trash_cascades_to_descendants() {
        let conn = setup();
        let root = add(&conn, None, 1);
        let child = add(&conn, Some(root), 2);
        let grandchild = add(&conn, Some(child), 3);
        let unrelated = add(&conn, None, 4);

        let report = trash(&conn, &moderator(), root, at(5)).expect("trash");
        assert_eq!(report.affected, vec![root, child, grandchild]);
        for id in [root, child, grandchild] {
            assert_eq!(state_of(&conn, id), CommentState::Deleted);
        }
        assert_eq!(state_of(&conn, unrelated), CommentState::Pending);

        let again = trash(&conn, &moderator(), root, at(6)).expect("trash again");
        assert!(again.affected.is_empty());
    }

    #[test]
    fn delete_removes_subtree_rows() {
        let conn = setup();
        let root = add(&conn, None, 1);
        let a = add(&conn, Some(root), 2);
        let b = add(&conn, Some(root), 3);
        let a1 = add(&conn, Some(a), 4);
        let survivor = add(&conn, None, 5);

        assert_eq!(subtree_ids(&conn, root).expect("subtree"), vec![root, a, b, a1]);

        let report = delete(&conn, &moderator(), root).expect("delete");
        assert_eq!(report.affected.len(), 4);
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
            .expect("count");
        assert_eq!(remaining, 1);
        assert!(query::get_comment(&conn, survivor).expect("query").is_some());
    }

    #[test]
    fn subtree_walk_survives_parent_cycles() {
        let conn = setup();
        let a = add(&conn, None, 1);
        let b = add(&conn, Some(a), 2);
        conn.execute(
            "UPDATE comments SET parent_id = ?1 WHERE comment_id = ?2",
            params![b.0, a.0],
        )
        .expect("corrupt parent chain");

        assert_eq!(subtree_ids(&conn, a).expect("subtree"), vec![a, b]);
        let report = delete(&conn, &moderator(), a).expect("delete");
        assert_eq!(report.affected, vec![a, b]);
    }

    #[test]
    fn queue_defaults_to_pending_oldest_first() {
        let conn = setup();
        let first = add(&conn, None, 1);
        let second = add(&conn, None, 2);
        let approved = add(&conn, None, 3);
        approve(&conn, &moderator(), approved, at(4)).expect("approve");

        let pending = queue(&conn, &moderator(), &QueueFilter::default()).expect("queue");
        let ids: Vec<_> = pending.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![first, second]);

        let approved_only = queue(
            &conn,
            &moderator(),
            &QueueFilter {
                state: Some(CommentState::Approved),
                post: Some("hello".to_string()),
                ..QueueFilter::default()
            },
        )
        .expect("queue");
        assert_eq!(approved_only.len(), 1);

        let paged = queue(
            &conn,
            &moderator(),
            &QueueFilter {
                limit: Some(1),
                offset: Some(1),
                ..QueueFilter::default()
            },
        )
        .expect("queue");
        assert_eq!(paged.iter().map(|c| c.id).collect::<Vec<_>>(), vec![second]);
    }

    #[test]
    fn orphans_lists_unplaceable_approved_comments() {
        let conn = setup();
        let m = moderator();
        let root = add(&conn, None, 1);
        let reply = add(&conn, Some(root), 2);
        approve(&conn, &m, reply, at(3)).expect("approve reply only");

        let found = orphans(&conn, &m, "hello").expect("orphans");
        assert_eq!(found.iter().map(|c| c.id).collect::<Vec<_>>(), vec![reply]);

        approve(&conn, &m, root, at(4)).expect("approve root");
        assert!(orphans(&conn, &m, "hello").expect("orphans").is_empty());
    }
}
